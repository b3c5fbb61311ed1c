use std::fmt;

/// Read failures reported by a change feed for the watched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionReadError {
    /// The store refused the read (security rules, bad credential)
    PermissionDenied(String),
    /// The credential expired or was revoked while streaming
    AuthRevoked,
    /// Connection to the store failed or was dropped
    Disconnected(String),
}

impl SubscriptionReadError {
    /// Stable error code, as written to the logs
    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionReadError::PermissionDenied(_) => "permission_denied",
            SubscriptionReadError::AuthRevoked => "auth_revoked",
            SubscriptionReadError::Disconnected(_) => "disconnected",
        }
    }
}

impl fmt::Display for SubscriptionReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionReadError::PermissionDenied(reason) => {
                write!(f, "the read failed: {} ({})", self.code(), reason)
            }
            SubscriptionReadError::AuthRevoked => {
                write!(f, "the read failed: {}", self.code())
            }
            SubscriptionReadError::Disconnected(reason) => {
                write!(f, "the read failed: {} ({})", self.code(), reason)
            }
        }
    }
}

impl std::error::Error for SubscriptionReadError {}
