use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

mod error;

pub use error::SubscriptionReadError;

/// Field of the watched record that carries the text to relay.
pub const MESSAGE_FIELD: &str = "message";

/// ChangeEvent is a snapshot of the watched record at one point in time.
///
/// Created by the change feed every time the value at the watched path
/// changes. The relay only ever reads it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangeEvent {
    /// Full value of the watched record (JSON `null` when the record is absent)
    pub value: Value,

    /// Local time the change was observed
    pub received_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            received_at: Utc::now(),
        }
    }

    /// Returns the relayable message, if any.
    ///
    /// Only a non-empty string counts. Absent, `null`, empty and non-string
    /// values all yield `None`.
    pub fn message(&self) -> Option<&str> {
        self.value
            .get(MESSAGE_FIELD)
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }
}

/// Item yielded by a change feed.
#[derive(Clone, Debug, PartialEq)]
pub enum FeedEvent {
    Change(ChangeEvent),
    Error(SubscriptionReadError),
}

/// A single outbound notification.
///
/// Can only be built from non-empty text, so every request that reaches a
/// notifier carries something to say.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRequest {
    text: String,
}

impl NotificationRequest {
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            return None;
        }
        Some(Self { text })
    }

    pub fn from_change(event: &ChangeEvent) -> Option<Self> {
        event.message().and_then(Self::new)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
