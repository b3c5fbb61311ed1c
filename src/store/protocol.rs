use super::sse::SseFrame;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Body of `put` and `patch` events
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StoreUpdate {
    /// Location relative to the watched path ("/" for the path itself)
    pub path: String,
    pub data: Value,
}

/// Events sent by the store on a streaming read
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// Replace the value at `path`
    Put(StoreUpdate),
    /// Set each child of `data` under `path`
    Patch(StoreUpdate),
    KeepAlive,
    /// Security rules no longer allow the read; the server closes the stream
    Cancel(String),
    /// Credential expired; the client should reconnect with a fresh one
    AuthRevoked,
    Unknown(String),
}

#[derive(Debug)]
pub struct ProtocolError {
    event: String,
    source: serde_json::Error,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid '{}' payload: {}", self.event, self.source)
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl StoreEvent {
    pub fn from_frame(frame: &SseFrame) -> Result<Self, ProtocolError> {
        let parse_update = |frame: &SseFrame| {
            serde_json::from_str::<StoreUpdate>(&frame.data).map_err(|source| ProtocolError {
                event: frame.event.clone(),
                source,
            })
        };

        let event = match frame.event.as_str() {
            "put" => StoreEvent::Put(parse_update(frame)?),
            "patch" => StoreEvent::Patch(parse_update(frame)?),
            "keep-alive" => StoreEvent::KeepAlive,
            "cancel" => StoreEvent::Cancel(cancel_reason(&frame.data)),
            "auth_revoked" => StoreEvent::AuthRevoked,
            other => StoreEvent::Unknown(other.to_string()),
        };
        Ok(event)
    }
}

/// The server sends `null` or a JSON string explaining the cancellation.
fn cancel_reason(data: &str) -> String {
    let data = data.trim();
    if data.is_empty() || data == "null" {
        return "read cancelled by security rules".to_string();
    }
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(reason)) => reason,
        _ => data.to_string(),
    }
}
