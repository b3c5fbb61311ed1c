// Remote realtime store: streaming reads over the REST event-stream API

mod client;
mod protocol;
mod snapshot;
mod sse;

pub use client::{StoreAuth, StoreClient, StoreConfig};
pub use protocol::{ProtocolError, StoreEvent, StoreUpdate};
pub use snapshot::SnapshotCache;
pub use sse::{LineTooLong, SseDecoder, SseFrame, DEFAULT_MAX_LINE_BYTES};

use crate::event::FeedEvent;
use anyhow::Result;
use futures::Stream;
use std::pin::Pin;

/// Stream of change / error events for one watched path
pub type FeedStream = Pin<Box<dyn Stream<Item = FeedEvent> + Send>>;

/// Source of change events for a single path.
///
/// The store client is the production implementation; tests substitute an
/// in-memory feed. Dropping the returned stream must release whatever
/// connection backs it.
pub trait ChangeFeed: Send + Sync {
    /// Begin watching `path`. Must not block; events arrive on the stream.
    fn watch(&self, path: &str) -> Result<FeedStream>;
}
