use super::protocol::StoreEvent;
use super::snapshot::SnapshotCache;
use super::sse::SseDecoder;
use super::{ChangeFeed, FeedStream};
use crate::event::{ChangeEvent, FeedEvent, SubscriptionReadError};
use anyhow::{anyhow, Context, Result};
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, trace, warn};

/// Buffered feed events per watch before the transport waits on the consumer
const FEED_CHANNEL_CAPACITY: usize = 64;

/// Remote store configuration
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    /// Database root, e.g. "https://example.firebaseio.com"
    #[serde(default)]
    pub database_url: String,
    /// Record to watch
    #[serde(default = "default_path")]
    pub path: String,
    /// Database secret or ID token, sent as `auth=`.
    ///
    /// Only a database secret never expires. ID tokens and access tokens are
    /// used as given and never refreshed: once the store revokes them the
    /// reconnect is refused and the feed ends. Use a secret for an unattended
    /// long-running relay.
    #[serde(default)]
    pub auth: Option<String>,
    /// OAuth2 access token, sent as `access_token=` (expires, see `auth`)
    #[serde(default)]
    pub access_token: Option<String>,
    /// Pause before reopening a dropped stream (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Silence after which an open stream is considered dead (milliseconds).
    /// The store sends `keep-alive` roughly every 30 seconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_path() -> String {
    "/linebot/receive".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            path: default_path(),
            auth: None,
            access_token: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

// Credentials stay out of logs
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database_url", &self.database_url)
            .field("path", &self.path)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .finish()
    }
}

/// How the client proves its identity to the store
#[derive(Clone, PartialEq, Eq)]
pub enum StoreAuth {
    None,
    Secret(String),
    AccessToken(String),
}

impl StoreConfig {
    /// Access token wins when both credentials are configured.
    pub fn credentials(&self) -> StoreAuth {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        if let Some(token) = non_empty(&self.access_token) {
            StoreAuth::AccessToken(token)
        } else if let Some(secret) = non_empty(&self.auth) {
            StoreAuth::Secret(secret)
        } else {
            StoreAuth::None
        }
    }
}

/// Streaming read client for the remote store
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    config: StoreConfig,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        Url::parse(&config.database_url)
            .with_context(|| format!("Invalid store database_url '{}'", config.database_url))?;

        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build store HTTP client")?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Build the streaming URL for `path`, credential included.
    pub fn watch_url(&self, path: &str) -> Result<Url> {
        let base = self.config.database_url.trim_end_matches('/');
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();

        let mut url = Url::parse(&format!("{}/{}.json", base, segments.join("/")))
            .with_context(|| format!("Invalid watch path '{}'", path))?;

        match self.config.credentials() {
            StoreAuth::None => {}
            StoreAuth::Secret(secret) => {
                url.query_pairs_mut().append_pair("auth", &secret);
            }
            StoreAuth::AccessToken(token) => {
                url.query_pairs_mut().append_pair("access_token", &token);
            }
        }

        Ok(url)
    }
}

impl ChangeFeed for StoreClient {
    fn watch(&self, path: &str) -> Result<FeedStream> {
        if path.contains(|c: char| matches!(c, '.' | '#' | '$' | '[' | ']')) {
            return Err(anyhow!("Watch path '{}' contains a reserved character", path));
        }
        let url = self.watch_url(path)?;
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

        info!(
            database_url = %self.config.database_url,
            path = %path,
            "Opening store event stream"
        );

        let transport = Transport {
            http: self.http.clone(),
            url,
            path: path.to_string(),
            reconnect_delay: Duration::from_millis(self.config.reconnect_delay_ms),
            idle_timeout: Duration::from_millis(self.config.idle_timeout_ms),
            tx,
        };
        tokio::spawn(transport.run());

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Why one streaming connection ended
enum StreamEnd {
    /// Feed consumer went away; stop for good
    Released,
    /// The store refused the read; stop for good
    Denied(SubscriptionReadError),
    /// Transient failure; reconnect
    Dropped(SubscriptionReadError),
}

/// Background task owning the store connection for one watch
struct Transport {
    http: reqwest::Client,
    url: Url,
    path: String,
    reconnect_delay: Duration,
    idle_timeout: Duration,
    tx: mpsc::Sender<FeedEvent>,
}

impl Transport {
    async fn run(self) {
        let mut cache = SnapshotCache::new();

        loop {
            match self.stream_once(&mut cache).await {
                StreamEnd::Released => break,
                StreamEnd::Denied(err) => {
                    let _ = self.tx.send(FeedEvent::Error(err)).await;
                    break;
                }
                StreamEnd::Dropped(err) => {
                    if self.tx.send(FeedEvent::Error(err)).await.is_err() {
                        break;
                    }
                }
            }

            tokio::select! {
                _ = self.tx.closed() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {
                    debug!(path = %self.path, "Reconnecting to store");
                }
            }
        }

        debug!(path = %self.path, "Store transport stopped");
    }

    async fn stream_once(&self, cache: &mut SnapshotCache) -> StreamEnd {
        let request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .send();

        let mut response = tokio::select! {
            _ = self.tx.closed() => return StreamEnd::Released,
            result = tokio::time::timeout(self.idle_timeout, request) => match result {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    return StreamEnd::Dropped(SubscriptionReadError::Disconnected(
                        e.without_url().to_string(),
                    ))
                }
                Err(_) => {
                    return StreamEnd::Dropped(SubscriptionReadError::Disconnected(format!(
                        "no response for {}ms",
                        self.idle_timeout.as_millis()
                    )))
                }
            },
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return StreamEnd::Denied(SubscriptionReadError::PermissionDenied(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }
        if !status.is_success() {
            return StreamEnd::Dropped(SubscriptionReadError::Disconnected(format!(
                "HTTP {}",
                status
            )));
        }

        info!(path = %self.path, "Store event stream connected");

        let mut decoder = SseDecoder::new();
        loop {
            let chunk = tokio::select! {
                _ = self.tx.closed() => return StreamEnd::Released,
                chunk = tokio::time::timeout(self.idle_timeout, response.chunk()) => chunk,
            };

            let bytes = match chunk {
                Err(_) => {
                    return StreamEnd::Dropped(SubscriptionReadError::Disconnected(format!(
                        "no data for {}ms",
                        self.idle_timeout.as_millis()
                    )))
                }
                Ok(Ok(Some(bytes))) => bytes,
                Ok(Ok(None)) => {
                    return StreamEnd::Dropped(SubscriptionReadError::Disconnected(
                        "stream closed by server".to_string(),
                    ))
                }
                Ok(Err(e)) => {
                    return StreamEnd::Dropped(SubscriptionReadError::Disconnected(
                        e.without_url().to_string(),
                    ))
                }
            };

            let frames = match decoder.feed(&bytes) {
                Ok(frames) => frames,
                Err(e) => {
                    return StreamEnd::Dropped(SubscriptionReadError::Disconnected(e.to_string()))
                }
            };

            for frame in frames {
                let event = match StoreEvent::from_frame(&frame) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(path = %self.path, error = %e, "Ignoring undecodable store event");
                        continue;
                    }
                };

                if let Some(end) = self.apply(event, cache).await {
                    return end;
                }
            }
        }
    }

    async fn apply(&self, event: StoreEvent, cache: &mut SnapshotCache) -> Option<StreamEnd> {
        let changed = match event {
            StoreEvent::Put(update) => cache.put(&update.path, update.data),
            StoreEvent::Patch(update) => cache.patch(&update.path, update.data),
            StoreEvent::KeepAlive => {
                trace!(path = %self.path, "keep-alive");
                None
            }
            StoreEvent::Cancel(reason) => {
                return Some(StreamEnd::Denied(SubscriptionReadError::PermissionDenied(
                    reason,
                )))
            }
            StoreEvent::AuthRevoked => {
                return Some(StreamEnd::Dropped(SubscriptionReadError::AuthRevoked))
            }
            StoreEvent::Unknown(name) => {
                debug!(path = %self.path, event = %name, "Ignoring unknown store event");
                None
            }
        };

        let value = changed?;
        if self
            .tx
            .send(FeedEvent::Change(ChangeEvent::new(value)))
            .await
            .is_err()
        {
            return Some(StreamEnd::Released);
        }
        None
    }
}
