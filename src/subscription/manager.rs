use super::relay::{relay_change, report_read_error};
use crate::event::{FeedEvent, SubscriptionReadError};
use crate::notifier::Notifier;
use crate::store::ChangeFeed;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Lifecycle of the process-wide subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unstarted,
    Subscribed,
    Stopped,
}

/// Misuse of the subscription lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// `start` was already called on this manager
    AlreadyStarted,
    /// The manager was stopped and cannot be restarted
    Stopped,
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::AlreadyStarted => write!(f, "subscription already started"),
            SubscriptionError::Stopped => write!(f, "subscription has been stopped"),
        }
    }
}

impl std::error::Error for SubscriptionError {}

/// Owns the single subscription to the watched path.
///
/// Every change event is relayed to the notifier; every read error is logged.
/// The event loop runs on its own task until `stop` is called or the manager
/// is dropped.
pub struct SubscriptionManager {
    feed: Arc<dyn ChangeFeed>,
    notifier: Arc<dyn Notifier>,
    state: SubscriptionState,
    path: Option<String>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionManager {
    pub fn new(feed: Arc<dyn ChangeFeed>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            feed,
            notifier,
            state: SubscriptionState::Unstarted,
            path: None,
            shutdown_tx: None,
            task: None,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Path being watched, once started
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Subscribe to `path` and return immediately.
    ///
    /// Must be called from within a tokio runtime. A manager subscribes once:
    /// further calls are rejected.
    pub fn start(&mut self, path: impl Into<String>) -> Result<(), SubscriptionError> {
        match self.state {
            SubscriptionState::Unstarted => {}
            SubscriptionState::Subscribed => return Err(SubscriptionError::AlreadyStarted),
            SubscriptionState::Stopped => return Err(SubscriptionError::Stopped),
        }

        let path = path.into();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_event_loop(
            Arc::clone(&self.feed),
            Arc::clone(&self.notifier),
            path.clone(),
            shutdown_rx,
        ));

        info!(path = %path, "Subscription started");
        self.path = Some(path);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        self.state = SubscriptionState::Subscribed;
        Ok(())
    }

    /// End the subscription and wait for the event loop to release the feed.
    ///
    /// Safe to call in any state. Notifications already dispatched are not
    /// cancelled.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Subscription event loop panicked");
            }
        }

        if self.state == SubscriptionState::Subscribed {
            info!(path = ?self.path, "Subscription stopped");
        }
        self.state = SubscriptionState::Stopped;
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_event_loop(
    feed: Arc<dyn ChangeFeed>,
    notifier: Arc<dyn Notifier>,
    path: String,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut events = match feed.watch(&path) {
        Ok(events) => events,
        Err(e) => {
            report_read_error(&SubscriptionReadError::Disconnected(format!("{:#}", e)));
            return;
        }
    };

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            next = events.next() => match next {
                Some(FeedEvent::Change(event)) => {
                    relay_change(&event, notifier.as_ref());
                }
                Some(FeedEvent::Error(err)) => report_read_error(&err),
                None => {
                    warn!(path = %path, "Change feed ended, subscription inactive");
                    // Stay parked until stopped so the lifecycle stays observable
                    let _ = (&mut shutdown_rx).await;
                    break;
                }
            },
        }
    }
}
