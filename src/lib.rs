// Change events and notification requests
pub mod event;

// Remote store change feed
pub mod store;

// Webhook notifier
pub mod notifier;

// Subscription lifecycle and relay
pub mod subscription;

// Configuration loading
pub mod config;

pub use event::{ChangeEvent, FeedEvent, NotificationRequest, SubscriptionReadError};
pub use notifier::{Notifier, WebhookNotifier};
pub use store::{ChangeFeed, StoreClient};
pub use subscription::SubscriptionManager;
