// Subscription to the watched path and the relay decision

pub mod manager;
pub mod relay;

pub use manager::{SubscriptionError, SubscriptionManager, SubscriptionState};
pub use relay::{relay_change, report_read_error};
