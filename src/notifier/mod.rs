// Outbound notifications

mod webhook;

pub use webhook::{
    DeliveryOutcome, NotificationDeliveryError, NotifierConfig, WebhookNotifier, FORM_FIELD,
};

use crate::event::NotificationRequest;

/// Delivers relayed messages.
///
/// `send` is fire-and-forget: it must return without waiting on the network
/// and must never surface a delivery failure to the caller.
pub trait Notifier: Send + Sync {
    fn send(&self, request: NotificationRequest);
}
