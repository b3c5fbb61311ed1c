use crate::event::{ChangeEvent, NotificationRequest, SubscriptionReadError};
use crate::notifier::Notifier;
use tracing::{debug, error, info};

/// Relay one change event.
///
/// Sends exactly one notification when the event carries a non-empty message,
/// nothing otherwise. Returns whether a notification was sent.
pub fn relay_change(event: &ChangeEvent, notifier: &dyn Notifier) -> bool {
    match NotificationRequest::from_change(event) {
        Some(request) => {
            info!(text = %request.text(), "Relaying message");
            notifier.send(request);
            true
        }
        None => {
            debug!(received_at = %event.received_at, "Change without message, nothing to relay");
            false
        }
    }
}

/// Log a read failure on the watched path. No corrective action is taken.
pub fn report_read_error(err: &SubscriptionReadError) {
    error!(code = err.code(), error = %err, "Subscription read failed");
}
