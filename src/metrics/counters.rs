//! Counter helpers

use super::labels;
use metrics::counter;

/// A connect call reached the readiness check
pub fn connect_attempted() {
    counter!(labels::CONNECT_ATTEMPTS).increment(1);
}

/// A connect call found the connection in `state` and reused it
pub fn connect_reused(state: &'static str) {
    counter!(labels::CONNECT_REUSED, labels::STATE => state).increment(1);
}

/// A connect call opened a fresh connection
pub fn connect_opened() {
    counter!(labels::CONNECT_OPENED).increment(1);
}

/// A connect call failed for `reason`
pub fn connect_failed(reason: &'static str) {
    counter!(labels::CONNECT_FAILED, labels::REASON => reason).increment(1);
}

/// A disconnect call closed the connection
pub fn disconnected() {
    counter!(labels::DISCONNECTS).increment(1);
}

/// A lifecycle event reached the registered listeners
pub fn lifecycle_event(event: &'static str) {
    counter!(labels::LIFECYCLE_EVENTS, labels::EVENT => event).increment(1);
}

/// A fatal condition was handed to the failure policy
pub fn fatal_condition(reason: &'static str, action: &'static str) {
    counter!(
        labels::FATAL_CONDITIONS,
        labels::REASON => reason,
        labels::ACTION => action
    )
    .increment(1);
}
