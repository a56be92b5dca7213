//! Lifecycle listener registration
//!
//! Each driver connection handle gets exactly one [`LifecycleHandler`], no
//! matter how many times `connect` runs against it.

use super::manager::ManagerState;
use crate::connection::{FatalReason, LifecycleEvent, LifecycleListener};
use crate::driver::DriverConnection;
use crate::Result;
use std::sync::{Arc, Weak};

/// Attach the manager's handler to `conn` unless it already has one.
///
/// Returns `true` when a handler was attached by this call.
pub(crate) fn bind(state: &Arc<ManagerState>, conn: &Arc<dyn DriverConnection>) -> Result<bool> {
    let id = conn.id();
    let logger = state.logger();
    let mut bound = state.bound.lock();

    if bound.contains(&id) {
        logger.debug(&format!("listeners already applied to {}", id));
        return Ok(false);
    }

    conn.add_listener(Arc::new(LifecycleHandler {
        state: Arc::downgrade(state),
    }))?;
    bound.insert(id);
    logger.debug(&format!("lifecycle listeners applied to {}", id));
    Ok(true)
}

/// Reacts to lifecycle events according to the active configuration
///
/// Holds the manager weakly: the driver owns the handler, and the manager
/// owns the driver.
struct LifecycleHandler {
    state: Weak<ManagerState>,
}

impl LifecycleListener for LifecycleHandler {
    fn on_event(&self, event: &LifecycleEvent) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        crate::metrics::counters::lifecycle_event(event.name());
        let logger = state.logger();

        match event {
            LifecycleEvent::Connected => logger.info("successfully connected"),
            LifecycleEvent::Disconnected => {
                logger.info("default connection disconnected");
                if state.is_closing() {
                    return;
                }
                if state.kill_process_on_disconnect() {
                    state.raise(FatalReason::Disconnected, None);
                }
            }
            LifecycleEvent::Reconnected => logger.debug("successfully reconnected"),
            LifecycleEvent::ReconnectFailed => {
                logger.error("reconnect failed");
                state.raise(FatalReason::ReconnectFailed, None);
            }
            LifecycleEvent::Error(message) => {
                logger.error("connection error!");
                logger.error(message);
                state.raise(FatalReason::ConnectionError, Some(message.clone()));
            }
        }
    }
}
