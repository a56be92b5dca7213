//! Lifecycle events emitted by the driver

/// Asynchronous notification about the driver-owned connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The connection is open
    Connected,
    /// The connection dropped or was closed
    Disconnected,
    /// The driver restored a dropped connection on its own
    Reconnected,
    /// The driver gave up reconnecting
    ReconnectFailed,
    /// The driver reported a connection error
    Error(String),
}

impl LifecycleEvent {
    /// Event name, used as a metrics label
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnected => "reconnected",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {}", message),
            other => f.write_str(other.name()),
        }
    }
}

/// Receiver of lifecycle events
///
/// Drivers call listeners synchronously from whatever task observed the
/// change, so implementations must not block.
pub trait LifecycleListener: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &LifecycleEvent);
}
