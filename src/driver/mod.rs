//! Database driver abstraction
//!
//! The manager never constructs connections itself. A [`Driver`] owns one shared
//! connection handle; the manager asks it to open and close, reads its
//! readiness and attaches lifecycle listeners to it.
//!
//! Implementations:
//! * [`MemoryDriver`]: in-process driver with scriptable events and failures
//! * `MongoDriver`: the official `mongodb` client (feature `mongodb`)

mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use memory::MemoryDriver;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDriver;

use crate::client::ConnectionInfo;
use crate::connection::{DriverOptions, LifecycleEvent, LifecycleListener, ReadyState};
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Process-wide source of handle identities
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a driver connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// External database client library
pub trait Driver: Send + Sync {
    /// The shared connection handle this driver currently owns
    fn connection(&self) -> Arc<dyn DriverConnection>;
}

/// Driver-owned connection handle
#[async_trait]
pub trait DriverConnection: Send + Sync {
    /// Stable identity of this handle
    fn id(&self) -> ConnectionId;

    /// Current readiness
    fn ready_state(&self) -> ReadyState;

    /// Open the connection
    ///
    /// Readiness is `Connecting` while the returned future runs and `Connected`
    /// once it resolves successfully.
    async fn open(&self, info: &ConnectionInfo, options: &DriverOptions) -> Result<()>;

    /// Close the connection; resolves once readiness is `Disconnected`
    async fn close(&self) -> Result<()>;

    /// Free client resources kept after the connection dropped on its own
    ///
    /// Only called while readiness is `Disconnected`. Emits no events, and the
    /// handle must stay closed afterwards until the next `open`.
    async fn release(&self) -> Result<()>;

    /// Subscribe a listener to lifecycle events on this handle
    fn add_listener(&self, listener: Arc<dyn LifecycleListener>) -> Result<()>;
}

/// Listener registry shared by the driver implementations
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl ListenerSet {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener
    pub fn add(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver an event to every listener
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// register further listeners.
    pub fn dispatch(&self, event: &LifecycleEvent) {
        let listeners = self.listeners.read().clone();
        tracing::trace!(event = event.name(), listeners = listeners.len(), "dispatching");
        for listener in listeners {
            listener.on_event(event);
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}
