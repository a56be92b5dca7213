//! In-process driver
//!
//! Behaves like a real driver's default connection: one long-lived handle whose
//! readiness moves through the normal states, with lifecycle events delivered
//! synchronously to listeners. Failures, slow opens and driver-side events can
//! be scripted, which makes it the test double for the manager.

use super::{ConnectionId, Driver, DriverConnection, ListenerSet};
use crate::client::ConnectionInfo;
use crate::connection::{DriverOptions, LifecycleEvent, LifecycleListener, ReadyState};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// In-process driver
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    current: Arc<Mutex<Arc<MemoryConnection>>>,
}

impl MemoryDriver {
    /// Create a driver with a fresh, closed connection handle
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self) -> Arc<MemoryConnection> {
        self.current.lock().clone()
    }

    /// Replace the owned handle with a new, closed one
    pub fn rotate_connection(&self) -> ConnectionId {
        let fresh = Arc::new(MemoryConnection::default());
        let id = fresh.id;
        *self.current.lock() = fresh;
        id
    }

    /// Identity of the current handle
    pub fn connection_id(&self) -> ConnectionId {
        self.handle().id
    }

    /// Readiness of the current handle
    pub fn ready_state(&self) -> ReadyState {
        *self.handle().state.lock()
    }

    /// Simulate a driver-side event
    ///
    /// Readiness follows the event: `Connected`/`Reconnected` open the handle,
    /// `Disconnected`/`ReconnectFailed` close it, `Error` leaves it alone.
    pub fn emit(&self, event: LifecycleEvent) {
        self.handle().emit(event);
    }

    /// Make the next `open` fail with a driver error
    pub fn fail_next_open(&self, message: impl Into<String>) {
        *self.handle().fail_next_open.lock() = Some(message.into());
    }

    /// Make the next `close` fail with a driver error
    pub fn fail_next_close(&self, message: impl Into<String>) {
        *self.handle().fail_next_close.lock() = Some(message.into());
    }

    /// Make listener registration fail
    pub fn fail_listener_registration(&self, fail: bool) {
        self.handle()
            .fail_listeners
            .store(fail, Ordering::SeqCst);
    }

    /// Keep `open` in `Connecting` until [`release_open`](Self::release_open)
    pub fn hold_open(&self, hold: bool) {
        self.handle().hold_open.store(hold, Ordering::SeqCst);
    }

    /// Let a held `open` finish
    pub fn release_open(&self) {
        self.handle().open_gate.notify_one();
    }

    /// Number of `open` calls on the current handle
    pub fn open_count(&self) -> usize {
        self.handle().opens.load(Ordering::SeqCst)
    }

    /// Number of `close` calls on the current handle
    pub fn close_count(&self) -> usize {
        self.handle().closes.load(Ordering::SeqCst)
    }

    /// Number of `release` calls on the current handle
    pub fn release_count(&self) -> usize {
        self.handle().releases.load(Ordering::SeqCst)
    }

    /// Number of listeners attached to the current handle
    pub fn listener_count(&self) -> usize {
        self.handle().listeners.len()
    }

    /// Options passed to the most recent `open`
    pub fn last_options(&self) -> Option<DriverOptions> {
        *self.handle().last_options.lock()
    }

    /// Connection string passed to the most recent `open`
    pub fn last_connection_string(&self) -> Option<String> {
        self.handle().last_uri.lock().clone()
    }
}

impl Driver for MemoryDriver {
    fn connection(&self) -> Arc<dyn DriverConnection> {
        self.handle()
    }
}

/// Connection handle owned by [`MemoryDriver`]
#[derive(Debug)]
pub struct MemoryConnection {
    id: ConnectionId,
    state: Mutex<ReadyState>,
    listeners: ListenerSet,
    opens: AtomicUsize,
    closes: AtomicUsize,
    releases: AtomicUsize,
    fail_next_open: Mutex<Option<String>>,
    fail_next_close: Mutex<Option<String>>,
    fail_listeners: AtomicBool,
    hold_open: AtomicBool,
    open_gate: Notify,
    last_options: Mutex<Option<DriverOptions>>,
    last_uri: Mutex<Option<String>>,
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self {
            id: ConnectionId::next(),
            state: Mutex::new(ReadyState::Disconnected),
            listeners: ListenerSet::new(),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            fail_next_open: Mutex::new(None),
            fail_next_close: Mutex::new(None),
            fail_listeners: AtomicBool::new(false),
            hold_open: AtomicBool::new(false),
            open_gate: Notify::new(),
            last_options: Mutex::new(None),
            last_uri: Mutex::new(None),
        }
    }
}

impl MemoryConnection {
    fn transition(&self, next: ReadyState) -> Result<()> {
        self.state.lock().transition(next)
    }

    fn emit(&self, event: LifecycleEvent) {
        {
            let mut state = self.state.lock();
            match event {
                LifecycleEvent::Connected | LifecycleEvent::Reconnected => {
                    *state = ReadyState::Connected
                }
                LifecycleEvent::Disconnected | LifecycleEvent::ReconnectFailed => {
                    *state = ReadyState::Disconnected
                }
                LifecycleEvent::Error(_) => {}
            }
        }
        self.listeners.dispatch(&event);
    }
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    async fn open(&self, info: &ConnectionInfo, options: &DriverOptions) -> Result<()> {
        self.transition(ReadyState::Connecting)?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(*options);
        *self.last_uri.lock() = Some(info.uri().to_string());

        if self.hold_open.load(Ordering::SeqCst) {
            self.open_gate.notified().await;
        }

        let failure = self.fail_next_open.lock().take();
        if let Some(message) = failure {
            self.transition(ReadyState::Disconnected)?;
            return Err(Error::Driver(message));
        }

        self.transition(ReadyState::Connected)?;
        self.listeners.dispatch(&LifecycleEvent::Connected);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);

        let failure = self.fail_next_close.lock().take();
        if let Some(message) = failure {
            return Err(Error::Driver(message));
        }

        match self.ready_state() {
            ReadyState::Disconnected => return Ok(()),
            ReadyState::Connecting => self.transition(ReadyState::Disconnected)?,
            _ => {
                self.transition(ReadyState::Disconnecting)?;
                tokio::task::yield_now().await;
                self.transition(ReadyState::Disconnected)?;
            }
        }
        self.listeners.dispatch(&LifecycleEvent::Disconnected);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn LifecycleListener>) -> Result<()> {
        if self.fail_listeners.load(Ordering::SeqCst) {
            return Err(Error::Listener("connection refused listener".into()));
        }
        self.listeners.add(listener);
        Ok(())
    }
}
