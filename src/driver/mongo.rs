//! Adapter for the official `mongodb` driver
//!
//! The Rust driver has no connection-level events, so readiness is derived from
//! server heartbeats (SDAM monitoring):
//! * the first successful `ping` after opening emits `Connected`
//! * a failed heartbeat while connected emits `Disconnected`
//! * a successful heartbeat after that emits `Reconnected`
//! * a heartbeat the server answers with an authentication or command error
//!   emits `Error`
//!
//! The driver keeps retrying on its own; this adapter only reports what it sees.
//! It never emits `ReconnectFailed`, since the driver has no retry limit.

use super::{ConnectionId, Driver, DriverConnection, ListenerSet};
use crate::client::ConnectionInfo;
use crate::connection::{DriverOptions, LifecycleEvent, LifecycleListener, ReadyState};
use crate::{Error, Result};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::event::sdam::SdamEvent;
use mongodb::event::EventHandler;
use mongodb::options::{ClientOptions, Tls, TlsOptions};
use mongodb::Client;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn driver_error(e: mongodb::error::Error) -> Error {
    Error::Driver(e.to_string())
}

/// Driver backed by `mongodb::Client`
#[derive(Clone)]
pub struct MongoDriver {
    connection: Arc<MongoConnection>,
}

impl MongoDriver {
    /// Create a driver with a closed connection handle
    pub fn new() -> Self {
        Self {
            connection: Arc::new(MongoConnection::new()),
        }
    }

    /// The live client, if the connection has been opened
    pub async fn client(&self) -> Option<Client> {
        self.connection.client.lock().await.clone()
    }
}

impl Default for MongoDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MongoDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDriver")
            .field("connection", &self.connection.id)
            .field("state", &*self.connection.state.lock())
            .finish()
    }
}

impl Driver for MongoDriver {
    fn connection(&self) -> Arc<dyn DriverConnection> {
        self.connection.clone()
    }
}

struct MongoConnection {
    id: ConnectionId,
    state: Arc<Mutex<ReadyState>>,
    listeners: Arc<ListenerSet>,
    client: tokio::sync::Mutex<Option<Client>>,
    // Flag of the currently open client; cleared so a retired client's
    // heartbeats are ignored
    live: Mutex<Arc<AtomicBool>>,
}

impl MongoConnection {
    fn new() -> Self {
        Self {
            id: ConnectionId::next(),
            state: Arc::new(Mutex::new(ReadyState::Disconnected)),
            listeners: Arc::new(ListenerSet::new()),
            client: tokio::sync::Mutex::new(None),
            live: Mutex::new(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Heartbeat monitor for a new client; retires the previous one
    fn monitor(&self) -> HeartbeatMonitor {
        let live = Arc::new(AtomicBool::new(true));
        let _state = self.state.lock();
        let retired = std::mem::replace(&mut *self.live.lock(), live.clone());
        retired.store(false, Ordering::SeqCst);
        HeartbeatMonitor {
            live,
            state: self.state.clone(),
            listeners: self.listeners.clone(),
        }
    }

    fn retire_monitor(&self) {
        // Under the state lock so no heartbeat is mid-transition
        let _state = self.state.lock();
        self.live.lock().store(false, Ordering::SeqCst);
    }

    async fn establish(&self, info: &ConnectionInfo, options: &DriverOptions) -> Result<Client> {
        let mut client_options = ClientOptions::parse(info.uri()).await.map_err(driver_error)?;

        client_options.tls = Some(if options.ssl {
            let mut tls = TlsOptions::default();
            tls.allow_invalid_certificates = Some(!options.ssl_validate);
            Tls::Enabled(tls)
        } else {
            Tls::Disabled
        });
        if !options.use_new_url_parser {
            tracing::debug!("legacy URL parser requested; mongodb driver always uses the standard parser");
        }

        let monitor = self.monitor();
        client_options.sdam_event_handler =
            Some(EventHandler::callback(move |event: SdamEvent| monitor.observe(event)));

        let client = Client::with_options(client_options).map_err(driver_error)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(driver_error)?;
        Ok(client)
    }
}

#[async_trait]
impl DriverConnection for MongoConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    async fn open(&self, info: &ConnectionInfo, options: &DriverOptions) -> Result<()> {
        self.state.lock().transition(ReadyState::Connecting)?;

        // A client left behind by a dropped connection is replaced
        let stale = self.client.lock().await.take();
        if let Some(stale) = stale {
            self.retire_monitor();
            stale.shutdown().await;
        }

        match self.establish(info, options).await {
            Ok(client) => {
                *self.client.lock().await = Some(client);
                self.state.lock().transition(ReadyState::Connected)?;
                tracing::info!(hosts = %info.hosts_display(), sslmode = %options.ssl_mode(), "mongodb client ready");
                self.listeners.dispatch(&LifecycleEvent::Connected);
                Ok(())
            }
            Err(e) => {
                self.retire_monitor();
                *self.state.lock() = ReadyState::Disconnected;
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        let Some(client) = client else {
            *self.state.lock() = ReadyState::Disconnected;
            return Ok(());
        };

        {
            let mut state = self.state.lock();
            if *state == ReadyState::Connected {
                state.transition(ReadyState::Disconnecting)?;
            }
        }
        self.retire_monitor();
        client.shutdown().await;

        *self.state.lock() = ReadyState::Disconnected;
        self.listeners.dispatch(&LifecycleEvent::Disconnected);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.retire_monitor();
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            tracing::debug!(connection = %self.id, "shutting down client left by a dropped connection");
            client.shutdown().await;
        }
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn LifecycleListener>) -> Result<()> {
        self.listeners.add(listener);
        Ok(())
    }
}

/// Heartbeat outcome reduced from an SDAM event
#[derive(Debug, Clone, PartialEq, Eq)]
enum Heartbeat {
    Succeeded,
    Failed(String),
    /// The server answered but refused the monitor
    Rejected(String),
}

struct HeartbeatMonitor {
    live: Arc<AtomicBool>,
    state: Arc<Mutex<ReadyState>>,
    listeners: Arc<ListenerSet>,
}

impl HeartbeatMonitor {
    fn observe(&self, event: SdamEvent) {
        let heartbeat = match event {
            SdamEvent::ServerHeartbeatSucceeded(_) => Heartbeat::Succeeded,
            SdamEvent::ServerHeartbeatFailed(event) => match event.failure.kind.as_ref() {
                ErrorKind::Authentication { .. } | ErrorKind::Command(_) => {
                    Heartbeat::Rejected(event.failure.to_string())
                }
                _ => Heartbeat::Failed(event.failure.to_string()),
            },
            _ => return,
        };
        self.on_heartbeat(heartbeat);
    }

    fn on_heartbeat(&self, heartbeat: Heartbeat) {
        let event = {
            let mut state = self.state.lock();
            if !self.live.load(Ordering::SeqCst) {
                return;
            }
            match (*state, heartbeat) {
                (ReadyState::Connected, Heartbeat::Failed(cause)) => {
                    tracing::debug!(%cause, "heartbeat failed");
                    *state = ReadyState::Disconnected;
                    LifecycleEvent::Disconnected
                }
                (ReadyState::Disconnected, Heartbeat::Succeeded) => {
                    *state = ReadyState::Connected;
                    LifecycleEvent::Reconnected
                }
                (ReadyState::Connected | ReadyState::Disconnected, Heartbeat::Rejected(cause)) => {
                    LifecycleEvent::Error(cause)
                }
                _ => return,
            }
        };
        self.listeners.dispatch(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Mutex<Vec<LifecycleEvent>>);

    impl LifecycleListener for Recorder {
        fn on_event(&self, event: &LifecycleEvent) {
            self.0.lock().push(event.clone());
        }
    }

    fn monitor(initial: ReadyState) -> (HeartbeatMonitor, Arc<Recorder>) {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let listeners = Arc::new(ListenerSet::new());
        listeners.add(recorder.clone());
        let monitor = HeartbeatMonitor {
            live: Arc::new(AtomicBool::new(true)),
            state: Arc::new(Mutex::new(initial)),
            listeners,
        };
        (monitor, recorder)
    }

    #[test]
    fn test_drop_and_recover() {
        let (monitor, recorder) = monitor(ReadyState::Connected);

        monitor.on_heartbeat(Heartbeat::Succeeded);
        monitor.on_heartbeat(Heartbeat::Failed("timeout".into()));
        monitor.on_heartbeat(Heartbeat::Failed("timeout".into()));
        monitor.on_heartbeat(Heartbeat::Succeeded);

        assert_eq!(
            *recorder.0.lock(),
            vec![LifecycleEvent::Disconnected, LifecycleEvent::Reconnected]
        );
        assert_eq!(*monitor.state.lock(), ReadyState::Connected);
    }

    #[test]
    fn test_heartbeats_ignored_while_connecting() {
        let (monitor, recorder) = monitor(ReadyState::Connecting);
        monitor.on_heartbeat(Heartbeat::Failed("refused".into()));
        monitor.on_heartbeat(Heartbeat::Succeeded);
        assert!(recorder.0.lock().is_empty());
        assert_eq!(*monitor.state.lock(), ReadyState::Connecting);
    }

    #[test]
    fn test_retired_monitor_is_silent() {
        let (monitor, recorder) = monitor(ReadyState::Connected);
        monitor.live.store(false, Ordering::SeqCst);
        monitor.on_heartbeat(Heartbeat::Failed("gone".into()));
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn test_rejected_heartbeat_reports_error() {
        let (connected, recorder) = monitor(ReadyState::Connected);
        connected.on_heartbeat(Heartbeat::Rejected("authentication failed".into()));
        assert_eq!(
            *recorder.0.lock(),
            vec![LifecycleEvent::Error("authentication failed".into())]
        );
        assert_eq!(*connected.state.lock(), ReadyState::Connected);

        let (connecting, recorder) = monitor(ReadyState::Connecting);
        connecting.on_heartbeat(Heartbeat::Rejected("authentication failed".into()));
        assert!(recorder.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_release_after_drop_blocks_reconnect() {
        let conn = MongoConnection::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        conn.listeners.add(recorder.clone());
        *conn.state.lock() = ReadyState::Connected;
        let monitor = conn.monitor();

        monitor.on_heartbeat(Heartbeat::Failed("timeout".into()));
        conn.release().await.unwrap();
        monitor.on_heartbeat(Heartbeat::Succeeded);

        assert_eq!(*recorder.0.lock(), vec![LifecycleEvent::Disconnected]);
        assert_eq!(conn.ready_state(), ReadyState::Disconnected);
    }

    #[test]
    fn test_new_driver_is_closed() {
        let driver = MongoDriver::new();
        assert_eq!(driver.connection().ready_state(), ReadyState::Disconnected);
    }
}
