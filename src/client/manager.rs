//! ConnectionManager implementation

use super::connection_string::ConnectionInfo;
use super::listeners;
use crate::connection::{
    ConnectOptions, ConnectOverrides, FailurePolicy, Fatal, FatalReason, ReadyState,
};
use crate::driver::{ConnectionId, Driver, DriverConnection};
use crate::logger::{CallbackLoggerBuilder, Logger, TracingLogger};
use crate::metrics::counters;
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;

/// State shared between the manager and the listeners it registers
pub(crate) struct ManagerState {
    driver: Arc<dyn Driver>,
    defaults: ConnectOptions,
    policy: FailurePolicy,
    logger: RwLock<Arc<dyn Logger>>,
    active: RwLock<Option<ConnectOptions>>,
    closing: AtomicBool,
    pub(crate) bound: Mutex<HashSet<ConnectionId>>,
    // Serializes connect/disconnect check-then-act sequences
    in_flight: tokio::sync::Mutex<()>,
}

impl ManagerState {
    pub(crate) fn logger(&self) -> Arc<dyn Logger> {
        self.logger.read().clone()
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub(crate) fn kill_process_on_disconnect(&self) -> bool {
        self.active
            .read()
            .as_ref()
            .map(|options| options.kill_process_on_disconnect)
            .unwrap_or(false)
    }

    pub(crate) fn raise(&self, reason: FatalReason, detail: Option<String>) {
        let logger = self.logger();
        self.policy.apply(&Fatal::new(reason, detail), &*logger);
    }

    /// Log a fatal connect-path error, apply the policy, hand the error back
    fn fail(&self, reason: FatalReason, context: &str, error: Error) -> Error {
        counters::connect_failed(reason.as_str());
        let logger = self.logger();
        logger.error(context);
        logger.error(&error.to_string());
        self.raise(reason, Some(error.to_string()));
        error
    }
}

/// Resets the closing flag when `disconnect` finishes or is dropped
struct ClosingGuard<'a>(&'a AtomicBool);

impl<'a> ClosingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ClosingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Result of a `connect` call
#[derive(Clone)]
pub enum ConnectOutcome {
    /// A new connection was opened
    Opened(Arc<dyn DriverConnection>),
    /// The connection was already open or opening; nothing new was created
    Reused(Arc<dyn DriverConnection>),
}

impl ConnectOutcome {
    /// Whether this call opened a new connection
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Opened(_))
    }

    /// The driver connection handle
    pub fn connection(&self) -> &Arc<dyn DriverConnection> {
        match self {
            Self::Opened(conn) | Self::Reused(conn) => conn,
        }
    }
}

impl std::fmt::Debug for ConnectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, conn) = match self {
            Self::Opened(conn) => ("Opened", conn),
            Self::Reused(conn) => ("Reused", conn),
        };
        f.debug_tuple(kind).field(&conn.id()).finish()
    }
}

/// Owner of the single shared database connection
///
/// Construct one per process and pass it (or clones of it, which share state)
/// to every call site.
///
/// # Examples
///
/// ```ignore
/// use mongo_harakiri::{ConnectOverrides, ConnectionManager, MemoryDriver};
///
/// let manager = ConnectionManager::new(MemoryDriver::new());
/// let outcome = manager
///     .connect("mongodb://localhost:27017/test", ConnectOverrides::new().ssl(false))
///     .await?;
/// assert!(outcome.is_new());
///
/// manager.disconnect().await?;
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerState>,
}

impl ConnectionManager {
    /// Manager with environment defaults, the tracing logger and the
    /// terminate-on-fatal policy
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self::builder(driver).build()
    }

    /// Create a builder
    pub fn builder(driver: impl Driver + 'static) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder {
            driver: Arc::new(driver),
            defaults: None,
            logger: None,
            policy: FailurePolicy::default(),
        }
    }

    /// Connect unless a connection is already open, opening or closing
    ///
    /// The merged options replace the active configuration even when no new
    /// connection results. Failing to parse the connection string, to attach
    /// listeners or to open the connection is fatal: the failure policy runs,
    /// and if it returns, the error is handed back.
    pub async fn connect(
        &self,
        connection_string: &str,
        overrides: ConnectOverrides,
    ) -> Result<ConnectOutcome> {
        let state = &self.inner;
        let _in_flight = state.in_flight.lock().await;
        let logger = state.logger();

        let options = state.defaults.merge(&overrides);
        *state.active.write() = Some(options.clone());
        let rendered = options
            .to_json()
            .unwrap_or_else(|_| format!("{:?}", options));
        logger.info(&format!("connecting with these options: {}", rendered));

        counters::connect_attempted();
        let conn = state.driver.connection();
        let ready = conn.ready_state();
        if !ready.is_closed() {
            logger.debug(&format!("connection is already {}", ready));
            counters::connect_reused(ready.as_str());
            return Ok(ConnectOutcome::Reused(conn));
        }

        let info = ConnectionInfo::parse(connection_string).map_err(|e| {
            state.fail(
                FatalReason::ConnectFailed,
                "failed connecting to the database!",
                e,
            )
        })?;
        let driver_options = options.driver_options();

        async {
            let opening = conn.open(&info, &driver_options);

            listeners::bind(state, &conn).map_err(|e| {
                state.fail(
                    FatalReason::ListenerRegistration,
                    "could not apply listeners!",
                    e,
                )
            })?;

            opening.await.map_err(|e| {
                state.fail(
                    FatalReason::ConnectFailed,
                    "failed connecting to the database!",
                    e,
                )
            })?;

            counters::connect_opened();
            Ok::<_, Error>(ConnectOutcome::Opened(conn.clone()))
        }
        .instrument(tracing::info_span!(
            "connect",
            uri = %info.redacted(),
            connection = %conn.id(),
            sslmode = %driver_options.ssl_mode()
        ))
        .await
    }

    /// Close the connection
    ///
    /// When the connection is already closed nothing is closed, but the driver
    /// is told to release whatever it kept from the dropped connection. Driver
    /// failures are returned to the caller.
    pub async fn disconnect(&self) -> Result<()> {
        let state = &self.inner;
        let _in_flight = state.in_flight.lock().await;
        let logger = state.logger();

        logger.debug("disconnecting...");
        let conn = state.driver.connection();
        if conn.ready_state().is_closed() {
            logger.info("connection is already closed");
            // The driver may still hold a client from a connection that dropped
            return conn.release().await;
        }

        let _closing = ClosingGuard::set(&state.closing);
        conn.close()
            .instrument(tracing::debug_span!("disconnect", connection = %conn.id()))
            .await?;
        counters::disconnected();
        Ok(())
    }

    /// Replace the logger used from now on
    pub fn set_logger(&self, logger: impl Logger + 'static) {
        self.set_shared_logger(Arc::new(logger));
    }

    /// Replace the logger with one already behind an `Arc`
    pub fn set_shared_logger(&self, logger: Arc<dyn Logger>) {
        *self.inner.logger.write() = logger;
    }

    /// Validate a runtime-assembled logger and install it
    ///
    /// On failure the current logger stays in place.
    pub fn set_callback_logger(&self, candidate: CallbackLoggerBuilder) -> Result<()> {
        let logger = candidate.build()?;
        self.set_logger(logger);
        Ok(())
    }

    /// Readiness of the driver's connection handle
    pub fn ready_state(&self) -> ReadyState {
        self.inner.driver.connection().ready_state()
    }

    /// The driver's connection handle
    pub fn connection(&self) -> Arc<dyn DriverConnection> {
        self.inner.driver.connection()
    }

    /// Options merged by the most recent `connect` call
    pub fn active_options(&self) -> Option<ConnectOptions> {
        self.inner.active.read().clone()
    }

    /// Defaults that overrides are merged onto
    pub fn defaults(&self) -> &ConnectOptions {
        &self.inner.defaults
    }

    /// Policy applied to fatal conditions
    pub fn failure_policy(&self) -> &FailurePolicy {
        &self.inner.policy
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("ready_state", &self.ready_state())
            .field("defaults", &self.inner.defaults)
            .field("active", &self.active_options())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

/// Builder for [`ConnectionManager`]
pub struct ConnectionManagerBuilder {
    driver: Arc<dyn Driver>,
    defaults: Option<ConnectOptions>,
    logger: Option<Arc<dyn Logger>>,
    policy: FailurePolicy,
}

impl ConnectionManagerBuilder {
    /// Set the defaults overrides are merged onto
    ///
    /// Default: [`ConnectOptions::from_env`]
    pub fn defaults(mut self, defaults: ConnectOptions) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Set the initial logger
    ///
    /// Default: [`TracingLogger`]
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Set the failure policy
    ///
    /// Default: terminate with exit status 1
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the manager
    pub fn build(self) -> ConnectionManager {
        ConnectionManager {
            inner: Arc::new(ManagerState {
                driver: self.driver,
                defaults: self.defaults.unwrap_or_else(ConnectOptions::from_env),
                policy: self.policy,
                logger: RwLock::new(self.logger.unwrap_or_else(|| Arc::new(TracingLogger))),
                active: RwLock::new(None),
                closing: AtomicBool::new(false),
                bound: Mutex::new(HashSet::new()),
                in_flight: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::LifecycleEvent;
    use crate::driver::MemoryDriver;
    use crate::logger::CallbackLogger;

    const URI: &str = "mongodb://localhost:27017/test";

    #[derive(Clone, Default)]
    struct Lines(Arc<Mutex<Vec<(&'static str, String)>>>);

    impl Lines {
        fn logger(&self) -> CallbackLogger {
            let sink = |level: &'static str, lines: &Lines| {
                let lines = lines.clone();
                move |m: &str| lines.0.lock().push((level, m.to_string()))
            };
            CallbackLogger::builder()
                .log(sink("log", self))
                .warn(sink("warn", self))
                .info(sink("info", self))
                .debug(sink("debug", self))
                .error(sink("error", self))
                .build()
                .unwrap()
        }

        fn contains(&self, level: &str, needle: &str) -> bool {
            self.0
                .lock()
                .iter()
                .any(|(l, m)| *l == level && m.contains(needle))
        }
    }

    fn manager(driver: &MemoryDriver) -> (ConnectionManager, Arc<Mutex<Vec<Fatal>>>) {
        let fatals = Arc::new(Mutex::new(Vec::new()));
        let sink = fatals.clone();
        let manager = ConnectionManager::builder(driver.clone())
            .defaults(ConnectOptions::default())
            .failure_policy(FailurePolicy::custom(move |f| sink.lock().push(f.clone())))
            .build();
        (manager, fatals)
    }

    #[tokio::test]
    async fn test_connect_opens_and_forwards_driver_options() {
        let driver = MemoryDriver::new();
        let (manager, fatals) = manager(&driver);

        let outcome = manager
            .connect(
                URI,
                ConnectOverrides::new()
                    .ssl(false)
                    .kill_process_on_disconnect(true),
            )
            .await
            .unwrap();

        assert!(outcome.is_new());
        assert_eq!(outcome.connection().id(), driver.connection_id());
        assert_eq!(manager.ready_state(), ReadyState::Connected);

        let forwarded = driver.last_options().unwrap();
        assert!(!forwarded.ssl);
        assert!(manager.active_options().unwrap().kill_process_on_disconnect);
        assert!(fatals.lock().is_empty());
    }

    #[tokio::test]
    async fn test_listeners_bound_once_per_handle() {
        let driver = MemoryDriver::new();
        let (manager, _) = manager(&driver);

        manager.connect(URI, ConnectOverrides::new()).await.unwrap();
        manager.disconnect().await.unwrap();
        manager.connect(URI, ConnectOverrides::new()).await.unwrap();
        assert_eq!(driver.open_count(), 2);
        assert_eq!(driver.listener_count(), 1);

        // a new handle gets its own handler
        manager.disconnect().await.unwrap();
        driver.rotate_connection();
        manager.connect(URI, ConnectOverrides::new()).await.unwrap();
        assert_eq!(driver.listener_count(), 1);
        assert_eq!(manager.inner.bound.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_reuse_still_replaces_active_options() {
        let driver = MemoryDriver::new();
        let (manager, _) = manager(&driver);

        manager.connect(URI, ConnectOverrides::new()).await.unwrap();
        let outcome = manager
            .connect(URI, ConnectOverrides::new().ssl_validate(true))
            .await
            .unwrap();

        assert!(!outcome.is_new());
        assert_eq!(driver.open_count(), 1);
        assert!(manager.active_options().unwrap().ssl_validate);
        // the driver kept the options of the connection that was actually opened
        assert!(!driver.last_options().unwrap().ssl_validate);
    }

    #[tokio::test]
    async fn test_connect_logs_options_and_reuse() {
        let driver = MemoryDriver::new();
        let (manager, _) = manager(&driver);
        let lines = Lines::default();
        manager.set_logger(lines.logger());

        manager
            .connect(URI, ConnectOverrides::new().ssl(false))
            .await
            .unwrap();
        manager.connect(URI, ConnectOverrides::new()).await.unwrap();

        assert!(lines.contains("info", "\"ssl\":false"));
        assert!(lines.contains("info", "successfully connected"));
        assert!(lines.contains("debug", "already connected"));
    }

    #[tokio::test]
    async fn test_invalid_connection_string_is_fatal() {
        let driver = MemoryDriver::new();
        let (manager, fatals) = manager(&driver);

        let err = manager
            .connect("localhost:27017", ConnectOverrides::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConnectionString(_)));
        assert_eq!(driver.open_count(), 0);
        assert_eq!(fatals.lock()[0].reason, FatalReason::ConnectFailed);
    }

    #[tokio::test]
    async fn test_closing_flag_suppresses_kill_on_own_disconnect() {
        let driver = MemoryDriver::new();
        let (manager, fatals) = manager(&driver);

        manager
            .connect(URI, ConnectOverrides::new().kill_process_on_disconnect(true))
            .await
            .unwrap();
        manager.disconnect().await.unwrap();

        assert!(fatals.lock().is_empty());
        assert!(!manager.inner.is_closing());
    }

    #[tokio::test]
    async fn test_handler_outlives_manager_quietly() {
        let driver = MemoryDriver::new();
        let (manager, fatals) = manager(&driver);
        manager.connect(URI, ConnectOverrides::new()).await.unwrap();
        drop(manager);

        driver.emit(LifecycleEvent::Error("late".into()));
        assert!(fatals.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_callback_logger_keeps_previous() {
        let driver = MemoryDriver::new();
        let (manager, _) = manager(&driver);
        let lines = Lines::default();
        manager.set_logger(lines.logger());

        let err = manager
            .set_callback_logger(CallbackLogger::builder().info(|_| {}))
            .unwrap_err();
        assert!(err.to_string().contains("log, warn, debug, error"));

        manager.disconnect().await.unwrap();
        assert!(lines.contains("info", "already closed"));
    }

    #[test]
    fn test_outcome_debug() {
        let driver = MemoryDriver::new();
        let outcome = ConnectOutcome::Reused(driver.connection());
        assert!(format!("{:?}", outcome).starts_with("Reused(ConnectionId("));
    }
}
