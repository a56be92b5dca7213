//! mongo-harakiri: fail-fast lifecycle manager for a single shared MongoDB connection
//!
//! A [`ConnectionManager`] owns the process's one database connection. It
//! connects idempotently, merges per-call option overrides onto defaults,
//! watches lifecycle events from the driver and fails loudly when the
//! connection breaks: by default, the process exits.
//!
//! # Features
//!
//! * Idempotent `connect`: an open, opening or closing connection is reused
//! * Lifecycle listeners bound exactly once per driver connection handle
//! * Pluggable [`Logger`] with a `tracing`-backed default
//! * Configurable [`FailurePolicy`] (exit, log only, or a custom handler)
//! * `mongodb` feature: adapter for the official MongoDB driver
//!
//! # Example
//!
//! ```ignore
//! use mongo_harakiri::{ConnectOverrides, ConnectionManager, MongoDriver};
//!
//! let manager = ConnectionManager::new(MongoDriver::new());
//! manager
//!     .connect(
//!         "mongodb://localhost:27017/app",
//!         ConnectOverrides::new().ssl(false).kill_process_on_disconnect(true),
//!     )
//!     .await?;
//!
//! // ... use the driver ...
//!
//! manager.disconnect().await?;
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod connection;
pub mod driver;
pub mod error;
pub mod logger;
pub mod metrics;

pub use client::{ConnectOutcome, ConnectionInfo, ConnectionManager, ConnectionManagerBuilder};
pub use connection::{
    ConnectOptions, ConnectOverrides, DriverOptions, FailurePolicy, Fatal, FatalReason,
    LifecycleEvent, LifecycleListener, ReadyState,
};
pub use driver::{ConnectionId, Driver, DriverConnection, MemoryDriver};
#[cfg(feature = "mongodb")]
pub use driver::MongoDriver;
pub use error::{Error, Result};
pub use logger::{CallbackLogger, Logger, TracingLogger};
