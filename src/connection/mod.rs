//! Connection lifecycle building blocks
//!
//! This module handles:
//! * Readiness state machine
//! * Option defaults, merging and the driver-facing subset
//! * Lifecycle events and listeners
//! * Failure policy for fatal conditions

mod event;
mod options;
mod policy;
mod state;

pub use event::{LifecycleEvent, LifecycleListener};
pub use options::{
    ConnectOptions, ConnectOverrides, DriverOptions, SslMode, DEPLOYMENT_ENV_VAR,
    DEVELOPMENT_MARKER,
};
pub use policy::{FailurePolicy, Fatal, FatalHandler, FatalReason};
pub use state::ReadyState;
