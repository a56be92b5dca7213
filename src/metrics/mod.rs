//! Metrics for connection lifecycle observability
//!
//! Counters are recorded through the `metrics` facade. Nothing is exported
//! unless the application installs a recorder.

pub mod counters;
pub mod labels;
