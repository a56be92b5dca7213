//! Metric names and label keys

/// Connect calls that reached the readiness check
pub const CONNECT_ATTEMPTS: &str = "mongo_harakiri_connect_attempts_total";
/// Connect calls that reused an existing connection
pub const CONNECT_REUSED: &str = "mongo_harakiri_connect_reused_total";
/// Connect calls that opened a fresh connection
pub const CONNECT_OPENED: &str = "mongo_harakiri_connect_opened_total";
/// Connect calls that failed
pub const CONNECT_FAILED: &str = "mongo_harakiri_connect_failed_total";
/// Disconnect calls that closed a connection
pub const DISCONNECTS: &str = "mongo_harakiri_disconnects_total";
/// Lifecycle events observed
pub const LIFECYCLE_EVENTS: &str = "mongo_harakiri_lifecycle_events_total";
/// Fatal conditions handed to the failure policy
pub const FATAL_CONDITIONS: &str = "mongo_harakiri_fatal_conditions_total";

/// Label key: readiness state
pub const STATE: &str = "state";
/// Label key: lifecycle event name
pub const EVENT: &str = "event";
/// Label key: failure reason
pub const REASON: &str = "reason";
/// Label key: policy action
pub const ACTION: &str = "action";

/// Policy action: process exit
pub const ACTION_TERMINATE: &str = "terminate";
/// Policy action: log only
pub const ACTION_LOG_ONLY: &str = "log_only";
/// Policy action: custom handler
pub const ACTION_CUSTOM: &str = "custom";
