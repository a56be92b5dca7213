//! What happens when the connection hits a fatal condition
//!
//! The manager never recovers from these itself. Recovery belongs to the
//! driver's own reconnection logic; the manager only decides how loudly to fail.

use crate::logger::Logger;
use std::fmt;
use std::sync::Arc;

/// Why a fatal condition was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalReason {
    /// The initial connection could not be opened
    ConnectFailed,
    /// Lifecycle listeners could not be attached
    ListenerRegistration,
    /// The driver reported an error event
    ConnectionError,
    /// The driver exhausted its reconnection attempts
    ReconnectFailed,
    /// The connection dropped and `kill_process_on_disconnect` is set
    Disconnected,
}

impl FatalReason {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectFailed => "connect_failed",
            Self::ListenerRegistration => "listener_registration",
            Self::ConnectionError => "connection_error",
            Self::ReconnectFailed => "reconnect_failed",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal condition handed to the [`FailurePolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal {
    /// Why
    pub reason: FatalReason,
    /// Underlying error message, if any
    pub detail: Option<String>,
}

impl Fatal {
    /// Create a fatal condition
    pub fn new(reason: FatalReason, detail: Option<String>) -> Self {
        Self { reason, detail }
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.reason, detail),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Callback type for [`FailurePolicy::Custom`]
pub type FatalHandler = Arc<dyn Fn(&Fatal) + Send + Sync>;

/// Action taken on a fatal condition
#[derive(Clone)]
pub enum FailurePolicy {
    /// Exit the process with the given status
    Terminate {
        /// Process exit status
        exit_code: i32,
    },
    /// Log and carry on
    LogOnly,
    /// Hand the condition to a callback
    Custom(FatalHandler),
}

impl FailurePolicy {
    /// Wrap a callback
    pub fn custom(handler: impl Fn(&Fatal) + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(handler))
    }

    /// Whether applying this policy ends the process
    pub fn terminates(&self) -> bool {
        matches!(self, Self::Terminate { .. })
    }

    /// Carry out the policy, reporting through `logger`
    pub fn apply(&self, fatal: &Fatal, logger: &dyn Logger) {
        crate::metrics::counters::fatal_condition(fatal.reason.as_str(), self.label());

        match self {
            Self::Terminate { exit_code } => {
                logger.error(&format!(
                    "terminating process with status {} ({})",
                    exit_code, fatal
                ));
                std::process::exit(*exit_code);
            }
            Self::LogOnly => {
                logger.warn(&format!("fatal condition ignored by policy ({})", fatal));
            }
            Self::Custom(handler) => handler(fatal),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Terminate { .. } => crate::metrics::labels::ACTION_TERMINATE,
            Self::LogOnly => crate::metrics::labels::ACTION_LOG_ONLY,
            Self::Custom(_) => crate::metrics::labels::ACTION_CUSTOM,
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Terminate { exit_code: 1 }
    }
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate { exit_code } => f
                .debug_struct("Terminate")
                .field("exit_code", exit_code)
                .finish(),
            Self::LogOnly => f.write_str("LogOnly"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{CallbackLogger, TracingLogger};
    use parking_lot::Mutex;

    #[test]
    fn test_default_terminates_with_status_one() {
        let policy = FailurePolicy::default();
        assert!(policy.terminates());
        assert!(matches!(policy, FailurePolicy::Terminate { exit_code: 1 }));
    }

    #[test]
    fn test_custom_receives_fatal() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let policy = FailurePolicy::custom(move |fatal| sink.lock().push(fatal.clone()));
        assert!(!policy.terminates());

        policy.apply(
            &Fatal::new(FatalReason::ConnectionError, Some("socket reset".into())),
            &TracingLogger,
        );

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].reason, FatalReason::ConnectionError);
        assert_eq!(seen[0].to_string(), "connection_error: socket reset");
    }

    #[test]
    fn test_log_only_warns_through_logger() {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let sink = warnings.clone();
        let noop = |_: &str| {};
        let logger = CallbackLogger::builder()
            .log(noop)
            .info(noop)
            .debug(noop)
            .error(noop)
            .warn(move |m| sink.lock().push(m.to_string()))
            .build()
            .unwrap();

        FailurePolicy::LogOnly.apply(&Fatal::new(FatalReason::Disconnected, None), &logger);

        assert_eq!(
            *warnings.lock(),
            vec!["fatal condition ignored by policy (disconnected)".to_string()]
        );
    }

    #[test]
    fn test_debug_hides_callback() {
        let policy = FailurePolicy::custom(|_| {});
        assert_eq!(format!("{:?}", policy), "Custom(..)");
    }
}
