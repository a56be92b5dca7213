//! Pluggable logging facade
//!
//! Lifecycle and diagnostic messages go through a [`Logger`]. Implementing the
//! trait is checked by the compiler; [`CallbackLogger`] covers loggers assembled
//! at runtime from individual functions and checks the same capability set
//! when it is built.

use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// Names of the operations every logger must provide
pub const REQUIRED_CAPABILITIES: [&str; 5] = ["log", "warn", "info", "debug", "error"];

/// Sink for lifecycle and diagnostic messages
pub trait Logger: Send + Sync {
    /// Generic message
    fn log(&self, message: &str);
    /// Warning
    fn warn(&self, message: &str);
    /// Informational message
    fn info(&self, message: &str);
    /// Debug detail
    fn debug(&self, message: &str);
    /// Error
    fn error(&self, message: &str);
}

/// Default logger, forwards to `tracing` under the `mongo_harakiri` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "mongo_harakiri", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "mongo_harakiri", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "mongo_harakiri", "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "mongo_harakiri", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "mongo_harakiri", "{}", message);
    }
}

/// One logging operation
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Logger made of five independent functions
///
/// # Examples
///
/// ```ignore
/// let logger = CallbackLogger::builder()
///     .log(|m| println!("{m}"))
///     .warn(|m| eprintln!("{m}"))
///     .info(|m| println!("{m}"))
///     .debug(|_| {})
///     .error(|m| eprintln!("{m}"))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct CallbackLogger {
    log: LogFn,
    warn: LogFn,
    info: LogFn,
    debug: LogFn,
    error: LogFn,
}

impl CallbackLogger {
    /// Start assembling a logger
    pub fn builder() -> CallbackLoggerBuilder {
        CallbackLoggerBuilder::default()
    }
}

impl Logger for CallbackLogger {
    fn log(&self, message: &str) {
        (self.log)(message)
    }

    fn warn(&self, message: &str) {
        (self.warn)(message)
    }

    fn info(&self, message: &str) {
        (self.info)(message)
    }

    fn debug(&self, message: &str) {
        (self.debug)(message)
    }

    fn error(&self, message: &str) {
        (self.error)(message)
    }
}

impl fmt::Debug for CallbackLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackLogger").finish_non_exhaustive()
    }
}

/// Builder for [`CallbackLogger`]
#[derive(Clone, Default)]
pub struct CallbackLoggerBuilder {
    log: Option<LogFn>,
    warn: Option<LogFn>,
    info: Option<LogFn>,
    debug: Option<LogFn>,
    error: Option<LogFn>,
}

impl CallbackLoggerBuilder {
    /// Set the generic `log` operation
    pub fn log(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.log = Some(Arc::new(f));
        self
    }

    /// Set the `warn` operation
    pub fn warn(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.warn = Some(Arc::new(f));
        self
    }

    /// Set the `info` operation
    pub fn info(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.info = Some(Arc::new(f));
        self
    }

    /// Set the `debug` operation
    pub fn debug(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.debug = Some(Arc::new(f));
        self
    }

    /// Set the `error` operation
    pub fn error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Names of the operations still unset
    pub fn missing(&self) -> Vec<&'static str> {
        let slots = [&self.log, &self.warn, &self.info, &self.debug, &self.error];
        REQUIRED_CAPABILITIES
            .iter()
            .zip(slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Build the logger
    ///
    /// Fails with [`Error::Config`] naming every unset operation and the full
    /// required set.
    pub fn build(self) -> Result<CallbackLogger> {
        match (self.log, self.warn, self.info, self.debug, self.error) {
            (Some(log), Some(warn), Some(info), Some(debug), Some(error)) => Ok(CallbackLogger {
                log,
                warn,
                info,
                debug,
                error,
            }),
            (log, warn, info, debug, error) => {
                let missing = CallbackLoggerBuilder {
                    log,
                    warn,
                    info,
                    debug,
                    error,
                }
                .missing();
                Err(Error::Config(format!(
                    "logger is missing {}; loggers must provide functions called {}",
                    missing.join(", "),
                    REQUIRED_CAPABILITIES.join(", ")
                )))
            }
        }
    }
}

impl fmt::Debug for CallbackLoggerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackLoggerBuilder")
            .field("missing", &self.missing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn noop(_: &str) {}

    #[test]
    fn test_build_complete_logger() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = CallbackLogger::builder()
            .log(noop)
            .warn(noop)
            .info(move |m| sink.lock().push(m.to_string()))
            .debug(noop)
            .error(noop)
            .build()
            .unwrap();

        logger.info("hello");
        logger.debug("ignored");
        assert_eq!(*lines.lock(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_each_missing_capability_is_rejected() {
        for skip in REQUIRED_CAPABILITIES {
            let mut builder = CallbackLogger::builder();
            for name in REQUIRED_CAPABILITIES.iter().filter(|n| **n != skip) {
                builder = match *name {
                    "log" => builder.log(noop),
                    "warn" => builder.warn(noop),
                    "info" => builder.info(noop),
                    "debug" => builder.debug(noop),
                    _ => builder.error(noop),
                };
            }
            assert_eq!(builder.missing(), vec![skip]);

            let err = builder.build().unwrap_err();
            let message = err.to_string();
            assert!(matches!(err, Error::Config(_)));
            assert!(message.contains(&format!("missing {};", skip)), "{}", message);
            assert!(message.contains("log, warn, info, debug, error"), "{}", message);
        }
    }

    #[test]
    fn test_empty_builder_reports_all() {
        let builder = CallbackLogger::builder();
        assert_eq!(builder.missing(), REQUIRED_CAPABILITIES.to_vec());
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_tracing_logger_does_not_panic_without_subscriber() {
        let logger = TracingLogger;
        logger.log("log");
        logger.warn("warn");
        logger.info("info");
        logger.debug("debug");
        logger.error("error");
    }
}
