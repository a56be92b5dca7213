//! Connection options and their merge rules
//!
//! Every `connect` call builds a fresh [`ConnectOptions`] by laying the caller's
//! [`ConnectOverrides`] over the manager defaults, key by key. The manager-only
//! `kill_process_on_disconnect` flag is removed before anything reaches the
//! driver, see [`ConnectOptions::driver_options`].

use crate::Result;
use serde::{Deserialize, Serialize};

/// Environment variable holding the deployment mode
pub const DEPLOYMENT_ENV_VAR: &str = "APP_ENV";

/// Deployment mode value that turns TLS off by default
pub const DEVELOPMENT_MARKER: &str = "development";

/// Active configuration for the current or next connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    /// Use TLS for the transport
    pub ssl: bool,
    /// Validate the server certificate when TLS is on
    pub ssl_validate: bool,
    /// Use the driver's current connection-string parser
    pub use_new_url_parser: bool,
    /// Terminate the process when the connection drops unexpectedly
    pub kill_process_on_disconnect: bool,
}

impl ConnectOptions {
    /// Defaults for a given deployment mode
    ///
    /// TLS is on unless the mode is exactly [`DEVELOPMENT_MARKER`]. An unset mode
    /// keeps TLS on.
    ///
    /// # Defaults
    ///
    /// - `ssl`: `true` (`false` in development)
    /// - `ssl_validate`: `false`
    /// - `use_new_url_parser`: `true`
    /// - `kill_process_on_disconnect`: `false`
    pub fn for_deployment(mode: Option<&str>) -> Self {
        Self {
            ssl: mode != Some(DEVELOPMENT_MARKER),
            ssl_validate: false,
            use_new_url_parser: true,
            kill_process_on_disconnect: false,
        }
    }

    /// Defaults for the deployment mode named by [`DEPLOYMENT_ENV_VAR`]
    pub fn from_env() -> Self {
        let mode = std::env::var(DEPLOYMENT_ENV_VAR).ok();
        Self::for_deployment(mode.as_deref())
    }

    /// Lay `overrides` over these options; every key the caller set wins
    pub fn merge(&self, overrides: &ConnectOverrides) -> Self {
        Self {
            ssl: overrides.ssl.unwrap_or(self.ssl),
            ssl_validate: overrides.ssl_validate.unwrap_or(self.ssl_validate),
            use_new_url_parser: overrides
                .use_new_url_parser
                .unwrap_or(self.use_new_url_parser),
            kill_process_on_disconnect: overrides
                .kill_process_on_disconnect
                .unwrap_or(self.kill_process_on_disconnect),
        }
    }

    /// The subset handed to the driver
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            ssl: self.ssl,
            ssl_validate: self.ssl_validate,
            use_new_url_parser: self.use_new_url_parser,
        }
    }

    /// Render as JSON, using the same keys callers use for overrides
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::for_deployment(None)
    }
}

/// Caller-supplied overrides for a single `connect` call
///
/// Unset keys fall back to the manager defaults. Deserializing rejects keys
/// the manager does not recognize.
///
/// # Examples
///
/// ```ignore
/// let overrides = ConnectOverrides::new()
///     .ssl(false)
///     .kill_process_on_disconnect(true);
///
/// let overrides: ConnectOverrides =
///     serde_json::from_str(r#"{"ssl": false, "killProcessOnDisconnect": true}"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ssl_validate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    use_new_url_parser: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kill_process_on_disconnect: Option<bool>,
}

impl ConnectOverrides {
    /// No overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `ssl`
    pub fn ssl(mut self, enabled: bool) -> Self {
        self.ssl = Some(enabled);
        self
    }

    /// Override `sslValidate`
    pub fn ssl_validate(mut self, enabled: bool) -> Self {
        self.ssl_validate = Some(enabled);
        self
    }

    /// Override `useNewUrlParser`
    pub fn use_new_url_parser(mut self, enabled: bool) -> Self {
        self.use_new_url_parser = Some(enabled);
        self
    }

    /// Override `killProcessOnDisconnect`
    pub fn kill_process_on_disconnect(mut self, enabled: bool) -> Self {
        self.kill_process_on_disconnect = Some(enabled);
        self
    }

    /// Whether no key is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Options forwarded to the driver
///
/// Deliberately has no process-termination flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverOptions {
    /// Use TLS for the transport
    pub ssl: bool,
    /// Validate the server certificate when TLS is on
    pub ssl_validate: bool,
    /// Use the driver's current connection-string parser
    pub use_new_url_parser: bool,
}

impl DriverOptions {
    /// TLS mode implied by `ssl` and `ssl_validate`
    pub fn ssl_mode(&self) -> SslMode {
        match (self.ssl, self.ssl_validate) {
            (false, _) => SslMode::Disable,
            (true, false) => SslMode::Require,
            (true, true) => SslMode::VerifyFull,
        }
    }
}

/// SSL/TLS connection mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// No TLS (plaintext connection)
    #[default]
    Disable,
    /// TLS required, but server certificate is not verified
    Require,
    /// TLS required, server certificate and hostname are verified
    VerifyFull,
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disable => write!(f, "disable"),
            Self::Require => write!(f, "require"),
            Self::VerifyFull => write!(f, "verify-full"),
        }
    }
}
