//! Deployment defaults read from the process environment
//!
//! These tests mutate `APP_ENV`, so they run serially and live in their own
//! test binary.

use mongo_harakiri::connection::{ConnectOptions, DEPLOYMENT_ENV_VAR};
use mongo_harakiri::{ConnectOverrides, ConnectionManager, MemoryDriver};
use serial_test::serial;
use std::env;
use tokio_test::assert_ok;

/// Restores the previous `APP_ENV` value on drop
struct DeploymentEnv {
    previous: Option<String>,
}

impl DeploymentEnv {
    fn set(value: Option<&str>) -> Self {
        let previous = env::var(DEPLOYMENT_ENV_VAR).ok();
        match value {
            Some(value) => env::set_var(DEPLOYMENT_ENV_VAR, value),
            None => env::remove_var(DEPLOYMENT_ENV_VAR),
        }
        Self { previous }
    }
}

impl Drop for DeploymentEnv {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => env::set_var(DEPLOYMENT_ENV_VAR, value),
            None => env::remove_var(DEPLOYMENT_ENV_VAR),
        }
    }
}

#[test]
#[serial]
fn test_from_env_development_disables_ssl() {
    let _env = DeploymentEnv::set(Some("development"));
    assert!(!ConnectOptions::from_env().ssl);
    assert!(!ConnectionManager::new(MemoryDriver::new()).defaults().ssl);
}

#[test]
#[serial]
fn test_from_env_unset_keeps_ssl() {
    let _env = DeploymentEnv::set(None);
    assert!(ConnectOptions::from_env().ssl);
    assert!(ConnectionManager::new(MemoryDriver::new()).defaults().ssl);
}

#[test]
#[serial]
fn test_from_env_production_keeps_ssl() {
    let _env = DeploymentEnv::set(Some("production"));
    assert!(ConnectOptions::from_env().ssl);
}

#[tokio::test]
#[serial]
async fn test_manager_forwards_environment_default() {
    let _env = DeploymentEnv::set(Some("development"));
    let driver = MemoryDriver::new();
    let manager = ConnectionManager::new(driver.clone());

    assert_ok!(
        manager
            .connect("mongodb://localhost:27017/env", ConnectOverrides::new())
            .await
    );

    let forwarded = driver.last_options().map(|options| options.ssl);
    assert_eq!(forwarded, Some(false));
    assert_ok!(manager.disconnect().await);
}
