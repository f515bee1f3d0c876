//! Service Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const TENANT_SERVICE_URL_ENV: &str = "TENANT_SERVICE_URL";
pub const TENANT_SERVICE_TIMEOUT_ENV: &str = "TENANT_SERVICE_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Project service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Tenant service connection
    pub tenant_service: TenantServiceConfig,
    /// Event transport
    pub events: EventsConfig,
}

/// Tenant service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TenantServiceConfig {
    /// Base URL of the tenant service
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TenantServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://tenant-service:8080".into(),
            timeout_ms: 5_000,
        }
    }
}

impl TenantServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Event transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventsConfig {
    /// Exchange lifecycle events are published to
    pub exchange: String,
    /// Capacity of the inbound and outbound channels
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            exchange: "project-events".into(),
            channel_capacity: 1024,
        }
    }
}

impl ServiceConfig {
    /// Load from file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment overrides
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(TENANT_SERVICE_URL_ENV) {
            self.tenant_service.base_url = url;
        }
        if let Some(value) = lookup(TENANT_SERVICE_TIMEOUT_ENV) {
            self.tenant_service.timeout_ms = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: TENANT_SERVICE_TIMEOUT_ENV,
                value,
            })?;
        }
        Ok(self)
    }
}
