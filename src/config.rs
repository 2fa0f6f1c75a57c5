//! WolfRepl Configuration
//!
//! This module provides configuration structures for the replication
//! session manager.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main WolfRepl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfReplConfig {
    /// Array control plane connection
    pub array: ArrayConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Array control plane connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Base URL of the array management interface (https://host)
    pub endpoint: String,

    /// Management user
    pub user: String,

    /// Management password
    #[serde(default)]
    pub password: String,

    /// Verify the array's TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Entries requested per page when listing sessions
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP API bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log to file path (optional)
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> usize {
    100
}

fn default_api_address() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_address(),
            cors_enabled: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl ArrayConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// REST API root
    pub fn api_root(&self) -> String {
        format!("{}/api/rest", self.endpoint.trim_end_matches('/'))
    }
}

impl WolfReplConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfReplConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let endpoint = &self.array.endpoint;
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(crate::Error::Config(format!(
                "array.endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        if self.array.user.is_empty() {
            return Err(crate::Error::Config("array.user cannot be empty".into()));
        }

        if self.array.page_size == 0 {
            return Err(crate::Error::Config("array.page_size must be greater than 0".into()));
        }

        if self.array.timeout_secs == 0 {
            return Err(crate::Error::Config("array.timeout_secs must be greater than 0".into()));
        }

        if self.api.enabled && self.api.bind_address.is_empty() {
            return Err(crate::Error::Config("api.bind_address cannot be empty".into()));
        }

        Ok(())
    }

    /// Sample configuration written by `wolfrepl init`
    pub fn sample() -> String {
        r#"# WolfRepl configuration

[array]
endpoint = "https://array-a.example.com"
user = "admin"
password = "changeme"
verify_tls = true
timeout_secs = 30
connect_timeout_secs = 10
page_size = 100

[api]
enabled = true
bind_address = "127.0.0.1:8090"
cors_enabled = false

[logging]
level = "info"
format = "pretty"
"#
        .to_string()
    }
}
