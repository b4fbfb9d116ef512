//! Main application configuration
//!
//! Defaults, environment overrides, optional TOML file and validation for the
//! waitline service and its command line client.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub estimator: EstimatorSettings,
    pub replica: ReplicaSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the HTTP binding listens on
    pub http_host: String,
    /// Port the HTTP binding listens on
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Wait-time estimation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Number of service durations kept per queue
    pub sample_capacity: usize,
}

/// Authoritative store and local mirror settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaSettings {
    /// Base URL of the authoritative queue service
    pub api_base: String,
    /// Timeout of a single request to the authoritative service
    pub request_timeout_ms: u64,
    /// File holding the local mirror
    pub snapshot_path: PathBuf,
    /// Handles allowed to clear and delete queues
    pub privileged_handles: Vec<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "waitline".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            sample_capacity: crate::types::DEFAULT_SAMPLE_CAPACITY,
        }
    }
}

impl Default for ReplicaSettings {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:3000".to_string(),
            request_timeout_ms: 5000,
            snapshot_path: PathBuf::from("waitline-mirror.json"),
            privileged_handles: vec!["admin".to_string()],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Estimator settings
        if let Ok(capacity) = env::var("SAMPLE_CAPACITY") {
            self.estimator.sample_capacity = capacity
                .parse()
                .map_err(|_| anyhow!("Invalid SAMPLE_CAPACITY value: {}", capacity))?;
        }

        // Replica settings
        if let Ok(api_base) = env::var("API_BASE") {
            self.replica.api_base = api_base;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_MS") {
            self.replica.request_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid REQUEST_TIMEOUT_MS value: {}", timeout))?;
        }
        if let Ok(path) = env::var("SNAPSHOT_PATH") {
            self.replica.snapshot_path = PathBuf::from(path);
        }
        if let Ok(handles) = env::var("PRIVILEGED_HANDLES") {
            self.replica.privileged_handles = parse_handles(&handles);
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get authoritative request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.replica.request_timeout_ms)
    }

    /// `host:port` the HTTP binding listens on
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.http_host, self.service.http_port)
    }
}

fn parse_handles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|handle| !handle.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.replica.request_timeout_ms == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }

    if config.estimator.sample_capacity == 0 {
        return Err(anyhow!("Sample capacity must be at least 1"));
    }

    // Validate replica settings
    let api_base = config.replica.api_base.trim();
    if api_base.is_empty() {
        return Err(anyhow!("API base cannot be empty"));
    }
    if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
        return Err(anyhow!("API base must be an http(s) URL: {}", api_base));
    }
    if config.replica.snapshot_path.as_os_str().is_empty() {
        return Err(anyhow!("Snapshot path cannot be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.http_port, 3000);
        assert_eq!(config.estimator.sample_capacity, 100);
        assert_eq!(config.request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.estimator.sample_capacity = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.replica.api_base = "ftp://example.com".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.replica.request_timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_partial_toml_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[estimator]\nsample_capacity = 50\n\n[replica]\nprivileged_handles = [\"ops\", \"admin\"]"
        )
        .unwrap();

        let config: AppConfig =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.estimator.sample_capacity, 50);
        assert_eq!(config.replica.privileged_handles, vec!["ops", "admin"]);
        assert_eq!(config.service.name, "waitline");
        assert_eq!(config.service.shutdown_timeout_seconds, 30);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::from_file("/nonexistent/waitline.toml").is_err());
    }

    #[test]
    fn test_handle_list_parsing() {
        assert_eq!(parse_handles(" admin, ops ,,"), vec!["admin", "ops"]);
        assert!(parse_handles("").is_empty());
    }
}
