//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{KeyScope, LimiterSettings};

/// Prefix for environment variable overrides, e.g. `TURNSTILE__LIMITER__QUOTA`.
const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Derive caller addresses from `X-Forwarded-For` / `X-Real-IP`
    #[serde(default = "default_trust_forwarded_headers")]
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            trust_forwarded_headers: default_trust_forwarded_headers(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_trust_forwarded_headers() -> bool {
    true
}

/// Admission limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Occupancy above which requests are rejected
    #[serde(default = "default_quota")]
    pub quota: usize,

    /// Sliding window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Whether to limit globally or per caller
    #[serde(default)]
    pub scope: KeyScope,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            window_secs: default_window_secs(),
            scope: KeyScope::default(),
        }
    }
}

fn default_quota() -> usize {
    5
}

fn default_window_secs() -> u64 {
    600
}

impl LimiterConfig {
    /// The sliding window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Convert into limiter settings.
    pub fn settings(&self) -> LimiterSettings {
        LimiterSettings::new(self.quota, self.window(), self.scope)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file layered under
    /// `TURNSTILE__`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: TurnstileConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TurnstileError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the limiter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.limiter.window_secs == 0 {
            return Err(TurnstileError::Config(
                "limiter.window_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_admin_login_policy() {
        let config = TurnstileConfig::default();
        assert_eq!(config.limiter.quota, 5);
        assert_eq!(config.limiter.window(), Duration::from_secs(600));
        assert_eq!(config.limiter.scope, KeyScope::Global);
        assert_eq!(config.server.http_addr, "127.0.0.1:8080".parse().unwrap());
        assert!(config.server.trust_forwarded_headers);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
limiter:
  quota: 10
  scope: caller
logging:
  format: json
"#;

        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiter.quota, 10);
        assert_eq!(config.limiter.window_secs, 600);
        assert_eq!(config.limiter.scope, KeyScope::Caller);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
limiter:
  window_secs: 0
"#;

        let result = TurnstileConfig::from_yaml(yaml);
        assert!(matches!(result, Err(TurnstileError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = TurnstileConfig::from_yaml("limiter: [not, a, map]");
        assert!(matches!(result, Err(TurnstileError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("turnstile-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "server:\n  http_addr: \"0.0.0.0:9000\"\nlimiter:\n  quota: 3\n  window_secs: 30\n",
        )
        .unwrap();

        let config = TurnstileConfig::load(Some(path.as_path()));
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.limiter.quota, 3);
        assert_eq!(config.limiter.window(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = TurnstileConfig::load(Some(Path::new("/nonexistent/turnstile.yaml")));
        assert!(matches!(result, Err(TurnstileError::Config(_))));
    }

    #[test]
    fn test_limiter_settings_conversion() {
        let config = LimiterConfig {
            quota: 2,
            window_secs: 45,
            scope: KeyScope::Caller,
        };

        let settings = config.settings();
        assert_eq!(settings.quota, 2);
        assert_eq!(settings.window, Duration::from_secs(45));
        assert_eq!(settings.scope, KeyScope::Caller);
    }
}
