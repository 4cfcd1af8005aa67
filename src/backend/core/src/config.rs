//! Configuration management.
//!
//! Sources, later ones winning: an optional file, then environment variables
//! prefixed `ASSETDESK` with `__` as the section separator
//! (`ASSETDESK__SERVER__PORT=9000`, `ASSETDESK__AUTH__JWT_SECRET=...`).

use serde::Deserialize;

use crate::middleware::auth::AuthConfig;
use crate::telemetry::{LoggingConfig, MetricsConfig};

const ENV_PREFIX: &str = "ASSETDESK";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Permission matrix TOML file; the built-in matrix when unset
    #[serde(default)]
    pub matrix_path: Option<String>,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_runnable() {
        let config = Config::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert!(!config.auth.enabled);
        assert!(config.auth.validate().is_ok());
        assert!(config.access.matrix_path.is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[auth]
enabled = true
jwt_secret = "s3cret"
issuer = "assetdesk"

[access]
matrix_path = "/etc/assetdesk/permissions.toml"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.auth.enabled);
        assert_eq!(config.auth.issuer.as_deref(), Some("assetdesk"));
        assert_eq!(config.auth.public_paths, vec!["/health", "/metrics"]);
        assert_eq!(
            config.access.matrix_path.as_deref(),
            Some("/etc/assetdesk/permissions.toml")
        );
    }

    #[test]
    fn test_enabled_auth_without_secret_fails_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[auth]\nenabled = true").unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert!(config.auth.validate().is_err());
    }
}
