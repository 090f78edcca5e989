//! Configuration loading and resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument / environment variable (collected by the binary via clap)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing TOML file is not an error; a malformed one is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATABASE_PATH: &str = "wastewise.db";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads/articles";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_ML_SERVICE_URL: &str = "http://localhost:5000";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Bootstrap configuration read from TOML
///
/// Every field is optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    /// Deployment environment name ("development", "production", ...)
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub ml_service_url: Option<String>,
    #[serde(default)]
    pub frontend_url: Option<String>,
    #[serde(default)]
    pub midtrans: MidtransToml,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[midtrans]` table
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MidtransToml {
    /// "sandbox" or "production"
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub server_key: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,
}

/// `[logging]` table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Values supplied on the command line or through the environment
///
/// Filled by the binary's clap `Args`; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub upload_dir: Option<PathBuf>,
    pub environment: Option<String>,
    pub ml_service_url: Option<String>,
    pub frontend_url: Option<String>,
    pub midtrans_environment: Option<String>,
    pub midtrans_server_key: Option<String>,
    pub midtrans_client_key: Option<String>,
}

/// Payment gateway mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidtransMode {
    Sandbox,
    Production,
}

impl MidtransMode {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            MidtransMode::Production
        } else {
            MidtransMode::Sandbox
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MidtransMode::Sandbox => "sandbox",
            MidtransMode::Production => "production",
        }
    }
}

/// Resolved payment gateway settings
#[derive(Debug, Clone)]
pub struct MidtransConfig {
    pub mode: MidtransMode,
    pub server_key: Option<String>,
    pub client_key: Option<String>,
}

impl MidtransConfig {
    pub fn is_production(&self) -> bool {
        self.mode == MidtransMode::Production
    }

    /// Both keys present and non-blank
    pub fn is_configured(&self) -> bool {
        non_blank(self.server_key.as_deref()) && non_blank(self.client_key.as_deref())
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub environment: String,
    pub ml_service_url: String,
    pub frontend_url: String,
    pub midtrans: MidtransConfig,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides over TOML over compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let port = overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }

        let ml_service_url = overrides
            .ml_service_url
            .or(toml.ml_service_url)
            .unwrap_or_else(|| DEFAULT_ML_SERVICE_URL.to_string());
        let ml_service_url = normalize_url("ML service URL", &ml_service_url)?;

        let frontend_url = overrides
            .frontend_url
            .or(toml.frontend_url)
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let frontend_url = normalize_url("frontend URL", &frontend_url)?;

        let midtrans_mode = overrides
            .midtrans_environment
            .or(toml.midtrans.environment)
            .map(|m| MidtransMode::parse(&m))
            .unwrap_or(MidtransMode::Sandbox);

        Ok(Self {
            host: overrides
                .host
                .or(toml.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_path: overrides
                .database_path
                .or(toml.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            upload_dir: overrides
                .upload_dir
                .or(toml.upload_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            environment: overrides
                .environment
                .or(toml.environment)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            ml_service_url,
            frontend_url,
            midtrans: MidtransConfig {
                mode: midtrans_mode,
                server_key: overrides.midtrans_server_key.or(toml.midtrans.server_key),
                client_key: overrides.midtrans_client_key.or(toml.midtrans.client_key),
            },
            log_level: toml.logging.level,
        })
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Default TOML location: `<config dir>/wastewise/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wastewise").join("config.toml"))
}

/// Load the TOML config
///
/// `explicit` is the `--config` path if one was given. Missing files log a
/// warning and yield defaults; unreadable or malformed files are errors.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(TomlConfig::default()),
        },
    };

    if !path.exists() {
        if explicit.is_some() {
            warn!("Config file {} not found, using defaults", path.display());
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file {}", path.display());
    Ok(config)
}

fn normalize_url(label: &str, url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "{} must start with http:// or https:// (got '{}')",
            label, url
        )));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_given() {
        let config =
            ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default()).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3001);
        assert_eq!(config.ml_service_url, "http://localhost:5000");
        assert_eq!(config.midtrans.mode, MidtransMode::Sandbox);
        assert!(!config.midtrans.is_configured());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_override_beats_toml() {
        let toml: TomlConfig = toml::from_str(
            r#"
            port = 8080
            ml_service_url = "http://ml.internal:9000/"

            [midtrans]
            environment = "production"
            server_key = "toml-key"
            "#,
        )
        .unwrap();

        let overrides = ConfigOverrides {
            port: Some(9090),
            midtrans_server_key: Some("cli-key".to_string()),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, toml).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.ml_service_url, "http://ml.internal:9000");
        assert!(config.midtrans.is_production());
        assert_eq!(config.midtrans.server_key.as_deref(), Some("cli-key"));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let overrides = ConfigOverrides {
            ml_service_url: Some("ftp://nope".to_string()),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(overrides, TomlConfig::default()).is_err());
    }
}
