//! Configuration system for the licensing service.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `RETAILEASE_SERVER_HOST` / `RETAILEASE_SERVER_PORT` - bind address
//! - `RETAILEASE_DATABASE_TYPE` / `RETAILEASE_DATABASE_URL` - storage backend
//! - `RETAILEASE_ADMIN_KEY` - shared secret required by `/license/renew`
//! - `RETAILEASE_LOG_LEVEL` - trace, debug, info, warn, error
//! - `RETAILEASE_KEY_BITS` - RSA modulus size for newly generated key pairs

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{LicenseError, LicenseResult};

static CONFIG: OnceLock<RetaileaseConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetaileaseConfig {
    pub server: ServerConfig,
    pub license: LicenseConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub backup: BackupConfig,
    pub rate_limit: RateLimitConfig,
    pub admin: AdminConfig,
    pub jobs: JobsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Overall per-request deadline, in seconds (excludes upload/download).
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

/// License signing/validation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// RSA modulus size used when generating a new key pair.
    pub key_bits: u32,
    /// Grace period granted to a suspended license before it is revoked, in days.
    pub grace_period_days: i64,
    /// Shared secret compared (constant-time) against `admin_key` on `/license/renew`.
    pub admin_key: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            key_bits: 4096,
            grace_period_days: 7,
            admin_key: String::new(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub db_type: String,
    pub sqlite_url: String,
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://retailease.db".to_string(),
            postgres_url: "postgres://localhost/retailease".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

/// Backup ingestion configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Filesystem root under which `backups/<business_id>/<filename>` are written.
    pub storage_root: String,
    /// Maximum accepted upload size, in bytes.
    pub max_upload_bytes: u64,
    /// Upload/download timeout, in seconds.
    pub upload_timeout_secs: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            storage_root: "./data/backups".to_string(),
            max_upload_bytes: 500 * 1024 * 1024,
            upload_timeout_secs: 300,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub validate_rpm: u32,
    pub auth_rpm: u32,
    pub backup_rpm: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            validate_rpm: 100,
            auth_rpm: 30,
            backup_rpm: 20,
            burst_size: 5,
        }
    }
}

/// Admin/operator API configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// IP/CIDR allowlist for operator-only routes. Empty disables the check.
    pub ip_whitelist: Vec<String>,
    pub audit_logging: bool,
}

/// Background job scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub grace_period_cron: String,
    pub license_expiration_cron: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            grace_period_cron: "0 */15 * * * *".to_string(),
            license_expiration_cron: "0 0 * * * *".to_string(),
        }
    }
}

impl RetaileaseConfig {
    fn load() -> LicenseResult<Self> {
        let builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("license.key_bits", 4096)?
            .set_default("license.grace_period_days", 7)?
            .set_default("license.admin_key", "")?
            .set_default("database.db_type", "sqlite")?
            .set_default("database.sqlite_url", "sqlite://retailease.db")?
            .set_default("database.postgres_url", "postgres://localhost/retailease")?
            .set_default("logging.enabled", true)?
            .set_default("logging.level", "info")?
            .set_default("backup.storage_root", "./data/backups")?
            .set_default("backup.max_upload_bytes", 500 * 1024 * 1024_i64)?
            .set_default("backup.upload_timeout_secs", 300)?
            .set_default("rate_limit.enabled", true)?
            .set_default("rate_limit.validate_rpm", 100)?
            .set_default("rate_limit.auth_rpm", 30)?
            .set_default("rate_limit.backup_rpm", 20)?
            .set_default("rate_limit.burst_size", 5)?
            .set_default("jobs.grace_period_cron", "0 */15 * * * *")?
            .set_default("jobs.license_expiration_cron", "0 0 * * * *")?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("RETAILEASE_SERVER_HOST").ok())?
            .set_override_option(
                "server.port",
                env::var("RETAILEASE_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )?
            .set_override_option(
                "license.key_bits",
                env::var("RETAILEASE_KEY_BITS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )?
            .set_override_option(
                "license.grace_period_days",
                env::var("RETAILEASE_GRACE_PERIOD_DAYS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )?
            .set_override_option("license.admin_key", env::var("RETAILEASE_ADMIN_KEY").ok())?
            .set_override_option("database.db_type", env::var("RETAILEASE_DATABASE_TYPE").ok())?
            .set_override_option(
                "database.sqlite_url",
                env::var("RETAILEASE_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )?
            .set_override_option(
                "database.postgres_url",
                env::var("RETAILEASE_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )?
            .set_override_option("logging.level", env::var("RETAILEASE_LOG_LEVEL").ok())?
            .set_override_option(
                "logging.enabled",
                env::var("RETAILEASE_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )?
            .set_override_option(
                "backup.storage_root",
                env::var("RETAILEASE_BACKUP_STORAGE_ROOT").ok(),
            )?
            .set_override_option(
                "backup.max_upload_bytes",
                env::var("RETAILEASE_BACKUP_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.server.port == 0 {
            return Err(LicenseError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.license.key_bits < 2048 {
            return Err(LicenseError::ConfigError(
                "license.key_bits must be at least 2048".to_string(),
            ));
        }

        if self.license.grace_period_days < 0 {
            return Err(LicenseError::ConfigError(
                "license.grace_period_days cannot be negative".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        if self.backup.max_upload_bytes == 0 {
            return Err(LicenseError::ConfigError(
                "backup.max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Get the global configuration, loading and validating it on first access.
pub fn get_config() -> LicenseResult<&'static RetaileaseConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = RetaileaseConfig::load()?;
    config.validate()?;

    let _ = CONFIG.set(config.clone());
    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly, surfacing load/validation errors early.
pub fn init_config() -> LicenseResult<&'static RetaileaseConfig> {
    get_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> RetaileaseConfig {
        RetaileaseConfig::default()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(default_config().validate().is_ok());
    }

    #[test]
    fn validates_port_not_zero() {
        let mut config = default_config();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_database_type() {
        let mut config = default_config();
        config.database.db_type = "mongo".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("db_type"));
    }

    #[test]
    fn validates_key_bits_minimum() {
        let mut config = default_config();
        config.license.key_bits = 512;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_grace_period_non_negative() {
        let mut config = default_config();
        config.license.grace_period_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_log_level() {
        let mut config = default_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
