use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project-local configuration and state.
pub const CONFIG_DIR: &str = ".panelsync";

/// Environment variable prefix; nested keys are separated with `__`.
pub const ENV_PREFIX: &str = "PANELSYNC_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {0}: must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Invalid provider base_url: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .panelsync/config.yaml (project config, created by init)
    /// 3. .panelsync/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PANELSYNC_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], rooted at `root` instead of the working directory.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// The file replaces both project YAML layers; environment variables still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Explicit file when given, hierarchical project config otherwise.
    pub fn resolve(explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        let base_url = &config.provider.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.clone()));
        }
        if config.provider.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("provider.request_timeout_secs"));
        }
        if config.provider.requests_per_minute == 0 {
            return Err(ConfigError::ZeroValue("provider.requests_per_minute"));
        }

        if config.notifications.timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("notifications.timeout_secs"));
        }
        if let Some(url) = &config.notifications.webhook_url {
            if url.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "notifications.webhook_url cannot be blank; omit it to log reminders instead".to_string(),
                ));
            }
        }

        let reconcile = &config.reconcile;
        if reconcile.sweep_interval_secs == 0 {
            return Err(ConfigError::ZeroValue("reconcile.sweep_interval_secs"));
        }
        if reconcile.max_concurrent_tests == 0 {
            return Err(ConfigError::ZeroValue("reconcile.max_concurrent_tests"));
        }
        if reconcile.worker_poll_interval_secs == 0 {
            return Err(ConfigError::ZeroValue("reconcile.worker_poll_interval_secs"));
        }
        if reconcile.max_consecutive_failures == 0 {
            return Err(ConfigError::ZeroValue("reconcile.max_consecutive_failures"));
        }
        if reconcile.claim_lease_secs == 0 {
            return Err(ConfigError::ZeroValue("reconcile.claim_lease_secs"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_project_config(root: &Path, file: &str, contents: &str) {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), contents).unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".panelsync/panelsync.db");
        assert_eq!(config.provider.base_url, "https://api.prolific.com/api/v1");
        assert_eq!(config.reconcile.sweep_interval_secs, 86_400);
        assert!(!config.reconcile.enqueue_on_dispatch);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /srv/panelsync.db
  max_connections: 2
logging:
  level: debug
  format: pretty
provider:
  api_token: secret
  request_timeout_secs: 5
reconcile:
  sweep_interval_secs: 3600
  enqueue_on_dispatch: true
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/srv/panelsync.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.provider.api_token.as_deref(), Some("secret"));
        assert_eq!(config.provider.request_timeout_secs, 5);
        assert_eq!(config.provider.requests_per_minute, 60);
        assert_eq!(config.reconcile.sweep_interval_secs, 3600);
        assert!(config.reconcile.enqueue_on_dispatch);
        assert_eq!(config.reconcile.max_concurrent_tests, 4);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = "  ".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_zero_values() {
        let mut config = Config::default();
        config.reconcile.sweep_interval_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroValue("reconcile.sweep_interval_secs")
        ));

        let mut config = Config::default();
        config.reconcile.max_concurrent_tests = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroValue("reconcile.max_concurrent_tests")
        ));

        let mut config = Config::default();
        config.provider.request_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroValue("provider.request_timeout_secs")
        ));

        let mut config = Config::default();
        config.reconcile.claim_lease_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroValue("reconcile.claim_lease_secs")
        ));
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let mut config = Config::default();
        config.provider.base_url = "api.prolific.com".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidBaseUrl(_)
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let root = tempfile::tempdir().unwrap();
        write_project_config(
            root.path(),
            "config.yaml",
            "logging:\n  level: info\n  format: json\nreconcile:\n  max_concurrent_tests: 2\n",
        );
        write_project_config(root.path(), "local.yaml", "logging:\n  level: debug\n");

        let config = temp_env::with_vars_unset(
            ["PANELSYNC_LOGGING__LEVEL", "PANELSYNC_RECONCILE__MAX_CONCURRENT_TESTS"],
            || ConfigLoader::load_from_dir(root.path()).unwrap(),
        );

        assert_eq!(config.logging.level, "debug", "Local override should win");
        assert_eq!(config.logging.format, "json", "Base value should persist");
        assert_eq!(config.reconcile.max_concurrent_tests, 2);
    }

    #[test]
    fn test_env_overrides_files() {
        let root = tempfile::tempdir().unwrap();
        write_project_config(root.path(), "config.yaml", "reconcile:\n  max_concurrent_tests: 2\n");

        let config = temp_env::with_vars(
            [
                ("PANELSYNC_RECONCILE__MAX_CONCURRENT_TESTS", Some("8")),
                ("PANELSYNC_PROVIDER__API_TOKEN", Some("from-env")),
            ],
            || ConfigLoader::load_from_dir(root.path()).unwrap(),
        );

        assert_eq!(config.reconcile.max_concurrent_tests, 8);
        assert_eq!(config.provider.api_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_explicit_file_replaces_project_layers() {
        let root = tempfile::tempdir().unwrap();
        let explicit = root.path().join("ops.yaml");
        fs::write(&explicit, "database:\n  path: /tmp/ops.db\n").unwrap();

        let config = ConfigLoader::resolve(Some(&explicit)).unwrap();
        assert_eq!(config.database.path, "/tmp/ops.db");

        assert!(ConfigLoader::load_from_file(root.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_invalid_file_value_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        write_project_config(root.path(), "config.yaml", "reconcile:\n  sweep_interval_secs: 0\n");

        let err = temp_env::with_var_unset("PANELSYNC_RECONCILE__SWEEP_INTERVAL_SECS", || {
            ConfigLoader::load_from_dir(root.path()).unwrap_err()
        });
        assert!(err.to_string().contains("sweep_interval_secs"));
    }
}
