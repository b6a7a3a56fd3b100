//! Implementation of the `panelsync init` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::adapters::sqlite::initialize_from_config;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nWrote {CONFIG_DIR}/config.yaml"));
        }
        lines.push(format!("Database ready at {}", self.database_path.display()));
        lines.join("\n")
    }
}

/// Render the starter config. The token is left out so it can come from the environment.
fn starter_config(config: &Config) -> Result<String> {
    let mut config = config.clone();
    config.provider.api_token = None;
    let yaml = serde_yaml::to_string(&config).context("Failed to render default config")?;
    Ok(format!(
        "# panelsync configuration. Override any key with PANELSYNC_<SECTION>__<KEY>.\n{yaml}"
    ))
}

fn resolve_database_path(target: &Path, config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.database.path);
    if path.is_absolute() {
        path
    } else {
        target.join(path)
    }
}

pub async fn execute(args: InitArgs, config: Config, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let config_dir = target_path.join(CONFIG_DIR);
    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_file = config_dir.join("config.yaml");
    let config_written = if !config_file.exists() || args.force {
        fs::write(&config_file, starter_config(&config)?)
            .await
            .with_context(|| format!("Failed to write {}", config_file.display()))?;
        true
    } else {
        false
    };

    let database_path = resolve_database_path(&target_path, &config);
    let mut db_config = config.database.clone();
    db_config.path = database_path.to_string_lossy().to_string();
    let pool = initialize_from_config(&db_config)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    let out = InitOutput {
        success: true,
        message: if config_written {
            "Project initialized successfully.".to_string()
        } else {
            "Project already initialized; database migrations are up to date.".to_string()
        },
        initialized_path: target_path,
        config_written,
        database_path,
    };
    output(&out, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_config_round_trips_without_token() {
        let mut config = Config::default();
        config.provider.api_token = Some("secret".to_string());

        let yaml = starter_config(&config).unwrap();
        assert!(!yaml.contains("secret"));

        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.database.path, config.database.path);
        assert_eq!(parsed.reconcile.sweep_interval_secs, config.reconcile.sweep_interval_secs);
    }

    #[test]
    fn test_relative_database_path_is_joined() {
        let config = Config::default();
        let resolved = resolve_database_path(Path::new("/srv/project"), &config);
        assert_eq!(resolved, PathBuf::from("/srv/project/.panelsync/panelsync.db"));
    }

    #[tokio::test]
    async fn test_init_creates_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            path: dir.path().to_path_buf(),
        };
        execute(args, Config::default(), true).await.unwrap();

        assert!(dir.path().join(".panelsync/config.yaml").exists());
        assert!(dir.path().join(".panelsync/panelsync.db").exists());
    }
}
