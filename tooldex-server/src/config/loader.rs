//! Configuration loader

use std::path::{Path, PathBuf};

use tooldex_protocol::PRIMARY_ALIAS;
use tooldex_utils::{config_file, Result, TooldexError};

use super::AppConfig;
use crate::pane::is_valid_name;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TOOLDEX_CONFIG";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `TOOLDEX_CONFIG` or the default location
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load() -> Result<AppConfig> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(explicit);
            if !path.is_file() {
                return Err(TooldexError::config(format!(
                    "{} points at {}, which does not exist",
                    CONFIG_ENV,
                    path.display()
                )));
            }
            return Self::load_from_path(&path);
        }

        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| TooldexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| TooldexError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.tmux.binary.trim().is_empty() {
            return Err(TooldexError::config("tmux.binary must not be empty"));
        }

        if config.tmux.command_timeout_ms == 0 {
            return Err(TooldexError::config("tmux.command_timeout_ms must be positive"));
        }

        if config.registry.max_panes == 0 {
            return Err(TooldexError::config("registry.max_panes must be at least 1"));
        }

        let origin_name = &config.registry.origin_name;
        if origin_name == PRIMARY_ALIAS || !is_valid_name(origin_name) {
            return Err(TooldexError::config(format!(
                "registry.origin_name {:?} is reserved or malformed",
                origin_name
            )));
        }

        let subs = &config.subscriptions;
        if subs.buffer_lines == 0 || subs.snapshot_lines == 0 || subs.max_backfill_lines == 0 {
            return Err(TooldexError::config(
                "subscription buffer, snapshot and backfill sizes must be positive",
            ));
        }

        if subs.default_max_lines == 0 {
            return Err(TooldexError::config("subscriptions.default_max_lines must be positive"));
        }

        if subs.poll_interval_ms == 0 {
            return Err(TooldexError::config("subscriptions.poll_interval_ms must be positive"));
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate() -> Result<AppConfig> {
        let config = Self::load()?;
        Self::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
            [registry]
            max_panes = 3
            origin_name = "shell"
            "#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.registry.max_panes, 3);
        assert_eq!(config.registry.origin_name, "shell");
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_load_from_missing_path() {
        let result = ConfigLoader::load_from_path(Path::new("/nonexistent/tooldex.toml"));
        assert!(matches!(result, Err(TooldexError::FileRead { .. })));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigLoader::parse("invalid { toml", Path::new("test.toml"));
        assert!(matches!(result, Err(TooldexError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_validate_defaults() {
        assert!(ConfigLoader::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = AppConfig::default();
        config.registry.max_panes = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_reserved_origin_name() {
        let mut config = AppConfig::default();
        config.registry.origin_name = PRIMARY_ALIAS.to_string();
        assert!(ConfigLoader::validate(&config).is_err());

        config.registry.origin_name = "has space".to_string();
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = AppConfig::default();
        config.subscriptions.poll_interval_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
