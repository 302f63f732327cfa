//! Runtime configuration for the document core.
//!
//! # Responsibility
//! - Describe where metadata, content and logs live.
//! - Load settings from a JSON document, then apply environment overrides.
//!
//! # Invariants
//! - A validated config has non-empty storage paths, a supported log level
//!   and, when set, an absolute log directory.

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "DOKUTI_DB_PATH";
pub const ENV_CONTENT_ROOT: &str = "DOKUTI_CONTENT_ROOT";
pub const ENV_LOG_LEVEL: &str = "DOKUTI_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DOKUTI_LOG_DIR";

/// Configuration load or validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid config `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Storage and logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite metadata database file.
    pub database_path: PathBuf,
    /// Root directory of the filesystem content store.
    pub content_root: PathBuf,
    pub log_level: String,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("dokuti.db"),
            content_root: PathBuf::from("dokuti-content"),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by `DOKUTI_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env_with(lookup)?;
        Ok(config)
    }

    /// Overrides fields with non-blank `DOKUTI_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Same as `apply_env`, reading variables through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = present(ENV_DB_PATH) {
            self.database_path = PathBuf::from(value.trim());
        }
        if let Some(value) = present(ENV_CONTENT_ROOT) {
            self.content_root = PathBuf::from(value.trim());
        }
        if let Some(value) = present(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = present(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value.trim()));
        }

        self.validate()
    }

    /// Parses a JSON config document. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "database_path",
                reason: "cannot be empty".to_string(),
            });
        }
        if self.content_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "content_root",
                reason: "cannot be empty".to_string(),
            });
        }
        if normalize_level(&self.log_level).is_none() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!(
                    "unsupported level `{}`; expected trace|debug|info|warn|error",
                    self.log_level
                ),
            });
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    field: "log_dir",
                    reason: format!("must be an absolute path, got `{}`", dir.display()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_CONTENT_ROOT, ENV_DB_PATH, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn env_values_override_defaults_and_blank_values_are_ignored() {
        let vars = HashMap::from([
            (ENV_DB_PATH, "/srv/dokuti/meta.db".to_string()),
            (ENV_CONTENT_ROOT, "   ".to_string()),
            (ENV_LOG_LEVEL, "warn".to_string()),
        ]);

        let config = CoreConfig::from_env_with(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/srv/dokuti/meta.db"));
        assert_eq!(config.content_root, CoreConfig::default().content_root);
        assert_eq!(config.log_level, "warn");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"content_root": "/var/lib/dokuti/blobs"}"#).unwrap();
        assert_eq!(config.content_root, PathBuf::from("/var/lib/dokuti/blobs"));
        assert_eq!(config.database_path, PathBuf::from("dokuti.db"));
    }

    #[test]
    fn json_config_rejects_unknown_fields() {
        let error = CoreConfig::from_json_str(r#"{"database": "x.db"}"#).err().unwrap();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_rejects_unsupported_level_and_relative_log_dir() {
        let error = CoreConfig::from_json_str(r#"{"log_level": "loud"}"#).err().unwrap();
        assert!(matches!(error, ConfigError::Invalid { field: "log_level", .. }));

        let error = CoreConfig::from_json_str(r#"{"log_dir": "logs"}"#).err().unwrap();
        assert!(matches!(error, ConfigError::Invalid { field: "log_dir", .. }));
    }

    #[test]
    fn env_values_override_a_json_config() {
        let mut config = CoreConfig::from_json_str(
            r#"{"database_path": "/srv/file.db", "content_root": "/srv/blobs"}"#,
        )
        .unwrap();
        let vars = HashMap::from([
            (ENV_DB_PATH, "/srv/env.db".to_string()),
            (ENV_CONTENT_ROOT, "".to_string()),
        ]);

        config.apply_env_with(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/srv/env.db"));
        assert_eq!(config.content_root, PathBuf::from("/srv/blobs"));

        let vars = HashMap::from([(ENV_LOG_LEVEL, "loud".to_string())]);
        let error = config
            .apply_env_with(|key| vars.get(key).cloned())
            .err()
            .unwrap();
        assert!(matches!(error, ConfigError::Invalid { field: "log_level", .. }));
    }
}
