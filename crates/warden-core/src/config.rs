//! Warden configuration
//!
//! Loaded from a TOML file, then overridden by `WARDEN_*` environment
//! variables, then validated. Every field has a default so an empty file is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "WARDEN_";

/// Errors loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },
    /// An environment override could not be applied
    #[error("Invalid value for {key}: {value}")]
    InvalidOverride {
        /// Variable name
        key: String,
        /// Offending value
        value: String,
    },
    /// A setting is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration of the moderation engine and its tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Directory holding persisted community and punishment rows
    pub storage_dir: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Shortest accepted temporary mute, in seconds
    pub min_mute_duration_secs: u64,
    /// Reason recorded when a moderator gives none
    pub default_reason: String,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("warden-data"),
            log_filter: "info".to_string(),
            min_mute_duration_secs: 60,
            default_reason: "No reason provided.".to_string(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `WARDEN_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `WARDEN_*` overrides from an explicit variable list
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "STORAGE_DIR" => self.storage_dir = PathBuf::from(&value),
                "LOG_FILTER" => self.log_filter = value,
                "MIN_MUTE_DURATION_SECS" => {
                    self.min_mute_duration_secs =
                        value
                            .parse()
                            .map_err(|_| ConfigError::InvalidOverride {
                                key: key.clone(),
                                value: value.clone(),
                            })?;
                }
                "DEFAULT_REASON" => self.default_reason = value,
                _ => {}
            }
        }
        Ok(())
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage_dir must not be empty".into()));
        }
        if self.default_reason.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_reason must not be blank".into(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be blank".into()));
        }
        Ok(())
    }

    /// Shortest accepted temporary mute
    pub fn min_mute_duration(&self) -> Duration {
        Duration::from_secs(self.min_mute_duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.min_mute_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_from_file_and_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "storage_dir = \"/var/lib/warden\"\nmin_mute_duration_secs = 120"
        )
        .unwrap();

        let mut config = WardenConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/warden"));
        assert_eq!(config.min_mute_duration_secs, 120);

        config
            .merge_with_vars(vec![
                ("WARDEN_LOG_FILTER".to_string(), "debug".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ])
            .unwrap();
        assert_eq!(config.log_filter, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = WardenConfig::default();
        let err = config
            .merge_with_vars(vec![(
                "WARDEN_MIN_MUTE_DURATION_SECS".to_string(),
                "soon".to_string(),
            )])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn test_validate_rejects_blank_reason() {
        let config = WardenConfig {
            default_reason: "  ".into(),
            ..WardenConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
