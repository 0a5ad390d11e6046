//! Daemon configuration
//!
//! Loaded from a TOML file (by default `<config dir>/pathfs/config.toml`).
//! Every key is optional. Command-line flags and their `PATHFS_*`
//! environment variables are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "pathfs";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding the file records
    pub database_path: PathBuf,
    /// Default tracing level; `RUST_LOG` directives still apply on top
    pub log_level: String,
    /// Write daily-rotated log files here in addition to stderr
    pub log_dir: Option<PathBuf>,
    pub mount: MountConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("files.db"),
            log_level: "info".to_string(),
            log_dir: None,
            mount: MountConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Options handed to the kernel at mount time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub fs_name: String,
    /// Let users other than the mounting one access the mount
    pub allow_other: bool,
    /// Unmount automatically when the process exits
    pub auto_unmount: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fs_name: APP_NAME.to_string(),
            allow_other: false,
            auto_unmount: true,
        }
    }
}

/// Attribute cache in front of the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Disable to always hit the record store
    pub enabled: bool,
    /// TTL for attributes in seconds (also the TTL handed to the kernel)
    pub attr_ttl_secs: u32,
    /// TTL for paths known not to exist, in seconds
    pub negative_ttl_secs: u32,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attr_ttl_secs: 1,
            negative_ttl_secs: 1,
            max_entries: 10_000,
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path`, or from [`Config::default_path`].
    ///
    /// An explicitly given file must exist; a missing default file yields
    /// the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("files.db"));
        assert_eq!(config.log_level, "info");
        assert!(config.cache.enabled);
        assert_eq!(config.mount.fs_name, "pathfs");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            database_path = "/var/lib/pathfs/files.db"

            [cache]
            attr_ttl_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/pathfs/files.db")
        );
        assert_eq!(config.cache.attr_ttl_secs, 5);
        assert_eq!(config.cache.negative_ttl_secs, 1);
        assert!(config.mount.auto_unmount);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(Config::from_toml("log_level = 3").is_err());
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[mount]\nallow_other = true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.mount.allow_other);
    }
}
