//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, the first existing file wins:
//! 1. `$AUTOPROPOSE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/autopropose/config.toml`
//! 3. `~/.autopropose/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use autopropose::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("mode: {}", config.mode());
//! println!("labels: {:?}", config.labels());
//! ```

pub mod schema;

pub use schema::{ConfigFile, ForgeConfig, PublishDefaults};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::publish::PublishMode;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "AUTOPROPOSE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration plus where it came from.
///
/// Accessors apply defaults, so callers never deal with the `Option`s of
/// the raw schema.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: ConfigFile,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated. A missing file is not an error.
    pub fn load() -> Result<Config, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load and validate a specific config file.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        Ok(Config {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file.
    fn locate() -> Option<PathBuf> {
        let candidates = [
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME")
                .map(|xdg| PathBuf::from(xdg).join("autopropose/config.toml")),
            dirs::home_dir().map(|home| home.join(".autopropose/config.toml")),
        ];
        candidates.into_iter().flatten().find(|path| path.exists())
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.autopropose/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".autopropose/config.toml"))
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed. The contents are written to a
    /// sibling temp file and renamed into place.
    pub fn write(path: &Path, config: &ConfigFile) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let write_temp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        };
        write_temp().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    fn publish(&self) -> Option<&PublishDefaults> {
        self.file.publish.as_ref()
    }

    /// Configured publish mode.
    ///
    /// Defaults to `propose`. The value was validated at load time.
    pub fn mode(&self) -> PublishMode {
        self.publish()
            .and_then(|p| p.mode.as_deref())
            .and_then(|m| PublishMode::from_str(m).ok())
            .unwrap_or(PublishMode::Propose)
    }

    /// Labels for new proposals.
    pub fn labels(&self) -> Vec<String> {
        self.publish()
            .and_then(|p| p.labels.clone())
            .unwrap_or_default()
    }

    /// Reviewers for new proposals.
    pub fn reviewers(&self) -> Vec<String> {
        self.publish()
            .and_then(|p| p.reviewers.clone())
            .unwrap_or_default()
    }

    /// Owner of derived branches, if configured.
    pub fn derived_owner(&self) -> Option<&str> {
        self.publish().and_then(|p| p.derived_owner.as_deref())
    }

    /// Whether target maintainers may push to derived branches.
    ///
    /// Defaults to `false`.
    pub fn allow_collaboration(&self) -> bool {
        self.publish()
            .and_then(|p| p.allow_collaboration)
            .unwrap_or(false)
    }

    /// Tag allow-list. Empty means no tags are pushed.
    pub fn tags(&self) -> Vec<String> {
        self.publish()
            .and_then(|p| p.tags.clone())
            .unwrap_or_default()
    }

    /// Whether an unrelated derived branch may be overwritten.
    ///
    /// Defaults to `false`.
    pub fn overwrite_unrelated(&self) -> bool {
        self.publish()
            .and_then(|p| p.overwrite_unrelated)
            .unwrap_or(false)
    }

    /// Directory for working clones, if configured.
    pub fn storage_dir(&self) -> Option<&Path> {
        self.publish().and_then(|p| p.storage_dir.as_deref())
    }

    /// Forge settings (defaults if the section is absent).
    pub fn forge(&self) -> ForgeConfig {
        self.file.forge.clone().unwrap_or_default()
    }

    /// Get the path of the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
