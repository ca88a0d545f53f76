//! Configuration file loader.

use std::path::{Path, PathBuf};

use crate::watcher::PatternError;

use super::LogSentryConfig;

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: logsentry.toml
        search_paths.push(PathBuf::from("logsentry.toml"));

        // 2. User config directory: ~/.config/logsentry/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("logsentry").join("config.toml"));
        }

        Self { search_paths }
    }

    /// Create a config loader with a specific config file path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
        }
    }

    /// Load configuration from the first available file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if no candidate exists, or a read,
    /// parse or sender validation error for the file that was found.
    pub fn load(&self) -> Result<LogSentryConfig, ConfigError> {
        let Some(path) = self.find_config_file() else {
            return Err(ConfigError::NotFound(self.search_paths.clone()));
        };
        let path = resolve_path(&path)?;
        tracing::debug!(path = %path.display(), "Loading config file");
        let mut config = Self::load_from_path(&path)?;
        config.sender.validate()?;
        config.path = Some(path);
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// `.json` files are parsed as JSON, anything else as TOML.
    fn load_from_path(path: &Path) -> Result<LogSentryConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::JsonError {
                path: path.to_path_buf(),
                source: e,
            })
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim `name`, make it absolute against the current directory and check it
/// exists.
///
/// # Errors
///
/// Returns an error for an empty name, or if the file does not exist.
pub fn resolve_path(name: &Path) -> Result<PathBuf, ConfigError> {
    let trimmed = name.to_string_lossy();
    let trimmed = trimmed.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyPath);
    }
    let path = std::path::absolute(trimmed).map_err(|source| ConfigError::MissingFile {
        path: PathBuf::from(trimmed),
        source,
    })?;
    std::fs::metadata(&path).map_err(|source| ConfigError::MissingFile {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Errors for invalid targets and configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Target name should not be empty")]
    EmptyName,

    #[error("Duplicate target name: {0}")]
    DuplicateName(String),

    #[error("Path should be absolute: {0}")]
    RelativePath(PathBuf),

    #[error("Empty file name")]
    EmptyPath,

    #[error("Cannot access {path}: {source}")]
    MissingFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("Period should be greater than zero")]
    ZeroPeriod,

    #[error("Boundary should be greater than zero")]
    ZeroBoundary,

    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("Sender field can't be empty: {0}")]
    MissingSenderField(&'static str),

    #[error("No config file found in {0:?}")]
    NotFound(Vec<PathBuf>),

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },
}
