//! Loader configuration: the ordered search-path list and the script
//! extension, with optional ingestion from the environment or a plain
//! line-oriented config file.

use std::env;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

/// Environment variable holding a colon-separated search path, consulted by
/// [`LoaderConfig::from_env`].
pub const SEARCH_PATH_ENV: &str = "MODUS_PATH";

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    ReadError(String),
    /// A line in the config file was not understood.
    ParseError(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Bad config line: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Static configuration for a loader context.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Ordered list of root directories searched for bare specifiers and by
    /// the legacy importer tree.
    pub search_path: Vec<String>,
    /// Extension (without the dot) of loadable script files.
    pub script_extension: String,
}

impl LoaderConfig {
    pub fn new() -> Self {
        LoaderConfig {
            search_path: Vec::new(),
            script_extension: "js".to_string(),
        }
    }

    pub fn with_search_path(roots: Vec<String>) -> Self {
        LoaderConfig {
            search_path: roots,
            script_extension: "js".to_string(),
        }
    }

    /// Seed the search path from `MODUS_PATH` (colon-separated, empty
    /// entries skipped).
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(raw) = env::var(SEARCH_PATH_ENV) {
            config.search_path = raw
                .split(':')
                .filter(|entry| !entry.is_empty())
                .map(|entry| entry.to_string())
                .collect();
        }
        config
    }

    /// Load configuration from a file of `key = value` lines.
    ///
    /// Recognized keys: `searchPath` (colon-separated) and `extension`.
    /// Blank lines and `#` comments are skipped.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.find('=') {
                Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
                None => return Err(ConfigError::ParseError(line.to_string())),
            };
            match key {
                "searchPath" => {
                    config.search_path = value
                        .split(':')
                        .filter(|entry| !entry.is_empty())
                        .map(|entry| entry.to_string())
                        .collect();
                }
                "extension" => {
                    config.script_extension = value.to_string();
                }
                _ => return Err(ConfigError::ParseError(line.to_string())),
            }
        }
        Ok(config)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}
