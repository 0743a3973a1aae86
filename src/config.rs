use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineOptions;
use crate::remote::GITHUB_API_URL;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    fn default_of(value: T) -> Self {
        Self::new(value, ConfigSource::Default)
    }

    fn set_from_file(&mut self, value: Option<T>) {
        if let Some(value) = value {
            *self = Self::new(value, ConfigSource::File);
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database holding drafts and the credential
    pub database_path: ConfigValue<PathBuf>,
    /// Base URL of the GitHub REST API
    pub api_url: ConfigValue<String>,
    /// Branch batch commits are made on
    pub branch: ConfigValue<String>,
    /// Quiet period before an edit is written to the draft cache
    pub autosave_delay_ms: ConfigValue<u64>,
    /// Directories listed as editable documents
    pub content_dirs: ConfigValue<Vec<String>>,
    /// Directory uploaded images are placed in
    pub assets_dir: ConfigValue<String>,
    pub list_concurrency: ConfigValue<usize>,
    pub blob_concurrency: ConfigValue<usize>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    api_url: Option<String>,
    branch: Option<String>,
    autosave_delay_ms: Option<u64>,
    content_dirs: Option<Vec<String>>,
    assets_dir: Option<String>,
    list_concurrency: Option<usize>,
    blob_concurrency: Option<usize>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let defaults = EngineOptions::default();

        let mut database_path =
            ConfigValue::default_of(Self::default_data_dir().join("loomsync.db"));
        let mut api_url = ConfigValue::default_of(GITHUB_API_URL.to_string());
        let mut branch = ConfigValue::default_of(defaults.branch);
        let mut autosave_delay_ms =
            ConfigValue::default_of(defaults.autosave_delay.as_millis() as u64);
        let mut content_dirs = ConfigValue::default_of(defaults.content_dirs);
        let mut assets_dir = ConfigValue::default_of(defaults.assets_dir);
        let mut list_concurrency = ConfigValue::default_of(defaults.list_concurrency);
        let mut blob_concurrency = ConfigValue::default_of(defaults.blob_concurrency);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            api_url.set_from_file(file_config.api_url);
            branch.set_from_file(file_config.branch);
            autosave_delay_ms.set_from_file(file_config.autosave_delay_ms);
            content_dirs.set_from_file(file_config.content_dirs);
            assets_dir.set_from_file(file_config.assets_dir);
            list_concurrency.set_from_file(file_config.list_concurrency);
            blob_concurrency.set_from_file(file_config.blob_concurrency);
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("LOOMSYNC_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("LOOMSYNC_API_URL") {
            api_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(name) = std::env::var("LOOMSYNC_BRANCH") {
            branch = ConfigValue::new(name, ConfigSource::Environment);
        }
        if let Ok(delay) = std::env::var("LOOMSYNC_AUTOSAVE_DELAY_MS") {
            let ms = delay.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidEnv("LOOMSYNC_AUTOSAVE_DELAY_MS".to_string(), delay.clone())
            })?;
            autosave_delay_ms = ConfigValue::new(ms, ConfigSource::Environment);
        }

        Ok(Self {
            database_path,
            api_url,
            branch,
            autosave_delay_ms,
            content_dirs,
            assets_dir,
            list_concurrency,
            blob_concurrency,
            config_file,
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            branch: self.branch.value.clone(),
            content_dirs: self.content_dirs.value.clone(),
            assets_dir: self.assets_dir.value.clone(),
            autosave_delay: Duration::from_millis(self.autosave_delay_ms.value),
            list_concurrency: self.list_concurrency.value.max(1),
            blob_concurrency: self.blob_concurrency.value.max(1),
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/loomsync/
    /// - macOS: ~/Library/Application Support/loomsync/
    /// - Windows: %APPDATA%/loomsync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("loomsync")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/loomsync/
    /// - macOS: ~/Library/Application Support/loomsync/
    /// - Windows: %APPDATA%/loomsync/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("loomsync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    /// Environment variable name and its unparsable value
    InvalidEnv(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value '{}' for {}", value, name)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError(_, e) => Some(e),
            ConfigError::ParseError(_, e) => Some(e),
            ConfigError::InvalidEnv(..) => None,
        }
    }
}
