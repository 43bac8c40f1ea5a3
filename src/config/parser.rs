//! Configuration parser for loading the stack configuration.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with environment values taking precedence over the file.

use crate::error::{ConfigError, Result, StackError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::StackConfig;

/// Configuration parser for loading stack configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(StackError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// An empty document yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StackConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(StackConfig::default());
        }

        let config: StackConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StackError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration for stack {} ({} notification emails)",
            config.stack.name,
            config.notifications.emails.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `APPMETRICS_<SECTION>_<KEY>` (e.g., `APPMETRICS_STACK_NAME`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(config: &mut StackConfig) {
        if let Ok(name) = std::env::var("APPMETRICS_STACK_NAME") {
            debug!("Overriding stack.name from environment");
            config.stack.name = name;
        }

        if let Ok(region) = std::env::var("APPMETRICS_STACK_REGION") {
            debug!("Overriding stack.region from environment");
            config.stack.region = region;
        }

        if let Ok(emails) = std::env::var("APPMETRICS_NOTIFICATION_EMAILS") {
            debug!("Overriding notifications.emails from environment");
            config.notifications.emails = split_email_list(&emails);
        }

        if let Ok(bucket) = std::env::var("APPMETRICS_ASSEMBLY_BUCKET") {
            debug!("Overriding assembly.bucket from environment");
            config.assembly.bucket = Some(bucket);
        }

        if let Ok(prefix) = std::env::var("APPMETRICS_ASSEMBLY_PREFIX") {
            debug!("Overriding assembly.prefix from environment");
            config.assembly.prefix = Some(prefix);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StackError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Splits a comma-separated email list, dropping blank entries.
#[must_use]
pub fn split_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "appmetrics.stack.yaml",
    "appmetrics.stack.yml",
    "stack.yaml",
    "stack.yml",
];

/// Finds the configuration file in the start directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StackError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
