// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

/// Checkpoint identifier every factory resolves by default
pub const MODEL_TYPE: &str = "bert-base-cased";

/// Configuration for locating the pretrained checkpoint
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Hub identifier of the checkpoint (e.g. "bert-base-cased")
    pub id: String,
    /// Branch, tag or commit to resolve files against
    pub revision: String,
    /// Base URL of the model hub
    pub endpoint: String,
    /// Directory where resolved checkpoint files are cached
    pub cache_dir: PathBuf,
    /// Never touch the network; only cached files are usable
    #[serde(default)]
    pub offline: bool,
}

/// Configuration for running the pretrained encoder
#[derive(Debug, Deserialize, Clone)]
pub struct EncoderConfig {
    /// Token budget per sequence, special tokens included
    pub max_sequence_length: usize,
    /// How token states collapse into one vector ("cls" or "mean")
    pub pooling: String,
}

/// Configuration for the document projection head
#[derive(Debug, Deserialize, Clone)]
pub struct DocumentEncoderConfig {
    /// Ordered layer widths of the projection stack
    pub dimensions: Vec<usize>,
    /// Seed for parameter initialization
    #[serde(default)]
    pub seed: u64,
    /// Whether embeddings are L2-normalized after projection
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    /// Saved projection weights; when absent the head is freshly initialized
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

fn default_normalize() -> bool {
    true
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log directory
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Checkpoint-related settings
    pub model: ModelConfig,
    /// Encoder runtime settings
    pub encoder: EncoderConfig,
    /// Projection head settings
    pub document_encoder: DocumentEncoderConfig,
    /// Logging-related settings
    pub logging: LoggingConfig,
}

impl Settings {
    /// Creates a new Settings instance from `./config`, loading sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with RETRIEVAL__
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");

        Self::from_dir(&config_dir)
    }

    /// Loads settings from an explicit configuration directory
    pub fn from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        let local_config = config_dir.join("local.toml");

        // Convert paths to strings and keep them alive
        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let settings = Config::builder()
            .add_source(File::with_name(&default_config_path))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(Environment::with_prefix("RETRIEVAL").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.id.trim().is_empty() {
            return Err(ConfigError::Message("model.id must not be empty".to_string()));
        }

        if !self.model.cache_dir.exists() {
            std::fs::create_dir_all(&self.model.cache_dir).map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to create cache directory at {}: {}",
                    self.model.cache_dir.display(), e
                ))
            })?;
        }

        // [CLS] and [SEP] alone take two slots
        if self.encoder.max_sequence_length < 2 {
            return Err(ConfigError::Message(
                format!("max_sequence_length must be at least 2, got: {}", self.encoder.max_sequence_length)
            ));
        }

        match self.encoder.pooling.to_lowercase().as_str() {
            "cls" | "mean" => {}
            other => return Err(ConfigError::Message(
                format!("Invalid pooling: {}. Must be one of: cls, mean", other)
            )),
        }

        if let Some(pos) = self.document_encoder.dimensions.iter().position(|&d| d == 0) {
            return Err(ConfigError::Message(
                format!("document_encoder.dimensions[{}] must be greater than 0", pos)
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        if let Some(log_dir) = &self.logging.file {
            if !log_dir.exists() {
                std::fs::create_dir_all(log_dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        log_dir.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }
}
