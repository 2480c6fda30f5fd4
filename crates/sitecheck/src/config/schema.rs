use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{FeatureCatalog, FeatureSpec};
use crate::error::ConfigError;
use crate::upload::{NormalizeOptions, UploadSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub storage_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Full replacement for the built-in feature table.
    #[serde(default)]
    pub features: Option<Vec<FeatureSpec>>,
}

impl Config {
    /// Database location, falling back to the per-user default.
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database_path {
            Some(ref path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }

    pub fn catalog(&self) -> Result<FeatureCatalog, ConfigError> {
        match self.features {
            Some(ref features) => FeatureCatalog::new(features.clone()),
            None => Ok(FeatureCatalog::default()),
        }
    }

    pub fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            normalize: NormalizeOptions {
                max_dimension: self.upload.max_dimension,
                jpeg_quality: self.upload.jpeg_quality,
            },
            timeout: Duration::from_secs(self.upload.timeout_secs),
            max_concurrent: self.upload.max_concurrent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_dimension() -> u32 {
    1920
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
