//! Configuration for the piezo inference pipeline.

use crate::core::filter::BoundaryMode;
use crate::core::model::{ModelConfig, DEFAULT_MODEL};
use crate::core::window::WINDOW_SIZE;
use crate::core::windowing::{DROP_RATIO, STRIDE};
use crate::ingest::PIEZO_COLUMN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Sampling rate of the reference recordings.
pub const SAMPLE_RATE_HZ: u32 = 1000;

/// Main configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model identifier looked up in the registry
    pub model: String,

    /// Samples per inference window
    pub window_size: usize,

    /// Advance between window starts
    pub stride: usize,

    /// Fraction of each window edge that is tapered
    pub drop_ratio: f64,

    /// Sampling rate of the input (informational; the filter design is fixed)
    pub sample_rate_hz: u32,

    /// 0-based CSV column holding the piezo signal
    pub piezo_column: usize,

    /// Filter edge handling
    pub boundary: BoundaryMode,

    /// Threads used for window inference
    pub workers: usize,

    /// Inference engine to drive
    pub engine: EngineConfig,

    /// Additional registry entries, merged over the built-in models
    pub extra_models: BTreeMap<String, ModelConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            window_size: WINDOW_SIZE,
            stride: STRIDE,
            drop_ratio: DROP_RATIO,
            sample_rate_hz: SAMPLE_RATE_HZ,
            piezo_column: PIEZO_COLUMN,
            boundary: BoundaryMode::Zero,
            workers: 1,
            engine: EngineConfig::default(),
            extra_models: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("piezo-infer")
            .join("config.json")
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".into()));
        }
        if self.stride == 0 || self.stride >= self.window_size {
            return Err(ConfigError::Invalid(format!(
                "stride must satisfy 0 < stride < window_size ({}), got {}",
                self.window_size, self.stride
            )));
        }
        if !(0.0..0.5).contains(&self.drop_ratio) {
            return Err(ConfigError::Invalid(format!(
                "drop_ratio must be in [0, 0.5), got {}",
                self.drop_ratio
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.sample_rate_hz != SAMPLE_RATE_HZ {
            tracing::warn!(
                sample_rate_hz = self.sample_rate_hz,
                "filter coefficients are designed for {SAMPLE_RATE_HZ} Hz input"
            );
        }
        Ok(())
    }
}

/// Which inference engine the CLI drives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineConfig {
    /// Pass normalized windows straight through (dry run)
    #[default]
    Identity,
    /// HTTP inference service (requires the `remote` feature)
    Remote {
        url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.model, "STAND");
        assert_eq!(config.window_size, 2000);
        assert_eq!(config.stride, 200);
        assert_eq!(config.drop_ratio, 0.05);
        assert_eq!(config.piezo_column, 1);
        assert_eq!(config.boundary, BoundaryMode::Zero);
        assert_eq!(config.engine, EngineConfig::Identity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_stride() {
        let config = PipelineConfig {
            stride: 2000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_drop_ratio() {
        let config = PipelineConfig {
            drop_ratio: 0.6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"model": "SLEEP", "boundary": "reflect"}"#).unwrap();
        assert_eq!(config.model, "SLEEP");
        assert_eq!(config.boundary, BoundaryMode::Reflect);
        assert_eq!(config.window_size, 2000);
    }

    #[test]
    fn test_remote_engine_json() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"engine": {"kind": "remote", "url": "http://127.0.0.1:8500/v1/infer"}}"#,
        )
        .unwrap();
        assert_eq!(
            config.engine,
            EngineConfig::Remote {
                url: "http://127.0.0.1:8500/v1/infer".to_string(),
                timeout_secs: 30,
            }
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("piezo-infer-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let config = PipelineConfig {
            model: "DB".to_string(),
            workers: 4,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("piezo-infer-does-not-exist.json");
        assert_eq!(PipelineConfig::load_from(&path).unwrap(), PipelineConfig::default());
    }
}
