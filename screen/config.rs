use crate::pipeline::{DEFAULT_BATCH_SIZE, PairScreen};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Default AUC cutoff for pair screening.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Default name of the integer label column in input TSV files.
pub const DEFAULT_GROUP_COLUMN: &str = "group";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Run settings for the pair screen, persisted as TOML.
///
/// Every field has a default, so a config file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
    /// Pairs are kept when their AUC is strictly greater than this value.
    pub threshold: f64,
    pub batch_size: usize,
    /// Worker threads; the global rayon pool (one per core) when absent.
    pub threads: Option<usize>,
    pub group_column: String,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
            group_column: DEFAULT_GROUP_COLUMN.to_string(),
        }
    }
}

impl ScreenConfig {
    /// Loads a config from a TOML file and validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the config in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold.is_nan() {
            return Err(ConfigError::InvalidValue {
                field: "threshold",
                reason: "must be a number".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "threads",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.group_column.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "group_column",
                reason: "must name a column".to_string(),
            });
        }
        Ok(())
    }

    /// A screen configured with this threshold, batch size and thread count.
    pub fn pair_screen(&self) -> PairScreen {
        PairScreen::new(self.threshold)
            .batch_size(self.batch_size)
            .threads(self.threads)
    }
}
