//! Scoring configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for clustering, cross-matching and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Average-linkage distance below which groups merge
    pub distance_threshold: f64,
    /// Counterclaim/claim cosine similarity a match must exceed
    pub similarity_cutoff: f64,
    /// Weight of a cluster nobody engaged
    pub unaddressed_multiplier: f64,
    /// Weight of every non-maximal modulator value in the coverage fold.
    /// Unset means `1 - similarity_cutoff`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_rescale: Option<f64>,
    /// Terminal generation outcomes kept per session
    pub generation_log_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 1.45,
            similarity_cutoff: 0.5,
            unaddressed_multiplier: 2.5,
            coverage_rescale: None,
            generation_log_limit: 32,
        }
    }
}

impl ScoringConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// `<config dir>/agora/config.yaml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agora").join("config.yaml"))
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Effective coverage rescale factor.
    pub fn rescale(&self) -> f64 {
        self.coverage_rescale.unwrap_or(1.0 - self.similarity_cutoff)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.similarity_cutoff) {
            return Err(ConfigError::Invalid(format!(
                "similarity_cutoff must be in [0, 1), got {}",
                self.similarity_cutoff
            )));
        }
        if !(self.unaddressed_multiplier.is_finite() && self.unaddressed_multiplier >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "unaddressed_multiplier must be at least 1, got {}",
                self.unaddressed_multiplier
            )));
        }
        if let Some(rescale) = self.coverage_rescale {
            if !(0.0..=1.0).contains(&rescale) {
                return Err(ConfigError::Invalid(format!(
                    "coverage_rescale must be in [0, 1], got {}",
                    rescale
                )));
            }
        }
        if self.generation_log_limit == 0 {
            return Err(ConfigError::Invalid(
                "generation_log_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
