//! Session configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, Result};

/// Default cap on the working subset the search runs against.
pub const DEFAULT_SAMPLE_CAP: usize = 10_000;

/// Default cap on the number of inliers fed to the hull.
pub const DEFAULT_HULL_SAMPLE_CAP: usize = 10_000;

/// Configuration for an [`ExtractionSession`](crate::ExtractionSession).
///
/// Distance threshold and iteration count are not here: they are chosen per
/// round by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum size of the sampled cloud the search iterates over.
    /// 0 disables sampling: every iteration sees the full remaining cloud.
    /// Default: 10,000
    pub sample_cap: usize,

    /// Maximum number of inliers passed to the boundary hull.
    /// Default: 10,000
    pub hull_sample_cap: usize,

    /// Random seed for reproducible sessions.
    /// `None` seeds from the thread RNG.
    /// Default: None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
            hull_sample_cap: DEFAULT_HULL_SAMPLE_CAP,
            seed: None,
        }
    }
}

impl ExtractionConfig {
    /// Configuration with a fixed seed; everything else default.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Parse from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ExtractionConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ExtractionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_cap != 0 && self.sample_cap < 3 {
            return Err(ExtractionError::Config(format!(
                "sample_cap must be 0 (disabled) or at least 3, got {}",
                self.sample_cap
            )));
        }
        if self.hull_sample_cap == 0 {
            return Err(ExtractionError::Config(
                "hull_sample_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.sample_cap, 10_000);
        assert_eq!(config.hull_sample_cap, 10_000);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = ExtractionConfig::from_toml_str("seed = 42\n").unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.sample_cap, DEFAULT_SAMPLE_CAP);
    }

    #[test]
    fn toml_roundtrip() {
        let config = ExtractionConfig {
            sample_cap: 0,
            hull_sample_cap: 250,
            seed: Some(7),
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(ExtractionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn file_roundtrip() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let config = ExtractionConfig::seeded(99);
        config.to_file(tmp.path()).unwrap();
        assert_eq!(ExtractionConfig::from_file(tmp.path()).unwrap(), config);
    }

    #[test]
    fn rejects_tiny_sample_cap() {
        let err = ExtractionConfig::from_toml_str("sample_cap = 2\n").unwrap_err();
        assert!(matches!(err, ExtractionError::Config(_)));
    }

    #[test]
    fn rejects_zero_hull_cap() {
        let config = ExtractionConfig {
            hull_sample_cap: 0,
            ..ExtractionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ExtractionError::Config(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ExtractionConfig::from_toml_str("sample_cap = \"lots\"").unwrap_err();
        assert!(matches!(err, ExtractionError::Toml(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ExtractionConfig::from_file("/nonexistent/lidar-planes.toml").unwrap_err();
        assert!(matches!(err, ExtractionError::Io(_)));
    }
}
