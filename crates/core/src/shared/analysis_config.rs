use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::bounding_box::CropExpansion;
use crate::shared::constants::{
    BATCH_SAMPLING_INTERVAL_SECONDS, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    DEFAULT_EXTRACTION_TIMEOUT_MS, DEFAULT_MATCH_THRESHOLD, DEFAULT_MERGE_SUGGESTION_THRESHOLD,
    DEFAULT_MIN_SUCCESS_RATE, DEFAULT_RANGE_GAP_SECONDS, ONLINE_SAMPLING_INTERVAL_SECONDS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
}

/// When detections are handed to the clustering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Collect every frame's detections first, then assign in one pass.
    Batch,
    /// Assign each frame's detections as soon as they are extracted.
    Online,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisMode::Batch => write!(f, "batch"),
            AnalysisMode::Online => write!(f, "online"),
        }
    }
}

/// Tunables for one analysis run. Every field can be overridden by the
/// caller; missing JSON fields fall back to the batch defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub mode: AnalysisMode,
    /// Distance below which a detection joins an existing identity.
    ///
    /// Not auto-calibrated. Too low splits one person across several
    /// identities; too high folds distinct people into one.
    pub match_threshold: f64,
    pub range_gap_seconds: f64,
    pub sampling_interval_seconds: f64,
    pub crop_expansion: CropExpansion,
    pub extraction_timeout_ms: u64,
    /// Fraction of frames that must yield detections before the run report
    /// stops carrying a low-coverage warning.
    pub min_success_rate: f64,
    pub merge_suggestion_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::batch()
    }
}

impl AnalysisConfig {
    pub fn batch() -> Self {
        Self {
            mode: AnalysisMode::Batch,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            range_gap_seconds: DEFAULT_RANGE_GAP_SECONDS,
            sampling_interval_seconds: BATCH_SAMPLING_INTERVAL_SECONDS,
            crop_expansion: CropExpansion::default(),
            extraction_timeout_ms: DEFAULT_EXTRACTION_TIMEOUT_MS,
            min_success_rate: DEFAULT_MIN_SUCCESS_RATE,
            merge_suggestion_threshold: DEFAULT_MERGE_SUGGESTION_THRESHOLD,
        }
    }

    /// Online mode samples twice as often for finer-grained progress.
    pub fn online() -> Self {
        Self {
            mode: AnalysisMode::Online,
            sampling_interval_seconds: ONLINE_SAMPLING_INTERVAL_SECONDS,
            ..Self::batch()
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("match_threshold", self.match_threshold)?;
        positive("sampling_interval_seconds", self.sampling_interval_seconds)?;
        positive("crop_expansion.width_scale", self.crop_expansion.width_scale)?;
        positive("crop_expansion.height_scale", self.crop_expansion.height_scale)?;
        positive("merge_suggestion_threshold", self.merge_suggestion_threshold)?;
        if !(self.range_gap_seconds >= 0.0 && self.range_gap_seconds.is_finite()) {
            return Err(ConfigError::OutOfRange {
                field: "range_gap_seconds",
                requirement: "a non-negative number",
                value: self.range_gap_seconds,
            });
        }
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err(ConfigError::OutOfRange {
                field: "min_success_rate",
                requirement: "between 0.0 and 1.0",
                value: self.min_success_rate,
            });
        }
        if self.extraction_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "extraction_timeout_ms",
                requirement: "greater than zero",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AnalysisConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the per-user config if one exists, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/FaceTimeline/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            requirement: "a positive number",
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_batch_defaults() {
        let config = AnalysisConfig::batch();
        assert_eq!(config.mode, AnalysisMode::Batch);
        assert_relative_eq!(config.match_threshold, 0.5);
        assert_relative_eq!(config.range_gap_seconds, 2.0);
        assert_relative_eq!(config.sampling_interval_seconds, 1.0);
        assert_relative_eq!(config.crop_expansion.width_scale, 1.5);
        assert_relative_eq!(config.crop_expansion.height_scale, 2.0);
        assert_eq!(config.extraction_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_online_samples_finer() {
        let config = AnalysisConfig::online();
        assert_eq!(config.mode, AnalysisMode::Online);
        assert_relative_eq!(config.sampling_interval_seconds, 0.5);
        assert_relative_eq!(config.match_threshold, 0.5);
    }

    #[test]
    fn test_defaults_validate() {
        assert!(AnalysisConfig::batch().validate().is_ok());
        assert!(AnalysisConfig::online().validate().is_ok());
    }

    #[rstest]
    #[case::zero_threshold(AnalysisConfig { match_threshold: 0.0, ..AnalysisConfig::batch() })]
    #[case::nan_threshold(AnalysisConfig { match_threshold: f64::NAN, ..AnalysisConfig::batch() })]
    #[case::negative_gap(AnalysisConfig { range_gap_seconds: -1.0, ..AnalysisConfig::batch() })]
    #[case::zero_interval(AnalysisConfig { sampling_interval_seconds: 0.0, ..AnalysisConfig::batch() })]
    #[case::success_rate_above_one(AnalysisConfig { min_success_rate: 1.5, ..AnalysisConfig::batch() })]
    #[case::zero_timeout(AnalysisConfig { extraction_timeout_ms: 0, ..AnalysisConfig::batch() })]
    #[case::zero_crop_scale(AnalysisConfig {
        crop_expansion: CropExpansion { width_scale: 0.0, height_scale: 2.0 },
        ..AnalysisConfig::batch()
    })]
    fn test_validate_rejects(#[case] config: AnalysisConfig) {
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_load_partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"match_threshold": 0.35, "mode": "online"}"#).unwrap();

        let config = AnalysisConfig::load(&path).unwrap();

        assert_relative_eq!(config.match_threshold, 0.35);
        assert_eq!(config.mode, AnalysisMode::Online);
        assert_relative_eq!(config.range_gap_seconds, 2.0);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = AnalysisConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            AnalysisConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"match_threshold": -2.0}"#).unwrap();
        assert!(matches!(
            AnalysisConfig::load(&path),
            Err(ConfigError::OutOfRange { field: "match_threshold", .. })
        ));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = AnalysisConfig::online();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
