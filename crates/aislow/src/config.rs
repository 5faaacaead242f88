//! Diagnosis configuration with builder pattern.
//!
//! [`DiagnosisConfig`] gathers every tunable of a run: the problem
//! threshold, the benchmark quantile, feature typing and exclusion lists,
//! improvement directions and threading. It uses the `bon` crate for builder
//! generation with validation, and can also be read from a JSON file where
//! every field is optional.
//!
//! # Example
//!
//! ```
//! use aislow::DiagnosisConfig;
//!
//! // All defaults
//! let config = DiagnosisConfig::builder().build().unwrap();
//! assert_eq!(config.impact_threshold, 50.0);
//!
//! let config = DiagnosisConfig::builder()
//!     .impact_threshold(100.0)
//!     .benchmark_quantile(0.1)
//!     .higher_is_better(vec!["uses_cdn".into()])
//!     .build()
//!     .unwrap();
//! ```

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::diagnosis::ImprovementDirection;

/// Features the stock model treats as categorical.
pub const DEFAULT_CATEGORICAL_FEATURES: &[&str] = &[
    "uses_cdn",
    "reqCss",
    "reqFont",
    "reqJS",
    "renderBlockingCSS",
    "renderBlockingJS",
    "num_long_tasks",
    "analytics",
    "ads",
    "marketing",
    "fonts_scripts",
    "tagman",
    "chat",
    "_responses_404",
    "is_lcp_preloaded",
    "scripts_defer",
    "scripts_async",
    "scripts_inline",
];

/// Paint timings that are consequences of SpeedIndex rather than causes.
pub const DEFAULT_EXCLUDED_FEATURES: &[&str] = &[
    "FirstMeaningfulPaint",
    "FirstImagePaint",
    "FirstContentfulPaint",
    "LargestContentfulPaint",
];

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Impact threshold must be finite.
    InvalidThreshold(f64),
    /// Benchmark quantile must be in [0, 1].
    InvalidQuantile(f64),
    /// A feature is listed as both categorical and excluded.
    ConflictingFeature { feature: String },
    /// The config file could not be read.
    Read { path: PathBuf, message: String },
    /// The config file is not valid JSON for this schema.
    Parse { path: PathBuf, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidThreshold(v) => write!(f, "impact_threshold must be finite, got {}", v),
            Self::InvalidQuantile(v) => {
                write!(f, "benchmark_quantile must be in [0, 1], got {}", v)
            }
            Self::ConflictingFeature { feature } => write!(
                f,
                "feature `{}` is listed as both categorical and excluded",
                feature
            ),
            Self::Read { path, message } => {
                write!(f, "cannot read config {}: {}", path.display(), message)
            }
            Self::Parse { path, message } => {
                write!(f, "invalid config {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// DiagnosisConfig
// =============================================================================

/// Configuration for one diagnosis run.
///
/// Feature lists are by column name. Names that do not appear in the model
/// or data are ignored with a warning at the point of use.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosisConfig {
    /// Impacts strictly above this value are problems. Default: 50.0.
    #[builder(default = 50.0)]
    pub impact_threshold: f64,

    /// Benchmark quantile for lower-is-better features. Default: 0.25.
    ///
    /// Higher-is-better features use `1 - benchmark_quantile`.
    #[builder(default = 0.25)]
    pub benchmark_quantile: f64,

    /// Columns typed Categorical at load time.
    #[builder(default = to_strings(DEFAULT_CATEGORICAL_FEATURES))]
    pub categorical_features: Vec<String>,

    /// Columns dropped at load time.
    #[builder(default = to_strings(DEFAULT_EXCLUDED_FEATURES))]
    pub excluded_features: Vec<String>,

    /// Target column. Default: `SpeedIndex`.
    #[builder(default = String::from("SpeedIndex"))]
    pub target_column: String,

    /// Row identifier column. Default: `page`.
    #[builder(default = String::from("page"))]
    pub id_column: String,

    /// Features where higher values are healthier.
    #[builder(default)]
    pub higher_is_better: Vec<String>,

    /// Infer improvement directions from the feature/target correlation.
    /// Explicit `higher_is_better` entries still win. Default: false.
    #[builder(default)]
    pub infer_directions: bool,

    /// Thread count: 0 = auto, 1 = sequential. Default: 0.
    #[builder(default)]
    pub n_threads: usize,
}

/// Custom finishing function that validates the config.
impl<S: diagnosis_config_builder::IsComplete> DiagnosisConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is invalid:
    /// - non-finite `impact_threshold`
    /// - `benchmark_quantile` outside [0, 1]
    /// - a feature both categorical and excluded
    pub fn build(self) -> Result<DiagnosisConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl DiagnosisConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.impact_threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold(self.impact_threshold));
        }
        if !(0.0..=1.0).contains(&self.benchmark_quantile) {
            return Err(ConfigError::InvalidQuantile(self.benchmark_quantile));
        }
        if let Some(feature) = self
            .categorical_features
            .iter()
            .find(|f| self.excluded_features.contains(f))
        {
            return Err(ConfigError::ConflictingFeature {
                feature: feature.clone(),
            });
        }
        Ok(())
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_json_str(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Whether `feature` is configured as categorical.
    pub fn is_categorical(&self, feature: &str) -> bool {
        self.categorical_features.iter().any(|f| f == feature)
    }

    /// Whether `column` is dropped at load time.
    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_features.iter().any(|f| f == column)
    }

    /// Configured improvement direction of `feature`.
    pub fn direction(&self, feature: &str) -> ImprovementDirection {
        if self.higher_is_better.iter().any(|f| f == feature) {
            ImprovementDirection::HigherIsBetter
        } else {
            ImprovementDirection::LowerIsBetter
        }
    }
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = DiagnosisConfig::builder().build().unwrap();
        assert_eq!(config.impact_threshold, 50.0);
        assert_eq!(config.benchmark_quantile, 0.25);
        assert_eq!(config.target_column, "SpeedIndex");
        assert_eq!(config.id_column, "page");
        assert_eq!(config.n_threads, 0);
        assert!(!config.infer_directions);
        assert!(config.is_categorical("uses_cdn"));
        assert!(config.is_excluded("FirstContentfulPaint"));
        assert_eq!(config, DiagnosisConfig::default());
    }

    #[test]
    fn invalid_quantile() {
        let result = DiagnosisConfig::builder().benchmark_quantile(1.5).build();
        assert!(matches!(result, Err(ConfigError::InvalidQuantile(_))));
        let result = DiagnosisConfig::builder().benchmark_quantile(-0.1).build();
        assert!(matches!(result, Err(ConfigError::InvalidQuantile(_))));
    }

    #[test]
    fn quantile_boundaries_are_valid() {
        assert!(DiagnosisConfig::builder().benchmark_quantile(0.0).build().is_ok());
        assert!(DiagnosisConfig::builder().benchmark_quantile(1.0).build().is_ok());
    }

    #[test]
    fn invalid_threshold() {
        let result = DiagnosisConfig::builder().impact_threshold(f64::NAN).build();
        assert!(matches!(result, Err(ConfigError::InvalidThreshold(_))));
    }

    #[test]
    fn negative_threshold_is_valid() {
        assert!(DiagnosisConfig::builder().impact_threshold(-10.0).build().is_ok());
    }

    #[test]
    fn conflicting_feature() {
        let result = DiagnosisConfig::builder()
            .categorical_features(vec!["ads".into()])
            .excluded_features(vec!["ads".into()])
            .build();
        assert_eq!(
            result,
            Err(ConfigError::ConflictingFeature {
                feature: "ads".into()
            })
        );
    }

    #[test]
    fn direction_lookup() {
        let config = DiagnosisConfig::builder()
            .higher_is_better(vec!["uses_cdn".into()])
            .build()
            .unwrap();
        assert_eq!(config.direction("uses_cdn"), ImprovementDirection::HigherIsBetter);
        assert_eq!(config.direction("TTFB"), ImprovementDirection::LowerIsBetter);
    }

    #[test]
    fn json_partial_fields_take_defaults() {
        let config =
            DiagnosisConfig::from_json_str(r#"{ "impact_threshold": 75, "n_threads": 2 }"#).unwrap();
        assert_eq!(config.impact_threshold, 75.0);
        assert_eq!(config.n_threads, 2);
        assert_eq!(config.benchmark_quantile, 0.25);
        assert!(config.is_categorical("reqJS"));
    }

    #[test]
    fn json_unknown_field_rejected() {
        let result = DiagnosisConfig::from_json_str(r#"{ "impact_treshold": 75 }"#);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn json_is_validated() {
        let result = DiagnosisConfig::from_json_str(r#"{ "benchmark_quantile": 2.0 }"#);
        assert!(matches!(result, Err(ConfigError::InvalidQuantile(_))));
    }

    #[test]
    fn json_file_roundtrip() {
        let config = DiagnosisConfig::builder()
            .impact_threshold(20.0)
            .higher_is_better(vec!["uses_cdn".into()])
            .build()
            .unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(DiagnosisConfig::from_json_file(file.path()).unwrap(), config);
    }

    #[test]
    fn json_file_missing() {
        let result = DiagnosisConfig::from_json_file("/nonexistent/aislow.json");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
