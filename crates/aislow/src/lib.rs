//! aislow: explains why a page is predicted to load slowly.
//!
//! Given a trained tree ensemble (LightGBM text dump), a reference population
//! of pages and one page to analyze, aislow
//!
//! 1. attributes the predicted SpeedIndex to the page's features with exact
//!    TreeSHAP values against the population,
//! 2. triages the attributed features into problems and strengths,
//! 3. simulates moving the worst problem to a healthy benchmark value and
//!    re-predicts.
//!
//! # Key Types
//!
//! - [`Forest`] - Read-only tree ensemble (see [`compat::lightgbm`] to load one)
//! - [`Population`] / [`Instance`] - Typed feature data
//! - [`TreeExplainer`] / [`Attribution`] - Exact Shapley attributions
//! - [`Diagnoser`] / [`Diagnosis`] - The full per-page pipeline
//! - [`DiagnosisConfig`] - Thresholds, typing and direction configuration
//!
//! # Example
//!
//! ```ignore
//! use aislow::compat::lightgbm::LgbModel;
//! use aislow::data::io::CsvLoader;
//! use aislow::{DiagnosisConfig, Diagnoser};
//!
//! let config = DiagnosisConfig::builder().build()?;
//! let forest = LgbModel::from_file("model.txt")?.to_forest()?;
//! let population = CsvLoader::from_config(&config).load("pages.csv")?;
//! let diagnoser = Diagnoser::new(&forest, &population, &config)?;
//! let diagnosis = diagnoser.diagnose(&population.row(0))?;
//! ```

// Re-export approx traits for users who want to compare attributions
pub use approx;

pub mod compat;
pub mod config;
pub mod data;
pub mod diagnosis;
pub mod error;
pub mod explainability;
pub mod report;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use config::{ConfigError, DiagnosisConfig};
pub use data::{FeatureMeta, FeatureSchema, FeatureType, Instance, Population};
pub use diagnosis::{
    BenchmarkTable, Classification, CounterfactualSimulator, Diagnoser, Diagnosis,
    FeatureClassifier, ImprovementDirection, SimulationOutcome, SimulationResult,
};
pub use error::{Error, Result};
pub use explainability::{base_value, Attribution, FeatureAttribution, TreeExplainer};
pub use repr::{Forest, Tree, TreeView};
pub use utils::{run_with_threads, Parallelism};
