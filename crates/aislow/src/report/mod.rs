//! Rendering diagnoses for people and for tools.
//!
//! - [`TextReport`]: the terminal report (problems, strengths, what-if)
//! - [`JsonReport`]: the same content as JSON, with the full ordered
//!   attribution list a waterfall chart needs
//! - [`FeatureNames`]: display-name substitution used by both
//!
//! Nothing in the diagnosis core formats output; everything user-facing
//! lives here.

mod json;
mod names;
mod text;

pub use json::JsonReport;
pub use names::FeatureNames;
pub use text::{format_thousands, TextReport};

use serde::Serialize;

use crate::data::Population;
use crate::utils::quantile_linear;

/// Target statistics over the reference population.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub n_pages: usize,
    /// Mean of the non-missing targets.
    pub mean_target: Option<f64>,
    pub median_target: Option<f64>,
}

impl PopulationSummary {
    pub fn from_population(population: &Population) -> Self {
        let (mean_target, median_target) = match population.targets() {
            Some(targets) => {
                let finite: Vec<f64> = targets.iter().copied().filter(|t| t.is_finite()).collect();
                let mean = (!finite.is_empty()).then(|| finite.iter().sum::<f64>() / finite.len() as f64);
                (mean, quantile_linear(finite.iter().copied(), 0.5))
            }
            None => (None, None),
        };
        Self {
            n_pages: population.n_samples(),
            mean_target,
            median_target,
        }
    }
}

/// What the report says about the analyzed page beyond its diagnosis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageContext {
    /// Page identifier (URL).
    pub page: Option<String>,
    /// Name of the predicted quantity.
    pub target_name: String,
    /// Measured target value of the page, if known.
    pub actual: Option<f64>,
    pub population: Option<PopulationSummary>,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            page: None,
            target_name: "SpeedIndex".to_string(),
            actual: None,
            population: None,
        }
    }
}

impl PageContext {
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = name.into();
        self
    }

    /// Measured target; NaN is treated as unknown.
    pub fn with_actual(mut self, actual: f64) -> Self {
        self.actual = (!actual.is_nan()).then_some(actual);
        self
    }

    pub fn with_population(mut self, population: PopulationSummary) -> Self {
        self.population = Some(population);
        self
    }
}
