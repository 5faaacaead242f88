//! Triage of attributed features into problems and strengths.

use serde::Serialize;

use crate::explainability::{Attribution, FeatureAttribution};

/// Features split by impact, each ordered by descending `|impact|`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    threshold: f64,
    problems: Vec<FeatureAttribution>,
    strengths: Vec<FeatureAttribution>,
}

impl Classification {
    /// Features with impact above the threshold.
    pub fn problems(&self) -> &[FeatureAttribution] {
        &self.problems
    }

    /// Features with impact at or below the threshold.
    pub fn strengths(&self) -> &[FeatureAttribution] {
        &self.strengths
    }

    /// The highest-impact problem.
    pub fn top_problem(&self) -> Option<&FeatureAttribution> {
        self.problems.first()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Splits attributions at a fixed impact threshold.
///
/// The comparison is on the signed impact: a large negative impact is a
/// strength, never a problem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureClassifier {
    threshold: f64,
}

impl FeatureClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, attribution: &Attribution) -> Classification {
        let mut ranked = attribution.features().to_vec();
        // Stable: equal |impact| keeps schema order
        ranked.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));

        let (problems, strengths) = ranked
            .into_iter()
            .partition(|f| f.impact > self.threshold);
        Classification {
            threshold: self.threshold,
            problems,
            strengths,
        }
    }
}
