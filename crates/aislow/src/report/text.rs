//! Terminal report.

use std::fmt;

use super::{FeatureNames, PageContext};
use crate::diagnosis::{BenchmarkTable, Diagnosis, NotSimulatableReason, SimulationOutcome};
use crate::explainability::FeatureAttribution;

const RULE: &str = "---------------------------------------";
const BANNER: &str = "---------     EH, I SLOW?     ---------";

/// Human-readable report of one diagnosis.
///
/// Lists the top problems and strengths by display name, then the what-if
/// section. Rendered through [`fmt::Display`].
#[derive(Clone, Copy, Debug)]
pub struct TextReport<'a> {
    diagnosis: &'a Diagnosis,
    names: &'a FeatureNames,
    context: &'a PageContext,
    benchmarks: Option<&'a BenchmarkTable>,
    max_problems: usize,
    max_strengths: usize,
}

impl<'a> TextReport<'a> {
    pub fn new(diagnosis: &'a Diagnosis, names: &'a FeatureNames, context: &'a PageContext) -> Self {
        Self {
            diagnosis,
            names,
            context,
            benchmarks: None,
            max_problems: 5,
            max_strengths: 3,
        }
    }

    /// Benchmarks used to label the what-if target with its percentile.
    pub fn with_benchmarks(mut self, benchmarks: &'a BenchmarkTable) -> Self {
        self.benchmarks = Some(benchmarks);
        self
    }

    pub fn with_limits(mut self, max_problems: usize, max_strengths: usize) -> Self {
        self.max_problems = max_problems;
        self.max_strengths = max_strengths;
        self
    }

    fn name<'n>(&'n self, feature: &'n str) -> &'n str {
        self.names.display(feature)
    }

    fn write_population(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(summary) = &self.context.population else {
            return Ok(());
        };
        let target = &self.context.target_name;
        writeln!(f, "Training data: {} pages", summary.n_pages)?;
        if let Some(mean) = summary.mean_target {
            writeln!(f, "  Average {target}: {mean:.0} ms")?;
        }
        if let Some(median) = summary.median_target {
            writeln!(f, "  Median {target}: {median:.0} ms")?;
        }
        Ok(())
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = &self.context.target_name;
        let predicted = self.diagnosis.attribution.prediction();
        writeln!(f, "\n\n{RULE}\n{BANNER}\n{RULE}")?;
        writeln!(f, "Page: {}", self.context.page.as_deref().unwrap_or("(unnamed)"))?;
        if let Some(actual) = self.context.actual {
            writeln!(f, "{target}: {actual:.0}ms (actual)")?;
        }
        writeln!(f, "Predicted {target}: {predicted:.0}ms")?;
        if let Some(actual) = self.context.actual {
            writeln!(f, "Prediction error: {:.0}ms", (actual - predicted).abs())?;
        }
        Ok(())
    }

    fn write_features(
        &self,
        f: &mut fmt::Formatter<'_>,
        features: &[FeatureAttribution],
        limit: usize,
        sign: &str,
    ) -> fmt::Result {
        for feature in features.iter().take(limit) {
            writeln!(f, "  * {} = {}", self.name(&feature.name), format_value(feature.value))?;
            writeln!(f, "    └─ Impact: {sign}{:.0} ms", feature.impact)?;
        }
        Ok(())
    }

    fn write_simulation(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sim = &self.diagnosis.simulation;
        let target = &self.context.target_name;
        writeln!(f, "\n--- What-If Simulation ---")?;

        let feature = sim.target_feature.as_deref().unwrap_or_default();
        let name = self.name(feature);
        match sim.outcome {
            SimulationOutcome::NotSimulatable(reason) => {
                let why = match reason {
                    NotSimulatableReason::NoProblems => return writeln!(f, "No problems to simulate."),
                    NotSimulatableReason::Categorical => "not a numeric feature",
                    NotSimulatableReason::NoBenchmark => "no benchmark value",
                    NotSimulatableReason::MissingValue => "value is missing",
                };
                writeln!(f, "Cannot simulate '{name}' ({why}).")?;
                writeln!(f, "Skipping simulation.")
            }
            SimulationOutcome::AlreadyOptimal => {
                writeln!(f, "Top problem '{name}' is already at or better than the 'good' benchmark.")?;
                writeln!(f, "No simulation needed.")
            }
            SimulationOutcome::Simulated { improvement } => {
                let from = sim.original.value_by_name(feature).unwrap_or(f64::NAN);
                let to = sim.benchmark.unwrap_or(f64::NAN);
                writeln!(f, "  #1 problem is {name}")?;
                write!(
                    f,
                    "  Improve '{name}' from {} to 'good' benchmark {}",
                    format_value(from),
                    format_value(to)
                )?;
                match self.benchmarks.and_then(|b| b.get(feature)) {
                    Some(benchmark) => writeln!(f, " ({} percentile)", ordinal(benchmark.quantile))?,
                    None => writeln!(f)?,
                }
                let before = sim.prediction_before.unwrap_or(f64::NAN);
                let after = sim.prediction_after.unwrap_or(f64::NAN);
                if improvement > 0.0 {
                    writeln!(f, "  Estimated {target} Improvement: {improvement:.0} ms")?;
                    writeln!(f, "  └─ (from {before:.0}ms to {after:.0}ms)")
                } else {
                    writeln!(f, "  No significant improvement predicted (Est: {improvement:.0} ms).")
                }
            }
        }
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_population(f)?;
        self.write_header(f)?;

        let classification = &self.diagnosis.classification;
        writeln!(f, "\n--- Top Problems (Areas for Improvement) ---")?;
        if classification.problems().is_empty() {
            writeln!(f, "No significant problems found.")?;
        } else {
            self.write_features(f, classification.problems(), self.max_problems, "+")?;
        }

        writeln!(f, "\n--- Top Strengths (What's Working Well) ---")?;
        if classification.strengths().is_empty() {
            writeln!(f, "No significant strengths found.")?;
        } else {
            self.write_features(f, classification.strengths(), self.max_strengths, "")?;
        }

        self.write_simulation(f)
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "missing".to_string()
    } else {
        format_thousands(value)
    }
}

/// Round to an integer and group digits by thousands: `1234567.8` → `1,234,568`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(rounded.len() + rounded.len() / 3 + 1);
    if value < 0.0 && rounded.bytes().any(|b| b != b'0') {
        out.push('-');
    }
    for (i, c) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `0.25` → `25th`, `0.01` → `1st`.
fn ordinal(quantile: f64) -> String {
    let pct = (quantile * 100.0).round() as i64;
    let suffix = match (pct % 10, pct % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{pct}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagnosisConfig;
    use crate::data::{FeatureMeta, FeatureSchema, Instance, Population};
    use crate::diagnosis::Diagnoser;
    use crate::repr::Forest;
    use crate::utils::Parallelism;
    use crate::report::PopulationSummary;
    use ndarray::array;
    use rstest::rstest;
    use std::sync::Arc;

    fn setup() -> (Forest, Population) {
        let schema = Arc::new(FeatureSchema::from_features(vec![
            FeatureMeta::numeric("TTFB"),
            FeatureMeta::categorical("uses_cdn"),
        ]));
        let mut forest = Forest::new(Arc::clone(&schema)).with_base_score(2000.0);
        forest.push_tree(crate::tree! {
            0 => num(0, 500.0, L) -> 1, 2,
            1 => leaf(-300.0),
            2 => leaf(600.0),
        });
        forest.push_tree(crate::tree! {
            0 => cat(1, [1], L) -> 1, 2,
            1 => leaf(100.0),
            2 => leaf(-100.0),
        });
        let pop = Population::new(
            schema,
            array![[100.0, 1.0], [200.0, 1.0], [300.0, 0.0], [900.0, 1.0]],
        )
        .unwrap()
        .with_targets(vec![1500.0, 1800.0, 2200.0, 2600.0])
        .unwrap();
        (forest, pop)
    }

    fn render(values: Vec<f64>) -> String {
        let (forest, pop) = setup();
        let diagnoser =
            Diagnoser::with_parallelism(&forest, &pop, &DiagnosisConfig::default(), Parallelism::Sequential)
                .unwrap();
        let x = Instance::new(Arc::clone(forest.schema()), values).unwrap();
        let diagnosis = diagnoser.diagnose(&x).unwrap();
        let context = PageContext::default()
            .with_page("https://slow.example")
            .with_actual(2900.0)
            .with_population(PopulationSummary::from_population(&pop));
        let names = FeatureNames::builtin();
        TextReport::new(&diagnosis, &names, &context)
            .with_benchmarks(diagnoser.benchmarks())
            .to_string()
    }

    #[test]
    fn slow_page_report() {
        let text = render(vec![1200.0, 0.0]);
        assert!(text.starts_with("Training data: 4 pages\n  Average SpeedIndex: 2025 ms\n"));
        assert!(text.contains(BANNER));
        assert!(text.contains("Page: https://slow.example"));
        assert!(text.contains("SpeedIndex: 2900ms (actual)"));
        assert!(text.contains("Predicted SpeedIndex: 2700ms"));
        assert!(text.contains("Prediction error: 200ms"));
        assert!(text.contains("  * Time To First Byte (ms) = 1,200\n    └─ Impact: +675 ms"));
        assert!(text.contains("  #1 problem is Time To First Byte (ms)"));
        assert!(text.contains("from 1,200 to 'good' benchmark 175 (25th percentile)"));
        assert!(text.contains("Estimated SpeedIndex Improvement: 900 ms"));
        assert!(text.contains("└─ (from 2700ms to 1800ms)"));
    }

    #[test]
    fn fast_page_report() {
        let text = render(vec![100.0, 1.0]);
        assert!(text.contains("No significant problems found."));
        assert!(text.contains("No problems to simulate."));
    }

    #[test]
    fn categorical_top_problem() {
        // uses_cdn = 0 costs 150; TTFB at 400 saves 225 (a strength)
        let text = render(vec![400.0, 0.0]);
        assert!(text.contains("Cannot simulate 'Uses CDN (Boolean)' (not a numeric feature)."));
    }

    #[rstest]
    #[case(0.0, "0")]
    #[case(999.4, "999")]
    #[case(1000.0, "1,000")]
    #[case(1234567.8, "1,234,568")]
    #[case(-45210.0, "-45,210")]
    #[case(-0.2, "0")]
    fn thousands(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_thousands(value), expected);
    }

    #[rstest]
    #[case(0.25, "25th")]
    #[case(0.75, "75th")]
    #[case(0.01, "1st")]
    #[case(0.02, "2nd")]
    #[case(0.03, "3rd")]
    #[case(0.11, "11th")]
    #[case(0.22, "22nd")]
    fn ordinals(#[case] q: f64, #[case] expected: &str) {
        assert_eq!(ordinal(q), expected);
    }
}
