//! What-if simulation: move the worst problem to its benchmark and re-predict.

use serde::Serialize;

use super::benchmark::BenchmarkTable;
use super::classify::Classification;
use crate::data::Instance;
use crate::error::Error;
use crate::repr::Forest;

/// Why no simulation was run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotSimulatableReason {
    /// No feature is above the impact threshold.
    NoProblems,
    /// The top problem is categorical; there is no value to move toward.
    Categorical,
    /// The top problem has no benchmark (no finite population values).
    NoBenchmark,
    /// The instance has no value for the top problem.
    MissingValue,
}

/// Disposition of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SimulationOutcome {
    /// `improvement = prediction_before - prediction_after`, not clamped.
    Simulated { improvement: f64 },
    /// The value is already at least as healthy as the benchmark.
    AlreadyOptimal,
    NotSimulatable(NotSimulatableReason),
}

/// Result of simulating one instance.
///
/// `modified` differs from `original` in at most the target feature.
/// Predictions are present only when a re-prediction was run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResult {
    pub original: Instance,
    pub modified: Instance,
    /// Name of the top problem, if there was one.
    pub target_feature: Option<String>,
    pub benchmark: Option<f64>,
    pub prediction_before: Option<f64>,
    pub prediction_after: Option<f64>,
    pub outcome: SimulationOutcome,
}

impl SimulationResult {
    fn unchanged(
        instance: &Instance,
        target_feature: Option<String>,
        benchmark: Option<f64>,
        outcome: SimulationOutcome,
    ) -> Self {
        Self {
            original: instance.clone(),
            modified: instance.clone(),
            target_feature,
            benchmark,
            prediction_before: None,
            prediction_after: None,
            outcome,
        }
    }

    /// Predicted improvement, if simulated.
    pub fn improvement(&self) -> Option<f64> {
        match self.outcome {
            SimulationOutcome::Simulated { improvement } => Some(improvement),
            _ => None,
        }
    }
}

/// Re-predicts an instance with its top problem set to the benchmark.
#[derive(Clone, Copy, Debug)]
pub struct CounterfactualSimulator<'a> {
    forest: &'a Forest,
    benchmarks: &'a BenchmarkTable,
}

impl<'a> CounterfactualSimulator<'a> {
    pub fn new(forest: &'a Forest, benchmarks: &'a BenchmarkTable) -> Self {
        Self { forest, benchmarks }
    }

    /// Simulate fixing the single highest-impact problem of `classification`.
    ///
    /// Gating, in order: no problems, categorical top problem, missing
    /// benchmark, missing value, value already at least as good as the
    /// benchmark (by the benchmark's direction). Only when every gate passes
    /// is the forest queried.
    ///
    /// # Errors
    ///
    /// Fails if the instance does not match the forest's schema.
    pub fn simulate(
        &self,
        instance: &Instance,
        classification: &Classification,
    ) -> Result<SimulationResult, Error> {
        let Some(top) = classification.top_problem() else {
            return Ok(not_simulatable(instance, None, None, NotSimulatableReason::NoProblems));
        };
        let target = Some(top.name.clone());

        if top.feature_type.is_categorical() {
            return Ok(not_simulatable(instance, target, None, NotSimulatableReason::Categorical));
        }
        let Some(benchmark) = self.benchmarks.get(&top.name) else {
            return Ok(not_simulatable(instance, target, None, NotSimulatableReason::NoBenchmark));
        };
        let bench = Some(benchmark.value);

        let index = instance.schema().feature_index(&top.name);
        let value = index.map(|i| instance.value(i)).unwrap_or(f64::NAN);
        let Some(index) = index.filter(|_| !value.is_nan()) else {
            return Ok(not_simulatable(instance, target, bench, NotSimulatableReason::MissingValue));
        };

        if benchmark.direction.is_at_least_as_good(value, benchmark.value) {
            tracing::debug!(feature = %top.name, value, benchmark = benchmark.value, "already optimal");
            return Ok(SimulationResult::unchanged(
                instance,
                target,
                bench,
                SimulationOutcome::AlreadyOptimal,
            ));
        }

        let modified = instance.with_value(index, benchmark.value);
        let before = self.forest.predict(instance)?;
        let after = self.forest.predict(&modified)?;
        let improvement = before - after;
        tracing::debug!(feature = %top.name, before, after, improvement, "simulated fix");

        Ok(SimulationResult {
            original: instance.clone(),
            modified,
            target_feature: target,
            benchmark: bench,
            prediction_before: Some(before),
            prediction_after: Some(after),
            outcome: SimulationOutcome::Simulated { improvement },
        })
    }
}

fn not_simulatable(
    instance: &Instance,
    target: Option<String>,
    benchmark: Option<f64>,
    reason: NotSimulatableReason,
) -> SimulationResult {
    SimulationResult::unchanged(instance, target, benchmark, SimulationOutcome::NotSimulatable(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FeatureMeta, FeatureSchema, FeatureType, Population};
    use crate::diagnosis::{FeatureClassifier, ImprovementDirection, ImprovementDirections};
    use crate::explainability::{Attribution, FeatureAttribution};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::sync::Arc;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::from_features(vec![
            FeatureMeta::numeric("ttfb"),
            FeatureMeta::categorical("uses_cdn"),
            FeatureMeta::numeric("cache_ratio"),
        ]))
    }

    fn forest() -> Forest {
        let mut forest = Forest::new(schema()).with_base_score(1000.0);
        forest.push_tree(crate::tree! {
            0 => num(0, 300.0, L) -> 1, 2,
            1 => leaf(0.0),
            2 => leaf(800.0),
        });
        forest.push_tree(crate::tree! {
            0 => num(2, 0.5, L) -> 1, 2,
            1 => leaf(200.0),
            2 => leaf(0.0),
        });
        forest
    }

    fn benchmarks() -> BenchmarkTable {
        let pop = Population::new(
            schema(),
            array![[100.0, 1.0, 0.9], [200.0, 0.0, 0.8], [300.0, 1.0, 0.7], [400.0, 0.0, 0.1]],
        )
        .unwrap();
        let directions =
            ImprovementDirections::new().with("cache_ratio", ImprovementDirection::HigherIsBetter);
        BenchmarkTable::from_population_with(&pop, 0.25, &directions).unwrap()
    }

    fn classification_of(top: &str, feature_type: FeatureType) -> Classification {
        let attribution = Attribution::new(
            0.0,
            100.0,
            vec![FeatureAttribution {
                name: top.into(),
                feature_type,
                value: 0.0,
                impact: 100.0,
            }],
        );
        FeatureClassifier::new(50.0).classify(&attribution)
    }

    fn instance(values: Vec<f64>) -> Instance {
        Instance::new(schema(), values).unwrap()
    }

    #[test]
    fn simulates_numeric_problem() {
        let forest = forest();
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let x = instance(vec![900.0, 1.0, 0.9]);

        let r = sim.simulate(&x, &classification_of("ttfb", FeatureType::Numeric)).unwrap();
        assert_eq!(r.target_feature.as_deref(), Some("ttfb"));
        assert_abs_diff_eq!(r.benchmark.unwrap(), 175.0, epsilon = 1e-12);
        assert_eq!(r.modified.value(0), r.benchmark.unwrap());
        assert_eq!(r.modified.value(2), 0.9);
        assert_eq!(r.prediction_before, Some(1800.0));
        assert_eq!(r.prediction_after, Some(1000.0));
        assert_eq!(r.improvement(), Some(800.0));
        assert_eq!(r.original, x);
    }

    #[test]
    fn improvement_is_not_clamped() {
        // Moving below the split threshold is not always good for a model
        let mut forest = Forest::new(schema());
        forest.push_tree(crate::tree! {
            0 => num(0, 300.0, L) -> 1, 2,
            1 => leaf(50.0),
            2 => leaf(10.0),
        });
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let r = sim
            .simulate(&instance(vec![900.0, 1.0, 0.9]), &classification_of("ttfb", FeatureType::Numeric))
            .unwrap();
        assert_eq!(r.improvement(), Some(-40.0));
    }

    #[test]
    fn no_problems() {
        let forest = forest();
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let empty = FeatureClassifier::new(50.0).classify(&Attribution::new(0.0, 0.0, Vec::new()));
        let x = instance(vec![900.0, 1.0, 0.9]);
        let r = sim.simulate(&x, &empty).unwrap();
        assert_eq!(
            r.outcome,
            SimulationOutcome::NotSimulatable(NotSimulatableReason::NoProblems)
        );
        assert!(r.target_feature.is_none());
        assert_eq!(r.modified, x);
    }

    #[test]
    fn categorical_problem() {
        let forest = forest();
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let x = instance(vec![900.0, 1.0, 0.9]);
        let r = sim
            .simulate(&x, &classification_of("uses_cdn", FeatureType::Categorical))
            .unwrap();
        assert_eq!(
            r.outcome,
            SimulationOutcome::NotSimulatable(NotSimulatableReason::Categorical)
        );
        assert_eq!(r.modified, x);
        assert!(r.prediction_before.is_none());
    }

    #[test]
    fn no_benchmark() {
        let forest = forest();
        let benchmarks = BenchmarkTable::default();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let r = sim
            .simulate(&instance(vec![900.0, 1.0, 0.9]), &classification_of("ttfb", FeatureType::Numeric))
            .unwrap();
        assert_eq!(
            r.outcome,
            SimulationOutcome::NotSimulatable(NotSimulatableReason::NoBenchmark)
        );
    }

    #[test]
    fn missing_value() {
        let forest = forest();
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let r = sim
            .simulate(
                &instance(vec![f64::NAN, 1.0, 0.9]),
                &classification_of("ttfb", FeatureType::Numeric),
            )
            .unwrap();
        assert_eq!(
            r.outcome,
            SimulationOutcome::NotSimulatable(NotSimulatableReason::MissingValue)
        );
    }

    #[test]
    fn value_equal_to_benchmark_is_already_optimal() {
        let forest = forest();
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        let x = instance(vec![175.0, 1.0, 0.9]);
        let r = sim.simulate(&x, &classification_of("ttfb", FeatureType::Numeric)).unwrap();
        assert_eq!(r.outcome, SimulationOutcome::AlreadyOptimal);
        assert_eq!(r.modified, x);
        assert!(r.prediction_before.is_none());
        assert!(r.prediction_after.is_none());
    }

    #[test]
    fn higher_is_better_gating() {
        let forest = forest();
        let benchmarks = benchmarks();
        let sim = CounterfactualSimulator::new(&forest, &benchmarks);
        // p75 of cache_ratio [0.1, 0.7, 0.8, 0.9] = 0.825
        let good = instance(vec![100.0, 1.0, 0.9]);
        let r = sim
            .simulate(&good, &classification_of("cache_ratio", FeatureType::Numeric))
            .unwrap();
        assert_eq!(r.outcome, SimulationOutcome::AlreadyOptimal);

        let bad = instance(vec![100.0, 1.0, 0.2]);
        let r = sim
            .simulate(&bad, &classification_of("cache_ratio", FeatureType::Numeric))
            .unwrap();
        assert_eq!(r.improvement(), Some(200.0));
    }

    #[test]
    fn outcome_serialization() {
        let json = serde_json::to_value(SimulationOutcome::NotSimulatable(
            NotSimulatableReason::NoBenchmark,
        ))
        .unwrap();
        assert_eq!(json["status"], "not_simulatable");
        assert_eq!(json["detail"], "no_benchmark");
        let json = serde_json::to_value(SimulationOutcome::Simulated { improvement: 1.5 }).unwrap();
        assert_eq!(json["detail"]["improvement"], 1.5);
    }
}
