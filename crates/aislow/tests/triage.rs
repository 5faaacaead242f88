//! Problem/strength triage and what-if gating through the public API.

use std::sync::Arc;

use rstest::rstest;

use aislow::diagnosis::{ImprovementDirection, ImprovementDirections, NotSimulatableReason};
use aislow::{
    tree, Attribution, BenchmarkTable, CounterfactualSimulator, FeatureAttribution,
    FeatureClassifier, FeatureMeta, FeatureSchema, FeatureType, Forest, Instance, Population,
    SimulationOutcome,
};

fn attribution(impacts: &[(&str, f64)]) -> Attribution {
    let features: Vec<_> = impacts
        .iter()
        .map(|&(name, impact)| FeatureAttribution {
            name: name.to_string(),
            feature_type: if name == "uses_cdn" {
                FeatureType::Categorical
            } else {
                FeatureType::Numeric
            },
            value: 0.0,
            impact,
        })
        .collect();
    let prediction = 1000.0 + features.iter().map(|f| f.impact).sum::<f64>();
    Attribution::new(1000.0, prediction, features)
}

#[test]
fn threshold_scenario() {
    let a = attribution(&[("a", 120.0), ("b", 60.0), ("c", 50.0), ("d", -80.0)]);
    let c = FeatureClassifier::new(50.0).classify(&a);

    let names = |fs: &[FeatureAttribution]| fs.iter().map(|f| f.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(c.problems()), ["a", "b"]);
    assert_eq!(names(c.strengths()), ["d", "c"]);
    assert_eq!(c.top_problem().map(|f| f.name.as_str()), Some("a"));
}

#[rstest]
#[case(50.0, 0)]
#[case(50.000_001, 1)]
#[case(-500.0, 0)]
fn boundary(#[case] impact: f64, #[case] n_problems: usize) {
    let c = FeatureClassifier::new(50.0).classify(&attribution(&[("x", impact)]));
    assert_eq!(c.problems().len(), n_problems);
    assert_eq!(c.problems().len() + c.strengths().len(), 1);
}

#[test]
fn equal_magnitudes_keep_schema_order() {
    let a = attribution(&[("p", 70.0), ("q", -70.0), ("r", 70.0)]);
    let c = FeatureClassifier::new(50.0).classify(&a);
    let problems: Vec<_> = c.problems().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(problems, ["p", "r"]);
}

// =============================================================================
// Simulation gating
// =============================================================================

fn setup() -> (Forest, Population) {
    let schema = Arc::new(FeatureSchema::from_features(vec![
        FeatureMeta::numeric("TTFB"),
        FeatureMeta::categorical("uses_cdn"),
        FeatureMeta::numeric("maxage365"),
    ]));
    let mut forest = Forest::new(Arc::clone(&schema)).with_base_score(1000.0);
    forest.push_tree(tree! {
        0 => num(0, 400.0, L) -> 1, 2,
        1 => leaf(0.0),
        2 => leaf(800.0),
    });
    forest.push_tree(tree! {
        0 => num(2, 10.0, L) -> 1, 2,
        1 => leaf(300.0),
        2 => leaf(0.0),
    });
    let pop = Population::new(
        schema,
        ndarray::array![[100.0, 1.0, 5.0], [300.0, 0.0, 20.0], [500.0, 1.0, 30.0], [700.0, 0.0, 40.0]],
    )
    .unwrap();
    (forest, pop)
}

fn classify(values: &[(&str, f64, f64)]) -> aislow::Classification {
    let features = values
        .iter()
        .map(|&(name, value, impact)| FeatureAttribution {
            name: name.to_string(),
            feature_type: if name == "uses_cdn" {
                FeatureType::Categorical
            } else {
                FeatureType::Numeric
            },
            value,
            impact,
        })
        .collect();
    FeatureClassifier::new(50.0).classify(&Attribution::new(0.0, 0.0, features))
}

#[test]
fn categorical_top_problem_is_not_simulatable() {
    let (forest, pop) = setup();
    let benchmarks = BenchmarkTable::from_population(&pop, 0.25).unwrap();
    let x = Instance::new(Arc::clone(pop.schema()), vec![900.0, 0.0, 5.0]).unwrap();

    let c = classify(&[("uses_cdn", 0.0, 400.0), ("TTFB", 900.0, 200.0)]);
    let r = CounterfactualSimulator::new(&forest, &benchmarks).simulate(&x, &c).unwrap();
    assert_eq!(r.outcome, SimulationOutcome::NotSimulatable(NotSimulatableReason::Categorical));
    assert_eq!(r.modified, r.original);
    assert_eq!(r.prediction_after, None);
}

#[test]
fn value_at_benchmark_is_already_optimal() {
    let (forest, pop) = setup();
    let benchmarks = BenchmarkTable::from_population(&pop, 0.25).unwrap();
    // TTFB p25 over [100, 300, 500, 700] = 250
    assert_eq!(benchmarks.value("TTFB"), Some(250.0));
    let x = Instance::new(Arc::clone(pop.schema()), vec![250.0, 1.0, 5.0]).unwrap();

    let c = classify(&[("TTFB", 250.0, 90.0)]);
    let r = CounterfactualSimulator::new(&forest, &benchmarks).simulate(&x, &c).unwrap();
    assert_eq!(r.outcome, SimulationOutcome::AlreadyOptimal);
    assert_eq!(r.modified, x);
    assert_eq!(r.prediction_before, None);
}

#[test]
fn improvement_is_not_clamped() {
    let (forest, pop) = setup();
    // maxage365 is better when higher; its benchmark is the 75th percentile
    let directions = ImprovementDirections::new().with("maxage365", ImprovementDirection::HigherIsBetter);
    let benchmarks = BenchmarkTable::from_population_with(&pop, 0.25, &directions).unwrap();
    assert_eq!(benchmarks.value("maxage365"), Some(32.5));

    let x = Instance::new(Arc::clone(pop.schema()), vec![100.0, 1.0, 5.0]).unwrap();
    let c = classify(&[("maxage365", 5.0, 225.0)]);
    let r = CounterfactualSimulator::new(&forest, &benchmarks).simulate(&x, &c).unwrap();
    assert_eq!(r.improvement(), Some(300.0));

    // Below its benchmark already: never moved up to it
    let x = Instance::new(Arc::clone(pop.schema()), vec![200.0, 1.0, 5.0]).unwrap();
    let c = classify(&[("TTFB", 200.0, 60.0)]);
    let r = CounterfactualSimulator::new(&forest, &benchmarks).simulate(&x, &c).unwrap();
    assert_eq!(r.outcome, SimulationOutcome::AlreadyOptimal);
}

#[test]
fn negative_improvement_is_reported() {
    let schema = Arc::new(FeatureSchema::all_numeric(["bytesJS"]));
    let mut forest = Forest::new(Arc::clone(&schema));
    // Small values predict slower than large ones
    forest.push_tree(tree! {
        0 => num(0, 100.0, L) -> 1, 2,
        1 => leaf(900.0),
        2 => leaf(100.0),
    });
    let pop = Population::new(Arc::clone(&schema), ndarray::array![[10.0], [50.0], [150.0], [400.0]]).unwrap();
    let benchmarks = BenchmarkTable::from_population(&pop, 0.25).unwrap();
    assert_eq!(benchmarks.value("bytesJS"), Some(40.0));

    let x = Instance::new(schema, vec![200.0]).unwrap();
    let c = classify(&[("bytesJS", 200.0, 80.0)]);
    let r = CounterfactualSimulator::new(&forest, &benchmarks).simulate(&x, &c).unwrap();
    assert_eq!(r.improvement(), Some(-800.0));
    assert_eq!(r.prediction_before, Some(100.0));
    assert_eq!(r.prediction_after, Some(900.0));
}
