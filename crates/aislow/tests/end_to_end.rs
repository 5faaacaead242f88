//! Full pipeline: CSV population + LightGBM model → diagnosis → report.

use std::path::PathBuf;
use std::sync::Arc;

use approx::assert_abs_diff_eq;

use aislow::compat::lightgbm::LgbModel;
use aislow::data::io::CsvLoader;
use aislow::diagnosis::NotSimulatableReason;
use aislow::report::{FeatureNames, JsonReport, PageContext, PopulationSummary, TextReport};
use aislow::{
    tree, Diagnoser, DiagnosisConfig, FeatureMeta, FeatureSchema, Forest, Instance, Parallelism,
    Population, SimulationOutcome,
};

fn test_case(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases").join(relative)
}

fn load() -> (Forest, Population, Population) {
    let config = DiagnosisConfig::default();
    let forest = LgbModel::from_file(test_case("lightgbm/model.txt"))
        .unwrap()
        .to_forest()
        .unwrap();
    let loader = CsvLoader::from_config(&config);
    let background = loader
        .clone()
        .with_dedup(true)
        .load(test_case("pages/background.csv"))
        .unwrap();
    let pages = loader.load(test_case("pages/test.csv")).unwrap();
    (forest, background, pages)
}

// =============================================================================
// Two-tree fixture
// =============================================================================

#[test]
fn two_tree_fixture_reconciles() {
    let schema = Arc::new(FeatureSchema::from_features(vec![
        FeatureMeta::numeric("TTFB"),
        FeatureMeta::numeric("bytesImg"),
    ]));
    let mut forest = Forest::new(Arc::clone(&schema));
    forest.push_tree(tree! {
        0 => num(0, 300.0, L) -> 1, 2,
        1 => num(1, 1e6, L) -> 3, 4,
        2 => leaf(900.0),
        3 => leaf(100.0),
        4 => leaf(400.0),
    });
    forest.push_tree(tree! {
        0 => num(1, 5e5, R) -> 1, 2,
        1 => leaf(-50.0),
        2 => leaf(250.0),
    });
    let population = Population::new(
        Arc::clone(&schema),
        ndarray::array![[100.0, 2e5], [250.0, 8e5], [500.0, 3e6], [120.0, 1.5e6]],
    )
    .unwrap();

    let diagnoser =
        Diagnoser::with_parallelism(&forest, &population, &DiagnosisConfig::default(), Parallelism::Sequential)
            .unwrap();
    for values in [vec![800.0, 2e6], vec![50.0, 1e5], vec![300.0, 5e5], vec![f64::NAN, 7e5]] {
        let instance = Instance::new(Arc::clone(&schema), values).unwrap();
        let diagnosis = diagnoser.diagnose(&instance).unwrap();
        let attribution = &diagnosis.attribution;
        assert_abs_diff_eq!(
            attribution.base_value() + attribution.impacts_sum(),
            forest.predict(&instance).unwrap(),
            epsilon = 1e-3
        );
    }
}

// =============================================================================
// CSV + LightGBM
// =============================================================================

#[test]
fn slow_page_is_diagnosed() {
    let (forest, background, pages) = load();
    let diagnoser = Diagnoser::new(&forest, &background, &DiagnosisConfig::default()).unwrap();
    assert_abs_diff_eq!(diagnoser.base_value(), 2120.0, epsilon = 1e-9);
    assert_abs_diff_eq!(diagnoser.benchmarks().value("TTFB").unwrap(), 400.0, epsilon = 1e-9);
    assert!(diagnoser.benchmarks().get("uses_cdn").is_none());

    let slow = pages.row(0);
    assert_eq!(slow.id(), Some("https://slow.example"));
    let diagnosis = diagnoser.diagnose(&slow).unwrap();

    assert_abs_diff_eq!(diagnosis.attribution.prediction(), 3650.0, epsilon = 1e-9);
    let impact = |name: &str| diagnosis.attribution.feature(name).unwrap().impact;
    assert_abs_diff_eq!(impact("TTFB"), 1180.0, epsilon = 1e-6);
    assert_abs_diff_eq!(impact("bytesJS"), 140.0, epsilon = 1e-6);
    assert_abs_diff_eq!(impact("uses_cdn"), 210.0, epsilon = 1e-6);

    let problems: Vec<_> = diagnosis.classification.problems().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(problems, ["TTFB", "uses_cdn", "bytesJS"]);
    assert!(diagnosis.classification.strengths().is_empty());

    let simulation = &diagnosis.simulation;
    assert_eq!(simulation.target_feature.as_deref(), Some("TTFB"));
    assert_eq!(simulation.modified.value(0), 400.0);
    assert_eq!(simulation.modified.value(1), slow.value(1));
    assert_eq!(simulation.prediction_after, Some(2350.0));
    assert_abs_diff_eq!(simulation.improvement().unwrap(), 1300.0, epsilon = 1e-9);
}

#[test]
fn fast_page_has_nothing_to_simulate() {
    let (forest, background, pages) = load();
    let diagnoser = Diagnoser::new(&forest, &background, &DiagnosisConfig::default()).unwrap();
    let diagnosis = diagnoser.diagnose(&pages.row(1)).unwrap();

    assert!(diagnosis.classification.problems().is_empty());
    assert_eq!(diagnosis.classification.strengths().len(), 3);
    assert_eq!(
        diagnosis.simulation.outcome,
        SimulationOutcome::NotSimulatable(NotSimulatableReason::NoProblems)
    );
}

#[test]
fn median_page_selection() {
    let (_, background, _) = load();
    // Targets 1300, 1400, 2300, 3400, 2000: the median is 2000, row 4
    assert_eq!(background.median_target(), Some(2000.0));
    assert_eq!(background.median_target_row(), Some(4));
    assert_eq!(background.id(4), Some("https://e.example"));
}

#[test]
fn reports_render() {
    let (forest, background, pages) = load();
    let config = DiagnosisConfig::default();
    let diagnoser = Diagnoser::new(&forest, &background, &config).unwrap();
    let slow = pages.row(0);
    let diagnosis = diagnoser.diagnose(&slow).unwrap();

    let context = PageContext::default()
        .with_page(slow.id().unwrap())
        .with_target_name(config.target_column.clone())
        .with_actual(pages.target(0).unwrap())
        .with_population(PopulationSummary::from_population(&background));
    let names = FeatureNames::builtin();

    let text = TextReport::new(&diagnosis, &names, &context)
        .with_benchmarks(diagnoser.benchmarks())
        .to_string();
    assert!(text.contains("Training data: 5 pages"));
    assert!(text.contains("  Average SpeedIndex: 2080 ms"));
    assert!(text.contains("  Median SpeedIndex: 2000 ms"));
    assert!(text.contains("SpeedIndex: 3600ms (actual)"));
    assert!(text.contains("Predicted SpeedIndex: 3650ms"));
    assert!(text.contains("Prediction error: 50ms"));
    assert!(text.contains("  * Time To First Byte (ms) = 1,500\n    └─ Impact: +1180 ms"));
    assert!(text.contains("  * Uses CDN (Boolean) = 0"));
    assert!(text.contains("No significant strengths found."));
    assert!(text.contains("from 1,500 to 'good' benchmark 400 (25th percentile)"));
    assert!(text.contains("Estimated SpeedIndex Improvement: 1300 ms"));

    let json = JsonReport::new(&diagnosis, &names, &context)
        .with_benchmarks(diagnoser.benchmarks())
        .to_value()
        .unwrap();
    assert_eq!(json["page"], "https://slow.example");
    assert_eq!(json["waterfall"][0]["name"], "TTFB");
    assert_eq!(json["simulation"]["outcome"]["status"], "simulated");
}
