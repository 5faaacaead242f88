//! Machine-readable report.

use std::io;

use serde::Serialize;

use super::{FeatureNames, PageContext};
use crate::data::FeatureType;
use crate::diagnosis::{Benchmark, BenchmarkTable, Diagnosis, SimulationResult};
use crate::explainability::{serialize_nan_as_null, FeatureAttribution};

/// One attributed feature with its display name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamedAttribution<'a> {
    pub name: &'a str,
    pub display_name: &'a str,
    pub feature_type: FeatureType,
    #[serde(serialize_with = "serialize_nan_as_null")]
    pub value: f64,
    pub impact: f64,
}

/// JSON view of one diagnosis.
///
/// `waterfall` holds every feature sorted by descending `|impact|`, which
/// together with `base_value` and `prediction` is what a waterfall chart
/// draws. `problems` and `strengths` are untruncated.
#[derive(Clone, Debug, Serialize)]
pub struct JsonReport<'a> {
    #[serde(flatten)]
    context: &'a PageContext,
    base_value: f64,
    prediction: f64,
    threshold: f64,
    waterfall: Vec<NamedAttribution<'a>>,
    problems: Vec<NamedAttribution<'a>>,
    strengths: Vec<NamedAttribution<'a>>,
    simulation: &'a SimulationResult,
    benchmark: Option<Benchmark>,
}

impl<'a> JsonReport<'a> {
    pub fn new(diagnosis: &'a Diagnosis, names: &'a FeatureNames, context: &'a PageContext) -> Self {
        let named = |features: &'a [FeatureAttribution]| -> Vec<NamedAttribution<'a>> {
            features
                .iter()
                .map(|f| NamedAttribution {
                    name: &f.name,
                    display_name: names.display(&f.name),
                    feature_type: f.feature_type,
                    value: f.value,
                    impact: f.impact,
                })
                .collect()
        };

        let mut waterfall = named(diagnosis.attribution.features());
        waterfall.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));

        Self {
            context,
            base_value: diagnosis.attribution.base_value(),
            prediction: diagnosis.attribution.prediction(),
            threshold: diagnosis.classification.threshold(),
            waterfall,
            problems: named(diagnosis.classification.problems()),
            strengths: named(diagnosis.classification.strengths()),
            simulation: &diagnosis.simulation,
            benchmark: None,
        }
    }

    /// Include the full benchmark (value, quantile, direction) of the
    /// simulated feature.
    pub fn with_benchmarks(mut self, benchmarks: &BenchmarkTable) -> Self {
        self.benchmark = self
            .simulation
            .target_feature
            .as_deref()
            .and_then(|f| benchmarks.get(f))
            .copied();
        self
    }

    pub fn to_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagnosisConfig;
    use crate::data::{FeatureMeta, FeatureSchema, Instance, Population};
    use crate::diagnosis::Diagnoser;
    use crate::report::PopulationSummary;
    use crate::repr::Forest;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::sync::Arc;

    #[test]
    fn report_shape() {
        let schema = Arc::new(FeatureSchema::from_features(vec![
            FeatureMeta::numeric("TTFB"),
            FeatureMeta::numeric("bytesJS"),
        ]));
        let mut forest = Forest::new(Arc::clone(&schema));
        forest.push_tree(crate::tree! {
            0 => num(0, 500.0, L) -> 1, 2,
            1 => leaf(1000.0),
            2 => leaf(2000.0),
        });
        forest.push_tree(crate::tree! {
            0 => num(1, 1e6, L) -> 1, 2,
            1 => leaf(0.0),
            2 => leaf(100.0),
        });
        let pop = Population::new(
            Arc::clone(&schema),
            array![[100.0, 1e5], [200.0, 2e5], [300.0, 3e6], [400.0, 4e5]],
        )
        .unwrap();
        let diagnoser = Diagnoser::new(&forest, &pop, &DiagnosisConfig::default()).unwrap();
        let x = Instance::new(schema, vec![800.0, f64::NAN]).unwrap().with_id("https://a.example");
        let diagnosis = diagnoser.diagnose(&x).unwrap();

        let context = PageContext::default()
            .with_page("https://a.example")
            .with_population(PopulationSummary::from_population(&pop));
        let names = FeatureNames::builtin();
        let json = JsonReport::new(&diagnosis, &names, &context)
            .with_benchmarks(diagnoser.benchmarks())
            .to_value()
            .unwrap();

        assert_eq!(json["page"], "https://a.example");
        assert_eq!(json["target_name"], "SpeedIndex");
        assert!(json["actual"].is_null());
        assert_eq!(json["population"]["n_pages"], 4);
        assert_eq!(json["threshold"], 50.0);

        let waterfall = json["waterfall"].as_array().unwrap();
        assert_eq!(waterfall.len(), 2);
        assert_eq!(waterfall[0]["name"], "TTFB");
        assert_eq!(waterfall[0]["display_name"], "Time To First Byte (ms)");
        assert_abs_diff_eq!(waterfall[0]["impact"].as_f64().unwrap(), 1000.0);
        assert!(waterfall[1]["value"].is_null());

        assert_eq!(json["simulation"]["outcome"]["status"], "simulated");
        assert_abs_diff_eq!(json["benchmark"]["value"].as_f64().unwrap(), 175.0);
        assert_eq!(json["benchmark"]["direction"], "lower_is_better");
    }
}
