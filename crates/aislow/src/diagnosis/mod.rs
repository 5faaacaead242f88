//! Per-page diagnosis: attribute, triage, simulate.
//!
//! [`Diagnoser`] is built once per model and reference population. It checks
//! that the population matches the model's trained typing, precomputes the
//! explainer covers, benchmarks and improvement directions, and then runs the
//! pipeline for any number of pages:
//!
//! 1. [`TreeExplainer`] attributes the prediction to features,
//! 2. [`FeatureClassifier`] splits them into problems and strengths,
//! 3. [`CounterfactualSimulator`] moves the top problem to its benchmark.

mod benchmark;
mod classify;
mod direction;
mod simulate;

pub use benchmark::{Benchmark, BenchmarkTable};
pub use classify::{Classification, FeatureClassifier};
pub use direction::{pearson, ImprovementDirection, ImprovementDirections};
pub use simulate::{CounterfactualSimulator, NotSimulatableReason, SimulationOutcome, SimulationResult};

use serde::Serialize;

use crate::config::DiagnosisConfig;
use crate::data::{Instance, Population};
use crate::error::Error;
use crate::explainability::{Attribution, TreeExplainer};
use crate::repr::Forest;
use crate::utils::Parallelism;

/// Everything computed for one page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnosis {
    pub attribution: Attribution,
    pub classification: Classification,
    pub simulation: SimulationResult,
}

/// Diagnosis pipeline bound to one forest and one reference population.
#[derive(Debug)]
pub struct Diagnoser<'a> {
    forest: &'a Forest,
    explainer: TreeExplainer<'a>,
    classifier: FeatureClassifier,
    benchmarks: BenchmarkTable,
    directions: ImprovementDirections,
}

impl<'a> Diagnoser<'a> {
    /// Build with parallelism from `config.n_threads`.
    ///
    /// Call inside [`run_with_threads`](crate::run_with_threads) to bound the
    /// thread count.
    pub fn new(
        forest: &'a Forest,
        population: &Population,
        config: &DiagnosisConfig,
    ) -> Result<Self, Error> {
        Self::with_parallelism(forest, population, config, Parallelism::from_threads(config.n_threads))
    }

    /// Build with explicit parallelism.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidForest`] if the forest fails [`Forest::validate`].
    /// - [`Error::EmptyPopulation`] for an empty population.
    /// - [`Error::UnknownFeature`] / [`Error::FeatureTypeMismatch`] if the
    ///   population does not match the forest's trained schema.
    /// - [`Error::MissingTargets`] if direction inference is enabled and the
    ///   population has no targets.
    pub fn with_parallelism(
        forest: &'a Forest,
        population: &Population,
        config: &DiagnosisConfig,
        parallelism: Parallelism,
    ) -> Result<Self, Error> {
        config.validate()?;
        let explainer = TreeExplainer::new(forest, population, parallelism)?;
        let population = population.aligned_to(forest.schema())?;
        let directions = ImprovementDirections::from_config(config, forest.schema(), &population)?;
        let benchmarks =
            BenchmarkTable::from_population_with(&population, config.benchmark_quantile, &directions)?;

        tracing::info!(
            n_trees = forest.n_trees(),
            n_samples = population.n_samples(),
            base_value = explainer.base_value(),
            "diagnoser ready"
        );

        Ok(Self {
            forest,
            explainer,
            classifier: FeatureClassifier::new(config.impact_threshold),
            benchmarks,
            directions,
        })
    }

    /// Mean prediction over the reference population.
    pub fn base_value(&self) -> f64 {
        self.explainer.base_value()
    }

    pub fn explainer(&self) -> &TreeExplainer<'a> {
        &self.explainer
    }

    pub fn benchmarks(&self) -> &BenchmarkTable {
        &self.benchmarks
    }

    pub fn directions(&self) -> &ImprovementDirections {
        &self.directions
    }

    /// Run the full pipeline on one page.
    ///
    /// The page is aligned to the trained schema before attribution; any
    /// schema mismatch fails here.
    pub fn diagnose(&self, instance: &Instance) -> Result<Diagnosis, Error> {
        let instance = instance.aligned_to(self.forest.schema())?;
        let attribution = self.explainer.explain(&instance)?;
        let classification = self.classifier.classify(&attribution);
        let simulation = CounterfactualSimulator::new(self.forest, &self.benchmarks)
            .simulate(&instance, &classification)?;

        tracing::info!(
            page = instance.id().unwrap_or("-"),
            prediction = attribution.prediction(),
            n_problems = classification.problems().len(),
            "diagnosed page"
        );

        Ok(Diagnosis {
            attribution,
            classification,
            simulation,
        })
    }
}
