//! Healthy reference values per numeric feature.

use std::collections::BTreeMap;

use serde::Serialize;

use super::direction::{ImprovementDirection, ImprovementDirections};
use crate::data::Population;
use crate::error::Error;
use crate::utils::quantile_linear;

/// Benchmark value of one feature.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Benchmark {
    pub value: f64,
    /// Population quantile `value` was taken at.
    pub quantile: f64,
    pub direction: ImprovementDirection,
}

/// Numeric feature name → benchmark over a reference population.
///
/// Categorical features and columns with no finite value have no entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BenchmarkTable {
    entries: BTreeMap<String, Benchmark>,
}

impl BenchmarkTable {
    /// The `quantile` of every numeric feature, all lower-is-better.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyPopulation`] if the population has no rows.
    pub fn from_population(population: &Population, quantile: f64) -> Result<Self, Error> {
        Self::from_population_with(population, quantile, &ImprovementDirections::default())
    }

    /// Like [`BenchmarkTable::from_population`], taking the mirrored quantile
    /// `1 - quantile` for higher-is-better features.
    pub fn from_population_with(
        population: &Population,
        quantile: f64,
        directions: &ImprovementDirections,
    ) -> Result<Self, Error> {
        if population.is_empty() {
            return Err(Error::EmptyPopulation);
        }
        let mut entries = BTreeMap::new();
        for (f, meta) in population.schema().iter_enumerated() {
            if meta.feature_type.is_categorical() {
                continue;
            }
            let direction = directions.get(&meta.name);
            let q = direction.benchmark_quantile(quantile);
            match quantile_linear(population.column(f).iter().copied(), q) {
                Some(value) => {
                    entries.insert(
                        meta.name.clone(),
                        Benchmark {
                            value,
                            quantile: q,
                            direction,
                        },
                    );
                }
                None => tracing::debug!(feature = %meta.name, "no finite values, no benchmark"),
            }
        }
        tracing::debug!(n_benchmarks = entries.len(), quantile, "computed benchmarks");
        Ok(Self { entries })
    }

    pub fn get(&self, feature: &str) -> Option<&Benchmark> {
        self.entries.get(feature)
    }

    /// Benchmark value of `feature`.
    pub fn value(&self, feature: &str) -> Option<f64> {
        self.entries.get(feature).map(|b| b.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Benchmark)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
