//! Base value: the expected model output over a reference population.

use crate::data::Population;
use crate::error::Error;
use crate::repr::Forest;
use crate::utils::Parallelism;

/// Mean forest prediction over `population`.
///
/// # Errors
///
/// - [`Error::EmptyPopulation`] if the population has no rows.
/// - A schema error if the population does not match the forest.
pub fn base_value(forest: &Forest, population: &Population) -> Result<f64, Error> {
    base_value_with(forest, population, Parallelism::Sequential)
}

/// [`base_value`] with explicit parallelism. The result does not depend on it.
pub fn base_value_with(
    forest: &Forest,
    population: &Population,
    parallelism: Parallelism,
) -> Result<f64, Error> {
    if population.is_empty() {
        return Err(Error::EmptyPopulation);
    }
    let predictions = forest.predict_population(population, parallelism)?;
    Ok(mean(&predictions))
}

/// Arithmetic mean, summed in order. Zero for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
