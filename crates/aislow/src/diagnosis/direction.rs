//! Improvement directions: which way a feature moves when a page gets healthier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DiagnosisConfig;
use crate::data::{FeatureSchema, Population};
use crate::error::Error;

/// Whether lower or higher values of a feature are healthier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementDirection {
    /// Higher values are worse (request counts, bytes, timings).
    #[default]
    LowerIsBetter,
    /// Higher values are healthier (cache hit ratios, CDN use).
    HigherIsBetter,
}

impl ImprovementDirection {
    /// Population quantile used as the benchmark for this direction.
    #[inline]
    pub fn benchmark_quantile(self, quantile: f64) -> f64 {
        match self {
            Self::LowerIsBetter => quantile,
            Self::HigherIsBetter => 1.0 - quantile,
        }
    }

    /// Whether `value` is already at least as healthy as `benchmark`.
    #[inline]
    pub fn is_at_least_as_good(self, value: f64, benchmark: f64) -> bool {
        match self {
            Self::LowerIsBetter => value <= benchmark,
            Self::HigherIsBetter => value >= benchmark,
        }
    }
}

/// Per-feature improvement directions. Unlisted features are
/// [`ImprovementDirection::LowerIsBetter`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImprovementDirections {
    by_feature: BTreeMap<String, ImprovementDirection>,
}

impl ImprovementDirections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the direction of one feature.
    pub fn with(mut self, feature: impl Into<String>, direction: ImprovementDirection) -> Self {
        self.by_feature.insert(feature.into(), direction);
        self
    }

    /// Directions for `schema` from configuration, optionally inferring
    /// unlisted numeric features from `population`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingTargets`] if inference is enabled and the population
    /// carries no targets.
    pub fn from_config(
        config: &DiagnosisConfig,
        schema: &FeatureSchema,
        population: &Population,
    ) -> Result<Self, Error> {
        let mut directions = if config.infer_directions {
            Self::infer(population)?
        } else {
            Self::new()
        };
        for feature in &config.higher_is_better {
            if schema.feature_index(feature).is_none() {
                tracing::warn!(feature = %feature, "higher_is_better feature not in model");
                continue;
            }
            directions
                .by_feature
                .insert(feature.clone(), ImprovementDirection::HigherIsBetter);
        }
        Ok(directions)
    }

    /// Infer directions from the sign of each numeric feature's Pearson
    /// correlation with the target.
    ///
    /// Features that lower the target as they grow are
    /// [`ImprovementDirection::HigherIsBetter`]. Features without a defined
    /// correlation (constant, or fewer than two complete pairs) keep the
    /// default.
    pub fn infer(population: &Population) -> Result<Self, Error> {
        let targets = population.targets().ok_or(Error::MissingTargets)?;
        let schema = population.schema();
        let mut by_feature = BTreeMap::new();
        for (f, meta) in schema.iter_enumerated() {
            if meta.feature_type.is_categorical() {
                continue;
            }
            let column = population.column(f);
            let Some(r) = pearson(column.iter().copied().zip(targets.iter().copied())) else {
                continue;
            };
            let direction = if r < 0.0 {
                ImprovementDirection::HigherIsBetter
            } else {
                ImprovementDirection::LowerIsBetter
            };
            tracing::trace!(feature = %meta.name, correlation = r, ?direction, "inferred direction");
            by_feature.insert(meta.name.clone(), direction);
        }
        Ok(Self { by_feature })
    }

    /// Direction of `feature`.
    pub fn get(&self, feature: &str) -> ImprovementDirection {
        self.by_feature.get(feature).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ImprovementDirection)> {
        self.by_feature.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Pearson correlation over pairs where both values are finite.
pub fn pearson(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = pairs
        .into_iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case(ImprovementDirection::LowerIsBetter, 5.0, 10.0, true)]
    #[case(ImprovementDirection::LowerIsBetter, 10.0, 10.0, true)]
    #[case(ImprovementDirection::LowerIsBetter, 11.0, 10.0, false)]
    #[case(ImprovementDirection::HigherIsBetter, 11.0, 10.0, true)]
    #[case(ImprovementDirection::HigherIsBetter, 10.0, 10.0, true)]
    #[case(ImprovementDirection::HigherIsBetter, 5.0, 10.0, false)]
    fn already_good(
        #[case] direction: ImprovementDirection,
        #[case] value: f64,
        #[case] benchmark: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(direction.is_at_least_as_good(value, benchmark), expected);
    }

    #[test]
    fn mirrored_quantile() {
        assert_eq!(ImprovementDirection::LowerIsBetter.benchmark_quantile(0.25), 0.25);
        assert_eq!(ImprovementDirection::HigherIsBetter.benchmark_quantile(0.25), 0.75);
    }

    #[test]
    fn pearson_values() {
        let r = pearson([(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]).unwrap();
        assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
        let r = pearson([(1.0, 3.0), (2.0, 2.0), (3.0, 1.0), (f64::NAN, 9.0)]).unwrap();
        assert_abs_diff_eq!(r, -1.0, epsilon = 1e-12);
        assert!(pearson([(1.0, 1.0), (1.0, 2.0)]).is_none());
        assert!(pearson([(1.0, 1.0)]).is_none());
    }

    fn population() -> Population {
        let schema = Arc::new(crate::data::FeatureSchema::from_features(vec![
            crate::data::FeatureMeta::numeric("bytes"),
            crate::data::FeatureMeta::numeric("cache_ratio"),
            crate::data::FeatureMeta::categorical("uses_cdn"),
        ]));
        Population::new(
            schema,
            array![[100.0, 0.9, 1.0], [200.0, 0.5, 0.0], [300.0, 0.1, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn infer_from_correlation() {
        let pop = population().with_targets(vec![1000.0, 2000.0, 3000.0]).unwrap();
        let directions = ImprovementDirections::infer(&pop).unwrap();
        assert_eq!(directions.get("bytes"), ImprovementDirection::LowerIsBetter);
        assert_eq!(directions.get("cache_ratio"), ImprovementDirection::HigherIsBetter);
        assert_eq!(directions.get("uses_cdn"), ImprovementDirection::LowerIsBetter);
        assert_eq!(directions.iter().count(), 2);
    }

    #[test]
    fn infer_requires_targets() {
        assert!(matches!(
            ImprovementDirections::infer(&population()),
            Err(Error::MissingTargets)
        ));
    }

    #[test]
    fn config_overrides_inference() {
        let pop = population().with_targets(vec![1000.0, 2000.0, 3000.0]).unwrap();
        let config = DiagnosisConfig::builder()
            .infer_directions(true)
            .higher_is_better(vec!["bytes".into(), "not_a_feature".into()])
            .build()
            .unwrap();
        let directions = ImprovementDirections::from_config(&config, pop.schema(), &pop).unwrap();
        assert_eq!(directions.get("bytes"), ImprovementDirection::HigherIsBetter);
        assert_eq!(directions.get("cache_ratio"), ImprovementDirection::HigherIsBetter);
        assert_eq!(directions.get("not_a_feature"), ImprovementDirection::LowerIsBetter);
    }
}
