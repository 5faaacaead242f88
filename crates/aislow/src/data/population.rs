//! Reference population storage.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::{DataError, FeatureSchema, Instance};
use crate::error::Error;
use crate::utils::quantile_linear;

/// The reference population: every page the model's behaviour is judged
/// against.
///
/// Features are a sample-major `[n_samples, n_features]` matrix sharing one
/// schema. Row identifiers (page URLs) and target values are optional and
/// only used for reporting and row selection.
#[derive(Clone, Debug)]
pub struct Population {
    schema: Arc<FeatureSchema>,
    features: Array2<f64>,
    ids: Option<Vec<String>>,
    targets: Option<Vec<f64>>,
}

impl Population {
    /// Create a population from a `[n_samples, n_features]` matrix.
    pub fn new(schema: Arc<FeatureSchema>, features: Array2<f64>) -> Result<Self, DataError> {
        if features.ncols() != schema.n_features() {
            return Err(DataError::ShapeMismatch {
                expected: schema.n_features(),
                found: features.ncols(),
            });
        }
        Ok(Self {
            schema,
            features,
            ids: None,
            targets: None,
        })
    }

    /// Attach one identifier per row.
    pub fn with_ids(mut self, ids: Vec<String>) -> Result<Self, DataError> {
        self.check_len("ids", ids.len())?;
        self.ids = Some(ids);
        Ok(self)
    }

    /// Attach one target value per row.
    pub fn with_targets(mut self, targets: Vec<f64>) -> Result<Self, DataError> {
        self.check_len("targets", targets.len())?;
        self.targets = Some(targets);
        Ok(self)
    }

    fn check_len(&self, what: &'static str, found: usize) -> Result<(), DataError> {
        if found != self.n_samples() {
            return Err(DataError::LengthMismatch {
                what,
                expected: self.n_samples(),
                found,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    /// Feature matrix view `[n_samples, n_features]`.
    #[inline]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// All values of one feature.
    #[inline]
    pub fn column(&self, feature: usize) -> ArrayView1<'_, f64> {
        self.features.column(feature)
    }

    /// Raw values of one row, without building an [`Instance`].
    #[inline]
    pub fn row_values(&self, row: usize) -> ArrayView1<'_, f64> {
        self.features.row(row)
    }

    /// Materialize one row as an [`Instance`], carrying its id if any.
    ///
    /// # Panics
    ///
    /// Panics if `row >= n_samples()`. See [`Population::get`].
    pub fn row(&self, row: usize) -> Instance {
        let values = self.features.row(row).to_vec().into_boxed_slice();
        let instance = Instance::from_row(Arc::clone(&self.schema), values);
        match self.id(row) {
            Some(id) => instance.with_id(id),
            None => instance,
        }
    }

    /// Checked version of [`Population::row`].
    pub fn get(&self, row: usize) -> Result<Instance, DataError> {
        if row >= self.n_samples() {
            return Err(DataError::RowOutOfRange {
                row,
                n_samples: self.n_samples(),
            });
        }
        Ok(self.row(row))
    }

    /// Iterate over rows as instances.
    pub fn rows(&self) -> impl Iterator<Item = Instance> + '_ {
        (0..self.n_samples()).map(|i| self.row(i))
    }

    pub fn id(&self, row: usize) -> Option<&str> {
        self.ids.as_ref().map(|ids| ids[row].as_str())
    }

    pub fn ids(&self) -> Option<&[String]> {
        self.ids.as_deref()
    }

    pub fn targets(&self) -> Option<&[f64]> {
        self.targets.as_deref()
    }

    pub fn target(&self, row: usize) -> Option<f64> {
        self.targets.as_ref().map(|t| t[row])
    }

    /// Median of the non-missing target values.
    pub fn median_target(&self) -> Option<f64> {
        let targets = self.targets.as_ref()?;
        quantile_linear(targets.iter().copied(), 0.5)
    }

    /// Row whose target is closest to the median target (first on ties).
    pub fn median_target_row(&self) -> Option<usize> {
        let targets = self.targets.as_ref()?;
        let median = self.median_target()?;
        let mut best: Option<(usize, f64)> = None;
        for (i, &t) in targets.iter().enumerate() {
            let d = (t - median).abs();
            if d.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Reorder columns into `target`'s feature order.
    ///
    /// Fails if the schemas do not hold the same, identically typed features.
    pub fn aligned_to(&self, target: &Arc<FeatureSchema>) -> Result<Self, Error> {
        if Arc::ptr_eq(&self.schema, target) || *self.schema == **target {
            return Ok(Self {
                schema: Arc::clone(target),
                ..self.clone()
            });
        }
        let mapping = target.align(&self.schema)?;
        Ok(Self {
            schema: Arc::clone(target),
            features: self.features.select(Axis(1), &mapping),
            ids: self.ids.clone(),
            targets: self.targets.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMeta;
    use ndarray::array;

    fn population() -> Population {
        let schema = Arc::new(FeatureSchema::all_numeric(["a", "b"]));
        Population::new(schema, array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]])
            .unwrap()
    }

    #[test]
    fn new_checks_width() {
        let schema = Arc::new(FeatureSchema::all_numeric(["a"]));
        assert!(Population::new(schema, array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn row_and_column_access() {
        let p = population().with_ids(vec!["w".into(), "x".into(), "y".into(), "z".into()]).unwrap();
        assert_eq!(p.n_samples(), 4);
        assert_eq!(p.column(1).to_vec(), vec![10.0, 20.0, 30.0, 40.0]);
        let r = p.row(2);
        assert_eq!(r.values(), &[3.0, 30.0]);
        assert_eq!(r.id(), Some("y"));
        assert!(p.get(4).is_err());
    }

    #[test]
    fn targets_length_checked() {
        assert!(matches!(
            population().with_targets(vec![1.0]),
            Err(DataError::LengthMismatch { what: "targets", expected: 4, found: 1 })
        ));
    }

    #[test]
    fn median_target_row_picks_closest_first() {
        // median of [100, 400, 250, 260] = 255 -> rows 2 and 3 tie at 5, first wins
        let p = population().with_targets(vec![100.0, 400.0, 250.0, 260.0]).unwrap();
        assert_eq!(p.median_target(), Some(255.0));
        assert_eq!(p.median_target_row(), Some(2));
    }

    #[test]
    fn median_target_row_without_targets() {
        assert_eq!(population().median_target_row(), None);
    }

    #[test]
    fn aligned_to_selects_columns() {
        let target = Arc::new(FeatureSchema::from_features(vec![
            FeatureMeta::numeric("b"),
            FeatureMeta::numeric("a"),
        ]));
        let p = population().aligned_to(&target).unwrap();
        assert_eq!(p.row_values(0).to_vec(), vec![10.0, 1.0]);
        assert!(Arc::ptr_eq(p.schema(), &target));
    }
}
