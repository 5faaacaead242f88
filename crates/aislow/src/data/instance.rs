//! A single feature vector.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::{DataError, FeatureSchema, FeatureType};
use crate::error::Error;

/// One page's feature values, keyed by name through a shared schema.
///
/// Values are raw (as read from the data), never category codes; a model
/// that needs codes encodes them itself when routing. Missing values are
/// `f64::NAN`.
#[derive(Clone, Debug)]
pub struct Instance {
    schema: Arc<FeatureSchema>,
    values: Box<[f64]>,
    id: Option<String>,
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.id == other.id
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits() || a == b)
    }
}

impl Instance {
    /// Create an instance from values in schema order.
    pub fn new(schema: Arc<FeatureSchema>, values: Vec<f64>) -> Result<Self, DataError> {
        if values.len() != schema.n_features() {
            return Err(DataError::ShapeMismatch {
                expected: schema.n_features(),
                found: values.len(),
            });
        }
        Ok(Self {
            schema,
            values: values.into_boxed_slice(),
            id: None,
        })
    }

    /// Build from a row already known to match the schema width.
    pub(crate) fn from_row(schema: Arc<FeatureSchema>, values: Box<[f64]>) -> Self {
        debug_assert_eq!(values.len(), schema.n_features());
        Self {
            schema,
            values,
            id: None,
        }
    }

    /// Attach an identifier (the page URL).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[inline]
    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.values.len()
    }

    /// All values in schema order.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn value(&self, feature: usize) -> f64 {
        self.values[feature]
    }

    pub fn value_by_name(&self, name: &str) -> Option<f64> {
        self.schema.feature_index(name).map(|i| self.values[i])
    }

    #[inline]
    pub fn feature_type(&self, feature: usize) -> FeatureType {
        self.schema.feature_type(feature)
    }

    /// Copy of this instance with exactly one value replaced.
    pub fn with_value(&self, feature: usize, value: f64) -> Self {
        let mut out = self.clone();
        out.values[feature] = value;
        out
    }

    /// Reorder this instance into `target`'s feature order.
    ///
    /// Fails if the two schemas do not hold the same, identically typed
    /// features (see [`FeatureSchema::align`]).
    pub fn aligned_to(&self, target: &Arc<FeatureSchema>) -> Result<Self, Error> {
        if Arc::ptr_eq(&self.schema, target) || *self.schema == **target {
            return Ok(Self {
                schema: Arc::clone(target),
                ..self.clone()
            });
        }
        let mapping = target.align(&self.schema)?;
        let values = mapping.iter().map(|&j| self.values[j]).collect();
        Ok(Self {
            schema: Arc::clone(target),
            values,
            id: self.id.clone(),
        })
    }
}

/// Serializes as a `name -> value` map in schema order; missing values
/// become `null` in JSON.
impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (meta, value) in self.schema.iter().zip(self.values.iter()) {
            let value = if value.is_nan() { None } else { Some(*value) };
            map.serialize_entry(&meta.name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMeta;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::from_features(vec![
            FeatureMeta::numeric("TTFB"),
            FeatureMeta::categorical("uses_cdn"),
        ]))
    }

    #[test]
    fn new_checks_length() {
        assert!(matches!(
            Instance::new(schema(), vec![1.0]),
            Err(DataError::ShapeMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn with_value_changes_one_feature() {
        let x = Instance::new(schema(), vec![300.0, 1.0]).unwrap();
        let y = x.with_value(0, 100.0);
        assert_eq!(x.value(0), 300.0);
        assert_eq!(y.value(0), 100.0);
        assert_eq!(y.value(1), 1.0);
    }

    #[test]
    fn nan_instances_compare_equal() {
        let x = Instance::new(schema(), vec![f64::NAN, 1.0]).unwrap();
        assert_eq!(x, x.clone());
    }

    #[test]
    fn aligned_to_reorders() {
        let data = Arc::new(FeatureSchema::from_features(vec![
            FeatureMeta::categorical("uses_cdn"),
            FeatureMeta::numeric("TTFB"),
        ]));
        let x = Instance::new(data, vec![1.0, 250.0]).unwrap().with_id("a.com");
        let y = x.aligned_to(&schema()).unwrap();
        assert_eq!(y.values(), &[250.0, 1.0]);
        assert_eq!(y.id(), Some("a.com"));
    }

    #[test]
    fn serializes_as_map() {
        let x = Instance::new(schema(), vec![f64::NAN, 1.0]).unwrap();
        let json = serde_json::to_string(&x).unwrap();
        assert_eq!(json, r#"{"TTFB":null,"uses_cdn":1.0}"#);
    }
}
