//! Feature type definitions.
//!
//! This module defines the schema types that describe dataset structure and
//! the check that a dataset matches the typing a model was trained with.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, FeatureSide};

/// Logical feature types.
///
/// Features are stored as `f64` regardless of type. The `FeatureType` is a
/// fixed tag assigned at load time and tells the model how to route a value
/// and the simulator whether a benchmark can exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    /// Continuous numeric feature.
    ///
    /// Missing values: `f64::NAN`
    #[default]
    Numeric,

    /// Categorical feature stored as float, interpreted as integer category ID.
    ///
    /// Missing values: `f64::NAN`
    ///
    /// Values are truncated to an integer category when routed through a
    /// categorical split, as LightGBM does.
    Categorical,
}

impl FeatureType {
    /// Returns true if this is a categorical feature.
    #[inline]
    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureType::Categorical)
    }

    /// Returns true if this is a numeric feature.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, FeatureType::Numeric)
    }
}

/// Metadata for a single feature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureMeta {
    /// Feature name.
    pub name: String,

    /// Feature type.
    pub feature_type: FeatureType,
}

impl FeatureMeta {
    /// Create metadata for a numeric feature.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_type: FeatureType::Numeric,
        }
    }

    /// Create metadata for a categorical feature.
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_type: FeatureType::Categorical,
        }
    }
}

/// Ordered, named and typed feature set.
///
/// Shared (behind an `Arc`) by a [`Population`](super::Population), the
/// [`Instance`](super::Instance)s drawn from it and the model that was
/// trained on it.
#[derive(Clone, Debug, Default)]
pub struct FeatureSchema {
    features: Vec<FeatureMeta>,
    name_index: HashMap<String, usize>,
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
    }
}

impl FeatureSchema {
    /// Create a schema with the given feature metadata.
    ///
    /// If a name repeats, lookups by name resolve to its first occurrence.
    pub fn from_features(features: Vec<FeatureMeta>) -> Self {
        let mut name_index = HashMap::with_capacity(features.len());
        for (i, meta) in features.iter().enumerate() {
            name_index.entry(meta.name.clone()).or_insert(i);
        }
        Self {
            features,
            name_index,
        }
    }

    /// Create a schema where all features are numeric.
    pub fn all_numeric<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::from_features(names.into_iter().map(FeatureMeta::numeric).collect())
    }

    /// Number of features in the schema.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Get metadata for a feature by index.
    pub fn get(&self, index: usize) -> Option<&FeatureMeta> {
        self.features.get(index)
    }

    /// Feature name by index.
    pub fn name(&self, index: usize) -> &str {
        &self.features[index].name
    }

    /// Get the feature type for a feature by index.
    pub fn feature_type(&self, index: usize) -> FeatureType {
        self.features
            .get(index)
            .map(|m| m.feature_type)
            .unwrap_or(FeatureType::Numeric)
    }

    /// Check if any feature is categorical.
    pub fn has_categorical(&self) -> bool {
        self.features.iter().any(|m| m.feature_type.is_categorical())
    }

    /// Get feature index by name.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// Get an iterator over feature metadata.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureMeta> {
        self.features.iter()
    }

    /// Get an iterator over (index, metadata) pairs.
    pub fn iter_enumerated(&self) -> impl Iterator<Item = (usize, &FeatureMeta)> {
        self.features.iter().enumerate()
    }

    /// Match `data` against this (trained) schema.
    ///
    /// Returns, for every feature of `self` in order, the index of the same
    /// feature in `data`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownFeature`] if a feature of `self` is absent from `data`
    ///   or `data` carries a feature `self` does not know.
    /// - [`Error::FeatureTypeMismatch`] if a shared feature is typed differently.
    pub fn align(&self, data: &FeatureSchema) -> Result<Vec<usize>, Error> {
        let mut mapping = Vec::with_capacity(self.n_features());
        for meta in &self.features {
            let idx = data
                .feature_index(&meta.name)
                .ok_or_else(|| Error::UnknownFeature {
                    feature: meta.name.clone(),
                    missing_from: FeatureSide::Data,
                })?;
            let found = data.feature_type(idx);
            if found != meta.feature_type {
                return Err(Error::FeatureTypeMismatch {
                    feature: meta.name.clone(),
                    expected: meta.feature_type,
                    found,
                });
            }
            mapping.push(idx);
        }

        if let Some(extra) = data
            .iter()
            .find(|meta| self.feature_index(&meta.name).is_none())
        {
            return Err(Error::UnknownFeature {
                feature: extra.name.clone(),
                missing_from: FeatureSide::Model,
            });
        }

        Ok(mapping)
    }
}
