//! Per-feature attribution of one prediction.

use serde::Serialize;

use crate::data::FeatureType;

/// Contribution of one feature to one prediction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureAttribution {
    /// Feature name as known to the model.
    pub name: String,
    pub feature_type: FeatureType,
    /// Raw value of the feature in the explained instance (NaN if missing).
    #[serde(serialize_with = "serialize_nan_as_null")]
    pub value: f64,
    /// Signed contribution to the prediction, in target units.
    pub impact: f64,
}

/// Attribution of one prediction to every model feature.
///
/// Features are kept in the model's schema order. The additivity property
/// `base_value + Σ impact == prediction` holds up to floating-point error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attribution {
    base_value: f64,
    prediction: f64,
    features: Vec<FeatureAttribution>,
}

impl Attribution {
    pub fn new(base_value: f64, prediction: f64, features: Vec<FeatureAttribution>) -> Self {
        Self {
            base_value,
            prediction,
            features,
        }
    }

    /// Mean prediction over the reference population.
    #[inline]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Model output for the explained instance.
    #[inline]
    pub fn prediction(&self) -> f64 {
        self.prediction
    }

    #[inline]
    pub fn features(&self) -> &[FeatureAttribution] {
        &self.features
    }

    /// Look up a feature by name.
    pub fn feature(&self, name: &str) -> Option<&FeatureAttribution> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Impacts in schema order.
    pub fn impacts(&self) -> Vec<f64> {
        self.features.iter().map(|f| f.impact).collect()
    }

    pub fn impacts_sum(&self) -> f64 {
        self.features.iter().map(|f| f.impact).sum()
    }

    /// `base_value + Σ impact`.
    pub fn reconstructed(&self) -> f64 {
        self.base_value + self.impacts_sum()
    }

    /// Difference between the prediction and its reconstruction.
    pub fn residual(&self) -> f64 {
        self.prediction - self.reconstructed()
    }

    /// Whether the attribution reconstructs the prediction within `tolerance`.
    pub fn is_exact(&self, tolerance: f64) -> bool {
        approx::abs_diff_eq!(self.reconstructed(), self.prediction, epsilon = tolerance)
    }

    pub fn into_features(self) -> Vec<FeatureAttribution> {
        self.features
    }
}

pub(crate) fn serialize_nan_as_null<S: serde::Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        s.serialize_none()
    } else {
        s.serialize_f64(*value)
    }
}
