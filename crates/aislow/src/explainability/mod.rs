//! Explaining individual predictions.
//!
//! [`TreeExplainer`] computes exact Shapley attributions of a forest's
//! prediction against a reference population; [`base_value`] is the
//! population mean prediction the attributions are relative to.

mod attribution;
mod baseline;
pub mod shap;

pub use attribution::{Attribution, FeatureAttribution};
pub(crate) use attribution::serialize_nan_as_null;
pub use baseline::{base_value, base_value_with};
pub use shap::TreeExplainer;
