//! Crate-level error type.
//!
//! Subsystems keep their own error enums ([`DataError`], [`ParseError`],
//! [`ConversionError`], [`ConfigError`]); this type wraps them together with
//! the typing errors raised by the diagnosis core.

use std::fmt;

use crate::compat::lightgbm::{ConversionError, ParseError};
use crate::config::ConfigError;
use crate::data::{DataError, FeatureType};
use crate::repr::ForestValidationError;

/// Which side of a model/data comparison lacks a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSide {
    /// The feature is in the data but the model was not trained on it.
    Model,
    /// The model was trained on the feature but the data does not have it.
    Data,
}

impl fmt::Display for FeatureSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSide::Model => f.write_str("model"),
            FeatureSide::Data => f.write_str("data"),
        }
    }
}

/// Errors produced by aislow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reference population is empty")]
    EmptyPopulation,

    #[error("feature `{feature}` is typed {found:?} but the model was trained with {expected:?}")]
    FeatureTypeMismatch {
        feature: String,
        expected: FeatureType,
        found: FeatureType,
    },

    #[error("feature `{feature}` is missing from the {missing_from}")]
    UnknownFeature {
        feature: String,
        missing_from: FeatureSide,
    },

    #[error("population has no target values")]
    MissingTargets,

    #[error("invalid forest: {0}")]
    InvalidForest(#[from] ForestValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
