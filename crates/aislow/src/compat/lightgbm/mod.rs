//! LightGBM model format support.
//!
//! This module provides parsing of LightGBM's text model format and conversion
//! to a native [`Forest`](crate::repr::Forest).
//!
//! # Format Overview
//!
//! LightGBM text models have four sections:
//! 1. **Header**: model metadata (num_class, objective, feature names and infos)
//! 2. **Trees**: each tree's structure (splits, leaf values, decision types)
//! 3. **Footer**: feature importances and training parameters
//! 4. **`pandas_categorical`**: category lists of pandas categorical columns
//!
//! # Key Differences from the Native Representation
//!
//! - Split condition uses `<=` (left if value ≤ threshold) vs our `<`
//! - Leaf indices are encoded as negative values in child arrays
//! - Decision type is a bitfield encoding categorical flag, default direction, and missing type
//! - Categories in a split's bitset go left (ours go right)
//!
//! # Example
//!
//! ```ignore
//! use aislow::compat::lightgbm::LgbModel;
//!
//! let model = LgbModel::from_file("model.txt")?;
//! let forest = model.to_forest()?;
//! let prediction = forest.predict_row(&features);
//! ```

mod convert;
mod text;

pub use convert::ConversionError;
pub use text::*;
