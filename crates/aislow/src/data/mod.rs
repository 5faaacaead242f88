//! Typed feature data: the reference population and single instances.
//!
//! # Key Types
//!
//! - [`FeatureSchema`]: Ordered feature names with Numeric/Categorical tags
//! - [`Population`]: Reference population, an `[n_samples, n_features]` matrix
//! - [`Instance`]: One feature vector sharing a population's schema
//! - [`io::CsvLoader`]: Builds a population from one or more CSV files
//!
//! # Storage Layout
//!
//! Unlike a training dataset, the population is stored **sample-major**:
//! attribution, cover counting and prediction all walk one row at a time.
//!
//! Missing values are `f64::NAN` for both feature types.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use aislow::data::{FeatureSchema, Population};
//! use ndarray::array;
//!
//! let schema = Arc::new(FeatureSchema::all_numeric(["TTFB", "bytesJS"]));
//! let features = array![[120.0, 3.0e5], [480.0, 1.2e6], [f64::NAN, 8.0e5]];
//! let population = Population::new(schema, features).unwrap();
//!
//! assert_eq!(population.n_samples(), 3);
//! assert_eq!(population.row(1).value_by_name("TTFB"), Some(480.0));
//! ```

mod error;
mod instance;
pub mod io;
mod population;
mod schema;

pub use error::DataError;
pub use instance::Instance;
pub use population::Population;
pub use schema::{FeatureMeta, FeatureSchema, FeatureType};
