//! External model format loaders.
//!
//! Models are trained elsewhere and converted into the native [`Forest`]
//! representation once at load time.
//!
//! [`Forest`]: crate::repr::Forest

pub mod lightgbm;

pub use lightgbm::LgbModel;
