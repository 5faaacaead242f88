//! SHAP (SHapley Additive exPlanations) for tree ensembles.
//!
//! - [`TreeExplainer`]: exact path-dependent TreeSHAP, weighted by
//!   population covers.
//! - [`NodeCovers`]: per-node population counts for one tree.
//! - [`Path`] / [`PathState`]: unique-feature path bookkeeping used by the
//!   recursion.

mod covers;
mod path;
mod tree_explainer;

pub use covers::NodeCovers;
pub use path::{Path, PathElement, PathState};
pub use tree_explainer::{tree_shap, TreeExplainer};
