//! Canonical tree-ensemble representation.
//!
//! Trees are index-addressed node arenas stored as structure-of-arrays. A
//! [`Forest`] is an ordered list of trees plus a base score, the trained
//! feature schema and an optional raw-value to category-code encoding.
//! Everything here is immutable once built; use [`MutableTree`] to build
//! trees (model loaders, tests).

/// Canonical node identifier.
///
/// Internally this is just an index into the tree's SoA arrays.
pub type NodeId = u32;

pub mod categories;
pub mod encoding;
pub mod forest;
pub mod mutable_tree;
pub mod node;
pub mod tree;

pub use categories::{categories_to_bitset, float_to_category, CategoriesStorage};
pub use encoding::CategoryEncoding;
pub use forest::{Forest, ForestValidationError};
pub use mutable_tree::MutableTree;
pub use node::{MissingType, SplitType};
pub use tree::{Tree, TreeValidationError, TreeView};
