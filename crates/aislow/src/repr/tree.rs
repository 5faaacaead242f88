//! Canonical tree representation (SoA) and read-only tree interface.
//!
//! This module provides:
//! - [`Tree`]: Immutable SoA tree storage for efficient traversal
//! - [`TreeView`]: Read-only trait for unified tree access
//! - [`TreeValidationError`]: Structural validation errors
//!
//! For tree construction, see [`super::mutable_tree::MutableTree`].

use super::categories::{float_to_category, CategoriesStorage};
use super::node::{MissingType, SplitType};
use super::NodeId;

// ============================================================================
// TreeView Trait
// ============================================================================

/// Read-only view of a tree for traversal.
///
/// Provides the minimal interface needed to route a sample from root to leaf.
/// Prediction, cover counting and TreeSHAP all route through
/// [`TreeView::next_child`], so they agree on every decision.
///
/// # Example
///
/// ```ignore
/// use aislow::repr::TreeView;
///
/// fn count_leaves<T: TreeView>(tree: &T) -> usize {
///     (0..tree.n_nodes())
///         .filter(|&n| tree.is_leaf(n as u32))
///         .count()
/// }
/// ```
pub trait TreeView {
    /// Number of nodes in the tree.
    fn n_nodes(&self) -> usize;

    /// Check if a node is a leaf.
    fn is_leaf(&self, node: NodeId) -> bool;

    /// Get the feature index for a split node.
    fn split_index(&self, node: NodeId) -> u32;

    /// Get the split threshold for a numeric split.
    fn split_threshold(&self, node: NodeId) -> f64;

    /// Get the left child node index.
    fn left_child(&self, node: NodeId) -> NodeId;

    /// Get the right child node index.
    fn right_child(&self, node: NodeId) -> NodeId;

    /// Get the default direction for missing values.
    fn default_left(&self, node: NodeId) -> bool;

    /// Which values count as missing at this node.
    fn missing_type(&self, node: NodeId) -> MissingType;

    /// Get the split type (numeric or categorical).
    fn split_type(&self, node: NodeId) -> SplitType;

    /// Get reference to categories storage for categorical splits.
    fn categories(&self) -> &CategoriesStorage;

    /// Get the leaf value at a leaf node.
    fn leaf_value(&self, node: NodeId) -> f64;

    /// Check if the tree has any categorical splits.
    fn has_categorical(&self) -> bool {
        !self.categories().is_empty()
    }

    #[inline]
    fn default_child(&self, node: NodeId) -> NodeId {
        if self.default_left(node) {
            self.left_child(node)
        } else {
            self.right_child(node)
        }
    }

    /// Child of split `node` taken by a sample whose split feature is `fvalue`.
    ///
    /// - Numeric: missing values (per [`MissingType`]) take the default
    ///   direction; otherwise `fvalue < threshold` goes left. With
    ///   [`MissingType::None`], `NaN` compares as `0.0`.
    /// - Categorical: `NaN` takes the default direction; a category in the
    ///   node's set goes right, anything else (including negatives) goes left.
    #[inline]
    fn next_child(&self, node: NodeId, fvalue: f64) -> NodeId {
        match self.split_type(node) {
            SplitType::Numeric => {
                if self.missing_type(node).is_missing(fvalue) {
                    return self.default_child(node);
                }
                let value = if fvalue.is_nan() { 0.0 } else { fvalue };
                if value < self.split_threshold(node) {
                    self.left_child(node)
                } else {
                    self.right_child(node)
                }
            }
            SplitType::Categorical => {
                if fvalue.is_nan() {
                    return self.default_child(node);
                }
                match float_to_category(fvalue) {
                    Some(category) if self.categories().category_goes_right(node, category) => {
                        self.right_child(node)
                    }
                    _ => self.left_child(node),
                }
            }
        }
    }

    /// Traverse the tree to find the leaf node for a sample.
    ///
    /// `sample` holds model-space values (categories already encoded) indexed
    /// by feature.
    #[inline]
    fn traverse_to_leaf(&self, sample: &[f64]) -> NodeId {
        self.traverse_to_leaf_from(0, sample)
    }

    /// Traverse the tree starting from a specific node.
    #[inline]
    fn traverse_to_leaf_from(&self, start_node: NodeId, sample: &[f64]) -> NodeId {
        let mut node = start_node;
        while !self.is_leaf(node) {
            let fvalue = sample[self.split_index(node) as usize];
            node = self.next_child(node, fvalue);
        }
        node
    }
}

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },
    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },
    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("categorical segments ({segments_len}) not sized to nodes ({n_nodes})")]
    CategoricalSegmentsLenMismatch { segments_len: usize, n_nodes: usize },
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays tree storage for efficient traversal.
///
/// Child indices are local to this tree (0 = root). Leaf values are `f64`
/// so attributions can be reconciled with predictions to tight tolerances.
#[derive(Debug, Clone)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f64]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    missing_types: Box<[MissingType]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f64]>,
    split_types: Box<[SplitType]>,
    categories: CategoriesStorage,
}

impl Tree {
    /// Assemble a tree from parallel arrays. See [`MutableTree::freeze`].
    ///
    /// [`MutableTree::freeze`]: super::MutableTree::freeze
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f64>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        missing_types: Vec<MissingType>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f64>,
        split_types: Vec<SplitType>,
        categories: CategoriesStorage,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert_eq!(n_nodes, split_thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, default_left.len());
        debug_assert_eq!(n_nodes, missing_types.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, leaf_values.len());
        debug_assert_eq!(n_nodes, split_types.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            missing_types: missing_types.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            split_types: split_types.into_boxed_slice(),
            categories,
        }
    }

    /// Predict a single sample (model-space values).
    #[inline]
    pub fn predict_row(&self, sample: &[f64]) -> f64 {
        self.leaf_value(self.traverse_to_leaf(sample))
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn max_depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack: Vec<(NodeId, usize)> = vec![(0, 0)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_leaf(node) {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((self.left_child(node), depth + 1));
                stack.push((self.right_child(node), depth + 1));
            }
        }
        max_depth
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate basic structural invariants for this tree.
    ///
    /// Every node must be reachable from the root along exactly one path,
    /// which is what traversal and TreeSHAP rely on.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let has_cat_split = self
            .split_types
            .iter()
            .zip(self.is_leaf.iter())
            .any(|(t, &leaf)| !leaf && matches!(t, SplitType::Categorical));
        if has_cat_split {
            let segments_len = self.categories.segments().len();
            if segments_len != n_nodes {
                return Err(TreeValidationError::CategoricalSegmentsLenMismatch {
                    segments_len,
                    n_nodes,
                });
            }
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, finished)) = stack.pop() {
            let node_usize = node as usize;
            if finished {
                color[node_usize] = 2;
                continue;
            }

            match color[node_usize] {
                0 => {}
                1 => return Err(TreeValidationError::CycleDetected { node }),
                _ => return Err(TreeValidationError::DuplicateVisit { node }),
            }
            color[node_usize] = 1;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }

            let left = self.left_child(node);
            let right = self.right_child(node);
            if left == node || right == node {
                return Err(TreeValidationError::SelfLoop { node });
            }
            for (side, child) in [("left", left), ("right", right)] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
            }

            stack.push((right, false));
            stack.push((left, false));
        }

        if let Some(i) = color.iter().position(|&c| c == 0) {
            return Err(TreeValidationError::UnreachableNode { node: i as u32 });
        }

        Ok(())
    }
}

// =============================================================================
// TreeView for Tree
// =============================================================================

impl TreeView for Tree {
    #[inline]
    fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    #[inline]
    fn split_threshold(&self, node: NodeId) -> f64 {
        self.split_thresholds[node as usize]
    }

    #[inline]
    fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    #[inline]
    fn missing_type(&self, node: NodeId) -> MissingType {
        self.missing_types[node as usize]
    }

    #[inline]
    fn split_type(&self, node: NodeId) -> SplitType {
        self.split_types[node as usize]
    }

    #[inline]
    fn categories(&self) -> &CategoriesStorage {
        &self.categories
    }

    #[inline]
    fn leaf_value(&self, node: NodeId) -> f64 {
        self.leaf_values[node as usize]
    }
}
