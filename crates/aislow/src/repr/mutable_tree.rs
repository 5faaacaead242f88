//! Mutable tree builder.
//!
//! Model loaders pre-allocate every node (child references are known up
//! front) and fill them in; tests use the [`tree!`](crate::tree) macro,
//! which goes through the same calls.

use super::categories::CategoriesStorage;
use super::node::{MissingType, SplitType};
use super::tree::Tree;
use super::NodeId;

/// Tree under construction. Call [`MutableTree::freeze`] when done.
#[derive(Debug, Clone, Default)]
pub struct MutableTree {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f64>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    missing_types: Vec<MissingType>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f64>,
    split_types: Vec<SplitType>,
    /// Categorical data: (node_idx, category_bitset)
    categorical_nodes: Vec<(NodeId, Vec<u32>)>,
}

impl MutableTree {
    /// Create a tree with capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            split_indices: Vec::with_capacity(capacity),
            split_thresholds: Vec::with_capacity(capacity),
            left_children: Vec::with_capacity(capacity),
            right_children: Vec::with_capacity(capacity),
            default_left: Vec::with_capacity(capacity),
            missing_types: Vec::with_capacity(capacity),
            is_leaf: Vec::with_capacity(capacity),
            leaf_values: Vec::with_capacity(capacity),
            split_types: Vec::with_capacity(capacity),
            categorical_nodes: Vec::new(),
        }
    }

    /// Initialize the tree with a fixed number of placeholder nodes.
    ///
    /// Returns the root node ID (0).
    pub fn init_root_with_n_nodes(&mut self, n_nodes: usize) -> NodeId {
        self.reset();
        for _ in 0..n_nodes {
            self.allocate_node();
        }
        0
    }

    /// Set a numeric split on an existing node, with explicit child indices.
    ///
    /// Values `< threshold` go left. The missing type stays [`MissingType::NaN`]
    /// unless changed with [`MutableTree::set_missing_type`].
    pub fn set_numeric_split(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f64,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = threshold;
        self.left_children[idx] = left_child;
        self.right_children[idx] = right_child;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
        self.split_types[idx] = SplitType::Numeric;
    }

    /// Set a categorical split on an existing node, with explicit child indices.
    ///
    /// Categories in `category_bitset` go RIGHT, all others go LEFT.
    pub fn set_categorical_split(
        &mut self,
        node: NodeId,
        feature: u32,
        category_bitset: Vec<u32>,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) {
        let idx = node as usize;
        self.split_indices[idx] = feature;
        self.split_thresholds[idx] = 0.0;
        self.left_children[idx] = left_child;
        self.right_children[idx] = right_child;
        self.default_left[idx] = default_left;
        self.is_leaf[idx] = false;
        self.split_types[idx] = SplitType::Categorical;

        self.categorical_nodes.retain(|(n, _)| *n != node);
        self.categorical_nodes.push((node, category_bitset));
    }

    /// Change which values count as missing at a split node.
    pub fn set_missing_type(&mut self, node: NodeId, missing_type: MissingType) {
        self.missing_types[node as usize] = missing_type;
    }

    /// Set a node as a leaf with the given value.
    pub fn make_leaf(&mut self, node: NodeId, value: f64) {
        let idx = node as usize;
        self.is_leaf[idx] = true;
        self.leaf_values[idx] = value;
    }

    /// Current number of allocated nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.split_indices.len()
    }

    /// Reset the tree for reuse.
    pub fn reset(&mut self) {
        self.split_indices.clear();
        self.split_thresholds.clear();
        self.left_children.clear();
        self.right_children.clear();
        self.default_left.clear();
        self.missing_types.clear();
        self.is_leaf.clear();
        self.leaf_values.clear();
        self.split_types.clear();
        self.categorical_nodes.clear();
    }

    /// Finalize the tree and return immutable storage.
    pub fn freeze(self) -> Tree {
        let categories = if self.categorical_nodes.is_empty() {
            CategoriesStorage::empty()
        } else {
            let mut cat_nodes = self.categorical_nodes;
            cat_nodes.sort_by_key(|(idx, _)| *idx);

            let mut segments = vec![(0u32, 0u32); self.split_indices.len()];
            let mut bitsets = Vec::new();
            for (node_idx, bitset) in cat_nodes {
                segments[node_idx as usize] = (bitsets.len() as u32, bitset.len() as u32);
                bitsets.extend(bitset);
            }
            CategoriesStorage::new(bitsets, segments)
        };

        Tree::from_parts(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.missing_types,
            self.is_leaf,
            self.leaf_values,
            self.split_types,
            categories,
        )
    }

    fn allocate_node(&mut self) -> NodeId {
        let id = self.split_indices.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        self.missing_types.push(MissingType::NaN);
        self.is_leaf.push(false);
        self.leaf_values.push(0.0);
        self.split_types.push(SplitType::Numeric);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{categories_to_bitset, TreeView};

    #[test]
    fn build_and_freeze() {
        let mut t = MutableTree::with_capacity(5);
        let root = t.init_root_with_n_nodes(5);
        t.set_numeric_split(root, 0, 0.5, true, 1, 2);
        t.make_leaf(1, -1.0);
        t.set_categorical_split(2, 1, categories_to_bitset(&[2]), false, 3, 4);
        t.make_leaf(3, 0.0);
        t.make_leaf(4, 1.0);
        assert_eq!(t.n_nodes(), 5);

        let tree = t.freeze();
        assert!(tree.validate().is_ok());
        assert!(tree.has_categorical());
        assert_eq!(tree.categories().bitset_for_node(2), &[0b100]);
        assert_eq!(tree.predict_row(&[0.9, 2.0]), 1.0);
        assert_eq!(tree.predict_row(&[0.9, 1.0]), 0.0);
        assert_eq!(tree.predict_row(&[0.1, 2.0]), -1.0);
    }

    #[test]
    fn resetting_a_categorical_split_replaces_bitset() {
        let mut t = MutableTree::with_capacity(3);
        t.init_root_with_n_nodes(3);
        t.set_categorical_split(0, 0, vec![0b1], true, 1, 2);
        t.set_categorical_split(0, 0, vec![0b10], true, 1, 2);
        t.make_leaf(1, 0.0);
        t.make_leaf(2, 1.0);
        let tree = t.freeze();
        assert_eq!(tree.categories().bitset_for_node(0), &[0b10]);
    }
}
