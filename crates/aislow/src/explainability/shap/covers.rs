//! Population covers: how many reference rows reach each tree node.

use ndarray::ArrayView2;

use crate::repr::{NodeId, Tree, TreeView};

/// Per-node population counts for one tree.
///
/// Rows are routed exactly as prediction routes them, so the cover of a split
/// node is the sum of its children's covers and the root's cover is the
/// population size.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeCovers {
    counts: Box<[f64]>,
}

impl NodeCovers {
    /// Count the rows of `encoded` (model-space, `[n_samples, n_features]`)
    /// reaching each node of `tree`.
    pub fn compute(tree: &Tree, encoded: ArrayView2<'_, f64>) -> Self {
        let mut counts = vec![0.0; tree.n_nodes()];
        let mut scratch = Vec::with_capacity(encoded.ncols());
        for row in encoded.rows() {
            let sample: &[f64] = match row.as_slice() {
                Some(s) => s,
                None => {
                    scratch.clear();
                    scratch.extend(row.iter().copied());
                    &scratch
                }
            };
            let mut node: NodeId = 0;
            counts[0] += 1.0;
            while !tree.is_leaf(node) {
                node = tree.next_child(node, sample[tree.split_index(node) as usize]);
                counts[node as usize] += 1.0;
            }
        }
        Self {
            counts: counts.into_boxed_slice(),
        }
    }

    /// Build from explicit per-node counts.
    pub fn from_counts(counts: Vec<f64>) -> Self {
        Self {
            counts: counts.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, node: NodeId) -> f64 {
        self.counts[node as usize]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.counts
    }

    /// Fraction of `node`'s population that continues into `child`.
    ///
    /// Zero when nothing reaches `node`.
    #[inline]
    pub fn fraction(&self, node: NodeId, child: NodeId) -> f64 {
        let total = self.get(node);
        if total > 0.0 {
            self.get(child) / total
        } else {
            0.0
        }
    }

    /// Mean leaf value over the population (the tree's expected output).
    pub fn expected_value(&self, tree: &Tree) -> f64 {
        let total = self.get(0);
        if total <= 0.0 {
            return 0.0;
        }
        (0..tree.n_nodes() as NodeId)
            .filter(|&n| tree.is_leaf(n))
            .map(|n| tree.leaf_value(n) * self.get(n))
            .sum::<f64>()
            / total
    }
}
