//! Canonical forest representation (collection of trees).

use std::borrow::Cow;
use std::sync::Arc;

use super::encoding::CategoryEncoding;
use super::node::SplitType;
use super::tree::{Tree, TreeValidationError, TreeView};
use crate::data::{FeatureSchema, Instance, Population};
use crate::error::Error;
use crate::utils::Parallelism;

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
    #[error("tree {tree_idx}, node {node}: feature {feature} out of range ({n_features} features)")]
    FeatureOutOfRange {
        tree_idx: usize,
        node: u32,
        feature: u32,
        n_features: usize,
    },
    #[error("tree {tree_idx}, node {node}: categorical split on numeric feature `{feature}`")]
    CategoricalSplitOnNumeric {
        tree_idx: usize,
        node: u32,
        feature: String,
    },
}

/// Single-output regression forest.
///
/// Prediction is `base_score + Σ leaf value reached in each tree`. The forest
/// also carries the feature schema it was trained on, which fixes both the
/// feature order trees index into and the Numeric/Categorical typing, plus
/// the raw-value to category-code encoding applied before routing.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<Tree>,
    base_score: f64,
    schema: Arc<FeatureSchema>,
    encoding: CategoryEncoding,
}

impl Forest {
    /// Create an empty forest over `schema`.
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self {
            trees: Vec::new(),
            base_score: 0.0,
            schema,
            encoding: CategoryEncoding::identity(),
        }
    }

    /// Set the base score.
    pub fn with_base_score(mut self, base_score: f64) -> Self {
        self.base_score = base_score;
        self
    }

    /// Set the category encoding.
    pub fn with_encoding(mut self, encoding: CategoryEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Add a tree to the forest.
    ///
    /// The tree is not checked against the schema; call [`Forest::validate`]
    /// on a hand-built forest before predicting with it.
    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Trained feature schema.
    #[inline]
    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    #[inline]
    pub fn encoding(&self) -> &CategoryEncoding {
        &self.encoding
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    /// All trees in order.
    #[inline]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Validate structural invariants for this forest.
    ///
    /// Intended for model loaders and tests.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        let n_features = self.schema.n_features();
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;

            for node in 0..tree.n_nodes() as u32 {
                if tree.is_leaf(node) {
                    continue;
                }
                let feature = tree.split_index(node);
                if feature as usize >= n_features {
                    return Err(ForestValidationError::FeatureOutOfRange {
                        tree_idx,
                        node,
                        feature,
                        n_features,
                    });
                }
                if tree.split_type(node) == SplitType::Categorical
                    && self.schema.feature_type(feature as usize).is_numeric()
                {
                    return Err(ForestValidationError::CategoricalSplitOnNumeric {
                        tree_idx,
                        node,
                        feature: self.schema.name(feature as usize).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Prediction
    // =========================================================================

    /// Map a raw row (schema order) to the values trees route on.
    #[inline]
    pub fn encode_row<'a>(&self, raw: &'a [f64]) -> Cow<'a, [f64]> {
        self.encoding.encode_row(raw)
    }

    /// Predict an already-encoded row.
    ///
    /// # Panics
    ///
    /// If a tree splits on a feature past the end of `encoded`. Forests that
    /// pass [`Forest::validate`] never do for rows of schema length.
    #[inline]
    pub fn predict_encoded(&self, encoded: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.predict_row(encoded))
    }

    /// Predict a raw row given in schema order.
    ///
    /// # Panics
    ///
    /// Same contract as [`Forest::predict_encoded`].
    #[inline]
    pub fn predict_row(&self, raw: &[f64]) -> f64 {
        self.predict_encoded(&self.encode_row(raw))
    }

    /// Predict one instance, reordering its features into schema order first.
    ///
    /// # Errors
    ///
    /// Fails if the instance's features do not match the trained schema.
    ///
    /// # Panics
    ///
    /// On a forest that fails [`Forest::validate`].
    pub fn predict(&self, instance: &Instance) -> Result<f64, Error> {
        if Arc::ptr_eq(instance.schema(), &self.schema) {
            return Ok(self.predict_row(instance.values()));
        }
        let aligned = instance.aligned_to(&self.schema)?;
        Ok(self.predict_row(aligned.values()))
    }

    /// Predict every row of a population already aligned to this schema.
    pub(crate) fn predict_aligned(&self, population: &Population, parallelism: Parallelism) -> Vec<f64> {
        let features = population.features();
        parallelism.maybe_par_map(0..population.n_samples(), |i| {
            let row = features.row(i);
            match row.as_slice() {
                Some(raw) => self.predict_row(raw),
                None => self.predict_row(&row.to_vec()),
            }
        })
    }

    /// Predict every row of a population.
    ///
    /// # Errors
    ///
    /// Fails if the population's features do not match the trained schema.
    pub fn predict_population(
        &self,
        population: &Population,
        parallelism: Parallelism,
    ) -> Result<Vec<f64>, Error> {
        let aligned = population.aligned_to(&self.schema)?;
        Ok(self.predict_aligned(&aligned, parallelism))
    }
}
