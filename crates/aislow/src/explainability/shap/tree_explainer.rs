//! TreeSHAP explainer for tree ensembles.
//!
//! Implements the path-dependent TreeSHAP algorithm from Lundberg et al.
//! (2020), "From local explanations to global understanding with explainable
//! AI for trees", with branch weights taken from a reference population.

use std::sync::Arc;

use ndarray::Array2;

use super::covers::NodeCovers;
use super::path::PathState;
use crate::data::{FeatureSchema, Instance, Population};
use crate::error::Error;
use crate::explainability::attribution::{Attribution, FeatureAttribution};
use crate::explainability::baseline::mean;
use crate::repr::{Forest, NodeId, Tree, TreeView};
use crate::utils::Parallelism;

/// TreeSHAP explainer for one forest against one reference population.
///
/// Construction routes the whole population through every tree once to
/// count node covers and computes the base value (mean prediction). Each
/// [`TreeExplainer::explain`] call then costs `O(L·D²)` per tree, for `L`
/// leaves and depth `D`.
///
/// Attributions are exact: `base_value + Σ impact == prediction` up to
/// floating-point error.
#[derive(Debug)]
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    covers: Vec<NodeCovers>,
    max_depths: Vec<usize>,
    base_value: f64,
    parallelism: Parallelism,
}

impl<'a> TreeExplainer<'a> {
    /// Create an explainer for `forest` against `population`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidForest`] if a tree is malformed or splits on a
    ///   feature outside the forest's schema.
    /// - [`Error::EmptyPopulation`] if the population has no rows.
    /// - [`Error::UnknownFeature`] / [`Error::FeatureTypeMismatch`] if the
    ///   population's features do not match the forest's trained schema.
    pub fn new(
        forest: &'a Forest,
        population: &Population,
        parallelism: Parallelism,
    ) -> Result<Self, Error> {
        forest.validate()?;
        if population.is_empty() {
            return Err(Error::EmptyPopulation);
        }
        let population = population.aligned_to(forest.schema())?;
        let encoded = encode_population(forest, &population);

        let covers = parallelism.maybe_par_map(forest.trees(), |tree| {
            NodeCovers::compute(tree, encoded.view())
        });
        let max_depths = forest.trees().iter().map(Tree::max_depth).collect();

        let predictions = parallelism.maybe_par_map(0..encoded.nrows(), |i| {
            let row = encoded.row(i);
            match row.as_slice() {
                Some(s) => forest.predict_encoded(s),
                None => forest.predict_encoded(&row.to_vec()),
            }
        });
        let base_value = mean(&predictions);

        tracing::debug!(
            n_trees = forest.n_trees(),
            n_samples = population.n_samples(),
            base_value,
            "tree explainer ready"
        );

        Ok(Self {
            forest,
            covers,
            max_depths,
            base_value,
            parallelism,
        })
    }

    /// Mean ensemble prediction over the population.
    #[inline]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    #[inline]
    pub fn forest(&self) -> &Forest {
        self.forest
    }

    /// Population covers of one tree.
    #[inline]
    pub fn covers(&self, tree_idx: usize) -> &NodeCovers {
        &self.covers[tree_idx]
    }

    /// Trained feature schema the attributions are reported in.
    #[inline]
    pub fn schema(&self) -> &Arc<FeatureSchema> {
        self.forest.schema()
    }

    /// Attribute the forest's prediction for `instance` to its features.
    ///
    /// Per-tree contributions are summed in tree order, so sequential and
    /// parallel runs give identical results.
    ///
    /// # Errors
    ///
    /// Fails if the instance's features do not match the forest's schema.
    pub fn explain(&self, instance: &Instance) -> Result<Attribution, Error> {
        let instance = instance.aligned_to(self.forest.schema())?;
        let encoded = self.forest.encode_row(instance.values());
        let n_features = instance.n_features();

        let per_tree = self.parallelism.maybe_par_map(0..self.forest.n_trees(), |t| {
            let mut phi = vec![0.0; n_features];
            tree_shap(
                self.forest.tree(t),
                &self.covers[t],
                &encoded,
                &mut phi,
                self.max_depths[t],
            );
            phi
        });

        let mut impacts = vec![0.0; n_features];
        for phi in &per_tree {
            for (acc, v) in impacts.iter_mut().zip(phi) {
                *acc += v;
            }
        }

        let prediction = self.forest.predict_encoded(&encoded);
        let schema = self.forest.schema();
        let features = impacts
            .into_iter()
            .enumerate()
            .map(|(f, impact)| FeatureAttribution {
                name: schema.name(f).to_string(),
                feature_type: schema.feature_type(f),
                value: instance.value(f),
                impact,
            })
            .collect();

        let attribution = Attribution::new(self.base_value, prediction, features);
        tracing::debug!(
            prediction,
            residual = attribution.residual(),
            "explained instance"
        );
        Ok(attribution)
    }
}

fn encode_population(forest: &Forest, population: &Population) -> Array2<f64> {
    let mut encoded = population.features().to_owned();
    if forest.encoding().is_identity() {
        return encoded;
    }
    for mut row in encoded.rows_mut() {
        for (f, v) in row.iter_mut().enumerate() {
            *v = forest.encoding().encode(f, *v);
        }
    }
    encoded
}

/// Add one tree's Shapley contributions for `row` (model-space) into `phi`.
pub fn tree_shap(tree: &Tree, covers: &NodeCovers, row: &[f64], phi: &mut [f64], max_depth: usize) {
    let mut ctx = TreeShapContext {
        tree,
        covers,
        row,
        phi,
        state: PathState::new(max_depth),
    };
    ctx.recurse(0, 0, 1.0, 1.0, None);
}

struct TreeShapContext<'a> {
    tree: &'a Tree,
    covers: &'a NodeCovers,
    row: &'a [f64],
    phi: &'a mut [f64],
    state: PathState,
}

impl TreeShapContext<'_> {
    fn recurse(
        &mut self,
        node: NodeId,
        depth: usize,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<u32>,
    ) {
        self.state
            .enter(depth)
            .extend(feature, zero_fraction, one_fraction);

        if self.tree.is_leaf(node) {
            let leaf = self.tree.leaf_value(node);
            let path = self.state.frame(depth);
            for i in 1..path.len() {
                let el = path.get(i);
                let w = path.unwound_sum(i);
                if let Some(f) = el.feature {
                    self.phi[f as usize] += w * (el.one_fraction - el.zero_fraction) * leaf;
                }
            }
            return;
        }

        let split = self.tree.split_index(node);
        let hot = self.tree.next_child(node, self.row[split as usize]);
        let cold = if hot == self.tree.left_child(node) {
            self.tree.right_child(node)
        } else {
            self.tree.left_child(node)
        };
        let hot_zero = self.covers.fraction(node, hot);
        let cold_zero = self.covers.fraction(node, cold);

        // A feature already on the path is merged into one element.
        let (mut incoming_zero, mut incoming_one) = (1.0, 1.0);
        let path = self.state.frame_mut(depth);
        if let Some(k) = path.position(split) {
            let el = path.get(k);
            incoming_zero = el.zero_fraction;
            incoming_one = el.one_fraction;
            path.unwind(k);
        }

        // Branches with both fractions zero contribute nothing.
        let (z, o) = (hot_zero * incoming_zero, incoming_one);
        if z != 0.0 || o != 0.0 {
            self.recurse(hot, depth + 1, z, o, Some(split));
        }
        let z = cold_zero * incoming_zero;
        if z != 0.0 {
            self.recurse(cold, depth + 1, z, 0.0, Some(split));
        }
    }
}
