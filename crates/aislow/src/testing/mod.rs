//! Testing utilities: tree literals, random forests and a brute-force
//! Shapley reference.
//!
//! Used by unit tests, integration tests and property tests; not part of
//! the stable API.

use std::sync::Arc;

use ndarray::Array2;
use rand::prelude::*;

use crate::data::{FeatureMeta, FeatureSchema, Instance, Population};
use crate::explainability::shap::NodeCovers;
use crate::repr::{categories_to_bitset, Forest, MutableTree, NodeId, Tree, TreeView};

/// Build a [`Tree`](crate::repr::Tree) from a literal node list.
///
/// Nodes must be numbered `0..n` with the root at 0. `L`/`R` is the default
/// direction for missing values. Categorical splits send the listed
/// categories right.
///
/// ```
/// let tree = aislow::tree! {
///     0 => num(0, 0.5, L) -> 1, 2,
///     1 => leaf(-1.0),
///     2 => cat(1, [0, 2], R) -> 3, 4,
///     3 => leaf(0.5),
///     4 => leaf(2.0),
/// };
/// assert_eq!(tree.predict_row(&[0.9, 2.0]), 2.0);
/// ```
#[macro_export]
macro_rules! tree {
    ($($id:literal => $kind:ident ($($args:tt)*) $(-> $l:literal, $r:literal)?),+ $(,)?) => {{
        let mut tree = $crate::repr::MutableTree::with_capacity(0);
        let n_nodes = [$($id),+].len();
        tree.init_root_with_n_nodes(n_nodes);
        $( $crate::__tree_node!(tree, $id, $kind ($($args)*) $(-> $l, $r)?); )+
        tree.freeze()
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __tree_node {
    ($t:ident, $id:literal, leaf($v:expr)) => {
        $t.make_leaf($id, $v);
    };
    ($t:ident, $id:literal, num($f:expr, $th:expr, L) -> $l:literal, $r:literal) => {
        $t.set_numeric_split($id, $f, $th, true, $l, $r);
    };
    ($t:ident, $id:literal, num($f:expr, $th:expr, R) -> $l:literal, $r:literal) => {
        $t.set_numeric_split($id, $f, $th, false, $l, $r);
    };
    ($t:ident, $id:literal, cat($f:expr, [$($c:expr),* $(,)?], L) -> $l:literal, $r:literal) => {
        $t.set_categorical_split($id, $f, $crate::repr::categories_to_bitset(&[$($c),*]), true, $l, $r);
    };
    ($t:ident, $id:literal, cat($f:expr, [$($c:expr),* $(,)?], R) -> $l:literal, $r:literal) => {
        $t.set_categorical_split($id, $f, $crate::repr::categories_to_bitset(&[$($c),*]), false, $l, $r);
    };
}

// =============================================================================
// Random Models and Data
// =============================================================================

/// Number of distinct category codes used by the random generators.
pub const RANDOM_N_CATEGORIES: u32 = 4;

/// Schema `f0..f{n-1}` where every third feature (`f2`, `f5`, ...) is categorical.
pub fn random_schema(n_features: usize) -> Arc<FeatureSchema> {
    Arc::new(FeatureSchema::from_features(
        (0..n_features)
            .map(|i| {
                let name = format!("f{i}");
                if i % 3 == 2 {
                    FeatureMeta::categorical(name)
                } else {
                    FeatureMeta::numeric(name)
                }
            })
            .collect(),
    ))
}

enum PlanNode {
    Leaf(f64),
    Numeric { feature: u32, threshold: f64, default_left: bool, left: NodeId, right: NodeId },
    Categorical { feature: u32, categories: Vec<u32>, default_left: bool, left: NodeId, right: NodeId },
}

fn plan_node(
    rng: &mut StdRng,
    schema: &FeatureSchema,
    depth: usize,
    max_depth: usize,
    plan: &mut Vec<PlanNode>,
) -> NodeId {
    let id = plan.len() as NodeId;
    plan.push(PlanNode::Leaf(0.0));

    if depth >= max_depth || (depth > 0 && rng.gen_bool(0.25)) {
        plan[id as usize] = PlanNode::Leaf(rng.gen_range(-10.0..10.0));
        return id;
    }

    let feature = rng.gen_range(0..schema.n_features()) as u32;
    let default_left = rng.gen_bool(0.5);
    let left = plan_node(rng, schema, depth + 1, max_depth, plan);
    let right = plan_node(rng, schema, depth + 1, max_depth, plan);
    plan[id as usize] = if schema.feature_type(feature as usize).is_categorical() {
        let categories = (0..RANDOM_N_CATEGORIES).filter(|_| rng.gen_bool(0.5)).collect();
        PlanNode::Categorical { feature, categories, default_left, left, right }
    } else {
        PlanNode::Numeric {
            feature,
            threshold: rng.gen_range(0.1..0.9),
            default_left,
            left,
            right,
        }
    };
    id
}

/// Random tree over `schema`, at most `max_depth` splits deep.
pub fn random_tree(rng: &mut StdRng, schema: &FeatureSchema, max_depth: usize) -> Tree {
    let mut plan = Vec::new();
    plan_node(rng, schema, 0, max_depth, &mut plan);

    let mut tree = MutableTree::with_capacity(plan.len());
    tree.init_root_with_n_nodes(plan.len());
    for (id, node) in plan.into_iter().enumerate() {
        let id = id as NodeId;
        match node {
            PlanNode::Leaf(value) => tree.make_leaf(id, value),
            PlanNode::Numeric { feature, threshold, default_left, left, right } => {
                tree.set_numeric_split(id, feature, threshold, default_left, left, right)
            }
            PlanNode::Categorical { feature, categories, default_left, left, right } => tree
                .set_categorical_split(
                    id,
                    feature,
                    categories_to_bitset(&categories),
                    default_left,
                    left,
                    right,
                ),
        }
    }
    tree.freeze()
}

/// Random forest over [`random_schema`]`(n_features)`.
pub fn random_forest(seed: u64, n_features: usize, n_trees: usize, max_depth: usize) -> Forest {
    let mut rng = StdRng::seed_from_u64(seed);
    let schema = random_schema(n_features);
    let mut forest = Forest::new(Arc::clone(&schema)).with_base_score(rng.gen_range(-5.0..5.0));
    for _ in 0..n_trees {
        forest.push_tree(random_tree(&mut rng, &schema, max_depth));
    }
    forest
}

/// Random population over `schema`. Numeric values are uniform in `[0, 1)`,
/// categorical values are codes in `0..RANDOM_N_CATEGORIES`. No missing values.
pub fn random_population(seed: u64, schema: &Arc<FeatureSchema>, n_samples: usize) -> Population {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_features = schema.n_features();
    let features = Array2::from_shape_fn((n_samples, n_features), |(_, f)| {
        if schema.feature_type(f).is_categorical() {
            rng.gen_range(0..RANDOM_N_CATEGORIES) as f64
        } else {
            rng.r#gen::<f64>()
        }
    });
    Population::new(Arc::clone(schema), features).expect("shape matches schema")
}

// =============================================================================
// Brute-Force Reference
// =============================================================================

/// Exact Shapley values by enumerating every feature coalition.
///
/// The value of a coalition `S` for one tree follows the instance at splits on
/// features in `S` and otherwise averages both children weighted by their
/// population cover. Exponential in the number of features; keep it under
/// about 12.
pub fn brute_force_shapley(forest: &Forest, population: &Population, instance: &Instance) -> Vec<f64> {
    let schema = forest.schema();
    let n = schema.n_features();
    assert!(n < 20, "brute force over {n} features is too slow");

    let population = population.aligned_to(schema).expect("population matches forest");
    let instance = instance.aligned_to(schema).expect("instance matches forest");

    let mut encoded = population.features().to_owned();
    for mut row in encoded.rows_mut() {
        for (f, v) in row.iter_mut().enumerate() {
            *v = forest.encoding().encode(f, *v);
        }
    }
    let x = forest.encode_row(instance.values()).into_owned();

    let n_masks = 1usize << n;
    let mut value = vec![0.0; n_masks];
    for tree in forest.trees() {
        let covers = NodeCovers::compute(tree, encoded.view());
        for (mask, v) in value.iter_mut().enumerate() {
            *v += coalition_value(tree, &covers, &x, mask, 0);
        }
    }

    let factorial: Vec<f64> = (0..=n)
        .scan(1.0, |acc, k| {
            if k > 0 {
                *acc *= k as f64;
            }
            Some(*acc)
        })
        .collect();

    (0..n)
        .map(|i| {
            let bit = 1usize << i;
            (0..n_masks)
                .filter(|mask| mask & bit == 0)
                .map(|mask| {
                    let s = mask.count_ones() as usize;
                    let weight = factorial[s] * factorial[n - s - 1] / factorial[n];
                    weight * (value[mask | bit] - value[mask])
                })
                .sum()
        })
        .collect()
}

fn coalition_value(tree: &Tree, covers: &NodeCovers, x: &[f64], mask: usize, node: NodeId) -> f64 {
    if tree.is_leaf(node) {
        return tree.leaf_value(node);
    }
    let feature = tree.split_index(node) as usize;
    if mask & (1 << feature) != 0 {
        let next = tree.next_child(node, x[feature]);
        return coalition_value(tree, covers, x, mask, next);
    }
    let (left, right) = (tree.left_child(node), tree.right_child(node));
    let lw = covers.fraction(node, left);
    let rw = covers.fraction(node, right);
    let mut total = 0.0;
    if lw != 0.0 {
        total += lw * coalition_value(tree, covers, x, mask, left);
    }
    if rw != 0.0 {
        total += rw * coalition_value(tree, covers, x, mask, right);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainability::TreeExplainer;
    use crate::utils::Parallelism;
    use approx::assert_abs_diff_eq;

    #[test]
    fn random_forest_is_valid_and_deterministic() {
        let a = random_forest(3, 5, 6, 4);
        let b = random_forest(3, 5, 6, 4);
        assert!(a.validate().is_ok());
        assert_eq!(a.n_trees(), 6);
        let pop = random_population(1, a.schema(), 16);
        for i in 0..pop.n_samples() {
            let row = pop.row(i);
            assert_eq!(a.predict(&row).unwrap(), b.predict(&row).unwrap());
        }
    }

    #[test]
    fn brute_force_is_efficient() {
        let forest = random_forest(21, 4, 5, 3);
        let pop = random_population(22, forest.schema(), 40);
        let base = crate::explainability::base_value(&forest, &pop).unwrap();
        let x = pop.row(3);
        let phi = brute_force_shapley(&forest, &pop, &x);
        assert_abs_diff_eq!(
            base + phi.iter().sum::<f64>(),
            forest.predict(&x).unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn tree_shap_matches_brute_force_on_random_forests() {
        for seed in 0..8 {
            let forest = random_forest(seed, 5, 4, 5);
            let pop = random_population(seed + 100, forest.schema(), 32);
            let explainer = TreeExplainer::new(&forest, &pop, Parallelism::Sequential).unwrap();
            let x = random_population(seed + 200, forest.schema(), 1).row(0);
            let attribution = explainer.explain(&x).unwrap();
            let expected = brute_force_shapley(&forest, &pop, &x);
            for (got, want) in attribution.impacts().iter().zip(&expected) {
                assert_abs_diff_eq!(got, want, epsilon = 1e-9);
            }
        }
    }
}
