//! Conversion from parsed LightGBM models to a native [`Forest`].

use std::sync::Arc;

use super::text::{DecisionType, LgbMissingType, LgbModel, LgbTree, PandasCategories};
use crate::data::{FeatureMeta, FeatureSchema};
use crate::repr::{CategoryEncoding, Forest, ForestValidationError, MissingType, MutableTree, Tree};

/// Error type for LightGBM model conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("tree {0} has no leaves")]
    EmptyTree(usize),
    #[error("tree {tree}: invalid child index {child} at node {node}")]
    InvalidChildIndex { tree: usize, node: usize, child: i32 },
    #[error("tree {tree}: categorical split {node} refers to missing bitset {cat_idx}")]
    InvalidCategoricalSplit { tree: usize, node: usize, cat_idx: usize },
    #[error("linear trees are not supported")]
    LinearTreesNotSupported,
    #[error("only single-output models are supported (num_class={num_class}, trees per iteration={per_iteration})")]
    MultiOutput { num_class: usize, per_iteration: usize },
    #[error("objective `{0}` does not predict in target units")]
    UnsupportedObjective(String),
    #[error("model has {names} feature names for {features} features")]
    FeatureNamesMismatch { names: usize, features: usize },
    #[error("pandas_categorical has {lists} category lists for {categorical} categorical features")]
    PandasCategoricalMismatch { lists: usize, categorical: usize },
    #[error(transparent)]
    Invalid(#[from] ForestValidationError),
}

/// Objectives whose raw score is the prediction itself.
const IDENTITY_OBJECTIVES: &[&str] = &[
    "regression",
    "regression_l2",
    "regression_l1",
    "l2",
    "l1",
    "mse",
    "mae",
    "rmse",
    "huber",
    "fair",
    "quantile",
    "mape",
];

impl LgbModel {
    /// Convert to a native [`Forest`].
    ///
    /// The trained schema comes from `feature_names` with categorical typing
    /// from the `categorical_feature` parameter and `feature_infos`. When the
    /// model was trained on pandas categoricals the category lists become the
    /// forest's [`CategoryEncoding`].
    ///
    /// # Errors
    ///
    /// Rejects linear trees, multi-output models and objectives with a link
    /// function (binary, poisson, ...), and any structurally invalid tree.
    pub fn to_forest(&self) -> Result<Forest, ConversionError> {
        let header = &self.header;
        if header.num_class > 1 || header.num_tree_per_iteration > 1 {
            return Err(ConversionError::MultiOutput {
                num_class: header.num_class,
                per_iteration: header.num_tree_per_iteration,
            });
        }
        match header.objective_name() {
            Some(name) if !IDENTITY_OBJECTIVES.contains(&name) => {
                return Err(ConversionError::UnsupportedObjective(name.to_string()));
            }
            None => tracing::warn!("model has no objective line, assuming regression"),
            _ => {}
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            if tree.is_linear {
                return Err(ConversionError::LinearTreesNotSupported);
            }
            if tree.num_leaves == 0 {
                return Err(ConversionError::EmptyTree(idx));
            }
        }

        let schema = Arc::new(self.feature_schema()?);
        let encoding = self.category_encoding(&schema)?;

        // Random forest mode averages trees; scale leaves so the sum is the average.
        let leaf_scale = if header.average_output && !self.trees.is_empty() {
            1.0 / self.trees.len() as f64
        } else {
            1.0
        };

        let mut forest = Forest::new(Arc::clone(&schema)).with_encoding(encoding);
        for (tree_idx, lgb_tree) in self.trees.iter().enumerate() {
            forest.push_tree(convert_tree(lgb_tree, tree_idx, leaf_scale)?);
        }
        forest.validate()?;

        tracing::debug!(
            n_trees = forest.n_trees(),
            n_features = schema.n_features(),
            has_categorical = schema.has_categorical(),
            "converted LightGBM model"
        );
        Ok(forest)
    }

    /// Trained feature schema: names plus Numeric/Categorical typing.
    pub fn feature_schema(&self) -> Result<FeatureSchema, ConversionError> {
        let n_features = self.num_features();
        let names = &self.header.feature_names;
        if !names.is_empty() && names.len() != n_features {
            return Err(ConversionError::FeatureNamesMismatch {
                names: names.len(),
                features: n_features,
            });
        }

        let features = (0..n_features)
            .map(|f| {
                let name = names.get(f).cloned().unwrap_or_else(|| format!("Column_{f}"));
                let info = self.header.feature_infos.get(f).map(String::as_str);
                if self.categorical_feature.contains(&f) || info.is_some_and(is_categorical_info) {
                    FeatureMeta::categorical(name)
                } else {
                    FeatureMeta::numeric(name)
                }
            })
            .collect();
        Ok(FeatureSchema::from_features(features))
    }

    /// Raw-value encoding from `pandas_categorical`, assigned to the
    /// categorical features in schema order.
    fn category_encoding(&self, schema: &FeatureSchema) -> Result<CategoryEncoding, ConversionError> {
        let Some(lists) = &self.pandas_categorical else {
            return Ok(CategoryEncoding::identity());
        };
        let categorical: Vec<usize> = schema
            .iter_enumerated()
            .filter(|(_, meta)| meta.feature_type.is_categorical())
            .map(|(f, _)| f)
            .collect();
        if lists.len() != categorical.len() {
            return Err(ConversionError::PandasCategoricalMismatch {
                lists: lists.len(),
                categorical: categorical.len(),
            });
        }

        let encoding = categorical
            .into_iter()
            .zip(lists)
            .fold(CategoryEncoding::identity(), |enc, (f, list)| {
                enc.with_categories(f, category_values(list))
            });
        Ok(encoding)
    }
}

/// `feature_infos` entries are `[min:max]` for numeric features and a
/// colon-separated category list for categorical ones.
fn is_categorical_info(info: &str) -> bool {
    info != "none" && !info.starts_with('[')
}

/// Raw data value of each pandas category. Booleans read as 1/0 and numeric
/// strings are parsed; anything else can never match a data value.
fn category_values(list: &PandasCategories) -> Vec<f64> {
    list.iter()
        .map(|v| match v {
            serde_json::Value::Bool(b) => f64::from(u8::from(*b)),
            serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        })
        .collect()
}

/// Convert a single LightGBM tree.
///
/// Internal nodes keep their indices `0..num_leaves-1`; leaf `i` becomes node
/// `num_leaves - 1 + i`.
fn convert_tree(lgb_tree: &LgbTree, tree_idx: usize, leaf_scale: f64) -> Result<Tree, ConversionError> {
    if lgb_tree.num_leaves == 1 {
        let mut t = MutableTree::with_capacity(1);
        let root = t.init_root_with_n_nodes(1);
        t.make_leaf(root, lgb_tree.leaf_value[0] * leaf_scale);
        return Ok(t.freeze());
    }

    let num_internal = lgb_tree.num_leaves - 1;
    let total_nodes = num_internal + lgb_tree.num_leaves;
    let mut tree = MutableTree::with_capacity(total_nodes);
    tree.init_root_with_n_nodes(total_nodes);

    for node in 0..num_internal {
        let child = |c: i32| convert_child_ref(c, num_internal, total_nodes, tree_idx, node);
        let left = child(lgb_tree.left_child[node])?;
        let right = child(lgb_tree.right_child[node])?;
        let dt = DecisionType::from_i8(lgb_tree.decision_type[node]);
        let feature = lgb_tree.split_feature[node] as u32;
        let id = node as u32;

        if dt.is_categorical {
            let cat_idx = lgb_tree.threshold[node] as usize;
            let bitset = categorical_bitset(lgb_tree, cat_idx).ok_or(
                ConversionError::InvalidCategoricalSplit {
                    tree: tree_idx,
                    node,
                    cat_idx,
                },
            )?;
            // LightGBM sends listed categories left; ours go right. Anything
            // unlisted or missing goes to LightGBM's right child.
            tree.set_categorical_split(id, feature, bitset, true, right, left);
        } else {
            // LightGBM goes left on `<=`; we go left on `<`.
            let threshold = next_up_f64(lgb_tree.threshold[node]);
            tree.set_numeric_split(id, feature, threshold, dt.default_left, left, right);
            tree.set_missing_type(id, convert_missing_type(dt.missing_type));
        }
    }

    for (leaf_idx, &value) in lgb_tree.leaf_value.iter().enumerate() {
        tree.make_leaf((num_internal + leaf_idx) as u32, value * leaf_scale);
    }

    Ok(tree.freeze())
}

fn convert_missing_type(missing_type: LgbMissingType) -> MissingType {
    match missing_type {
        LgbMissingType::None => MissingType::None,
        LgbMissingType::Zero => MissingType::Zero,
        LgbMissingType::NaN => MissingType::NaN,
    }
}

/// Negative references are leaves (`!child`), placed after the internal nodes.
fn convert_child_ref(
    child: i32,
    num_internal: usize,
    total_nodes: usize,
    tree: usize,
    node: usize,
) -> Result<u32, ConversionError> {
    let idx = if child < 0 {
        num_internal + (!child) as usize
    } else {
        child as usize
    };
    if idx >= total_nodes || (child >= 0 && idx >= num_internal) {
        return Err(ConversionError::InvalidChildIndex { tree, node, child });
    }
    Ok(idx as u32)
}

/// Smallest `f64` greater than `x`.
#[inline]
pub(crate) fn next_up_f64(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        // Covers -0.0 too
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Bitset words of categorical split `cat_idx`.
fn categorical_bitset(lgb_tree: &LgbTree, cat_idx: usize) -> Option<Vec<u32>> {
    let start = usize::try_from(*lgb_tree.cat_boundaries.get(cat_idx)?).ok()?;
    let end = usize::try_from(*lgb_tree.cat_boundaries.get(cat_idx + 1)?).ok()?;
    lgb_tree.cat_threshold.get(start..end).map(<[u32]>::to_vec)
}
