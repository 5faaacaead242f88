//! LightGBM text model format parser.
//!
//! Parses the `.txt` files written by `Booster.save_model()`: a line-based
//! format of `key=value` pairs, one block per tree, followed by a footer with
//! training parameters and the `pandas_categorical` line.

use std::collections::HashMap;
use std::iter::Peekable;
use std::path::Path;
use std::str::Lines;

// =============================================================================
// Error types
// =============================================================================

/// Error type for LightGBM model parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("cannot read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("array size mismatch for {field}: expected {expected}, got {actual}")]
    ArraySizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid pandas_categorical line: {0}")]
    PandasCategorical(#[source] serde_json::Error),
}

// =============================================================================
// Decision type bitfield
// =============================================================================

/// Which values a LightGBM split sends in its default direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LgbMissingType {
    #[default]
    None,
    Zero,
    NaN,
}

/// Parsed decision type from LightGBM's bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionType {
    pub is_categorical: bool,
    /// Missing values go left.
    pub default_left: bool,
    pub missing_type: LgbMissingType,
}

impl DecisionType {
    /// Parse from LightGBM's decision_type bitfield.
    ///
    /// Bit layout:
    /// - Bit 0: categorical flag
    /// - Bit 1: default_left flag
    /// - Bits 2-3: missing type (0=None, 1=Zero, 2=NaN)
    pub fn from_i8(value: i8) -> Self {
        let v = value as u8;
        DecisionType {
            is_categorical: (v & 1) != 0,
            default_left: (v & 2) != 0,
            missing_type: match (v >> 2) & 3 {
                1 => LgbMissingType::Zero,
                2 => LgbMissingType::NaN,
                _ => LgbMissingType::None,
            },
        }
    }
}

// =============================================================================
// Parsed tree structure
// =============================================================================

/// A parsed LightGBM tree, arrays as stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct LgbTree {
    pub num_leaves: usize,
    /// Number of categorical splits.
    pub num_cat: usize,
    /// Feature index per internal node (`num_leaves - 1` entries).
    pub split_feature: Vec<i32>,
    /// Threshold per internal node; for categorical splits, the index into
    /// `cat_boundaries`.
    pub threshold: Vec<f64>,
    pub decision_type: Vec<i8>,
    /// Child per internal node; negative values are leaves (`!child`).
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    /// Output per leaf, shrinkage already applied.
    pub leaf_value: Vec<f64>,
    /// Training sample count per leaf.
    pub leaf_count: Vec<i64>,
    /// Training sample count per internal node.
    pub internal_count: Vec<i64>,
    pub shrinkage: f64,
    pub is_linear: bool,
    /// `num_cat + 1` offsets into `cat_threshold`.
    pub cat_boundaries: Vec<i32>,
    /// Concatenated 32-bit words of every categorical split's bitset.
    pub cat_threshold: Vec<u32>,
}

impl Default for LgbTree {
    fn default() -> Self {
        Self {
            num_leaves: 0,
            num_cat: 0,
            split_feature: Vec::new(),
            threshold: Vec::new(),
            decision_type: Vec::new(),
            left_child: Vec::new(),
            right_child: Vec::new(),
            leaf_value: Vec::new(),
            leaf_count: Vec::new(),
            internal_count: Vec::new(),
            shrinkage: 1.0,
            is_linear: false,
            cat_boundaries: Vec::new(),
            cat_threshold: Vec::new(),
        }
    }
}

// =============================================================================
// Model header
// =============================================================================

/// Parsed LightGBM model header.
#[derive(Debug, Clone, PartialEq)]
pub struct LgbHeader {
    /// Model format version (e.g., "v4").
    pub version: String,
    pub num_class: usize,
    pub num_tree_per_iteration: usize,
    /// Maximum feature index (0-based).
    pub max_feature_idx: usize,
    /// Objective line, e.g. `regression` or `binary sigmoid:1`.
    pub objective: Option<String>,
    /// Predictions average the trees instead of summing them (random forest mode).
    pub average_output: bool,
    pub feature_names: Vec<String>,
    /// Per feature: `[min:max]` for numeric, `a:b:c` category list for
    /// categorical, `none` for unused.
    pub feature_infos: Vec<String>,
}

impl Default for LgbHeader {
    fn default() -> Self {
        Self {
            version: String::new(),
            num_class: 1,
            num_tree_per_iteration: 1,
            max_feature_idx: 0,
            objective: None,
            average_output: false,
            feature_names: Vec::new(),
            feature_infos: Vec::new(),
        }
    }
}

impl LgbHeader {
    /// Objective name without its parameters.
    pub fn objective_name(&self) -> Option<&str> {
        self.objective.as_deref().and_then(|o| o.split_whitespace().next())
    }
}

// =============================================================================
// Full model
// =============================================================================

/// One category list from the `pandas_categorical` line, as raw JSON values.
pub type PandasCategories = Vec<serde_json::Value>;

/// A parsed LightGBM model.
#[derive(Debug, Clone, PartialEq)]
pub struct LgbModel {
    pub header: LgbHeader,
    pub trees: Vec<LgbTree>,
    /// Feature indices from the `categorical_feature` training parameter.
    pub categorical_feature: Vec<usize>,
    /// Category lists of pandas categorical columns, in column order.
    pub pandas_categorical: Option<Vec<PandasCategories>>,
}

impl LgbModel {
    /// Load a model from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_string(&content)?;
        tracing::info!(
            path = %path.display(),
            n_trees = model.num_trees(),
            n_features = model.num_features(),
            "loaded LightGBM model"
        );
        Ok(model)
    }

    /// Parse a model from a string.
    pub fn from_string(content: &str) -> Result<Self, ParseError> {
        let mut lines = content.lines().peekable();
        let header = parse_header(&mut lines)?;

        let mut trees = Vec::new();
        while let Some(line) = lines.peek() {
            if line.starts_with("Tree=") {
                lines.next();
                trees.push(parse_tree(&mut lines)?);
            } else if *line == "end of trees" {
                lines.next();
                break;
            } else {
                lines.next();
            }
        }

        let mut categorical_feature = Vec::new();
        let mut pandas_categorical = None;
        for line in lines {
            if let Some(list) = line
                .strip_prefix("[categorical_feature:")
                .and_then(|rest| rest.strip_suffix(']'))
            {
                categorical_feature = parse_index_list(list, &header.feature_names)?;
            } else if let Some(json) = line.strip_prefix("pandas_categorical:") {
                pandas_categorical = serde_json::from_str::<Option<Vec<PandasCategories>>>(json)
                    .map_err(ParseError::PandasCategorical)?;
            }
        }

        Ok(LgbModel {
            header,
            trees,
            categorical_feature,
            pandas_categorical,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.header.max_feature_idx + 1
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Collect `key=value` lines until `stop` says so. Bare lines go to `flags`.
fn collect_pairs(
    lines: &mut Peekable<Lines<'_>>,
    stop: impl Fn(&str) -> bool,
    flags: &mut Vec<String>,
) -> HashMap<String, String> {
    let mut kv = HashMap::new();
    while let Some(line) = lines.next_if(|l| !stop(l)) {
        match line.split_once('=') {
            Some((key, value)) => {
                kv.insert(key.to_string(), value.to_string());
            }
            None => flags.push(line.to_string()),
        }
    }
    kv
}

fn parse_header(lines: &mut Peekable<Lines<'_>>) -> Result<LgbHeader, ParseError> {
    let mut flags = Vec::new();
    let kv = collect_pairs(lines, |l| l.starts_with("Tree=") || l == "end of trees", &mut flags);

    let num_class = parse_field(&kv, "num_class")?.ok_or(ParseError::MissingField("num_class"))?;
    let max_feature_idx =
        parse_field(&kv, "max_feature_idx")?.ok_or(ParseError::MissingField("max_feature_idx"))?;

    let split_list = |key: &str| -> Vec<String> {
        kv.get(key)
            .map(|v| v.split(' ').map(str::to_string).collect())
            .unwrap_or_default()
    };

    Ok(LgbHeader {
        version: kv.get("version").cloned().unwrap_or_default(),
        num_class,
        num_tree_per_iteration: parse_field(&kv, "num_tree_per_iteration")?.unwrap_or(num_class),
        max_feature_idx,
        objective: kv.get("objective").cloned(),
        average_output: flags.iter().any(|f| f == "average_output"),
        feature_names: split_list("feature_names"),
        feature_infos: split_list("feature_infos"),
    })
}

fn parse_tree(lines: &mut Peekable<Lines<'_>>) -> Result<LgbTree, ParseError> {
    let mut flags = Vec::new();
    let kv = collect_pairs(
        lines,
        |l| l.is_empty() || l.starts_with("Tree=") || l == "end of trees",
        &mut flags,
    );

    let num_leaves: usize =
        parse_field(&kv, "num_leaves")?.ok_or(ParseError::MissingField("num_leaves"))?;
    let mut tree = LgbTree {
        num_leaves,
        num_cat: parse_field(&kv, "num_cat")?.unwrap_or(0),
        shrinkage: parse_field(&kv, "shrinkage")?.unwrap_or(1.0),
        is_linear: parse_field::<i32>(&kv, "is_linear")?.is_some_and(|v| v != 0),
        ..LgbTree::default()
    };

    tree.leaf_value = parse_array(&kv, "leaf_value")?.ok_or(ParseError::MissingField("leaf_value"))?;
    validate_array_size("leaf_value", &tree.leaf_value, num_leaves.max(1))?;
    tree.leaf_count = parse_array(&kv, "leaf_count")?.unwrap_or_default();

    // Single-leaf tree has no splits
    if num_leaves <= 1 {
        return Ok(tree);
    }
    let num_splits = num_leaves - 1;

    tree.split_feature = required_array(&kv, "split_feature", num_splits)?;
    tree.threshold = required_array(&kv, "threshold", num_splits)?;
    tree.left_child = required_array(&kv, "left_child", num_splits)?;
    tree.right_child = required_array(&kv, "right_child", num_splits)?;
    tree.decision_type = parse_array(&kv, "decision_type")?.unwrap_or_else(|| vec![0; num_splits]);
    validate_array_size("decision_type", &tree.decision_type, num_splits)?;
    tree.internal_count = parse_array(&kv, "internal_count")?.unwrap_or_default();

    if tree.num_cat > 0 {
        tree.cat_boundaries = required_array(&kv, "cat_boundaries", tree.num_cat + 1)?;
        tree.cat_threshold =
            parse_array(&kv, "cat_threshold")?.ok_or(ParseError::MissingField("cat_threshold"))?;
    }

    Ok(tree)
}

fn parse_field<T: std::str::FromStr>(
    kv: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<T>, ParseError> {
    kv.get(field)
        .map(|v| {
            v.trim().parse().map_err(|_| ParseError::InvalidValue {
                field,
                message: format!("cannot parse `{}`", v),
            })
        })
        .transpose()
}

fn parse_array<T: std::str::FromStr>(
    kv: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<Vec<T>>, ParseError> {
    kv.get(field)
        .map(|v| {
            v.split_whitespace()
                .map(|item| {
                    item.parse().map_err(|_| ParseError::InvalidValue {
                        field,
                        message: format!("cannot parse array element `{}`", item),
                    })
                })
                .collect()
        })
        .transpose()
}

fn required_array<T: std::str::FromStr>(
    kv: &HashMap<String, String>,
    field: &'static str,
    expected: usize,
) -> Result<Vec<T>, ParseError> {
    let values = parse_array(kv, field)?.ok_or(ParseError::MissingField(field))?;
    validate_array_size(field, &values, expected)?;
    Ok(values)
}

fn validate_array_size<T>(field: &'static str, arr: &[T], expected: usize) -> Result<(), ParseError> {
    if arr.len() != expected {
        return Err(ParseError::ArraySizeMismatch {
            field,
            expected,
            actual: arr.len(),
        });
    }
    Ok(())
}

/// Parse `0,3,5` (or `name:a,b`, or feature names) into feature indices.
fn parse_index_list(list: &str, feature_names: &[String]) -> Result<Vec<usize>, ParseError> {
    let list = list.trim();
    let list = list.strip_prefix("name:").unwrap_or(list);
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            item.parse::<usize>()
                .ok()
                .or_else(|| feature_names.iter().position(|n| n == item))
                .ok_or_else(|| ParseError::InvalidValue {
                    field: "categorical_feature",
                    message: format!("unknown feature `{}`", item),
                })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
