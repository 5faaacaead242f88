//! Raw-value to category-code mapping.
//!
//! Models trained on pandas categoricals split on category *codes* (the
//! position of a value in the column's sorted category list), while the data
//! we diagnose carries raw values. The encoding is applied right before
//! routing, so instances, benchmarks and reports keep the raw values.

use std::borrow::Cow;

/// Per-feature category lists; a feature without a list is routed raw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryEncoding {
    categories: Vec<Option<Vec<f64>>>,
}

impl CategoryEncoding {
    /// Encoding that leaves every feature unchanged.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Set the category list for `feature`; code `i` stands for `categories[i]`.
    pub fn with_categories(mut self, feature: usize, categories: Vec<f64>) -> Self {
        if self.categories.len() <= feature {
            self.categories.resize(feature + 1, None);
        }
        self.categories[feature] = Some(categories);
        self
    }

    /// Whether no feature is encoded.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.categories.iter().all(Option::is_none)
    }

    /// Category list of `feature`, if it is encoded.
    pub fn categories(&self, feature: usize) -> Option<&[f64]> {
        self.categories.get(feature).and_then(|c| c.as_deref())
    }

    /// Code for one raw value. Unknown values become `NaN` (missing).
    #[inline]
    pub fn encode(&self, feature: usize, raw: f64) -> f64 {
        match self.categories(feature) {
            None => raw,
            Some(_) if raw.is_nan() => raw,
            Some(cats) => cats
                .iter()
                .position(|&c| c == raw)
                .map_or(f64::NAN, |code| code as f64),
        }
    }

    /// Encode a whole row, borrowing it when nothing needs to change.
    pub fn encode_row<'a>(&self, row: &'a [f64]) -> Cow<'a, [f64]> {
        if self.is_identity() {
            return Cow::Borrowed(row);
        }
        Cow::Owned(
            row.iter()
                .enumerate()
                .map(|(f, &v)| self.encode(f, v))
                .collect(),
        )
    }
}
