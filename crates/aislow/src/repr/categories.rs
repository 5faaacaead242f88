//! Categorical split storage for tree nodes.
//!
//! Each categorical node owns a packed bitset of category codes. Codes in the
//! set go RIGHT, codes not in the set go LEFT, and missing values follow the
//! node's default direction. Loaders for formats with the opposite convention
//! swap the children when converting.

// =============================================================================
// CategoriesStorage
// =============================================================================

/// Storage for categorical split bitsets in a tree.
///
/// # Format
///
/// - `bitsets`: flat array of u32 bitset words for all nodes
/// - `segments`: per-node `(start_index, size)` into the bitsets array
///
/// Nodes without a categorical split have segment `(0, 0)`.
#[derive(Debug, Clone, Default)]
pub struct CategoriesStorage {
    bitsets: Box<[u32]>,
    segments: Box<[(u32, u32)]>,
}

impl CategoriesStorage {
    /// Create empty categories storage.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create categories storage from raw data.
    ///
    /// `segments` must have one entry per tree node.
    pub fn new(bitsets: Vec<u32>, segments: Vec<(u32, u32)>) -> Self {
        Self {
            bitsets: bitsets.into_boxed_slice(),
            segments: segments.into_boxed_slice(),
        }
    }

    /// Whether `category` is in the node's set, i.e. goes right.
    #[inline]
    pub fn category_goes_right(&self, node: u32, category: u32) -> bool {
        let Some(&(start, size)) = self.segments.get(node as usize) else {
            return false;
        };
        let word_idx = category >> 5;
        let bit_idx = category & 31;
        if word_idx >= size {
            return false;
        }
        let word = self.bitsets[(start + word_idx) as usize];
        (word >> bit_idx) & 1 != 0
    }

    /// Whether this storage has any categorical data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn segments(&self) -> &[(u32, u32)] {
        &self.segments
    }

    /// The bitset words of one node.
    #[inline]
    pub fn bitset_for_node(&self, node: u32) -> &[u32] {
        match self.segments.get(node as usize) {
            Some(&(start, size)) => &self.bitsets[start as usize..(start + size) as usize],
            None => &[],
        }
    }
}

// =============================================================================
// Bitset Builder Utilities
// =============================================================================

/// Convert a (category-coded) feature value to a category index.
///
/// The value is truncated towards zero. Returns `None` for `NaN`, negative
/// values and values beyond `u32`; such values are never in a category set.
#[inline]
pub fn float_to_category(value: f64) -> Option<u32> {
    let truncated = value.trunc();
    if truncated.is_nan() || truncated < 0.0 || truncated >= u32::MAX as f64 {
        return None;
    }
    Some(truncated as u32)
}

/// Build a packed u32 bitset from a list of category values.
///
/// Category `c` is bit `c % 32` of word `c / 32`.
pub fn categories_to_bitset(categories: &[u32]) -> Vec<u32> {
    let Some(max_cat) = categories.iter().copied().max() else {
        return Vec::new();
    };
    let mut bitset = vec![0u32; ((max_cat >> 5) + 1) as usize];
    for &cat in categories {
        bitset[(cat >> 5) as usize] |= 1 << (cat & 31);
    }
    bitset
}
