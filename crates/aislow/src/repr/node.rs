//! Tree node types.

/// Type of split in a decision tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SplitType {
    /// Numeric split: go left if value < threshold
    #[default]
    Numeric = 0,
    /// Categorical split: go right if the category is in the node's set
    Categorical = 1,
}

impl From<u8> for SplitType {
    fn from(value: u8) -> Self {
        match value {
            0 => SplitType::Numeric,
            _ => SplitType::Categorical,
        }
    }
}

/// Which values a split treats as missing.
///
/// Missing values follow the node's default direction instead of the split
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingType {
    /// Nothing is missing; `NaN` is compared as `0.0`.
    None,
    /// Zero (and `NaN`, which reads as zero) is missing.
    Zero,
    /// `NaN` is missing.
    #[default]
    NaN,
}

/// Values with magnitude at or below this are zero for [`MissingType::Zero`].
pub const ZERO_THRESHOLD: f64 = 1e-35;

impl MissingType {
    /// Whether `value` takes the default direction at a numeric split.
    #[inline]
    pub fn is_missing(self, value: f64) -> bool {
        match self {
            MissingType::None => false,
            MissingType::Zero => value.is_nan() || value.abs() <= ZERO_THRESHOLD,
            MissingType::NaN => value.is_nan(),
        }
    }
}
