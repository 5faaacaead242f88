//! Path bookkeeping for the TreeSHAP recursion.
//!
//! A [`Path`] holds the unique features split on between the root and the
//! current node, each with the fraction of "feature absent" (`zero_fraction`)
//! and "feature present" (`one_fraction`) flow that continues down this
//! branch, plus the permutation weights (`pweight`) of every subset size.
//! The first element is a dummy root entry with no feature.
//!
//! Reference: Lundberg et al. (2020), Algorithm 2.

/// One unique feature on the current root-to-node path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathElement {
    /// Split feature, `None` for the root entry.
    pub feature: Option<u32>,
    /// Fraction of population flow following this branch when the feature is absent.
    pub zero_fraction: f64,
    /// Fraction of the instance's flow following this branch when present (0 or 1).
    pub one_fraction: f64,
    /// Permutation weight.
    pub pweight: f64,
}

/// Unique-feature path with extend/unwind operations.
#[derive(Clone, Debug, Default)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    #[inline]
    pub fn get(&self, index: usize) -> PathElement {
        self.elements[index]
    }

    #[inline]
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Replace this path with a copy of `other`, reusing the allocation.
    #[inline]
    pub fn copy_from(&mut self, other: &Path) {
        self.elements.clear();
        self.elements.extend_from_slice(&other.elements);
    }

    /// Position of `feature` on the path.
    #[inline]
    pub fn position(&self, feature: u32) -> Option<usize> {
        self.elements.iter().position(|e| e.feature == Some(feature))
    }

    /// Append a feature and update the permutation weights.
    pub fn extend(&mut self, feature: Option<u32>, zero_fraction: f64, one_fraction: f64) {
        let depth = self.elements.len();
        self.elements.push(PathElement {
            feature,
            zero_fraction,
            one_fraction,
            pweight: if depth == 0 { 1.0 } else { 0.0 },
        });

        let denom = (depth + 1) as f64;
        for i in (0..depth).rev() {
            let w = self.elements[i].pweight;
            self.elements[i + 1].pweight += one_fraction * w * (i + 1) as f64 / denom;
            self.elements[i].pweight = zero_fraction * w * (depth - i) as f64 / denom;
        }
    }

    /// Remove the element at `index`, undoing its effect on the weights.
    ///
    /// The element must not have both fractions zero.
    pub fn unwind(&mut self, index: usize) {
        let depth = self.elements.len() - 1;
        let PathElement {
            zero_fraction,
            one_fraction,
            ..
        } = self.elements[index];
        let denom = (depth + 1) as f64;
        let mut next_one_portion = self.elements[depth].pweight;

        for i in (0..depth).rev() {
            if one_fraction != 0.0 {
                let tmp = self.elements[i].pweight;
                self.elements[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
                next_one_portion =
                    tmp - self.elements[i].pweight * zero_fraction * (depth - i) as f64 / denom;
            } else {
                self.elements[i].pweight =
                    self.elements[i].pweight * denom / (zero_fraction * (depth - i) as f64);
            }
        }

        for i in index..depth {
            self.elements[i].feature = self.elements[i + 1].feature;
            self.elements[i].zero_fraction = self.elements[i + 1].zero_fraction;
            self.elements[i].one_fraction = self.elements[i + 1].one_fraction;
        }
        self.elements.pop();
    }

    /// Total permutation weight of the path with `index` removed, without
    /// modifying the path.
    pub fn unwound_sum(&self, index: usize) -> f64 {
        let depth = self.elements.len() - 1;
        let PathElement {
            zero_fraction,
            one_fraction,
            ..
        } = self.elements[index];
        let denom = (depth + 1) as f64;
        let mut next_one_portion = self.elements[depth].pweight;
        let mut total = 0.0;

        for i in (0..depth).rev() {
            if one_fraction != 0.0 {
                let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
                total += tmp;
                next_one_portion =
                    self.elements[i].pweight - tmp * zero_fraction * (depth - i) as f64 / denom;
            } else {
                total += self.elements[i].pweight / zero_fraction / ((depth - i) as f64 / denom);
            }
        }
        total
    }
}

/// One [`Path`] per recursion depth.
///
/// Entering depth `d` copies the path at `d - 1` into slot `d`, so returning
/// from a child leaves the parent's path untouched.
#[derive(Debug, Default)]
pub struct PathState {
    frames: Vec<Path>,
}

impl PathState {
    /// Pre-size for trees up to `max_depth` splits deep.
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: (0..=max_depth)
                .map(|_| Path::with_capacity(max_depth + 1))
                .collect(),
        }
    }

    /// Prepare the frame at `depth` as a copy of its parent (empty at the root).
    pub fn enter(&mut self, depth: usize) -> &mut Path {
        while self.frames.len() <= depth {
            self.frames.push(Path::with_capacity(depth + 1));
        }
        if depth == 0 {
            self.frames[0].clear();
        } else {
            let (parents, rest) = self.frames.split_at_mut(depth);
            rest[0].copy_from(&parents[depth - 1]);
        }
        &mut self.frames[depth]
    }

    #[inline]
    pub fn frame(&self, depth: usize) -> &Path {
        &self.frames[depth]
    }

    #[inline]
    pub fn frame_mut(&mut self, depth: usize) -> &mut Path {
        &mut self.frames[depth]
    }
}
