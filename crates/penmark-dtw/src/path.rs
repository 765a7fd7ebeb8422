//! Warping path types for DTW alignment.

/// A single step in a DTW warping path, mapping index `a` in the first series
/// to index `b` in the second series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarpingStep {
    /// Index in the first time series.
    pub a: usize,
    /// Index in the second time series.
    pub b: usize,
}

/// An ordered sequence of warping steps from `(0, 0)` to `(n-1, m-1)`.
///
/// Both indices are non-decreasing along the path, so the steps for any given
/// `a` form one contiguous run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarpingPath(Vec<WarpingStep>);

impl WarpingPath {
    /// Create a new warping path from a vector of steps.
    pub(crate) fn new(steps: Vec<WarpingStep>) -> Self {
        Self(steps)
    }

    /// Return the warping steps as a slice.
    #[must_use]
    pub fn steps(&self) -> &[WarpingStep] {
        &self.0
    }

    /// Return the number of steps in the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return true if the path contains no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All steps whose first-series index equals `a`.
    ///
    /// The `b` fields of the returned steps are the second-series points aligned
    /// to point `a`. Empty if `a` is outside the path.
    #[must_use]
    pub fn matches_for(&self, a: usize) -> &[WarpingStep] {
        let lo = self.0.partition_point(|s| s.a < a);
        let hi = self.0.partition_point(|s| s.a <= a);
        &self.0[lo..hi]
    }
}

impl<'a> IntoIterator for &'a WarpingPath {
    type Item = &'a WarpingStep;
    type IntoIter = std::slice::Iter<'a, WarpingStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(pairs: &[(usize, usize)]) -> WarpingPath {
        WarpingPath::new(pairs.iter().map(|&(a, b)| WarpingStep { a, b }).collect())
    }

    #[test]
    fn matches_for_collects_run() {
        let p = path(&[(0, 0), (1, 1), (1, 2), (1, 3), (2, 4)]);
        let bs: Vec<usize> = p.matches_for(1).iter().map(|s| s.b).collect();
        assert_eq!(bs, vec![1, 2, 3]);
    }

    #[test]
    fn matches_for_repeated_a_in_second_series() {
        let p = path(&[(0, 0), (1, 0), (2, 0), (2, 1)]);
        assert_eq!(p.matches_for(0).len(), 1);
        assert_eq!(p.matches_for(2).len(), 2);
    }

    #[test]
    fn matches_for_out_of_range_is_empty() {
        let p = path(&[(0, 0), (1, 1)]);
        assert!(p.matches_for(5).is_empty());
        assert!(WarpingPath::default().matches_for(0).is_empty());
    }
}
