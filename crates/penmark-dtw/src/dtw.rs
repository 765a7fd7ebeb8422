//! DTW distance computation.

use std::ops::Range;

use tracing::instrument;

use crate::cost::{CoordWeights, CostFunction, validate_weights};
use crate::distance::DtwDistance;
use crate::error::DtwError;
use crate::path::{WarpingPath, WarpingStep};
use crate::series::TimeSeriesView;
use crate::window::SearchWindow;

/// Immutable DTW configuration: coordinate weights and local cost function.
///
/// Thread-safe and cheap to clone. Distances are the accumulated local cost at
/// `(n-1, m-1)`; no square root is taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Dtw {
    weights: CoordWeights,
    cost: CostFunction,
}

impl Dtw {
    /// Create a DTW calculator with the given coordinate weights and the
    /// default squared-difference cost.
    #[must_use]
    pub fn new(weights: CoordWeights) -> Self {
        Self {
            weights,
            cost: CostFunction::default(),
        }
    }

    /// Create a DTW calculator with all coordinate weights equal to one.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::ZeroDimension`] if `dim` is zero.
    pub fn unweighted(dim: usize) -> Result<Self, DtwError> {
        Ok(Self::new(CoordWeights::uniform(dim)?))
    }

    /// Replace the local cost function.
    #[must_use]
    pub fn with_cost(mut self, cost: CostFunction) -> Self {
        self.cost = cost;
        self
    }

    /// Return the coordinate weights.
    #[must_use]
    pub fn weights(&self) -> &CoordWeights {
        &self.weights
    }

    /// Return the local cost function.
    #[must_use]
    pub fn cost(&self) -> CostFunction {
        self.cost
    }

    /// Compute the unconstrained DTW distance between two series.
    ///
    /// Uses a rolling two-row buffer rather than the full cost matrix.
    ///
    /// # Errors
    ///
    /// See [`distance_within`][Dtw::distance_within].
    #[instrument(skip(self, a, b), fields(n = a.len(), m = b.len()))]
    pub fn distance(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
    ) -> Result<DtwDistance, DtwError> {
        self.distance_within(a, b, &SearchWindow::full(a.len(), b.len()), None)
    }

    /// Compute the unconstrained DTW distance with each row's local cost scaled
    /// by `point_weights[i]`.
    ///
    /// # Errors
    ///
    /// See [`distance_within`][Dtw::distance_within].
    #[instrument(skip(self, a, b, point_weights), fields(n = a.len(), m = b.len()))]
    pub fn weighted_distance(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        point_weights: &[f64],
    ) -> Result<DtwDistance, DtwError> {
        self.distance_within(
            a,
            b,
            &SearchWindow::full(a.len(), b.len()),
            Some(point_weights),
        )
    }

    /// Compute the unconstrained DTW distance and optimal warping path.
    ///
    /// # Errors
    ///
    /// See [`distance_within`][Dtw::distance_within].
    #[instrument(skip(self, a, b), fields(n = a.len(), m = b.len()))]
    pub fn distance_and_path(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
    ) -> Result<(DtwDistance, WarpingPath), DtwError> {
        self.path_within(a, b, &SearchWindow::full(a.len(), b.len()), None)
    }

    /// Compute the DTW distance restricted to `window`.
    ///
    /// Cells outside the window are unreachable. When `point_weights` is given,
    /// the local cost of every cell in row `i` is multiplied by
    /// `point_weights[i]` before accumulation. If either series is empty the
    /// result is [`DtwDistance::ZERO`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::DimensionMismatch`] | `a` and `b` differ in point dimension |
    /// | [`DtwError::WeightCountMismatch`] | Coordinate weights do not match the dimension |
    /// | [`DtwError::PointWeightCountMismatch`] | `point_weights.len() != a.len()` |
    /// | [`DtwError::InvalidWeight`] | A point weight is negative or non-finite |
    /// | [`DtwError::WindowShapeMismatch`] | `window` was built for other lengths |
    pub fn distance_within(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        window: &SearchWindow,
        point_weights: Option<&[f64]>,
    ) -> Result<DtwDistance, DtwError> {
        self.check(a, b, window, point_weights)?;
        if a.is_empty() || b.is_empty() {
            return Ok(DtwDistance::ZERO);
        }
        Ok(DtwDistance::new(self.rolling(a, b, window, point_weights)))
    }

    /// Compute the DTW distance and warping path restricted to `window`.
    ///
    /// Allocates the banded cost matrix and a direction array for traceback.
    /// Ties prefer the diagonal predecessor, then the one above, then the one to
    /// the left. If either series is empty the path is empty and the distance
    /// is [`DtwDistance::ZERO`].
    ///
    /// # Errors
    ///
    /// Same as [`distance_within`][Dtw::distance_within].
    pub fn path_within(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        window: &SearchWindow,
        point_weights: Option<&[f64]>,
    ) -> Result<(DtwDistance, WarpingPath), DtwError> {
        self.check(a, b, window, point_weights)?;
        if a.is_empty() || b.is_empty() {
            return Ok((DtwDistance::ZERO, WarpingPath::default()));
        }
        let (dist, steps) = self.full_band(a, b, window, point_weights);
        Ok((DtwDistance::new(dist), WarpingPath::new(steps)))
    }

    fn check(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        window: &SearchWindow,
        point_weights: Option<&[f64]>,
    ) -> Result<(), DtwError> {
        if a.dim() != b.dim() {
            return Err(DtwError::DimensionMismatch {
                left: a.dim(),
                right: b.dim(),
            });
        }
        if self.weights.dim() != a.dim() {
            return Err(DtwError::WeightCountMismatch {
                expected: a.dim(),
                got: self.weights.dim(),
            });
        }
        if let Some(pw) = point_weights {
            if pw.len() != a.len() {
                return Err(DtwError::PointWeightCountMismatch {
                    expected: a.len(),
                    got: pw.len(),
                });
            }
            validate_weights(pw)?;
        }
        if window.rows() != a.len() || window.cols() != b.len() {
            return Err(DtwError::WindowShapeMismatch {
                rows: window.rows(),
                cols: window.cols(),
                n: a.len(),
                m: b.len(),
            });
        }
        Ok(())
    }

    /// Rolling two-row DTW over a search window.
    ///
    /// Each buffer holds one row's window cells, indexed by `j - range.start`.
    /// Predecessors outside the previous row's range read as infinity.
    fn rolling(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        window: &SearchWindow,
        point_weights: Option<&[f64]>,
    ) -> f64 {
        let n = a.len();
        let m = b.len();
        let w = self.weights.as_slice();
        let bw = window.max_width();

        let mut prev = vec![f64::INFINITY; bw];
        let mut curr = vec![f64::INFINITY; bw];
        let mut prev_range = 0..0;

        for i in 0..n {
            let range = window.column_range(i);
            let scale = point_weights.map_or(1.0, |pw| pw[i]);
            let ai = a.point(i);

            for j in range.clone() {
                let local = scale * self.cost.eval(w, ai, b.point(j));
                let k = j - range.start;
                let best = if i == 0 && j == 0 {
                    0.0
                } else {
                    let left = if j > range.start {
                        curr[k - 1]
                    } else {
                        f64::INFINITY
                    };
                    let above = cell(&prev, &prev_range, Some(j));
                    let diag = cell(&prev, &prev_range, j.checked_sub(1));
                    diag.min(above).min(left)
                };
                curr[k] = local + best;
            }

            std::mem::swap(&mut prev, &mut curr);
            prev_range = range;
        }

        // After the final swap, `prev` holds the last completed row.
        prev[(m - 1) - prev_range.start]
    }

    /// Full banded cost matrix DTW, returning both distance and warping path.
    ///
    /// Cell `(i, j)` maps to flat index `i * bw + (j - range.start)`, where
    /// `bw` is the widest row of the window. Direction bytes record the chosen
    /// predecessor: 0 = diagonal, 1 = above, 2 = left.
    fn full_band(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        window: &SearchWindow,
        point_weights: Option<&[f64]>,
    ) -> (f64, Vec<WarpingStep>) {
        let n = a.len();
        let m = b.len();
        let w = self.weights.as_slice();
        let bw = window.max_width();

        let mut cost = vec![f64::INFINITY; n * bw];
        let mut dirs = vec![0u8; n * bw];

        for i in 0..n {
            let range = window.column_range(i);
            let prev_range = if i > 0 {
                window.column_range(i - 1)
            } else {
                0..0
            };
            let prev_row = if i > 0 {
                &cost[(i - 1) * bw..i * bw]
            } else {
                &[][..]
            };
            let scale = point_weights.map_or(1.0, |pw| pw[i]);
            let ai = a.point(i);

            let mut row = vec![f64::INFINITY; range.len()];
            let mut row_dirs = vec![0u8; range.len()];
            for j in range.clone() {
                let local = scale * self.cost.eval(w, ai, b.point(j));
                let k = j - range.start;

                if i == 0 && j == 0 {
                    row[k] = local;
                    continue;
                }

                let diag = cell(prev_row, &prev_range, j.checked_sub(1));
                let above = cell(prev_row, &prev_range, Some(j));
                let left = if j > range.start {
                    row[k - 1]
                } else {
                    f64::INFINITY
                };

                let (best, dir) = if diag <= above && diag <= left {
                    (diag, 0u8)
                } else if above <= left {
                    (above, 1u8)
                } else {
                    (left, 2u8)
                };
                row[k] = local + best;
                row_dirs[k] = dir;
            }

            cost[i * bw..i * bw + row.len()].copy_from_slice(&row);
            dirs[i * bw..i * bw + row_dirs.len()].copy_from_slice(&row_dirs);
        }

        // Traceback from (n-1, m-1) to (0, 0).
        let mut path = Vec::with_capacity(n + m);
        let mut i = n - 1;
        let mut j = m - 1;

        loop {
            path.push(WarpingStep { a: i, b: j });
            if i == 0 && j == 0 {
                break;
            }
            let idx = i * bw + (j - window.column_range(i).start);
            match dirs[idx] {
                0 => {
                    i -= 1;
                    j -= 1;
                }
                1 => {
                    i -= 1;
                }
                2 => {
                    j -= 1;
                }
                _ => unreachable!("invalid direction byte"),
            }
        }

        path.reverse();

        let final_local = (m - 1) - window.column_range(n - 1).start;
        (cost[(n - 1) * bw + final_local], path)
    }
}

/// Read column `j` of a stored row, or infinity if `j` is outside its range.
#[inline]
fn cell(row: &[f64], range: &Range<usize>, j: Option<usize>) -> f64 {
    match j {
        Some(j) if range.contains(&j) => row[j - range.start],
        _ => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_scalars(values.to_vec()).unwrap()
    }

    fn dtw1() -> Dtw {
        Dtw::unweighted(1).unwrap()
    }

    #[test]
    fn identical_series_distance_zero() {
        let ts = series(&[1.0, 2.0, 3.0]);
        let dist = dtw1().distance(ts.as_view(), ts.as_view()).unwrap();
        assert_eq!(dist.value(), 0.0);
    }

    #[test]
    fn hand_computed_2x2() {
        // a=[0,1], b=[1,0]
        // C[0][0] = (0-1)² = 1
        // C[0][1] = (0-0)² + C[0][0] = 1
        // C[1][0] = (1-1)² + C[0][0] = 1
        // C[1][1] = (1-0)² + min(1, 1, 1) = 2
        let a = series(&[0.0, 1.0]);
        let b = series(&[1.0, 0.0]);
        let dist = dtw1().distance(a.as_view(), b.as_view()).unwrap();
        assert!((dist.value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn absolute_cost_hand_computed() {
        // a=[0,3], b=[1]: |0-1| + |3-1| = 3
        let a = series(&[0.0, 3.0]);
        let b = series(&[1.0]);
        let dtw = dtw1().with_cost(CostFunction::AbsoluteDifference);
        let dist = dtw.distance(a.as_view(), b.as_view()).unwrap();
        assert!((dist.value() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn point_weights_scale_rows() {
        // a=[0,1], b=[1,0], row weights [2, 0.5]
        // C[0][0] = 2*1 = 2, C[0][1] = 2*0 + 2 = 2, C[1][0] = 0.5*0 + 2 = 2
        // C[1][1] = 0.5*1 + 2 = 2.5
        let a = series(&[0.0, 1.0]);
        let b = series(&[1.0, 0.0]);
        let dist = dtw1()
            .weighted_distance(a.as_view(), b.as_view(), &[2.0, 0.5])
            .unwrap();
        assert!((dist.value() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn unit_point_weights_match_unweighted() {
        let a = series(&[1.0, 5.0, 2.0, 8.0]);
        let b = series(&[2.0, 4.0, 7.0]);
        let plain = dtw1().distance(a.as_view(), b.as_view()).unwrap();
        let weighted = dtw1()
            .weighted_distance(a.as_view(), b.as_view(), &[1.0; 4])
            .unwrap();
        assert_eq!(plain, weighted);
    }

    #[test]
    fn coordinate_weights_apply_per_dimension() {
        let a = TimeSeries::from_points(&[vec![0.0, 0.0]]).unwrap();
        let b = TimeSeries::from_points(&[vec![1.0, 2.0]]).unwrap();
        let dtw = Dtw::new(CoordWeights::new(vec![3.0, 0.5]).unwrap());
        // 3*1 + 0.5*4
        let dist = dtw.distance(a.as_view(), b.as_view()).unwrap();
        assert!((dist.value() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn band_forces_diagonal_on_constant_offset() {
        let a = series(&[0.0, 0.0, 0.0]);
        let b = series(&[1.0, 1.0, 1.0]);
        let window = SearchWindow::sakoe_chiba(3, 3, 0);
        let dist = dtw1()
            .distance_within(a.as_view(), b.as_view(), &window, None)
            .unwrap();
        assert!((dist.value() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn band_distance_geq_unconstrained() {
        let a = series(&[0.0, 1.0, 0.0, 1.0, 0.0]);
        let b = series(&[1.0, 0.0, 1.0, 0.0, 1.0]);
        let full = dtw1().distance(a.as_view(), b.as_view()).unwrap();
        let window = SearchWindow::sakoe_chiba(5, 5, 1);
        let banded = dtw1()
            .distance_within(a.as_view(), b.as_view(), &window, None)
            .unwrap();
        assert!(banded.value() >= full.value() - 1e-12);
    }

    #[test]
    fn warping_path_endpoints() {
        let a = series(&[1.0, 2.0, 3.0, 4.0]);
        let b = series(&[1.0, 3.0, 4.0]);
        let (_, path) = dtw1().distance_and_path(a.as_view(), b.as_view()).unwrap();
        let steps = path.steps();
        assert_eq!(steps.first().unwrap(), &WarpingStep { a: 0, b: 0 });
        assert_eq!(steps.last().unwrap(), &WarpingStep { a: 3, b: 2 });
    }

    #[test]
    fn distance_matches_distance_and_path() {
        let a = series(&[1.0, 3.0, 5.0, 2.0]);
        let b = series(&[2.0, 4.0, 1.0]);
        let dist_only = dtw1().distance(a.as_view(), b.as_view()).unwrap();
        let (with_path, _) = dtw1().distance_and_path(a.as_view(), b.as_view()).unwrap();
        assert!((dist_only.value() - with_path.value()).abs() < 1e-12);
    }

    #[test]
    fn windowed_distance_matches_windowed_path() {
        let a = series(&[1.0, 3.0, 5.0, 2.0, 0.0, 4.0]);
        let b = series(&[2.0, 4.0, 1.0, 3.0]);
        let window = SearchWindow::sakoe_chiba(6, 4, 1);
        let pw = [1.0, 0.5, 2.0, 1.0, 0.1, 1.0];
        let d = dtw1()
            .distance_within(a.as_view(), b.as_view(), &window, Some(&pw))
            .unwrap();
        let (dp, _) = dtw1()
            .path_within(a.as_view(), b.as_view(), &window, Some(&pw))
            .unwrap();
        assert!((d.value() - dp.value()).abs() < 1e-12);
    }

    #[test]
    fn identical_series_follow_diagonal() {
        let a = series(&[1.0, 2.0, 3.0]);
        let (dist, path) = dtw1().distance_and_path(a.as_view(), a.as_view()).unwrap();
        assert_eq!(dist.value(), 0.0);
        for step in path.steps() {
            assert_eq!(step.a, step.b);
        }
    }

    #[test]
    fn single_element_series() {
        let a = series(&[5.0]);
        let b = series(&[3.0]);
        let dist = dtw1().distance(a.as_view(), b.as_view()).unwrap();
        assert!((dist.value() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn empty_series_give_zero_and_empty_path() {
        let a = TimeSeries::empty(1).unwrap();
        let b = series(&[1.0, 2.0]);
        let dist = dtw1().distance(a.as_view(), b.as_view()).unwrap();
        assert_eq!(dist, DtwDistance::ZERO);
        let (_, path) = dtw1().distance_and_path(b.as_view(), a.as_view()).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_typed() {
        let a = series(&[1.0]);
        let b = TimeSeries::from_points(&[vec![1.0, 2.0]]).unwrap();
        let err = dtw1().distance(a.as_view(), b.as_view()).unwrap_err();
        assert!(matches!(err, DtwError::DimensionMismatch { left: 1, right: 2 }));
    }

    #[test]
    fn coordinate_weight_count_is_checked() {
        let a = TimeSeries::from_points(&[vec![1.0, 2.0]]).unwrap();
        let err = dtw1().distance(a.as_view(), a.as_view()).unwrap_err();
        assert!(matches!(err, DtwError::WeightCountMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn point_weight_count_is_checked() {
        let a = series(&[1.0, 2.0]);
        let err = dtw1()
            .weighted_distance(a.as_view(), a.as_view(), &[1.0])
            .unwrap_err();
        assert!(matches!(err, DtwError::PointWeightCountMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn negative_point_weight_rejected() {
        let a = series(&[1.0, 2.0]);
        let err = dtw1()
            .weighted_distance(a.as_view(), a.as_view(), &[1.0, -1.0])
            .unwrap_err();
        assert!(matches!(err, DtwError::InvalidWeight { index: 1, .. }));
    }

    #[test]
    fn window_shape_is_checked() {
        let a = series(&[1.0, 2.0]);
        let window = SearchWindow::full(3, 2);
        let err = dtw1()
            .distance_within(a.as_view(), a.as_view(), &window, None)
            .unwrap_err();
        assert!(matches!(err, DtwError::WindowShapeMismatch { rows: 3, n: 2, .. }));
    }

    #[test]
    fn warping_path_continuity() {
        let a = series(&[1.0, 5.0, 2.0, 8.0, 3.0]);
        let b = series(&[2.0, 4.0, 7.0]);
        let (_, path) = dtw1().distance_and_path(a.as_view(), b.as_view()).unwrap();
        for pair in path.steps().windows(2) {
            let da = pair[1].a - pair[0].a;
            let db = pair[1].b - pair[0].b;
            assert!(da <= 1, "step in a dimension too large: {da}");
            assert!(db <= 1, "step in b dimension too large: {db}");
            assert!(da + db >= 1, "path stalled");
        }
    }
}
