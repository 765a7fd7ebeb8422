//! FastDTW: multi-resolution approximate alignment.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::distance::DtwDistance;
use crate::dtw::Dtw;
use crate::error::DtwError;
use crate::paa::Paa;
use crate::path::WarpingPath;
use crate::series::TimeSeriesView;
use crate::window::SearchWindow;

/// Default search radius around the projected coarse path.
pub const DEFAULT_RADIUS: usize = 1;

/// Approximate DTW by recursive coarsening.
///
/// Each level halves both series with PAA, aligns the coarse pair recursively,
/// then runs windowed DTW at full resolution inside the coarse path projected
/// back up and widened by `radius`. Series no longer than `radius + 2` points
/// are aligned exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct FastDtw {
    dtw: Dtw,
    radius: usize,
}

impl FastDtw {
    /// Create a FastDTW aligner around a configured [`Dtw`].
    #[must_use]
    pub fn new(dtw: Dtw, radius: usize) -> Self {
        Self { dtw, radius }
    }

    /// Return the search radius.
    #[must_use]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Return the underlying exact aligner.
    #[must_use]
    pub fn dtw(&self) -> &Dtw {
        &self.dtw
    }

    /// Approximate DTW distance.
    ///
    /// # Errors
    ///
    /// Same as [`Dtw::distance_within`].
    pub fn distance(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        point_weights: Option<&[f64]>,
    ) -> Result<DtwDistance, DtwError> {
        self.distance_and_path(a, b, point_weights).map(|(d, _)| d)
    }

    /// Approximate DTW distance and warping path.
    ///
    /// Point weights, when given, only apply at full resolution.
    ///
    /// # Errors
    ///
    /// Same as [`Dtw::distance_within`].
    #[instrument(skip(self, a, b, point_weights), fields(n = a.len(), m = b.len(), radius = self.radius))]
    pub fn distance_and_path(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        point_weights: Option<&[f64]>,
    ) -> Result<(DtwDistance, WarpingPath), DtwError> {
        self.recurse(a, b, point_weights, 0)
    }

    fn recurse(
        &self,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        point_weights: Option<&[f64]>,
        depth: usize,
    ) -> Result<(DtwDistance, WarpingPath), DtwError> {
        let min_len = self.radius + 2;
        let (n, m) = (a.len(), b.len());
        if n <= min_len || m <= min_len {
            let window = SearchWindow::full(n, m);
            return self.dtw.path_within(a, b, &window, point_weights);
        }
        if a.dim() != b.dim() {
            return Err(DtwError::DimensionMismatch {
                left: a.dim(),
                right: b.dim(),
            });
        }

        let coarse_a = Paa::new(a, n / 2)?;
        let coarse_b = Paa::new(b, m / 2)?;
        let (_, coarse_path) = self.recurse(
            coarse_a.series().as_view(),
            coarse_b.series().as_view(),
            None,
            depth + 1,
        )?;

        let window = SearchWindow::from_coarse_path(
            &coarse_path,
            coarse_a.block_sizes(),
            coarse_b.block_sizes(),
            self.radius,
        );
        debug!(depth, n, m, cells = window.cell_count(), "expanded search window");
        self.dtw.path_within(a, b, &window, point_weights)
    }
}

/// Which alignment algorithm a caller wants, as a serializable choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    /// Exact, unconstrained DTW.
    #[default]
    Full,

    /// FastDTW with the given search radius.
    Fast {
        /// Cells of slack around the projected coarse path.
        radius: usize,
    },
}

impl Alignment {
    /// Distance between `a` and `b` under this alignment mode.
    ///
    /// # Errors
    ///
    /// Same as [`Dtw::distance_within`].
    pub fn distance(
        self,
        dtw: &Dtw,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        point_weights: Option<&[f64]>,
    ) -> Result<DtwDistance, DtwError> {
        match self {
            Self::Full => {
                dtw.distance_within(a, b, &SearchWindow::full(a.len(), b.len()), point_weights)
            }
            Self::Fast { radius } => {
                FastDtw::new(dtw.clone(), radius).distance(a, b, point_weights)
            }
        }
    }

    /// Distance and warping path between `a` and `b` under this alignment mode.
    ///
    /// # Errors
    ///
    /// Same as [`Dtw::distance_within`].
    pub fn path(
        self,
        dtw: &Dtw,
        a: TimeSeriesView<'_>,
        b: TimeSeriesView<'_>,
        point_weights: Option<&[f64]>,
    ) -> Result<(DtwDistance, WarpingPath), DtwError> {
        match self {
            Self::Full => {
                dtw.path_within(a, b, &SearchWindow::full(a.len(), b.len()), point_weights)
            }
            Self::Fast { radius } => {
                FastDtw::new(dtw.clone(), radius).distance_and_path(a, b, point_weights)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_scalars(values.to_vec()).unwrap()
    }

    fn wave(n: usize, phase: f64) -> TimeSeries {
        series(
            &(0..n)
                .map(|i| (i as f64 * 0.3 + phase).sin())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn short_inputs_fall_back_to_full() {
        let a = series(&[0.0, 2.0, 1.0]);
        let b = series(&[1.0, 0.0, 3.0]);
        let dtw = Dtw::unweighted(1).unwrap();
        let full = dtw.distance(a.as_view(), b.as_view()).unwrap();
        let fast = FastDtw::new(dtw, 1).distance(a.as_view(), b.as_view(), None).unwrap();
        assert_eq!(full, fast);
    }

    #[test]
    fn fast_never_beats_full() {
        let dtw = Dtw::unweighted(1).unwrap();
        let a = wave(64, 0.0);
        let b = wave(50, 0.7);
        let full = dtw.distance(a.as_view(), b.as_view()).unwrap();
        let fast = FastDtw::new(dtw, 1).distance(a.as_view(), b.as_view(), None).unwrap();
        assert!(fast.value() >= full.value() - 1e-9);
    }

    #[test]
    fn identical_series_align_exactly() {
        let dtw = Dtw::unweighted(1).unwrap();
        let a = wave(40, 0.2);
        let (dist, path) = FastDtw::new(dtw, 1)
            .distance_and_path(a.as_view(), a.as_view(), None)
            .unwrap();
        assert_eq!(dist.value(), 0.0);
        assert!(path.steps().iter().all(|s| s.a == s.b));
    }

    #[test]
    fn path_is_valid_for_unequal_lengths() {
        let dtw = Dtw::unweighted(1).unwrap();
        let a = wave(37, 0.0);
        let b = wave(23, 1.1);
        let (_, path) = FastDtw::new(dtw, 2)
            .distance_and_path(a.as_view(), b.as_view(), None)
            .unwrap();
        let steps = path.steps();
        assert_eq!((steps[0].a, steps[0].b), (0, 0));
        let last = steps[steps.len() - 1];
        assert_eq!((last.a, last.b), (36, 22));
        for pair in steps.windows(2) {
            let da = pair[1].a - pair[0].a;
            let db = pair[1].b - pair[0].b;
            assert!(da <= 1 && db <= 1 && da + db >= 1);
        }
    }

    #[test]
    fn point_weights_apply_at_full_resolution() {
        let dtw = Dtw::unweighted(1).unwrap();
        let a = wave(30, 0.0);
        let b = wave(30, 0.5);
        let zeros = vec![0.0; 30];
        let dist = FastDtw::new(dtw, 1)
            .distance(a.as_view(), b.as_view(), Some(&zeros))
            .unwrap();
        assert_eq!(dist.value(), 0.0);
    }

    #[test]
    fn alignment_modes_dispatch() {
        let dtw = Dtw::unweighted(1).unwrap();
        let a = series(&[0.0, 1.0, 2.0]);
        let b = series(&[0.0, 2.0]);
        let full = Alignment::Full.distance(&dtw, a.as_view(), b.as_view(), None).unwrap();
        let fast = Alignment::Fast { radius: 1 }
            .distance(&dtw, a.as_view(), b.as_view(), None)
            .unwrap();
        assert_eq!(full, fast);
        assert_eq!(Alignment::default(), Alignment::Full);
    }
}
