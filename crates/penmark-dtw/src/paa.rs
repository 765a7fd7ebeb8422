//! Piecewise aggregate approximation: coarsening by block means.

use crate::error::DtwError;
use crate::series::{TimeSeries, TimeSeriesView};

/// A coarsened series together with how many original points each coarse
/// point averages.
#[derive(Debug, Clone, PartialEq)]
pub struct Paa {
    series: TimeSeries,
    block_sizes: Vec<usize>,
}

impl Paa {
    /// Reduce `series` to `target` points.
    ///
    /// Block `k` ends at original index `round(block * (k + 1)) - 1` where
    /// `block = len / target`, so blocks are contiguous, non-empty, and cover
    /// every original point exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::InvalidPaaLength`] if `target` is zero or greater
    /// than the series length.
    pub fn new(series: TimeSeriesView<'_>, target: usize) -> Result<Self, DtwError> {
        let len = series.len();
        if target == 0 || target > len {
            return Err(DtwError::InvalidPaaLength { len, target });
        }

        let dim = series.dim();
        let block = len as f64 / target as f64;
        let mut values = Vec::with_capacity(target * dim);
        let mut block_sizes = Vec::with_capacity(target);
        let mut from = 0usize;

        while from < len {
            let k = block_sizes.len();
            let to = (((block * (k + 1) as f64).round() as usize).saturating_sub(1))
                .clamp(from, len - 1);
            let count = to - from + 1;

            let mut mean = vec![0.0; dim];
            for i in from..=to {
                for (acc, v) in mean.iter_mut().zip(series.point(i)) {
                    *acc += v;
                }
            }
            values.extend(mean.into_iter().map(|s| s / count as f64));
            block_sizes.push(count);
            from = to + 1;
        }

        Ok(Self {
            series: TimeSeries::new(dim, values)?,
            block_sizes,
        })
    }

    /// The coarsened series.
    #[must_use]
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Number of original points behind each coarse point.
    #[must_use]
    pub fn block_sizes(&self) -> &[usize] {
        &self.block_sizes
    }
}
