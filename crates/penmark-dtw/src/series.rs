//! Multi-dimensional time series types with validation guarantees.

use serde::{Deserialize, Serialize};

use crate::error::DtwError;

/// Owned, validated time series of fixed-dimension points.
///
/// Points are stored row-major in one flat buffer: point `i` occupies
/// `values[i * dim..(i + 1) * dim]`. All values are finite. A series may be
/// empty (zero points) but always has a known, non-zero dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    dim: usize,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a series from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::ZeroDimension`] | `dim` is zero |
    /// | [`DtwError::ValueCountMismatch`] | `values.len()` is not a multiple of `dim` |
    /// | [`DtwError::NonFiniteValue`] | Any value is NaN or infinite |
    pub fn new(dim: usize, values: Vec<f64>) -> Result<Self, DtwError> {
        if dim == 0 {
            return Err(DtwError::ZeroDimension);
        }
        if values.len() % dim != 0 {
            return Err(DtwError::ValueCountMismatch {
                len: values.len(),
                dim,
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(DtwError::NonFiniteValue { index });
        }
        Ok(Self { dim, values })
    }

    /// Create a one-dimensional series from scalar samples.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::NonFiniteValue`] if any value is NaN or infinite.
    pub fn from_scalars(values: Vec<f64>) -> Result<Self, DtwError> {
        Self::new(1, values)
    }

    /// Create a series from a list of points, inferring the dimension from the first.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::EmptyPointList`] | `points` is empty |
    /// | [`DtwError::ZeroDimension`] | The first point has no coordinates |
    /// | [`DtwError::RaggedPoint`] | A point differs in dimension from the first |
    /// | [`DtwError::NonFiniteValue`] | Any value is NaN or infinite |
    pub fn from_points(points: &[Vec<f64>]) -> Result<Self, DtwError> {
        let dim = points.first().ok_or(DtwError::EmptyPointList)?.len();
        let mut values = Vec::with_capacity(points.len() * dim);
        for (index, p) in points.iter().enumerate() {
            if p.len() != dim {
                return Err(DtwError::RaggedPoint {
                    index,
                    expected: dim,
                    got: p.len(),
                });
            }
            values.extend_from_slice(p);
        }
        Self::new(dim, values)
    }

    /// An empty series of the given dimension.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::ZeroDimension`] if `dim` is zero.
    pub fn empty(dim: usize) -> Result<Self, DtwError> {
        Self::new(dim, Vec::new())
    }

    /// Concatenate several series of equal dimension, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::DimensionMismatch`] if the parts disagree on dimension.
    pub fn concat<'a, I>(dim: usize, parts: I) -> Result<Self, DtwError>
    where
        I: IntoIterator<Item = &'a TimeSeries>,
    {
        let mut values = Vec::new();
        for part in parts {
            if part.dim != dim {
                return Err(DtwError::DimensionMismatch {
                    left: dim,
                    right: part.dim,
                });
            }
            values.extend_from_slice(&part.values);
        }
        Self::new(dim, values)
    }

    /// Borrow this series as a zero-copy view.
    #[must_use]
    pub fn as_view(&self) -> TimeSeriesView<'_> {
        TimeSeriesView {
            dim: self.dim,
            values: &self.values,
        }
    }

    /// Return the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    /// Return true if the series has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the number of coordinates per point.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the coordinates of point `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn point(&self, index: usize) -> &[f64] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Mutable access to the coordinates of point `index`.
    ///
    /// Callers must only write finite values; the series does not re-validate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn point_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Iterate over points in order.
    pub fn points(&self) -> std::slice::ChunksExact<'_, f64> {
        self.values.chunks_exact(self.dim)
    }

    /// Return the flat row-major value buffer.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Resample to `new_len` points by linear interpolation.
    ///
    /// New index `i` maps to old position `i * (len - 1) / (new_len - 1)` and is
    /// interpolated between the floor and ceil neighbours. The first and last
    /// points are reproduced exactly, and resampling to the current length
    /// returns the same values. An empty series resamples to an empty series.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::InvalidResampleLength`] if `new_len` is zero.
    #[must_use = "returns a new resampled series; the original is unchanged"]
    pub fn resample(&self, new_len: usize) -> Result<Self, DtwError> {
        if new_len == 0 {
            return Err(DtwError::InvalidResampleLength);
        }
        let old_len = self.len();
        if old_len == 0 {
            return Ok(self.clone());
        }
        if new_len == 1 {
            return Ok(Self {
                dim: self.dim,
                values: self.point(0).to_vec(),
            });
        }

        let mut values = Vec::with_capacity(new_len * self.dim);
        for i in 0..new_len {
            // Integer product keeps grid positions exact.
            let pos = (i * (old_len - 1)) as f64 / (new_len - 1) as f64;
            let lo = (pos.floor() as usize).min(old_len - 1);
            let lambda = pos - lo as f64;
            let hi = if lambda > 0.0 { (lo + 1).min(old_len - 1) } else { lo };

            let x0 = self.point(lo);
            let x1 = self.point(hi);
            if hi == lo {
                values.extend_from_slice(x0);
            } else {
                values.extend(x0.iter().zip(x1).map(|(a, b)| a * (1.0 - lambda) + b * lambda));
            }
        }

        Ok(Self {
            dim: self.dim,
            values,
        })
    }
}

/// Borrowed view into a time series. Zero-copy reference.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesView<'a> {
    dim: usize,
    values: &'a [f64],
}

impl<'a> TimeSeriesView<'a> {
    /// Return the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.dim
    }

    /// Return true if the view has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Return the number of coordinates per point.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the coordinates of point `index`.
    #[inline]
    #[must_use]
    pub fn point(&self, index: usize) -> &'a [f64] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }
}
