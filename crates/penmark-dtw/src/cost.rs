//! Per-coordinate weights and local point-to-point cost.

use serde::{Deserialize, Serialize};

use crate::error::DtwError;

/// Non-negative weight per point coordinate, applied inside the local cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordWeights(Vec<f64>);

impl CoordWeights {
    /// Create a weight vector, validating that it is non-empty and every weight
    /// is finite and non-negative.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`DtwError::ZeroDimension`] | `weights` is empty |
    /// | [`DtwError::InvalidWeight`] | A weight is negative, NaN, or infinite |
    pub fn new(weights: Vec<f64>) -> Result<Self, DtwError> {
        if weights.is_empty() {
            return Err(DtwError::ZeroDimension);
        }
        validate_weights(&weights)?;
        Ok(Self(weights))
    }

    /// All-ones weights for `dim` coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`DtwError::ZeroDimension`] if `dim` is zero.
    pub fn uniform(dim: usize) -> Result<Self, DtwError> {
        Self::new(vec![1.0; dim])
    }

    /// Return the weights as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of coordinates these weights cover.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.0.len()
    }
}

/// Check that every weight is finite and non-negative.
pub(crate) fn validate_weights(weights: &[f64]) -> Result<(), DtwError> {
    if let Some(index) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
        return Err(DtwError::InvalidWeight {
            index,
            value: weights[index],
        });
    }
    Ok(())
}

/// How the difference between two points is turned into a scalar cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostFunction {
    /// `sum_d w_d * (a_d - b_d)^2`
    #[default]
    SquaredDifference,

    /// `sum_d w_d * |a_d - b_d|`
    AbsoluteDifference,
}

impl CostFunction {
    /// Evaluate the weighted local cost between two points of equal dimension.
    ///
    /// Callers guarantee `weights`, `a`, and `b` have the same length.
    #[inline]
    #[must_use]
    pub fn eval(self, weights: &[f64], a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len(), weights.len());
        match self {
            Self::SquaredDifference => weights
                .iter()
                .zip(a.iter().zip(b))
                .map(|(w, (x, y))| w * (x - y).powi(2))
                .sum(),
            Self::AbsoluteDifference => weights
                .iter()
                .zip(a.iter().zip(b))
                .map(|(w, (x, y))| w * (x - y).abs())
                .sum(),
        }
    }
}
