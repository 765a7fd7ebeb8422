//! Error-rate accounting and equal-error-rate calibration of the tolerance `k`.

use std::fmt;
use std::ops::{Add, AddAssign};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::classifier::{Decision, decide};
use crate::error::VerifyError;
use crate::signature::Signature;
use crate::training::SignerModel;

/// Trial and error counts for one or more evaluations.
///
/// Indeterminate genuine probes are tallied separately and left out of the
/// false-reject denominator. Indeterminate forgeries count as correct rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCounts {
    /// Genuine probes that received Accept or Reject.
    pub genuine_trials: usize,
    /// Genuine probes that were rejected.
    pub false_rejects: usize,
    /// Genuine probes with no matching prototype.
    pub indeterminate_genuine: usize,
    /// Forgery probes evaluated.
    pub forgery_trials: usize,
    /// Forgery probes that were accepted.
    pub false_accepts: usize,
}

impl ErrorCounts {
    /// Tally the decision for a genuine probe.
    pub fn record_genuine(&mut self, decision: Decision) {
        match decision {
            Decision::Accept => self.genuine_trials += 1,
            Decision::Reject => {
                self.genuine_trials += 1;
                self.false_rejects += 1;
            }
            Decision::Indeterminate => self.indeterminate_genuine += 1,
        }
    }

    /// Tally the decision for a forgery probe.
    pub fn record_forgery(&mut self, decision: Decision) {
        self.forgery_trials += 1;
        if decision == Decision::Accept {
            self.false_accepts += 1;
        }
    }

    /// False-reject rate, or `None` with no genuine trials.
    #[must_use]
    pub fn frr(&self) -> Option<f64> {
        (self.genuine_trials > 0).then(|| self.false_rejects as f64 / self.genuine_trials as f64)
    }

    /// False-accept rate, or `None` with no forgery trials.
    #[must_use]
    pub fn far(&self) -> Option<f64> {
        (self.forgery_trials > 0).then(|| self.false_accepts as f64 / self.forgery_trials as f64)
    }
}

impl Add for ErrorCounts {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for ErrorCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.genuine_trials += rhs.genuine_trials;
        self.false_rejects += rhs.false_rejects;
        self.indeterminate_genuine += rhs.indeterminate_genuine;
        self.forgery_trials += rhs.forgery_trials;
        self.false_accepts += rhs.false_accepts;
    }
}

impl fmt::Display for ErrorCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FR {}/{} ({} indeterminate), FA {}/{}",
            self.false_rejects,
            self.genuine_trials,
            self.indeterminate_genuine,
            self.false_accepts,
            self.forgery_trials
        )
    }
}

/// One trained model with its held-out genuine and forgery probes.
#[derive(Debug, Clone)]
pub struct CalibrationFold {
    model: SignerModel,
    genuine: Vec<Signature>,
    forgeries: Vec<Signature>,
}

impl CalibrationFold {
    /// Bundle a model with the probes it is evaluated on.
    #[must_use]
    pub fn new(model: SignerModel, genuine: Vec<Signature>, forgeries: Vec<Signature>) -> Self {
        Self {
            model,
            genuine,
            forgeries,
        }
    }

    /// The trained model.
    #[must_use]
    pub fn model(&self) -> &SignerModel {
        &self.model
    }

    /// Held-out genuine probes.
    #[must_use]
    pub fn genuine(&self) -> &[Signature] {
        &self.genuine
    }

    /// Forgery probes.
    #[must_use]
    pub fn forgeries(&self) -> &[Signature] {
        &self.forgeries
    }

    fn score(&self) -> Result<ScoredFold, VerifyError> {
        let distances = |probes: &[Signature]| {
            probes
                .iter()
                .map(|p| self.model.calc_distance_from(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(ScoredFold {
            model: &self.model,
            genuine: distances(&self.genuine)?,
            forgeries: distances(&self.forgeries)?,
        })
    }
}

struct ScoredFold<'a> {
    model: &'a SignerModel,
    genuine: Vec<Option<f64>>,
    forgeries: Vec<Option<f64>>,
}

impl ScoredFold<'_> {
    fn counts(&self, k: f64) -> Result<ErrorCounts, VerifyError> {
        let threshold = self.model.threshold(k)?;
        let mut counts = ErrorCounts::default();
        for &d in &self.genuine {
            counts.record_genuine(decide(d, threshold));
        }
        for &d in &self.forgeries {
            counts.record_forgery(decide(d, threshold));
        }
        Ok(counts)
    }
}

/// Error rates at one tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// The tolerance.
    pub k: f64,
    /// Mean per-fold false-reject rate.
    pub frr: f64,
    /// Mean per-fold false-accept rate.
    pub far: f64,
    /// Counts pooled over every fold.
    pub counts: ErrorCounts,
}

/// Every swept operating point and the one closest to equal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Operating points in sweep order.
    pub points: Vec<OperatingPoint>,
    /// The point minimising `|frr - far|`; ties go to the earliest in the sweep.
    pub eer: OperatingPoint,
    /// Number of folds evaluated.
    pub n_folds: usize,
}

/// A sweep of `k` from `start` toward `end` in steps of `step`.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `start`   | 2.0     |
/// | `end`     | 0.0     |
/// | `step`    | 0.1     |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    start: f64,
    end: f64,
    step: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            start: 2.0,
            end: 0.0,
            step: 0.1,
        }
    }
}

impl CalibrationConfig {
    /// Create a sweep. The direction follows `start` and `end`; `step` is a magnitude.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidSweep`] if any bound is non-finite or
    /// `step` is not positive.
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self, VerifyError> {
        if !start.is_finite() || !end.is_finite() || !step.is_finite() || step <= 0.0 {
            return Err(VerifyError::InvalidSweep { start, end, step });
        }
        Ok(Self { start, end, step })
    }

    /// First tolerance.
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Last tolerance.
    #[must_use]
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Distance between tolerances.
    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Every tolerance in sweep order, both bounds included.
    #[must_use]
    pub fn ks(&self) -> Vec<f64> {
        let span = self.end - self.start;
        // Absorb accumulated decimal error so 2.0 -> 0.0 by 0.1 yields 21 points.
        let steps = (span.abs() / self.step + 1e-9).floor() as usize;
        let sign = span.signum();
        (0..=steps)
            .map(|i| self.start + sign * self.step * i as f64)
            .collect()
    }

    /// Evaluate every tolerance over `folds`.
    ///
    /// Probe distances are computed once per fold, in parallel across folds,
    /// then thresholded for each `k`. Rates are averaged over the folds that
    /// have trials of that kind; with none the rate is 0.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::NoCalibrationFolds`] | `folds` is empty |
    /// | [`VerifyError::Dtw`] | A probe does not match its model's dimension |
    #[instrument(skip_all, fields(n_folds = folds.len(), start = self.start, end = self.end, step = self.step))]
    pub fn sweep(&self, folds: &[CalibrationFold]) -> Result<CalibrationResult, VerifyError> {
        if folds.is_empty() {
            return Err(VerifyError::NoCalibrationFolds);
        }

        let scored = folds
            .par_iter()
            .map(CalibrationFold::score)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(folds = scored.len(), "probe distances computed");

        let mut points = Vec::new();
        for k in self.ks() {
            let per_fold = scored
                .iter()
                .map(|fold| fold.counts(k))
                .collect::<Result<Vec<_>, _>>()?;
            let counts = per_fold.iter().copied().fold(ErrorCounts::default(), Add::add);
            points.push(OperatingPoint {
                k,
                frr: mean(per_fold.iter().filter_map(ErrorCounts::frr)),
                far: mean(per_fold.iter().filter_map(ErrorCounts::far)),
                counts,
            });
        }

        let mut eer = points[0];
        for point in &points[1..] {
            if (point.frr - point.far).abs() < (eer.frr - eer.far).abs() {
                eer = *point;
            }
        }

        info!(k = eer.k, frr = eer.frr, far = eer.far, "equal error point found");
        Ok(CalibrationResult {
            points,
            eer,
            n_folds: folds.len(),
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genuine_indeterminate_leaves_denominator() {
        let mut c = ErrorCounts::default();
        c.record_genuine(Decision::Accept);
        c.record_genuine(Decision::Reject);
        c.record_genuine(Decision::Indeterminate);
        assert_eq!(c.genuine_trials, 2);
        assert_eq!(c.indeterminate_genuine, 1);
        assert_eq!(c.frr(), Some(0.5));
    }

    #[test]
    fn forgery_indeterminate_is_a_correct_reject() {
        let mut c = ErrorCounts::default();
        c.record_forgery(Decision::Indeterminate);
        c.record_forgery(Decision::Accept);
        assert_eq!(c.forgery_trials, 2);
        assert_eq!(c.far(), Some(0.5));
    }

    #[test]
    fn rates_need_trials() {
        let c = ErrorCounts::default();
        assert_eq!(c.frr(), None);
        assert_eq!(c.far(), None);
    }

    #[test]
    fn counts_add() {
        let mut a = ErrorCounts::default();
        a.record_genuine(Decision::Reject);
        let mut b = ErrorCounts::default();
        b.record_forgery(Decision::Accept);
        let sum = a + b;
        assert_eq!(sum.false_rejects, 1);
        assert_eq!(sum.false_accepts, 1);
        a += b;
        assert_eq!(a, sum);
        assert_eq!(sum.to_string(), "FR 1/1 (0 indeterminate), FA 1/1");
    }

    #[test]
    fn default_sweep_descends_by_tenths() {
        let ks = CalibrationConfig::default().ks();
        assert_eq!(ks.len(), 21);
        assert_eq!(ks[0], 2.0);
        assert!(ks[20].abs() < 1e-12);
        assert!(ks.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn ascending_and_single_point_sweeps() {
        let up = CalibrationConfig::new(0.0, 1.0, 0.25).unwrap().ks();
        assert_eq!(up, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        let one = CalibrationConfig::new(1.5, 1.5, 0.1).unwrap().ks();
        assert_eq!(one, vec![1.5]);
    }

    #[test]
    fn invalid_sweeps_are_rejected() {
        assert!(CalibrationConfig::new(2.0, 0.0, 0.0).is_err());
        assert!(CalibrationConfig::new(2.0, 0.0, -0.1).is_err());
        assert!(CalibrationConfig::new(f64::NAN, 0.0, 0.1).is_err());
    }

    #[test]
    fn empty_folds_are_rejected() {
        assert!(matches!(
            CalibrationConfig::default().sweep(&[]),
            Err(VerifyError::NoCalibrationFolds)
        ));
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(mean(std::iter::empty()), 0.0);
        assert_eq!(mean([1.0, 2.0].into_iter()), 1.5);
    }
}
