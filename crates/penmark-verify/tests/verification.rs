//! End-to-end enrollment, classification, and calibration scenarios.

use penmark_dtw::TimeSeries;
use penmark_verify::{
    CalibrationConfig, CalibrationFold, Classifier, Decision, FallbackPolicy, Segment, Signature,
    SignerModel, TrainingSet, VerifierConfig, VerifyError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn scalars(values: Vec<f64>) -> TimeSeries {
    TimeSeries::from_scalars(values).expect("valid test series")
}

/// A 1-D signature from (values, pen_down) parts.
fn signature(parts: Vec<(Vec<f64>, bool)>) -> Signature {
    Signature::new(
        parts
            .into_iter()
            .map(|(v, pen)| Segment::new(scalars(v), pen))
            .collect(),
    )
    .expect("valid test signature")
}

/// Two pen-down strokes around a pen-up gap, shaped by `phase` and `gain`.
fn two_strokes(len: usize, phase: f64, gain: f64) -> Signature {
    let stroke = |offset: f64| -> Vec<f64> {
        (0..len)
            .map(|i| gain * (i as f64 * 0.4 + phase + offset).sin())
            .collect()
    };
    signature(vec![
        (stroke(0.0), true),
        (vec![0.0; len / 2], false),
        (stroke(1.3), true),
    ])
}

fn genuine_set() -> Vec<Signature> {
    vec![
        two_strokes(20, 0.00, 1.00),
        two_strokes(22, 0.05, 1.02),
        two_strokes(19, -0.04, 0.97),
        two_strokes(21, 0.02, 1.01),
    ]
}

fn trained(config: VerifierConfig) -> TrainingSet {
    let mut set = TrainingSet::new(config).unwrap();
    for s in genuine_set() {
        set.add_signature(s);
    }
    set.make_templates().unwrap();
    set
}

// ---------------------------------------------------------------------------
// Fallback policies
// ---------------------------------------------------------------------------

/// An unseen stroke count scores against the global prototype.
#[test]
fn unseen_stroke_count_uses_global_prototype() {
    let set = trained(VerifierConfig::uniform(1).unwrap());
    let probe = signature(vec![(
        (0..40).map(|i| (i as f64 * 0.4).sin()).collect(),
        true,
    )]);

    let distance = set.calc_distance_from(&probe).unwrap();
    assert!(distance.is_some_and(f64::is_finite), "got {distance:?}");

    let decision = Classifier::from_training_set(&set)
        .unwrap()
        .classify(&probe, 2.0)
        .unwrap();
    assert_ne!(decision, Decision::Indeterminate);
}

/// With the indeterminate policy an unseen stroke count has no distance.
#[test]
fn unseen_stroke_count_is_indeterminate_without_fallback() {
    let set = trained(
        VerifierConfig::uniform(1)
            .unwrap()
            .with_fallback(FallbackPolicy::Indeterminate),
    );
    let probe = signature(vec![(vec![0.0, 1.0, 0.0], true)]);

    assert_eq!(set.calc_distance_from(&probe).unwrap(), None);
    let decision = Classifier::from_training_set(&set)
        .unwrap()
        .classify(&probe, 100.0)
        .unwrap();
    assert_eq!(decision, Decision::Indeterminate);
}

// ---------------------------------------------------------------------------
// Prototype scenarios
// ---------------------------------------------------------------------------

/// Three identical [down 10, up 10, down 10] signatures fuse to length 10
/// tracks with multiplicity 3 on every pen-down point.
#[test]
fn three_identical_signatures_have_multiplicity_three() {
    let ramp: Vec<f64> = (0..10).map(f64::from).collect();
    let sample = || {
        signature(vec![
            (ramp.clone(), true),
            (vec![5.0; 10], false),
            (ramp.iter().rev().copied().collect(), true),
        ])
    };
    let model = SignerModel::build(
        VerifierConfig::uniform(1).unwrap(),
        &[sample(), sample(), sample()],
    )
    .unwrap();

    let prototype = model.stroke_prototype(3).unwrap();
    assert_eq!(prototype.signature_count(), 3);
    for track in prototype.tracks() {
        assert_eq!(track.len(), 10);
        if track.is_fused() {
            assert!(track.multiplicity().iter().all(|&r| r == 3));
        }
    }
    assert_eq!(prototype.track(0).unwrap().values().values(), ramp.as_slice());
}

/// A single enrollment sample is its own prototype with unit weights.
#[test]
fn single_sample_prototype_is_identity() {
    let sample = two_strokes(15, 0.3, 1.0);
    let model = SignerModel::build(VerifierConfig::uniform(1).unwrap(), &[sample.clone()]).unwrap();
    let prototype = model.stroke_prototype(3).unwrap();

    for (track, segment) in prototype.tracks().iter().zip(sample.segments()) {
        assert_eq!(track.values(), segment.series());
        assert!(track.weights().iter().all(|&w| w == 1.0));
    }
    assert_eq!(model.global().track(0).unwrap().values(), sample.whole());
    assert_eq!(model.average_distance(), 0.0);
}

// ---------------------------------------------------------------------------
// Classification properties
// ---------------------------------------------------------------------------

/// Scoring an enrollment sample twice gives the same distance.
#[test]
fn self_comparison_is_deterministic() {
    let set = trained(VerifierConfig::uniform(1).unwrap());
    let sample = &set.signatures()[1];
    let first = set.calc_distance_from(sample).unwrap();
    let second = set.calc_distance_from(sample).unwrap();
    assert_eq!(first, second);

    let rebuilt = trained(VerifierConfig::uniform(1).unwrap());
    assert_eq!(rebuilt.model().unwrap(), set.model().unwrap());
}

/// Raising k never turns an accept into a reject.
#[test]
fn larger_k_never_rejects_an_accepted_probe() {
    let set = trained(VerifierConfig::uniform(1).unwrap());
    let classifier = Classifier::from_training_set(&set).unwrap();
    let probes = [
        two_strokes(20, 0.01, 1.0),
        two_strokes(20, 0.5, 1.3),
        two_strokes(25, 1.5, 0.6),
    ];

    for probe in &probes {
        let mut accepted = false;
        for step in 0..=30 {
            let k = -1.0 + f64::from(step) * 0.2;
            let decision = classifier.classify(probe, k).unwrap();
            if accepted {
                assert_eq!(decision, Decision::Accept, "k = {k}");
            }
            accepted |= decision == Decision::Accept;
        }
    }
}

/// Forgeries of a different shape score further than genuine probes.
#[test]
fn forgeries_score_further_than_genuine() {
    let set = trained(VerifierConfig::uniform(1).unwrap());
    let genuine = set.calc_distance_from(&two_strokes(20, 0.01, 1.0)).unwrap().unwrap();
    let forgery = set.calc_distance_from(&two_strokes(20, 2.0, 1.8)).unwrap().unwrap();
    assert!(forgery > genuine, "forgery {forgery} <= genuine {genuine}");
}

/// Building templates from nothing fails fast.
#[test]
fn empty_enrollment_is_rejected() {
    let mut set = TrainingSet::new(VerifierConfig::uniform(1).unwrap()).unwrap();
    assert!(matches!(set.make_templates(), Err(VerifyError::EmptyEnrollment)));
    assert!(matches!(
        SignerModel::build(VerifierConfig::uniform(1).unwrap(), &[]),
        Err(VerifyError::EmptyEnrollment)
    ));
}

/// A probe with the wrong point dimension is a typed failure.
#[test]
fn dimension_mismatch_is_typed() {
    let set = trained(VerifierConfig::uniform(1).unwrap());
    let wide = Signature::new(vec![
        Segment::new(TimeSeries::new(2, vec![0.0; 8]).unwrap(), true),
        Segment::new(TimeSeries::new(2, vec![0.0; 4]).unwrap(), false),
        Segment::new(TimeSeries::new(2, vec![0.0; 8]).unwrap(), true),
    ])
    .unwrap();
    assert!(matches!(set.calc_distance_from(&wide), Err(VerifyError::Dtw(_))));
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// The sweep finds an equal-error point among the swept tolerances.
#[test]
fn calibration_sweep_finds_equal_error_point() {
    let all = genuine_set();
    let forgeries = vec![two_strokes(20, 2.0, 1.8), two_strokes(18, 1.2, 0.4)];

    let folds: Vec<CalibrationFold> = (0..2)
        .map(|held| {
            let enrollment: Vec<Signature> = all
                .iter()
                .enumerate()
                .filter(|&(i, _)| i % 2 != held)
                .map(|(_, s)| s.clone())
                .collect();
            let probes: Vec<Signature> = all
                .iter()
                .enumerate()
                .filter(|&(i, _)| i % 2 == held)
                .map(|(_, s)| s.clone())
                .collect();
            let model =
                SignerModel::build(VerifierConfig::uniform(1).unwrap(), &enrollment).unwrap();
            CalibrationFold::new(model, probes, forgeries.clone())
        })
        .collect();

    let config = CalibrationConfig::default();
    let result = config.sweep(&folds).unwrap();
    assert_eq!(result.points.len(), 21);
    assert_eq!(result.n_folds, 2);
    assert!(result.points.iter().any(|p| p.k == result.eer.k));

    let gap = (result.eer.frr - result.eer.far).abs();
    assert!(result.points.iter().all(|p| (p.frr - p.far).abs() >= gap));

    // Pooled counts see every probe once per k.
    for point in &result.points {
        assert_eq!(point.counts.genuine_trials, 4);
        assert_eq!(point.counts.forgery_trials, 4);
    }

    // Sweeping twice is reproducible.
    assert_eq!(config.sweep(&folds).unwrap(), result);
}
