//! Property-based tests for the advisory layer
//!
//! Detectors and the validation engine are pure functions of their input:
//! these properties hold for any finite data, not only the hand-picked
//! cases in the unit tests.

use proptest::prelude::*;

use hydroai::advisory::validation_engine::keys;
use hydroai::{
    AnomalyDetector, ParameterSet, Severity, ValidationEngine, ValidationInput, ValidationStatus,
    ZScoreMode,
};

fn finite_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1e3..1e3f64, 4..60)
}

fn parameter_set() -> impl Strategy<Value = ParameterSet> {
    (
        -1e-2..1e-1f64,
        -1e-2..1e-1f64,
        -0.5..1.5f64,
        -10.0..500.0f64,
        1.0..1e3f64,
        -1e3..1e6f64,
    )
        .prop_map(|(q, t, s, r, t_min, t_max)| {
            ParameterSet::new()
                .with(keys::Q, q)
                .with(keys::T, t)
                .with(keys::S, s)
                .with(keys::R, r)
                .with(keys::T_MIN, t_min)
                .with(keys::T_MAX, t_max)
        })
}

proptest! {
    #[test]
    fn prop_z_score_is_deterministic_and_ordered(values in finite_values(), threshold in 0.5..4.0f64) {
        for mode in [ZScoreMode::Population, ZScoreMode::Robust] {
            let first = AnomalyDetector::z_score_with_mode(&values, threshold, mode).unwrap();
            let second = AnomalyDetector::z_score_with_mode(&values, threshold, mode).unwrap();
            prop_assert_eq!(&first, &second);
            for pair in first.windows(2) {
                prop_assert!(pair[0].index < pair[1].index);
            }
            for a in &first {
                prop_assert!(a.score >= 0.0);
                prop_assert!(a.score > threshold);
                prop_assert_eq!(a.value, values[a.index]);
            }
        }
    }

    #[test]
    fn prop_iqr_flags_only_points_outside_the_data_bulk(values in finite_values(), k in 0.5..3.0f64) {
        let flagged = AnomalyDetector::iqr(&values, k).unwrap();
        prop_assert!(flagged.len() < values.len());
        prop_assert_eq!(&flagged, &AnomalyDetector::iqr(&values, k).unwrap());
        // Widening the fences never flags more points
        let wider = AnomalyDetector::iqr(&values, k + 1.0).unwrap();
        prop_assert!(wider.len() <= flagged.len());
    }

    #[test]
    fn prop_constant_series_has_no_anomalies(value in -1e3..1e3f64, n in 4usize..40) {
        let values = vec![value; n];
        prop_assert!(AnomalyDetector::z_score(&values, 1.0).unwrap().is_empty());
        prop_assert!(AnomalyDetector::iqr(&values, 1.5).unwrap().is_empty());
    }

    #[test]
    fn prop_validation_is_pure(params in parameter_set()) {
        let engine = ValidationEngine::default();
        let input = ValidationInput::new(params);
        let first = engine.validate(&input);
        let second = engine.validate(&input);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_blocked_iff_fatal_and_zero_confidence(params in parameter_set()) {
        let report = ValidationEngine::default().validate(&ValidationInput::new(params));
        let has_fatal = report.count(Severity::Fatal) > 0;
        prop_assert_eq!(report.is_blocked(), has_fatal);
        if report.status == ValidationStatus::Blocked {
            prop_assert_eq!(report.confidence, 0.0);
        }
        prop_assert!((0.0..=1.0).contains(&report.confidence));
        if report.count(Severity::Warning) > 0 && !has_fatal {
            prop_assert_eq!(report.status, ValidationStatus::Warning);
        }
    }
}
