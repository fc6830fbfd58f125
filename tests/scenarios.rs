//! End-to-end scenarios
//!
//! Field-sized inputs pushed through the public API, the way the CLI and
//! batch runner use it.

use hydroai::analyzers::theis_drawdown;
use hydroai::{
    AnalysisConfig, AnalysisError, AnomalyDetector, CooperJacobAnalyzer, NumericSeries,
    ParameterRecommender, PiezometricAnalyzer, Provenance, PumpingTest, TestAnalyzer, TestKind,
    TheisAnalyzer, ZScoreMode,
};

fn log_times(from: f64, to: f64, n: usize) -> Vec<f64> {
    let (a, b) = (from.log10(), to.log10());
    (0..n)
        .map(|i| 10f64.powf(a + (b - a) * i as f64 / (n - 1) as f64))
        .collect()
}

// ============================================================================
// Pumping tests
// ============================================================================

#[test]
fn theis_field_record_gives_plausible_aquifer() {
    let config = AnalysisConfig::default();
    let test = PumpingTest::new(0.001, 50.0).unwrap();
    let series = NumericSeries::new(
        vec![10.0, 50.0, 100.0, 500.0, 1000.0],
        vec![0.020, 0.045, 0.062, 0.115, 0.145],
    )
    .unwrap();

    let fit = TheisAnalyzer::new(&config).analyze(&series, &test).unwrap();

    // Least squares on these five points settles near T = 2.5e-3, S = 3e-5.
    let t = fit.parameter("T").unwrap();
    let s = fit.parameter("S").unwrap();
    assert!((1e-3..=5e-3).contains(&t), "T = {t}");
    assert!((1e-5..=1e-4).contains(&s), "S = {s}");
    assert!(fit.goodness_of_fit() > 0.95, "R² = {}", fit.goodness_of_fit());
    assert_eq!(fit.unit("T"), Some("m2/s"));
    assert_eq!(fit.theoretical_curve().len(), series.len());
}

#[test]
fn theis_all_zero_drawdown_is_degenerate() {
    let config = AnalysisConfig::default();
    let test = PumpingTest::new(0.001, 50.0).unwrap();
    let series = NumericSeries::new(vec![10.0, 50.0, 100.0, 500.0], vec![0.0; 4]).unwrap();

    let err = TheisAnalyzer::new(&config)
        .analyze(&series, &test)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::DegenerateData(_)), "{err:?}");
}

#[test]
fn cooper_jacob_agrees_with_theis_at_late_time() {
    let config = AnalysisConfig::default();
    let test = PumpingTest::new(2e-3, 10.0).unwrap();
    let (t_true, s_true) = (1e-3, 1e-4);
    let times = log_times(1e3, 1e5, 20);
    let drawdowns = times
        .iter()
        .map(|t| theis_drawdown(t_true, s_true, &test, *t))
        .collect();
    let series = NumericSeries::new(times, drawdowns).unwrap();

    let theis = TheisAnalyzer::new(&config).analyze(&series, &test).unwrap();
    let jacob = CooperJacobAnalyzer::new(&config)
        .analyze(&series, &test)
        .unwrap();

    for name in ["T", "S"] {
        let a = theis.parameter(name).unwrap();
        let b = jacob.parameter(name).unwrap();
        assert!(
            ((a - b) / a).abs() < 0.10,
            "{name}: theis {a:e} vs cooper-jacob {b:e}"
        );
    }
    assert_eq!(jacob.kind(), TestKind::CooperJacob);
}

// ============================================================================
// Piezometric trend
// ============================================================================

#[test]
fn thirty_daily_levels_declining() {
    let config = AnalysisConfig::default();
    let days: Vec<f64> = (0..30).map(f64::from).collect();
    let levels = days.iter().map(|d| 10.50 - 0.70 * d / 29.0).collect();
    let series = NumericSeries::new(days, levels)
        .unwrap()
        .with_provenance(Provenance::new("piezometer P3").with_units("day", "m"));

    let fit = PiezometricAnalyzer::new(&config)
        .analyze(&series, &())
        .unwrap();

    let slope = fit.parameter("trend_slope").unwrap();
    assert!((slope + 0.023).abs() < 0.002, "slope = {slope}");
    assert_eq!(
        fit.diagnostic("classification").and_then(|d| d.as_label()),
        Some("declining")
    );
    assert_eq!(fit.unit("trend_slope"), Some("m/day"));
}

// ============================================================================
// Advisory
// ============================================================================

#[test]
fn single_spike_in_short_series() {
    let values = [1.0, 1.1, 0.9, 1.0, 10.2];

    // With n = 5 the population z-score cannot exceed sqrt(n - 1) = 2, so
    // threshold 3 flags nothing. The median/MAD score is not masked.
    let population = AnomalyDetector::z_score(&values, 3.0).unwrap();
    assert!(population.is_empty(), "{population:?}");

    let robust = AnomalyDetector::z_score_with_mode(&values, 3.0, ZScoreMode::Robust).unwrap();
    assert_eq!(robust.len(), 1, "{robust:?}");
    assert_eq!(robust[0].index, 4);
    assert_eq!(robust[0].value, 10.2);
    assert!(robust[0].score > 5.0, "score = {}", robust[0].score);
    assert!(robust[0].explanation.contains("median"));
}

#[test]
fn sand_profile_and_unknown_lithology() {
    let sand = ParameterRecommender::recommend_from_lithology("sables").unwrap();
    assert_eq!(sand.name, "sand");
    let target = hydroai::types::ValueRange::new(1e-5, 1e-3);
    assert!(sand.conductivity_range.overlaps(&target), "{:?}", sand.conductivity_range);
    assert!(!sand.explanation.contains('{'), "{}", sand.explanation);

    let err = ParameterRecommender::recommend_from_lithology("basalte_fictif").unwrap_err();
    match err {
        AnalysisError::UnknownLithology { name, available } => {
            assert_eq!(name, "basalte_fictif");
            assert!(available.iter().any(|n| n == "sand"));
        }
        other => panic!("expected UnknownLithology, got {other:?}"),
    }
}
