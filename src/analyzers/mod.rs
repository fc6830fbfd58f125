//! Test-analysis engine
//!
//! One analyzer per field test. Each takes a validated `NumericSeries` and
//! the test's physical constants, and returns an immutable `FitResult`.
//!
//! ## Analyzers
//!
//! - `TheisAnalyzer`: transient pumping test, full well-function fit (T, S)
//! - `CooperJacobAnalyzer`: late-time semi-log straight line (T, S)
//! - `LefrancAnalyzer`: borehole falling/rising head (K)
//! - `LugeonAnalyzer`: staged packer injection (Lugeon, K)
//! - `PorchetAnalyzer`: inverse auger hole infiltration (K)
//! - `PiezometricAnalyzer`: groundwater level trend and regime
//! - `RecoveryAnalyzer`: exponential recovery after pumping stops
//! - `drawdown_derivative`: Bourdet log-derivative diagnostic
//!
//! Analyzers hold only configuration, so one instance can serve many
//! concurrent calls.

pub mod cooper_jacob;
pub mod derivative;
pub mod lefranc;
pub mod lugeon;
pub mod piezometric;
pub mod porchet;
pub mod recovery;
pub mod theis;

pub use cooper_jacob::{CooperJacobAnalyzer, CooperJacobLine};
pub use derivative::drawdown_derivative;
pub use lefranc::{shape_factor, LefrancAnalyzer};
pub use lugeon::{lugeon_to_ms, ms_to_lugeon, HoulsbyBehavior, LugeonAnalyzer};
pub use piezometric::{PiezometricAnalyzer, TrendClass, TrendEvidence};
pub use porchet::{porchet_head, PorchetAnalyzer};
pub use recovery::RecoveryAnalyzer;
pub use theis::{theis_drawdown, TheisAnalyzer};

use crate::advisory::AnomalyDetector;
use crate::config::PrecheckConfig;
use crate::error::{AnalysisError, Result};
use crate::types::{FitResult, NumericSeries, TestKind};

/// Common entry point of every analyzer.
pub trait TestAnalyzer {
    /// Physical constants of one test (pumping rate, geometry, ...).
    type Test;

    fn kind(&self) -> TestKind;

    fn analyze(&self, series: &NumericSeries, test: &Self::Test) -> Result<FitResult>;
}

// ============================================================================
// Shared input checks
// ============================================================================

pub(crate) fn require_points(series: &NumericSeries, min: usize, kind: TestKind) -> Result<()> {
    if series.len() < min {
        return Err(AnalysisError::InputValidation(format!(
            "{kind} analysis needs at least {min} points, got {}",
            series.len()
        )));
    }
    Ok(())
}

pub(crate) fn require_positive_x(series: &NumericSeries, what: &str) -> Result<()> {
    if let Some(i) = series.x().iter().position(|t| *t <= 0.0) {
        return Err(AnalysisError::InputValidation(format!(
            "{what} must be > 0, got {} at index {i}",
            series.x()[i]
        )));
    }
    Ok(())
}

pub(crate) fn require_non_negative_x(series: &NumericSeries, what: &str) -> Result<()> {
    if let Some(i) = series.x().iter().position(|t| *t < 0.0) {
        return Err(AnalysisError::InputValidation(format!(
            "{what} must be >= 0, got {} at index {i}",
            series.x()[i]
        )));
    }
    Ok(())
}

pub(crate) fn require_non_negative_y(series: &NumericSeries, what: &str) -> Result<()> {
    if let Some(i) = series.y().iter().position(|v| *v < 0.0) {
        return Err(AnalysisError::InputValidation(format!(
            "{what} must be >= 0, got {} at index {i}",
            series.y()[i]
        )));
    }
    Ok(())
}

// ============================================================================
// Anomaly pre-check
// ============================================================================

/// Screen the point-to-point increments of `series` for spikes.
///
/// Field curves are smooth and monotone, so a single bad reading shows up as
/// an outlying jump even when its level looks plausible. Returns warnings
/// naming the affected samples; empty when disabled.
pub(crate) fn precheck_warnings(series: &NumericSeries, config: &PrecheckConfig) -> Vec<String> {
    if !config.enabled || series.len() < 4 {
        return Vec::new();
    }
    let increments: Vec<f64> = series.y().windows(2).map(|w| w[1] - w[0]).collect();
    let Ok(anomalies) =
        AnomalyDetector::z_score_with_mode(&increments, config.z_threshold, config.z_mode)
    else {
        return Vec::new();
    };
    anomalies
        .iter()
        .map(|a| {
            let i = a.index + 1;
            format!(
                "possible outlier near sample {i} (x = {}, y = {}): jump of {:.4} has z-score {:.1}",
                series.x()[i],
                series.y()[i],
                a.value,
                a.score
            )
        })
        .collect()
}
