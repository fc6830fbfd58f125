//! Cooper-Jacob straight-line analysis
//!
//! For small u the Theis solution reduces to
//! `s = (2.3 Q / 4πT) · log10(2.25 T t / r² S)`, a straight line in
//! semi-log space. T comes from the slope per log cycle, S from the time
//! intercept t0 where the line crosses s = 0.
//!
//! Only the late part of the record is fitted: early points usually violate
//! u < 0.05 and bend the line.

use std::f64::consts::{LN_10, PI};
use tracing::{info, warn};

use super::{
    precheck_warnings, require_non_negative_y, require_points, require_positive_x, TestAnalyzer,
};
use crate::config::{AnalysisConfig, CooperJacobConfig, PrecheckConfig};
use crate::error::{AnalysisError, Result};
use crate::numerics::{loglinear_fit, LinearFit};
use crate::types::{FitResult, FitResultBuilder, NumericSeries, PumpingTest, TestKind};

/// Straight line fitted to the late-time drawdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooperJacobLine {
    pub transmissivity: f64,
    pub storativity: f64,
    /// Time at which the fitted line crosses zero drawdown [s].
    pub t0: f64,
    pub line: LinearFit,
    /// Index (in time order) of the first fitted point.
    pub first_fitted: usize,
}

impl CooperJacobLine {
    /// u = r²S / (4Tt) for this estimate.
    pub fn u(&self, distance: f64, t: f64) -> f64 {
        distance * distance * self.storativity / (4.0 * self.transmissivity * t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CooperJacobAnalyzer {
    config: CooperJacobConfig,
    precheck: PrecheckConfig,
}

impl CooperJacobAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.cooper_jacob.clone(),
            precheck: config.precheck.clone(),
        }
    }

    /// Number of trailing points used for the straight line.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fitted_count(&self, n: usize) -> usize {
        if n < self.config.min_points_for_split {
            return n;
        }
        let late = (self.config.late_time_fraction * n as f64).ceil() as usize;
        late.clamp(3, n)
    }

    /// Fit the late-time line of a time-sorted series.
    pub fn estimate(&self, sorted: &NumericSeries, test: &PumpingTest) -> Result<CooperJacobLine> {
        let n = sorted.len();
        let first_fitted = n - self.fitted_count(n);
        let late = &sorted.y()[first_fitted..];
        let line = loglinear_fit(&sorted.x()[first_fitted..], late)?;
        let scale = late.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if !(line.slope > 1e-12 * scale) {
            return Err(AnalysisError::DegenerateData(format!(
                "late-time drawdown does not increase with log time (slope {:.4e} m per log cycle)",
                line.slope
            )));
        }

        let transmissivity = test.pumping_rate() * LN_10 / (4.0 * PI * line.slope);
        let t0 = 10f64.powf(-line.intercept / line.slope);
        let r = test.distance();
        let storativity = 2.25 * transmissivity * t0 / (r * r);

        Ok(CooperJacobLine {
            transmissivity,
            storativity,
            t0,
            line,
            first_fitted,
        })
    }
}

impl TestAnalyzer for CooperJacobAnalyzer {
    type Test = PumpingTest;

    fn kind(&self) -> TestKind {
        TestKind::CooperJacob
    }

    #[allow(clippy::cast_precision_loss)]
    fn analyze(&self, series: &NumericSeries, test: &PumpingTest) -> Result<FitResult> {
        require_points(series, 3, TestKind::CooperJacob)?;
        require_positive_x(series, "time")?;
        require_non_negative_y(series, "drawdown")?;
        let sorted = series.sorted_by_x();

        let est = self.estimate(&sorted, test)?;
        let r = test.distance();
        let times = sorted.x();
        let fitted = &times[est.first_fitted..];

        // u is largest at the earliest fitted time
        let u_max_fitted = fitted
            .iter()
            .map(|t| est.u(r, *t))
            .fold(0.0_f64, f64::max);
        let valid = times
            .iter()
            .filter(|t| est.u(r, **t) < self.config.validity_u_max)
            .count();
        let validity_fraction = valid as f64 / times.len() as f64;

        let mut builder = FitResultBuilder::new(TestKind::CooperJacob)
            .parameter("T", est.transmissivity)
            .parameter("S", est.storativity)
            .goodness_of_fit(est.line.r_squared)
            .diagnostic("slope", est.line.slope)
            .diagnostic("intercept", est.line.intercept)
            .diagnostic("t0", est.t0)
            .diagnostic("p_value", est.line.p_value)
            .diagnostic("fitted_points", fitted.len())
            .diagnostic("u_max_fitted", u_max_fitted)
            .diagnostic("validity_fraction", validity_fraction);

        if u_max_fitted >= self.config.validity_u_max {
            let msg = format!(
                "u reaches {u_max_fitted:.3} on the fitted points (validity requires u < {}); \
                 the straight-line approximation may be biased",
                self.config.validity_u_max
            );
            warn!(u_max_fitted, "{}", msg);
            builder = builder.warning(msg);
        }
        builder = builder.warnings(precheck_warnings(&sorted, &self.precheck));

        let curve =
            NumericSeries::model_curve(times, |t| est.line.predict(t.log10()), "cooper-jacob line")?;
        let result = builder.build(curve);

        info!(
            transmissivity = est.transmissivity,
            storativity = est.storativity,
            r_squared = est.line.r_squared,
            fitted_points = fitted.len(),
            warnings = result.warnings().len(),
            "Cooper-Jacob analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::well_function;

    fn theis_series(t_value: f64, s_value: f64, q: f64, r: f64, times: &[f64]) -> NumericSeries {
        let s: Vec<f64> = times
            .iter()
            .map(|t| {
                let u = r * r * s_value / (4.0 * t_value * t);
                q / (4.0 * PI * t_value) * well_function(u).unwrap()
            })
            .collect();
        NumericSeries::new(times.to_vec(), s).unwrap()
    }

    fn log_times(from: f64, to: f64, n: usize) -> Vec<f64> {
        let (a, b) = (from.log10(), to.log10());
        (0..n)
            .map(|i| 10f64.powf(a + (b - a) * i as f64 / (n - 1) as f64))
            .collect()
    }

    #[test]
    fn test_matches_theis_at_late_time() {
        let times = log_times(100.0, 1e5, 20);
        let series = theis_series(1e-3, 1e-4, 5e-3, 10.0, &times);
        let test = PumpingTest::new(5e-3, 10.0).unwrap();
        let fit = CooperJacobAnalyzer::default().analyze(&series, &test).unwrap();
        let t = fit.parameter("T").unwrap();
        let s = fit.parameter("S").unwrap();
        assert!((t / 1e-3 - 1.0).abs() < 0.10, "T = {t}");
        assert!((s / 1e-4 - 1.0).abs() < 0.10, "S = {s}");
        assert!(fit.goodness_of_fit() > 0.99);
        assert!(!fit.has_warnings(), "{:?}", fit.warnings());
        assert_eq!(fit.diagnostic("fitted_points").and_then(|d| d.as_f64()), Some(10.0));
    }

    #[test]
    fn test_early_time_violation_warns() {
        // u(t = 1 s) = 100·1e-3 / (4e-3) = 25: the whole record is early time
        let times = log_times(1.0, 50.0, 8);
        let series = theis_series(1e-3, 1e-3, 1e-3, 10.0, &times);
        let test = PumpingTest::new(1e-3, 10.0).unwrap();
        let fit = CooperJacobAnalyzer::default().analyze(&series, &test).unwrap();
        assert!(fit.warnings().iter().any(|w| w.contains("validity")), "{:?}", fit.warnings());
        let frac = fit.diagnostic("validity_fraction").and_then(|d| d.as_f64()).unwrap();
        assert!(frac < 1.0);
    }

    #[test]
    fn test_flat_drawdown_is_degenerate() {
        let series =
            NumericSeries::new(vec![10.0, 100.0, 1000.0, 5000.0], vec![0.5, 0.5, 0.5, 0.5]).unwrap();
        let test = PumpingTest::new(1e-3, 10.0).unwrap();
        let err = CooperJacobAnalyzer::default().analyze(&series, &test).unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateData(_)), "{err:?}");
    }

    #[test]
    fn test_small_record_uses_all_points() {
        let analyzer = CooperJacobAnalyzer::default();
        assert_eq!(analyzer.fitted_count(4), 4);
        assert_eq!(analyzer.fitted_count(6), 3);
        assert_eq!(analyzer.fitted_count(11), 6);
    }

    #[test]
    fn test_rejects_non_positive_time() {
        let series = NumericSeries::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.1, 0.2]).unwrap();
        let test = PumpingTest::new(1e-3, 10.0).unwrap();
        assert!(matches!(
            CooperJacobAnalyzer::default().analyze(&series, &test),
            Err(AnalysisError::InputValidation(_))
        ));
    }
}
