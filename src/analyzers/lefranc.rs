//! Lefranc borehole test (falling or rising head)
//!
//! After a slug of water is added to or removed from a cased borehole, the
//! head relaxes exponentially towards the aquifer head:
//!
//! ```text
//! h(t) = h∞ + (h0 - h∞) · exp(-t / τ)
//! ```
//!
//! The basic time lag τ gives the conductivity through Hvorslev's relation
//! `K = π r_c² / (F τ)`, where r_c is the casing radius and F the shape
//! factor of the open cavity.
//!
//! When the aquifer head is known and the excess head keeps one sign, the
//! fit is a straight line of ln|h - h∞| against t. Otherwise h0, h∞ and τ
//! are fitted together.

use std::f64::consts::PI;
use tracing::{debug, info, warn};

use super::{precheck_warnings, require_non_negative_x, require_points, TestAnalyzer};
use crate::config::{AnalysisConfig, LefrancConfig, PrecheckConfig};
use crate::error::{AnalysisError, Result};
use crate::numerics::{linear_fit, stats, CurveFitter, ParamSpec};
use crate::types::{
    CavityGeometry, FitResult, FitResultBuilder, LefrancMethod, LefrancTest, NumericSeries,
    TestKind,
};

/// Hvorslev shape factor F [m] of the open test section.
pub fn shape_factor(test: &LefrancTest) -> f64 {
    let r = test.radius();
    match test.geometry() {
        CavityGeometry::Cylinder => {
            let m = test.length() / (2.0 * r);
            2.0 * PI * test.length() / (m + (1.0 + m * m).sqrt()).ln()
        }
        CavityGeometry::FlatBottom => 5.5 * r,
    }
}

/// Head relaxation curve h(t).
fn relaxation(t: f64, h0: f64, h_inf: f64, tau: f64) -> f64 {
    h_inf + (h0 - h_inf) * (-t / tau).exp()
}

/// Fitted relaxation, method-independent.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Relaxation {
    h0: f64,
    h_inf: f64,
    tau: f64,
    iterations: usize,
    at_bound: bool,
    method: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct LefrancAnalyzer {
    config: LefrancConfig,
    fitter: CurveFitter,
    precheck: PrecheckConfig,
}

impl LefrancAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.lefranc.clone(),
            fitter: CurveFitter::from_config(&config.fitting),
            precheck: config.precheck.clone(),
        }
    }

    #[must_use]
    pub fn with_fitter(mut self, fitter: CurveFitter) -> Self {
        self.fitter = fitter;
        self
    }

    /// Excess head over `h_inf` if it keeps one sign and shrinks in magnitude.
    fn decaying_excess(heads: &[f64], h_inf: f64) -> Option<Vec<f64>> {
        let excess: Vec<f64> = heads.iter().map(|h| h - h_inf).collect();
        let first = *excess.first()?;
        let last = *excess.last()?;
        let one_sign = excess.iter().all(|e| *e > 0.0) || excess.iter().all(|e| *e < 0.0);
        (one_sign && last.abs() < first.abs()).then_some(excess)
    }

    fn fit_log_linear(&self, times: &[f64], excess: &[f64], h_inf: f64) -> Result<Relaxation> {
        let log_excess: Vec<f64> = excess.iter().map(|e| e.abs().ln()).collect();
        let line = linear_fit(times, &log_excess)?;
        if !(line.slope < 0.0) {
            return Err(AnalysisError::DegenerateData(
                "excess head does not decay with time".to_string(),
            ));
        }
        let sign = excess[0].signum();
        let tau = (-1.0 / line.slope).clamp(self.config.tau_min_s, self.config.tau_max_s);
        Ok(Relaxation {
            h0: h_inf + sign * line.intercept.exp(),
            h_inf,
            tau,
            iterations: 0,
            at_bound: tau <= self.config.tau_min_s || tau >= self.config.tau_max_s,
            method: "log_linear",
        })
    }

    fn fit_nonlinear(
        &self,
        times: &[f64],
        heads: &[f64],
        aquifer_head: Option<f64>,
    ) -> Result<Relaxation> {
        let (lo, hi) = stats::min_max(heads);
        let span = hi - lo;
        let head_lo = lo - 10.0 * span - 1.0;
        let head_hi = hi + 10.0 * span + 1.0;

        let h0_seed = heads[0];
        let h_inf_seed = aquifer_head.unwrap_or(heads[heads.len() - 1]);
        let tau_seed = seed_tau(times, heads, h_inf_seed)
            .clamp(self.config.tau_min_s, self.config.tau_max_s);
        debug!(h0_seed, h_inf_seed, tau_seed, "Lefranc nonlinear seed");

        let tau_spec = ParamSpec::log("tau", tau_seed, self.config.tau_min_s, self.config.tau_max_s);
        let h0_spec = ParamSpec::linear("h0", h0_seed, head_lo, head_hi);

        let (h0, h_inf, tau, fit) = if let Some(h_inf) = aquifer_head {
            let fit = self.fitter.nonlinear_fit(
                |t, p| relaxation(t, p[0], h_inf, p[1]),
                &[h0_spec, tau_spec],
                times,
                heads,
            )?;
            (fit.params[0], h_inf, fit.params[1], fit)
        } else {
            let h_inf_spec = ParamSpec::linear("h_inf", h_inf_seed, head_lo, head_hi);
            let fit = self.fitter.nonlinear_fit(
                |t, p| relaxation(t, p[0], p[1], p[2]),
                &[h0_spec, h_inf_spec, tau_spec],
                times,
                heads,
            )?;
            (fit.params[0], fit.params[1], fit.params[2], fit)
        };

        Ok(Relaxation {
            h0,
            h_inf,
            tau,
            iterations: fit.iterations,
            at_bound: fit.bounded_parameters().contains(&"tau"),
            method: "nonlinear",
        })
    }
}

/// Time for the excess head to fall to 1/e of its first value, or a third
/// of the record when it never does.
fn seed_tau(times: &[f64], heads: &[f64], h_inf: f64) -> f64 {
    let first = (heads[0] - h_inf).abs();
    let target = first / std::f64::consts::E;
    times
        .iter()
        .zip(heads)
        .find(|(_, h)| (*h - h_inf).abs() <= target)
        .map(|(t, _)| t - times[0])
        .filter(|tau| *tau > 0.0)
        .unwrap_or_else(|| (times[times.len() - 1] - times[0]) / 3.0)
}

impl TestAnalyzer for LefrancAnalyzer {
    type Test = LefrancTest;

    fn kind(&self) -> TestKind {
        TestKind::Lefranc
    }

    fn analyze(&self, series: &NumericSeries, test: &LefrancTest) -> Result<FitResult> {
        require_points(series, 3, TestKind::Lefranc)?;
        require_non_negative_x(series, "time")?;
        let sorted = series.sorted_by_x();
        let (times, heads) = (sorted.x(), sorted.y());

        let change = sorted.y_span();
        if change < self.config.noise_floor_m {
            return Err(AnalysisError::DegenerateData(format!(
                "head change {change:.2e} m is below the noise floor {:.2e} m",
                self.config.noise_floor_m
            )));
        }

        let relax = match (test.method(), test.aquifer_head()) {
            (LefrancMethod::LogLinear, None) => {
                return Err(AnalysisError::InputValidation(
                    "log-linear Lefranc analysis needs the aquifer head".to_string(),
                ));
            }
            (LefrancMethod::LogLinear, Some(h_inf)) => {
                let excess = Self::decaying_excess(heads, h_inf).ok_or_else(|| {
                    AnalysisError::DegenerateData(format!(
                        "excess head over {h_inf} m changes sign or does not decay"
                    ))
                })?;
                self.fit_log_linear(times, &excess, h_inf)?
            }
            (LefrancMethod::Auto, Some(h_inf)) => match Self::decaying_excess(heads, h_inf) {
                Some(excess) => self.fit_log_linear(times, &excess, h_inf)?,
                None => self.fit_nonlinear(times, heads, Some(h_inf))?,
            },
            (_, aquifer_head) => self.fit_nonlinear(times, heads, aquifer_head)?,
        };

        let f = shape_factor(test);
        let rc = test.casing_radius();
        let conductivity = PI * rc * rc / (f * relax.tau);

        let fitted: Vec<f64> = times
            .iter()
            .map(|t| relaxation(*t, relax.h0, relax.h_inf, relax.tau))
            .collect();
        let goodness = stats::r_squared(heads, &fitted);
        let rmse = (heads
            .iter()
            .zip(&fitted)
            .map(|(h, f)| (h - f).powi(2))
            .sum::<f64>()
            / fitted.len() as f64)
            .sqrt();

        let mut builder = FitResultBuilder::new(TestKind::Lefranc)
            .parameter("K", conductivity)
            .parameter("tau", relax.tau)
            .goodness_of_fit(goodness)
            .diagnostic("h0", relax.h0)
            .diagnostic("h_inf", relax.h_inf)
            .diagnostic("shape_factor", f)
            .diagnostic("method", relax.method)
            .diagnostic("rmse", rmse)
            .diagnostic("iterations", relax.iterations);

        if goodness < self.config.poor_fit_threshold {
            let msg = format!(
                "poor fit: goodness {goodness:.3} below {}; head recovery is not a single exponential",
                self.config.poor_fit_threshold
            );
            warn!(goodness, "{}", msg);
            builder = builder.warning(msg);
        }
        if relax.at_bound {
            let msg = format!(
                "time lag tau = {:.3e} s finished at its search bound; K is only an order of magnitude",
                relax.tau
            );
            warn!(tau = relax.tau, "{}", msg);
            builder = builder.warning(msg);
        }
        builder = builder.warnings(precheck_warnings(&sorted, &self.precheck));

        let curve = NumericSeries::model_curve(
            times,
            |t| relaxation(t, relax.h0, relax.h_inf, relax.tau),
            "lefranc relaxation",
        )?;
        let result = builder.build(curve);

        info!(
            conductivity,
            tau = relax.tau,
            method = relax.method,
            goodness,
            "Lefranc analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn falling_head(h0: f64, h_inf: f64, tau: f64) -> NumericSeries {
        let t: Vec<f64> = (0..=30).map(|i| f64::from(i) * 60.0).collect();
        let h = t.iter().map(|t| relaxation(*t, h0, h_inf, tau)).collect();
        NumericSeries::new(t, h).unwrap()
    }

    fn borehole() -> LefrancTest {
        LefrancTest::new(0.05, 2.0, CavityGeometry::Cylinder).unwrap()
    }

    #[test]
    fn test_shape_factors() {
        let f = shape_factor(&borehole());
        // L/2r = 20: F = 4π / ln(20 + √401)
        assert!((f - 4.0 * PI / (20.0 + 401f64.sqrt()).ln()).abs() < 1e-12);
        let flat = LefrancTest::new(0.05, 2.0, CavityGeometry::FlatBottom).unwrap();
        assert!((shape_factor(&flat) - 0.275).abs() < 1e-12);
    }

    #[test]
    fn test_nonlinear_recovers_tau() {
        let fit = LefrancAnalyzer::default()
            .analyze(&falling_head(2.0, 0.0, 300.0), &borehole())
            .unwrap();
        let tau = fit.parameter("tau").unwrap();
        assert!((tau / 300.0 - 1.0).abs() < 0.01, "tau = {tau}");
        let expected_k = PI * 0.05 * 0.05 / (shape_factor(&borehole()) * 300.0);
        assert!((fit.parameter("K").unwrap() / expected_k - 1.0).abs() < 0.01);
        assert_eq!(
            fit.diagnostic("method").and_then(|d| d.as_label()),
            Some("nonlinear")
        );
        assert!(fit.goodness_of_fit() > 0.999);
    }

    #[test]
    fn test_known_aquifer_head_uses_log_linear() {
        let test = borehole().with_aquifer_head(1.0).unwrap();
        let fit = LefrancAnalyzer::default()
            .analyze(&falling_head(3.0, 1.0, 450.0), &test)
            .unwrap();
        assert_eq!(
            fit.diagnostic("method").and_then(|d| d.as_label()),
            Some("log_linear")
        );
        assert!((fit.parameter("tau").unwrap() / 450.0 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rising_head() {
        let test = borehole().with_aquifer_head(0.0).unwrap();
        let fit = LefrancAnalyzer::default()
            .analyze(&falling_head(-1.5, 0.0, 200.0), &test)
            .unwrap();
        assert!((fit.parameter("tau").unwrap() / 200.0 - 1.0).abs() < 1e-6);
        let h0 = fit.diagnostic("h0").and_then(|d| d.as_f64()).unwrap();
        assert!((h0 + 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_log_linear_requires_aquifer_head() {
        let test = borehole().with_method(LefrancMethod::LogLinear);
        let err = LefrancAnalyzer::default()
            .analyze(&falling_head(2.0, 0.0, 300.0), &test)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InputValidation(_)));
    }

    #[test]
    fn test_flat_head_is_degenerate() {
        let series = NumericSeries::new(vec![0.0, 60.0, 120.0], vec![1.0, 1.0, 1.0]).unwrap();
        let err = LefrancAnalyzer::default()
            .analyze(&series, &borehole())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateData(_)));
    }
}
