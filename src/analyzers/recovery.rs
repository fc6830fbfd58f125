//! Recovery after pumping stops
//!
//! The water level rise since shutdown is fitted with a first-order
//! approach to the final level:
//!
//! ```text
//! h(t) = h_final · (1 - exp(-α t))
//! ```

use tracing::{debug, info, warn};

use super::{precheck_warnings, require_non_negative_x, require_points, TestAnalyzer};
use crate::config::{AnalysisConfig, PrecheckConfig, RecoveryConfig};
use crate::error::{AnalysisError, Result};
use crate::numerics::{stats, CurveFitter, ParamSpec};
use crate::types::{FitResult, FitResultBuilder, NumericSeries, TestKind};

fn recovery_curve(t: f64, h_final: f64, alpha: f64) -> f64 {
    h_final * (1.0 - (-alpha * t).exp())
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryAnalyzer {
    config: RecoveryConfig,
    fitter: CurveFitter,
    precheck: PrecheckConfig,
}

impl RecoveryAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.recovery.clone(),
            fitter: CurveFitter::from_config(&config.fitting),
            precheck: config.precheck.clone(),
        }
    }

    #[must_use]
    pub fn with_fitter(mut self, fitter: CurveFitter) -> Self {
        self.fitter = fitter;
        self
    }

    /// α from the time the rise first reaches 63% of its final value.
    fn seed_alpha(&self, times: &[f64], rises: &[f64], h_final: f64) -> f64 {
        let target = (1.0 - (-1.0f64).exp()) * h_final;
        let crossing = times
            .iter()
            .zip(rises)
            .find(|(_, h)| h.abs() >= target.abs())
            .map(|(t, _)| *t)
            .filter(|t| *t > 0.0);
        let span = times[times.len() - 1] - times[0];
        let alpha = crossing.map_or(3.0 / span, |t| 1.0 / t);
        alpha.clamp(self.config.alpha_min, self.config.alpha_max)
    }
}

impl TestAnalyzer for RecoveryAnalyzer {
    type Test = ();

    fn kind(&self) -> TestKind {
        TestKind::Recovery
    }

    fn analyze(&self, series: &NumericSeries, _test: &()) -> Result<FitResult> {
        require_points(series, 3, TestKind::Recovery)?;
        require_non_negative_x(series, "time since shutdown")?;
        let c = &self.config;
        let sorted = series.sorted_by_x();
        let (times, rises) = (sorted.x(), sorted.y());

        let change = sorted.y_span();
        if change < c.noise_floor_m {
            return Err(AnalysisError::DegenerateData(format!(
                "level change {change:.2e} m is below the noise floor {:.2e} m",
                c.noise_floor_m
            )));
        }

        let (lo, hi) = stats::min_max(rises);
        let h_seed = rises[rises.len() - 1];
        let alpha_seed = self.seed_alpha(times, rises, h_seed);
        debug!(h_seed, alpha_seed, "Recovery seed");

        let specs = [
            ParamSpec::linear("h_final", h_seed, lo - 10.0 * change - 1.0, hi + 10.0 * change + 1.0),
            ParamSpec::log("alpha", alpha_seed, c.alpha_min, c.alpha_max),
        ];
        let fit = self.fitter.nonlinear_fit(
            |t, p| recovery_curve(t, p[0], p[1]),
            &specs,
            times,
            rises,
        )?;
        let (h_final, alpha) = (fit.params[0], fit.params[1]);

        let fitted: Vec<f64> = times.iter().map(|t| recovery_curve(*t, h_final, alpha)).collect();
        let goodness = stats::r_squared(rises, &fitted);
        let recovered = if h_final.abs() > 0.0 {
            rises[rises.len() - 1] / h_final
        } else {
            f64::NAN
        };

        let mut builder = FitResultBuilder::new(TestKind::Recovery)
            .parameter("h_final", h_final)
            .parameter("alpha", alpha)
            .goodness_of_fit(goodness)
            .diagnostic("tau_recovery", 1.0 / alpha)
            .diagnostic("recovered_fraction", recovered)
            .diagnostic("rmse", fit.rmse())
            .diagnostic("iterations", fit.iterations);

        for name in fit.bounded_parameters() {
            let msg = format!("parameter {name} finished at its search bound");
            warn!(parameter = name, "{}", msg);
            builder = builder.warning(msg);
        }
        if recovered.is_finite() && recovered < 0.9 {
            let msg = format!(
                "record ends at {:.0}% of the fitted final level; h_final is an extrapolation",
                recovered * 100.0
            );
            warn!(recovered, "{}", msg);
            builder = builder.warning(msg);
        }
        builder = builder.warnings(precheck_warnings(&sorted, &self.precheck));

        let curve = NumericSeries::model_curve(
            times,
            |t| recovery_curve(t, h_final, alpha),
            "recovery model",
        )?;
        let result = builder.build(curve);

        info!(h_final, alpha, goodness, "Recovery analysis complete");
        Ok(result)
    }
}
