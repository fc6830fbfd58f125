//! Theis transient pumping-test analysis
//!
//! Drawdown at distance r from a well pumping at constant rate Q in a
//! confined, infinite, homogeneous aquifer:
//!
//! ```text
//! s(t) = Q / (4πT) · W(u),   u = r²S / (4Tt)
//! ```
//!
//! T and S are fitted together in log10 space (they span decades). The
//! Cooper-Jacob line provides the starting point whenever it yields a
//! physically sensible pair. When the test carries a known storativity
//! only T is fitted and S is reported as given, with zero standard error.
//!
//! Goodness of fit is `1 − (SSR/n) / var(s)` with the population variance
//! of the observed drawdowns: the fraction of drawdown variance explained,
//! on the same scale as the r² reported by the linear analyzers.

use std::f64::consts::PI;
use tracing::{debug, info, warn};

use super::cooper_jacob::CooperJacobAnalyzer;
use super::{
    precheck_warnings, require_non_negative_y, require_points, require_positive_x, TestAnalyzer,
};
use crate::config::{AnalysisConfig, PrecheckConfig, TheisConfig};
use crate::error::{AnalysisError, Result};
use crate::numerics::{stats, well_function, CurveFitter, ParamSpec};
use crate::types::{FitResult, FitResultBuilder, NumericSeries, PumpingTest, TestKind};

/// Theis drawdown [m] at time `t` for the given aquifer and test.
///
/// Returns NaN outside the well function's domain so optimizers can treat
/// the point as rejected rather than aborting.
pub fn theis_drawdown(transmissivity: f64, storativity: f64, test: &PumpingTest, t: f64) -> f64 {
    let r = test.distance();
    let u = r * r * storativity / (4.0 * transmissivity * t);
    well_function(u).map_or(f64::NAN, |w| {
        test.pumping_rate() / (4.0 * PI * transmissivity) * w
    })
}

#[derive(Debug, Clone, Default)]
pub struct TheisAnalyzer {
    config: TheisConfig,
    seed: CooperJacobAnalyzer,
    fitter: CurveFitter,
    precheck: PrecheckConfig,
}

impl TheisAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.theis.clone(),
            seed: CooperJacobAnalyzer::new(config),
            fitter: CurveFitter::from_config(&config.fitting),
            precheck: config.precheck.clone(),
        }
    }

    /// Replace the curve fitter (e.g. to inject a different optimizer).
    #[must_use]
    pub fn with_fitter(mut self, fitter: CurveFitter) -> Self {
        self.fitter = fitter;
        self
    }

    fn in_bounds(&self, t: f64, s: f64) -> bool {
        let c = &self.config;
        t.is_finite()
            && s.is_finite()
            && (c.transmissivity_min..=c.transmissivity_max).contains(&t)
            && (c.storativity_min..=c.storativity_max).contains(&s)
    }

    /// Starting (T, S) and the label of where it came from.
    fn initial_guess(
        &self,
        sorted: &NumericSeries,
        test: &PumpingTest,
    ) -> (f64, f64, &'static str) {
        match self.seed.estimate(sorted, test) {
            Ok(line) if self.in_bounds(line.transmissivity, line.storativity) => {
                debug!(
                    transmissivity = line.transmissivity,
                    storativity = line.storativity,
                    "Theis seeded from Cooper-Jacob"
                );
                (line.transmissivity, line.storativity, "cooper_jacob")
            }
            other => {
                debug!(
                    seed = ?other.map(|l| (l.transmissivity, l.storativity)),
                    "Cooper-Jacob seed unusable, using defaults"
                );
                (
                    self.config.default_transmissivity,
                    self.config.default_storativity,
                    "default",
                )
            }
        }
    }
}

/// Goodness of fit: `1 − (SSR/n) / population_variance(observed)`.
///
/// Zero when the observations have no spread. Can go negative for a model
/// worse than the mean.
#[allow(clippy::cast_precision_loss)]
fn explained_variance(sum_squared_residuals: f64, observed: &[f64]) -> f64 {
    let variance = stats::population_variance(observed);
    if variance > 0.0 {
        1.0 - (sum_squared_residuals / observed.len() as f64) / variance
    } else {
        0.0
    }
}

impl TestAnalyzer for TheisAnalyzer {
    type Test = PumpingTest;

    fn kind(&self) -> TestKind {
        TestKind::Theis
    }

    fn analyze(&self, series: &NumericSeries, test: &PumpingTest) -> Result<FitResult> {
        require_points(series, 3, TestKind::Theis)?;
        require_positive_x(series, "time")?;
        require_non_negative_y(series, "drawdown")?;
        let sorted = series.sorted_by_x();
        let (times, drawdowns) = (sorted.x(), sorted.y());

        let (_, s_max) = stats::min_max(drawdowns);
        if s_max < self.config.noise_floor_m {
            return Err(AnalysisError::DegenerateData(format!(
                "maximum drawdown {s_max:.2e} m is below the noise floor {:.2e} m",
                self.config.noise_floor_m
            )));
        }

        let (t0, s0, seed) = self.initial_guess(&sorted, test);
        let c = &self.config;
        let t_spec = ParamSpec::log("T", t0, c.transmissivity_min, c.transmissivity_max);
        let (fit, storativity) = match test.known_storativity() {
            Some(s_known) => {
                debug!(storativity = s_known, "Theis with known storativity, fitting T only");
                let fit = self.fitter.nonlinear_fit(
                    |t, p| theis_drawdown(p[0], s_known, test, t),
                    &[t_spec],
                    times,
                    drawdowns,
                )?;
                (fit, s_known)
            }
            None => {
                let specs = [
                    t_spec,
                    ParamSpec::log("S", s0, c.storativity_min, c.storativity_max),
                ];
                let fit = self.fitter.nonlinear_fit(
                    |t, p| theis_drawdown(p[0], p[1], test, t),
                    &specs,
                    times,
                    drawdowns,
                )?;
                let s = fit.params[1];
                (fit, s)
            }
        };
        let transmissivity = fit.params[0];
        let degrees_of_freedom = times.len().saturating_sub(fit.params.len());

        let goodness = explained_variance(fit.sum_squared_residuals, drawdowns);

        let r = test.distance();
        let u_at = |t: f64| r * r * storativity / (4.0 * transmissivity * t);
        let (t_first, t_last) = stats::min_max(times);

        let mut builder = FitResultBuilder::new(TestKind::Theis)
            .parameter("T", transmissivity)
            .parameter("S", storativity)
            .goodness_of_fit(goodness)
            .diagnostic("rmse", fit.rmse())
            .diagnostic("residual_norm", fit.residual_norm())
            .diagnostic("iterations", fit.iterations)
            .diagnostic("u_min", u_at(t_last))
            .diagnostic("u_max", u_at(t_first))
            .diagnostic("seed", seed)
            .diagnostic("degrees_of_freedom", degrees_of_freedom)
            .diagnostic(
                "storativity_source",
                if test.known_storativity().is_some() { "known" } else { "fitted" },
            );
        if let Some(se) = fit.std_error("T") {
            builder = builder.diagnostic("T_std_error", se);
        }
        if test.known_storativity().is_some() {
            builder = builder.diagnostic("S_std_error", 0.0);
        } else if let Some(se) = fit.std_error("S") {
            builder = builder.diagnostic("S_std_error", se);
        }

        if goodness < c.poor_fit_threshold {
            let msg = format!(
                "poor fit: goodness {goodness:.3} below {}; the aquifer may not behave as Theis assumes",
                c.poor_fit_threshold
            );
            warn!(goodness, "{}", msg);
            builder = builder.warning(msg);
        }
        for name in fit.bounded_parameters() {
            let msg = format!("parameter {name} finished at its search bound");
            warn!(parameter = name, "{}", msg);
            builder = builder.warning(msg);
        }
        builder = builder.warnings(precheck_warnings(&sorted, &self.precheck));

        let curve = NumericSeries::model_curve(
            times,
            |t| theis_drawdown(transmissivity, storativity, test, t),
            "theis model",
        )?;
        let result = builder.build(curve);

        info!(
            transmissivity,
            storativity,
            goodness,
            iterations = fit.iterations,
            seed,
            warnings = result.warnings().len(),
            "Theis analysis complete"
        );
        Ok(result)
    }
}
