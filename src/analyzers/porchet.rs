//! Porchet (inverse auger hole) infiltration test
//!
//! An uncased hole of radius r is filled and the falling water height h
//! (above the hole bottom) is recorded. In uniform soil the infiltrating
//! area is the wetted wall plus, optionally, the bottom:
//!
//! ```text
//! dh/dt = -(2K/r)(h + r/2)   =>  h(t) = (h0 + r/2)·exp(-2Kt/r) - r/2
//! dh/dt = -(2K/r) h          =>  h(t) = h0·exp(-2Kt/r)            (walls only)
//! ```

use tracing::{debug, info, warn};

use super::{
    precheck_warnings, require_non_negative_x, require_non_negative_y, require_points,
    TestAnalyzer,
};
use crate::config::{AnalysisConfig, PorchetConfig, PrecheckConfig};
use crate::error::{AnalysisError, Result};
use crate::numerics::{stats, CurveFitter, ParamSpec};
use crate::types::{FitResult, FitResultBuilder, NumericSeries, PorchetTest, TestKind};

/// Water height at time `t` for conductivity `k` and initial height `h0`.
pub fn porchet_head(k: f64, h0: f64, t: f64, test: &PorchetTest) -> f64 {
    let r = test.radius();
    let decay = (-2.0 * k * t / r).exp();
    if test.bottom_infiltration() {
        (h0 + r / 2.0) * decay - r / 2.0
    } else {
        h0 * decay
    }
}

/// Classical two-point estimate of K between two readings.
pub fn two_point_conductivity(
    (t1, h1): (f64, f64),
    (t2, h2): (f64, f64),
    test: &PorchetTest,
) -> f64 {
    let r = test.radius();
    let offset = if test.bottom_infiltration() { r / 2.0 } else { 0.0 };
    r / (2.0 * (t2 - t1)) * ((h1 + offset) / (h2 + offset)).ln()
}

#[derive(Debug, Clone, Default)]
pub struct PorchetAnalyzer {
    config: PorchetConfig,
    fitter: CurveFitter,
    precheck: PrecheckConfig,
}

impl PorchetAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.porchet.clone(),
            fitter: CurveFitter::from_config(&config.fitting),
            precheck: config.precheck.clone(),
        }
    }

    #[must_use]
    pub fn with_fitter(mut self, fitter: CurveFitter) -> Self {
        self.fitter = fitter;
        self
    }
}

impl TestAnalyzer for PorchetAnalyzer {
    type Test = PorchetTest;

    fn kind(&self) -> TestKind {
        TestKind::Porchet
    }

    fn analyze(&self, series: &NumericSeries, test: &PorchetTest) -> Result<FitResult> {
        require_points(series, 3, TestKind::Porchet)?;
        require_non_negative_x(series, "time")?;
        require_non_negative_y(series, "water height")?;
        let c = &self.config;
        let sorted = series.sorted_by_x();
        let (times, heads) = (sorted.x(), sorted.y());

        let change = sorted.y_span();
        if change < c.noise_floor_m {
            return Err(AnalysisError::DegenerateData(format!(
                "head change {change:.2e} m is below the noise floor {:.2e} m",
                c.noise_floor_m
            )));
        }
        let n = times.len();
        let (first, last) = ((times[0], heads[0]), (times[n - 1], heads[n - 1]));
        if last.1 >= first.1 || last.0 <= first.0 {
            return Err(AnalysisError::DegenerateData(
                "water level does not fall: no infiltration to analyse".to_string(),
            ));
        }

        let k_two_point = two_point_conductivity(first, last, test);
        let k_seed = if k_two_point.is_finite() {
            k_two_point.clamp(c.conductivity_min, c.conductivity_max)
        } else {
            (c.conductivity_min * c.conductivity_max).sqrt()
        };
        debug!(k_two_point, k_seed, "Porchet seed");

        let k_spec = ParamSpec::log("K", k_seed, c.conductivity_min, c.conductivity_max);
        let (_, h_max) = stats::min_max(heads);
        let (conductivity, h0, fit) = match test.initial_head() {
            Some(h0) => {
                let fit = self.fitter.nonlinear_fit(
                    |t, p| porchet_head(p[0], h0, t, test),
                    &[k_spec],
                    times,
                    heads,
                )?;
                (fit.params[0], h0, fit)
            }
            None => {
                let h0_spec =
                    ParamSpec::linear("h0", heads[0], 0.0, 10.0 * h_max + test.radius());
                let fit = self.fitter.nonlinear_fit(
                    |t, p| porchet_head(p[0], p[1], t, test),
                    &[k_spec, h0_spec],
                    times,
                    heads,
                )?;
                (fit.params[0], fit.params[1], fit)
            }
        };

        let fitted: Vec<f64> = times
            .iter()
            .map(|t| porchet_head(conductivity, h0, *t, test))
            .collect();
        let goodness = stats::r_squared(heads, &fitted);
        let boundary = if test.bottom_infiltration() {
            "bottom_and_walls"
        } else {
            "walls_only"
        };

        let mut builder = FitResultBuilder::new(TestKind::Porchet)
            .parameter("K", conductivity)
            .goodness_of_fit(goodness)
            .diagnostic("boundary", boundary)
            .diagnostic("h0", h0)
            .diagnostic("K_two_point", k_two_point)
            .diagnostic("rmse", fit.rmse())
            .diagnostic("iterations", fit.iterations);
        if let Some(se) = fit.std_error("K") {
            builder = builder.diagnostic("K_std_error", se);
        }

        if goodness < c.poor_fit_threshold {
            let msg = format!(
                "poor fit: goodness {goodness:.3} below {}; soil may not be uniform",
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
            |t| porchet_head(conductivity, h0, t, test),
            "porchet model",
        )?;
        let result = builder.build(curve);

        info!(conductivity, h0, boundary, goodness, "Porchet analysis complete");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(k: f64, h0: f64, test: &PorchetTest) -> NumericSeries {
        let t: Vec<f64> = (0..=12).map(|i| f64::from(i) * 300.0).collect();
        let h = t.iter().map(|t| porchet_head(k, h0, *t, test)).collect();
        NumericSeries::new(t, h).unwrap()
    }

    #[test]
    fn test_recovers_conductivity_with_bottom() {
        let test = PorchetTest::new(0.04).unwrap();
        let fit = PorchetAnalyzer::default()
            .analyze(&synthetic(1e-5, 0.5, &test), &test)
            .unwrap();
        let k = fit.parameter("K").unwrap();
        assert!((k / 1e-5 - 1.0).abs() < 0.01, "K = {k}");
        assert!(fit.goodness_of_fit() > 0.999);
        assert_eq!(
            fit.diagnostic("boundary").and_then(|d| d.as_label()),
            Some("bottom_and_walls")
        );
    }

    #[test]
    fn test_two_point_exact_on_model() {
        let test = PorchetTest::new(0.04).unwrap();
        let series = synthetic(1e-5, 0.5, &test);
        let fit = PorchetAnalyzer::default().analyze(&series, &test).unwrap();
        let k2 = fit.diagnostic("K_two_point").and_then(|d| d.as_f64()).unwrap();
        assert!((k2 / 1e-5 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_walls_only_with_known_head() {
        let test = PorchetTest::new(0.05)
            .unwrap()
            .with_bottom_infiltration(false)
            .with_initial_head(0.8)
            .unwrap();
        let fit = PorchetAnalyzer::default()
            .analyze(&synthetic(4e-6, 0.8, &test), &test)
            .unwrap();
        let k = fit.parameter("K").unwrap();
        assert!((k / 4e-6 - 1.0).abs() < 0.01, "K = {k}");
        assert_eq!(fit.diagnostic("h0").and_then(|d| d.as_f64()), Some(0.8));
    }

    #[test]
    fn test_rising_level_is_degenerate() {
        let test = PorchetTest::new(0.04).unwrap();
        let series = NumericSeries::new(vec![0.0, 60.0, 120.0], vec![0.3, 0.35, 0.4]).unwrap();
        let err = PorchetAnalyzer::default().analyze(&series, &test).unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateData(_)));
    }
}
