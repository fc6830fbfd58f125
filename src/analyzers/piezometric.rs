//! Groundwater level (piezometric) record analysis
//!
//! Descriptive statistics, an OLS trend on raw time, and a regime label.
//! Classification compares the trend against the record's own spread, so it
//! does not depend on the level datum or units.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use super::{require_points, TestAnalyzer};
use crate::config::{AnalysisConfig, PiezometricConfig};
use crate::error::Result;
use crate::numerics::{linear_fit, stats, LinearFit};
use crate::types::{FitResult, FitResultBuilder, NumericSeries, TestKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Stable,
    Declining,
    Rising,
    Cyclic,
}

impl TrendClass {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Declining => "declining",
            Self::Rising => "rising",
            Self::Cyclic => "cyclic",
        }
    }
}

impl fmt::Display for TrendClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendEvidence {
    pub std: f64,
    /// |slope|·time span / std
    pub strength: f64,
    pub r_squared: f64,
    pub slope: f64,
    /// Lag-1 autocorrelation of detrended levels.
    pub autocorrelation: f64,
    pub mean_crossings: usize,
}

impl TrendEvidence {
    fn gather(times: &[f64], levels: &[f64], line: &LinearFit) -> Self {
        let std = stats::population_std(levels);
        let (t_lo, t_hi) = stats::min_max(times);
        let residuals: Vec<f64> = times
            .iter()
            .zip(levels)
            .map(|(t, h)| h - line.predict(*t))
            .collect();
        Self {
            std,
            strength: if std > 0.0 {
                line.slope.abs() * (t_hi - t_lo) / std
            } else {
                0.0
            },
            r_squared: line.r_squared,
            slope: line.slope,
            autocorrelation: stats::lag1_autocorrelation(&residuals),
            mean_crossings: stats::mean_crossings(&residuals),
        }
    }

    pub fn classify(&self, config: &PiezometricConfig) -> TrendClass {
        if self.std <= config.flat_std_epsilon {
            TrendClass::Stable
        } else if self.strength >= config.trend_strength_threshold
            && self.r_squared >= config.min_trend_r_squared
        {
            if self.slope < 0.0 {
                TrendClass::Declining
            } else {
                TrendClass::Rising
            }
        } else if self.autocorrelation >= config.cyclic_autocorrelation
            && self.mean_crossings >= config.min_mean_crossings
        {
            TrendClass::Cyclic
        } else {
            TrendClass::Stable
        }
    }
}

fn aquifer_behavior(amplitude: f64) -> &'static str {
    if amplitude > 1.0 {
        "unconfined"
    } else if amplitude > 0.3 {
        "mixed"
    } else {
        "confined"
    }
}

fn reactivity(std: f64, mean: f64) -> &'static str {
    let relative = if mean.abs() > 0.0 { std / mean.abs() } else { 0.0 };
    if relative > 0.1 {
        "very_reactive"
    } else if relative > 0.05 {
        "reactive"
    } else {
        "low_reactivity"
    }
}

#[derive(Debug, Clone, Default)]
pub struct PiezometricAnalyzer {
    config: PiezometricConfig,
}

impl PiezometricAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.piezometric.clone(),
        }
    }
}

impl TestAnalyzer for PiezometricAnalyzer {
    type Test = ();

    fn kind(&self) -> TestKind {
        TestKind::Piezometric
    }

    fn analyze(&self, series: &NumericSeries, _test: &()) -> Result<FitResult> {
        require_points(series, 3, TestKind::Piezometric)?;
        let sorted = series.sorted_by_x();
        let (times, levels) = (sorted.x(), sorted.y());

        let line = linear_fit(times, levels)?;
        let evidence = TrendEvidence::gather(times, levels, &line);
        let class = evidence.classify(&self.config);

        let (lo, hi) = stats::min_max(levels);
        let mean = stats::mean(levels);
        let amplitude = hi - lo;

        let mut builder = FitResultBuilder::new(TestKind::Piezometric)
            .parameter("trend_slope", line.slope)
            .parameter("trend_intercept", line.intercept)
            .goodness_of_fit(line.r_squared)
            .diagnostic("n", levels.len())
            .diagnostic("min", lo)
            .diagnostic("max", hi)
            .diagnostic("mean", mean)
            .diagnostic("std", evidence.std)
            .diagnostic("amplitude", amplitude)
            .diagnostic("r_squared", line.r_squared)
            .diagnostic("p_value", line.p_value)
            .diagnostic("trend_strength", evidence.strength)
            .diagnostic("autocorrelation", evidence.autocorrelation)
            .diagnostic("mean_crossings", evidence.mean_crossings)
            .diagnostic("slope_per_year", line.slope * self.config.time_units_per_year)
            .diagnostic("classification", class.label())
            .diagnostic("aquifer_behavior", aquifer_behavior(amplitude))
            .diagnostic("reactivity", reactivity(evidence.std, mean));

        let provenance = series.provenance();
        if let (Some(x_unit), Some(y_unit)) = (&provenance.x_unit, &provenance.y_unit) {
            builder = builder
                .unit("trend_slope", format!("{y_unit}/{x_unit}"))
                .unit("trend_intercept", y_unit.clone());
        }

        let curve = NumericSeries::model_curve(times, |t| line.predict(t), "piezometric trend")?;
        let result = builder.build(curve);

        info!(
            slope = line.slope,
            classification = class.label(),
            strength = evidence.strength,
            n = levels.len(),
            "Piezometric analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;
    use std::f64::consts::PI;

    fn analyze(times: Vec<f64>, levels: Vec<f64>) -> FitResult {
        let series = NumericSeries::new(times, levels).unwrap();
        PiezometricAnalyzer::default().analyze(&series, &()).unwrap()
    }

    fn class(fit: &FitResult) -> &str {
        fit.diagnostic("classification")
            .and_then(|d| d.as_label())
            .unwrap()
    }

    #[test]
    fn test_linear_decline() {
        let t: Vec<f64> = (0..30).map(f64::from).collect();
        let h = t.iter().map(|d| 10.5 - 0.7 * d / 29.0).collect();
        let fit = analyze(t, h);
        assert_eq!(class(&fit), "declining");
        assert!((fit.parameter("trend_slope").unwrap() + 0.7 / 29.0).abs() < 1e-12);
    }

    #[test]
    fn test_seasonal_cycle() {
        let t: Vec<f64> = (0..=120).map(f64::from).collect();
        let h = t.iter().map(|d| 10.0 + 0.5 * (2.0 * PI * d / 30.0).sin()).collect();
        let fit = analyze(t, h);
        assert_eq!(class(&fit), "cyclic");
        assert_eq!(
            fit.diagnostic("aquifer_behavior").and_then(|d| d.as_label()),
            Some("mixed")
        );
    }

    #[test]
    fn test_rising_with_weekly_ripple() {
        let t: Vec<f64> = (0..60).map(f64::from).collect();
        let h = t
            .iter()
            .map(|d| 5.0 + 0.02 * d + 0.05 * (2.0 * PI * d / 7.0).sin())
            .collect();
        assert_eq!(class(&analyze(t, h)), "rising");
    }

    #[test]
    fn test_flat_and_jitter_are_stable() {
        let t: Vec<f64> = (0..20).map(f64::from).collect();
        assert_eq!(class(&analyze(t.clone(), vec![3.0; 20])), "stable");
        let jitter = (0..20).map(|i| if i % 2 == 0 { 2.99 } else { 3.01 }).collect();
        assert_eq!(class(&analyze(t, jitter)), "stable");
    }

    #[test]
    fn test_scale_invariant() {
        let t: Vec<f64> = (0..=120).map(f64::from).collect();
        let h: Vec<f64> = t.iter().map(|d| 10.0 + 0.5 * (2.0 * PI * d / 30.0).sin()).collect();
        let scaled: Vec<f64> = h.iter().map(|v| 1000.0 * v - 42.0).collect();
        assert_eq!(class(&analyze(t.clone(), h)), class(&analyze(t, scaled)));
    }

    #[test]
    fn test_units_follow_provenance() {
        let series = NumericSeries::new(vec![0.0, 1.0, 2.0, 3.0], vec![1.0, 1.1, 1.2, 1.3])
            .unwrap()
            .with_provenance(Provenance::new("pz-3").with_units("day", "m"));
        let fit = PiezometricAnalyzer::default().analyze(&series, &()).unwrap();
        assert_eq!(fit.unit("trend_slope"), Some("m/day"));
        let per_year = fit.diagnostic("slope_per_year").and_then(|d| d.as_f64()).unwrap();
        assert!((per_year - 0.1 * 365.25).abs() < 1e-9);
    }
}
