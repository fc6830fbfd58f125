//! Lugeon (packer) injection test
//!
//! Water is injected into a packed-off borehole section at a sequence of
//! pressure stages, conventionally 5 going up then down (e.g. 5-7.5-10-7.5-5
//! bar). The series holds `(pressure [bar], flow [L/min])` in stage order.
//!
//! One Lugeon is 1 L/min per metre of test section at 10 bar. Each stage is
//! normalised to the reference pressure:
//!
//! ```text
//! LU = (Q / L) · (P_ref / P)
//! ```
//!
//! The pattern of stage values across the sequence (Houlsby's interpretation)
//! says how the rock responded and which stage value is representative.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use super::{require_non_negative_y, require_points, require_positive_x, TestAnalyzer};
use crate::config::{AnalysisConfig, LugeonConfig};
use crate::error::Result;
use crate::numerics::stats;
use crate::types::{FitResult, FitResultBuilder, LugeonTest, NumericSeries, TestKind};

/// Convert Lugeon units to hydraulic conductivity [m/s].
///
/// `factor` is the conductivity of one Lugeon unit, normally
/// `LugeonConfig::lugeon_to_ms`.
pub fn lugeon_to_ms(lugeon: f64, factor: f64) -> f64 {
    lugeon * factor
}

/// Convert hydraulic conductivity [m/s] to Lugeon units.
pub fn ms_to_lugeon(conductivity: f64, factor: f64) -> f64 {
    conductivity / factor
}

/// Houlsby flow behaviour inferred from the stage pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoulsbyBehavior {
    /// All stages agree.
    Laminar,
    /// Lowest value at peak pressure.
    Turbulent,
    /// Highest value at peak pressure: fractures open under load.
    Dilation,
    /// Values keep rising: infill is being flushed out.
    Washout,
    /// Values keep falling: fractures are clogging.
    VoidFilling,
    Irregular,
}

impl HoulsbyBehavior {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Laminar => "laminar",
            Self::Turbulent => "turbulent",
            Self::Dilation => "dilation",
            Self::Washout => "washout",
            Self::VoidFilling => "void_filling",
            Self::Irregular => "irregular",
        }
    }

    /// Representative Lugeon value for this behaviour.
    fn representative(self, lugeons: &[f64], peak: usize) -> f64 {
        let (lo, hi) = stats::min_max(lugeons);
        match self {
            Self::Laminar | Self::Irregular => stats::mean(lugeons),
            Self::Turbulent => lugeons[peak],
            Self::Dilation | Self::VoidFilling => lo,
            Self::Washout => hi,
        }
    }
}

impl fmt::Display for HoulsbyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] >= w[0])
}

fn non_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] <= w[0])
}

/// Index of the first stage at the highest pressure.
fn peak_stage(pressures: &[f64]) -> usize {
    pressures
        .iter()
        .enumerate()
        .fold(0, |best, (i, p)| if *p > pressures[best] { i } else { best })
}

/// Classify the stage pattern. `lugeons` is in stage order.
pub fn classify(lugeons: &[f64], peak: usize, laminar_tolerance: f64) -> HoulsbyBehavior {
    let mean = stats::mean(lugeons);
    if mean <= 0.0 {
        return HoulsbyBehavior::Laminar;
    }
    let max_dev = lugeons
        .iter()
        .map(|v| (v - mean).abs() / mean)
        .fold(0.0, f64::max);
    if max_dev <= laminar_tolerance {
        return HoulsbyBehavior::Laminar;
    }

    let (first, last) = (lugeons[0], lugeons[lugeons.len() - 1]);
    if non_decreasing(lugeons) && last > first {
        return HoulsbyBehavior::Washout;
    }
    if non_increasing(lugeons) && last < first {
        return HoulsbyBehavior::VoidFilling;
    }

    let (lo, hi) = stats::min_max(lugeons);
    if lugeons[peak] <= lo {
        HoulsbyBehavior::Turbulent
    } else if lugeons[peak] >= hi {
        HoulsbyBehavior::Dilation
    } else {
        HoulsbyBehavior::Irregular
    }
}

fn quality_label(cv: f64) -> &'static str {
    if cv < 0.15 {
        "excellent"
    } else if cv < 0.30 {
        "good"
    } else if cv < 0.50 {
        "fair"
    } else {
        "poor"
    }
}

#[derive(Debug, Clone, Default)]
pub struct LugeonAnalyzer {
    config: LugeonConfig,
}

impl LugeonAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: config.lugeon.clone(),
        }
    }

    /// Normalised Lugeon value of each stage.
    pub fn stage_lugeons(&self, series: &NumericSeries, test: &LugeonTest) -> Vec<f64> {
        let p_ref = self.config.reference_pressure_bar;
        series
            .points()
            .map(|(p, q)| q / test.test_length() * (p_ref / p))
            .collect()
    }

    /// Largest relative divergence between each ascending stage and the
    /// descending stage nearest to it in pressure. `None` without a
    /// descending branch.
    fn max_divergence(pressures: &[f64], lugeons: &[f64], peak: usize) -> Option<f64> {
        let descending: Vec<usize> = (peak + 1..pressures.len()).collect();
        if descending.is_empty() {
            return None;
        }
        (0..peak)
            .filter_map(|a| {
                let d = *descending.iter().min_by(|i, j| {
                    (pressures[**i] - pressures[a])
                        .abs()
                        .total_cmp(&(pressures[**j] - pressures[a]).abs())
                })?;
                let scale = lugeons[a].abs().max(lugeons[d].abs());
                Some(if scale > 0.0 {
                    (lugeons[a] - lugeons[d]).abs() / scale
                } else {
                    0.0
                })
            })
            .reduce(f64::max)
    }

    /// Mean of the stages run within tolerance of the reference pressure,
    /// and which stages it used.
    fn reference_mean(&self, pressures: &[f64], lugeons: &[f64]) -> (f64, &'static str) {
        let c = &self.config;
        let near: Vec<f64> = pressures
            .iter()
            .zip(lugeons)
            .filter(|(p, _)| (*p - c.reference_pressure_bar).abs() <= c.reference_tolerance_bar)
            .map(|(_, lu)| *lu)
            .collect();
        if near.is_empty() {
            (stats::mean(lugeons), "all_stages")
        } else {
            (stats::mean(&near), "reference_pressure")
        }
    }
}

impl TestAnalyzer for LugeonAnalyzer {
    type Test = LugeonTest;

    fn kind(&self) -> TestKind {
        TestKind::Lugeon
    }

    fn analyze(&self, series: &NumericSeries, test: &LugeonTest) -> Result<FitResult> {
        require_points(series, 3, TestKind::Lugeon)?;
        require_positive_x(series, "injection pressure")?;
        require_non_negative_y(series, "flow")?;
        let c = &self.config;
        let (pressures, flows) = (series.x(), series.y());
        let lugeons = self.stage_lugeons(series, test);
        let peak = peak_stage(pressures);
        debug!(?lugeons, peak, "Lugeon stage values");

        let mut warnings = Vec::new();
        let shaped = peak > 0
            && peak + 1 < pressures.len()
            && non_decreasing(&pressures[..=peak])
            && non_increasing(&pressures[peak..]);
        if !shaped {
            warnings.push(
                "pressure stages are not an ascending then descending sequence; \
                 behaviour classification is unreliable"
                    .to_string(),
            );
        }
        if pressures.len() != c.nominal_stages {
            warnings.push(format!(
                "{} stages recorded, {} expected",
                pressures.len(),
                c.nominal_stages
            ));
        }

        let divergence = Self::max_divergence(pressures, &lugeons, peak);
        if let Some(d) = divergence.filter(|d| *d > c.divergence_threshold) {
            warnings.push(format!(
                "ascending and descending stages diverge by {:.0}% (threshold {:.0}%): \
                 check for washout, clogging or a packer leak",
                d * 100.0,
                c.divergence_threshold * 100.0
            ));
        }

        let behavior = classify(&lugeons, peak, c.laminar_tolerance);
        let lugeon = behavior.representative(&lugeons, peak);
        let conductivity = lugeon_to_ms(lugeon, c.lugeon_to_ms);
        if flows.iter().all(|q| *q == 0.0) {
            warnings.push("no flow at any stage: section is practically impermeable".to_string());
        }

        // Q = b·P through the origin
        let spp: f64 = pressures.iter().map(|p| p * p).sum();
        let spq: f64 = pressures.iter().zip(flows).map(|(p, q)| p * q).sum();
        let b = spq / spp;
        let fitted: Vec<f64> = pressures.iter().map(|p| b * p).collect();
        let goodness = stats::r_squared(flows, &fitted);

        let (reference_mean, basis) = self.reference_mean(pressures, &lugeons);
        let mean = stats::mean(&lugeons);
        let cv = if mean > 0.0 {
            stats::population_std(&lugeons) / mean
        } else {
            0.0
        };

        let mut builder = FitResultBuilder::new(TestKind::Lugeon)
            .parameter("K", conductivity)
            .parameter("lugeon", lugeon)
            .goodness_of_fit(goodness)
            .diagnostic("behavior", behavior.label())
            .diagnostic("reference_mean", reference_mean)
            .diagnostic("reference_basis", basis)
            .diagnostic("cv", cv)
            .diagnostic("quality", quality_label(cv))
            .diagnostic("peak_pressure", pressures[peak])
            .diagnostic("flow_per_bar", b);
        for (i, lu) in lugeons.iter().enumerate() {
            builder = builder.diagnostic(&format!("lugeon_stage_{}", i + 1), *lu);
        }
        if let Some(d) = divergence {
            builder = builder.diagnostic("max_divergence", d);
        }
        for w in &warnings {
            warn!("{}", w);
        }
        builder = builder.warnings(warnings);

        let curve = NumericSeries::model_curve(pressures, |p| b * p, "lugeon linear flow")?;
        let result = builder.build(curve);

        info!(
            lugeon,
            conductivity,
            behavior = behavior.label(),
            goodness,
            "Lugeon analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use approx::assert_relative_eq;

    const STAGES: [f64; 5] = [5.0, 7.5, 10.0, 7.5, 5.0];

    fn run(flows: &[f64]) -> FitResult {
        let series = NumericSeries::new(STAGES.to_vec(), flows.to_vec()).unwrap();
        LugeonAnalyzer::default()
            .analyze(&series, &LugeonTest::new(5.0).unwrap())
            .unwrap()
    }

    fn behavior(fit: &FitResult) -> &str {
        fit.diagnostic("behavior").and_then(|d| d.as_label()).unwrap()
    }

    #[test]
    fn test_laminar_sequence() {
        let fit = run(&[5.0, 7.5, 10.0, 7.5, 5.0]);
        assert_eq!(behavior(&fit), "laminar");
        assert_relative_eq!(fit.parameter("lugeon").unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.parameter("K").unwrap(), 2e-7, epsilon = 1e-18);
        assert_relative_eq!(fit.goodness_of_fit(), 1.0, epsilon = 1e-12);
        assert!(!fit.has_warnings(), "{:?}", fit.warnings());
        assert_eq!(
            fit.diagnostic("reference_basis").and_then(|d| d.as_label()),
            Some("reference_pressure")
        );
    }

    #[test]
    fn test_turbulent_uses_peak_stage() {
        // LU = [2.0, 1.6, 1.3, 1.6, 2.0]
        let fit = run(&[5.0, 6.0, 6.5, 6.0, 5.0]);
        assert_eq!(behavior(&fit), "turbulent");
        assert_relative_eq!(fit.parameter("lugeon").unwrap(), 1.3, epsilon = 1e-12);
    }

    #[test]
    fn test_washout_warns_on_divergence() {
        // LU = [2.0, 2.4, 2.8, 3.2, 3.2]
        let fit = run(&[5.0, 9.0, 14.0, 12.0, 8.0]);
        assert_eq!(behavior(&fit), "washout");
        assert_relative_eq!(fit.parameter("lugeon").unwrap(), 3.2, epsilon = 1e-12);
        assert!(fit.warnings().iter().any(|w| w.contains("diverge")), "{:?}", fit.warnings());
        let d = fit.diagnostic("max_divergence").and_then(|d| d.as_f64()).unwrap();
        assert_relative_eq!(d, 0.375, epsilon = 1e-12);
    }

    #[test]
    fn test_ascending_only_is_warned_not_fatal() {
        let series = NumericSeries::new(vec![5.0, 7.5, 10.0], vec![5.0, 7.5, 10.0]).unwrap();
        let fit = LugeonAnalyzer::default()
            .analyze(&series, &LugeonTest::new(5.0).unwrap())
            .unwrap();
        assert!(fit.warnings().iter().any(|w| w.contains("ascending then descending")));
        assert!(fit.warnings().iter().any(|w| w.contains("3 stages recorded")));
        assert!(fit.diagnostic("max_divergence").is_none());
    }

    #[test]
    fn test_zero_flow_gives_zero_conductivity() {
        let fit = run(&[0.0; 5]);
        assert_eq!(fit.parameter("K"), Some(0.0));
        assert!(fit.warnings().iter().any(|w| w.contains("impermeable")));
    }

    #[test]
    fn test_rejects_non_positive_pressure() {
        let series = NumericSeries::new(vec![0.0, 5.0, 10.0], vec![1.0, 2.0, 3.0]).unwrap();
        let err = LugeonAnalyzer::default()
            .analyze(&series, &LugeonTest::new(5.0).unwrap())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InputValidation(_)));
    }

    #[test]
    fn test_unit_helpers() {
        let factor = LugeonConfig::default().lugeon_to_ms;
        assert_relative_eq!(lugeon_to_ms(10.0, factor), 1e-6);
        assert_relative_eq!(ms_to_lugeon(1e-6, factor), 10.0);
        assert_relative_eq!(lugeon_to_ms(10.0, 1.3e-7), 1.3e-6);
    }

    #[test]
    fn test_conductivity_follows_configured_factor() {
        let mut config = AnalysisConfig::default();
        config.lugeon.lugeon_to_ms = 1.3e-7;
        let series =
            NumericSeries::new(STAGES.to_vec(), vec![5.0, 7.5, 10.0, 7.5, 5.0]).unwrap();
        let fit = LugeonAnalyzer::new(&config)
            .analyze(&series, &LugeonTest::new(5.0).unwrap())
            .unwrap();
        let lu = fit.parameter("lugeon").unwrap();
        assert_relative_eq!(lu, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.parameter("K").unwrap(), lugeon_to_ms(lu, 1.3e-7));
        assert_relative_eq!(fit.parameter("K").unwrap(), 2.6e-7, epsilon = 1e-18);
    }
}
