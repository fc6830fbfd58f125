//! Anomaly Detection - explainable outlier screening for field records
//!
//! Three independent methods, each returning flagged points with a
//! non-negative score and a plain-language explanation:
//!
//! - **z-score**: distance from the centre in units of spread. Population
//!   mode uses mean/std; robust mode uses median/(1.4826·MAD), which the
//!   outlier itself cannot inflate.
//! - **IQR**: Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]` with linearly
//!   interpolated quartiles.
//! - **spatial**: isolated measurement locations, by nearest-neighbour
//!   distance relative to the median spacing.
//!
//! All methods are pure: inputs are borrowed, never reordered, and the same
//! input always yields the same anomalies.

use tracing::{debug, warn};

use crate::config::AnomalyConfig;
use crate::error::{AnalysisError, Result};
use crate::numerics::stats;
use crate::types::{
    Anomaly, DataQualityReport, DetectionMethod, QualityStatus, SeriesAnomalies, ZScoreMode,
};

/// Consistency constant making MAD comparable to a normal standard deviation.
pub const MAD_SCALE: f64 = 1.4826;

/// Consistency constant for the mean absolute deviation fallback.
const MEAN_AD_SCALE: f64 = 1.253_314;

/// Spread below which a series is considered constant.
const MIN_SPREAD: f64 = 1e-10;

/// Stateless detector. Thresholds come from [`AnomalyConfig`] or are passed
/// directly to the associated functions.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub const fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// z-score screen with the configured threshold and mode.
    pub fn detect_z_score(&self, values: &[f64]) -> Result<Vec<Anomaly>> {
        Self::z_score_with_mode(values, self.config.z_threshold, self.config.z_mode)
    }

    /// IQR screen with the configured fence multiplier.
    pub fn detect_iqr(&self, values: &[f64]) -> Result<Vec<Anomaly>> {
        Self::iqr(values, self.config.iqr_multiplier)
    }

    /// Spatial isolation screen with the configured factor.
    pub fn detect_spatial(&self, points: &[(f64, f64)]) -> Result<Vec<Anomaly>> {
        Self::spatial(points, self.config.spatial_factor)
    }

    // ========================================================================
    // z-score
    // ========================================================================

    /// Flag `|x - mean| / std > threshold` (population std).
    pub fn z_score(values: &[f64], threshold: f64) -> Result<Vec<Anomaly>> {
        Self::z_score_with_mode(values, threshold, ZScoreMode::Population)
    }

    pub fn z_score_with_mode(
        values: &[f64],
        threshold: f64,
        mode: ZScoreMode,
    ) -> Result<Vec<Anomaly>> {
        check_values(values, 2, "z-score detection")?;
        check_threshold(threshold, "z-score threshold")?;

        let mean = stats::mean(values);
        let (centre, spread) = match mode {
            ZScoreMode::Population => (mean, stats::population_std(values)),
            ZScoreMode::Robust => {
                let median = stats::median(values);
                let mad = stats::mad(values);
                let spread = if mad > MIN_SPREAD {
                    MAD_SCALE * mad
                } else {
                    let mean_ad = values.iter().map(|v| (v - median).abs()).sum::<f64>()
                        / count(values);
                    MEAN_AD_SCALE * mean_ad
                };
                (median, spread)
            }
        };

        if spread < MIN_SPREAD {
            debug!(n = values.len(), "z-score: constant series, nothing to flag");
            return Ok(Vec::new());
        }

        let anomalies: Vec<Anomaly> = values
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let z = (value - centre).abs() / spread;
                (z > threshold).then(|| {
                    let explanation = match mode {
                        ZScoreMode::Population => format!(
                            "value {value:.4} has z-score {z:.2} relative to the series mean {mean:.4} \
                             (std {spread:.4}, threshold {threshold})"
                        ),
                        ZScoreMode::Robust => format!(
                            "value {value:.4} has robust z-score {z:.2} relative to the series median \
                             {centre:.4} (series mean {mean:.4}, scaled MAD {spread:.4}, threshold {threshold})"
                        ),
                    };
                    Anomaly {
                        index,
                        value,
                        method: DetectionMethod::ZScore,
                        score: z,
                        explanation,
                    }
                })
            })
            .collect();

        debug!(n = values.len(), flagged = anomalies.len(), ?mode, "z-score screen");
        Ok(anomalies)
    }

    // ========================================================================
    // IQR
    // ========================================================================

    /// Flag values outside `[Q1 - k·IQR, Q3 + k·IQR]`.
    ///
    /// Score is the distance beyond the violated fence in IQR units.
    pub fn iqr(values: &[f64], k: f64) -> Result<Vec<Anomaly>> {
        check_values(values, 4, "IQR detection")?;
        check_threshold(k, "IQR multiplier")?;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let q1 = stats::quantile_sorted(&sorted, 0.25);
        let q3 = stats::quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;
        let lower = k.mul_add(-iqr, q1);
        let upper = k.mul_add(iqr, q3);
        let unit = iqr.max(MIN_SPREAD * stats::median(&sorted).abs().max(1.0));

        let anomalies: Vec<Anomaly> = values
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let (distance, side, fence) = if value < lower {
                    (lower - value, "below the lower", lower)
                } else if value > upper {
                    (value - upper, "above the upper", upper)
                } else {
                    return None;
                };
                Some(Anomaly {
                    index,
                    value,
                    method: DetectionMethod::Iqr,
                    score: distance / unit,
                    explanation: format!(
                        "value {value:.4} lies {distance:.4} {side} fence {fence:.4} \
                         (Q1 {q1:.4}, Q3 {q3:.4}, IQR {iqr:.4}, k {k})"
                    ),
                })
            })
            .collect();

        debug!(n = values.len(), flagged = anomalies.len(), q1, q3, "IQR screen");
        Ok(anomalies)
    }

    // ========================================================================
    // Spatial
    // ========================================================================

    /// Flag locations whose nearest-neighbour distance exceeds
    /// `factor × median nearest-neighbour distance`.
    ///
    /// `value` of each anomaly is its nearest-neighbour distance and the
    /// score is that distance over the median spacing.
    pub fn spatial(points: &[(f64, f64)], factor: f64) -> Result<Vec<Anomaly>> {
        if points.len() < 3 {
            return Err(AnalysisError::insufficient(3, points.len(), "spatial detection"));
        }
        check_threshold(factor, "spatial factor")?;
        if let Some(i) = points
            .iter()
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(AnalysisError::InputValidation(format!(
                "point {i} has non-finite coordinates"
            )));
        }

        let nn: Vec<f64> = (0..points.len())
            .map(|i| nearest_distance(points, i))
            .collect();
        let median = stats::median(&nn);
        // Duplicated locations give a zero median; fall back to the
        // smallest positive spacing.
        let reference = if median > 0.0 {
            median
        } else {
            match nn.iter().copied().filter(|d| *d > 0.0).reduce(f64::min) {
                Some(d) => d,
                None => return Ok(Vec::new()),
            }
        };

        let anomalies: Vec<Anomaly> = nn
            .iter()
            .enumerate()
            .filter_map(|(index, &d)| {
                let ratio = d / reference;
                (ratio > factor).then(|| {
                    let (x, y) = points[index];
                    Anomaly {
                        index,
                        value: d,
                        method: DetectionMethod::Spatial,
                        score: ratio,
                        explanation: format!(
                            "point ({x:.2}, {y:.2}) is {d:.2} from its nearest neighbour, \
                             {ratio:.1}x the median spacing {reference:.2} (factor {factor})"
                        ),
                    }
                })
            })
            .collect();

        debug!(n = points.len(), flagged = anomalies.len(), median, "spatial screen");
        Ok(anomalies)
    }

    /// Flag measurements whose value departs from their `k` nearest
    /// neighbours by more than `sigma` neighbour standard deviations.
    pub fn spatial_values(points: &[(f64, f64, f64)], k: usize, sigma: f64) -> Result<Vec<Anomaly>> {
        if points.len() < 3 {
            return Err(AnalysisError::insufficient(3, points.len(), "spatial value detection"));
        }
        check_threshold(sigma, "spatial sigma")?;
        if k < 2 {
            return Err(AnalysisError::InputValidation(
                "spatial value detection needs k >= 2 neighbours".to_string(),
            ));
        }
        let k = k.min(points.len() - 1);
        let xy: Vec<(f64, f64)> = points.iter().map(|(x, y, _)| (*x, *y)).collect();

        let mut anomalies = Vec::new();
        for (index, &(x, y, value)) in points.iter().enumerate() {
            let mut others: Vec<(f64, usize)> = (0..points.len())
                .filter(|j| *j != index)
                .map(|j| (squared_distance(xy[index], xy[j]), j))
                .collect();
            others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let neighbour_values: Vec<f64> = others[..k].iter().map(|(_, j)| points[*j].2).collect();
            let m = stats::mean(&neighbour_values);
            let s = stats::population_std(&neighbour_values);
            if s < MIN_SPREAD {
                continue;
            }
            let z = (value - m).abs() / s;
            if z > sigma {
                anomalies.push(Anomaly {
                    index,
                    value,
                    method: DetectionMethod::Spatial,
                    score: z,
                    explanation: format!(
                        "value {value:.4} at ({x:.2}, {y:.2}) differs from its {k} nearest \
                         neighbours (mean {m:.4}, std {s:.4}) by {z:.2} standard deviations"
                    ),
                });
            }
        }
        Ok(anomalies)
    }

    // ========================================================================
    // Multi-series quality check
    // ========================================================================

    /// Screen several named series with z-score and IQR and summarise the
    /// overall contamination. A method that rejects a series (too short,
    /// non-finite values) is skipped for it and the reason is logged and
    /// listed in the recommendations.
    #[allow(clippy::cast_precision_loss)]
    pub fn quality_check(&self, series: &[(&str, &[f64])]) -> DataQualityReport {
        let mut reports = Vec::with_capacity(series.len());
        let mut total_points = 0usize;
        let mut skipped = Vec::new();

        for (name, values) in series {
            total_points += values.len();
            let mut screen = |method: &str, outcome: Result<Vec<Anomaly>>| match outcome {
                Ok(found) => found,
                Err(e) => {
                    warn!(series = %name, method, error = %e, "Quality screen skipped");
                    skipped.push(format!("{name}: {method} screen skipped ({e})"));
                    Vec::new()
                }
            };
            let mut found = screen(
                "z-score",
                Self::z_score(values, self.config.quality_z_threshold),
            );
            for a in screen("IQR", Self::iqr(values, self.config.iqr_multiplier)) {
                if !found.iter().any(|f| f.index == a.index) {
                    found.push(a);
                }
            }
            found.sort_by_key(|a| a.index);
            reports.push(SeriesAnomalies {
                name: (*name).to_string(),
                points: values.len(),
                anomalies: found,
            });
        }

        let total_anomalies: usize = reports.iter().map(|r| r.anomalies.len()).sum();
        let contamination_rate = total_anomalies as f64 / total_points.max(1) as f64;
        let status = QualityStatus::from_contamination(contamination_rate);

        let mut recommendations = Vec::new();
        if total_anomalies == 0 {
            recommendations.push("No anomalies detected, data are consistent".to_string());
        } else {
            recommendations.push(format!("{total_anomalies} anomalous point(s) detected"));
            recommendations
                .push("Check these points; exclude or correct them before fitting".to_string());
        }
        if contamination_rate > 0.10 {
            recommendations
                .push("High contamination: review the quality of the field campaign".to_string());
        }
        recommendations.extend(skipped);

        DataQualityReport {
            series: reports,
            total_points,
            total_anomalies,
            contamination_rate,
            confidence_score: status.confidence(),
            status,
            recommendations,
        }
    }
}

fn check_values(values: &[f64], min: usize, context: &str) -> Result<()> {
    if values.len() < min {
        return Err(AnalysisError::insufficient(min, values.len(), context));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(AnalysisError::InputValidation(format!(
            "{context}: value at index {i} is not finite"
        )));
    }
    Ok(())
}

fn check_threshold(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InputValidation(format!(
            "{name} must be > 0, got {value}"
        )))
    }
}

#[allow(clippy::cast_precision_loss)]
fn count(values: &[f64]) -> f64 {
    values.len() as f64
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

fn nearest_distance(points: &[(f64, f64)], i: usize) -> f64 {
    points
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, p)| squared_distance(points[i], *p))
        .fold(f64::INFINITY, f64::min)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_score_population_flags_spike_in_long_series() {
        let mut values = vec![10.0; 30];
        for (i, v) in values.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 0.1 } else { -0.1 };
        }
        values[17] = 14.0;
        let found = AnomalyDetector::z_score(&values, 3.0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 17);
        assert!(found[0].explanation.contains("series mean"));
        assert!(found[0].explanation.contains("14.0000"));
    }

    #[test]
    fn test_z_score_population_bounded_for_short_series() {
        // With n = 5 a population z-score cannot exceed sqrt(n - 1) = 2
        let found = AnomalyDetector::z_score(&[1.0, 1.1, 0.9, 1.0, 10.2], 3.0).unwrap();
        assert!(found.is_empty());
        let found = AnomalyDetector::z_score(&[1.0, 1.1, 0.9, 1.0, 10.2], 1.9).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 4);
        assert!((found[0].score - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_z_score_constant_series() {
        let found = AnomalyDetector::z_score(&[5.0; 10], 3.0).unwrap();
        assert!(found.is_empty());
        let found =
            AnomalyDetector::z_score_with_mode(&[5.0; 10], 3.0, ZScoreMode::Robust).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_z_score_rejects_bad_input() {
        assert!(matches!(
            AnomalyDetector::z_score(&[1.0], 3.0),
            Err(AnalysisError::InsufficientData { .. })
        ));
        assert!(AnomalyDetector::z_score(&[1.0, f64::NAN], 3.0).is_err());
        assert!(AnomalyDetector::z_score(&[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_iqr_fences() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 40.0];
        // Q1 = 3.25, Q3 = 7.75, IQR = 4.5, upper fence = 14.5
        let found = AnomalyDetector::iqr(&values, 1.5).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 9);
        assert!((found[0].score - (40.0 - 14.5) / 4.5).abs() < 1e-9);
        assert!(found[0].explanation.contains("upper fence"));
    }

    #[test]
    fn test_iqr_low_outlier() {
        let values = [-50.0, 10.0, 10.5, 11.0, 9.5, 10.2, 9.8];
        let found = AnomalyDetector::iqr(&values, 1.5).unwrap();
        assert_eq!(found.iter().map(|a| a.index).collect::<Vec<_>>(), vec![0]);
        assert!(found[0].explanation.contains("lower fence"));
    }

    #[test]
    fn test_spatial_isolated_point() {
        let mut points: Vec<(f64, f64)> = (0..4)
            .flat_map(|i| (0..4).map(move |j| (f64::from(i) * 10.0, f64::from(j) * 10.0)))
            .collect();
        points.push((500.0, 500.0));
        let found = AnomalyDetector::spatial(&points, 3.0).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 16);
        assert!(found[0].score > 3.0);
    }

    #[test]
    fn test_spatial_needs_three_points() {
        let err = AnomalyDetector::spatial(&[(0.0, 0.0), (1.0, 1.0)], 3.0).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { required: 3, .. }));
    }

    #[test]
    fn test_spatial_values_flags_local_misfit() {
        let mut points: Vec<(f64, f64, f64)> = (0..5)
            .flat_map(|i| {
                (0..5).map(move |j| {
                    let (x, y) = (f64::from(i), f64::from(j));
                    (x, y, 0.1f64.mul_add(x + y, 100.0) + 0.01 * ((i * 7 + j * 3) % 5) as f64)
                })
            })
            .collect();
        points[12].2 += 5.0;
        let found = AnomalyDetector::spatial_values(&points, 5, 3.0).unwrap();
        assert!(found.iter().any(|a| a.index == 12));
    }

    #[test]
    fn test_quality_check_merges_methods() {
        let detector = AnomalyDetector::default();
        let clean: Vec<f64> = (0..20).map(|i| f64::from(i % 4)).collect();
        let mut dirty = clean.clone();
        dirty[5] = 100.0;
        let report = detector.quality_check(&[("clean", &clean), ("dirty", &dirty)]);
        assert_eq!(report.total_points, 40);
        assert_eq!(report.series[0].anomalies.len(), 0);
        assert_eq!(report.series[1].anomalies.len(), 1, "z and IQR hits must be merged");
        assert_eq!(report.series[1].anomalies[0].index, 5);
        assert_eq!(report.status, QualityStatus::Excellent);
        assert!((report.contamination_rate - 1.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_quality_check_reports_skipped_screens() {
        let detector = AnomalyDetector::default();
        let short = [1.0, 2.0, 3.0];
        let broken = [1.0, f64::NAN, 2.0, 3.0, 4.0];
        let report = detector.quality_check(&[("short", &short), ("broken", &broken)]);

        assert_eq!(report.total_points, 8);
        assert_eq!(report.total_anomalies, 0);
        let notes: Vec<_> = report
            .recommendations
            .iter()
            .filter(|r| r.contains("screen skipped"))
            .collect();
        // IQR needs 4 points; both screens reject the NaN
        assert_eq!(notes.len(), 3, "{:?}", report.recommendations);
        assert!(notes.iter().any(|r| r.starts_with("short: IQR")));
        assert!(notes.iter().any(|r| r.starts_with("broken: z-score")));
        assert!(notes.iter().any(|r| r.starts_with("broken: IQR")));

        let clean: Vec<f64> = (0..20).map(|i| f64::from(i % 4)).collect();
        let ok = detector.quality_check(&[("clean", &clean)]);
        assert!(!ok.recommendations.iter().any(|r| r.contains("skipped")));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let values = vec![3.0, 1.0, 2.0, 50.0, 2.5];
        let copy = values.clone();
        let _ = AnomalyDetector::iqr(&values, 1.5).unwrap();
        let _ = AnomalyDetector::z_score(&values, 1.0).unwrap();
        assert_eq!(values, copy);
    }
}
