//! Paired numeric series with provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::numerics::stats::min_max;

/// Where a series came from and what its axes mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provenance {
    /// Free-form source label (well id, file name, model name).
    pub source: String,
    pub x_unit: Option<String>,
    pub y_unit: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl Provenance {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_units(mut self, x_unit: &str, y_unit: &str) -> Self {
        self.x_unit = Some(x_unit.to_string());
        self.y_unit = Some(y_unit.to_string());
        self
    }

    #[must_use]
    pub fn recorded_now(mut self) -> Self {
        self.recorded_at = Some(Utc::now());
        self
    }
}

/// Two aligned sequences of finite floats (x: independent, y: dependent).
///
/// Construction validates the shape once; after that the series is
/// immutable. Analyzers that need time ordering work on a sorted copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct NumericSeries {
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(default)]
    provenance: Provenance,
}

#[derive(Deserialize)]
struct RawSeries {
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(default)]
    provenance: Provenance,
}

impl TryFrom<RawSeries> for NumericSeries {
    type Error = AnalysisError;

    fn try_from(raw: RawSeries) -> Result<Self> {
        Ok(Self::new(raw.x, raw.y)?.with_provenance(raw.provenance))
    }
}

impl NumericSeries {
    /// Minimum number of points any series must carry.
    pub const MIN_POINTS: usize = 2;

    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(AnalysisError::InputValidation(format!(
                "x and y lengths differ ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.len() < Self::MIN_POINTS {
            return Err(AnalysisError::InputValidation(format!(
                "series needs at least {} points, got {}",
                Self::MIN_POINTS,
                x.len()
            )));
        }
        if let Some(i) = x.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::InputValidation(format!(
                "x[{i}] is not finite ({})",
                x[i]
            )));
        }
        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::InputValidation(format!(
                "y[{i}] is not finite ({})",
                y[i]
            )));
        }
        Ok(Self {
            x,
            y,
            provenance: Provenance::default(),
        })
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let (x, y) = pairs.iter().copied().unzip();
        Self::new(x, y)
    }

    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub const fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    /// Copy of the series with points ordered by ascending x (stable).
    #[must_use]
    pub fn sorted_by_x(&self) -> Self {
        let mut pairs: Vec<(f64, f64)> = self.points().collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (x, y) = pairs.into_iter().unzip();
        Self {
            x,
            y,
            provenance: self.provenance.clone(),
        }
    }

    pub fn is_sorted_by_x(&self) -> bool {
        self.x.windows(2).all(|w| w[0] <= w[1])
    }

    /// Span of x (max - min).
    pub fn x_span(&self) -> f64 {
        let (lo, hi) = min_max(&self.x);
        hi - lo
    }

    /// Span of y (max - min).
    pub fn y_span(&self) -> f64 {
        let (lo, hi) = min_max(&self.y);
        hi - lo
    }

    /// Build a model curve evaluated on the given abscissae.
    pub(crate) fn model_curve(
        x: &[f64],
        f: impl Fn(f64) -> f64,
        source: &str,
    ) -> Result<Self> {
        let y = x.iter().map(|&xi| f(xi)).collect();
        Ok(Self::new(x.to_vec(), y)?.with_provenance(Provenance::new(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_length_mismatch() {
        let err = NumericSeries::new(vec![1.0, 2.0, 3.0], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::InputValidation(_)));
    }

    #[test]
    fn test_rejects_single_point_and_non_finite() {
        assert!(NumericSeries::new(vec![1.0], vec![1.0]).is_err());
        let err = NumericSeries::new(vec![1.0, f64::NAN], vec![1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("x[1]"), "got: {err}");
        assert!(NumericSeries::new(vec![1.0, 2.0], vec![f64::INFINITY, 2.0]).is_err());
    }

    #[test]
    fn test_sorted_copy_leaves_original_untouched() {
        let s = NumericSeries::new(vec![3.0, 1.0, 2.0], vec![30.0, 10.0, 20.0]).unwrap();
        let sorted = s.sorted_by_x();
        assert_eq!(sorted.x(), &[1.0, 2.0, 3.0]);
        assert_eq!(sorted.y(), &[10.0, 20.0, 30.0]);
        assert_eq!(s.x(), &[3.0, 1.0, 2.0]);
        assert!(!s.is_sorted_by_x());
        assert!(sorted.is_sorted_by_x());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: NumericSeries =
            serde_json::from_str(r#"{"x":[1.0,2.0],"y":[3.0,4.0]}"#).unwrap();
        assert_eq!(ok.len(), 2);
        let bad = serde_json::from_str::<NumericSeries>(r#"{"x":[1.0,2.0],"y":[3.0]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_spans() {
        let s = NumericSeries::from_pairs(&[(5.0, -1.0), (1.0, 4.0), (3.0, 0.5)]).unwrap();
        assert!((s.x_span() - 4.0).abs() < 1e-12);
        assert!((s.y_span() - 5.0).abs() < 1e-12);
    }
}
