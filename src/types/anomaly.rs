//! Anomaly detection outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ZScore,
    Iqr,
    Spatial,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZScore => write!(f, "z-score"),
            Self::Iqr => write!(f, "IQR"),
            Self::Spatial => write!(f, "spatial"),
        }
    }
}

/// Centre and spread estimators used for z-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZScoreMode {
    /// Mean and population standard deviation.
    #[default]
    Population,
    /// Median and 1.4826 × MAD (modified z-score). Not masked by the
    /// outlier itself, which matters for short series.
    Robust,
}

/// One flagged point. `score` is non-negative and comparable only within
/// the method that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub value: f64,
    pub method: DetectionMethod,
    pub score: f64,
    pub explanation: String,
}

/// Overall verdict of a multi-series data quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Excellent,
    Good,
    Attention,
    Review,
}

impl QualityStatus {
    /// Status from a contamination rate (fraction of flagged points).
    pub fn from_contamination(rate: f64) -> Self {
        if rate < 0.05 {
            Self::Excellent
        } else if rate < 0.10 {
            Self::Good
        } else if rate < 0.20 {
            Self::Attention
        } else {
            Self::Review
        }
    }

    /// Confidence in the data set attached to each status.
    pub const fn confidence(self) -> f64 {
        match self {
            Self::Excellent => 0.95,
            Self::Good => 0.85,
            Self::Attention => 0.70,
            Self::Review => 0.50,
        }
    }
}

/// Anomalies found in one named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesAnomalies {
    pub name: String,
    pub points: usize,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub series: Vec<SeriesAnomalies>,
    pub total_points: usize,
    pub total_anomalies: usize,
    pub contamination_rate: f64,
    pub confidence_score: f64,
    pub status: QualityStatus,
    pub recommendations: Vec<String>,
}
