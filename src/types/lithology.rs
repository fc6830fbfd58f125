//! Lithology profiles returned by the parameter recommender.

use serde::{Deserialize, Serialize};

/// Closed numeric interval with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Build a range from two bounds in either order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Geometric mean, the natural midpoint for log-distributed properties.
    pub fn geometric_mid(&self) -> f64 {
        (self.min * self.max).sqrt()
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Typical hydraulic properties of a lithology with a rendered explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LithologyProfile {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    /// Hydraulic conductivity K [m/s].
    pub conductivity_range: ValueRange,
    /// Effective porosity [-].
    pub porosity_range: ValueRange,
    /// Storativity S [-].
    pub storativity_range: ValueRange,
    pub explanation_template: String,
    pub explanation: String,
}

impl LithologyProfile {
    pub fn typical_conductivity(&self) -> f64 {
        self.conductivity_range.geometric_mid()
    }

    pub fn typical_porosity(&self) -> f64 {
        (self.porosity_range.min + self.porosity_range.max) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_normalises_order() {
        let r = ValueRange::new(1e-3, 1e-5);
        assert!(r.min < r.max);
        assert!(r.contains(1e-4));
        assert!(!r.contains(1e-2));
        assert!((r.geometric_mid() - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_overlap() {
        let a = ValueRange::new(1e-5, 1e-3);
        assert!(a.overlaps(&ValueRange::new(1e-4, 1e-2)));
        assert!(!a.overlaps(&ValueRange::new(1e-2, 1.0)));
    }
}
