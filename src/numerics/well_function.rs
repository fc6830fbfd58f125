//! Theis well function W(u), the exponential integral E₁(u).
//!
//! Two branches:
//! - u < 1: convergent power series `-γ - ln u - Σ (-u)^k / (k·k!)`
//! - u ≥ 1: modified Lentz evaluation of the continued fraction
//!   `e^{-u} / (u + 1 - 1/(u + 3 - 4/(u + 5 - ...)))`
//!
//! Both branches are accurate to ~1e-14 relative near the switch point, so
//! the seam is invisible to the optimizer.

use crate::error::{AnalysisError, Result};

/// Euler-Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Arguments below this use the series, at or above it the continued fraction.
pub const SERIES_SWITCH: f64 = 1.0;

const MAX_TERMS: usize = 500;
const TOLERANCE: f64 = 1e-16;
const CF_TOLERANCE: f64 = 1e-15;
const TINY: f64 = 1e-300;

/// Stateless evaluator for W(u).
#[derive(Debug, Clone, Copy, Default)]
pub struct WellFunctionEvaluator;

impl WellFunctionEvaluator {
    /// W(u) for a single argument. `u` must be finite and strictly positive.
    pub fn evaluate(u: f64) -> Result<f64> {
        if !u.is_finite() || u <= 0.0 {
            return Err(AnalysisError::Domain(format!(
                "well function requires finite u > 0, got {u}"
            )));
        }
        if u < SERIES_SWITCH {
            Ok(series(u))
        } else {
            Ok(continued_fraction(u))
        }
    }

    /// Elementwise W(u). Fails on the first out-of-domain element.
    pub fn evaluate_many(us: &[f64]) -> Result<Vec<f64>> {
        us.iter()
            .enumerate()
            .map(|(i, &u)| {
                Self::evaluate(u).map_err(|_| {
                    AnalysisError::Domain(format!(
                        "well function requires finite u > 0, got u[{i}] = {u}"
                    ))
                })
            })
            .collect()
    }
}

/// Convenience wrapper around [`WellFunctionEvaluator::evaluate`].
pub fn well_function(u: f64) -> Result<f64> {
    WellFunctionEvaluator::evaluate(u)
}

#[allow(clippy::cast_precision_loss)]
fn series(u: f64) -> f64 {
    let mut sum = 0.0;
    let mut term = 1.0;
    for k in 1..MAX_TERMS {
        let kf = k as f64;
        term *= -u / kf;
        let contribution = term / kf;
        sum += contribution;
        if contribution.abs() < TOLERANCE * sum.abs().max(TINY) {
            break;
        }
    }
    -EULER_GAMMA - u.ln() - sum
}

#[allow(clippy::cast_precision_loss)]
fn continued_fraction(u: f64) -> f64 {
    let mut b = u + 1.0;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_TERMS {
        let fi = i as f64;
        let a = -fi * fi;
        b += 2.0;
        d = 1.0 / a.mul_add(d, b);
        c = b + a / c;
        let delta = c * d;
        h *= delta;
        if (delta - 1.0).abs() < CF_TOLERANCE {
            break;
        }
    }
    h * (-u).exp()
}
