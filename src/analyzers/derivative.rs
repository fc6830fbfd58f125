//! Drawdown log-derivative (Bourdet) diagnostic
//!
//! `ds / d ln t` flattens to `Q / (4πT)` once an infinite confined aquifer
//! reaches radial flow, so plotting it next to the drawdown shows boundary
//! effects, leakage and well-bore storage at a glance.

use crate::error::{AnalysisError, Result};
use crate::types::{NumericSeries, Provenance};

/// Log-derivative of a drawdown record, evaluated at each observation time.
///
/// Interior points use the second-order central difference for uneven
/// spacing in ln t; the two end points use one-sided differences.
pub fn drawdown_derivative(series: &NumericSeries) -> Result<NumericSeries> {
    if series.len() < 3 {
        return Err(AnalysisError::insufficient(
            3,
            series.len(),
            "drawdown derivative",
        ));
    }
    let sorted = series.sorted_by_x();
    let times = sorted.x();
    if let Some(i) = times.iter().position(|t| *t <= 0.0) {
        return Err(AnalysisError::InputValidation(format!(
            "time must be > 0 for a log-derivative, got {} at index {i}",
            times[i]
        )));
    }
    if times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(AnalysisError::InputValidation(
            "log-derivative needs distinct observation times".to_string(),
        ));
    }

    let x: Vec<f64> = times.iter().map(|t| t.ln()).collect();
    let s = sorted.y();
    let n = x.len();
    let mut d = Vec::with_capacity(n);
    d.push((s[1] - s[0]) / (x[1] - x[0]));
    for i in 1..n - 1 {
        let hl = x[i] - x[i - 1];
        let hr = x[i + 1] - x[i];
        d.push(
            (hl * hl * s[i + 1] - hr * hr * s[i - 1] + (hr * hr - hl * hl) * s[i])
                / (hl * hr * (hl + hr)),
        );
    }
    d.push((s[n - 1] - s[n - 2]) / (x[n - 1] - x[n - 2]));

    let mut provenance = Provenance::new("drawdown log-derivative");
    provenance.x_unit.clone_from(&sorted.provenance().x_unit);
    provenance.y_unit.clone_from(&sorted.provenance().y_unit);
    Ok(NumericSeries::new(times.to_vec(), d)?.with_provenance(provenance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_semi_log_line_has_constant_derivative() {
        let t = vec![10.0, 30.0, 100.0, 250.0, 1000.0, 4000.0];
        let s = t.iter().map(|t: &f64| 0.2 + 0.05 * t.ln()).collect();
        let d = drawdown_derivative(&NumericSeries::new(t, s).unwrap()).unwrap();
        for v in d.y() {
            assert_relative_eq!(*v, 0.05, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exact_for_quadratic_in_log_time() {
        let t = vec![1.0, 2.0, 7.0, 20.0, 90.0];
        let s = t.iter().map(|t: &f64| t.ln().powi(2)).collect();
        let d = drawdown_derivative(&NumericSeries::new(t.clone(), s).unwrap()).unwrap();
        for i in 1..t.len() - 1 {
            assert_relative_eq!(d.y()[i], 2.0 * t[i].ln(), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rejects_zero_time_and_duplicates() {
        let zero = NumericSeries::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.1, 0.2]).unwrap();
        assert!(matches!(
            drawdown_derivative(&zero),
            Err(AnalysisError::InputValidation(_))
        ));
        let dup = NumericSeries::new(vec![1.0, 1.0, 2.0], vec![0.0, 0.1, 0.2]).unwrap();
        assert!(drawdown_derivative(&dup).is_err());
    }
}
