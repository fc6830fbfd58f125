//! Curve fitting: bounded nonlinear least squares and ordinary regression.
//!
//! ## Architecture
//!
//! - `Optimizer`: minimises ½‖r(p)‖² over a box. Injected so analyzers can
//!   be tested or tuned with a different backend.
//! - `LevenbergMarquardt`: default optimizer. Central-difference Jacobian,
//!   Marquardt diagonal damping, Cholesky-solved normal equations.
//! - `CurveFitter`: maps named physical parameters into optimizer space
//!   (log10 for scale parameters), runs the optimizer and maps results
//!   and covariance back.
//! - `linear_fit` / `loglinear_fit`: closed-form OLS with slope p-value.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::f64::consts::LN_10;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::config::FittingConfig;
use crate::error::{AnalysisError, Result};

/// Residual vector as a function of optimizer-space parameters.
pub type ResidualFn<'a> = dyn Fn(&[f64]) -> Vec<f64> + 'a;

/// What an optimizer hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerOutcome {
    /// Optimizer-space parameters at the minimum.
    pub params: Vec<f64>,
    /// ½ Σ r²
    pub cost: f64,
    pub iterations: usize,
}

/// Bounded least-squares minimiser.
pub trait Optimizer: Send + Sync + fmt::Debug {
    fn minimize(
        &self,
        residuals: &ResidualFn<'_>,
        start: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<OptimizerOutcome>;
}

// ============================================================================
// Levenberg-Marquardt
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardt {
    max_iterations: usize,
    stall_limit: usize,
    initial_lambda: f64,
    function_tolerance: f64,
    step_tolerance: f64,
    gradient_tolerance: f64,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new(&FittingConfig::default())
    }
}

impl LevenbergMarquardt {
    const LAMBDA_UP: f64 = 10.0;
    const LAMBDA_DOWN: f64 = 10.0;
    const LAMBDA_MIN: f64 = 1e-12;

    pub const fn new(config: &FittingConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            stall_limit: config.stall_limit,
            initial_lambda: config.initial_lambda,
            function_tolerance: config.function_tolerance,
            step_tolerance: config.step_tolerance,
            gradient_tolerance: config.gradient_tolerance,
        }
    }

    fn stall_error(&self, iterations: usize) -> AnalysisError {
        AnalysisError::Convergence {
            iterations,
            reason: format!(
                "residual failed to decrease for {} consecutive iterations",
                self.stall_limit
            ),
        }
    }
}

impl Optimizer for LevenbergMarquardt {
    fn minimize(
        &self,
        residuals: &ResidualFn<'_>,
        start: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<OptimizerOutcome> {
        let n = start.len();
        let mut p = clamp(start, lower, upper);
        let mut r = residuals(&p);
        let mut cost = half_sum_squares(&r);
        if !cost.is_finite() {
            return Err(AnalysisError::Convergence {
                iterations: 0,
                reason: "residuals are not finite at the initial guess".to_string(),
            });
        }

        let mut lambda = self.initial_lambda;
        let mut stall = 0usize;

        for iteration in 1..=self.max_iterations {
            let done = |p: Vec<f64>, cost: f64| -> Result<OptimizerOutcome> {
                Ok(OptimizerOutcome {
                    params: p,
                    cost,
                    iterations: iteration,
                })
            };

            let jac = numeric_jacobian(residuals, &p, lower, upper);
            let jtj = jac.transpose() * &jac;
            let gradient = jac.transpose() * DVector::from_column_slice(&r);

            if gradient.iter().any(|g| !g.is_finite()) {
                stall += 1;
                lambda *= Self::LAMBDA_UP;
                if stall >= self.stall_limit {
                    return Err(self.stall_error(iteration));
                }
                continue;
            }
            if gradient.amax() <= self.gradient_tolerance {
                return done(p, cost);
            }

            let mut damped = jtj.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }
            let Some(step) = damped.cholesky().map(|c| c.solve(&(-&gradient))) else {
                stall += 1;
                lambda *= Self::LAMBDA_UP;
                if stall >= self.stall_limit {
                    return Err(self.stall_error(iteration));
                }
                continue;
            };

            let proposed: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            let trial = clamp(&proposed, lower, upper);
            let moved = distance(&trial, &p);
            let scale = norm(&p) + self.step_tolerance;

            let r_trial = residuals(&trial);
            let cost_trial = half_sum_squares(&r_trial);

            if cost_trial.is_finite() && cost_trial < cost {
                let reduction = (cost - cost_trial) / cost.max(f64::MIN_POSITIVE);
                p = trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda / Self::LAMBDA_DOWN).max(Self::LAMBDA_MIN);
                stall = 0;
                debug!(iteration, cost, lambda, reduction, "LM step accepted");

                if reduction < self.function_tolerance
                    || moved <= self.step_tolerance * scale
                    || cost <= f64::MIN_POSITIVE
                {
                    return done(p, cost);
                }
            } else {
                lambda *= Self::LAMBDA_UP;
                stall += 1;
                if moved <= self.step_tolerance * scale {
                    return done(p, cost);
                }
                if stall >= self.stall_limit {
                    return Err(self.stall_error(iteration));
                }
            }
        }

        Err(AnalysisError::Convergence {
            iterations: self.max_iterations,
            reason: "iteration cap reached".to_string(),
        })
    }
}

fn clamp(p: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    p.iter()
        .zip(lower.iter().zip(upper))
        .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
        .collect()
}

fn half_sum_squares(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Finite-difference Jacobian (rows: residuals, columns: parameters).
/// Central differences, one-sided where a bound is in the way.
pub(crate) fn numeric_jacobian(
    residuals: &ResidualFn<'_>,
    p: &[f64],
    lower: &[f64],
    upper: &[f64],
) -> DMatrix<f64> {
    let base = residuals(p);
    let mut jac = DMatrix::zeros(base.len(), p.len());
    let mut shifted = p.to_vec();
    for j in 0..p.len() {
        let h = 1e-6 * p[j].abs().max(1.0);
        let up = (p[j] + h).min(upper[j]);
        let down = (p[j] - h).max(lower[j]);
        if up - down <= 0.0 {
            continue;
        }
        shifted[j] = up;
        let r_up = residuals(&shifted);
        shifted[j] = down;
        let r_down = residuals(&shifted);
        shifted[j] = p[j];
        for i in 0..base.len() {
            jac[(i, j)] = (r_up[i] - r_down[i]) / (up - down);
        }
    }
    jac
}

// ============================================================================
// Parameter mapping
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamScale {
    Linear,
    /// Optimised as log10(value). Bounds must be positive.
    Log,
}

/// A named parameter with its starting value and box constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
    pub scale: ParamScale,
}

impl ParamSpec {
    pub const fn linear(name: &'static str, initial: f64, lower: f64, upper: f64) -> Self {
        Self {
            name,
            initial,
            lower,
            upper,
            scale: ParamScale::Linear,
        }
    }

    pub const fn log(name: &'static str, initial: f64, lower: f64, upper: f64) -> Self {
        Self {
            name,
            initial,
            lower,
            upper,
            scale: ParamScale::Log,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite() && self.lower < self.upper) {
            return Err(AnalysisError::InputValidation(format!(
                "parameter {} has invalid bounds [{}, {}]",
                self.name, self.lower, self.upper
            )));
        }
        if !self.initial.is_finite() {
            return Err(AnalysisError::InputValidation(format!(
                "parameter {} has non-finite initial value",
                self.name
            )));
        }
        if self.scale == ParamScale::Log && (self.lower <= 0.0 || self.initial <= 0.0) {
            return Err(AnalysisError::InputValidation(format!(
                "log-scaled parameter {} needs positive bounds and initial value",
                self.name
            )));
        }
        Ok(())
    }

    fn to_internal(&self, value: f64) -> f64 {
        match self.scale {
            ParamScale::Linear => value,
            ParamScale::Log => value.log10(),
        }
    }

    fn to_external(&self, value: f64) -> f64 {
        match self.scale {
            ParamScale::Linear => value,
            ParamScale::Log => 10f64.powf(value),
        }
    }

    /// d(external)/d(internal) at an external value.
    fn derivative(&self, external: f64) -> f64 {
        match self.scale {
            ParamScale::Linear => 1.0,
            ParamScale::Log => external * LN_10,
        }
    }
}

/// Outcome of [`CurveFitter::nonlinear_fit`] in physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearFit {
    pub names: Vec<&'static str>,
    pub params: Vec<f64>,
    /// Parameter covariance, `None` when the problem has no spare degrees
    /// of freedom or JᵀJ is singular.
    pub covariance: Option<DMatrix<f64>>,
    pub sum_squared_residuals: f64,
    pub iterations: usize,
    /// Which parameters finished pinned to a bound.
    pub at_bound: Vec<bool>,
    pub n_points: usize,
}

impl NonlinearFit {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|i| self.params[i])
    }

    /// Euclidean norm of the residual vector.
    pub fn residual_norm(&self) -> f64 {
        self.sum_squared_residuals.sqrt()
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn rmse(&self) -> f64 {
        (self.sum_squared_residuals / self.n_points as f64).sqrt()
    }

    pub fn std_error(&self, name: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| *n == name)?;
        let cov = self.covariance.as_ref()?;
        let v = cov[(i, i)];
        (v.is_finite() && v >= 0.0).then(|| v.sqrt())
    }

    pub fn bounded_parameters(&self) -> Vec<&'static str> {
        self.names
            .iter()
            .zip(&self.at_bound)
            .filter(|(_, b)| **b)
            .map(|(n, _)| *n)
            .collect()
    }
}

/// Nonlinear least-squares front end over an injected [`Optimizer`].
#[derive(Debug, Clone)]
pub struct CurveFitter {
    optimizer: Arc<dyn Optimizer>,
}

impl Default for CurveFitter {
    fn default() -> Self {
        Self::new(Arc::new(LevenbergMarquardt::default()))
    }
}

impl CurveFitter {
    pub fn new(optimizer: Arc<dyn Optimizer>) -> Self {
        Self { optimizer }
    }

    pub fn from_config(config: &FittingConfig) -> Self {
        Self::new(Arc::new(LevenbergMarquardt::new(config)))
    }

    /// Fit `model(x, params)` to `(x, y)` by bounded least squares.
    #[allow(clippy::cast_precision_loss)]
    pub fn nonlinear_fit<M>(
        &self,
        model: M,
        specs: &[ParamSpec],
        x: &[f64],
        y: &[f64],
    ) -> Result<NonlinearFit>
    where
        M: Fn(f64, &[f64]) -> f64,
    {
        if x.len() != y.len() {
            return Err(AnalysisError::InputValidation(format!(
                "x and y lengths differ ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if specs.is_empty() {
            return Err(AnalysisError::InputValidation(
                "nonlinear fit needs at least one parameter".to_string(),
            ));
        }
        if x.len() < specs.len() {
            return Err(AnalysisError::insufficient(
                specs.len(),
                x.len(),
                "nonlinear fit",
            ));
        }
        for spec in specs {
            spec.validate()?;
        }

        let to_external = |q: &[f64]| -> Vec<f64> {
            specs
                .iter()
                .zip(q)
                .map(|(s, v)| s.to_external(*v))
                .collect()
        };
        let residuals = |q: &[f64]| -> Vec<f64> {
            let ext = to_external(q);
            x.iter()
                .zip(y)
                .map(|(xi, yi)| model(*xi, &ext) - yi)
                .collect()
        };

        let start: Vec<f64> = specs
            .iter()
            .map(|s| s.to_internal(s.initial.clamp(s.lower, s.upper)))
            .collect();
        let lower: Vec<f64> = specs.iter().map(|s| s.to_internal(s.lower)).collect();
        let upper: Vec<f64> = specs.iter().map(|s| s.to_internal(s.upper)).collect();

        let outcome = self
            .optimizer
            .minimize(&residuals, &start, &lower, &upper)?;

        let params = to_external(&outcome.params);
        let ssr = 2.0 * outcome.cost;
        let n = x.len();
        let k = specs.len();

        let covariance = if n > k {
            let jac = numeric_jacobian(&residuals, &outcome.params, &lower, &upper);
            let jtj = jac.transpose() * &jac;
            jtj.cholesky().map(|c| {
                let sigma2 = ssr / (n - k) as f64;
                let inv = c.inverse();
                let d: Vec<f64> = specs
                    .iter()
                    .zip(&params)
                    .map(|(s, v)| s.derivative(*v))
                    .collect();
                DMatrix::from_fn(k, k, |i, j| sigma2 * inv[(i, j)] * d[i] * d[j])
            })
        } else {
            None
        };

        let at_bound = outcome
            .params
            .iter()
            .zip(lower.iter().zip(&upper))
            .map(|(v, (lo, hi))| {
                let tol = 1e-6 * (hi - lo);
                (v - lo).abs() <= tol || (hi - v).abs() <= tol
            })
            .collect();

        debug!(
            iterations = outcome.iterations,
            ssr,
            params = ?params,
            "nonlinear fit finished"
        );

        Ok(NonlinearFit {
            names: specs.iter().map(|s| s.name).collect(),
            params,
            covariance,
            sum_squared_residuals: ssr,
            iterations: outcome.iterations,
            at_bound,
            n_points: n,
        })
    }
}

// ============================================================================
// Ordinary least squares
// ============================================================================

/// Straight-line regression summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub slope_std_error: f64,
    /// Two-sided p-value for slope = 0.
    pub p_value: f64,
    pub n: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope.mul_add(x, self.intercept)
    }
}

/// OLS of `y` on `x`. Needs at least 3 points and some spread in `x`.
#[allow(clippy::cast_precision_loss)]
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(AnalysisError::InputValidation(format!(
            "x and y lengths differ ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 3 {
        return Err(AnalysisError::insufficient(3, n, "linear regression"));
    }
    let nf = n as f64;
    let mx = x.iter().sum::<f64>() / nf;
    let my = y.iter().sum::<f64>() / nf;
    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    if sxx <= f64::EPSILON * mx.abs().max(1.0) * nf {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            actual: 1,
            context: "linear regression (all x values are identical)".to_string(),
        });
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let syy: f64 = y.iter().map(|v| (v - my).powi(2)).sum();

    let slope = sxy / sxx;
    let intercept = slope.mul_add(-mx, my);
    let ssr: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - slope.mul_add(*a, intercept)).powi(2))
        .sum();
    let r_squared = if syy > 0.0 { 1.0 - ssr / syy } else { 1.0 };

    let dof = nf - 2.0;
    let slope_std_error = (ssr / dof / sxx).sqrt();
    let p_value = if slope_std_error <= f64::MIN_POSITIVE {
        if slope == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        let t = slope / slope_std_error;
        match StudentsT::new(0.0, 1.0, dof) {
            Ok(dist) => 2.0 * dist.cdf(-t.abs()),
            Err(_) => f64::NAN,
        }
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        slope_std_error,
        p_value,
        n,
    })
}

/// OLS of `y` on `log10(x)` (semi-log straight line). `x` must be positive.
pub fn loglinear_fit(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if let Some(i) = x.iter().position(|v| *v <= 0.0) {
        return Err(AnalysisError::InputValidation(format!(
            "log-linear regression needs x > 0, got x[{i}] = {}",
            x[i]
        )));
    }
    let lx: Vec<f64> = x.iter().map(|v| v.log10()).collect();
    linear_fit(&lx, y).map_err(|e| match e {
        AnalysisError::InsufficientData {
            required, actual, ..
        } => AnalysisError::InsufficientData {
            required,
            actual,
            context: "log-linear regression".to_string(),
        },
        other => other,
    })
}
