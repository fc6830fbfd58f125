//! Numerical building blocks: the Theis well function, curve fitting and
//! descriptive statistics.

pub mod curve_fit;
pub mod stats;
pub mod well_function;

pub use curve_fit::{
    linear_fit, loglinear_fit, CurveFitter, LevenbergMarquardt, LinearFit, NonlinearFit,
    Optimizer, OptimizerOutcome, ParamScale, ParamSpec,
};
pub use well_function::{well_function, WellFunctionEvaluator};
