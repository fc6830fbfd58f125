//! Error taxonomy shared by every analyzer and advisory component.
//!
//! Errors are raised where they are detected and never retried internally.
//! Soft problems (poor fit, suspicious stages, out-of-range advice) are not
//! errors: they accumulate as warnings on the returned result.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// Malformed caller input: mismatched lengths, non-positive physical
    /// constants, non-finite values, too few points.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Input that is well-formed but carries no usable signal
    /// (e.g. a flat drawdown curve below the noise floor).
    #[error("Degenerate data: {0}")]
    DegenerateData(String),

    /// The iterative optimizer gave up.
    #[error("Fit did not converge after {iterations} iterations: {reason}")]
    Convergence { iterations: usize, reason: String },

    /// Not enough distinct points for the requested regression or method.
    #[error("Insufficient data for {context}: need {required}, got {actual}")]
    InsufficientData {
        required: usize,
        actual: usize,
        context: String,
    },

    /// Lithology name not present in the catalog.
    #[error("Unknown lithology '{name}' (available: {})", available.join(", "))]
    UnknownLithology { name: String, available: Vec<String> },

    /// Mathematical domain violation (e.g. well function at u <= 0).
    #[error("Domain error: {0}")]
    Domain(String),
}

impl AnalysisError {
    /// Short machine-stable tag, used in CLI output and logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InputValidation(_) => "input_validation",
            Self::DegenerateData(_) => "degenerate_data",
            Self::Convergence { .. } => "convergence",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::UnknownLithology { .. } => "unknown_lithology",
            Self::Domain(_) => "domain",
        }
    }

    pub(crate) fn insufficient(required: usize, actual: usize, context: &str) -> Self {
        Self::InsufficientData {
            required,
            actual,
            context: context.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_lithology_lists_available_names() {
        let err = AnalysisError::UnknownLithology {
            name: "basalt".to_string(),
            available: vec!["gravel".to_string(), "sand".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("basalt"));
        assert!(msg.contains("gravel, sand"), "got: {msg}");
        assert_eq!(err.kind(), "unknown_lithology");
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = AnalysisError::insufficient(3, 2, "log-linear regression");
        assert_eq!(
            err.to_string(),
            "Insufficient data for log-linear regression: need 3, got 2"
        );
    }
}
