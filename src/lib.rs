//! HydroAI: aquifer test analysis with an explainable advisory layer
//!
//! Estimates transmissivity, storativity and hydraulic conductivity from
//! field-test records, and checks inputs and results with deterministic,
//! auditable rules.
//!
//! ## Architecture
//!
//! - **Analyzers**: Theis, Cooper-Jacob, Lefranc, Lugeon, Porchet,
//!   piezometric trend and recovery, behind the `TestAnalyzer` trait
//! - **Numerics**: well function W(u), bounded Levenberg-Marquardt behind an
//!   injectable `Optimizer`, OLS regression, descriptive statistics
//! - **Advisory**: anomaly screens, lithology recommendations, validation
//!   rule table with confidence scoring
//! - **Batch**: parallel execution of independent analyses
//!
//! Every call is pure: configuration goes in explicitly and nothing is
//! shared between calls.

pub mod advisory;
pub mod analyzers;
pub mod batch;
pub mod config;
pub mod error;
pub mod numerics;
pub mod types;

// Re-export configuration
pub use config::AnalysisConfig;

// Re-export errors
pub use error::{AnalysisError, Result};

// Re-export commonly used types
pub use types::{
    Anomaly, DataQualityReport, DetectionMethod, FitResult, FitResultBuilder, Issue,
    LithologyProfile, NumericSeries, Provenance, Severity, TestKind, ValidationReport,
    ValidationStatus, ZScoreMode,
};

// Re-export test constants
pub use types::{
    CavityGeometry, CooperJacobTest, LefrancMethod, LefrancTest, LugeonTest, PorchetTest,
    PumpingTest, TheisTest,
};

// Re-export analyzers
pub use analyzers::{
    drawdown_derivative, CooperJacobAnalyzer, LefrancAnalyzer, LugeonAnalyzer,
    PiezometricAnalyzer, PorchetAnalyzer, RecoveryAnalyzer, TestAnalyzer, TheisAnalyzer,
};

// Re-export numerics
pub use numerics::{well_function, CurveFitter, LevenbergMarquardt, Optimizer, WellFunctionEvaluator};

// Re-export advisory components
pub use advisory::{
    AnomalyDetector, ParameterRecommender, ParameterSet, ValidationEngine, ValidationInput,
};

// Re-export batch entry points
pub use batch::{analyze_batch, AnalysisJob, AnalysisRequest, BatchOutcome};
