//! Batch analysis
//!
//! A request names the method and carries the series plus test constants.
//! Independent requests run on the rayon pool, one whole analyzer call per
//! task; a single fit is never split across threads.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::advisory::validation_engine::keys;
use crate::advisory::{ParameterSet, ValidationEngine, ValidationInput};
use crate::analyzers::{
    CooperJacobAnalyzer, LefrancAnalyzer, LugeonAnalyzer, PiezometricAnalyzer, PorchetAnalyzer,
    RecoveryAnalyzer, TestAnalyzer, TheisAnalyzer,
};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::types::{
    FitResult, LefrancTest, LithologyProfile, LugeonTest, NumericSeries, PorchetTest, PumpingTest, TestKind,
    ValidationReport,
};

/// One analysis to run, tagged by method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AnalysisJob {
    Theis {
        series: NumericSeries,
        test: PumpingTest,
    },
    CooperJacob {
        series: NumericSeries,
        test: PumpingTest,
    },
    Lefranc {
        series: NumericSeries,
        test: LefrancTest,
    },
    Lugeon {
        series: NumericSeries,
        test: LugeonTest,
    },
    Porchet {
        series: NumericSeries,
        test: PorchetTest,
    },
    Piezometric {
        series: NumericSeries,
    },
    Recovery {
        series: NumericSeries,
    },
}

impl AnalysisJob {
    pub const fn kind(&self) -> TestKind {
        match self {
            Self::Theis { .. } => TestKind::Theis,
            Self::CooperJacob { .. } => TestKind::CooperJacob,
            Self::Lefranc { .. } => TestKind::Lefranc,
            Self::Lugeon { .. } => TestKind::Lugeon,
            Self::Porchet { .. } => TestKind::Porchet,
            Self::Piezometric { .. } => TestKind::Piezometric,
            Self::Recovery { .. } => TestKind::Recovery,
        }
    }

    pub fn series(&self) -> &NumericSeries {
        match self {
            Self::Theis { series, .. }
            | Self::CooperJacob { series, .. }
            | Self::Lefranc { series, .. }
            | Self::Lugeon { series, .. }
            | Self::Porchet { series, .. }
            | Self::Piezometric { series }
            | Self::Recovery { series } => series,
        }
    }

    pub fn run(&self, analyzers: &Analyzers) -> Result<FitResult> {
        match self {
            Self::Theis { series, test } => analyzers.theis.analyze(series, test),
            Self::CooperJacob { series, test } => analyzers.cooper_jacob.analyze(series, test),
            Self::Lefranc { series, test } => analyzers.lefranc.analyze(series, test),
            Self::Lugeon { series, test } => analyzers.lugeon.analyze(series, test),
            Self::Porchet { series, test } => analyzers.porchet.analyze(series, test),
            Self::Piezometric { series } => analyzers.piezometric.analyze(series, &()),
            Self::Recovery { series } => analyzers.recovery.analyze(series, &()),
        }
    }

    /// Validation input for a fit of this job: the fitted parameters, the
    /// observation window and, for pumping tests, Q and r.
    pub fn validation_input(&self, fit: &FitResult) -> ValidationInput {
        let mut params = ParameterSet::from_fit(fit);
        if let Self::Theis { test, .. } | Self::CooperJacob { test, .. } = self {
            params.insert(keys::Q, test.pumping_rate());
            params.insert(keys::R, test.distance());
        }
        ValidationInput::new(params).with_method(self.kind())
    }
}

/// A job with a caller-chosen identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub job: AnalysisJob,
}

/// One analyzer per method, all built from the same configuration.
#[derive(Debug, Clone, Default)]
pub struct Analyzers {
    pub theis: TheisAnalyzer,
    pub cooper_jacob: CooperJacobAnalyzer,
    pub lefranc: LefrancAnalyzer,
    pub lugeon: LugeonAnalyzer,
    pub porchet: PorchetAnalyzer,
    pub piezometric: PiezometricAnalyzer,
    pub recovery: RecoveryAnalyzer,
}

impl Analyzers {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            theis: TheisAnalyzer::new(config),
            cooper_jacob: CooperJacobAnalyzer::new(config),
            lefranc: LefrancAnalyzer::new(config),
            lugeon: LugeonAnalyzer::new(config),
            porchet: PorchetAnalyzer::new(config),
            piezometric: PiezometricAnalyzer::new(config),
            recovery: RecoveryAnalyzer::new(config),
        }
    }
}

/// Result of one batch entry. A failed job does not affect the others.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub id: String,
    pub kind: TestKind,
    pub result: Result<FitResult>,
}

/// Run every request in parallel. Output order matches input order.
pub fn analyze_batch(requests: &[AnalysisRequest], config: &AnalysisConfig) -> Vec<BatchOutcome> {
    let analyzers = Analyzers::new(config);
    let outcomes: Vec<BatchOutcome> = requests
        .par_iter()
        .map(|req| {
            let result = req.job.run(&analyzers);
            if let Err(e) = &result {
                warn!(id = %req.id, kind = %req.job.kind(), error = %e, "Batch job failed");
            }
            BatchOutcome {
                id: req.id.clone(),
                kind: req.job.kind(),
                result,
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(jobs = outcomes.len(), failed, "Batch analysis complete");
    outcomes
}

/// Run a batch and validate every successful fit with `engine`, range
/// checked against `lithology` when given.
pub fn analyze_and_validate(
    requests: &[AnalysisRequest],
    config: &AnalysisConfig,
    engine: &ValidationEngine,
    lithology: Option<&LithologyProfile>,
) -> Vec<(BatchOutcome, Option<ValidationReport>)> {
    analyze_batch(requests, config)
        .into_iter()
        .zip(requests)
        .map(|(outcome, req)| {
            let report = outcome.result.as_ref().ok().map(|fit| {
                let input = req.job.validation_input(fit);
                let input = match lithology {
                    Some(profile) => input.with_lithology(profile.clone()),
                    None => input,
                };
                engine.validate(&input)
            });
            (outcome, report)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "id": "pz-1",
            "method": "piezometric",
            "series": {"x": [0, 1, 2, 3], "y": [5.0, 4.9, 4.8, 4.7]}
        }"#;
        let req: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.id, "pz-1");
        assert_eq!(req.job.kind(), TestKind::Piezometric);
        assert_eq!(req.job.series().len(), 4);
    }

    #[test]
    fn test_invalid_test_constants_rejected_at_parse() {
        let json = r#"{
            "method": "theis",
            "series": {"x": [1, 2, 3], "y": [0.1, 0.2, 0.3]},
            "test": {"pumping_rate": -1.0, "distance": 10.0}
        }"#;
        assert!(serde_json::from_str::<AnalysisRequest>(json).is_err());
    }

    #[test]
    fn test_validation_input_carries_pumping_constants() {
        let series = NumericSeries::new(vec![10.0, 100.0, 1000.0], vec![0.1, 0.2, 0.3]).unwrap();
        let job = AnalysisJob::CooperJacob {
            series,
            test: PumpingTest::new(2e-3, 25.0).unwrap(),
        };
        let fit = job.run(&Analyzers::default()).unwrap();
        let input = job.validation_input(&fit);
        assert_eq!(input.get(keys::Q), Some(2e-3));
        assert_eq!(input.get(keys::R), Some(25.0));
        assert_eq!(input.get(keys::T_MAX), Some(1000.0));
        assert_eq!(input.method(), Some(TestKind::CooperJacob));
    }
}
