//! Batch runner integration tests
//!
//! Requests arrive as JSON, run in parallel and come back in input order
//! with per-job errors kept separate.

use hydroai::batch::analyze_and_validate;
use hydroai::{
    analyze_batch, AnalysisConfig, AnalysisError, AnalysisRequest, ParameterRecommender,
    TestKind, ValidationEngine, ValidationStatus,
};

const REQUESTS: &str = r#"[
    {
        "id": "pw-1",
        "method": "theis",
        "series": {
            "x": [10, 50, 100, 500, 1000],
            "y": [0.020, 0.045, 0.062, 0.115, 0.145],
            "provenance": {"source": "PW-1 / PZ-2", "x_unit": "s", "y_unit": "m"}
        },
        "test": {"pumping_rate": 0.001, "distance": 50.0}
    },
    {
        "id": "flat",
        "method": "theis",
        "series": {"x": [10, 50, 100, 500], "y": [0, 0, 0, 0]},
        "test": {"pumping_rate": 0.001, "distance": 50.0}
    },
    {
        "id": "packer-3",
        "method": "lugeon",
        "series": {"x": [5, 7.5, 10, 7.5, 5], "y": [5, 7.5, 10, 7.5, 5]},
        "test": {"test_length": 5.0}
    },
    {
        "id": "pz-7",
        "method": "piezometric",
        "series": {"x": [0, 1, 2, 3, 4, 5, 6, 7], "y": [5.0, 4.9, 4.8, 4.7, 4.6, 4.5, 4.4, 4.3]}
    }
]"#;

fn requests() -> Vec<AnalysisRequest> {
    serde_json::from_str(REQUESTS).unwrap()
}

#[test]
fn outcomes_follow_input_order_and_isolate_failures() {
    let outcomes = analyze_batch(&requests(), &AnalysisConfig::default());

    let ids: Vec<_> = outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, ["pw-1", "flat", "packer-3", "pz-7"]);
    let kinds: Vec<_> = outcomes.iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        [TestKind::Theis, TestKind::Theis, TestKind::Lugeon, TestKind::Piezometric]
    );

    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(AnalysisError::DegenerateData(_))
    ));
    let lugeon = outcomes[2].result.as_ref().unwrap();
    assert!((lugeon.parameter("lugeon").unwrap() - 2.0).abs() < 1e-9);
    assert!(outcomes[3].result.is_ok());
}

#[test]
fn batch_matches_sequential_runs() {
    let reqs = requests();
    let config = AnalysisConfig::default();
    let parallel = analyze_batch(&reqs, &config);
    for (req, outcome) in reqs.iter().zip(&parallel) {
        let single = analyze_batch(std::slice::from_ref(req), &config);
        assert_eq!(single[0], *outcome, "job {}", req.id);
    }
}

#[test]
fn successful_fits_are_validated_against_lithology() {
    let config = AnalysisConfig::default();
    let engine = ValidationEngine::new(config.validation.clone()).unwrap();
    let sand = ParameterRecommender::recommend_from_lithology("sand").unwrap();

    let results = analyze_and_validate(&requests(), &config, &engine, Some(&sand));
    assert_eq!(results.len(), 4);

    let (outcome, report) = &results[0];
    assert!(outcome.result.is_ok());
    let report = report.as_ref().unwrap();
    assert_ne!(report.status, ValidationStatus::Blocked, "{report:?}");
    assert!(report.confidence > 0.0);

    // Failed jobs carry no report
    assert!(results[1].1.is_none());
}

#[test]
fn unknown_method_is_rejected_at_parse() {
    let json = r#"{"id": "x", "method": "slug_test", "series": {"x": [1, 2], "y": [1, 2]}}"#;
    assert!(serde_json::from_str::<AnalysisRequest>(json).is_err());
}
