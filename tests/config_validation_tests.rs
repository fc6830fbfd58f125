//! Config Validation Tests
//!
//! Typo detection on raw TOML, range checks on parsed configs and the file
//! loading path, exercised independently from the analyzers.

use std::io::Write;

use hydroai::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use hydroai::config::{AnalysisConfig, ConfigError, CONFIG_ENV_VAR};
use hydroai::ZScoreMode;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_lugeon_section_warns_with_suggestion() {
    let toml_str = r#"
[lugeon]
divergance_threshold = 0.3
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("divergance_threshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("lugeon.divergence_threshold")
    );
}

#[test]
fn unknown_section_warns() {
    let toml_str = r#"
[drilling]
bit_size = 8.5
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(
        warnings.iter().any(|w| w.field == "drilling"),
        "{warnings:?}"
    );
}

#[test]
fn multiple_typos_all_warned() {
    let toml_str = r#"
[theis]
noise_flor_m = 0.001

[anomaly]
z_treshold = 3.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2, "{warnings:?}");
    let suggestions: Vec<_> = warnings.iter().filter_map(|w| w.suggestion.as_deref()).collect();
    assert!(suggestions.contains(&"theis.noise_floor_m"));
    assert!(suggestions.contains(&"anomaly.z_threshold"));
}

#[test]
fn valid_partial_config_produces_zero_warnings() {
    let toml_str = r#"
[fitting]
max_iterations = 300

[anomaly]
z_threshold = 2.5
z_mode = "robust"
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn empty_toml_produces_zero_warnings() {
    assert!(validate_unknown_keys("").is_empty());
}

#[test]
fn known_keys_cover_every_section() {
    let known = known_config_keys();
    for section in [
        "fitting",
        "theis",
        "cooper_jacob",
        "lefranc",
        "lugeon",
        "porchet",
        "piezometric",
        "recovery",
        "anomaly",
        "precheck",
        "validation",
    ] {
        assert!(known.contains(section), "missing section {section}");
    }
    assert!(known.contains("lugeon.reference_pressure_bar"));
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("zzzzzzzzzzzzzz", &known), None);
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn all_defaults_pass_validation() {
    let config = AnalysisConfig::default();
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty(), "{warnings:?}");
    config.validate().unwrap();
}

#[test]
fn storativity_of_one_is_error() {
    let mut config = AnalysisConfig::default();
    config.theis.default_storativity = 1.0;
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("default_storativity")), "{errors:?}");
}

#[test]
fn metre_noise_floor_is_warning_not_error() {
    let mut config = AnalysisConfig::default();
    config.lefranc.noise_floor_m = 0.5;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "lefranc.noise_floor_m"));
    config.validate().unwrap();
}

#[test]
fn validate_rejects_inverted_bounds_and_zero_iterations() {
    let mut config = AnalysisConfig::default();
    config.theis.transmissivity_min = 1.0;
    config.theis.transmissivity_max = 1e-3;
    config.fitting.max_iterations = 0;
    let Err(ConfigError::Validation(errors)) = config.validate() else {
        panic!("expected validation error");
    };
    assert!(errors.iter().any(|e| e.contains("theis.transmissivity")), "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("fitting.max_iterations")), "{errors:?}");
}

#[test]
fn parse_rejects_negative_threshold() {
    let err = AnalysisConfig::from_toml_str(
        r#"
[anomaly]
z_threshold = -1.0
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "{err}");
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn config_file_roundtrip_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hydroai.toml");

    let mut config = AnalysisConfig::default();
    config.lugeon.divergence_threshold = 0.4;
    config.anomaly.z_mode = ZScoreMode::Robust;
    config.save_to_file(&path).unwrap();

    let loaded = AnalysisConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AnalysisConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)), "{err}");
}

#[test]
fn parse_error_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[theis\nnoise_floor_m = ").unwrap();
    let err = AnalysisConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn env_var_points_load_at_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[piezometric]\ntime_units_per_year = 52.0").unwrap();

    // Only test in this binary that touches the environment.
    std::env::set_var(CONFIG_ENV_VAR, file.path());
    let config = AnalysisConfig::load();
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.piezometric.time_units_per_year, 52.0);
    assert_eq!(config.theis, AnalysisConfig::default().theis);
}
