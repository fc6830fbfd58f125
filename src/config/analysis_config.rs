//! Analysis Configuration - every numeric threshold as an operator-tunable TOML value
//!
//! Each section implements `Default` with the values used when no config
//! file is present. Configuration is passed explicitly to analyzers and
//! advisory engines; nothing here is global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::ZScoreMode;

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV_VAR: &str = "HYDROAI_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "hydroai.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for the analysis engine and advisory layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub fitting: FittingConfig,
    pub theis: TheisConfig,
    pub cooper_jacob: CooperJacobConfig,
    pub lefranc: LefrancConfig,
    pub lugeon: LugeonConfig,
    pub porchet: PorchetConfig,
    pub piezometric: PiezometricConfig,
    pub recovery: RecoveryConfig,
    pub anomaly: AnomalyConfig,
    pub precheck: PrecheckConfig,
    pub validation: ValidationConfig,
}

// ============================================================================
// Sections
// ============================================================================

/// Levenberg-Marquardt settings shared by every nonlinear fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FittingConfig {
    pub max_iterations: usize,
    /// Consecutive non-improving iterations before giving up.
    pub stall_limit: usize,
    pub initial_lambda: f64,
    /// Relative cost reduction below which an accepted step ends the fit.
    pub function_tolerance: f64,
    /// Relative parameter step below which the fit ends.
    pub step_tolerance: f64,
    pub gradient_tolerance: f64,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            stall_limit: 20,
            initial_lambda: 1e-3,
            function_tolerance: 1e-12,
            step_tolerance: 1e-10,
            gradient_tolerance: 1e-15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TheisConfig {
    /// Drawdowns entirely below this [m] carry no signal.
    pub noise_floor_m: f64,
    /// Seed used when the Cooper-Jacob estimate is unavailable.
    pub default_transmissivity: f64,
    pub default_storativity: f64,
    pub transmissivity_min: f64,
    pub transmissivity_max: f64,
    pub storativity_min: f64,
    pub storativity_max: f64,
    /// Goodness of fit below this adds a warning.
    pub poor_fit_threshold: f64,
}

impl Default for TheisConfig {
    fn default() -> Self {
        Self {
            noise_floor_m: 1e-4,
            default_transmissivity: 1e-3,
            default_storativity: 1e-4,
            transmissivity_min: 1e-9,
            transmissivity_max: 1e2,
            storativity_min: 1e-9,
            storativity_max: 0.5,
            poor_fit_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooperJacobConfig {
    /// Share of the record (latest points) used for the straight line.
    pub late_time_fraction: f64,
    /// Below this many points the whole record is used.
    pub min_points_for_split: usize,
    /// The approximation is trusted while u stays below this.
    pub validity_u_max: f64,
}

impl Default for CooperJacobConfig {
    fn default() -> Self {
        Self {
            late_time_fraction: 0.5,
            min_points_for_split: 6,
            validity_u_max: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LefrancConfig {
    pub noise_floor_m: f64,
    pub tau_min_s: f64,
    pub tau_max_s: f64,
    pub poor_fit_threshold: f64,
}

impl Default for LefrancConfig {
    fn default() -> Self {
        Self {
            noise_floor_m: 1e-3,
            tau_min_s: 1e-2,
            tau_max_s: 1e8,
            poor_fit_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LugeonConfig {
    pub reference_pressure_bar: f64,
    /// Stages within this of the reference pressure feed the reference mean.
    pub reference_tolerance_bar: f64,
    /// Hydraulic conductivity of one Lugeon unit [m/s].
    pub lugeon_to_ms: f64,
    /// Relative ascending/descending Lugeon divergence that raises a warning.
    pub divergence_threshold: f64,
    /// Relative spread below which all stages count as laminar.
    pub laminar_tolerance: f64,
    pub nominal_stages: usize,
}

impl Default for LugeonConfig {
    fn default() -> Self {
        Self {
            reference_pressure_bar: 10.0,
            reference_tolerance_bar: 1.0,
            lugeon_to_ms: 1e-7,
            divergence_threshold: 0.25,
            laminar_tolerance: 0.2,
            nominal_stages: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PorchetConfig {
    pub noise_floor_m: f64,
    pub conductivity_min: f64,
    pub conductivity_max: f64,
    pub poor_fit_threshold: f64,
}

impl Default for PorchetConfig {
    fn default() -> Self {
        Self {
            noise_floor_m: 1e-3,
            conductivity_min: 1e-10,
            conductivity_max: 1e-1,
            poor_fit_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiezometricConfig {
    /// |slope|·span/std at or above which the record is trending.
    pub trend_strength_threshold: f64,
    pub min_trend_r_squared: f64,
    /// Lag-1 autocorrelation of detrended levels that marks a cycle.
    pub cyclic_autocorrelation: f64,
    pub min_mean_crossings: usize,
    /// Standard deviation treated as zero (flat record).
    pub flat_std_epsilon: f64,
    /// Time units per year, for the annualised slope (365.25 for days).
    pub time_units_per_year: f64,
}

impl Default for PiezometricConfig {
    fn default() -> Self {
        Self {
            trend_strength_threshold: 1.5,
            min_trend_r_squared: 0.5,
            cyclic_autocorrelation: 0.5,
            min_mean_crossings: 2,
            flat_std_epsilon: 1e-9,
            time_units_per_year: 365.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub noise_floor_m: f64,
    pub alpha_min: f64,
    pub alpha_max: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            noise_floor_m: 1e-3,
            alpha_min: 1e-9,
            alpha_max: 1e3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub z_threshold: f64,
    pub z_mode: ZScoreMode,
    pub iqr_multiplier: f64,
    /// Nearest-neighbour distance, as a multiple of the median, that isolates a point.
    pub spatial_factor: f64,
    pub spatial_neighbors: usize,
    pub spatial_value_sigma: f64,
    /// z threshold used by the multi-series quality check.
    pub quality_z_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            z_mode: ZScoreMode::Population,
            iqr_multiplier: 1.5,
            spatial_factor: 3.0,
            spatial_neighbors: 5,
            spatial_value_sigma: 3.0,
            quality_z_threshold: 2.5,
        }
    }
}

/// Optional anomaly screen run by analyzers before fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecheckConfig {
    pub enabled: bool,
    pub z_threshold: f64,
    pub z_mode: ZScoreMode,
}

impl Default for PrecheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            z_threshold: 3.0,
            z_mode: ZScoreMode::Robust,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub info_penalty: f64,
    pub warning_penalty: f64,
    pub fatal_penalty: f64,
    /// T above this [m²/s] is unusually high.
    pub transmissivity_high: f64,
    pub storativity_low: f64,
    /// Theis u at the last observation above this: record too short.
    pub theis_u_max: f64,
    /// Theis u at the last observation below this: record very long.
    pub theis_u_min: f64,
    pub cooper_jacob_u_max: f64,
    /// Predicted drawdown [m] at r and t_max above which Q looks implausible.
    pub max_predicted_drawdown_m: f64,
    /// S/porosity below this reads as strongly confined.
    pub confined_ratio: f64,
    /// S/porosity above this reads as unconfined.
    pub unconfined_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            info_penalty: 0.0,
            warning_penalty: 0.05,
            fatal_penalty: 1.0,
            transmissivity_high: 1e-2,
            storativity_low: 1e-6,
            theis_u_max: 10.0,
            theis_u_min: 1e-4,
            cooper_jacob_u_max: 0.05,
            max_predicted_drawdown_m: 50.0,
            confined_ratio: 1e-6,
            unconfined_ratio: 0.1,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl AnalysisConfig {
    /// Load configuration using the standard search order:
    /// 1. `$HYDROAI_CONFIG` environment variable
    /// 2. `./hydroai.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded analysis config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded analysis config from ./{DEFAULT_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{DEFAULT_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {DEFAULT_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<string>"), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Analysis config saved");
        Ok(())
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Reject impossible settings. Suspicious-but-legal values are logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let f = &self.fitting;
        if f.max_iterations == 0 {
            errors.push("fitting.max_iterations must be > 0".to_string());
        }
        if f.stall_limit == 0 {
            errors.push("fitting.stall_limit must be > 0".to_string());
        }
        Self::check_positive(f.initial_lambda, "fitting.initial_lambda", &mut errors);
        Self::check_non_negative(f.function_tolerance, "fitting.function_tolerance", &mut errors);
        Self::check_non_negative(f.step_tolerance, "fitting.step_tolerance", &mut errors);
        Self::check_non_negative(f.gradient_tolerance, "fitting.gradient_tolerance", &mut errors);

        let t = &self.theis;
        Self::check_positive(t.noise_floor_m, "theis.noise_floor_m", &mut errors);
        Self::check_bounds(t.transmissivity_min, t.transmissivity_max, "theis.transmissivity", &mut errors);
        Self::check_bounds(t.storativity_min, t.storativity_max, "theis.storativity", &mut errors);
        if t.storativity_max >= 1.0 {
            errors.push(format!(
                "theis.storativity_max ({}) must be < 1",
                t.storativity_max
            ));
        }
        Self::check_positive(t.default_transmissivity, "theis.default_transmissivity", &mut errors);
        Self::check_positive(t.default_storativity, "theis.default_storativity", &mut errors);

        let cj = &self.cooper_jacob;
        Self::check_fraction(cj.late_time_fraction, "cooper_jacob.late_time_fraction", &mut errors);
        Self::check_positive(cj.validity_u_max, "cooper_jacob.validity_u_max", &mut errors);
        if cj.min_points_for_split < 3 {
            errors.push("cooper_jacob.min_points_for_split must be >= 3".to_string());
        }

        Self::check_positive(self.lefranc.noise_floor_m, "lefranc.noise_floor_m", &mut errors);
        Self::check_bounds(self.lefranc.tau_min_s, self.lefranc.tau_max_s, "lefranc.tau", &mut errors);

        let l = &self.lugeon;
        Self::check_positive(l.reference_pressure_bar, "lugeon.reference_pressure_bar", &mut errors);
        Self::check_non_negative(l.reference_tolerance_bar, "lugeon.reference_tolerance_bar", &mut errors);
        Self::check_positive(l.lugeon_to_ms, "lugeon.lugeon_to_ms", &mut errors);
        Self::check_positive(l.divergence_threshold, "lugeon.divergence_threshold", &mut errors);
        Self::check_positive(l.laminar_tolerance, "lugeon.laminar_tolerance", &mut errors);
        if l.nominal_stages < 3 {
            errors.push("lugeon.nominal_stages must be >= 3".to_string());
        }

        Self::check_positive(self.porchet.noise_floor_m, "porchet.noise_floor_m", &mut errors);
        Self::check_bounds(
            self.porchet.conductivity_min,
            self.porchet.conductivity_max,
            "porchet.conductivity",
            &mut errors,
        );

        let p = &self.piezometric;
        Self::check_positive(p.trend_strength_threshold, "piezometric.trend_strength_threshold", &mut errors);
        Self::check_fraction(p.min_trend_r_squared, "piezometric.min_trend_r_squared", &mut errors);
        Self::check_fraction(p.cyclic_autocorrelation, "piezometric.cyclic_autocorrelation", &mut errors);
        Self::check_non_negative(p.flat_std_epsilon, "piezometric.flat_std_epsilon", &mut errors);
        Self::check_positive(p.time_units_per_year, "piezometric.time_units_per_year", &mut errors);

        Self::check_positive(self.recovery.noise_floor_m, "recovery.noise_floor_m", &mut errors);
        Self::check_bounds(self.recovery.alpha_min, self.recovery.alpha_max, "recovery.alpha", &mut errors);

        let a = &self.anomaly;
        Self::check_positive(a.z_threshold, "anomaly.z_threshold", &mut errors);
        Self::check_positive(a.iqr_multiplier, "anomaly.iqr_multiplier", &mut errors);
        Self::check_positive(a.spatial_factor, "anomaly.spatial_factor", &mut errors);
        Self::check_positive(a.spatial_value_sigma, "anomaly.spatial_value_sigma", &mut errors);
        Self::check_positive(a.quality_z_threshold, "anomaly.quality_z_threshold", &mut errors);
        if a.spatial_neighbors == 0 {
            errors.push("anomaly.spatial_neighbors must be > 0".to_string());
        }
        Self::check_positive(self.precheck.z_threshold, "precheck.z_threshold", &mut errors);

        // Penalties must not decrease with severity
        let v = &self.validation;
        Self::check_non_negative(v.info_penalty, "validation.info_penalty", &mut errors);
        Self::check_escalation(v.info_penalty, v.warning_penalty, "validation.info/warning_penalty", &mut errors);
        Self::check_escalation(v.warning_penalty, v.fatal_penalty, "validation.warning/fatal_penalty", &mut errors);
        Self::check_bounds(v.theis_u_min, v.theis_u_max, "validation.theis_u", &mut errors);
        Self::check_bounds(v.confined_ratio, v.unconfined_ratio, "validation.storage_ratio", &mut errors);
        Self::check_positive(v.max_predicted_drawdown_m, "validation.max_predicted_drawdown_m", &mut errors);

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if let Ok(value) = toml::Value::try_from(self) {
            for key in super::validation::non_finite_keys(&value, "") {
                errors.push(format!("{key} must be a finite number"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value.is_finite() && value > 0.0) {
            errors.push(format!("{name} must be > 0 (got {value})"));
        }
    }

    fn check_non_negative(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value.is_finite() && value >= 0.0) {
            errors.push(format!("{name} must be >= 0 (got {value})"));
        }
    }

    fn check_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value.is_finite() && value > 0.0 && value <= 1.0) {
            errors.push(format!("{name} must be in (0, 1] (got {value})"));
        }
    }

    fn check_bounds(min: f64, max: f64, name: &str, errors: &mut Vec<String>) {
        if !min.is_finite() || !max.is_finite() {
            errors.push(format!(
                "{name}: bounds must be finite (got min={min}, max={max})"
            ));
            return;
        }
        if min <= 0.0 {
            errors.push(format!("{name}: min ({min:e}) must be > 0"));
        }
        if min >= max {
            errors.push(format!("{name}: min ({min:e}) must be < max ({max:e})"));
        }
    }

    fn check_escalation(lower: f64, higher: f64, name: &str, errors: &mut Vec<String>) {
        if !lower.is_finite() || !higher.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got {lower}, {higher})"
            ));
            return;
        }
        if higher < lower {
            errors.push(format!(
                "{name}: higher severity ({higher:.3}) must be >= lower severity ({lower:.3})"
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = AnalysisConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AnalysisConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let parsed = AnalysisConfig::from_toml_str(
            r#"
            [lugeon]
            divergence_threshold = 0.4
            "#,
        )
        .unwrap();
        assert_eq!(parsed.lugeon.divergence_threshold, 0.4);
        assert_eq!(parsed.lugeon.reference_pressure_bar, 10.0);
        assert_eq!(parsed.theis, TheisConfig::default());
    }

    #[test]
    fn test_penalty_order_enforced() {
        let mut config = AnalysisConfig::default();
        config.validation.fatal_penalty = 0.01;
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation error");
        };
        assert!(errors.iter().any(|e| e.contains("warning/fatal_penalty")), "{errors:?}");
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = AnalysisConfig::default();
        config.theis.transmissivity_min = 1.0;
        config.theis.transmissivity_max = 1e-3;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("theis.transmissivity"), "{err}");
    }

    #[test]
    fn test_nan_rejected() {
        let mut config = AnalysisConfig::default();
        config.anomaly.z_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }
}
