//! Validation Engine - gate a proposed parameter set before it is used
//!
//! Evaluates an ordered rule table against a named parameter set and an
//! optional lithology profile. Every call starts fresh at `Ok` and can only
//! escalate: any warning moves to `Warning`, any fatal issue to `Blocked`.
//! Info issues are reported without touching the status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::{debug, info};

use super::render_template;
use super::rules::{default_rules, Rule};
use crate::config::ValidationConfig;
use crate::error::{AnalysisError, Result};
use crate::numerics::well_function;
use crate::types::{
    FitResult, Issue, LithologyProfile, Severity, TestKind, ValidationReport, ValidationStatus,
};

/// Canonical parameter names understood by the default rules.
pub mod keys {
    /// Pumping rate [m³/s].
    pub const Q: &str = "Q";
    /// Transmissivity [m²/s].
    pub const T: &str = "T";
    /// Storativity [-].
    pub const S: &str = "S";
    /// Observation distance [m].
    pub const R: &str = "r";
    /// Hydraulic conductivity [m/s].
    pub const K: &str = "K";
    pub const POROSITY: &str = "porosity";
    /// Saturated aquifer thickness [m].
    pub const THICKNESS: &str = "b";
    /// First and last observation time [s].
    pub const T_MIN: &str = "t_min";
    pub const T_MAX: &str = "t_max";
}

// ============================================================================
// Input
// ============================================================================

/// Named physical values to validate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Fitted parameters of `fit`, plus the observation window for kinds
    /// whose abscissa is time. Unestimated (NaN) values are kept so the
    /// non-finite rule can block them.
    pub fn from_fit(fit: &FitResult) -> Self {
        let mut set: Self = fit
            .parameters()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        if fit.kind() != TestKind::Lugeon {
            let x = fit.theoretical_curve().x();
            let (lo, hi) = crate::numerics::stats::min_max(x);
            set.insert(keys::T_MIN, lo);
            set.insert(keys::T_MAX, hi);
        }
        set
    }
}

impl From<BTreeMap<String, f64>> for ParameterSet {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parameter set plus the context rules may depend on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationInput {
    params: ParameterSet,
    #[serde(default)]
    method: Option<TestKind>,
    #[serde(default)]
    lithology: Option<LithologyProfile>,
}

impl ValidationInput {
    pub fn new(params: ParameterSet) -> Self {
        Self {
            params,
            method: None,
            lithology: None,
        }
    }

    /// Input built from a fit: its parameters, window and method.
    pub fn from_fit(fit: &FitResult) -> Self {
        Self::new(ParameterSet::from_fit(fit)).with_method(fit.kind())
    }

    #[must_use]
    pub fn with_method(mut self, method: TestKind) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_lithology(mut self, profile: LithologyProfile) -> Self {
        self.lithology = Some(profile);
        self
    }

    /// Add or override a parameter (e.g. the pumping rate, which is a test
    /// constant rather than a fitted value).
    #[must_use]
    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name, value);
        self
    }

    pub const fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.params.get(name)
    }

    pub const fn method(&self) -> Option<TestKind> {
        self.method
    }

    pub const fn lithology(&self) -> Option<&LithologyProfile> {
        self.lithology.as_ref()
    }

    /// True when the method is `kind` or unspecified.
    pub fn applies_to(&self, kind: TestKind) -> bool {
        self.method.map_or(true, |m| m == kind)
    }

    // ------------------------------------------------------------------------
    // Derived quantities. `None` when an input is missing or unphysical.
    // ------------------------------------------------------------------------

    fn positive(&self, name: &str) -> Option<f64> {
        self.get(name).filter(|v| v.is_finite() && *v > 0.0)
    }

    /// Theis argument u = r²S / (4Tt).
    pub fn u_at(&self, t: f64) -> Option<f64> {
        let tr = self.positive(keys::T)?;
        let s = self.positive(keys::S)?;
        let r = self.positive(keys::R)?;
        (t.is_finite() && t > 0.0).then(|| r * r * s / (4.0 * tr * t))
    }

    pub fn u_at_t_max(&self) -> Option<f64> {
        self.u_at(self.get(keys::T_MAX)?)
    }

    pub fn u_at_t_min(&self) -> Option<f64> {
        self.u_at(self.get(keys::T_MIN)?)
    }

    /// Theis drawdown [m] at r and t_max.
    pub fn predicted_drawdown(&self) -> Option<f64> {
        let q = self.positive(keys::Q)?;
        let t = self.positive(keys::T)?;
        let w = well_function(self.u_at_t_max()?).ok()?;
        Some(q / (4.0 * PI * t) * w)
    }

    /// S / porosity.
    pub fn storage_ratio(&self) -> Option<f64> {
        let s = self.positive(keys::S)?;
        let p = self.positive(keys::POROSITY)?;
        Some(s / p)
    }

    /// Equivalent conductivity T / b [m/s].
    pub fn conductivity_from_transmissivity(&self) -> Option<f64> {
        let t = self.positive(keys::T)?;
        let b = self.positive(keys::THICKNESS)?;
        Some(t / b)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Rule evaluator. Holds thresholds and a rule table, nothing else.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    config: ValidationConfig,
    rules: Vec<Rule>,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self {
            config: ValidationConfig::default(),
            rules: default_rules(),
        }
    }
}

impl ValidationEngine {
    /// Engine over the built-in rule table.
    pub fn new(config: ValidationConfig) -> Result<Self> {
        Self::with_rules(config, default_rules())
    }

    /// Engine over a caller-supplied rule table.
    ///
    /// Penalties must be finite, non-negative and non-decreasing with
    /// severity (`info <= warning <= fatal`).
    pub fn with_rules(config: ValidationConfig, rules: Vec<Rule>) -> Result<Self> {
        check_penalties(&config)?;
        Ok(Self { config, rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn validate(&self, input: &ValidationInput) -> ValidationReport {
        let values = self.render_values(input);
        let mut status = ValidationStatus::Ok;
        let mut issues = Vec::new();

        for rule in &self.rules {
            if !rule.fires(input, &self.config) {
                continue;
            }
            status = status.escalate(rule.severity);
            let message = render_template(rule.template, &values);
            debug!(rule = rule.id, severity = %rule.severity, "{}", message);
            issues.push(Issue {
                rule_id: rule.id.to_string(),
                severity: rule.severity,
                message,
                template: rule.template.to_string(),
            });
        }

        let report = ValidationReport {
            status,
            confidence: 0.0,
            issues,
        };
        let confidence = self.confidence(&report);
        info!(
            status = %report.status,
            confidence,
            fatal = report.count(Severity::Fatal),
            warnings = report.count(Severity::Warning),
            info = report.count(Severity::Info),
            "validation complete"
        );
        ValidationReport {
            confidence,
            ..report
        }
    }

    /// Zero whenever the report is blocked.
    #[allow(clippy::cast_precision_loss)]
    fn confidence(&self, report: &ValidationReport) -> f64 {
        if report.is_blocked() {
            return 0.0;
        }
        let c = &self.config;
        let penalty = c.info_penalty * report.count(Severity::Info) as f64
            + c.warning_penalty * report.count(Severity::Warning) as f64
            + c.fatal_penalty * report.count(Severity::Fatal) as f64;
        (1.0 - penalty).clamp(0.0, 1.0)
    }

    fn render_values<'a>(&self, input: &'a ValidationInput) -> BTreeMap<&'a str, String> {
        let sci = |v: f64| format!("{v:.3e}");
        let mut values: BTreeMap<&str, String> = input
            .params
            .iter()
            .map(|(k, v)| (k, sci(v)))
            .collect();

        let non_finite: Vec<&str> = input
            .params
            .iter()
            .filter(|(_, v)| !v.is_finite())
            .map(|(k, _)| k)
            .collect();
        values.insert("non_finite", non_finite.join(", "));

        if let Some(u) = input.u_at_t_max() {
            values.insert("u_t_max", sci(u));
        }
        if let Some(u) = input.u_at_t_min() {
            values.insert("u_t_min", sci(u));
        }
        if let Some(s) = input.predicted_drawdown() {
            values.insert("predicted_drawdown", format!("{s:.2}"));
        }
        if let Some(x) = input.storage_ratio() {
            values.insert("storage_ratio", sci(x));
        }
        if let Some(k) = input.conductivity_from_transmissivity() {
            values.insert("k_from_t", sci(k));
        }
        if let Some(l) = input.lithology() {
            values.insert("lithology", l.name.clone());
            values.insert("k_min", sci(l.conductivity_range.min));
            values.insert("k_max", sci(l.conductivity_range.max));
            values.insert("s_min", sci(l.storativity_range.min));
            values.insert("s_max", sci(l.storativity_range.max));
            values.insert("porosity_min", format!("{:.2}", l.porosity_range.min));
            values.insert("porosity_max", format!("{:.2}", l.porosity_range.max));
        }

        let c = &self.config;
        for (name, v) in [
            ("transmissivity_high", c.transmissivity_high),
            ("storativity_low", c.storativity_low),
            ("theis_u_max", c.theis_u_max),
            ("theis_u_min", c.theis_u_min),
            ("cooper_jacob_u_max", c.cooper_jacob_u_max),
            ("max_predicted_drawdown_m", c.max_predicted_drawdown_m),
            ("confined_ratio", c.confined_ratio),
            ("unconfined_ratio", c.unconfined_ratio),
        ] {
            values.insert(name, format!("{v}"));
        }
        values
    }
}

fn check_penalties(config: &ValidationConfig) -> Result<()> {
    let penalties = [
        ("info_penalty", config.info_penalty),
        ("warning_penalty", config.warning_penalty),
        ("fatal_penalty", config.fatal_penalty),
    ];
    if let Some((name, v)) = penalties.iter().find(|(_, v)| !(v.is_finite() && *v >= 0.0)) {
        return Err(AnalysisError::InputValidation(format!(
            "validation.{name} must be finite and >= 0, got {v}"
        )));
    }
    for pair in penalties.windows(2) {
        let ((lo_name, lo), (hi_name, hi)) = (pair[0], pair[1]);
        if hi < lo {
            return Err(AnalysisError::InputValidation(format!(
                "validation.{hi_name} ({hi}) must be >= validation.{lo_name} ({lo})"
            )));
        }
    }
    Ok(())
}
