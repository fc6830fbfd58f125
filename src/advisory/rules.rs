//! Default validation rule table.
//!
//! Each rule is a plain predicate over the input and the configured
//! thresholds. Rules are independent of each other and of evaluation order;
//! the table order only fixes the order of issues in the report (fatal
//! first, then warnings, then info).
//!
//! Predicates only fire on the parameters they need: a set without `Q`
//! never triggers a `Q` rule.

use super::validation_engine::{keys, ValidationInput};
use crate::config::ValidationConfig;
use crate::types::{Severity, TestKind};

/// Predicate deciding whether a rule fires.
pub type RulePredicate = fn(&ValidationInput, &ValidationConfig) -> bool;

/// One auditable check: id, severity, predicate and message template.
///
/// Templates use `{name}` placeholders filled from the parameter set, the
/// derived quantities (`u_t_max`, `u_t_min`, `predicted_drawdown`,
/// `storage_ratio`, `k_from_t`, `non_finite`), the lithology bounds
/// (`lithology`, `k_min`, `k_max`, `s_min`, `s_max`, `porosity_min`,
/// `porosity_max`) and the config thresholds by field name.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    pub predicate: RulePredicate,
    pub template: &'static str,
}

impl Rule {
    pub const fn new(
        id: &'static str,
        severity: Severity,
        predicate: RulePredicate,
        template: &'static str,
    ) -> Self {
        Self {
            id,
            severity,
            predicate,
            template,
        }
    }

    pub fn fires(&self, input: &ValidationInput, config: &ValidationConfig) -> bool {
        (self.predicate)(input, config)
    }
}

static DEFAULT_RULES: &[Rule] = &[
    // Fatal: physically impossible sets
    Rule::new(
        "non_finite_value",
        Severity::Fatal,
        |i, _| i.params().iter().any(|(_, v)| !v.is_finite()),
        "parameters {non_finite} are not finite numbers",
    ),
    Rule::new(
        "pumping_rate_non_positive",
        Severity::Fatal,
        |i, _| i.get(keys::Q).is_some_and(|q| q <= 0.0),
        "pumping rate Q = {Q} m3/s must be positive",
    ),
    Rule::new(
        "transmissivity_non_positive",
        Severity::Fatal,
        |i, _| i.get(keys::T).is_some_and(|t| t <= 0.0),
        "transmissivity T = {T} m2/s must be positive",
    ),
    Rule::new(
        "storativity_out_of_unit",
        Severity::Fatal,
        |i, _| i.get(keys::S).is_some_and(|s| s <= 0.0 || s >= 1.0),
        "storativity S = {S} must lie strictly between 0 and 1",
    ),
    Rule::new(
        "distance_non_positive",
        Severity::Fatal,
        |i, _| i.get(keys::R).is_some_and(|r| r <= 0.0),
        "observation distance r = {r} m must be positive",
    ),
    Rule::new(
        "conductivity_out_of_range",
        Severity::Fatal,
        |i, _| i.get(keys::K).is_some_and(|k| k <= 0.0 || k > 1.0),
        "hydraulic conductivity K = {K} m/s must lie in (0, 1]",
    ),
    Rule::new(
        "porosity_out_of_unit",
        Severity::Fatal,
        |i, _| i.get(keys::POROSITY).is_some_and(|p| p <= 0.0 || p >= 1.0),
        "porosity = {porosity} must lie strictly between 0 and 1",
    ),
    Rule::new(
        "storativity_exceeds_porosity",
        Severity::Fatal,
        |i, _| match (i.get(keys::S), i.get(keys::POROSITY)) {
            (Some(s), Some(p)) => s >= p,
            _ => false,
        },
        "storativity S = {S} cannot reach the porosity {porosity}",
    ),
    Rule::new(
        "time_range_inverted",
        Severity::Fatal,
        |i, _| match (i.get(keys::T_MIN), i.get(keys::T_MAX)) {
            (Some(lo), Some(hi)) => lo >= hi,
            _ => false,
        },
        "observation window t_min = {t_min} s must precede t_max = {t_max} s",
    ),
    // Warnings: plausible but unusual
    Rule::new(
        "transmissivity_high",
        Severity::Warning,
        |i, c| i.get(keys::T).is_some_and(|t| t > c.transmissivity_high),
        "transmissivity T = {T} m2/s is unusually high (above {transmissivity_high})",
    ),
    Rule::new(
        "storativity_low",
        Severity::Warning,
        |i, c| i.get(keys::S).is_some_and(|s| s > 0.0 && s < c.storativity_low),
        "storativity S = {S} is very low (below {storativity_low}), deep confined aquifer?",
    ),
    Rule::new(
        "theis_u_high",
        Severity::Warning,
        |i, c| i.applies_to(TestKind::Theis) && i.u_at_t_max().is_some_and(|u| u > c.theis_u_max),
        "u = {u_t_max} at t_max is above {theis_u_max}: observation period probably too short",
    ),
    Rule::new(
        "cooper_jacob_u_high",
        Severity::Warning,
        |i, c| {
            i.method() == Some(TestKind::CooperJacob)
                && i.u_at_t_max().is_some_and(|u| u >= c.cooper_jacob_u_max)
        },
        "u = {u_t_max} at t_max is not below {cooper_jacob_u_max}: Cooper-Jacob approximation invalid",
    ),
    Rule::new(
        "predicted_drawdown_high",
        Severity::Warning,
        |i, c| {
            i.predicted_drawdown()
                .is_some_and(|s| s > c.max_predicted_drawdown_m)
        },
        "predicted drawdown {predicted_drawdown} m at r and t_max exceeds {max_predicted_drawdown_m} m: pumping rate looks high for this T",
    ),
    Rule::new(
        "conductivity_outside_lithology",
        Severity::Warning,
        |i, _| match (i.get(keys::K), i.lithology()) {
            (Some(k), Some(l)) => k.is_finite() && !l.conductivity_range.contains(k),
            _ => false,
        },
        "K = {K} m/s is outside the {lithology} range {k_min} to {k_max} m/s",
    ),
    Rule::new(
        "transmissivity_outside_lithology",
        Severity::Warning,
        |i, _| match (i.conductivity_from_transmissivity(), i.lithology()) {
            (Some(k), Some(l)) => !l.conductivity_range.contains(k),
            _ => false,
        },
        "T/b = {k_from_t} m/s is outside the {lithology} range {k_min} to {k_max} m/s",
    ),
    Rule::new(
        "storativity_outside_lithology",
        Severity::Warning,
        |i, _| match (i.get(keys::S), i.lithology()) {
            (Some(s), Some(l)) => s.is_finite() && !l.storativity_range.contains(s),
            _ => false,
        },
        "S = {S} is outside the {lithology} range {s_min} to {s_max}",
    ),
    Rule::new(
        "porosity_outside_lithology",
        Severity::Warning,
        |i, _| match (i.get(keys::POROSITY), i.lithology()) {
            (Some(p), Some(l)) => p.is_finite() && !l.porosity_range.contains(p),
            _ => false,
        },
        "porosity = {porosity} is outside the {lithology} range {porosity_min} to {porosity_max}",
    ),
    // Info: context for the reader, no effect on status
    Rule::new(
        "theis_u_low",
        Severity::Info,
        |i, c| i.applies_to(TestKind::Theis) && i.u_at_t_max().is_some_and(|u| u < c.theis_u_min),
        "u = {u_t_max} at t_max is below {theis_u_min}: very long observation period",
    ),
    Rule::new(
        "cooper_jacob_early_time",
        Severity::Info,
        |i, c| {
            i.method() == Some(TestKind::CooperJacob)
                && i.u_at_t_min().is_some_and(|u| u >= c.cooper_jacob_u_max)
        },
        "u = {u_t_min} at t_min: early-time points fall outside the Cooper-Jacob validity range",
    ),
    Rule::new(
        "strongly_confined",
        Severity::Info,
        |i, c| i.storage_ratio().is_some_and(|x| x < c.confined_ratio),
        "S/porosity = {storage_ratio}: strongly confined aquifer",
    ),
    Rule::new(
        "unconfined",
        Severity::Info,
        |i, c| i.storage_ratio().is_some_and(|x| x > c.unconfined_ratio),
        "S/porosity = {storage_ratio}: behaves as an unconfined aquifer",
    ),
];

/// The built-in rule table.
pub fn default_rules() -> Vec<Rule> {
    DEFAULT_RULES.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::ParameterSet;
    use std::collections::HashSet;

    fn fires(id: &str, input: &ValidationInput) -> bool {
        let config = ValidationConfig::default();
        DEFAULT_RULES
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.fires(input, &config))
            .unwrap_or_else(|| panic!("no rule {id}"))
    }

    fn theis(q: f64, t: f64, s: f64, r: f64, t_max: f64) -> ValidationInput {
        ValidationInput::new(
            ParameterSet::new()
                .with(keys::Q, q)
                .with(keys::T, t)
                .with(keys::S, s)
                .with(keys::R, r)
                .with(keys::T_MIN, 10.0)
                .with(keys::T_MAX, t_max),
        )
        .with_method(TestKind::Theis)
    }

    #[test]
    fn test_ids_unique_and_ordered_by_severity() {
        let ids: HashSet<_> = DEFAULT_RULES.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), DEFAULT_RULES.len());
        let severities: Vec<_> = DEFAULT_RULES.iter().map(|r| r.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(severities, sorted);
    }

    #[test]
    fn test_fatal_predicates() {
        assert!(fires("transmissivity_non_positive", &theis(1e-3, 0.0, 1e-4, 10.0, 1e4)));
        assert!(fires("storativity_out_of_unit", &theis(1e-3, 1e-3, 1.0, 10.0, 1e4)));
        assert!(fires("pumping_rate_non_positive", &theis(-1.0, 1e-3, 1e-4, 10.0, 1e4)));
        assert!(fires("distance_non_positive", &theis(1e-3, 1e-3, 1e-4, 0.0, 1e4)));
        assert!(fires("time_range_inverted", &theis(1e-3, 1e-3, 1e-4, 10.0, 5.0)));
        assert!(fires("non_finite_value", &theis(1e-3, f64::NAN, 1e-4, 10.0, 1e4)));
        assert!(!fires("transmissivity_non_positive", &theis(1e-3, 1e-3, 1e-4, 10.0, 1e4)));
    }

    #[test]
    fn test_theis_u_window() {
        // u = r²S/(4 T t) = 2500·1e-4 / (4·1e-3·10) = 6.25 at t_max = 10 s
        let short = theis(1e-3, 1e-3, 1e-4, 50.0, 10.0 + 1e-9);
        assert!(!fires("theis_u_high", &short));
        let very_short = theis(1e-3, 1e-5, 1e-4, 50.0, 11.0);
        assert!(fires("theis_u_high", &very_short));
        let long = theis(1e-3, 1e-2, 1e-6, 1.0, 1e6);
        assert!(fires("theis_u_low", &long));
    }

    #[test]
    fn test_method_scoped_rules() {
        let input = ValidationInput::new(
            ParameterSet::new()
                .with(keys::T, 1e-3)
                .with(keys::S, 1e-4)
                .with(keys::R, 100.0)
                .with(keys::T_MIN, 10.0)
                .with(keys::T_MAX, 1000.0),
        );
        // u(t_max) = 1e4·1e-4/(4e-3·1e3) = 0.25
        assert!(!fires("cooper_jacob_u_high", &input));
        assert!(fires("cooper_jacob_u_high", &input.clone().with_method(TestKind::CooperJacob)));
        assert!(!fires("theis_u_high", &input.with_method(TestKind::Lefranc)));
    }

    #[test]
    fn test_storage_ratio_info() {
        let input = ValidationInput::new(
            ParameterSet::new()
                .with(keys::S, 1e-8)
                .with(keys::POROSITY, 0.3),
        );
        assert!(fires("strongly_confined", &input));
        assert!(!fires("unconfined", &input));
    }
}
