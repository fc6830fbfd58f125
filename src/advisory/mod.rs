//! Advisory layer
//!
//! Deterministic, explainable checks that sit beside the analyzers:
//!
//! - `AnomalyDetector`: z-score, IQR and spatial outlier screens
//! - `ParameterRecommender`: typical properties per lithology
//! - `ValidationEngine`: ordered rule table over a proposed parameter set
//!
//! None of the three keep state between calls.

pub mod anomaly;
pub mod recommender;
pub mod rules;
pub mod validation_engine;

pub use anomaly::AnomalyDetector;
pub use recommender::{MeasuredRecommendation, ParameterRecommender};
pub use rules::{default_rules, Rule};
pub use validation_engine::{ParameterSet, ValidationEngine, ValidationInput};

use std::collections::BTreeMap;

/// Replace `{key}` placeholders with values from `values`. Unknown keys are
/// left in place so a missing value is visible in the output.
pub(crate) fn render_template(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match values.get(key) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
