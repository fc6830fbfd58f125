//! Analyzer output: fitted parameters, goodness of fit, model curve and
//! accumulated caveats.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::series::NumericSeries;

/// Field test families handled by the analysis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Theis,
    CooperJacob,
    Lefranc,
    Lugeon,
    Porchet,
    Piezometric,
    Recovery,
}

impl TestKind {
    /// Parameter keys every result of this kind carries.
    pub const fn parameter_names(self) -> &'static [&'static str] {
        match self {
            Self::Theis | Self::CooperJacob => &["T", "S"],
            Self::Lefranc => &["K", "tau"],
            Self::Lugeon => &["K", "lugeon"],
            Self::Porchet => &["K"],
            Self::Piezometric => &["trend_slope", "trend_intercept"],
            Self::Recovery => &["h_final", "alpha"],
        }
    }

    /// Default unit label for a parameter of this kind.
    pub fn default_unit(self, name: &str) -> &'static str {
        match (self, name) {
            (_, "T") => "m2/s",
            (_, "S") => "-",
            (_, "K") => "m/s",
            (_, "tau") => "s",
            (_, "lugeon") => "LU",
            (_, "h_final") => "m",
            (_, "alpha") => "1/s",
            _ => "",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Theis => "theis",
            Self::CooperJacob => "cooper_jacob",
            Self::Lefranc => "lefranc",
            Self::Lugeon => "lugeon",
            Self::Porchet => "porchet",
            Self::Piezometric => "piezometric",
            Self::Recovery => "recovery",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A diagnostic value: either a number or a categorical label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Diagnostic {
    Number(f64),
    Label(String),
}

impl Diagnostic {
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Label(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl From<f64> for Diagnostic {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<usize> for Diagnostic {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: usize) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for Diagnostic {
    fn from(v: &str) -> Self {
        Self::Label(v.to_string())
    }
}

impl From<String> for Diagnostic {
    fn from(v: String) -> Self {
        Self::Label(v)
    }
}

/// Result of one analyzer invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    kind: TestKind,
    parameters: BTreeMap<String, f64>,
    parameter_units: BTreeMap<String, String>,
    goodness_of_fit: f64,
    theoretical_curve: NumericSeries,
    diagnostics: BTreeMap<String, Diagnostic>,
    warnings: Vec<String>,
}

impl FitResult {
    pub const fn kind(&self) -> TestKind {
        self.kind
    }

    /// Fitted value for `name`, `None` if the key is not part of this kind.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    pub const fn parameters(&self) -> &BTreeMap<String, f64> {
        &self.parameters
    }

    pub fn unit(&self, name: &str) -> Option<&str> {
        self.parameter_units.get(name).map(String::as_str)
    }

    pub const fn parameter_units(&self) -> &BTreeMap<String, String> {
        &self.parameter_units
    }

    pub const fn goodness_of_fit(&self) -> f64 {
        self.goodness_of_fit
    }

    pub const fn theoretical_curve(&self) -> &NumericSeries {
        &self.theoretical_curve
    }

    pub fn diagnostic(&self, name: &str) -> Option<&Diagnostic> {
        self.diagnostics.get(name)
    }

    pub const fn diagnostics(&self) -> &BTreeMap<String, Diagnostic> {
        &self.diagnostics
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Assembles a [`FitResult`], guaranteeing the fixed parameter key set.
///
/// Every key of the kind starts as NaN; anything still non-finite at
/// `build` time is reported as a warning.
#[derive(Debug)]
pub struct FitResultBuilder {
    kind: TestKind,
    parameters: BTreeMap<String, f64>,
    parameter_units: BTreeMap<String, String>,
    goodness_of_fit: f64,
    diagnostics: BTreeMap<String, Diagnostic>,
    warnings: Vec<String>,
}

impl FitResultBuilder {
    pub fn new(kind: TestKind) -> Self {
        let names = kind.parameter_names();
        Self {
            kind,
            parameters: names.iter().map(|n| ((*n).to_string(), f64::NAN)).collect(),
            parameter_units: names
                .iter()
                .map(|n| ((*n).to_string(), kind.default_unit(n).to_string()))
                .collect(),
            goodness_of_fit: f64::NAN,
            diagnostics: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn parameter(mut self, name: &str, value: f64) -> Self {
        debug_assert!(
            self.parameters.contains_key(name),
            "parameter {name} is not part of {}",
            self.kind
        );
        if self.parameters.contains_key(name) {
            self.parameters.insert(name.to_string(), value);
        }
        self
    }

    #[must_use]
    pub fn unit(mut self, name: &str, unit: impl Into<String>) -> Self {
        if self.parameter_units.contains_key(name) {
            self.parameter_units.insert(name.to_string(), unit.into());
        }
        self
    }

    #[must_use]
    pub const fn goodness_of_fit(mut self, value: f64) -> Self {
        self.goodness_of_fit = value;
        self
    }

    #[must_use]
    pub fn diagnostic(mut self, name: &str, value: impl Into<Diagnostic>) -> Self {
        self.diagnostics.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn warning(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }

    #[must_use]
    pub fn warnings(mut self, messages: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(messages);
        self
    }

    pub fn build(mut self, theoretical_curve: NumericSeries) -> FitResult {
        for (name, value) in &mut self.parameters {
            if !value.is_finite() {
                *value = f64::NAN;
                self.warnings
                    .push(format!("parameter {name} could not be estimated"));
            }
        }
        FitResult {
            kind: self.kind,
            parameters: self.parameters,
            parameter_units: self.parameter_units,
            goodness_of_fit: self.goodness_of_fit,
            theoretical_curve,
            diagnostics: self.diagnostics,
            warnings: self.warnings,
        }
    }
}
