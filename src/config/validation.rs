//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse: the raw TOML is walked as a `toml::Value` tree and every
//! dotted key is compared against the keys of the default configuration.
//! Unknown keys produce warnings with "did you mean?" suggestions; they never
//! break an otherwise valid file.

use std::collections::HashSet;

use super::AnalysisConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path, taken from the serialized default config so
/// the list cannot drift from the struct hierarchy.
pub fn known_config_keys() -> HashSet<String> {
    toml::Value::try_from(AnalysisConfig::default())
        .map(|v| walk_toml_keys(&v, "").into_iter().collect())
        .unwrap_or_default()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Dotted paths of float values that are NaN or infinite.
pub fn non_finite_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            match v {
                toml::Value::Float(f) if !f.is_finite() => keys.push(path),
                toml::Value::Table(_) => keys.extend(non_finite_keys(v, &path)),
                _ => {}
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys. Parse errors are left to serde.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    let mut found = walk_toml_keys(&value, "");
    found.sort();

    found
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical plausibility of a parsed config.
///
/// Returns (errors, warnings): errors are impossible values, warnings are
/// legal but unusual.
pub fn validate_physical_ranges(config: &AnalysisConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Storativity is a dimensionless fraction of a unit volume
    if config.theis.default_storativity >= 1.0 {
        errors.push(format!(
            "theis.default_storativity = {} must be < 1",
            config.theis.default_storativity
        ));
    }

    // Noise floor of a pressure transducer is mm to cm; a metre would hide real tests
    for (field, value) in [
        ("theis.noise_floor_m", config.theis.noise_floor_m),
        ("lefranc.noise_floor_m", config.lefranc.noise_floor_m),
        ("porchet.noise_floor_m", config.porchet.noise_floor_m),
        ("recovery.noise_floor_m", config.recovery.noise_floor_m),
    ] {
        if value > 0.1 {
            warnings.push(ValidationWarning {
                field: field.to_string(),
                message: format!("{field} = {value} m is unusually large (typical 1e-4 to 1e-2 m)"),
                suggestion: None,
            });
        }
    }

    // Packer tests are run around 10 bar; outside 1-50 bar the unit is likely wrong
    let p_ref = config.lugeon.reference_pressure_bar;
    if !(1.0..=50.0).contains(&p_ref) {
        warnings.push(ValidationWarning {
            field: "lugeon.reference_pressure_bar".to_string(),
            message: format!(
                "lugeon.reference_pressure_bar = {p_ref} is outside the usual range (1-50 bar)"
            ),
            suggestion: None,
        });
    }

    if config.cooper_jacob.late_time_fraction < 0.2 {
        warnings.push(ValidationWarning {
            field: "cooper_jacob.late_time_fraction".to_string(),
            message: format!(
                "cooper_jacob.late_time_fraction = {} keeps very few points for the straight line",
                config.cooper_jacob.late_time_fraction
            ),
            suggestion: None,
        });
    }

    if config.validation.cooper_jacob_u_max > 0.1 {
        warnings.push(ValidationWarning {
            field: "validation.cooper_jacob_u_max".to_string(),
            message: format!(
                "validation.cooper_jacob_u_max = {} is looser than the usual 0.01-0.1",
                config.validation.cooper_jacob_u_max
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
