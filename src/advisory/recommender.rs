//! Parameter Recommender - typical hydraulic properties per lithology
//!
//! A fixed, read-only catalog of unconsolidated and fractured formations.
//! Lookup is exact and case-insensitive on the canonical name or one of the
//! field aliases; there is no fuzzy matching, so a typo fails loudly with
//! the list of valid names instead of silently returning a neighbour.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::render_template;
use crate::error::{AnalysisError, Result};
use crate::types::{LithologyProfile, ValueRange};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Label returned by the conductivity-based guess for rock below the
/// catalog's lowest class.
pub const MASSIVE_ROCK: &str = "massive_rock";

struct CatalogEntry {
    name: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
    conductivity: (f64, f64),
    porosity: (f64, f64),
    storativity: (f64, f64),
}

static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "gravel",
        aliases: &["graviers", "gravier"],
        description: "Highly permeable formation, typically an unconfined aquifer",
        conductivity: (1e-3, 1e-2),
        porosity: (0.30, 0.45),
        storativity: (1e-3, 1e-2),
    },
    CatalogEntry {
        name: "sand",
        aliases: &["sables", "sable"],
        description: "Typical unconfined sandy aquifer",
        conductivity: (1e-5, 1e-3),
        porosity: (0.25, 0.40),
        storativity: (1e-4, 1e-3),
    },
    CatalogEntry {
        name: "silt",
        aliases: &["silt_limon", "limon", "silt_clay", "silt/clay"],
        description: "Semi-permeable formation acting as an aquitard",
        conductivity: (1e-7, 1e-5),
        porosity: (0.35, 0.50),
        storativity: (1e-5, 1e-4),
    },
    CatalogEntry {
        name: "clay",
        aliases: &["argile", "argiles"],
        description: "Near-impermeable confining layer",
        conductivity: (1e-9, 1e-7),
        porosity: (0.40, 0.60),
        storativity: (1e-6, 1e-5),
    },
    CatalogEntry {
        name: "fractured_limestone",
        aliases: &["calcaire_fissure", "karst"],
        description: "Fractured or karstified limestone",
        conductivity: (1e-7, 1e-4),
        porosity: (0.05, 0.20),
        storativity: (1e-5, 1e-4),
    },
    CatalogEntry {
        name: "fractured_granite",
        aliases: &["granite_fissure"],
        description: "Hard crystalline rock with open fractures",
        conductivity: (1e-9, 1e-6),
        porosity: (0.01, 0.05),
        storativity: (1e-6, 1e-5),
    },
];

const EXPLANATION_TEMPLATE: &str = "Recommendation for {name}: {description}. \
Hydraulic conductivity K ranges from {k_min} to {k_max} m/s ({k_min_day} to {k_max_day} m/day), \
typically about {k_typical} m/s. Effective porosity is {porosity_min}% to {porosity_max}% and the \
storage coefficient {s_min} to {s_max}. Use the typical value for preliminary design, test the \
sensitivity to both bounds, and refine with in-situ Lefranc, Lugeon or pumping tests.";

impl CatalogEntry {
    fn matches(&self, needle: &str) -> bool {
        self.name.eq_ignore_ascii_case(needle)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(needle))
    }

    fn profile(&self) -> LithologyProfile {
        let conductivity_range = ValueRange::new(self.conductivity.0, self.conductivity.1);
        let porosity_range = ValueRange::new(self.porosity.0, self.porosity.1);
        let storativity_range = ValueRange::new(self.storativity.0, self.storativity.1);

        let values: BTreeMap<&str, String> = [
            ("name", self.name.to_uppercase()),
            ("description", self.description.to_lowercase()),
            ("k_min", format!("{:.2e}", conductivity_range.min)),
            ("k_max", format!("{:.2e}", conductivity_range.max)),
            ("k_min_day", format!("{:.2e}", conductivity_range.min * SECONDS_PER_DAY)),
            ("k_max_day", format!("{:.2e}", conductivity_range.max * SECONDS_PER_DAY)),
            ("k_typical", format!("{:.2e}", conductivity_range.geometric_mid())),
            ("porosity_min", format!("{:.0}", porosity_range.min * 100.0)),
            ("porosity_max", format!("{:.0}", porosity_range.max * 100.0)),
            ("s_min", format!("{:.2e}", storativity_range.min)),
            ("s_max", format!("{:.2e}", storativity_range.max)),
        ]
        .into_iter()
        .collect();

        LithologyProfile {
            name: self.name.to_string(),
            aliases: self.aliases.iter().map(|a| (*a).to_string()).collect(),
            description: self.description.to_string(),
            conductivity_range,
            porosity_range,
            storativity_range,
            explanation_template: EXPLANATION_TEMPLATE.to_string(),
            explanation: render_template(EXPLANATION_TEMPLATE, &values),
        }
    }
}

/// Estimates derived from partial field knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredRecommendation {
    /// Lithology class implied by a measured conductivity.
    pub lithology_guess: Option<String>,
    pub porosity_guess: Option<f64>,
    /// Catalog profile of the lithology named by the caller.
    pub profile: Option<LithologyProfile>,
    pub explanations: Vec<String>,
    /// 0.85 with a measured K, 0.70 with a lithology only, 0.40 otherwise.
    pub confidence: f64,
}

/// Stateless lookup over the static lithology catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterRecommender;

impl ParameterRecommender {
    /// Profile for a lithology name or alias (case-insensitive, exact).
    pub fn recommend_from_lithology(name: &str) -> Result<LithologyProfile> {
        let needle = name.trim();
        let entry = CATALOG.iter().find(|e| e.matches(needle)).ok_or_else(|| {
            AnalysisError::UnknownLithology {
                name: name.to_string(),
                available: Self::available_lithologies()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            }
        })?;
        debug!(requested = name, lithology = entry.name, "lithology matched");
        Ok(entry.profile())
    }

    /// Canonical names in catalog order.
    pub fn available_lithologies() -> Vec<&'static str> {
        CATALOG.iter().map(|e| e.name).collect()
    }

    /// Every profile in catalog order.
    pub fn catalog() -> Vec<LithologyProfile> {
        CATALOG.iter().map(CatalogEntry::profile).collect()
    }

    /// Geometric-mean conductivity [m/s] of a lithology.
    pub fn typical_conductivity(name: &str) -> Result<f64> {
        Self::recommend_from_lithology(name).map(|p| p.typical_conductivity())
    }

    /// Fill in what can be inferred from a measured conductivity and/or a
    /// known lithology.
    pub fn recommend_from_measured(
        conductivity: Option<f64>,
        lithology: Option<&str>,
    ) -> Result<MeasuredRecommendation> {
        let mut rec = MeasuredRecommendation {
            lithology_guess: None,
            porosity_guess: None,
            profile: None,
            explanations: Vec::new(),
            confidence: 0.40,
        };

        if let Some(k) = conductivity {
            if !(k.is_finite() && k > 0.0) {
                return Err(AnalysisError::InputValidation(format!(
                    "measured conductivity must be finite and > 0, got {k}"
                )));
            }
            let guess = lithology_from_conductivity(k);
            let porosity = porosity_from_conductivity(k);
            rec.explanations.push(format!(
                "K = {k:.2e} m/s suggests {guess}"
            ));
            rec.explanations.push(format!(
                "estimated effective porosity {:.1}%",
                porosity * 100.0
            ));
            rec.lithology_guess = Some(guess.to_string());
            rec.porosity_guess = Some(porosity);
            rec.confidence = 0.85;
        }

        if let Some(name) = lithology {
            let profile = Self::recommend_from_lithology(name)?;
            rec.explanations.push(format!(
                "ranges taken from the {} profile",
                profile.name
            ));
            if let Some(k) = conductivity {
                if !profile.conductivity_range.contains(k) {
                    rec.explanations.push(format!(
                        "measured K = {k:.2e} m/s lies outside the {} range {:.2e} to {:.2e} m/s",
                        profile.name, profile.conductivity_range.min, profile.conductivity_range.max
                    ));
                }
            } else {
                rec.confidence = 0.70;
            }
            rec.profile = Some(profile);
        }

        Ok(rec)
    }
}

fn lithology_from_conductivity(k: f64) -> &'static str {
    if k > 1e-3 {
        "gravel"
    } else if k > 1e-5 {
        "sand"
    } else if k > 1e-7 {
        "silt"
    } else if k > 1e-9 {
        "clay"
    } else {
        MASSIVE_ROCK
    }
}

// Empirical: fine sediments hold more water than sands despite lower K.
fn porosity_from_conductivity(k: f64) -> f64 {
    if k > 1e-3 {
        0.38
    } else if k > 1e-5 {
        0.32
    } else if k > 1e-7 {
        0.42
    } else {
        0.05
    }
}
