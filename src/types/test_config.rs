//! Per-test physical constants, validated at construction.
//!
//! All quantities are SI: metres, seconds, m³/s. Lugeon stage data are the
//! exception (bar and L/min) because that is how packer tests are logged.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InputValidation(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

// ============================================================================
// Pumping tests (Theis, Cooper-Jacob)
// ============================================================================

/// Constant-rate pumping test observed at a single piezometer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPumping")]
pub struct PumpingTest {
    /// Q [m³/s]
    pumping_rate: f64,
    /// r [m], pumping well to observation point
    distance: f64,
    /// S [-] from an independent source. Theis then fits T alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    known_storativity: Option<f64>,
}

#[derive(Deserialize)]
struct RawPumping {
    pumping_rate: f64,
    distance: f64,
    #[serde(default)]
    known_storativity: Option<f64>,
}

impl TryFrom<RawPumping> for PumpingTest {
    type Error = AnalysisError;
    fn try_from(raw: RawPumping) -> Result<Self> {
        let test = Self::new(raw.pumping_rate, raw.distance)?;
        match raw.known_storativity {
            Some(s) => test.with_known_storativity(s),
            None => Ok(test),
        }
    }
}

impl PumpingTest {
    pub fn new(pumping_rate: f64, distance: f64) -> Result<Self> {
        require_positive("pumping_rate", pumping_rate)?;
        require_positive("distance", distance)?;
        Ok(Self {
            pumping_rate,
            distance,
            known_storativity: None,
        })
    }

    /// Pin S; must lie strictly between 0 and 1.
    pub fn with_known_storativity(mut self, storativity: f64) -> Result<Self> {
        require_positive("known_storativity", storativity)?;
        if storativity >= 1.0 {
            return Err(AnalysisError::InputValidation(format!(
                "known_storativity must be < 1, got {storativity}"
            )));
        }
        self.known_storativity = Some(storativity);
        Ok(self)
    }

    pub const fn pumping_rate(&self) -> f64 {
        self.pumping_rate
    }

    pub const fn distance(&self) -> f64 {
        self.distance
    }

    pub const fn known_storativity(&self) -> Option<f64> {
        self.known_storativity
    }
}

/// Theis and Cooper-Jacob share the same test constants.
pub type TheisTest = PumpingTest;
pub type CooperJacobTest = PumpingTest;

// ============================================================================
// Lefranc (borehole falling/rising head)
// ============================================================================

/// Shape of the open test section below the casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CavityGeometry {
    /// Uncased cylindrical section of length L.
    #[default]
    Cylinder,
    /// Flush casing, flow through a flat bottom only.
    FlatBottom,
}

/// Which curve fit to run on the head record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LefrancMethod {
    /// Log-linear when the equilibrium head is known and the excess decays
    /// monotonically, nonlinear otherwise.
    #[default]
    Auto,
    Nonlinear,
    LogLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLefranc")]
pub struct LefrancTest {
    radius: f64,
    length: f64,
    casing_radius: f64,
    geometry: CavityGeometry,
    aquifer_head: Option<f64>,
    method: LefrancMethod,
}

#[derive(Deserialize)]
struct RawLefranc {
    radius: f64,
    length: f64,
    casing_radius: Option<f64>,
    #[serde(default)]
    geometry: CavityGeometry,
    aquifer_head: Option<f64>,
    #[serde(default)]
    method: LefrancMethod,
}

impl TryFrom<RawLefranc> for LefrancTest {
    type Error = AnalysisError;
    fn try_from(raw: RawLefranc) -> Result<Self> {
        let mut test = Self::new(raw.radius, raw.length, raw.geometry)?.with_method(raw.method);
        if let Some(rc) = raw.casing_radius {
            test = test.with_casing_radius(rc)?;
        }
        if let Some(h) = raw.aquifer_head {
            test = test.with_aquifer_head(h)?;
        }
        Ok(test)
    }
}

impl LefrancTest {
    /// `radius` and `length` of the open section [m].
    pub fn new(radius: f64, length: f64, geometry: CavityGeometry) -> Result<Self> {
        require_positive("radius", radius)?;
        require_positive("length", length)?;
        Ok(Self {
            radius,
            length,
            casing_radius: radius,
            geometry,
            aquifer_head: None,
            method: LefrancMethod::Auto,
        })
    }

    /// Radius of the standpipe where the head is read, if it differs from
    /// the open section.
    pub fn with_casing_radius(mut self, casing_radius: f64) -> Result<Self> {
        require_positive("casing_radius", casing_radius)?;
        self.casing_radius = casing_radius;
        Ok(self)
    }

    /// Static (equilibrium) head, in the same datum as the series.
    pub fn with_aquifer_head(mut self, head: f64) -> Result<Self> {
        if !head.is_finite() {
            return Err(AnalysisError::InputValidation(format!(
                "aquifer_head must be finite, got {head}"
            )));
        }
        self.aquifer_head = Some(head);
        Ok(self)
    }

    #[must_use]
    pub const fn with_method(mut self, method: LefrancMethod) -> Self {
        self.method = method;
        self
    }

    pub const fn radius(&self) -> f64 {
        self.radius
    }

    pub const fn length(&self) -> f64 {
        self.length
    }

    pub const fn casing_radius(&self) -> f64 {
        self.casing_radius
    }

    pub const fn geometry(&self) -> CavityGeometry {
        self.geometry
    }

    pub const fn aquifer_head(&self) -> Option<f64> {
        self.aquifer_head
    }

    pub const fn method(&self) -> LefrancMethod {
        self.method
    }
}

// ============================================================================
// Lugeon (packer injection)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLugeon")]
pub struct LugeonTest {
    /// Length of the packed-off test section [m].
    test_length: f64,
}

#[derive(Deserialize)]
struct RawLugeon {
    test_length: f64,
}

impl TryFrom<RawLugeon> for LugeonTest {
    type Error = AnalysisError;
    fn try_from(raw: RawLugeon) -> Result<Self> {
        Self::new(raw.test_length)
    }
}

impl LugeonTest {
    pub fn new(test_length: f64) -> Result<Self> {
        require_positive("test_length", test_length)?;
        Ok(Self { test_length })
    }

    pub const fn test_length(&self) -> f64 {
        self.test_length
    }
}

// ============================================================================
// Porchet (inverse auger hole)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPorchet")]
pub struct PorchetTest {
    radius: f64,
    initial_head: Option<f64>,
    bottom_infiltration: bool,
}

#[derive(Deserialize)]
struct RawPorchet {
    radius: f64,
    initial_head: Option<f64>,
    #[serde(default = "default_true")]
    bottom_infiltration: bool,
}

const fn default_true() -> bool {
    true
}

impl TryFrom<RawPorchet> for PorchetTest {
    type Error = AnalysisError;
    fn try_from(raw: RawPorchet) -> Result<Self> {
        let mut test = Self::new(raw.radius)?.with_bottom_infiltration(raw.bottom_infiltration);
        if let Some(h0) = raw.initial_head {
            test = test.with_initial_head(h0)?;
        }
        Ok(test)
    }
}

impl PorchetTest {
    /// Auger hole radius [m]. Bottom infiltration is on by default.
    pub fn new(radius: f64) -> Result<Self> {
        require_positive("radius", radius)?;
        Ok(Self {
            radius,
            initial_head: None,
            bottom_infiltration: true,
        })
    }

    /// Fix the water height at t = 0 instead of fitting it.
    pub fn with_initial_head(mut self, h0: f64) -> Result<Self> {
        require_positive("initial_head", h0)?;
        self.initial_head = Some(h0);
        Ok(self)
    }

    #[must_use]
    pub const fn with_bottom_infiltration(mut self, enabled: bool) -> Self {
        self.bottom_infiltration = enabled;
        self
    }

    pub const fn radius(&self) -> f64 {
        self.radius
    }

    pub const fn initial_head(&self) -> Option<f64> {
        self.initial_head
    }

    pub const fn bottom_infiltration(&self) -> bool {
        self.bottom_infiltration
    }
}
