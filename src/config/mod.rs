//! Analysis Configuration Module
//!
//! Every numeric threshold of the analyzers and advisory engines lives in a
//! TOML-backed `AnalysisConfig`.
//!
//! ## Loading Order
//!
//! 1. `HYDROAI_CONFIG` environment variable (path to TOML file)
//! 2. `hydroai.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The config is an ordinary value. Load it once and hand the relevant
//! section to each component:
//!
//! ```ignore
//! let config = AnalysisConfig::load();
//! let theis = TheisAnalyzer::new(&config);
//! let engine = ValidationEngine::new(config.validation.clone())?;
//! ```

mod analysis_config;
pub mod validation;

pub use analysis_config::*;
