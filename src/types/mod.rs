//! Shared data structures for aquifer test analysis
//!
//! - `NumericSeries`: validated (x, y) field record with provenance
//! - Per-test configuration bundles (pumping, Lefranc, Lugeon, Porchet)
//! - `FitResult`: analyzer output
//! - Advisory outputs: anomalies, lithology profiles, validation reports

mod anomaly;
mod fit;
mod lithology;
mod series;
mod test_config;
mod validation;

pub use anomaly::*;
pub use fit::*;
pub use lithology::*;
pub use series::*;
pub use test_config::*;
pub use validation::*;
