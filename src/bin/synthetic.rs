//! Synthetic pumping test generator
//!
//! Builds a Theis drawdown record from known aquifer parameters, adds
//! Gaussian measurement noise, and prints it as an analysis request.
//!
//! # Usage
//! ```bash
//! ./synthetic --transmissivity 1e-3 --storativity 1e-4 --noise 0.002 --seed 7 > request.json
//! ./hydroai analyze request.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

use hydroai::analyzers::theis_drawdown;
use hydroai::{AnalysisJob, AnalysisRequest, NumericSeries, Provenance, PumpingTest};

#[derive(Parser, Debug)]
#[command(name = "synthetic")]
#[command(about = "Synthetic Theis pumping test for hydroai")]
#[command(version)]
struct Args {
    /// Transmissivity T [m2/s]
    #[arg(long, default_value = "1e-3")]
    transmissivity: f64,

    /// Storativity S [-]
    #[arg(long, default_value = "1e-4")]
    storativity: f64,

    /// Pumping rate Q [m3/s]
    #[arg(long, default_value = "1e-3")]
    rate: f64,

    /// Distance from the pumping well r [m]
    #[arg(long, default_value = "50")]
    distance: f64,

    /// Number of log-spaced observations
    #[arg(long, default_value = "25", value_parser = clap::value_parser!(u32).range(3..=10_000))]
    points: u32,

    /// First observation time [s]
    #[arg(long, default_value = "10")]
    t_min: f64,

    /// Last observation time [s]
    #[arg(long, default_value = "86400")]
    t_max: f64,

    /// Standard deviation of the drawdown noise [m]
    #[arg(long, default_value = "0")]
    noise: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Request identifier
    #[arg(long, default_value = "synthetic")]
    id: String,
}

fn log_times(t_min: f64, t_max: f64, n: u32) -> Vec<f64> {
    let (a, b) = (t_min.log10(), t_max.log10());
    let steps = f64::from(n - 1);
    (0..n)
        .map(|i| 10f64.powf(a + (b - a) * f64::from(i) / steps))
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(
        args.t_min > 0.0 && args.t_max > args.t_min,
        "need 0 < t_min < t_max"
    );

    let test = PumpingTest::new(args.rate, args.distance).context("Invalid pumping test")?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let noise = Normal::new(0.0, args.noise).context("Invalid noise level")?;

    let times = log_times(args.t_min, args.t_max, args.points);
    let drawdowns: Vec<f64> = times
        .iter()
        .map(|t| {
            let s = theis_drawdown(args.transmissivity, args.storativity, &test, *t);
            (s + noise.sample(&mut rng)).max(0.0)
        })
        .collect();

    let provenance = Provenance::new(format!(
        "synthetic theis T={:e} S={:e}",
        args.transmissivity, args.storativity
    ))
    .with_units("s", "m")
    .recorded_now();
    let series = NumericSeries::new(times, drawdowns)
        .context("Generated series is invalid (check T and S)")?
        .with_provenance(provenance);

    let request = AnalysisRequest {
        id: args.id,
        job: AnalysisJob::Theis { series, test },
    };
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
