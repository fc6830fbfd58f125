//! HydroAI command-line driver
//!
//! Thin wrapper over the library. Every subcommand prints JSON on stdout;
//! logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Analyse one request or an array of requests
//! hydroai analyze request.json --lithology sand
//!
//! # Typical properties of a lithology
//! hydroai recommend sables
//!
//! # Outlier screens
//! hydroai detect --method z-score --values 1.0,1.1,0.9,1.0,10.2
//!
//! # Check a parameter set before using it
//! hydroai validate --param T=1e-3 --param S=1e-4 --param Q=1e-3 --param r=50 --method theis
//!
//! # Dump the effective configuration
//! hydroai config
//! ```
//!
//! # Environment Variables
//!
//! - `HYDROAI_CONFIG`: path to a TOML configuration file
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use hydroai::advisory::validation_engine::keys;
use hydroai::batch::analyze_and_validate;
use hydroai::{
    AnalysisConfig, AnalysisRequest, AnomalyDetector, ParameterRecommender, ParameterSet,
    TestKind, ValidationEngine, ValidationInput, ZScoreMode,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "hydroai")]
#[command(about = "Aquifer test analysis with explainable validation")]
#[command(version)]
struct CliArgs {
    /// Configuration file (overrides HYDROAI_CONFIG and ./hydroai.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run analyses from a JSON request file (one request or an array)
    Analyze {
        request: PathBuf,
        /// Lithology used to range-check the fitted parameters
        #[arg(long)]
        lithology: Option<String>,
    },

    /// Typical properties of a lithology, or a guess from a measured K
    Recommend {
        /// Lithology name or alias
        name: Option<String>,
        /// Measured hydraulic conductivity [m/s]
        #[arg(long)]
        conductivity: Option<f64>,
    },

    /// Screen values for outliers
    Detect {
        #[arg(long, value_enum, default_value_t = Method::ZScore)]
        method: Method,
        /// Comma-separated values (x,y pairs for spatial)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        values: Vec<f64>,
        /// z-score threshold, IQR multiplier or spatial factor
        #[arg(long)]
        threshold: Option<f64>,
        /// Use the median/MAD z-score
        #[arg(long)]
        robust: bool,
    },

    /// Validate a parameter set
    Validate {
        /// NAME=VALUE, repeatable (Q, T, S, r, K, porosity, b, t_min, t_max)
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,
        #[arg(long)]
        lithology: Option<String>,
        #[arg(long, value_enum)]
        method: Option<MethodKind>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    ZScore,
    Iqr,
    Spatial,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodKind {
    Theis,
    CooperJacob,
    Lefranc,
    Lugeon,
    Porchet,
}

impl From<MethodKind> for TestKind {
    fn from(m: MethodKind) -> Self {
        match m {
            MethodKind::Theis => Self::Theis,
            MethodKind::CooperJacob => Self::CooperJacob,
            MethodKind::Lefranc => Self::Lefranc,
            MethodKind::Lugeon => Self::Lugeon,
            MethodKind::Porchet => Self::Porchet,
        }
    }
}

fn parse_param(raw: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid number for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

// ============================================================================
// Commands
// ============================================================================

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_analyze(config: &AnalysisConfig, path: &Path, lithology: Option<&str>) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let requests: Vec<AnalysisRequest> = if parsed.is_array() {
        serde_json::from_value(parsed)
    } else {
        serde_json::from_value(parsed).map(|r| vec![r])
    }
    .context("Invalid analysis request")?;

    let profile = lithology
        .map(ParameterRecommender::recommend_from_lithology)
        .transpose()?;
    let engine = ValidationEngine::new(config.validation.clone())?;

    info!(requests = requests.len(), "Running analyses");
    let results: Vec<Value> = analyze_and_validate(&requests, config, &engine, profile.as_ref())
        .into_iter()
        .map(|(outcome, report)| match outcome.result {
            Ok(fit) => {
                json!({ "id": outcome.id, "kind": outcome.kind, "fit": fit, "validation": report })
            }
            Err(e) => json!({
                "id": outcome.id,
                "kind": outcome.kind,
                "error": { "kind": e.kind(), "message": e.to_string() },
            }),
        })
        .collect();
    print_json(&results)
}

fn run_recommend(name: Option<&str>, conductivity: Option<f64>) -> Result<()> {
    match (name, conductivity) {
        (Some(name), None) => print_json(&ParameterRecommender::recommend_from_lithology(name)?),
        (None, None) => {
            print_json(&json!({ "available": ParameterRecommender::available_lithologies() }))
        }
        (name, Some(k)) => {
            print_json(&ParameterRecommender::recommend_from_measured(Some(k), name)?)
        }
    }
}

fn run_detect(
    config: &AnalysisConfig,
    method: Method,
    values: &[f64],
    threshold: Option<f64>,
    robust: bool,
) -> Result<()> {
    let anomaly = &config.anomaly;
    let found = match method {
        Method::ZScore => {
            let mode = if robust {
                ZScoreMode::Robust
            } else {
                anomaly.z_mode
            };
            AnomalyDetector::z_score_with_mode(
                values,
                threshold.unwrap_or(anomaly.z_threshold),
                mode,
            )?
        }
        Method::Iqr => AnomalyDetector::iqr(values, threshold.unwrap_or(anomaly.iqr_multiplier))?,
        Method::Spatial => {
            if values.len() % 2 != 0 {
                bail!("spatial detection needs x,y pairs, got {} values", values.len());
            }
            let points: Vec<(f64, f64)> = values.chunks(2).map(|c| (c[0], c[1])).collect();
            AnomalyDetector::spatial(&points, threshold.unwrap_or(anomaly.spatial_factor))?
        }
    };
    print_json(&found)
}

fn run_validate(
    config: &AnalysisConfig,
    params: Vec<(String, f64)>,
    lithology: Option<&str>,
    method: Option<MethodKind>,
) -> Result<()> {
    if params.is_empty() {
        bail!("no parameters given (use --param NAME=VALUE, e.g. --param {}=1e-3)", keys::T);
    }
    let mut input = ValidationInput::new(params.into_iter().collect::<ParameterSet>());
    if let Some(m) = method {
        input = input.with_method(m.into());
    }
    if let Some(name) = lithology {
        input = input.with_lithology(ParameterRecommender::recommend_from_lithology(name)?);
    }
    let report = ValidationEngine::new(config.validation.clone())?.validate(&input);
    print_json(&report)
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let config = match &args.config {
        Some(path) => AnalysisConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::load(),
    };

    match args.command {
        Command::Analyze { request, lithology } => {
            run_analyze(&config, &request, lithology.as_deref())
        }
        Command::Recommend { name, conductivity } => {
            run_recommend(name.as_deref(), conductivity)
        }
        Command::Detect {
            method,
            values,
            threshold,
            robust,
        } => run_detect(&config, method, &values, threshold, robust),
        Command::Validate {
            params,
            lithology,
            method,
        } => run_validate(&config, params, lithology.as_deref(), method),
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
