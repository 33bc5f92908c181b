//! CLI Entry Point for frog_daq
//!
//! Provides command-line access to:
//! - simulated FROG scans saved to the data root
//! - inspection of stored measurements
//! - the active layered configuration
//!
//! # Usage
//!
//! ```bash
//! frog_daq scan --center-um 11370 --start-um -256 --step-um 4 --comment "alignment"
//! frog_daq show ~/frog_data/20261017/measurement_001
//! FROG_LOGGING__LEVEL=debug frog_daq config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frog_core::units::{micrometers, NANOMETER};
use frog_core::ScanConfig;
use frog_daq::{simulation, tracing_setup};
use frog_experiment::{ScanEvent, ScanOutcome, ScanState};
use frog_storage::{ConfigStore, MeasurementStore};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "frog_daq")]
#[command(about = "SHG FROG acquisition with simulated hardware", long_about = None)]
struct Cli {
    /// Configuration directory (defaults to ~/.frog_config)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated delay scan and save it
    Scan {
        /// Stage center position (µm)
        #[arg(long, default_value_t = 11370.0)]
        center_um: f64,
        /// First step relative to the center (µm)
        #[arg(long, default_value_t = -256.0, allow_hyphen_values = true)]
        start_um: f64,
        /// Stage step (µm)
        #[arg(long, default_value_t = 4.0)]
        step_um: f64,
        /// Spectral window center (nm)
        #[arg(long, requires = "span_nm")]
        center_nm: Option<f64>,
        /// Spectral window width (nm)
        #[arg(long, requires = "center_nm")]
        span_nm: Option<f64>,
        /// Integration time (ms)
        #[arg(long)]
        integration_ms: Option<f64>,
        /// Record a background before scanning
        #[arg(long)]
        background: bool,
        /// Comment stored with the measurement
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Print metadata of a stored measurement
    Show {
        /// Measurement directory
        dir: PathBuf,
    },

    /// Print the active configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_store = ConfigStore::new(
        cli.config_dir
            .clone()
            .unwrap_or_else(ConfigStore::default_location),
    );
    let config = config_store
        .load_or_init()
        .with_context(|| format!("loading configuration from {}", config_store.dir().display()))?;
    config.validate().map_err(anyhow::Error::msg)?;
    tracing_setup::init_from_config(&config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Scan {
            center_um,
            start_um,
            step_um,
            center_nm,
            span_nm,
            integration_ms,
            background,
            comment,
        } => {
            let mut scan = ScanConfig::symmetric(
                micrometers(center_um),
                micrometers(start_um),
                micrometers(step_um),
            )?;
            if let (Some(center), Some(span)) = (center_nm, span_nm) {
                scan = scan.with_spectral_window(center * NANOMETER, span * NANOMETER);
            }
            if let Some(ms) = integration_ms {
                scan = scan.with_integration_time(ms * 1e-3);
            }
            run_scan(&config_store, &config, scan, background, &comment).await
        }
        Commands::Show { dir } => show(&config, dir),
        Commands::Config => {
            println!("# {}", config_store.config_path().display());
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

async fn run_scan(
    config_store: &ConfigStore,
    config: &frog_storage::FrogConfig,
    scan: ScanConfig,
    background: bool,
    comment: &str,
) -> Result<()> {
    let engine = simulation::simulated_engine(config, scan.center_position).await?;
    if background {
        engine.measure_background().await?;
    }

    let steps = scan.step_count;
    let mut events = engine.subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ScanEvent::Step(n) if n % 16 == 0 || n == steps => info!("Step {n}/{steps}"),
                ScanEvent::State(ScanState::Idle) => break,
                _ => {}
            }
        }
    });

    let outcome = engine.run_scan(scan.clone()).await?;
    if let Err(err) = progress.await {
        warn!(error = %err, "Progress reporter ended abnormally");
    }
    config_store.save_scan_settings(&scan)?;

    match outcome {
        ScanOutcome::Completed(_) => {
            let store = MeasurementStore::new(&config.storage.data_root);
            let path = engine.save_measurement(&store, comment, config).await?;
            println!("{}", path.display());
        }
        ScanOutcome::Aborted { steps_completed } => {
            warn!(steps_completed, "Scan aborted, nothing saved");
        }
    }
    Ok(())
}

fn show(config: &frog_storage::FrogConfig, dir: PathBuf) -> Result<()> {
    let store = MeasurementStore::new(&config.storage.data_root);
    let measurement = store
        .load(&dir)
        .with_context(|| format!("loading measurement {}", dir.display()))?;
    let (rows, cols) = measurement.image().shape();
    println!("# {} ({rows} bins x {cols} steps)", dir.display());
    print!("{}", serde_yaml::to_string(measurement.meta())?);
    Ok(())
}
