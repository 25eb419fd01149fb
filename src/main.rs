use clap::{ArgAction, Parser};
use color_eyre::Result;
use env_logger::Env;
use log::{info, LevelFilter};
use std::path::PathBuf;

use wifisim::analysis::print_summary;
use wifisim::config::{ConfigError, ScenarioConfig};
use wifisim::config_loader::{apply_cli_overrides, load_config, CliOverrides};
use wifisim::orchestrator::run_scenario;

/// Mixed wired/wireless network scenario: point-to-point backbone, CSMA LAN
/// and an 802.11ac cell, with bulk TCP transfers from every station to a
/// sink on the LAN
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of extra CSMA nodes/devices
    #[arg(long = "nCsma")]
    n_csma: Option<u32>,

    /// Number of wifi STA devices
    #[arg(long = "nWifi")]
    n_wifi: Option<u32>,

    /// Log bulk-send and sink application activity
    #[arg(long, action = ArgAction::Set)]
    verbose: Option<bool>,

    /// Write the ascii packet trace
    #[arg(long, action = ArgAction::Set)]
    tracing: Option<bool>,

    /// Path to a scenario configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for the flow snapshot, report and trace
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed for station placement
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            n_csma: self.n_csma,
            n_wifi: self.n_wifi,
            verbose: self.verbose,
            tracing: self.tracing,
            output_dir: self.output.clone(),
            seed: self.seed,
        }
    }
}

fn too_many_nodes() -> ! {
    println!("Too many wifi or csma nodes, no more than 250 each.");
    std::process::exit(1);
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over the verbose setting
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) if matches!(e.downcast_ref::<ConfigError>(), Some(ConfigError::TooManyNodes { .. })) => {
                too_many_nodes()
            }
            Err(e) => return Err(e),
        },
        None => ScenarioConfig::default(),
    };

    match apply_cli_overrides(&mut config, &args.overrides()) {
        Ok(()) => {}
        Err(ConfigError::TooManyNodes { .. }) => too_many_nodes(),
        Err(e) => return Err(e.into()),
    }

    if !config.general.verbose && !rust_log_set {
        log::set_max_level(LevelFilter::Warn);
    }

    info!("Stations: {}, extra LAN nodes: {}", config.nodes.n_wifi, config.nodes.n_csma);
    info!("Output directory: {:?}", config.general.output_dir);

    let outcome = run_scenario(&config)?;

    if config.general.verbose {
        print_summary(&outcome.reports);
    }
    info!(
        "Flow snapshot: {}, report: {}",
        outcome.snapshot_path.display(),
        outcome.report_path.display()
    );

    Ok(())
}
