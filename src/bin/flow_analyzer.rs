//! Offline flow statistics for wifisim runs.
//!
//! Re-reduces a serialized flow snapshot: applies the station → bridge
//! filter stored with the snapshot (or explicit source/destination
//! addresses), prints the per-flow blocks and optionally writes JSON.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use env_logger::Env;
use log::info;

use wifisim::analysis::{
    build_report, generate_json_report, load_snapshot, print_flow_blocks, print_summary, FlowFilter, FlowStatsReducer,
};

#[derive(Parser, Debug)]
#[command(name = "flow-analyzer")]
#[command(about = "Flow statistics from a wifisim flow snapshot")]
#[command(version)]
struct Cli {
    /// Path to the flow snapshot
    #[arg(default_value = "wifi-sim.flowmon")]
    snapshot: PathBuf,

    /// Source addresses to report (default: the stations recorded in the snapshot)
    #[arg(long = "src", value_delimiter = ',')]
    sources: Vec<Ipv4Addr>,

    /// Destination address to report (default: the LAN bridge recorded in the snapshot)
    #[arg(long = "dst")]
    destination: Option<Ipv4Addr>,

    /// Report every flow, ignoring the filter
    #[arg(long)]
    all: bool,

    /// Write the reports as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Filter for `sources` → `destination`; the destination cannot also be a source
fn station_filter(sources: &[Ipv4Addr], destination: Ipv4Addr) -> Result<FlowFilter> {
    if sources.contains(&destination) {
        return Err(eyre!("Destination {} is also listed as a source", destination));
    }
    Ok(FlowFilter::new(sources, destination))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(cli.log_level.as_str())).init();

    let snapshot = load_snapshot(&cli.snapshot)?;
    info!(
        "Loaded {} flows from {} (generated {})",
        snapshot.flows.len(),
        cli.snapshot.display(),
        snapshot.generated_at
    );

    let reducer = if cli.all {
        None
    } else {
        let sources = if cli.sources.is_empty() {
            snapshot
                .scenario
                .as_ref()
                .map(|s| s.station_addresses.clone())
                .ok_or_else(|| eyre!("Snapshot has no scenario section; pass --src"))?
        } else {
            cli.sources.clone()
        };
        let destination = match cli.destination {
            Some(d) => d,
            None => snapshot
                .scenario
                .as_ref()
                .map(|s| s.bridge_address)
                .ok_or_else(|| eyre!("Snapshot has no scenario section; pass --dst"))?,
        };
        Some(FlowStatsReducer::new(station_filter(&sources, destination)?))
    };

    let records = snapshot.flows.iter().map(|f| (f.flow_id, f.tuple, &f.record));
    let reports = match &reducer {
        Some(reducer) => reducer.reduce_records(records),
        None => records
            .map(|(id, tuple, record)| build_report(id, tuple, record))
            .collect(),
    };

    print_flow_blocks(&reports);
    print_summary(&reports);

    if let Some(path) = &cli.json {
        generate_json_report(&reports, path)?;
    }

    Ok(())
}
