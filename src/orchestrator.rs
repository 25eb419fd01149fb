//! Scenario orchestrator.
//!
//! This module coordinates one complete run: from the validated
//! configuration through topology construction, addressing, traffic
//! installation and the simulation itself, to the flow reports and the
//! files written in the output directory.

use crate::analysis::{
    generate_json_report, print_flow_blocks, FlowFilter, FlowReport, FlowStatsReducer, ScenarioInfo,
};
use crate::config::ScenarioConfig;
use crate::ip::AddressAllocator;
use crate::sim::{FlowMonitor, RunSummary, Scheduler, SerializeOptions, SimTime, Simulation};
use crate::topology::TopologyBuilder;
use crate::traffic::install_traffic;
use crate::utils::validate_address_plan;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub reports: Vec<FlowReport>,
    pub summary: RunSummary,
    /// Flows the monitor saw, reported or not
    pub total_flows: usize,
    pub lost_packets: u64,
    pub scenario: ScenarioInfo,
    pub snapshot_path: PathBuf,
    pub report_path: PathBuf,
    pub trace_path: Option<PathBuf>,
}

/// Build the configured simulation: topology, addresses, applications and
/// routes, with nothing run yet
pub fn build_scenario(config: &ScenarioConfig) -> Result<Simulation> {
    config.validate()?;

    let mut topology = TopologyBuilder::new(config.nodes, &config.point_to_point, &config.csma, &config.wifi)
        .seed(config.general.seed)
        .build()?;

    let mut allocator = match &config.addressing.blocks {
        Some(blocks) => AddressAllocator::with_blocks(blocks.clone())?,
        None => AddressAllocator::new(config.addressing.base),
    };
    allocator.assign_all(&mut topology)?;
    for (address, owner) in allocator.registry().assignments() {
        debug!("{} -> {}", address, owner);
    }
    validate_address_plan(&topology).map_err(|e| eyre!("Address plan validation failed: {}", e))?;

    for segment in &topology.segments {
        if let Some(block) = segment.block {
            info!("Segment {} ({}): {} devices in {}", segment.name, segment.medium, segment.devices.len(), block);
        }
    }

    let plan = install_traffic(&mut topology, &config.traffic)?;
    Ok(Simulation::new(topology, plan, config.wifi.access_overhead))
}

fn scenario_info(config: &ScenarioConfig, sim: &Simulation) -> Result<ScenarioInfo> {
    let topology = sim.topology();
    let bridge_address = topology
        .bridge_address()
        .ok_or_else(|| eyre!("LAN bridge n{} has no address", topology.bridge))?;
    Ok(ScenarioInfo {
        n_wifi: config.nodes.n_wifi,
        n_csma: config.nodes.n_csma,
        stop_time: config.general.stop_time.as_secs_f64(),
        station_addresses: topology.station_addresses(),
        bridge_address,
        sink_port: config.traffic.port,
    })
}

/// Run the scenario end to end
pub fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioOutcome> {
    let output_dir = &config.general.output_dir;
    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let mut sim = build_scenario(config)?;
    let scenario = scenario_info(config, &sim)?;
    info!(
        "Scenario: {} nodes, {} stations, {} LAN hosts",
        sim.topology().node_count(),
        config.nodes.n_wifi,
        config.nodes.n_csma + 1
    );

    sim.install_monitor_all();

    let trace_path = if config.general.tracing {
        let path = output_dir.join(&config.general.trace_file);
        sim.enable_ascii_trace(&path)?;
        Some(path)
    } else {
        None
    };

    sim.schedule_stop(config.general.stop_time.into());
    let summary = sim.run()?;
    info!(
        "Simulation stopped at {}s after {} events ({} packets in flight dropped)",
        summary.end_time, summary.events_processed, summary.packets_dropped_at_stop
    );

    let monitor = sim
        .monitor_mut()
        .ok_or_else(|| eyre!("Flow monitor was not installed"))?;
    let lost_packets = monitor.check_for_lost_packets(summary.end_time, SimTime::from(config.general.max_per_hop_delay));

    let reducer = FlowStatsReducer::new(FlowFilter::new(&scenario.station_addresses, scenario.bridge_address));
    let reports = reducer.reduce(&*monitor);
    let total_flows = monitor.flow_stats().len();
    print_flow_blocks(&reports);

    let snapshot_path = output_dir.join(&config.general.flowmon_file);
    let options = SerializeOptions {
        pretty: true,
        include_probes: true,
        scenario: Some(scenario.clone()),
    };
    monitor.serialize_to_file(&snapshot_path, &options)?;

    let report_path = output_dir.join(&config.general.report_file);
    generate_json_report(&reports, &report_path)?;

    sim.destroy();

    Ok(ScenarioOutcome {
        reports,
        summary,
        total_flows,
        lost_packets,
        scenario,
        snapshot_path,
        report_path,
        trace_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::ip::AddressError;

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = ScenarioConfig::default();
        config.nodes.n_csma = 251;
        let err = build_scenario(&config).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::TooManyNodes { .. })));
    }

    #[test]
    fn test_build_wires_everything() {
        let mut config = ScenarioConfig::default();
        config.nodes.n_wifi = 2;
        config.nodes.n_csma = 1;
        let sim = build_scenario(&config).unwrap();

        assert_eq!(sim.topology().node_count(), 5);
        assert_eq!(sim.plan().sources.len(), 2);
        assert_eq!(sim.topology().bridge_address(), Some("10.1.2.1".parse().unwrap()));
        for &station in &sim.topology().stations {
            assert!(sim.routes().path(station, sim.topology().bridge).is_some());
        }
    }

    #[test]
    fn test_build_rejects_exhausted_block() {
        let mut config = ScenarioConfig::default();
        config.nodes.n_wifi = 3;
        // Three stations plus the access point do not fit in a /30
        config.addressing.blocks = Some(vec![
            "10.1.1.0/30".parse().unwrap(),
            "10.1.2.0/24".parse().unwrap(),
            "10.1.3.0/30".parse().unwrap(),
        ]);
        let err = build_scenario(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AddressError>(),
            Some(AddressError::BlockExhausted { capacity: 2, requested: 4, .. })
        ));

        config.nodes.n_wifi = 1;
        assert!(build_scenario(&config).is_ok());
    }
}
