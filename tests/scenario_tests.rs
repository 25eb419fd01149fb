#[cfg(test)]
mod scenario_tests {
    use std::collections::HashSet;
    use std::fs;

    use tempfile::TempDir;

    use wifisim::analysis::{load_snapshot, FlowReport, Throughput};
    use wifisim::config::ScenarioConfig;
    use wifisim::ip::AddressAllocator;
    use wifisim::orchestrator::{build_scenario, run_scenario};
    use wifisim::topology::TopologyBuilder;

    fn config_in(dir: &TempDir, n_wifi: u32, n_csma: u32, tracing: bool) -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.nodes.n_wifi = n_wifi;
        config.nodes.n_csma = n_csma;
        config.general.tracing = tracing;
        config.general.output_dir = dir.path().to_path_buf();
        config
    }

    /// Three stations, no extra LAN hosts
    #[test]
    fn test_three_stations_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 3, 0, false);
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.scenario.station_addresses.len(), 3);
        assert_eq!(outcome.scenario.bridge_address.to_string(), "10.1.2.1");

        assert_eq!(outcome.reports.len(), 3);
        let sources: Vec<_> = outcome.reports.iter().map(|r| r.tuple.source_address).collect();
        assert_eq!(sources, outcome.scenario.station_addresses);

        for report in &outcome.reports {
            assert_eq!(report.tuple.destination_address, outcome.scenario.bridge_address);
            assert_eq!(report.tuple.destination_port, 20);
            assert_eq!(report.rx_packets, report.tx_packets);
            assert_eq!(report.time_first_tx, 2.0);
            let kbps = report.throughput.kbps().expect("every station delivered data");
            assert!(kbps.is_finite() && kbps > 0.0);
            assert!(report.time_last_rx.unwrap() <= 10.0);
        }

        // Acknowledgement and handshake flows are monitored but not reported
        assert!(outcome.total_flows > outcome.reports.len());
        assert!(outcome.summary.sink_received_bytes >= 3 * 655_360);
        assert_eq!(outcome.lost_packets, 0);
    }

    #[test]
    fn test_output_files_written() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1, 1, true);
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.snapshot_path, dir.path().join("wifi-sim.flowmon"));
        assert_eq!(outcome.trace_path, Some(dir.path().join("ascii-log.tr")));

        let trace = fs::read_to_string(dir.path().join("ascii-log.tr")).unwrap();
        assert!(trace.lines().count() > 0);
        assert!(trace.lines().all(|l| l.starts_with("+ ") || l.starts_with("r ") || l.starts_with("d ")));

        let snapshot = load_snapshot(&outcome.snapshot_path).unwrap();
        assert_eq!(snapshot.flows.len(), outcome.total_flows);
        let bridge = outcome.scenario.bridge_address;
        // Reverse flows from the sink back to the station are in the snapshot
        assert!(snapshot.flows.iter().any(|f| f.tuple.source_address == bridge));
        assert!(snapshot.probes.is_some());

        let report: Vec<FlowReport> =
            serde_json::from_str(&fs::read_to_string(&outcome.report_path).unwrap()).unwrap();
        assert_eq!(report, outcome.reports);
    }

    #[test]
    fn test_no_trace_without_tracing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 1, 0, false);
        let outcome = run_scenario(&config).unwrap();
        assert!(outcome.trace_path.is_none());
        assert!(!dir.path().join("ascii-log.tr").exists());
        assert!(dir.path().join("wifi-sim.flowmon").exists());
    }

    #[test]
    fn test_no_stations_reports_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir, 0, 2, false);
        let outcome = run_scenario(&config).unwrap();
        assert!(outcome.reports.is_empty());
        assert_eq!(outcome.total_flows, 0);
    }

    #[test]
    fn test_stop_before_transfer_ends() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir, 2, 0, false);
        config.traffic.max_bytes = 0;
        config.traffic.source.stop = std::time::Duration::from_secs(3);
        config.traffic.sink.stop = std::time::Duration::from_secs(3);
        config.general.stop_time = std::time::Duration::from_secs(3);
        let outcome = run_scenario(&config).unwrap();

        assert_eq!(outcome.reports.len(), 2);
        for report in &outcome.reports {
            assert!(report.rx_packets <= report.tx_packets);
            assert!(matches!(report.throughput, Throughput::Kbps(k) if k.is_finite() && k > 0.0));
        }
    }

    /// Segment blocks are disjoint and no address is handed out twice
    #[test]
    fn test_address_plan_disjoint() {
        let config = ScenarioConfig::default();
        let mut topology = TopologyBuilder::new(
            wifisim::config::NodeCounts { n_csma: 250, n_wifi: 250 },
            &config.point_to_point,
            &config.csma,
            &config.wifi,
        )
        .build()
        .unwrap();
        let mut allocator = AddressAllocator::new(config.addressing.base);
        allocator.assign_all(&mut topology).unwrap();

        let blocks = allocator.issued_blocks();
        assert_eq!(blocks.len(), 3);
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }

        let addresses: Vec<_> = topology.devices.iter().filter_map(|d| d.address).collect();
        assert_eq!(addresses.len(), topology.devices.len());
        let unique: HashSet<_> = addresses.iter().collect();
        assert_eq!(unique.len(), addresses.len());
    }

    #[test]
    fn test_build_scenario_matches_counts() {
        let mut config = ScenarioConfig::default();
        config.nodes.n_wifi = 4;
        config.nodes.n_csma = 3;
        let sim = build_scenario(&config).unwrap();
        assert_eq!(sim.topology().node_count(), 4 + 3 + 2);
        assert_eq!(sim.plan().sources.len(), 4);
    }
}
