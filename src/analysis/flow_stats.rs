//! Flow statistics reduction.
//!
//! Turns the monitor's raw per-flow counters into report entries for the
//! flows of interest: from a wireless station to the LAN bridge. Everything
//! else the monitor saw (acknowledgement flows, refused connections in the
//! other direction) stays in the snapshot but is not reported.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use log::debug;

use super::types::{FiveTuple, FlowId, FlowRecord, FlowReport, Throughput};
use crate::sim::{FlowMonitor, SimTime};

/// What an address stands for in the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Station,
    Bridge,
}

/// Address-based predicate selecting station → bridge flows
#[derive(Debug, Clone, Default)]
pub struct FlowFilter {
    roles: HashMap<Ipv4Addr, EndpointRole>,
}

impl FlowFilter {
    pub fn new(stations: &[Ipv4Addr], bridge: Ipv4Addr) -> Self {
        let mut roles: HashMap<_, _> = stations.iter().map(|&a| (a, EndpointRole::Station)).collect();
        roles.insert(bridge, EndpointRole::Bridge);
        FlowFilter { roles }
    }

    pub fn role_of(&self, address: Ipv4Addr) -> Option<EndpointRole> {
        self.roles.get(&address).copied()
    }

    pub fn matches(&self, tuple: &FiveTuple) -> bool {
        self.role_of(tuple.source_address) == Some(EndpointRole::Station)
            && self.role_of(tuple.destination_address) == Some(EndpointRole::Bridge)
    }
}

/// Throughput in Kbps (1 Kbit = 1024 bits) over `[first_tx, last_rx]`
pub fn compute_throughput(rx_bytes: u64, first_tx: SimTime, last_rx: Option<SimTime>) -> Throughput {
    match last_rx {
        Some(last_rx) if rx_bytes > 0 && last_rx > first_tx => {
            let seconds = (last_rx - first_tx).as_secs_f64();
            Throughput::Kbps(rx_bytes as f64 * 8.0 / seconds / 1024.0)
        }
        _ => Throughput::NoData,
    }
}

/// Derive the report entry of one flow
pub fn build_report(flow_id: FlowId, tuple: FiveTuple, record: &FlowRecord) -> FlowReport {
    let first_tx = record.time_first_tx_packet;
    let last_rx = record.time_last_rx_packet;
    let total_delay = last_rx.map(|t| t.saturating_sub(first_tx).as_secs_f64());
    let mean_delay = (record.rx_packets > 0).then(|| record.delay_sum.as_secs_f64() / record.rx_packets as f64);

    FlowReport {
        flow_id,
        tuple,
        tx_packets: record.tx_packets,
        rx_packets: record.rx_packets,
        rx_bytes: record.rx_bytes,
        time_first_tx: first_tx.as_secs_f64(),
        time_last_rx: last_rx.map(|t| t.as_secs_f64()),
        total_delay,
        throughput: compute_throughput(record.rx_bytes, first_tx, last_rx),
        mean_delay,
    }
}

#[derive(Debug, Clone)]
pub struct FlowStatsReducer {
    filter: FlowFilter,
}

impl FlowStatsReducer {
    pub fn new(filter: FlowFilter) -> Self {
        FlowStatsReducer { filter }
    }

    /// Reduce the monitor's finalized flow table, in flow-id order
    pub fn reduce<M: FlowMonitor + ?Sized>(&self, monitor: &M) -> Vec<FlowReport> {
        self.reduce_records(
            monitor
                .flow_stats()
                .iter()
                .filter_map(|(&id, record)| monitor.classify(id).map(|tuple| (id, tuple, record))),
        )
    }

    /// Reduce already classified records, keeping their order
    pub fn reduce_records<'a>(
        &self,
        records: impl IntoIterator<Item = (FlowId, FiveTuple, &'a FlowRecord)>,
    ) -> Vec<FlowReport> {
        records
            .into_iter()
            .filter(|(id, tuple, _)| {
                let keep = self.filter.matches(tuple);
                if !keep {
                    debug!("Flow {} ({}) not reported", id, tuple);
                }
                keep
            })
            .map(|(id, tuple, record)| build_report(id, tuple, record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FlowMonitorHandle;

    fn station(i: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 1, 3, i)
    }

    const BRIDGE: Ipv4Addr = Ipv4Addr::new(10, 1, 2, 1);

    #[test]
    fn test_throughput_formula() {
        let t = compute_throughput(125_000, SimTime::from_secs(2), Some(SimTime::from_secs(10)));
        let kbps = t.kbps().unwrap();
        assert!((kbps - 122.0703125).abs() < 1e-9);
        assert_eq!(t.to_string(), "122.07 Kbps");
    }

    #[test]
    fn test_no_data_edge_cases() {
        assert_eq!(compute_throughput(0, SimTime::from_secs(2), Some(SimTime::from_secs(3))), Throughput::NoData);
        assert_eq!(compute_throughput(100, SimTime::from_secs(2), None), Throughput::NoData);
        assert_eq!(compute_throughput(100, SimTime::from_secs(2), Some(SimTime::from_secs(2))), Throughput::NoData);
        assert_eq!(Throughput::NoData.to_string(), "n/a (no data received)");
    }

    #[test]
    fn test_filter_station_to_bridge_only() {
        let filter = FlowFilter::new(&[station(1), station(2)], BRIDGE);
        assert!(filter.matches(&FiveTuple::tcp((station(1), 49153), (BRIDGE, 20))));
        assert!(!filter.matches(&FiveTuple::tcp((BRIDGE, 20), (station(1), 49153))));
        assert!(!filter.matches(&FiveTuple::tcp((station(9), 49153), (BRIDGE, 20))));
        assert!(!filter.matches(&FiveTuple::tcp((station(1), 49153), (station(2), 20))));
    }

    #[test]
    fn test_reduce_excludes_reverse_flows() {
        let mut monitor = FlowMonitorHandle::install([0, 1, 2]);
        let forward = FiveTuple::tcp((station(1), 49153), (BRIDGE, 20));

        monitor.record_tx(2, forward, 0, 576, SimTime::from_secs(2));
        let flow = monitor.record_tx(2, forward, 1, 576, SimTime::from_secs(3)).unwrap();
        monitor.record_rx(1, flow, 0, 576, SimTime::from_secs(4));
        monitor.record_rx(1, flow, 1, 576, SimTime::from_secs(6));
        let ack = monitor.record_tx(1, forward.reversed(), 2, 40, SimTime::from_secs(6)).unwrap();
        monitor.record_rx(2, ack, 2, 40, SimTime::from_secs(7));

        let reducer = FlowStatsReducer::new(FlowFilter::new(&[station(1)], BRIDGE));
        let reports = reducer.reduce(&monitor);

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.flow_id, flow);
        assert_eq!(report.tx_packets, 2);
        assert_eq!(report.rx_packets, 2);
        assert_eq!(report.time_first_tx, 2.0);
        assert_eq!(report.time_last_rx, Some(6.0));
        assert_eq!(report.total_delay, Some(4.0));
        // 1152 bytes over 4 s
        assert_eq!(report.throughput, Throughput::Kbps(1152.0 * 8.0 / 4.0 / 1024.0));
        assert_eq!(report.mean_delay, Some(2.5));
    }

    #[test]
    fn test_unanswered_flow_reports_no_data() {
        let record = FlowRecord {
            tx_packets: 1,
            tx_bytes: 40,
            time_first_tx_packet: SimTime::from_secs(2),
            time_last_tx_packet: SimTime::from_secs(2),
            ..Default::default()
        };
        let tuple = FiveTuple::tcp((station(1), 49153), (BRIDGE, 20));
        let reducer = FlowStatsReducer::new(FlowFilter::new(&[station(1)], BRIDGE));
        let reports = reducer.reduce_records([(1, tuple, &record)]);

        assert_eq!(reports[0].throughput, Throughput::NoData);
        assert_eq!(reports[0].time_last_rx, None);
        assert_eq!(reports[0].mean_delay, None);
    }
}
