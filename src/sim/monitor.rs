//! Flow monitoring.
//!
//! The monitor classifies every packet into a five-tuple flow when it enters
//! the network, and updates that flow's counters when it is forwarded and
//! when it reaches its destination.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use log::{debug, info};

use super::time::SimTime;
use super::FlowMonitor;
use crate::analysis::types::{FiveTuple, FlowId, FlowRecord, FlowSnapshot, ProbeStats, ScenarioInfo, SnapshotFlow};
use crate::topology::NodeId;

/// Options for [`FlowMonitor::serialize_to_file`]
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub pretty: bool,
    pub include_probes: bool,
    pub scenario: Option<ScenarioInfo>,
}

/// Monitor state owned by the simulation while it runs
#[derive(Debug, Default)]
pub struct FlowMonitorHandle {
    monitored: HashSet<NodeId>,
    classifier: HashMap<FiveTuple, FlowId>,
    tuples: BTreeMap<FlowId, FiveTuple>,
    flows: BTreeMap<FlowId, FlowRecord>,
    /// (flow, packet) -> time the packet entered the network
    in_flight: HashMap<(FlowId, u64), SimTime>,
    probes: BTreeMap<NodeId, BTreeMap<FlowId, ProbeStats>>,
}

impl FlowMonitorHandle {
    /// Install probes on `nodes`
    pub fn install(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let monitored: HashSet<NodeId> = nodes.into_iter().collect();
        info!("Flow monitor installed on {} nodes", monitored.len());
        FlowMonitorHandle {
            monitored,
            ..Default::default()
        }
    }

    pub fn is_monitored(&self, node: NodeId) -> bool {
        self.monitored.contains(&node)
    }

    fn probe(&mut self, node: NodeId, flow: FlowId, bytes: u32) {
        let stats = self.probes.entry(node).or_default().entry(flow).or_default();
        stats.packets += 1;
        stats.bytes += u64::from(bytes);
    }

    /// A packet left its source node. Returns the flow it belongs to, or
    /// `None` when the source is not monitored.
    pub fn record_tx(&mut self, node: NodeId, tuple: FiveTuple, packet: u64, bytes: u32, now: SimTime) -> Option<FlowId> {
        if !self.is_monitored(node) {
            return None;
        }
        let next_id = self.classifier.len() as FlowId + 1;
        let flow = *self.classifier.entry(tuple).or_insert(next_id);
        let record = self.flows.entry(flow).or_insert_with(|| {
            debug!("New flow {}: {}", flow, tuple);
            FlowRecord {
                time_first_tx_packet: now,
                ..Default::default()
            }
        });
        self.tuples.entry(flow).or_insert(tuple);

        record.tx_packets += 1;
        record.tx_bytes += u64::from(bytes);
        record.time_last_tx_packet = now;
        self.in_flight.insert((flow, packet), now);
        self.probe(node, flow, bytes);
        Some(flow)
    }

    /// A packet was forwarded by an intermediate node
    pub fn record_forward(&mut self, node: NodeId, flow: FlowId, bytes: u32) {
        if !self.is_monitored(node) {
            return;
        }
        if let Some(record) = self.flows.get_mut(&flow) {
            record.times_forwarded += 1;
        }
        self.probe(node, flow, bytes);
    }

    /// A packet reached its destination node
    pub fn record_rx(&mut self, node: NodeId, flow: FlowId, packet: u64, bytes: u32, now: SimTime) {
        if !self.is_monitored(node) {
            return;
        }
        let Some(sent_at) = self.in_flight.remove(&(flow, packet)) else {
            return;
        };
        let Some(record) = self.flows.get_mut(&flow) else {
            return;
        };

        let delay = now - sent_at;
        if let Some(previous) = record.last_delay {
            let diff = if delay > previous { delay - previous } else { previous - delay };
            record.jitter_sum = record.jitter_sum + diff;
        }
        record.last_delay = Some(delay);
        record.delay_sum = record.delay_sum + delay;
        record.rx_packets += 1;
        record.rx_bytes += u64::from(bytes);
        if record.time_first_rx_packet.is_none() {
            record.time_first_rx_packet = Some(now);
        }
        record.time_last_rx_packet = Some(now);
        self.probe(node, flow, bytes);
    }

    /// Packets that entered the network but have not arrived yet
    pub fn packets_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Build the serializable snapshot of every flow
    pub fn snapshot(&self, options: &SerializeOptions) -> FlowSnapshot {
        let flows = self
            .flows
            .iter()
            .filter_map(|(&flow_id, record)| {
                self.tuples.get(&flow_id).map(|&tuple| SnapshotFlow {
                    flow_id,
                    tuple,
                    record: record.clone(),
                })
            })
            .collect();

        FlowSnapshot {
            generated_at: chrono::Utc::now().to_rfc3339(),
            scenario: options.scenario.clone(),
            flows,
            probes: options.include_probes.then(|| self.probes.clone()),
        }
    }
}

impl FlowMonitor for FlowMonitorHandle {
    fn flow_stats(&self) -> &BTreeMap<FlowId, FlowRecord> {
        &self.flows
    }

    fn classify(&self, flow: FlowId) -> Option<FiveTuple> {
        self.tuples.get(&flow).copied()
    }

    fn check_for_lost_packets(&mut self, now: SimTime, max_delay: SimTime) -> u64 {
        let mut lost = 0;
        let flows = &mut self.flows;
        self.in_flight.retain(|&(flow, _), &mut sent_at| {
            if now - sent_at > max_delay {
                if let Some(record) = flows.get_mut(&flow) {
                    record.lost_packets += 1;
                }
                lost += 1;
                false
            } else {
                true
            }
        });
        if lost > 0 {
            info!("{} packets declared lost (in flight longer than {}s)", lost, max_delay);
        }
        lost
    }

    fn serialize_to_file(&self, path: &Path, options: &SerializeOptions) -> Result<()> {
        let snapshot = self.snapshot(options);
        let json = if options.pretty {
            serde_json::to_string_pretty(&snapshot)
        } else {
            serde_json::to_string(&snapshot)
        }
        .context("Failed to serialize flow snapshot")?;

        fs::write(path, json).with_context(|| format!("Failed to write flow snapshot to {}", path.display()))?;
        info!("Flow snapshot ({} flows) written to {}", snapshot.flows.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn tuple(src: u8) -> FiveTuple {
        FiveTuple::tcp((Ipv4Addr::new(10, 1, 3, src), 49153), (Ipv4Addr::new(10, 1, 2, 1), 20))
    }

    #[test]
    fn test_flow_ids_follow_first_observation() {
        let mut monitor = FlowMonitorHandle::install(0..4);
        assert_eq!(monitor.record_tx(2, tuple(2), 1, 40, SimTime::from_secs(2)), Some(1));
        assert_eq!(monitor.record_tx(3, tuple(3), 2, 40, SimTime::from_secs(2)), Some(2));
        assert_eq!(monitor.record_tx(2, tuple(2), 3, 576, SimTime::from_secs(3)), Some(1));
        assert_eq!(monitor.classify(2), Some(tuple(3)));
        assert_eq!(monitor.classify(9), None);

        let record = &monitor.flow_stats()[&1];
        assert_eq!(record.tx_packets, 2);
        assert_eq!(record.tx_bytes, 616);
        assert_eq!(record.time_first_tx_packet, SimTime::from_secs(2));
        assert_eq!(record.time_last_tx_packet, SimTime::from_secs(3));
    }

    #[test]
    fn test_unmonitored_nodes_are_ignored() {
        let mut monitor = FlowMonitorHandle::install([0]);
        assert_eq!(monitor.record_tx(5, tuple(2), 1, 40, SimTime::ZERO), None);
        assert!(monitor.flow_stats().is_empty());
    }

    #[test]
    fn test_delay_and_jitter() {
        let mut monitor = FlowMonitorHandle::install(0..2);
        let flow = monitor.record_tx(0, tuple(2), 1, 100, SimTime::from_micros(0)).unwrap();
        monitor.record_tx(0, tuple(2), 2, 100, SimTime::from_micros(10)).unwrap();
        monitor.record_rx(1, flow, 1, 100, SimTime::from_micros(5));
        monitor.record_rx(1, flow, 2, 100, SimTime::from_micros(18));

        let record = &monitor.flow_stats()[&flow];
        assert_eq!(record.rx_packets, 2);
        assert_eq!(record.rx_bytes, 200);
        assert_eq!(record.delay_sum, SimTime::from_micros(13));
        assert_eq!(record.jitter_sum, SimTime::from_micros(3));
        assert_eq!(record.time_first_rx_packet, Some(SimTime::from_micros(5)));
        assert_eq!(record.time_last_rx_packet, Some(SimTime::from_micros(18)));
        assert_eq!(monitor.packets_in_flight(), 0);
    }

    #[test]
    fn test_lost_packets() {
        let mut monitor = FlowMonitorHandle::install(0..2);
        let flow = monitor.record_tx(0, tuple(2), 1, 100, SimTime::from_secs(1)).unwrap();
        monitor.record_tx(0, tuple(2), 2, 100, SimTime::from_secs(9)).unwrap();

        let lost = monitor.check_for_lost_packets(SimTime::from_secs(10), SimTime::from_secs(5));
        assert_eq!(lost, 1);
        assert_eq!(monitor.flow_stats()[&flow].lost_packets, 1);
        assert_eq!(monitor.packets_in_flight(), 1);
    }

    #[test]
    fn test_serialize_includes_every_flow() {
        let mut monitor = FlowMonitorHandle::install(0..4);
        monitor.record_tx(2, tuple(2), 1, 40, SimTime::from_secs(2));
        monitor.record_tx(1, tuple(2).reversed(), 2, 40, SimTime::from_secs(2));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wifi-sim.flowmon");
        let options = SerializeOptions { pretty: true, include_probes: true, scenario: None };
        monitor.serialize_to_file(&path, &options).unwrap();

        let snapshot: FlowSnapshot = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(snapshot.flows.len(), 2);
        assert_eq!(snapshot.flows[1].tuple, tuple(2).reversed());
        assert!(snapshot.probes.is_some());
    }
}
