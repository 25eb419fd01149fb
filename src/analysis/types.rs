//! Core data types for flow statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::sim::SimTime;
use crate::topology::NodeId;

/// Flow identifier, assigned from 1 in order of first observation
pub type FlowId = u32;

/// IANA protocol number for TCP
pub const PROTO_TCP: u8 = 6;

/// Classification key of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiveTuple {
    pub source_address: Ipv4Addr,
    pub destination_address: Ipv4Addr,
    pub protocol: u8,
    pub source_port: u16,
    pub destination_port: u16,
}

impl FiveTuple {
    pub fn tcp(source: (Ipv4Addr, u16), destination: (Ipv4Addr, u16)) -> Self {
        FiveTuple {
            source_address: source.0,
            destination_address: destination.0,
            protocol: PROTO_TCP,
            source_port: source.1,
            destination_port: destination.1,
        }
    }

    /// The tuple of traffic flowing the other way
    pub fn reversed(&self) -> Self {
        FiveTuple {
            source_address: self.destination_address,
            destination_address: self.source_address,
            protocol: self.protocol,
            source_port: self.destination_port,
            destination_port: self.source_port,
        }
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} > {}:{} proto {}",
            self.source_address, self.source_port, self.destination_address, self.destination_port, self.protocol
        )
    }
}

/// Raw per-flow counters accumulated by the monitor during a run.
///
/// Packet and byte counts are IP-level (headers included). Transmit-side
/// fields are updated where the packet enters the network, receive-side
/// fields where it leaves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub lost_packets: u64,
    pub times_forwarded: u64,
    pub time_first_tx_packet: SimTime,
    pub time_last_tx_packet: SimTime,
    pub time_first_rx_packet: Option<SimTime>,
    pub time_last_rx_packet: Option<SimTime>,
    /// Sum of one-way delays of received packets
    pub delay_sum: SimTime,
    /// Sum of absolute differences between consecutive one-way delays
    pub jitter_sum: SimTime,
    pub last_delay: Option<SimTime>,
}

/// Throughput of a reported flow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Throughput {
    /// Kilobits (1024 bits) per second
    Kbps(f64),
    /// Nothing was received, or first transmission and last reception
    /// coincide, so no rate can be computed
    NoData,
}

impl Throughput {
    pub fn kbps(&self) -> Option<f64> {
        match self {
            Throughput::Kbps(v) => Some(*v),
            Throughput::NoData => None,
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Throughput::Kbps(v) => write!(f, "{:.2} Kbps", v),
            Throughput::NoData => write!(f, "n/a (no data received)"),
        }
    }
}

/// Derived view of one flow that passed the report filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub flow_id: FlowId,
    pub tuple: FiveTuple,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    /// Seconds
    pub time_first_tx: f64,
    /// Seconds; `None` when nothing was received
    pub time_last_rx: Option<f64>,
    /// `time_last_rx - time_first_tx` in seconds
    pub total_delay: Option<f64>,
    pub throughput: Throughput,
    /// Average one-way packet delay in seconds
    pub mean_delay: Option<f64>,
}

/// Packets and bytes a single node saw for one flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeStats {
    pub packets: u64,
    pub bytes: u64,
}

/// Scenario facts stored alongside the flows so the snapshot can be
/// filtered again offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub n_wifi: u32,
    pub n_csma: u32,
    /// Seconds
    pub stop_time: f64,
    pub station_addresses: Vec<Ipv4Addr>,
    pub bridge_address: Ipv4Addr,
    pub sink_port: u16,
}

/// One flow in the serialized snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFlow {
    pub flow_id: FlowId,
    pub tuple: FiveTuple,
    #[serde(flatten)]
    pub record: FlowRecord,
}

/// Complete serialized record of a run: every flow, not only the reported ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioInfo>,
    pub flows: Vec<SnapshotFlow>,
    /// Per-node, per-flow counters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probes: Option<BTreeMap<NodeId, BTreeMap<FlowId, ProbeStats>>>,
}
