//! Topology type definitions.
//!
//! Nodes, devices and segments are stored in flat vectors inside
//! [`Topology`] and refer to each other by index. A node owns one device per
//! segment it is attached to.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ip::AddressBlock;
use crate::utils::units::DataRate;

pub type NodeId = usize;
pub type DeviceId = usize;
pub type SegmentId = usize;

/// Link technology shared by the members of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Medium {
    /// Full-duplex link between exactly two nodes
    PointToPoint,
    /// Shared half-duplex bus (CSMA LAN)
    Csma,
    /// Infrastructure wireless cell
    Wifi,
}

impl std::fmt::Display for Medium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Medium::PointToPoint => write!(f, "point-to-point"),
            Medium::Csma => write!(f, "csma"),
            Medium::Wifi => write!(f, "wifi"),
        }
    }
}

/// What a node is for in the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Point-to-point endpoint that also serves the wireless cell
    AccessPoint,
    /// Point-to-point endpoint that also sits on the bus
    BusBridge,
    /// Wireless station
    Station,
    /// Extra bus node
    BusHost,
}

/// Fixed 3D coordinates in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };
}

/// MAC behaviour of a wireless device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiMacRole {
    Station { active_probing: bool },
    AccessPoint,
}

/// Medium-specific device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeviceConfig {
    PointToPoint,
    Csma,
    Wifi {
        mac: WifiMacRole,
        ssid: String,
        channel_width_mhz: u16,
        spatial_streams: u8,
        antennas: u8,
        short_guard_interval: bool,
    },
}

impl DeviceConfig {
    pub fn medium(&self) -> Medium {
        match self {
            DeviceConfig::PointToPoint => Medium::PointToPoint,
            DeviceConfig::Csma => Medium::Csma,
            DeviceConfig::Wifi { .. } => Medium::Wifi,
        }
    }

    pub fn is_access_point(&self) -> bool {
        matches!(self, DeviceConfig::Wifi { mac: WifiMacRole::AccessPoint, .. })
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub role: NodeRole,
    pub devices: Vec<DeviceId>,
    pub applications: Vec<usize>,
    pub position: Option<Position>,
}

/// Attachment of one node to one segment
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub node: NodeId,
    pub segment: SegmentId,
    /// Position of this device in the owning node's device list
    pub index_on_node: usize,
    pub config: DeviceConfig,
    pub address: Option<Ipv4Addr>,
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    pub medium: Medium,
    pub data_rate: DataRate,
    /// Rate of payload-free segments (handshake, acknowledgements, resets)
    pub control_rate: DataRate,
    pub delay: Duration,
    /// Member devices in attachment order (also the address assignment order)
    pub devices: Vec<DeviceId>,
    pub block: Option<AddressBlock>,
}

/// The complete internetwork: nodes, devices and segments plus the handful
/// of well-known nodes the traffic and statistics layers need
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub nodes: Vec<Node>,
    pub devices: Vec<Device>,
    pub segments: Vec<Segment>,
    pub access_point: NodeId,
    pub bridge: NodeId,
    pub stations: Vec<NodeId>,
    pub bus_hosts: Vec<NodeId>,
    pub p2p_segment: SegmentId,
    pub csma_segment: SegmentId,
    pub wifi_segment: SegmentId,
}

impl Topology {
    pub(crate) fn add_node(&mut self, role: NodeRole) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            role,
            devices: Vec::new(),
            applications: Vec::new(),
            position: None,
        });
        id
    }

    pub(crate) fn add_segment(&mut self, name: &str, medium: Medium, data_rate: DataRate, delay: Duration) -> SegmentId {
        let id = self.segments.len();
        self.segments.push(Segment {
            id,
            name: name.to_string(),
            medium,
            data_rate,
            control_rate: data_rate,
            delay,
            devices: Vec::new(),
            block: None,
        });
        id
    }

    /// Create a device binding `node` to `segment`
    pub(crate) fn attach(&mut self, node: NodeId, segment: SegmentId, config: DeviceConfig) -> DeviceId {
        let id = self.devices.len();
        let index_on_node = self.nodes[node].devices.len();
        self.devices.push(Device {
            id,
            node,
            segment,
            index_on_node,
            config,
            address: None,
        });
        self.nodes[node].devices.push(id);
        self.segments[segment].devices.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id]
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id]
    }

    /// The device `node` uses on `segment`, if it is a member
    pub fn device_on(&self, node: NodeId, segment: SegmentId) -> Option<&Device> {
        self.nodes[node]
            .devices
            .iter()
            .map(|&d| &self.devices[d])
            .find(|d| d.segment == segment)
    }

    /// Address of `node` on `segment`, once addressing has run
    pub fn address_on(&self, node: NodeId, segment: SegmentId) -> Option<Ipv4Addr> {
        self.device_on(node, segment).and_then(|d| d.address)
    }

    /// Bus address of the bridge node, where the sink listens
    pub fn bridge_address(&self) -> Option<Ipv4Addr> {
        self.address_on(self.bridge, self.csma_segment)
    }

    /// Wireless addresses of all stations, in station order
    pub fn station_addresses(&self) -> Vec<Ipv4Addr> {
        self.stations
            .iter()
            .filter_map(|&n| self.address_on(n, self.wifi_segment))
            .collect()
    }

    /// Segments `node` is attached to
    pub fn segments_of(&self, node: NodeId) -> impl Iterator<Item = SegmentId> + '_ {
        self.nodes[node].devices.iter().map(move |&d| self.devices[d].segment)
    }

    pub fn access_points_in(&self, segment: SegmentId) -> usize {
        self.segments[segment]
            .devices
            .iter()
            .filter(|&&d| self.devices[d].config.is_access_point())
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
