//! Mixed-medium topology construction.
//!
//! The scenario is always the same shape:
//!
//! ```text
//!   Wifi 10.1.3.0
//!                 AP
//!  *    *    *    *
//!  |    |    |    |    10.1.1.0
//! n5   n6   n7   n0 -------------- n1   n2   n3   n4
//!                   point-to-point  |    |    |    |
//!                                   ================
//!                                     LAN 10.1.2.0
//! ```
//!
//! Node 0 is the access point, node 1 bridges the backbone to the LAN,
//! `n_csma` extra LAN hosts follow, then `n_wifi` stations.

use log::{debug, info};

use super::placement::place_nodes;
use super::types::{DeviceConfig, Medium, NodeRole, Topology, WifiMacRole};
use crate::config::{ConfigError, LinkConfig, NodeCounts, WifiConfig};

/// Builds the three-segment internetwork from typed configuration
#[derive(Debug, Clone)]
pub struct TopologyBuilder<'a> {
    counts: NodeCounts,
    point_to_point: &'a LinkConfig,
    csma: &'a LinkConfig,
    wifi: &'a WifiConfig,
    seed: u64,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(counts: NodeCounts, point_to_point: &'a LinkConfig, csma: &'a LinkConfig, wifi: &'a WifiConfig) -> Self {
        TopologyBuilder {
            counts,
            point_to_point,
            csma,
            wifi,
            seed: 1,
        }
    }

    /// Seed for station placement
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn wifi_device(&self, mac: WifiMacRole) -> DeviceConfig {
        DeviceConfig::Wifi {
            mac,
            ssid: self.wifi.ssid.clone(),
            channel_width_mhz: self.wifi.channel_width_mhz,
            spatial_streams: self.wifi.spatial_streams,
            antennas: self.wifi.antennas,
            short_guard_interval: self.wifi.short_guard_interval,
        }
    }

    /// Create all nodes, segments and devices, and place the wireless nodes.
    ///
    /// Node counts are validated first; on error nothing is built.
    pub fn build(&self) -> Result<Topology, ConfigError> {
        self.counts.validate()?;
        self.wifi.validate()?;

        let mut topology = Topology::default();

        // Backbone: n0 (future AP) <-> n1 (LAN bridge)
        let ap = topology.add_node(NodeRole::AccessPoint);
        let bridge = topology.add_node(NodeRole::BusBridge);
        let p2p = topology.add_segment(
            "point-to-point",
            Medium::PointToPoint,
            self.point_to_point.data_rate,
            self.point_to_point.delay,
        );
        topology.attach(ap, p2p, DeviceConfig::PointToPoint);
        topology.attach(bridge, p2p, DeviceConfig::PointToPoint);

        // LAN: bridge first, then the extra hosts
        let csma = topology.add_segment("csma", Medium::Csma, self.csma.data_rate, self.csma.delay);
        topology.attach(bridge, csma, DeviceConfig::Csma);
        for _ in 0..self.counts.n_csma {
            let host = topology.add_node(NodeRole::BusHost);
            topology.attach(host, csma, DeviceConfig::Csma);
            topology.bus_hosts.push(host);
        }

        // Wireless cell: stations first, the access point last
        let wifi = topology.add_segment("wifi", Medium::Wifi, self.wifi.data_rate(), self.wifi.delay);
        topology.segments[wifi].control_rate = self.wifi.control_rate();
        for _ in 0..self.counts.n_wifi {
            let station = topology.add_node(NodeRole::Station);
            topology.attach(
                station,
                wifi,
                self.wifi_device(WifiMacRole::Station {
                    active_probing: self.wifi.active_probing,
                }),
            );
            topology.stations.push(station);
        }
        topology.attach(ap, wifi, self.wifi_device(WifiMacRole::AccessPoint));

        topology.access_point = ap;
        topology.bridge = bridge;
        topology.p2p_segment = p2p;
        topology.csma_segment = csma;
        topology.wifi_segment = wifi;

        place_nodes(&mut topology, &self.wifi.placement, self.seed);

        for segment in &topology.segments {
            debug!(
                "Segment '{}' ({}): {} devices at {} (control {}), delay {:?}",
                segment.name,
                segment.medium,
                segment.devices.len(),
                segment.data_rate,
                segment.control_rate,
                segment.delay
            );
        }
        info!(
            "Built topology: {} nodes ({} stations, {} extra LAN hosts), {} devices",
            topology.node_count(),
            topology.stations.len(),
            topology.bus_hosts.len(),
            topology.devices.len()
        );
        Ok(topology)
    }
}
