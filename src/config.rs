//! Scenario configuration.
//!
//! Every tunable of the scenario lives in a typed struct here. All fields
//! have defaults that reproduce the reference scenario (10 Gbps backbone and
//! LAN, 802.11ac cell at VHT-MCS 9 / 160 MHz, one bulk TCP source per station
//! sending 655360 bytes to a sink on the LAN bridge), so an empty YAML file
//! is a valid configuration.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ip::{AddressBlock, AddressError};
use crate::utils::units::DataRate;

/// Upper bound on stations and on extra bus nodes
pub const MAX_NODES_PER_SEGMENT: u32 = 250;

/// Largest TCP payload that keeps a 40-byte TCP/IP header inside a 16-bit IP length
pub const MAX_SEGMENT_SIZE: u32 = 65_495;

/// Configuration errors. All of them are fatal and detected before any
/// node is created.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Too many wifi or csma nodes ({n_wifi} wifi, {n_csma} csma), no more than {max} each")]
    TooManyNodes { n_wifi: u32, n_csma: u32, max: u32 },
    #[error("Invalid application window: {0}")]
    InvalidWindow(String),
    #[error("Invalid wifi configuration: {0}")]
    InvalidWifi(String),
    #[error("Invalid traffic configuration: {0}")]
    InvalidTraffic(String),
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Complete scenario description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub general: GeneralConfig,
    pub nodes: NodeCounts,
    pub point_to_point: LinkConfig,
    pub csma: LinkConfig,
    pub wifi: WifiConfig,
    pub addressing: AddressingConfig,
    pub traffic: TrafficConfig,
}

impl ScenarioConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.nodes.validate()?;

        if self.general.stop_time.is_zero() {
            return Err(ConfigError::InvalidGeneral("stop_time must be positive".to_string()));
        }
        if self.general.flowmon_file.as_os_str().is_empty() {
            return Err(ConfigError::InvalidGeneral("flowmon_file cannot be empty".to_string()));
        }

        self.wifi.validate()?;
        self.traffic.validate()?;
        self.addressing.validate()?;
        Ok(())
    }
}

/// Run-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Hard stop of the run
    #[serde(with = "humantime_serde")]
    pub stop_time: Duration,
    /// Seed for station placement
    pub seed: u64,
    /// Log bulk-send application activity
    pub verbose: bool,
    /// Write the ascii packet trace
    pub tracing: bool,
    pub output_dir: PathBuf,
    /// Serialized snapshot of all flows, always written
    pub flowmon_file: PathBuf,
    pub trace_file: PathBuf,
    pub report_file: PathBuf,
    /// Packets in flight for longer than this are declared lost
    #[serde(with = "humantime_serde")]
    pub max_per_hop_delay: Duration,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            stop_time: Duration::from_secs(10),
            seed: 1,
            verbose: true,
            tracing: true,
            output_dir: PathBuf::from("."),
            flowmon_file: PathBuf::from("wifi-sim.flowmon"),
            trace_file: PathBuf::from("ascii-log.tr"),
            report_file: PathBuf::from("flow_report.json"),
            max_per_hop_delay: Duration::from_secs(10),
        }
    }
}

/// How many nodes to create beyond the fixed backbone pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeCounts {
    /// Extra bus nodes besides the bridge
    pub n_csma: u32,
    /// Wireless stations
    pub n_wifi: u32,
}

impl Default for NodeCounts {
    fn default() -> Self {
        Self { n_csma: 0, n_wifi: 1 }
    }
}

impl NodeCounts {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_wifi > MAX_NODES_PER_SEGMENT || self.n_csma > MAX_NODES_PER_SEGMENT {
            return Err(ConfigError::TooManyNodes {
                n_wifi: self.n_wifi,
                n_csma: self.n_csma,
                max: MAX_NODES_PER_SEGMENT,
            });
        }
        Ok(())
    }
}

/// Wired segment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub data_rate: DataRate,
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            data_rate: DataRate::from_gbps(10),
            delay: Duration::from_nanos(10),
        }
    }
}

/// Supported wireless standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiStandard {
    #[serde(rename = "802.11ac")]
    Ieee80211ac,
}

/// Placement volume for stations: every coordinate is drawn uniformly from [min, max]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementBox {
    pub min: f64,
    pub max: f64,
}

impl Default for PlacementBox {
    fn default() -> Self {
        Self { min: 3.0, max: 10.0 }
    }
}

/// Wireless cell parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub standard: WifiStandard,
    pub ssid: String,
    /// Constant-rate VHT MCS index for data frames
    pub data_mcs: u8,
    /// Constant-rate VHT MCS index for control frames
    pub control_mcs: u8,
    pub channel_width_mhz: u16,
    pub antennas: u8,
    pub spatial_streams: u8,
    pub short_guard_interval: bool,
    /// Stations associate passively (no probe requests)
    pub active_probing: bool,
    /// Fixed per-frame medium access cost (IFS, backoff, preamble, ack)
    #[serde(with = "humantime_serde")]
    pub access_overhead: Duration,
    /// Propagation delay inside the cell
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    pub placement: PlacementBox,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            standard: WifiStandard::Ieee80211ac,
            ssid: "ns3-80211ac".to_string(),
            data_mcs: 9,
            control_mcs: 0,
            channel_width_mhz: 160,
            antennas: 4,
            spatial_streams: 4,
            short_guard_interval: true,
            active_probing: false,
            access_overhead: Duration::from_micros(100),
            delay: Duration::from_nanos(33),
            placement: PlacementBox::default(),
        }
    }
}

/// Data subcarriers per VHT channel width
fn vht_data_subcarriers(channel_width_mhz: u16) -> Option<f64> {
    match channel_width_mhz {
        20 => Some(52.0),
        40 => Some(108.0),
        80 => Some(234.0),
        160 => Some(468.0),
        _ => None,
    }
}

/// Coded bits per subcarrier per stream (modulation order x coding rate)
fn vht_bits_per_subcarrier(mcs: u8) -> Option<f64> {
    match mcs {
        0 => Some(0.5),
        1 => Some(1.0),
        2 => Some(1.5),
        3 => Some(2.0),
        4 => Some(3.0),
        5 => Some(4.0),
        6 => Some(4.5),
        7 => Some(5.0),
        8 => Some(6.0),
        9 => Some(20.0 / 3.0),
        _ => None,
    }
}

impl WifiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if vht_data_subcarriers(self.channel_width_mhz).is_none() {
            return Err(ConfigError::InvalidWifi(format!(
                "channel width {} MHz is not one of 20, 40, 80, 160",
                self.channel_width_mhz
            )));
        }
        for (name, mcs) in [("data_mcs", self.data_mcs), ("control_mcs", self.control_mcs)] {
            if vht_bits_per_subcarrier(mcs).is_none() {
                return Err(ConfigError::InvalidWifi(format!("{} {} is not a VHT MCS (0-9)", name, mcs)));
            }
        }
        if !(1..=8).contains(&self.spatial_streams) {
            return Err(ConfigError::InvalidWifi(format!(
                "spatial_streams must be 1-8, got {}",
                self.spatial_streams
            )));
        }
        if self.spatial_streams > self.antennas {
            return Err(ConfigError::InvalidWifi(format!(
                "{} spatial streams need at least as many antennas (have {})",
                self.spatial_streams, self.antennas
            )));
        }
        if self.ssid.is_empty() {
            return Err(ConfigError::InvalidWifi("ssid cannot be empty".to_string()));
        }
        if !self.placement.min.is_finite() || !self.placement.max.is_finite() {
            return Err(ConfigError::InvalidWifi(format!(
                "placement bounds must be finite, got [{}, {}]",
                self.placement.min, self.placement.max
            )));
        }
        if self.placement.min > self.placement.max {
            return Err(ConfigError::InvalidWifi(format!(
                "placement min {} exceeds max {}",
                self.placement.min, self.placement.max
            )));
        }
        Ok(())
    }

    /// PHY rate of data frames for the configured MCS, width, streams and guard interval
    pub fn data_rate(&self) -> DataRate {
        self.phy_rate(self.data_mcs)
    }

    pub fn control_rate(&self) -> DataRate {
        self.phy_rate(self.control_mcs)
    }

    fn phy_rate(&self, mcs: u8) -> DataRate {
        let subcarriers = vht_data_subcarriers(self.channel_width_mhz).unwrap_or(52.0);
        let bits = vht_bits_per_subcarrier(mcs).unwrap_or(0.5);
        let symbol_secs = if self.short_guard_interval { 3.6e-6 } else { 4.0e-6 };
        let bps = subcarriers * bits * f64::from(self.spatial_streams) / symbol_secs;
        DataRate::from_bps(bps.round() as u64)
    }
}

/// Address planning: a base block carved sequentially, or explicit blocks
/// in segment order (point-to-point, csma, wifi)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingConfig {
    pub base: AddressBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<AddressBlock>>,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            base: AddressBlock::with_mask(Ipv4Addr::new(10, 1, 1, 0), Ipv4Addr::new(255, 255, 255, 0))
                .expect("default block is valid"),
            blocks: None,
        }
    }
}

impl AddressingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(blocks) = &self.blocks {
            for (i, a) in blocks.iter().enumerate() {
                for b in &blocks[i + 1..] {
                    if a.overlaps(b) {
                        return Err(AddressError::OverlappingBlocks(*a, *b).into());
                    }
                }
            }
        }
        Ok(())
    }
}

/// An application's active interval, relative to the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(with = "humantime_serde")]
    pub start: Duration,
    #[serde(with = "humantime_serde")]
    pub stop: Duration,
}

/// Sink and bulk-source parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Well-known port the sink listens on
    pub port: u16,
    /// Bytes each source sends; zero means unlimited
    pub max_bytes: u64,
    /// TCP payload bytes per segment
    pub segment_size: u32,
    pub sink: WindowConfig,
    pub source: WindowConfig,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            port: 20,
            max_bytes: 655_360,
            segment_size: 536,
            sink: WindowConfig {
                start: Duration::from_secs(1),
                stop: Duration::from_secs(10),
            },
            source: WindowConfig {
                start: Duration::from_secs(2),
                stop: Duration::from_secs(10),
            },
        }
    }
}

impl TrafficConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SEGMENT_SIZE).contains(&self.segment_size) {
            return Err(ConfigError::InvalidTraffic(format!(
                "segment_size must be 1-{}, got {}",
                MAX_SEGMENT_SIZE, self.segment_size
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidTraffic("port 0 is reserved".to_string()));
        }
        for (name, window) in [("sink", &self.sink), ("source", &self.source)] {
            if window.start >= window.stop {
                return Err(ConfigError::InvalidWindow(format!(
                    "{} window starts at {:?} but stops at {:?}",
                    name, window.start, window.stop
                )));
            }
        }
        if self.source.start <= self.sink.start {
            return Err(ConfigError::InvalidWindow(format!(
                "sources start at {:?}, not after the sink ({:?})",
                self.source.start, self.sink.start
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScenarioConfig::default();
        config.validate().unwrap();
        assert_eq!(config.nodes, NodeCounts { n_csma: 0, n_wifi: 1 });
        assert_eq!(config.addressing.base.to_string(), "10.1.1.0/24");
    }

    #[test]
    fn test_node_count_bounds() {
        assert!(NodeCounts { n_csma: 250, n_wifi: 250 }.validate().is_ok());
        assert!(matches!(
            NodeCounts { n_csma: 0, n_wifi: 251 }.validate(),
            Err(ConfigError::TooManyNodes { n_wifi: 251, .. })
        ));
        assert!(NodeCounts { n_csma: 251, n_wifi: 1 }.validate().is_err());
    }

    #[test]
    fn test_vht_rate() {
        // VHT-MCS 9, 160 MHz, 4 streams, short GI
        let wifi = WifiConfig::default();
        assert_eq!(wifi.data_rate().bps(), 3_466_666_667);

        let narrow = WifiConfig {
            channel_width_mhz: 20,
            spatial_streams: 1,
            short_guard_interval: false,
            ..WifiConfig::default()
        };
        assert_eq!(narrow.control_rate().bps(), 6_500_000);
    }

    #[test]
    fn test_invalid_wifi() {
        let wifi = WifiConfig { channel_width_mhz: 60, ..WifiConfig::default() };
        assert!(matches!(wifi.validate(), Err(ConfigError::InvalidWifi(_))));

        let wifi = WifiConfig { spatial_streams: 4, antennas: 2, ..WifiConfig::default() };
        assert!(wifi.validate().is_err());

        let wifi = WifiConfig { data_mcs: 10, ..WifiConfig::default() };
        assert!(wifi.validate().is_err());
    }

    #[test]
    fn test_placement_bounds_must_be_finite() {
        let mut wifi = WifiConfig::default();
        wifi.placement.max = f64::INFINITY;
        assert!(matches!(wifi.validate(), Err(ConfigError::InvalidWifi(_))));

        let mut wifi = WifiConfig::default();
        wifi.placement.min = f64::NEG_INFINITY;
        assert!(wifi.validate().is_err());

        let mut wifi = WifiConfig::default();
        wifi.placement.min = f64::NAN;
        assert!(wifi.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.wifi.placement.max = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_segment_size_bounds() {
        let mut traffic = TrafficConfig::default();
        traffic.segment_size = MAX_SEGMENT_SIZE;
        traffic.validate().unwrap();

        traffic.segment_size = MAX_SEGMENT_SIZE + 1;
        assert!(matches!(traffic.validate(), Err(ConfigError::InvalidTraffic(_))));

        traffic.segment_size = 0;
        assert!(traffic.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.traffic.segment_size = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTraffic(_))));
    }

    #[test]
    fn test_sources_must_start_after_sink() {
        let mut traffic = TrafficConfig::default();
        traffic.source.start = traffic.sink.start;
        assert!(matches!(traffic.validate(), Err(ConfigError::InvalidWindow(_))));

        let mut traffic = TrafficConfig::default();
        traffic.sink.stop = traffic.sink.start;
        assert!(traffic.validate().is_err());
    }

    #[test]
    fn test_overlapping_explicit_blocks() {
        let addressing = AddressingConfig {
            blocks: Some(vec!["10.0.0.0/8".parse().unwrap(), "10.1.2.0/24".parse().unwrap()]),
            ..AddressingConfig::default()
        };
        assert!(matches!(addressing.validate(), Err(ConfigError::Address(_))));
    }
}
