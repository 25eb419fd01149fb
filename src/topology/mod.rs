//! Network topology module.
//!
//! This module builds the point-to-point, CSMA and Wi-Fi segments, attaches
//! devices to nodes and places the wireless nodes.

pub mod builder;
pub mod placement;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::TopologyBuilder;
pub use placement::place_nodes;
pub use types::{
    Device, DeviceConfig, DeviceId, Medium, Node, NodeId, NodeRole, Position, Segment, SegmentId, Topology,
    WifiMacRole,
};
