//! Post-configuration consistency checks.
//!
//! These run after addressing and before the simulation starts, so a broken
//! address plan is caught before any event executes.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::topology::Topology;

/// Validate the address plan of a fully addressed topology
///
/// Checks for:
/// - Devices without an address
/// - Addresses outside their segment's block
/// - Duplicate addresses
/// - Segment blocks that overlap
///
/// # Returns
/// * `Ok(())` if validation succeeds
/// * `Err(String)` with an error message if validation fails
pub fn validate_address_plan(topology: &Topology) -> Result<(), String> {
    let mut seen: HashMap<Ipv4Addr, usize> = HashMap::new();

    for segment in &topology.segments {
        let block = segment
            .block
            .ok_or_else(|| format!("Segment '{}' has no address block", segment.name))?;

        for &device_id in &segment.devices {
            let device = topology.device(device_id);
            let address = device
                .address
                .ok_or_else(|| format!("Device {} of node {} has no address", device.index_on_node, device.node))?;

            if !block.contains(address) {
                return Err(format!(
                    "Address {} of node {} is outside segment '{}' ({})",
                    address, device.node, segment.name, block
                ));
            }
            if let Some(other) = seen.insert(address, device.node) {
                return Err(format!("Address {} assigned to both node {} and node {}", address, other, device.node));
            }
        }
    }

    for (i, a) in topology.segments.iter().enumerate() {
        for b in &topology.segments[i + 1..] {
            if let (Some(x), Some(y)) = (a.block, b.block) {
                if x.overlaps(&y) {
                    return Err(format!("Segments '{}' and '{}' share address space ({} / {})", a.name, b.name, x, y));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NodeCounts, ScenarioConfig};
    use crate::ip::AddressAllocator;
    use crate::topology::TopologyBuilder;

    fn topology() -> Topology {
        let config = ScenarioConfig::default();
        TopologyBuilder::new(NodeCounts { n_csma: 2, n_wifi: 3 }, &config.point_to_point, &config.csma, &config.wifi)
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_plan() {
        let mut topology = topology();
        AddressAllocator::new("10.1.1.0/24".parse().unwrap()).assign_all(&mut topology).unwrap();
        assert!(validate_address_plan(&topology).is_ok());
    }

    #[test]
    fn test_unaddressed_topology_rejected() {
        let err = validate_address_plan(&topology()).unwrap_err();
        assert!(err.contains("no address block"));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut topology = topology();
        AddressAllocator::new("10.1.1.0/24".parse().unwrap()).assign_all(&mut topology).unwrap();
        let wifi = topology.wifi_segment;
        let first = topology.segments[wifi].devices[0];
        let second = topology.segments[wifi].devices[1];
        topology.devices[second].address = topology.devices[first].address;
        assert!(validate_address_plan(&topology).unwrap_err().contains("assigned to both"));
    }
}
