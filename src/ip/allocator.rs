//! IP address allocation logic.
//!
//! Segments receive address blocks in a fixed, deterministic order. Either
//! the blocks are given explicitly (and checked for overlap up front) or they
//! are carved sequentially from a base block: `10.1.1.0/24`, `10.1.2.0/24`,
//! `10.1.3.0/24`, ... Inside a block, devices are numbered from the first host
//! address in the segment's attachment order.

use std::net::Ipv4Addr;

use log::{debug, info};

use super::block::{AddressBlock, AddressError};
use super::registry::GlobalIpRegistry;
use crate::topology::{SegmentId, Topology};

/// Compute `count` host addresses from `block`, in order.
///
/// Fails with [`AddressError::BlockExhausted`] when the block is too small.
pub fn plan_hosts(segment: &str, block: &AddressBlock, count: usize) -> Result<Vec<Ipv4Addr>, AddressError> {
    let capacity = block.host_capacity();
    if count as u64 > capacity {
        return Err(AddressError::BlockExhausted {
            segment: segment.to_string(),
            block: *block,
            capacity,
            requested: count,
        });
    }
    Ok((0..count as u64).filter_map(|i| block.host(i)).collect())
}

/// Hands out disjoint blocks to segments and host addresses to devices
#[derive(Debug)]
pub struct AddressAllocator {
    /// Explicit blocks still waiting to be handed out, in order
    planned: Vec<AddressBlock>,
    /// Next block for sequential allocation
    next: Option<AddressBlock>,
    issued: Vec<AddressBlock>,
    registry: GlobalIpRegistry,
}

impl AddressAllocator {
    /// Sequential allocation starting at `base`
    pub fn new(base: AddressBlock) -> Self {
        AddressAllocator {
            planned: Vec::new(),
            next: Some(base),
            issued: Vec::new(),
            registry: GlobalIpRegistry::new(),
        }
    }

    /// Use the given blocks, in order, before falling back to sequential
    /// allocation after the last one. Overlapping blocks are rejected.
    pub fn with_blocks(blocks: Vec<AddressBlock>) -> Result<Self, AddressError> {
        for (i, a) in blocks.iter().enumerate() {
            for b in &blocks[i + 1..] {
                if a.overlaps(b) {
                    return Err(AddressError::OverlappingBlocks(*a, *b));
                }
            }
        }
        let next = blocks.last().and_then(AddressBlock::next);
        let mut planned = blocks;
        planned.reverse();
        Ok(AddressAllocator {
            planned,
            next,
            issued: Vec::new(),
            registry: GlobalIpRegistry::new(),
        })
    }

    /// Take the next block, skipping any sequential candidate that would
    /// overlap a block already issued.
    pub fn next_block(&mut self) -> Result<AddressBlock, AddressError> {
        if let Some(block) = self.planned.pop() {
            self.issued.push(block);
            return Ok(block);
        }

        loop {
            let candidate = match self.next {
                Some(block) => block,
                None => {
                    let last = self
                        .issued
                        .last()
                        .copied()
                        .ok_or_else(|| AddressError::InvalidBlock("no address blocks configured".to_string()))?;
                    return Err(AddressError::SpaceExhausted(last));
                }
            };
            self.next = candidate.next();
            if self.issued.iter().all(|b| !b.overlaps(&candidate)) {
                self.issued.push(candidate);
                return Ok(candidate);
            }
            debug!("Skipping block {} (overlaps an issued block)", candidate);
        }
    }

    /// Assign addresses from `block` to every device of `segment`.
    ///
    /// Devices are numbered in attachment order from the block's first host.
    /// On success the devices and the segment record their addresses/block.
    pub fn assign(
        &mut self,
        topology: &mut Topology,
        segment: SegmentId,
        block: AddressBlock,
    ) -> Result<Vec<Ipv4Addr>, AddressError> {
        let seg = topology.segment(segment);
        let addresses = plan_hosts(&seg.name, &block, seg.devices.len())?;

        // Check all collisions before touching the topology
        let devices = seg.devices.clone();
        for (&device, &address) in devices.iter().zip(&addresses) {
            if let Some(owner) = self.registry.owner_of(address) {
                return Err(AddressError::DuplicateAddress {
                    address,
                    owner: owner.to_string(),
                });
            }
            let dev = topology.device(device);
            debug!("n{}/dev{} <- {}", dev.node, dev.index_on_node, address);
        }

        for (&device, &address) in devices.iter().zip(&addresses) {
            let dev = &mut topology.devices[device];
            self.registry
                .register(address, &format!("n{}/dev{}", dev.node, dev.index_on_node))?;
            dev.address = Some(address);
        }
        topology.segments[segment].block = Some(block);

        info!(
            "Assigned {} addresses from {} to segment '{}'",
            addresses.len(),
            block,
            topology.segment(segment).name
        );
        Ok(addresses)
    }

    /// Give every segment its own block and address all devices, in segment order
    pub fn assign_all(&mut self, topology: &mut Topology) -> Result<(), AddressError> {
        for segment in 0..topology.segments.len() {
            let block = self.next_block()?;
            self.assign(topology, segment, block)?;
        }
        Ok(())
    }

    pub fn issued_blocks(&self) -> &[AddressBlock] {
        &self.issued
    }

    pub fn registry(&self) -> &GlobalIpRegistry {
        &self.registry
    }
}
