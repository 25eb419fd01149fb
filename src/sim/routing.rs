//! Static shortest-hop routing over segments.
//!
//! Nodes sharing a segment are one hop apart. For every destination a
//! breadth-first search from that destination gives each node the segment
//! and neighbour to forward through. Ties resolve in device and attachment
//! order, so routes are deterministic.

use std::collections::VecDeque;

use log::debug;

use crate::topology::{NodeId, SegmentId, Topology};

/// Next hop towards a destination: the segment to send on and the neighbour to send to
pub type NextHop = (SegmentId, NodeId);

/// All-destinations next-hop table
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    /// `next_hop[dst][node]`
    next_hop: Vec<Vec<Option<NextHop>>>,
}

impl RoutingTable {
    /// Compute routes between every pair of nodes
    pub fn populate(topology: &Topology) -> Self {
        let next_hop = (0..topology.node_count())
            .map(|dst| Self::routes_towards(topology, dst))
            .collect();
        debug!("Populated routing tables for {} nodes", topology.node_count());
        RoutingTable { next_hop }
    }

    fn routes_towards(topology: &Topology, dst: NodeId) -> Vec<Option<NextHop>> {
        let mut hops = vec![None; topology.node_count()];
        let mut visited = vec![false; topology.node_count()];
        let mut queue = VecDeque::from([dst]);
        visited[dst] = true;

        while let Some(node) = queue.pop_front() {
            for segment in topology.segments_of(node) {
                for &device in &topology.segment(segment).devices {
                    let neighbour = topology.device(device).node;
                    if !visited[neighbour] {
                        visited[neighbour] = true;
                        hops[neighbour] = Some((segment, node));
                        queue.push_back(neighbour);
                    }
                }
            }
        }
        hops
    }

    /// Where `from` sends a packet addressed to `to`; `None` if unreachable or `from == to`
    pub fn next_hop(&self, from: NodeId, to: NodeId) -> Option<NextHop> {
        self.next_hop.get(to).and_then(|row| row.get(from)).copied().flatten()
    }

    /// Full node path from `from` to `to`, both ends included
    pub fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![from];
        let mut current = from;
        while current != to {
            let (_, next) = self.next_hop(current, to)?;
            path.push(next);
            current = next;
        }
        Some(path)
    }
}
