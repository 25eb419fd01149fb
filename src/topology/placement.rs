//! One-time node placement.
//!
//! Stations get independent uniform coordinates inside a cube, the access
//! point sits at the origin. Wired nodes have no position. Nothing moves
//! after placement.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::{Position, Topology};
use crate::config::PlacementBox;

/// Draw a position with every coordinate uniform in `[min, max]`
pub fn random_box_position<R: Rng>(rng: &mut R, volume: &PlacementBox) -> Position {
    let mut coord = || {
        if volume.min == volume.max {
            volume.min
        } else {
            rng.gen_range(volume.min..=volume.max)
        }
    };
    Position {
        x: coord(),
        y: coord(),
        z: coord(),
    }
}

/// Place all wireless nodes of `topology`
pub fn place_nodes(topology: &mut Topology, volume: &PlacementBox, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);

    for &station in &topology.stations {
        let position = random_box_position(&mut rng, volume);
        debug!("Station n{} placed at ({:.2}, {:.2}, {:.2})", station, position.x, position.y, position.z);
        topology.nodes[station].position = Some(position);
    }
    topology.nodes[topology.access_point].position = Some(Position::ORIGIN);
}
