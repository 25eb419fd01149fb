//! Discrete-event simulation layer.
//!
//! The scenario talks to the simulator through two seams: a [`Scheduler`]
//! that owns simulated time and runs events, and a [`FlowMonitor`] that
//! classifies packets into flows and keeps per-flow statistics. The built-in
//! [`Simulation`] engine provides both.

pub mod engine;
pub mod monitor;
pub mod routing;
pub mod time;
pub mod trace;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

use color_eyre::eyre::Result;
use serde::Serialize;
use thiserror::Error;

use crate::analysis::types::{FiveTuple, FlowId, FlowRecord};
use crate::topology::NodeId;

pub use engine::{SegmentKind, Simulation, SourceProgress, SourceState};
pub use monitor::{FlowMonitorHandle, SerializeOptions};
pub use routing::RoutingTable;
pub use time::SimTime;
pub use trace::{AsciiTracer, TraceOp};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Simulation context has been destroyed")]
    Destroyed,

    #[error("Trace output failed: {0}")]
    Trace(#[from] std::io::Error),

    #[error("No route from n{from} to n{to}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("No node owns address {0}")]
    UnknownAddress(Ipv4Addr),
}

/// What a completed run reports back
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub end_time: SimTime,
    pub events_processed: u64,
    /// Packets still on the wire at the stop time
    pub packets_dropped_at_stop: u64,
    pub sink_received_bytes: u64,
}

/// Owner of simulated time.
///
/// Callbacks run in non-decreasing time order; nothing runs after the stop
/// time. `run` on a destroyed context fails with [`SimError::Destroyed`].
pub trait Scheduler {
    fn now(&self) -> SimTime;

    fn schedule_stop(&mut self, at: SimTime);

    /// Execute events until the stop time or until none remain
    fn run(&mut self) -> Result<RunSummary, SimError>;

    /// Release all simulation state
    fn destroy(&mut self);
}

/// Per-flow packet accounting installed on a set of nodes
pub trait FlowMonitor {
    fn flow_stats(&self) -> &BTreeMap<FlowId, FlowRecord>;

    /// Five-tuple of a flow identifier
    fn classify(&self, flow: FlowId) -> Option<FiveTuple>;

    /// Declare packets in flight longer than `max_delay` lost. Returns how many were.
    fn check_for_lost_packets(&mut self, now: SimTime, max_delay: SimTime) -> u64;

    fn serialize_to_file(&self, path: &Path, options: &SerializeOptions) -> Result<()>;
}
