//! Flow statistics analysis.
//!
//! Reduces the monitor's flow table to the station → bridge flows, derives
//! throughput and delay, and renders console and JSON reports.

pub mod flow_stats;
pub mod report;
pub mod types;

pub use flow_stats::{build_report, compute_throughput, EndpointRole, FlowFilter, FlowStatsReducer};
pub use report::{generate_json_report, load_snapshot, print_flow_blocks, print_summary};
pub use types::*;
