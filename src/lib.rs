//! # wifisim - Mixed wired/wireless network scenario
//!
//! This library builds and runs a small discrete-event network scenario and
//! reports per-flow throughput and delay for the traffic that crosses it.
//!
//! ## Overview
//!
//! Three media are chained together:
//!
//! ```text
//!   Wifi 10.1.3.0
//!                  AP
//!  *    *    *    *
//!  |    |    |    |    10.1.1.0
//! n5   n6   n7   n0 -------------- n1   n2   n3   n4
//!                    point-to-point  |    |    |    |
//!                                    ================
//!                                      LAN 10.1.2.0
//! ```
//!
//! Every wireless station runs a bulk TCP source towards a packet sink on
//! the LAN bridge (`n1`). A flow monitor installed on every node records
//! per-flow counters; after the run the station → bridge flows are reduced
//! to throughput and delay figures.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Typed scenario configuration with defaults and validation
//! - `config_loader`: YAML loading and command-line overrides
//! - `ip`: Address blocks, sequential block allocation and the address registry
//! - `topology`: Nodes, devices and segments, the topology builder and station placement
//! - `traffic`: Sink and bulk-source applications and their installation
//! - `sim`: Simulated time, routing, the packet engine, flow monitor and ascii trace
//! - `analysis`: Flow filtering, throughput reduction and reports
//! - `utils`: Data-rate units and address plan validation
//! - `orchestrator`: One complete run, from configuration to written reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use wifisim::config::ScenarioConfig;
//! use wifisim::orchestrator::run_scenario;
//!
//! let mut config = ScenarioConfig::default();
//! config.nodes.n_wifi = 3;
//!
//! let outcome = run_scenario(&config)?;
//! for report in &outcome.reports {
//!     println!("flow {}: {}", report.flow_id, report.throughput);
//! }
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! Scenario files are YAML; every field is optional:
//!
//! ```yaml
//! general:
//!   stop_time: 10s
//!   tracing: true
//!   output_dir: results
//!
//! nodes:
//!   n_wifi: 3
//!   n_csma: 2
//!
//! point_to_point:
//!   data_rate: 10Gbps
//!   delay: 10ns
//!
//! wifi:
//!   data_mcs: 9
//!   channel_width_mhz: 160
//!
//! traffic:
//!   max_bytes: 655360
//!   sink: { start: 1s, stop: 10s }
//!   source: { start: 2s, stop: 10s }
//! ```
//!
//! ## Error Handling
//!
//! Configuration and addressing problems are typed (`ConfigError`,
//! `AddressError`, `SimError`) and detected before the run starts.
//! Application-level functions return `color_eyre::Result` with context.

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod ip;
pub mod orchestrator;
pub mod sim;
pub mod topology;
pub mod traffic;
pub mod utils;
