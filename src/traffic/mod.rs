//! Traffic applications: a packet sink and bulk TCP sources.

pub mod apps;
pub mod orchestrator;

pub use apps::{ActiveWindow, AppId, AppRole, Application, TrafficPlan};
pub use orchestrator::install_traffic;
