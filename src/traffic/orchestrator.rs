//! Traffic installation.
//!
//! One sink on the LAN bridge, one bulk source on every wireless station,
//! all sources aimed at the sink's address and port. Sources differ only by
//! their own address, which is what the flow filter later keys on.

use std::net::SocketAddrV4;

use log::info;

use super::apps::{ActiveWindow, AppRole, Application, TrafficPlan, EPHEMERAL_PORT_BASE};
use crate::config::{ConfigError, TrafficConfig, WindowConfig};
use crate::topology::Topology;

fn window(config: &WindowConfig) -> ActiveWindow {
    ActiveWindow {
        start: config.start.into(),
        stop: config.stop.into(),
    }
}

/// Install the sink and the bulk sources. Addresses must already be assigned.
pub fn install_traffic(topology: &mut Topology, config: &TrafficConfig) -> Result<TrafficPlan, ConfigError> {
    config.validate()?;

    let sink_address = topology.bridge_address().ok_or_else(|| {
        ConfigError::InvalidTraffic("the LAN bridge has no address; assign addresses before traffic".to_string())
    })?;
    let remote = SocketAddrV4::new(sink_address, config.port);

    let mut plan = TrafficPlan::default();

    let sink = Application {
        id: 0,
        node: topology.bridge,
        role: AppRole::Sink { port: config.port },
        window: window(&config.sink),
    };
    topology.nodes[sink.node].applications.push(sink.id);
    plan.sink = sink.id;
    plan.applications.push(sink);

    for &station in &topology.stations {
        let id = plan.applications.len();
        plan.applications.push(Application {
            id,
            node: station,
            role: AppRole::BulkSource {
                remote,
                local_port: EPHEMERAL_PORT_BASE,
                max_bytes: config.max_bytes,
                segment_size: config.segment_size,
            },
            window: window(&config.source),
        });
        topology.nodes[station].applications.push(id);
        plan.sources.push(id);
    }

    info!(
        "Installed sink on n{} ({}) and {} bulk sources ({} bytes each)",
        topology.bridge,
        remote,
        plan.sources.len(),
        config.max_bytes
    );
    Ok(plan)
}
