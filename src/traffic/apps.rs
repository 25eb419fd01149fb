//! Application definitions.

use std::net::SocketAddrV4;

use serde::Serialize;

use crate::sim::SimTime;
use crate::topology::NodeId;

pub type AppId = usize;

/// First ephemeral port handed to a connecting source
pub const EPHEMERAL_PORT_BASE: u16 = 49153;

/// TCP/IP header bytes added to every segment
pub const TCP_IP_HEADER_BYTES: u32 = 40;

/// What an application does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AppRole {
    /// Accepts connections on `port` and discards what it receives
    Sink { port: u16 },
    /// Connects to `remote` and sends `max_bytes` as fast as the network
    /// allows (unbounded when zero)
    BulkSource {
        remote: SocketAddrV4,
        local_port: u16,
        max_bytes: u64,
        segment_size: u32,
    },
}

/// Interval in which an application runs: started at `start`, stopped at `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveWindow {
    pub start: SimTime,
    pub stop: SimTime,
}

impl ActiveWindow {
    pub fn contains(&self, time: SimTime) -> bool {
        self.start <= time && time < self.stop
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: AppId,
    pub node: NodeId,
    pub role: AppRole,
    pub window: ActiveWindow,
}

impl Application {
    pub fn is_sink(&self) -> bool {
        matches!(self.role, AppRole::Sink { .. })
    }

    pub fn is_source(&self) -> bool {
        matches!(self.role, AppRole::BulkSource { .. })
    }

    /// Number of segments a bounded source sends, `None` when unbounded
    pub fn segment_count(&self) -> Option<u64> {
        match self.role {
            AppRole::BulkSource { max_bytes, segment_size, .. } if max_bytes > 0 => {
                Some(max_bytes.div_ceil(u64::from(segment_size)))
            }
            _ => None,
        }
    }
}

/// Everything the orchestrator installed
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrafficPlan {
    pub applications: Vec<Application>,
    pub sink: AppId,
    pub sources: Vec<AppId>,
}

impl TrafficPlan {
    pub fn app(&self, id: AppId) -> &Application {
        &self.applications[id]
    }

    pub fn sink_app(&self) -> &Application {
        &self.applications[self.sink]
    }

    pub fn source_apps(&self) -> impl Iterator<Item = &Application> {
        self.sources.iter().map(|&id| &self.applications[id])
    }
}
