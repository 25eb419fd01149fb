//! Packet-level discrete-event engine.
//!
//! A single event loop executes callbacks in non-decreasing time order (FIFO
//! among equal times). Packets are store-and-forward: each hop costs the
//! serialization time on the segment's medium plus its propagation delay.
//! Point-to-point links have an independent channel per direction; the CSMA
//! bus and the wireless cell are one shared channel each, and every wireless
//! frame also pays a fixed access overhead.
//!
//! Transport is a thin connection model, not TCP: a source sends a SYN, the
//! destination answers SYN-ACK when a sink listens on the port (RST
//! otherwise), then the source streams segments back to back on its first
//! hop while the sink acknowledges every second segment.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use super::monitor::FlowMonitorHandle;
use super::routing::RoutingTable;
use super::time::SimTime;
use super::trace::{AsciiTracer, TraceOp};
use super::{RunSummary, Scheduler, SimError};
use crate::analysis::types::{FiveTuple, FlowId};
use crate::topology::{Medium, NodeId, SegmentId, Topology};
use crate::traffic::apps::{AppId, AppRole, TrafficPlan, TCP_IP_HEADER_BYTES};

/// Kind of transport segment carried by a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Syn,
    SynAck,
    Data,
    Ack,
    Rst,
}

impl SegmentKind {
    pub fn label(&self) -> &'static str {
        match self {
            SegmentKind::Syn => "SYN",
            SegmentKind::SynAck => "SYN-ACK",
            SegmentKind::Data => "DATA",
            SegmentKind::Ack => "ACK",
            SegmentKind::Rst => "RST",
        }
    }
}

#[derive(Debug, Clone)]
struct Packet {
    id: u64,
    tuple: FiveTuple,
    kind: SegmentKind,
    /// IP bytes on the wire
    bytes: u32,
    payload: u32,
    src: NodeId,
    dst: NodeId,
    flow: Option<FlowId>,
}

#[derive(Debug)]
enum EventKind {
    AppStart(AppId),
    AppStop(AppId),
    SourceSend(AppId),
    Arrive { packet: Packet, node: NodeId, segment: SegmentId },
    Stop,
}

#[derive(Debug)]
struct Event {
    time: SimTime,
    seq: u64,
    kind: EventKind,
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.cmp(&self.time).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Transmission channel: one per direction on point-to-point links, one per shared segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Directed(SegmentId, NodeId),
    Shared(SegmentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceState {
    Idle,
    Connecting,
    Connected,
    /// The whole byte budget has been handed to the network
    Completed,
    Refused,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceProgress {
    pub app: AppId,
    pub node: NodeId,
    pub state: SourceState,
    pub segments_sent: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Default)]
struct SinkState {
    listening: bool,
    received_bytes: u64,
    /// Data segments received per connection, for acknowledgement pacing
    segments: HashMap<FiveTuple, u64>,
}

/// Simulation context: owns the topology, the installed applications, the
/// event queue and the flow monitor for one run
#[derive(Debug)]
pub struct Simulation {
    topology: Topology,
    plan: TrafficPlan,
    routes: RoutingTable,
    addresses: HashMap<Ipv4Addr, NodeId>,
    now: SimTime,
    queue: BinaryHeap<Event>,
    next_seq: u64,
    next_packet: u64,
    busy_until: HashMap<Channel, SimTime>,
    wifi_access_overhead: SimTime,
    sources: HashMap<AppId, SourceProgress>,
    sinks: HashMap<AppId, SinkState>,
    monitor: Option<FlowMonitorHandle>,
    tracer: Option<AsciiTracer>,
    stopped: bool,
    destroyed: bool,
    events_processed: u64,
    dropped_at_stop: u64,
}

impl Simulation {
    /// Create the context for a fully configured topology and traffic plan.
    ///
    /// Routing tables are populated here and every application start/stop is
    /// scheduled.
    pub fn new(topology: Topology, plan: TrafficPlan, wifi_access_overhead: Duration) -> Self {
        let routes = RoutingTable::populate(&topology);
        let addresses = topology
            .devices
            .iter()
            .filter_map(|d| d.address.map(|a| (a, d.node)))
            .collect();

        let mut sim = Simulation {
            topology,
            plan,
            routes,
            addresses,
            now: SimTime::ZERO,
            queue: BinaryHeap::new(),
            next_seq: 0,
            next_packet: 0,
            busy_until: HashMap::new(),
            wifi_access_overhead: wifi_access_overhead.into(),
            sources: HashMap::new(),
            sinks: HashMap::new(),
            monitor: None,
            tracer: None,
            stopped: false,
            destroyed: false,
            events_processed: 0,
            dropped_at_stop: 0,
        };

        let windows: Vec<_> = sim.plan.applications.iter().map(|a| (a.id, a.node, a.window, a.is_sink())).collect();
        for (app, node, window, is_sink) in windows {
            if is_sink {
                sim.sinks.insert(app, SinkState::default());
            } else {
                sim.sources.insert(
                    app,
                    SourceProgress {
                        app,
                        node,
                        state: SourceState::Idle,
                        segments_sent: 0,
                        bytes_sent: 0,
                    },
                );
            }
            sim.schedule(window.start, EventKind::AppStart(app));
            sim.schedule(window.stop, EventKind::AppStop(app));
        }
        sim
    }

    /// Monitor every node
    pub fn install_monitor_all(&mut self) {
        self.install_monitor(0..self.topology.node_count());
    }

    pub fn install_monitor(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.monitor = Some(FlowMonitorHandle::install(nodes));
    }

    pub fn monitor(&self) -> Option<&FlowMonitorHandle> {
        self.monitor.as_ref()
    }

    pub fn monitor_mut(&mut self) -> Option<&mut FlowMonitorHandle> {
        self.monitor.as_mut()
    }

    /// Write an ascii trace of every packet event to `path`
    pub fn enable_ascii_trace(&mut self, path: &Path) -> Result<(), SimError> {
        self.tracer = Some(AsciiTracer::create(path)?);
        info!("Ascii trace enabled: {}", path.display());
        Ok(())
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn plan(&self) -> &TrafficPlan {
        &self.plan
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Progress of every bulk source, in application order
    pub fn source_progress(&self) -> Vec<SourceProgress> {
        let mut progress: Vec<_> = self.sources.values().cloned().collect();
        progress.sort_by_key(|p| p.app);
        progress
    }

    /// Bytes delivered to the sink application
    pub fn sink_received_bytes(&self) -> u64 {
        self.sinks.values().map(|s| s.received_bytes).sum()
    }

    fn schedule(&mut self, time: SimTime, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Event { time, seq, kind });
    }

    fn trace(&mut self, op: TraceOp, node: NodeId, segment: SegmentId, packet: &Packet) -> Result<(), SimError> {
        if let Some(tracer) = self.tracer.as_mut() {
            let device = self
                .topology
                .device_on(node, segment)
                .map(|d| d.index_on_node)
                .unwrap_or_default();
            tracer.record(op, self.now, node, device, &packet.tuple, packet.kind.label(), packet.bytes)?;
        }
        Ok(())
    }

    fn handle(&mut self, kind: EventKind) -> Result<(), SimError> {
        match kind {
            EventKind::AppStart(app) => self.on_app_start(app),
            EventKind::AppStop(app) => {
                self.on_app_stop(app);
                Ok(())
            }
            EventKind::SourceSend(app) => self.on_source_send(app),
            EventKind::Arrive { packet, node, segment } => self.on_arrive(packet, node, segment),
            EventKind::Stop => Ok(()),
        }
    }

    fn on_app_start(&mut self, app: AppId) -> Result<(), SimError> {
        let application = self.plan.app(app).clone();
        match application.role {
            AppRole::Sink { port } => {
                if let Some(sink) = self.sinks.get_mut(&app) {
                    sink.listening = true;
                }
                info!(target: "packet_sink", "n{} listening on port {} at {}s", application.node, port, self.now);
            }
            AppRole::BulkSource { .. } => {
                let (tuple, dst) = self.connection_of(app)?;
                if let Some(progress) = self.sources.get_mut(&app) {
                    progress.state = SourceState::Connecting;
                }
                info!(target: "bulk_send", "n{} connecting {} at {}s", application.node, tuple, self.now);

                let syn = self.new_packet(tuple, SegmentKind::Syn, 0, application.node, dst);
                self.originate(syn)?;
            }
        }
        Ok(())
    }

    fn on_app_stop(&mut self, app: AppId) {
        let node = self.plan.app(app).node;
        if let Some(sink) = self.sinks.get_mut(&app) {
            sink.listening = false;
            info!(target: "packet_sink", "n{} stopped at {}s, {} bytes received", node, self.now, sink.received_bytes);
        }
        if let Some(progress) = self.sources.get_mut(&app) {
            if matches!(progress.state, SourceState::Connecting | SourceState::Connected) {
                info!(
                    target: "bulk_send",
                    "n{} stopped at {}s after {} bytes",
                    node, self.now, progress.bytes_sent
                );
                progress.state = SourceState::Stopped;
            }
        }
    }

    fn on_source_send(&mut self, app: AppId) -> Result<(), SimError> {
        let Some(progress) = self.sources.get(&app) else {
            return Ok(());
        };
        if progress.state != SourceState::Connected {
            return Ok(());
        }
        let bytes_sent = progress.bytes_sent;
        let application = self.plan.app(app);
        let AppRole::BulkSource { max_bytes, segment_size, .. } = application.role else {
            return Ok(());
        };
        let node = application.node;
        let remaining = if max_bytes > 0 { max_bytes.saturating_sub(bytes_sent) } else { u64::MAX };
        let payload = remaining.min(u64::from(segment_size)) as u32;

        let (tuple, dst) = self.connection_of(app)?;
        let packet = self.new_packet(tuple, SegmentKind::Data, payload, node, dst);
        let cleared = self.originate(packet)?;

        let now = self.now;
        if let Some(progress) = self.sources.get_mut(&app) {
            progress.segments_sent += 1;
            progress.bytes_sent += u64::from(payload);
            if max_bytes > 0 && progress.bytes_sent >= max_bytes {
                progress.state = SourceState::Completed;
                info!(target: "bulk_send", "n{} sent all {} bytes at {}s", node, progress.bytes_sent, now);
                return Ok(());
            }
        }
        self.schedule(cleared, EventKind::SourceSend(app));
        Ok(())
    }

    /// Five-tuple and destination node of a source's connection
    fn connection_of(&self, app: AppId) -> Result<(FiveTuple, NodeId), SimError> {
        let application = self.plan.app(app);
        let AppRole::BulkSource { remote, local_port, .. } = application.role else {
            return Err(SimError::UnknownAddress(Ipv4Addr::UNSPECIFIED));
        };
        let dst = *self
            .addresses
            .get(remote.ip())
            .ok_or(SimError::UnknownAddress(*remote.ip()))?;
        let (segment, _) = self
            .routes
            .next_hop(application.node, dst)
            .ok_or(SimError::NoRoute { from: application.node, to: dst })?;
        let local = self
            .topology
            .address_on(application.node, segment)
            .ok_or(SimError::NoRoute { from: application.node, to: dst })?;
        Ok((FiveTuple::tcp((local, local_port), (*remote.ip(), remote.port())), dst))
    }

    fn new_packet(&mut self, tuple: FiveTuple, kind: SegmentKind, payload: u32, src: NodeId, dst: NodeId) -> Packet {
        let id = self.next_packet;
        self.next_packet += 1;
        Packet {
            id,
            tuple,
            kind,
            bytes: payload.saturating_add(TCP_IP_HEADER_BYTES),
            payload,
            src,
            dst,
            flow: None,
        }
    }

    /// Inject a packet at its source node. Returns when it clears the first hop.
    fn originate(&mut self, mut packet: Packet) -> Result<SimTime, SimError> {
        let now = self.now;
        if let Some(monitor) = self.monitor.as_mut() {
            packet.flow = monitor.record_tx(packet.src, packet.tuple, packet.id, packet.bytes, now);
        }
        let src = packet.src;
        self.transmit(packet, src)
    }

    /// Put `packet` on the wire from `from` towards its destination.
    /// Returns the time the channel finishes serializing it.
    fn transmit(&mut self, packet: Packet, from: NodeId) -> Result<SimTime, SimError> {
        let (segment, next) = self
            .routes
            .next_hop(from, packet.dst)
            .ok_or(SimError::NoRoute { from, to: packet.dst })?;
        let seg = self.topology.segment(segment);
        let (channel, overhead) = match seg.medium {
            Medium::PointToPoint => (Channel::Directed(segment, from), SimTime::ZERO),
            Medium::Csma => (Channel::Shared(segment), SimTime::ZERO),
            Medium::Wifi => (Channel::Shared(segment), self.wifi_access_overhead),
        };
        let rate = if packet.payload == 0 { seg.control_rate } else { seg.data_rate };
        let tx_time = overhead + SimTime::transmission(packet.bytes, rate.bps());
        let delay = SimTime::from(seg.delay);

        let busy = self.busy_until.entry(channel).or_insert(SimTime::ZERO);
        let start = (*busy).max(self.now);
        let cleared = start + tx_time;
        *busy = cleared;

        self.trace(TraceOp::Enqueue, from, segment, &packet)?;
        self.schedule(cleared + delay, EventKind::Arrive { packet, node: next, segment });
        Ok(cleared)
    }

    fn on_arrive(&mut self, packet: Packet, node: NodeId, segment: SegmentId) -> Result<(), SimError> {
        self.trace(TraceOp::Receive, node, segment, &packet)?;

        if node != packet.dst {
            if let (Some(monitor), Some(flow)) = (self.monitor.as_mut(), packet.flow) {
                monitor.record_forward(node, flow, packet.bytes);
            }
            self.transmit(packet, node)?;
            return Ok(());
        }

        let now = self.now;
        if let (Some(monitor), Some(flow)) = (self.monitor.as_mut(), packet.flow) {
            monitor.record_rx(node, flow, packet.id, packet.bytes, now);
        }
        self.deliver(packet, node)
    }

    /// Hand a packet to the transport endpoint on `node`
    fn deliver(&mut self, packet: Packet, node: NodeId) -> Result<(), SimError> {
        match packet.kind {
            SegmentKind::Syn => {
                let reply = if self.listening_sink(node, packet.tuple.destination_port).is_some() {
                    SegmentKind::SynAck
                } else {
                    warn!("n{}: no listener on port {}, refusing {}", node, packet.tuple.destination_port, packet.tuple);
                    SegmentKind::Rst
                };
                let response = self.new_packet(packet.tuple.reversed(), reply, 0, node, packet.src);
                self.originate(response)?;
            }
            SegmentKind::SynAck => {
                if let Some(app) = self.source_for(node, &packet.tuple) {
                    if let Some(progress) = self.sources.get_mut(&app) {
                        if progress.state == SourceState::Connecting {
                            progress.state = SourceState::Connected;
                            info!(target: "bulk_send", "n{} connected at {}s", node, self.now);
                            let now = self.now;
                            self.schedule(now, EventKind::SourceSend(app));
                        }
                    }
                }
            }
            SegmentKind::Rst => {
                if let Some(app) = self.source_for(node, &packet.tuple) {
                    if let Some(progress) = self.sources.get_mut(&app) {
                        warn!(target: "bulk_send", "n{} connection refused at {}s", node, self.now);
                        progress.state = SourceState::Refused;
                    }
                }
            }
            SegmentKind::Data => {
                let Some(app) = self.listening_sink(node, packet.tuple.destination_port) else {
                    debug!("n{}: data for closed port {} discarded", node, packet.tuple.destination_port);
                    return Ok(());
                };
                let send_ack = match self.sinks.get_mut(&app) {
                    Some(sink) => {
                        sink.received_bytes += u64::from(packet.payload);
                        let count = sink.segments.entry(packet.tuple).or_insert(0);
                        *count += 1;
                        *count % 2 == 0
                    }
                    None => false,
                };
                if send_ack {
                    let ack = self.new_packet(packet.tuple.reversed(), SegmentKind::Ack, 0, node, packet.src);
                    self.originate(ack)?;
                }
            }
            SegmentKind::Ack => {}
        }
        Ok(())
    }

    fn listening_sink(&self, node: NodeId, port: u16) -> Option<AppId> {
        self.topology.node(node).applications.iter().copied().find(|&app| {
            matches!(self.plan.app(app).role, AppRole::Sink { port: p } if p == port)
                && self.sinks.get(&app).is_some_and(|s| s.listening)
        })
    }

    /// The source on `node` whose connection a reply with `tuple` belongs to
    fn source_for(&self, node: NodeId, tuple: &FiveTuple) -> Option<AppId> {
        self.topology.node(node).applications.iter().copied().find(|&app| {
            matches!(
                self.plan.app(app).role,
                AppRole::BulkSource { remote, local_port, .. }
                    if *remote.ip() == tuple.source_address
                        && remote.port() == tuple.source_port
                        && local_port == tuple.destination_port
            )
        })
    }

    /// Trace and count packets still on the wire when the run stopped
    fn drain_at_stop(&mut self) -> Result<(), SimError> {
        while let Some(event) = self.queue.pop() {
            if let EventKind::Arrive { packet, node, segment } = event.kind {
                self.dropped_at_stop += 1;
                self.trace(TraceOp::Drop, node, segment, &packet)?;
            }
        }
        Ok(())
    }
}

impl Scheduler for Simulation {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule_stop(&mut self, at: SimTime) {
        self.schedule(at, EventKind::Stop);
    }

    fn run(&mut self) -> Result<RunSummary, SimError> {
        if self.destroyed {
            return Err(SimError::Destroyed);
        }
        if !self.stopped {
            info!("Run simulation.");
            while let Some(event) = self.queue.pop() {
                debug_assert!(event.time >= self.now);
                self.now = event.time;
                self.events_processed += 1;
                if matches!(event.kind, EventKind::Stop) {
                    self.stopped = true;
                    break;
                }
                self.handle(event.kind)?;
            }
            self.stopped = true;
            self.drain_at_stop()?;
            if let Some(tracer) = self.tracer.take() {
                let lines = tracer.lines();
                let path = tracer.finish()?;
                info!("Ascii trace ({} lines) written to {}", lines, path.display());
            }
        }

        Ok(RunSummary {
            end_time: self.now,
            events_processed: self.events_processed,
            packets_dropped_at_stop: self.dropped_at_stop,
            sink_received_bytes: self.sink_received_bytes(),
        })
    }

    fn destroy(&mut self) {
        self.queue.clear();
        self.busy_until.clear();
        self.sources.clear();
        self.sinks.clear();
        self.monitor = None;
        self.tracer = None;
        self.destroyed = true;
        info!("Done.");
    }
}
