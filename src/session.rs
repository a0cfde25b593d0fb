use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ControllerConfig;
use crate::connection::{
    Connection, ConnectionError, ConnectionId, HandshakeState, TransportCommand,
};
use crate::dispatch::DispatchTable;
use crate::event::ControllerEvent;
use crate::keepalive;
use crate::message::{FlowStats, Message, MultipartReplyBody, PortDesc};
use crate::multipart::{Reassembly, ReplyCategory};
use crate::ofp_header::{OfpHeader, OfpVersion, Xid};
use crate::ofp_serialization::{self, MessageSlicer};
use crate::switch::{DatapathId, PortChange, SwitchRegistry};
use crate::sync;

/// Messages that arrive before the handshake completes are held back up to this many.
pub const DEFERRED_QUEUE_CAPACITY: usize = 256;

/// Protocol state of one switch connection.
///
/// Owns everything that is private to the connection: framing buffer, handshake and
/// liveness state, fragment reassembly and the queue of deferred messages. Input is
/// fed with `receive` and `tick`; output is collected with `drain_commands` and
/// `drain_events`. Nothing here blocks or touches a socket.
pub struct Session {
    pub(crate) conn: Connection,
    pub(crate) config: Arc<ControllerConfig>,
    pub(crate) registry: SwitchRegistry,
    pub(crate) switch: Option<DatapathId>,
    pub(crate) port_desc: Reassembly<PortDesc>,
    pub(crate) flow_stats: Reassembly<FlowStats>,
    slicer: MessageSlicer,
    deferred: VecDeque<(OfpHeader, Message)>,
    next_xid: Xid,
    commands: Vec<TransportCommand>,
    events: Vec<ControllerEvent>,
    shut_down: bool,
}

impl Session {
    pub fn new(
        id: ConnectionId,
        config: Arc<ControllerConfig>,
        registry: SwitchRegistry,
        now: Instant,
    ) -> Session {
        Session {
            conn: Connection::new(id, now),
            config,
            registry,
            switch: None,
            port_desc: Reassembly::new(id, ReplyCategory::PortDesc),
            flow_stats: Reassembly::new(id, ReplyCategory::Flow),
            slicer: MessageSlicer::new(),
            deferred: VecDeque::new(),
            next_xid: 1,
            commands: vec![],
            events: vec![],
            shut_down: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn state(&self) -> HandshakeState {
        self.conn.state()
    }

    pub fn version(&self) -> Option<OfpVersion> {
        self.conn.version()
    }

    pub fn datapath_id(&self) -> Option<DatapathId> {
        self.switch
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_closed(&self) -> bool {
        self.shut_down
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Feed raw bytes from the transport.
    pub fn receive(&mut self, data: &[u8], now: Instant) {
        if self.shut_down {
            debug!("{}: ignoring {} bytes after close", self.id(), data.len());
            return;
        }
        let frames = match self.slicer.push(data) {
            Ok(frames) => frames,
            Err(e) => {
                self.fail(ConnectionError::MalformedMessage(format!("unframeable stream: {}", e)));
                return;
            }
        };
        for (header, body) in frames {
            if self.shut_down {
                break;
            }
            self.conn.record_inbound(now);
            if let Some(dpid) = self.switch {
                let id = self.id();
                self.registry.update_owned(dpid, id, |sw| sw.last_seen = now);
            }
            self.handle_frame(&header, &body);
        }
    }

    fn handle_frame(&mut self, header: &OfpHeader, body: &[u8]) {
        if let Some(version) = self.conn.version() {
            if header.version() != version.wire() {
                self.malformed(format!(
                    "version 0x{:x} on an OpenFlow {} connection",
                    header.version(),
                    version
                ));
                return;
            }
        }
        match ofp_serialization::parse(header, body) {
            Ok((_xid, message)) => self.route(header, message),
            Err(e) => self.malformed(format!(
                "{} (type 0x{:x}, xid {})",
                e,
                header.raw_type(),
                header.xid()
            )),
        }
    }

    fn malformed(&mut self, reason: String) {
        if self.conn.is_established() {
            warn!("{}: dropping malformed message: {}", self.id(), reason);
        } else {
            self.fail(ConnectionError::MalformedMessage(reason));
        }
    }

    /// Hand a decoded message to its handler, holding back steady-state messages until
    /// the handshake is done.
    pub(crate) fn route(&mut self, header: &OfpHeader, message: Message) {
        let code = message.code();
        if self.conn.state() == HandshakeState::Init && !matches!(message, Message::Hello(_)) {
            self.fail(ConnectionError::ProtocolViolation(format!(
                "{} before version negotiation",
                code
            )));
            return;
        }
        if !self.conn.is_established() && Session::deferrable(&message) {
            self.defer(*header, message);
            return;
        }
        // Hello is the only message decoded for versions outside the table.
        let version = self
            .conn
            .version()
            .or_else(|| OfpVersion::from_wire(header.version()))
            .unwrap_or(OfpVersion::V1_3);
        match DispatchTable::global().lookup(version, code) {
            Some(handler) => handler(self, header, message),
            None => debug!("{}: ignoring {} message, xid {}", self.id(), code, header.xid()),
        }
    }

    fn deferrable(message: &Message) -> bool {
        match message {
            Message::PacketIn(_) | Message::PortStatus(_) | Message::BarrierReply => true,
            Message::MultipartReply(reply) => {
                !matches!(reply.body, MultipartReplyBody::PortDesc(_))
            }
            _ => false,
        }
    }

    fn defer(&mut self, header: OfpHeader, message: Message) {
        if self.deferred.len() >= DEFERRED_QUEUE_CAPACITY {
            if let Some((dropped, _)) = self.deferred.pop_front() {
                warn!(
                    "{}: deferred queue full, dropping oldest message xid {}",
                    self.id(),
                    dropped.xid()
                );
            }
        }
        debug!(
            "{}: deferring {} until the handshake completes",
            self.id(),
            message.code()
        );
        self.deferred.push_back((header, message));
    }

    pub(crate) fn replay_deferred(&mut self) {
        while let Some((header, message)) = self.deferred.pop_front() {
            if self.shut_down {
                break;
            }
            self.route(&header, message);
        }
    }

    /// Keepalive and handshake deadline check. Call once per keepalive interval.
    pub fn tick(&mut self, now: Instant) {
        keepalive::tick(self, now)
    }

    /// Ask an established switch for its flow table. Returns whether a request was sent.
    pub fn request_flow_stats(&mut self) -> bool {
        sync::request_flow_stats(self)
    }

    /// The transport went away on its own.
    pub fn transport_closed(&mut self) {
        if !self.shut_down {
            info!("{}: transport closed", self.id());
        }
        self.shutdown(false);
    }

    /// Close the connection from the controller side.
    pub fn close(&mut self) {
        self.shutdown(true);
    }

    pub(crate) fn fail(&mut self, err: ConnectionError) {
        if self.shut_down {
            return;
        }
        error!("{}: {}", self.id(), err);
        let event = match &err {
            ConnectionError::LivenessTimeout(_) => ControllerEvent::LivenessFailed {
                connection: self.id(),
                datapath_id: self.switch,
            },
            _ => ControllerEvent::ConnectionFailed {
                connection: self.id(),
                reason: err.to_string(),
            },
        };
        self.publish(event);
        self.close();
    }

    fn shutdown(&mut self, request_close: bool) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if request_close {
            self.commands.push(TransportCommand::Close);
        }
        if self.conn.state() != HandshakeState::NegotiationFailed {
            self.conn.transition(HandshakeState::Closed);
        }
        self.port_desc.reset();
        self.flow_stats.reset();
        self.deferred.clear();
        if let Some(dpid) = self.switch {
            if self.registry.detach(dpid, self.id()) {
                info!("{}: switch {} disconnected", self.id(), dpid);
                self.publish(ControllerEvent::SwitchDisconnected {
                    connection: self.id(),
                    datapath_id: dpid,
                });
            }
        }
    }

    pub(crate) fn next_xid(&mut self) -> Xid {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1).max(1);
        xid
    }

    /// Encode `message` with a fresh xid in the negotiated version.
    pub(crate) fn send(&mut self, message: Message) -> Xid {
        let xid = self.next_xid();
        self.send_with_xid(xid, message);
        xid
    }

    pub(crate) fn send_with_xid(&mut self, xid: Xid, message: Message) {
        match self.conn.version() {
            Some(version) => self.send_versioned(version, xid, message),
            None => error!(
                "{}: cannot send {} before version negotiation",
                self.id(),
                message.code()
            ),
        }
    }

    pub(crate) fn send_versioned(&mut self, version: OfpVersion, xid: Xid, message: Message) {
        let code = message.code();
        match ofp_serialization::marshal(version, xid, message) {
            Ok(bytes) => {
                debug!("{}: sending {} xid {}", self.id(), code, xid);
                self.commands.push(TransportCommand::Write(bytes));
            }
            Err(e) => error!("{}: could not encode {}: {}", self.id(), code, e),
        }
    }

    pub(crate) fn publish(&mut self, event: ControllerEvent) {
        self.events.push(event);
    }

    pub(crate) fn publish_port_changes(
        &mut self,
        datapath_id: DatapathId,
        changes: Vec<PortChange>,
    ) {
        for change in changes {
            let event = match change {
                PortChange::Created(port) => ControllerEvent::PortCreated { datapath_id, port },
                PortChange::Modified(port) => ControllerEvent::PortModified { datapath_id, port },
                PortChange::Deleted(port) => ControllerEvent::PortDeleted { datapath_id, port },
                PortChange::LinkUp(port_no) => ControllerEvent::LinkUp { datapath_id, port_no },
                PortChange::LinkDown(port_no) => ControllerEvent::LinkDown { datapath_id, port_no },
            };
            self.publish(event);
        }
    }

    /// Take the encoded messages and close requests queued for the transport.
    pub fn drain_commands(&mut self) -> Vec<TransportCommand> {
        mem::take(&mut self.commands)
    }

    pub fn drain_events(&mut self) -> Vec<ControllerEvent> {
        mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;
    use crate::packet::MacAddr;
    use std::time::Duration;

    const TEST_DPID: u64 = 0x0011223344556677;

    fn session(versions: Vec<u8>) -> (Session, Instant) {
        let now = Instant::now();
        let config = ControllerConfig {
            openflow_versions: versions,
            ..ControllerConfig::default()
        };
        let session = Session::new(ConnectionId(1), Arc::new(config), SwitchRegistry::new(), now);
        (session, now)
    }

    fn wire(version: OfpVersion, xid: Xid, message: Message) -> Vec<u8> {
        ofp_serialization::marshal(version, xid, message).unwrap()
    }

    fn sent(session: &mut Session) -> Vec<Message> {
        session
            .drain_commands()
            .into_iter()
            .filter_map(|c| match c {
                TransportCommand::Write(bytes) => {
                    let header = OfpHeader::parse(&bytes).unwrap();
                    Some(ofp_serialization::parse(&header, &bytes[8..]).unwrap().1)
                }
                TransportCommand::Close => None,
            })
            .collect()
    }

    fn port(port_no: u32) -> PortDesc {
        PortDesc {
            port_no,
            hw_addr: MacAddr::new([0, 1, 2, 3, 4, port_no as u8]),
            name: format!("eth{}", port_no),
            config: PortConfig(0),
            state: PortState(0),
            curr: PortFeatures(0),
            advertised: PortFeatures(0),
            supported: PortFeatures(0),
            peer: PortFeatures(0),
            curr_speed: None,
            max_speed: None,
        }
    }

    fn features(ports: Vec<PortDesc>) -> Message {
        Message::FeaturesReply(SwitchFeatures {
            datapath_id: TEST_DPID,
            num_buffers: 256,
            num_tables: 1,
            auxiliary_id: 0,
            capabilities: 0xc7,
            actions: Some(0xfff),
            ports: Some(ports),
        })
    }

    fn packet_in(ether_type: u16) -> Message {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame.extend_from_slice(&ether_type.to_be_bytes());
        Message::PacketIn(PacketIn {
            input_payload: Payload::NotBuffered(frame),
            total_len: 14,
            in_port: 3,
            reason: 0,
            table_id: 0,
            cookie: 0,
            fields: vec![],
        })
    }

    /// Drive a 1.0 session up to `Established`.
    fn established_0x01() -> (Session, Instant) {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        s.receive(&wire(OfpVersion::V1_0, 2, features(vec![port(1)])), now);
        assert_eq!(s.state(), HandshakeState::Established);
        s.drain_commands();
        s.drain_events();
        (s, now)
    }

    /// Drive a 1.3 session through the port description exchange.
    fn established_0x04() -> (Session, Instant) {
        let (mut s, now) = session(vec![4]);
        s.receive(&wire(OfpVersion::V1_3, 1, Message::Hello(Hello { versions: vec![4] })), now);
        let features = Message::FeaturesReply(SwitchFeatures {
            datapath_id: TEST_DPID,
            num_buffers: 256,
            num_tables: 254,
            auxiliary_id: 0,
            capabilities: 0x4f,
            actions: None,
            ports: None,
        });
        s.receive(&wire(OfpVersion::V1_3, 2, features), now);
        let xid = s.port_desc.pending_xid().unwrap();
        let reply = Message::MultipartReply(MultipartReply {
            flags: 0,
            body: MultipartReplyBody::PortDesc(vec![port_0x04(1)]),
        });
        s.receive(&wire(OfpVersion::V1_3, xid, reply), now);
        assert_eq!(s.state(), HandshakeState::Established);
        s.drain_commands();
        s.drain_events();
        (s, now)
    }

    fn port_0x04(port_no: u32) -> PortDesc {
        PortDesc {
            curr_speed: Some(1_000_000),
            max_speed: Some(1_000_000),
            ..port(port_no)
        }
    }

    #[test]
    fn test_message_before_hello_is_a_violation() {
        let (mut s, now) = session(vec![1, 4]);
        s.receive(&wire(OfpVersion::V1_0, 1, features(vec![port(1)])), now);
        assert!(s.is_closed());
        assert_eq!(s.state(), HandshakeState::Closed);
        assert!(matches!(s.drain_events()[..], [ControllerEvent::ConnectionFailed { .. }]));
        assert_eq!(s.drain_commands(), vec![TransportCommand::Close]);
    }

    #[test]
    fn test_second_hello_is_a_violation() {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        s.receive(&wire(OfpVersion::V1_0, 2, Message::Hello(Hello::default())), now);
        assert!(s.is_closed());
    }

    #[test]
    fn test_malformed_during_handshake_is_fatal() {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        // features reply with a truncated port
        let mut data = vec![0x01, 0x06, 0x00, 0x28, 0, 0, 0, 2];
        data.extend_from_slice(&[0u8; 32]);
        s.receive(&data, now);
        assert!(s.is_closed());
        assert!(matches!(s.drain_events()[..], [ControllerEvent::ConnectionFailed { .. }]));
    }

    #[test]
    fn test_malformed_after_handshake_is_dropped() {
        let (mut s, now) = established_0x01();
        let mut data = vec![0x01, 0x0c, 0x00, 0x0c, 0, 0, 0, 9];
        data.extend_from_slice(&[0u8; 4]);
        s.receive(&data, now);
        assert!(!s.is_closed());
        // wrong header version is malformed too
        s.receive(&wire(OfpVersion::V1_3, 10, Message::EchoRequest(vec![])), now);
        assert!(!s.is_closed());
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_deferred_messages_replay_after_handshake() {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        s.receive(&wire(OfpVersion::V1_0, 5, packet_in(0x0800)), now);
        assert_eq!(s.deferred_len(), 1);
        assert!(s.drain_events().is_empty());

        s.receive(&wire(OfpVersion::V1_0, 2, features(vec![port(1)])), now);
        let events = s.drain_events();
        let completed = events
            .iter()
            .position(|e| matches!(e, ControllerEvent::HandshakeCompleted { .. }))
            .unwrap();
        let reachable = events
            .iter()
            .position(|e| matches!(e, ControllerEvent::ReachableAddress { .. }))
            .unwrap();
        assert!(completed < reachable);
        assert_eq!(s.deferred_len(), 0);
    }

    #[test]
    fn test_deferred_queue_drops_oldest() {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        for xid in 0..(DEFERRED_QUEUE_CAPACITY as u32 + 3) {
            s.receive(&wire(OfpVersion::V1_0, 100 + xid, Message::BarrierReply), now);
        }
        assert_eq!(s.deferred_len(), DEFERRED_QUEUE_CAPACITY);
        assert_eq!(s.deferred.front().unwrap().0.xid(), 103);
    }

    #[test]
    fn test_echo_request_is_answered_with_same_payload() {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        s.drain_commands();
        s.receive(&wire(OfpVersion::V1_0, 0x77, Message::EchoRequest(vec![9, 8, 7])), now);
        let commands = s.drain_commands();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            TransportCommand::Write(bytes) => {
                let header = OfpHeader::parse(bytes).unwrap();
                assert_eq!(header.xid(), 0x77);
                let (_, message) = ofp_serialization::parse(&header, &bytes[8..]).unwrap();
                assert_eq!(message, Message::EchoReply(vec![9, 8, 7]));
            }
            c => panic!("Should be a write, got {:?}", c),
        }
    }

    #[test]
    fn test_packet_in_filters_lldp_and_ipv6() {
        let (mut s, now) = established_0x01();
        s.receive(&wire(OfpVersion::V1_0, 20, packet_in(0x88cc)), now);
        s.receive(&wire(OfpVersion::V1_0, 21, packet_in(0x86dd)), now);
        assert!(s.drain_events().is_empty());

        s.receive(&wire(OfpVersion::V1_0, 22, packet_in(0x0806)), now);
        assert_eq!(
            s.drain_events(),
            vec![ControllerEvent::ReachableAddress {
                datapath_id: DatapathId(TEST_DPID),
                port_no: 3,
                address: MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            }]
        );
    }

    #[test]
    fn test_short_packet_in_is_dropped() {
        let (mut s, now) = established_0x01();
        let short = Message::PacketIn(PacketIn {
            input_payload: Payload::NotBuffered(vec![0xff; 8]),
            total_len: 8,
            in_port: 3,
            reason: 0,
            table_id: 0,
            cookie: 0,
            fields: vec![],
        });
        s.receive(&wire(OfpVersion::V1_0, 20, short), now);
        assert!(s.drain_events().is_empty());
        assert!(!s.is_closed());
    }

    #[test]
    fn test_flow_stats_reassembly() {
        let (mut s, now) = established_0x01();
        assert!(s.request_flow_stats());
        let xid = match &sent(&mut s)[..] {
            [Message::MultipartRequest(MultipartRequest {
                body: MultipartRequestBody::Flow { table_id, out_port },
                ..
            })] => {
                assert_eq!(*table_id, ALL_TABLES);
                assert_eq!(*out_port, None);
                s.flow_stats.pending_xid().unwrap()
            }
            m => panic!("Should be a flow stats request, got {:?}", m),
        };

        let entry = |priority: u16| FlowStats {
            table_id: 0,
            pattern: FlowMatch::V0x01(Pattern::match_all()),
            duration_sec: 0,
            duration_nsec: 0,
            priority,
            idle_timeout: 0,
            hard_timeout: 0,
            flags: 0,
            cookie: 0,
            packet_count: 0,
            byte_count: 0,
            instructions: vec![Instruction::ApplyActions(vec![])],
        };
        let reply = |flags: u16, entries: Vec<FlowStats>| {
            Message::MultipartReply(MultipartReply {
                flags,
                body: MultipartReplyBody::Flow(entries),
            })
        };
        let first = reply(MULTIPART_REPLY_MORE, vec![entry(1), entry(2)]);
        s.receive(&wire(OfpVersion::V1_0, xid, first), now);
        assert!(s.drain_events().is_empty());
        s.receive(&wire(OfpVersion::V1_0, xid, reply(0, vec![entry(3)])), now);
        assert_eq!(
            s.drain_events(),
            vec![ControllerEvent::FlowsUpdated {
                datapath_id: DatapathId(TEST_DPID),
                flow_count: 3
            }]
        );
        assert_eq!(s.registry.get(DatapathId(TEST_DPID)).unwrap().flows.len(), 3);
    }

    #[test]
    fn test_flow_fragment_of_other_xid_is_ignored() {
        let (mut s, now) = established_0x01();
        assert!(s.request_flow_stats());
        let xid = s.flow_stats.pending_xid().unwrap();
        let reply = |flags: u16, priority: u16| {
            Message::MultipartReply(MultipartReply {
                flags,
                body: MultipartReplyBody::Flow(vec![FlowStats {
                    table_id: 0,
                    pattern: FlowMatch::V0x01(Pattern::match_all()),
                    duration_sec: 0,
                    duration_nsec: 0,
                    priority,
                    idle_timeout: 0,
                    hard_timeout: 0,
                    flags: 0,
                    cookie: 0,
                    packet_count: 0,
                    byte_count: 0,
                    instructions: vec![Instruction::ApplyActions(vec![])],
                }]),
            })
        };
        s.receive(&wire(OfpVersion::V1_0, xid, reply(MULTIPART_REPLY_MORE, 1)), now);
        s.receive(&wire(OfpVersion::V1_0, xid + 100, reply(0, 50)), now);
        assert!(s.drain_events().is_empty());
        assert_eq!(s.flow_stats.pending_xid(), Some(xid));

        s.receive(&wire(OfpVersion::V1_0, xid, reply(0, 2)), now);
        assert_eq!(
            s.drain_events(),
            vec![ControllerEvent::FlowsUpdated {
                datapath_id: DatapathId(TEST_DPID),
                flow_count: 2
            }]
        );
        let switch = s.registry.get(DatapathId(TEST_DPID)).unwrap();
        assert!(switch.flows.values().all(|f| f.priority != 50));
    }

    #[test]
    fn test_packet_in_0x04_takes_in_port_from_match() {
        let (mut s, now) = established_0x04();
        let mut data = vec![0x04, 0x0a, 0x00, 0x40, 0, 0, 0, 30];
        // no buffer, total_len 14, reason, table, cookie
        data.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0x00, 0x0e, 0x00, 0x00]);
        data.extend_from_slice(&[0u8; 8]);
        // match: in_phy_port 9, in_port 7, padding
        data.extend_from_slice(&[0x00, 0x01, 0x00, 0x14]);
        data.extend_from_slice(&[0x80, 0x00, 0x02, 0x04, 0x00, 0x00, 0x00, 0x09]);
        data.extend_from_slice(&[0x80, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x07]);
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&[0u8; 2]);
        data.extend_from_slice(&[0xff; 6]);
        data.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x08, 0x00]);
        assert_eq!(data.len(), 0x40);

        s.receive(&data, now);
        assert_eq!(
            s.drain_events(),
            vec![ControllerEvent::ReachableAddress {
                datapath_id: DatapathId(TEST_DPID),
                port_no: 7,
                address: MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            }]
        );
        assert!(!s.is_closed());
    }

    #[test]
    fn test_port_status_0x04_adds_port() {
        let (mut s, now) = established_0x04();
        let status = Message::PortStatus(PortStatus {
            reason: PortReason::PortAdd,
            desc: port_0x04(5),
        });
        s.receive(&wire(OfpVersion::V1_3, 31, status.clone()), now);
        assert_eq!(
            s.drain_events(),
            vec![
                ControllerEvent::LinkUp {
                    datapath_id: DatapathId(TEST_DPID),
                    port_no: 5
                },
                ControllerEvent::PortCreated {
                    datapath_id: DatapathId(TEST_DPID),
                    port: port_0x04(5)
                },
            ]
        );
        // the same notification again changes nothing
        s.receive(&wire(OfpVersion::V1_3, 32, status), now);
        assert!(s.drain_events().is_empty());

        let switch = s.registry.get(DatapathId(TEST_DPID)).unwrap();
        assert_eq!(switch.ports.keys().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(switch.version, OfpVersion::V1_3);
    }

    #[test]
    fn test_close_detaches_switch_once() {
        let (mut s, _) = established_0x01();
        s.transport_closed();
        s.close();
        assert_eq!(
            s.drain_events(),
            vec![ControllerEvent::SwitchDisconnected {
                connection: ConnectionId(1),
                datapath_id: DatapathId(TEST_DPID)
            }]
        );
        assert!(s.drain_commands().is_empty());
        assert!(!s.registry.get(DatapathId(TEST_DPID)).unwrap().connected);
    }

    #[test]
    fn test_handshake_timeout() {
        let (mut s, now) = session(vec![1]);
        s.receive(&wire(OfpVersion::V1_0, 1, Message::Hello(Hello::default())), now);
        s.tick(now + Duration::from_secs(29));
        assert!(!s.is_closed());
        s.tick(now + Duration::from_secs(30));
        assert!(s.is_closed());
        assert_eq!(
            s.drain_events(),
            vec![ControllerEvent::LivenessFailed {
                connection: ConnectionId(1),
                datapath_id: None
            }]
        );
    }
}
