use std::sync::Arc;
use std::time::Instant;

use of_core::config::ControllerConfig;
use of_core::connection::{ConnectionId, HandshakeState, TransportCommand};
use of_core::event::ControllerEvent;
use of_core::message::*;
use of_core::ofp_header::{OfpHeader, OfpVersion, Xid};
use of_core::ofp_serialization;
use of_core::packet::MacAddr;
use of_core::session::Session;
use of_core::switch::{DatapathId, SwitchRegistry};

const DPID: u64 = 0x00000000000000a1;

/// Plays the switch side of a session.
struct FakeSwitch {
    version: OfpVersion,
    session: Session,
    now: Instant,
}

impl FakeSwitch {
    fn new(
        id: u64,
        versions: Vec<u8>,
        version: OfpVersion,
        registry: SwitchRegistry,
    ) -> FakeSwitch {
        let config = ControllerConfig {
            openflow_versions: versions,
            ..ControllerConfig::default()
        };
        let now = Instant::now();
        FakeSwitch {
            version,
            session: Session::new(ConnectionId(id), Arc::new(config), registry, now),
            now,
        }
    }

    fn send(&mut self, xid: Xid, message: Message) {
        let bytes = ofp_serialization::marshal(self.version, xid, message).unwrap();
        self.session.receive(&bytes, self.now);
    }

    /// Decoded controller output, plus whether a close was requested.
    fn output(&mut self) -> (Vec<(OfpHeader, Message)>, bool) {
        let mut messages = vec![];
        let mut closed = false;
        for command in self.session.drain_commands() {
            match command {
                TransportCommand::Write(bytes) => {
                    let header = OfpHeader::parse(&bytes).unwrap();
                    let (_, message) = ofp_serialization::parse(&header, &bytes[8..]).unwrap();
                    messages.push((header, message));
                }
                TransportCommand::Close => closed = true,
            }
        }
        (messages, closed)
    }
}

fn port(port_no: u32, speed: Option<u32>) -> PortDesc {
    PortDesc {
        port_no,
        hw_addr: MacAddr::new([0x02, 0, 0, 0, 0, port_no as u8]),
        name: format!("s1-eth{}", port_no),
        config: PortConfig(0),
        state: PortState(0),
        curr: PortFeatures(0),
        advertised: PortFeatures(0),
        supported: PortFeatures(0),
        peer: PortFeatures(0),
        curr_speed: speed,
        max_speed: speed,
    }
}

fn features(ports: Option<Vec<PortDesc>>) -> Message {
    Message::FeaturesReply(SwitchFeatures {
        datapath_id: DPID,
        num_buffers: 256,
        num_tables: 254,
        auxiliary_id: 0,
        capabilities: 0x4f,
        actions: ports.as_ref().map(|_| 0xfff),
        ports,
    })
}

fn port_desc_reply(flags: u16, ports: Vec<PortDesc>) -> Message {
    Message::MultipartReply(MultipartReply {
        flags,
        body: MultipartReplyBody::PortDesc(ports),
    })
}

fn codes(messages: &[(OfpHeader, Message)]) -> Vec<String> {
    messages.iter().map(|(_, m)| m.code().to_string()).collect()
}

#[test]
fn test_openflow_1_0_handshake() {
    let registry = SwitchRegistry::new();
    let mut sw = FakeSwitch::new(1, vec![1, 4], OfpVersion::V1_0, registry.clone());

    sw.send(1, Message::Hello(Hello::default()));
    let (out, _) = sw.output();
    assert_eq!(codes(&out), vec!["Hello", "FeaturesReq"]);
    assert!(out.iter().all(|(h, _)| h.version() == 0x01));
    assert_eq!(sw.session.state(), HandshakeState::FeaturesRequested);

    sw.send(2, features(Some(vec![port(1, None), port(2, None)])));
    let (out, closed) = sw.output();
    assert!(!closed);
    assert_eq!(codes(&out), vec!["SetConfig", "MultipartReq"]);
    assert_eq!(
        out[0].1,
        Message::SetConfig(SwitchConfig {
            flags: CONFIG_FRAG_NORMAL,
            miss_send_len: 0xffff
        })
    );
    assert_eq!(sw.session.state(), HandshakeState::Established);

    let events = sw.session.drain_events();
    assert_eq!(
        events.last(),
        Some(&ControllerEvent::HandshakeCompleted {
            connection: ConnectionId(1),
            datapath_id: DatapathId(DPID),
            version: OfpVersion::V1_0,
        })
    );
    let created = events
        .iter()
        .filter(|e| matches!(e, ControllerEvent::PortCreated { .. }))
        .count();
    assert_eq!(created, 2);

    let switch = registry.get(DatapathId(DPID)).unwrap();
    assert_eq!(switch.ports.len(), 2);
    assert_eq!(switch.version, OfpVersion::V1_0);
    assert!(switch.connected);
}

#[test]
fn test_openflow_1_3_handshake_with_fragmented_ports() {
    let registry = SwitchRegistry::new();
    let mut sw = FakeSwitch::new(1, vec![1, 4], OfpVersion::V1_3, registry.clone());

    sw.send(1, Message::Hello(Hello { versions: vec![1, 4] }));
    let (out, _) = sw.output();
    assert_eq!(codes(&out), vec!["Hello", "FeaturesReq"]);
    assert_eq!(out[0].1, Message::Hello(Hello { versions: vec![1, 4] }));

    sw.send(2, features(None));
    let (out, _) = sw.output();
    assert_eq!(codes(&out), vec!["SetConfig", "MultipartReq"]);
    let port_desc_xid = out[1].0.xid();
    assert_eq!(sw.session.state(), HandshakeState::AwaitingPortDesc);

    // packet-in before the handshake completes is held back
    sw.send(
        3,
        Message::PacketIn(PacketIn {
            input_payload: Payload::NotBuffered(vec![
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x07, 0x08, 0x06,
            ]),
            total_len: 14,
            in_port: 2,
            reason: 0,
            table_id: 0,
            cookie: 0,
            fields: vec![],
        }),
    );

    sw.send(port_desc_xid, port_desc_reply(MULTIPART_REPLY_MORE, vec![port(1, Some(10_000_000))]));
    assert_eq!(sw.session.state(), HandshakeState::AwaitingPortDesc);
    assert!(sw
        .session
        .drain_events()
        .iter()
        .all(|e| !matches!(e, ControllerEvent::HandshakeCompleted { .. })));

    sw.send(port_desc_xid, port_desc_reply(0, vec![port(2, Some(1_000_000))]));
    assert_eq!(sw.session.state(), HandshakeState::Established);

    let events = sw.session.drain_events();
    let completed = events
        .iter()
        .position(|e| matches!(e, ControllerEvent::HandshakeCompleted { .. }))
        .unwrap();
    assert_eq!(
        events[completed + 1..],
        [ControllerEvent::ReachableAddress {
            datapath_id: DatapathId(DPID),
            port_no: 2,
            address: MacAddr::new([0x02, 0, 0, 0, 0, 0x07]),
        }]
    );

    let switch = registry.get(DatapathId(DPID)).unwrap();
    assert_eq!(switch.ports.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(switch.ports[&1].curr_speed, Some(10_000_000));

    let (out, _) = sw.output();
    assert_eq!(
        out.last().map(|(_, m)| m.clone()),
        Some(Message::MultipartRequest(MultipartRequest {
            flags: 0,
            body: MultipartRequestBody::Desc
        }))
    );
}

#[test]
fn test_incompatible_peer_gets_hello_failed() {
    let mut sw = FakeSwitch::new(1, vec![4], OfpVersion::V1_0, SwitchRegistry::new());
    sw.send(0x1234, Message::Hello(Hello::default()));

    let (out, closed) = sw.output();
    assert!(closed);
    assert_eq!(out.len(), 1);
    let (header, message) = &out[0];
    assert_eq!(header.version(), 0x04);
    assert_eq!(header.xid(), 0x1234);
    match message {
        Message::Error(err) => {
            assert_eq!(err.error_type, ERROR_TYPE_HELLO_FAILED);
            assert_eq!(err.code, HELLO_FAILED_INCOMPATIBLE);
        }
        m => panic!("Should be an error, got {:?}", m),
    }
    assert_eq!(sw.session.state(), HandshakeState::NegotiationFailed);
    assert!(sw.session.is_closed());
    assert_eq!(
        sw.session.drain_events(),
        vec![ControllerEvent::NegotiationFailed {
            connection: ConnectionId(1),
            peer_version: 0x01,
        }]
    );
}

#[test]
fn test_newer_peer_negotiates_down_through_bitmap() {
    let mut sw = FakeSwitch::new(1, vec![1, 4], OfpVersion::V1_3, SwitchRegistry::new());
    // version 0x05 hello announcing 1, 4 and 5
    let hello = [
        0x05, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x08, 0x00, 0x00, 0x00,
        0x32,
    ];
    sw.session.receive(&hello, sw.now);
    assert_eq!(sw.session.version(), Some(OfpVersion::V1_3));
    let (out, closed) = sw.output();
    assert!(!closed);
    assert_eq!(codes(&out), vec!["Hello", "FeaturesReq"]);
}

#[test]
fn test_empty_port_description_fails_handshake() {
    let mut sw = FakeSwitch::new(1, vec![4], OfpVersion::V1_3, SwitchRegistry::new());
    sw.send(1, Message::Hello(Hello { versions: vec![4] }));
    sw.send(2, features(None));
    let (out, _) = sw.output();
    let xid = out[3].0.xid();
    sw.send(xid, port_desc_reply(0, vec![]));
    assert!(sw.session.is_closed());
    assert!(sw
        .session
        .drain_events()
        .iter()
        .any(|e| matches!(e, ControllerEvent::ConnectionFailed { .. })));
}

#[test]
fn test_reconnect_takes_over_switch() {
    let registry = SwitchRegistry::new();
    let mut first = FakeSwitch::new(1, vec![1], OfpVersion::V1_0, registry.clone());
    first.send(1, Message::Hello(Hello::default()));
    first.send(2, features(Some(vec![port(1, None)])));
    assert_eq!(first.session.state(), HandshakeState::Established);

    let mut second = FakeSwitch::new(2, vec![1], OfpVersion::V1_0, registry.clone());
    second.send(1, Message::Hello(Hello::default()));
    second.send(2, features(Some(vec![port(1, None)])));
    assert_eq!(second.session.state(), HandshakeState::Established);
    assert_eq!(registry.get(DatapathId(DPID)).unwrap().connection, ConnectionId(2));

    // the stale connection going away leaves the new owner alone
    first.session.drain_events();
    first.session.transport_closed();
    assert!(first.session.drain_events().is_empty());
    assert!(registry.get(DatapathId(DPID)).unwrap().connected);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_taken_over_connection_cannot_change_switch() {
    let registry = SwitchRegistry::new();
    let mut first = FakeSwitch::new(1, vec![1], OfpVersion::V1_0, registry.clone());
    first.send(1, Message::Hello(Hello::default()));
    first.send(2, features(Some(vec![port(1, None), port(2, None)])));

    let mut second = FakeSwitch::new(2, vec![1], OfpVersion::V1_0, registry.clone());
    second.send(1, Message::Hello(Hello::default()));
    second.send(2, features(Some(vec![port(1, None), port(2, None)])));
    assert_eq!(registry.get(DatapathId(DPID)).unwrap().connection, ConnectionId(2));

    first.session.drain_events();
    first.send(
        3,
        Message::PortStatus(PortStatus {
            reason: PortReason::PortDelete,
            desc: port(2, None),
        }),
    );
    first.send(
        4,
        Message::PacketIn(PacketIn {
            input_payload: Payload::NotBuffered(vec![
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x09, 0x08, 0x00,
            ]),
            total_len: 14,
            in_port: 1,
            reason: 0,
            table_id: 0,
            cookie: 0,
            fields: vec![],
        }),
    );
    assert!(first.session.drain_events().is_empty());
    assert!(!first.session.is_closed());

    let switch = registry.get(DatapathId(DPID)).unwrap();
    assert_eq!(switch.ports.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(switch.connection, ConnectionId(2));

    // the owner still applies the same change
    second.session.drain_events();
    second.send(
        3,
        Message::PortStatus(PortStatus {
            reason: PortReason::PortDelete,
            desc: port(2, None),
        }),
    );
    assert!(matches!(
        second.session.drain_events()[..],
        [ControllerEvent::PortDeleted { .. }]
    ));
    assert_eq!(registry.get(DatapathId(DPID)).unwrap().ports.len(), 1);
}
