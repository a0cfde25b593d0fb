use std::time::Instant;

use crate::connection::ConnectionError;
use crate::message::Message;
use crate::ofp_header::OfpHeader;
use crate::session::Session;

pub(crate) fn on_echo_request(session: &mut Session, header: &OfpHeader, message: Message) {
    if let Message::EchoRequest(payload) = message {
        session.send_with_xid(header.xid(), Message::EchoReply(payload));
    }
}

pub(crate) fn on_echo_reply(session: &mut Session, header: &OfpHeader, _message: Message) {
    debug!("{}: echo reply xid {}", session.id(), header.xid());
}

/// Enforce the handshake deadline, then probe an established switch that has gone quiet.
///
/// A probe is only sent when none is outstanding. Any inbound message clears it; if it
/// is still outstanding after the keepalive timeout the connection is failed once.
pub(crate) fn tick(session: &mut Session, now: Instant) {
    if session.is_closed() {
        return;
    }
    if !session.conn.is_established() {
        if let Some(limit) = session.config.handshake_timeout() {
            let age = session.conn.age(now);
            if age >= limit {
                session.fail(ConnectionError::LivenessTimeout(format!(
                    "handshake still in {:?} after {:?}",
                    session.conn.state(),
                    age
                )));
            }
        }
        return;
    }

    let timeout = session.config.keepalive_timeout();
    match session.conn.probe_age(now) {
        Some(age) if age >= timeout => {
            session.fail(ConnectionError::LivenessTimeout(format!(
                "echo request unanswered for {:?}",
                age
            )));
        }
        Some(_) => {}
        None => {
            let xid = session.next_xid();
            session.send_with_xid(xid, Message::EchoRequest(xid.to_be_bytes().to_vec()));
            session.conn.record_probe(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ControllerConfig;
    use crate::connection::{ConnectionId, TransportCommand};
    use crate::event::ControllerEvent;
    use crate::message::{Hello, PortConfig, PortDesc, PortFeatures, PortState, SwitchFeatures};
    use crate::ofp_header::OfpVersion;
    use crate::ofp_serialization;
    use crate::packet::MacAddr;
    use crate::switch::{DatapathId, SwitchRegistry};

    fn established(now: Instant) -> Session {
        let config = ControllerConfig {
            openflow_versions: vec![1],
            keepalive_interval_secs: 5,
            keepalive_timeout_secs: 15,
            ..ControllerConfig::default()
        };
        let registry = SwitchRegistry::new();
        let mut session = Session::new(ConnectionId(3), Arc::new(config), registry, now);
        let port = PortDesc {
            port_no: 1,
            hw_addr: MacAddr::new([0, 0, 0, 0, 0, 1]),
            name: "eth1".to_string(),
            config: PortConfig(0),
            state: PortState(0),
            curr: PortFeatures(0),
            advertised: PortFeatures(0),
            supported: PortFeatures(0),
            peer: PortFeatures(0),
            curr_speed: None,
            max_speed: None,
        };
        let features = Message::FeaturesReply(SwitchFeatures {
            datapath_id: 42,
            num_buffers: 0,
            num_tables: 1,
            auxiliary_id: 0,
            capabilities: 0,
            actions: Some(0),
            ports: Some(vec![port]),
        });
        for (xid, message) in vec![(1, Message::Hello(Hello::default())), (2, features)] {
            let data = ofp_serialization::marshal(OfpVersion::V1_0, xid, message).unwrap();
            session.receive(&data, now);
        }
        assert!(session.conn.is_established());
        session.drain_commands();
        session.drain_events();
        session
    }

    fn echo_requests(session: &mut Session) -> usize {
        session
            .drain_commands()
            .iter()
            .filter(|c| match c {
                TransportCommand::Write(bytes) => bytes[1] == 2,
                TransportCommand::Close => false,
            })
            .count()
    }

    #[test]
    fn test_probe_is_sent_once_while_outstanding() {
        let start = Instant::now();
        let mut s = established(start);
        s.tick(start + Duration::from_secs(5));
        assert_eq!(echo_requests(&mut s), 1);
        s.tick(start + Duration::from_secs(10));
        assert_eq!(echo_requests(&mut s), 0);
        assert!(!s.is_closed());
    }

    #[test]
    fn test_inbound_traffic_keeps_switch_alive() {
        let start = Instant::now();
        let mut s = established(start);
        s.tick(start + Duration::from_secs(5));
        let reply =
            ofp_serialization::marshal(OfpVersion::V1_0, 9, Message::EchoReply(vec![])).unwrap();
        s.receive(&reply, start + Duration::from_secs(6));
        s.tick(start + Duration::from_secs(25));
        assert!(!s.is_closed());
        assert_eq!(echo_requests(&mut s), 2);
    }

    #[test]
    fn test_traffic_just_before_deadline_keeps_connection() {
        let start = Instant::now();
        let mut s = established(start);
        s.tick(start + Duration::from_secs(5));
        assert_eq!(echo_requests(&mut s), 1);

        let barrier =
            ofp_serialization::marshal(OfpVersion::V1_0, 11, Message::BarrierReply).unwrap();
        s.receive(&barrier, start + Duration::from_millis(19_999));
        s.tick(start + Duration::from_secs(20));
        assert!(!s.is_closed());
        assert_eq!(echo_requests(&mut s), 1);

        // the fresh probe gets a full timeout of its own
        s.tick(start + Duration::from_millis(34_999));
        assert!(!s.is_closed());
        s.tick(start + Duration::from_secs(35));
        assert!(s.is_closed());
    }

    #[test]
    fn test_unanswered_probe_fails_connection_once() {
        let start = Instant::now();
        let mut s = established(start);
        s.tick(start + Duration::from_secs(5));
        s.tick(start + Duration::from_secs(20));
        s.tick(start + Duration::from_secs(25));
        assert!(s.is_closed());
        let events = s.drain_events();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, ControllerEvent::LivenessFailed { .. }))
                .count(),
            1
        );
        assert!(events.contains(&ControllerEvent::LivenessFailed {
            connection: ConnectionId(3),
            datapath_id: Some(DatapathId(42)),
        }));
        assert!(s.drain_commands().contains(&TransportCommand::Close));
    }
}
