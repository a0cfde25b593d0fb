//! Version negotiation and the features / configuration / port-description exchange
//! that brings a connection to `Established`.

use crate::connection::{ConnectionError, HandshakeState};
use crate::event::ControllerEvent;
use crate::message::{
    ErrorMsg, Hello, Message, MultipartRequest, MultipartRequestBody, PortDesc, SwitchFeatures,
};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::session::Session;
use crate::switch::{Attachment, DatapathId};
use crate::sync;

/// Pick the version to speak with a peer.
///
/// With a version bitmap the highest version present in both sets wins. Without one the
/// peer's header version is an upper bound on what it speaks.
pub fn negotiate(supported: &[OfpVersion], peer_version: u8, bitmap: &[u8]) -> Option<OfpVersion> {
    if bitmap.is_empty() {
        supported.iter().copied().filter(|v| v.wire() <= peer_version).max()
    } else {
        supported
            .iter()
            .copied()
            .filter(|v| bitmap.contains(&v.wire()))
            .max()
    }
}

fn violation(session: &mut Session, what: String) {
    session.fail(ConnectionError::ProtocolViolation(what));
}

pub(crate) fn on_hello(session: &mut Session, header: &OfpHeader, message: Message) {
    let hello = match message {
        Message::Hello(hello) => hello,
        _ => return,
    };
    if session.conn.state() != HandshakeState::Init {
        violation(session, format!("Hello in state {:?}", session.conn.state()));
        return;
    }
    let supported = session.config.supported_versions();
    match negotiate(&supported, header.version(), &hello.versions) {
        Some(version) => {
            session.conn.set_version(version);
            session.conn.transition(HandshakeState::VersionSet);
            info!("{}: negotiated OpenFlow {}", session.id(), version);

            let versions = if version >= OfpVersion::V1_3 {
                supported.iter().map(|v| v.wire()).collect()
            } else {
                vec![]
            };
            session.send(Message::Hello(Hello { versions }));
            session.send(Message::FeaturesReq);
            session.conn.transition(HandshakeState::FeaturesRequested);
        }
        None => {
            warn!(
                "{}: no common version with peer 0x{:02x} (bitmap {:?}), supported {:?}",
                session.id(),
                header.version(),
                hello.versions,
                supported
            );
            session.conn.transition(HandshakeState::NegotiationFailed);
            session.publish(ControllerEvent::NegotiationFailed {
                connection: session.id(),
                peer_version: header.version(),
            });
            if let Some(highest) = session.config.highest_version() {
                let data = format!("Incompatible OpenFlow version 0x{:02x}", header.version())
                    .into_bytes();
                session.send_versioned(
                    highest,
                    header.xid(),
                    Message::Error(ErrorMsg::hello_failed_incompatible(data)),
                );
            }
            session.close();
        }
    }
}

pub(crate) fn on_features_reply(session: &mut Session, _header: &OfpHeader, message: Message) {
    let features = match message {
        Message::FeaturesReply(features) => features,
        _ => return,
    };
    match session.conn.state() {
        HandshakeState::FeaturesRequested => bind_switch(session, features),
        HandshakeState::Established => sync::refresh_features(session, features),
        state => violation(session, format!("features reply in state {:?}", state)),
    }
}

fn bind_switch(session: &mut Session, mut features: SwitchFeatures) {
    let version = match session.conn.version() {
        Some(version) => version,
        None => return violation(session, "features reply before negotiation".to_string()),
    };
    let ports = features.ports.take();
    if version == OfpVersion::V1_0 && ports.as_ref().map_or(true, |p| p.is_empty()) {
        return violation(session, "features reply lists no ports".to_string());
    }

    let dpid = DatapathId(features.datapath_id);
    let now = session.conn.last_received();
    let attachment = session
        .registry
        .attach(&features, version, session.id(), now);
    if let Attachment::TakenOver { previous } = attachment {
        debug!("{}: {} was bound to {}", session.id(), dpid, previous);
    }
    session.switch = Some(dpid);
    if let Some(ports) = ports {
        sync::apply_port_set(session, ports);
    }

    let config = session.config.switch_config();
    session.send(Message::SetConfig(config));
    session.conn.transition(HandshakeState::ConfigSent);

    match version {
        OfpVersion::V1_0 => establish(session),
        OfpVersion::V1_3 => {
            let xid = session.send(Message::MultipartRequest(MultipartRequest {
                flags: 0,
                body: MultipartRequestBody::PortDesc,
            }));
            session.port_desc.begin(xid);
            session.conn.transition(HandshakeState::AwaitingPortDesc);
        }
    }
}

/// One fragment of a port description reply.
pub(crate) fn on_port_desc_reply(
    session: &mut Session,
    header: &OfpHeader,
    ports: Vec<PortDesc>,
    more: bool,
) {
    match session.conn.state() {
        HandshakeState::AwaitingPortDesc => {
            if let Some(ports) = session.port_desc.accept(header.xid(), ports, more) {
                if ports.is_empty() {
                    return violation(session, "port description lists no ports".to_string());
                }
                sync::apply_port_set(session, ports);
                establish(session);
            }
        }
        HandshakeState::Established => {
            if let Some(ports) = session.port_desc.accept(header.xid(), ports, more) {
                sync::apply_port_set(session, ports);
            }
        }
        state => violation(session, format!("port description reply in state {:?}", state)),
    }
}

fn establish(session: &mut Session) {
    let (dpid, version) = match (session.switch, session.conn.version()) {
        (Some(dpid), Some(version)) => (dpid, version),
        _ => return violation(session, "handshake finished without a switch".to_string()),
    };
    session.conn.transition(HandshakeState::Established);
    info!(
        "{}: switch {} connected with OpenFlow {}",
        session.id(),
        dpid,
        version
    );
    session.publish(ControllerEvent::HandshakeCompleted {
        connection: session.id(),
        datapath_id: dpid,
        version,
    });
    session.send(Message::MultipartRequest(MultipartRequest {
        flags: 0,
        body: MultipartRequestBody::Desc,
    }));
    session.replay_deferred();
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: [OfpVersion; 2] = [OfpVersion::V1_0, OfpVersion::V1_3];

    #[test]
    fn test_negotiate_with_bitmap() {
        assert_eq!(negotiate(&BOTH, 4, &[1, 4]), Some(OfpVersion::V1_3));
        assert_eq!(negotiate(&BOTH, 5, &[1, 5]), Some(OfpVersion::V1_0));
        assert_eq!(negotiate(&[OfpVersion::V1_3], 4, &[1]), None);
    }

    #[test]
    fn test_negotiate_without_bitmap() {
        assert_eq!(negotiate(&BOTH, 1, &[]), Some(OfpVersion::V1_0));
        assert_eq!(negotiate(&BOTH, 4, &[]), Some(OfpVersion::V1_3));
        assert_eq!(negotiate(&BOTH, 6, &[]), Some(OfpVersion::V1_3));
        assert_eq!(negotiate(&[OfpVersion::V1_3], 1, &[]), None);
    }

    #[test]
    fn test_negotiate_between_versions() {
        // a 1.2 peer without bitmap can only be spoken to in 1.0
        assert_eq!(negotiate(&BOTH, 3, &[]), Some(OfpVersion::V1_0));
    }
}
