//! Keeps the registry's view of a switch in step with what the switch reports: port
//! changes, flow tables, descriptions and the addresses seen in packet-ins.

use crate::event::ControllerEvent;
use crate::handshake;
use crate::message::{
    FlowStats, Message, MultipartReply, MultipartReplyBody, MultipartRequest, MultipartRequestBody,
    PortDesc, SwitchDescription, SwitchFeatures, ALL_TABLES,
};
use crate::ofp_header::OfpHeader;
use crate::packet::{EthernetHeader, ETHERTYPE_IPV6, ETHERTYPE_LLDP};
use crate::session::Session;
use crate::switch::DatapathId;

/// The switch this session may act on. A session whose switch was taken over by a newer
/// connection no longer owns it, so whatever it still reports is dropped.
fn bound_switch(session: &Session, what: &str) -> Option<DatapathId> {
    let dpid = match session.switch {
        Some(dpid) => dpid,
        None => {
            warn!("{}: {} without a bound switch", session.id(), what);
            return None;
        }
    };
    if !session.registry.is_owner(dpid, session.id()) {
        warn!(
            "{}: dropping {} for {}, switch is owned by another connection",
            session.id(),
            what,
            dpid
        );
        return None;
    }
    Some(dpid)
}

/// Replace the port map wholesale and publish the differences.
pub(crate) fn apply_port_set(session: &mut Session, ports: Vec<PortDesc>) {
    let dpid = match bound_switch(session, "port set") {
        Some(dpid) => dpid,
        None => return,
    };
    let changes = session
        .registry
        .update_owned(dpid, session.id(), |sw| sw.replace_ports(ports))
        .unwrap_or_default();
    session.publish_port_changes(dpid, changes);
}

/// A features reply on an established connection refreshes the switch record.
pub(crate) fn refresh_features(session: &mut Session, mut features: SwitchFeatures) {
    let dpid = match bound_switch(session, "features reply") {
        Some(dpid) => dpid,
        None => return,
    };
    if features.datapath_id != dpid.0 {
        warn!(
            "{}: features reply for {} on the connection of {}, ignored",
            session.id(),
            DatapathId(features.datapath_id),
            dpid
        );
        return;
    }
    let ports = features.ports.take();
    session
        .registry
        .update_owned(dpid, session.id(), |sw| sw.update_features(&features));
    if let Some(ports) = ports {
        apply_port_set(session, ports);
    }
}

pub(crate) fn on_port_status(session: &mut Session, _header: &OfpHeader, message: Message) {
    let status = match message {
        Message::PortStatus(status) => status,
        _ => return,
    };
    let dpid = match bound_switch(session, "port status") {
        Some(dpid) => dpid,
        None => return,
    };
    debug!(
        "{}: port {} {:?} on {}",
        session.id(),
        status.desc.port_no,
        status.reason,
        dpid
    );
    let changes = session
        .registry
        .update_owned(dpid, session.id(), |sw| sw.apply_port_status(status.reason, status.desc))
        .unwrap_or_default();
    session.publish_port_changes(dpid, changes);
}

pub(crate) fn on_packet_in(session: &mut Session, header: &OfpHeader, message: Message) {
    let packet_in = match message {
        Message::PacketIn(packet_in) => packet_in,
        _ => return,
    };
    let dpid = match bound_switch(session, "packet-in") {
        Some(dpid) => dpid,
        None => return,
    };
    let frame = packet_in.input_payload.data();
    let eth = match EthernetHeader::parse(frame) {
        Some(eth) => eth,
        None => {
            warn!(
                "{}: packet-in xid {} carries a {} byte frame, too short for Ethernet",
                session.id(),
                header.xid(),
                frame.len()
            );
            return;
        }
    };
    if eth.ether_type == ETHERTYPE_LLDP || eth.ether_type == ETHERTYPE_IPV6 {
        trace!("{}: ignoring ethertype 0x{:04x}", session.id(), eth.ether_type);
        return;
    }
    session.publish(ControllerEvent::ReachableAddress {
        datapath_id: dpid,
        port_no: packet_in.in_port,
        address: eth.dl_src,
    });
}

/// Stats replies of 1.0 connections.
pub(crate) fn on_stats_reply(session: &mut Session, header: &OfpHeader, message: Message) {
    if let Message::MultipartReply(reply) = message {
        handle_reply(session, header, reply);
    }
}

/// Multipart replies of 1.3 connections, where port descriptions are one more reply type.
pub(crate) fn on_multipart_reply(session: &mut Session, header: &OfpHeader, message: Message) {
    let reply = match message {
        Message::MultipartReply(reply) => reply,
        _ => return,
    };
    let more = reply.more();
    match reply.body {
        MultipartReplyBody::PortDesc(ports) => {
            handshake::on_port_desc_reply(session, header, ports, more)
        }
        _ => handle_reply(session, header, reply),
    }
}

fn handle_reply(session: &mut Session, header: &OfpHeader, reply: MultipartReply) {
    let more = reply.more();
    match reply.body {
        MultipartReplyBody::Desc(desc) => on_description(session, desc),
        MultipartReplyBody::Flow(entries) => on_flow_stats(session, header, entries, more),
        MultipartReplyBody::PortDesc(_) => {
            debug!("{}: unexpected port description reply", session.id())
        }
        MultipartReplyBody::Other { reply_type, .. } => debug!(
            "{}: ignoring multipart reply type {}, xid {}",
            session.id(),
            reply_type,
            header.xid()
        ),
    }
}

fn on_description(session: &mut Session, desc: SwitchDescription) {
    let dpid = match bound_switch(session, "description reply") {
        Some(dpid) => dpid,
        None => return,
    };
    info!(
        "{}: {} is {} {} running {}",
        session.id(),
        dpid,
        desc.manufacturer,
        desc.hardware,
        desc.software
    );
    session
        .registry
        .update_owned(dpid, session.id(), |sw| sw.description = Some(desc));
}

fn on_flow_stats(session: &mut Session, header: &OfpHeader, entries: Vec<FlowStats>, more: bool) {
    let dpid = match bound_switch(session, "flow statistics") {
        Some(dpid) => dpid,
        None => return,
    };
    let entries = match session.flow_stats.accept(header.xid(), entries, more) {
        Some(entries) => entries,
        None => return,
    };
    let flow_count = session
        .registry
        .update_owned(dpid, session.id(), |sw| sw.replace_flows(entries));
    if let Some(flow_count) = flow_count {
        debug!("{}: {} has {} flows", session.id(), dpid, flow_count);
        session.publish(ControllerEvent::FlowsUpdated {
            datapath_id: dpid,
            flow_count,
        });
    }
}

pub(crate) fn request_flow_stats(session: &mut Session) -> bool {
    if session.is_closed() || !session.conn.is_established() {
        return false;
    }
    let xid = session.send(Message::MultipartRequest(MultipartRequest {
        flags: 0,
        body: MultipartRequestBody::Flow {
            table_id: ALL_TABLES,
            out_port: None,
        },
    }));
    session.flow_stats.begin(xid);
    true
}

pub(crate) fn on_error(session: &mut Session, header: &OfpHeader, message: Message) {
    if let Message::Error(err) = message {
        warn!(
            "{}: switch reported error type {} code {} for xid {}",
            session.id(),
            err.error_type,
            err.code,
            header.xid()
        );
    }
}

pub(crate) fn on_barrier_reply(session: &mut Session, header: &OfpHeader, _message: Message) {
    debug!("{}: barrier reply xid {}", session.id(), header.xid());
}
