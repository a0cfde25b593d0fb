use crate::connection::ConnectionId;
use crate::message::PortDesc;
use crate::ofp_header::OfpVersion;
use crate::packet::MacAddr;
use crate::switch::DatapathId;

/// Events published by connection workers and fanned out to every registered app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The peer proposed no version this controller supports.
    NegotiationFailed {
        connection: ConnectionId,
        peer_version: u8,
    },
    /// A protocol violation or a malformed handshake message closed the connection.
    ConnectionFailed {
        connection: ConnectionId,
        reason: String,
    },
    HandshakeCompleted {
        connection: ConnectionId,
        datapath_id: DatapathId,
        version: OfpVersion,
    },
    SwitchDisconnected {
        connection: ConnectionId,
        datapath_id: DatapathId,
    },
    LivenessFailed {
        connection: ConnectionId,
        datapath_id: Option<DatapathId>,
    },
    PortCreated {
        datapath_id: DatapathId,
        port: PortDesc,
    },
    /// Carries the complete current port.
    PortModified {
        datapath_id: DatapathId,
        port: PortDesc,
    },
    PortDeleted {
        datapath_id: DatapathId,
        port: PortDesc,
    },
    LinkUp {
        datapath_id: DatapathId,
        port_no: u32,
    },
    LinkDown {
        datapath_id: DatapathId,
        port_no: u32,
    },
    ReachableAddress {
        datapath_id: DatapathId,
        port_no: u32,
        address: MacAddr,
    },
    FlowsUpdated {
        datapath_id: DatapathId,
        flow_count: usize,
    },
}
