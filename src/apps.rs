use std::sync::Arc;

use crate::event::ControllerEvent;
use crate::ofp_controller::ControllerApp;

/// Logs every controller event. Registered by the binary so a bare controller still shows
/// what its switches are doing.
#[derive(Default)]
pub struct EventLogger;

impl EventLogger {
    pub fn new() -> EventLogger {
        EventLogger
    }

    fn describe(event: &ControllerEvent) -> String {
        match event {
            ControllerEvent::NegotiationFailed {
                connection,
                peer_version,
            } => format!(
                "{}: version negotiation failed, peer offered 0x{:02x}",
                connection, peer_version
            ),
            ControllerEvent::ConnectionFailed { connection, reason } => {
                format!("{}: connection failed: {}", connection, reason)
            }
            ControllerEvent::HandshakeCompleted {
                connection,
                datapath_id,
                version,
            } => format!("{}: switch {} up, OpenFlow {}", connection, datapath_id, version),
            ControllerEvent::SwitchDisconnected {
                connection,
                datapath_id,
            } => format!("{}: switch {} down", connection, datapath_id),
            ControllerEvent::LivenessFailed {
                connection,
                datapath_id: Some(dpid),
            } => format!("{}: switch {} stopped answering", connection, dpid),
            ControllerEvent::LivenessFailed {
                connection,
                datapath_id: None,
            } => format!("{}: handshake timed out", connection),
            ControllerEvent::PortCreated { datapath_id, port } => {
                format!("{}: port {} ({}) added", datapath_id, port.port_no, port.name)
            }
            ControllerEvent::PortModified { datapath_id, port } => {
                format!("{}: port {} ({}) modified", datapath_id, port.port_no, port.name)
            }
            ControllerEvent::PortDeleted { datapath_id, port } => {
                format!("{}: port {} ({}) removed", datapath_id, port.port_no, port.name)
            }
            ControllerEvent::LinkUp { datapath_id, port_no } => {
                format!("{}: link up on port {}", datapath_id, port_no)
            }
            ControllerEvent::LinkDown { datapath_id, port_no } => {
                format!("{}: link down on port {}", datapath_id, port_no)
            }
            ControllerEvent::ReachableAddress {
                datapath_id,
                port_no,
                address,
            } => format!("{}: {} seen on port {}", datapath_id, address, port_no),
            ControllerEvent::FlowsUpdated {
                datapath_id,
                flow_count,
            } => format!("{}: {} flows", datapath_id, flow_count),
        }
    }
}

impl ControllerApp for EventLogger {
    fn event(&mut self, event: Arc<ControllerEvent>) {
        match *event {
            ControllerEvent::ReachableAddress { .. } | ControllerEvent::FlowsUpdated { .. } => {
                debug!("{}", EventLogger::describe(&event))
            }
            ControllerEvent::NegotiationFailed { .. }
            | ControllerEvent::ConnectionFailed { .. }
            | ControllerEvent::LivenessFailed { .. } => warn!("{}", EventLogger::describe(&event)),
            _ => info!("{}", EventLogger::describe(&event)),
        }
    }

    fn start(&mut self) {
        info!("Starting event logger");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use crate::ofp_header::OfpVersion;
    use crate::switch::DatapathId;

    #[test]
    fn test_describe_handshake() {
        let event = ControllerEvent::HandshakeCompleted {
            connection: ConnectionId(2),
            datapath_id: DatapathId(1),
            version: OfpVersion::V1_3,
        };
        assert_eq!(
            EventLogger::describe(&event),
            "conn-2: switch 00:00:00:00:00:00:00:01 up, OpenFlow 1.3"
        );
    }

    #[test]
    fn test_describe_handshake_timeout() {
        let event = ControllerEvent::LivenessFailed {
            connection: ConnectionId(7),
            datapath_id: None,
        };
        assert_eq!(EventLogger::describe(&event), "conn-7: handshake timed out");
    }
}
