use std::collections::HashMap;
use std::sync::OnceLock;

use crate::handshake;
use crate::keepalive;
use crate::message::Message;
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::openflow::MsgCode;
use crate::session::Session;
use crate::sync;

pub type Handler = fn(&mut Session, &OfpHeader, Message);

/// Maps (negotiated version, message kind) to the handler for it.
pub struct DispatchTable {
    handlers: HashMap<(OfpVersion, MsgCode), Handler>,
}

impl DispatchTable {
    /// The table every session routes through.
    pub fn new() -> DispatchTable {
        let mut table = DispatchTable {
            handlers: HashMap::new(),
        };
        for version in [OfpVersion::V1_0, OfpVersion::V1_3] {
            table.register(version, MsgCode::Hello, handshake::on_hello);
            table.register(version, MsgCode::Error, sync::on_error);
            table.register(version, MsgCode::EchoReq, keepalive::on_echo_request);
            table.register(version, MsgCode::EchoResp, keepalive::on_echo_reply);
            table.register(version, MsgCode::FeaturesResp, handshake::on_features_reply);
            table.register(version, MsgCode::PortStatus, sync::on_port_status);
            table.register(version, MsgCode::PacketIn, sync::on_packet_in);
            table.register(version, MsgCode::BarrierResp, sync::on_barrier_reply);
        }
        table.register(OfpVersion::V1_0, MsgCode::MultipartResp, sync::on_stats_reply);
        table.register(OfpVersion::V1_3, MsgCode::MultipartResp, sync::on_multipart_reply);
        table
    }

    /// Install `handler`, returning the one it replaces.
    pub fn register(
        &mut self,
        version: OfpVersion,
        code: MsgCode,
        handler: Handler,
    ) -> Option<Handler> {
        self.handlers.insert((version, code), handler)
    }

    pub fn lookup(&self, version: OfpVersion, code: MsgCode) -> Option<Handler> {
        self.handlers.get(&(version, code)).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn global() -> &'static DispatchTable {
        static TABLE: OnceLock<DispatchTable> = OnceLock::new();
        TABLE.get_or_init(DispatchTable::new)
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        DispatchTable::new()
    }
}
