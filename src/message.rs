use serde::Serialize;

use crate::ofp_header::OfpVersion;
use crate::openflow::MsgCode;
use crate::packet::MacAddr;

/// Continuation flag of stats (1.0) and multipart (1.3) replies.
pub const MULTIPART_REPLY_MORE: u16 = 1 << 0;

pub const ALL_TABLES: u8 = 0xff;

/// Hello message. `versions` carries the version bitmap element of 1.3 hellos and is empty
/// when the peer sent none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hello {
    pub versions: Vec<u8>,
}

impl Hello {
    /// Highest version announced in the bitmap, if any.
    pub fn highest_bitmap_version(&self) -> Option<u8> {
        self.versions.iter().copied().max()
    }
}

pub const ERROR_TYPE_HELLO_FAILED: u16 = 0;
pub const HELLO_FAILED_INCOMPATIBLE: u16 = 0;

/// Error message. Types and codes are kept raw because their numbering differs
/// between versions past `HelloFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    pub error_type: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl ErrorMsg {
    pub fn hello_failed_incompatible(data: Vec<u8>) -> ErrorMsg {
        ErrorMsg {
            error_type: ERROR_TYPE_HELLO_FAILED,
            code: HELLO_FAILED_INCOMPATIBLE,
            data,
        }
    }
}

/// Switch features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub auxiliary_id: u8,
    pub capabilities: u32,
    /// Supported actions bitmap. 1.0 only.
    pub actions: Option<u32>,
    /// Physical ports. 1.0 only; 1.3 reports them through a port description request.
    pub ports: Option<Vec<PortDesc>>,
}

pub const CONFIG_FRAG_NORMAL: u16 = 0;

/// Switch configuration sent after the features exchange.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwitchConfig {
    pub flags: u16,
    pub miss_send_len: u16,
}

/// Flags to indicate behavior of the physical port.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PortConfig(pub u32);

impl PortConfig {
    pub const PORT_DOWN: u32 = 1 << 0;

    pub fn is_port_down(&self) -> bool {
        self.0 & PortConfig::PORT_DOWN != 0
    }
}

/// Current state of a physical port. Not configurable by the controller.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PortState(pub u32);

impl PortState {
    pub const LINK_DOWN: u32 = 1 << 0;

    pub fn is_link_down(&self) -> bool {
        self.0 & PortState::LINK_DOWN != 0
    }
}

/// Features bitmap of a physical port. Bit meanings above 10Gb differ between versions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PortFeatures(pub u32);

/// Description of a physical port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PortDesc {
    pub port_no: u32,
    pub hw_addr: MacAddr,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
    /// Current speed in kbps. 1.3 only.
    pub curr_speed: Option<u32>,
    /// Maximum speed in kbps. 1.3 only.
    pub max_speed: Option<u32>,
}

impl PortDesc {
    pub fn is_link_down(&self) -> bool {
        self.state.is_link_down()
    }
}

/// What changed about a physical port.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortReason {
    PortAdd = 0,
    PortDelete = 1,
    PortModify = 2,
}

impl PortReason {
    pub fn from_u8(reason: u8) -> Option<PortReason> {
        match reason {
            0 => Some(PortReason::PortAdd),
            1 => Some(PortReason::PortDelete),
            2 => Some(PortReason::PortModify),
            _ => None,
        }
    }
}

/// A physical port has changed in the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortReason,
    pub desc: PortDesc,
}

/// The data associated with a packet received by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Buffered(u32, Vec<u8>),
    NotBuffered(Vec<u8>),
}

impl Payload {
    pub fn size_of(payload: &Payload) -> usize {
        match *payload {
            Payload::Buffered(_, ref buf) | Payload::NotBuffered(ref buf) => buf.len(),
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            Payload::Buffered(_, buf) | Payload::NotBuffered(buf) => buf,
        }
    }
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    pub in_port: u32,
    pub reason: u8,
    /// 1.3 only.
    pub table_id: u8,
    /// 1.3 only.
    pub cookie: u64,
    /// Match fields other than the ingress port. 1.3 only.
    pub fields: Vec<OxmField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mask<T> {
    pub value: T,
    pub mask: Option<T>,
}

/// Fields to match against flows (1.0 fixed match).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pattern {
    pub in_port: Option<u16>,
    pub dl_src: Option<MacAddr>,
    pub dl_dst: Option<MacAddr>,
    pub dl_vlan: Option<u16>,
    pub dl_vlan_pcp: Option<u8>,
    pub dl_typ: Option<u16>,
    pub nw_tos: Option<u8>,
    pub nw_proto: Option<u8>,
    /// `mask` holds the number of wildcarded low bits, as on the wire.
    pub nw_src: Option<Mask<u32>>,
    pub nw_dst: Option<Mask<u32>>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
}

impl Pattern {
    pub fn match_all() -> Pattern {
        Pattern::default()
    }
}

pub const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000;
pub const OXM_OF_IN_PORT: u8 = 0;
pub const OXM_OF_ETH_DST: u8 = 3;
pub const OXM_OF_ETH_SRC: u8 = 4;
pub const OXM_OF_ETH_TYPE: u8 = 5;
pub const OXM_OF_VLAN_VID: u8 = 6;

/// One OXM TLV of a 1.3 match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OxmField {
    pub class: u16,
    pub field: u8,
    pub value: Vec<u8>,
    pub mask: Option<Vec<u8>>,
}

impl OxmField {
    pub fn basic(field: u8, value: Vec<u8>) -> OxmField {
        OxmField {
            class: OXM_CLASS_OPENFLOW_BASIC,
            field,
            value,
            mask: None,
        }
    }

    pub fn in_port(port: u32) -> OxmField {
        OxmField::basic(OXM_OF_IN_PORT, port.to_be_bytes().to_vec())
    }

    pub fn is_basic(&self, field: u8) -> bool {
        self.class == OXM_CLASS_OPENFLOW_BASIC && self.field == field
    }
}

/// Version-tagged flow match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FlowMatch {
    V0x01(Pattern),
    V0x04(Vec<OxmField>),
}

impl FlowMatch {
    pub fn match_all(version: OfpVersion) -> FlowMatch {
        match version {
            OfpVersion::V1_0 => FlowMatch::V0x01(Pattern::match_all()),
            OfpVersion::V1_3 => FlowMatch::V0x04(vec![]),
        }
    }
}

/// Actions associated with flows and packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    Output { port: u32, max_len: u16 },
    /// 1.0 only.
    SetVlanVid(u16),
    /// 1.3 only, carries the pushed ethertype.
    PushVlan(u16),
    /// 1.3 only.
    PopVlan,
    /// 1.3 only.
    SetField(OxmField),
    Other { action_type: u16, body: Vec<u8> },
}

/// Flow instructions. 1.0 actions are carried as a single `ApplyActions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Instruction {
    GotoTable(u8),
    WriteActions(Vec<Action>),
    ApplyActions(Vec<Action>),
    ClearActions,
    Other { instruction_type: u16, body: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStats {
    pub table_id: u8,
    pub pattern: FlowMatch,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    /// 1.3 only.
    pub flags: u16,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub instructions: Vec<Instruction>,
}

impl FlowStats {
    /// Actions applied immediately on match, in order.
    pub fn apply_actions(&self) -> Vec<Action> {
        self.instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::ApplyActions(actions) => Some(actions.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Type of modification to perform on a flow table.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

impl FlowModCommand {
    pub fn of_int(command: u16) -> Option<FlowModCommand> {
        match command {
            0 => Some(FlowModCommand::Add),
            1 => Some(FlowModCommand::Modify),
            2 => Some(FlowModCommand::ModifyStrict),
            3 => Some(FlowModCommand::Delete),
            4 => Some(FlowModCommand::DeleteStrict),
            _ => None,
        }
    }
}

/// Represents modifications to a flow table from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCommand,
    /// 1.3 only.
    pub table_id: u8,
    pub pattern: FlowMatch,
    pub cookie: u64,
    /// 1.3 only.
    pub cookie_mask: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    pub buffer_id: Option<u32>,
    /// Restricts deletes to flows forwarding to this port. `None` means any port.
    pub out_port: Option<u32>,
    pub flags: u16,
    /// 1.0 can only carry `ApplyActions`.
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwitchDescription {
    pub manufacturer: String,
    pub hardware: String,
    pub software: String,
    pub serial_number: String,
    pub datapath: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartRequestBody {
    Desc,
    /// Match-all flow statistics request. `out_port` of `None` means any port.
    Flow { table_id: u8, out_port: Option<u32> },
    /// 1.3 only.
    PortDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartRequest {
    pub flags: u16,
    pub body: MultipartRequestBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartReplyBody {
    Desc(SwitchDescription),
    Flow(Vec<FlowStats>),
    PortDesc(Vec<PortDesc>),
    Other { reply_type: u16, body: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartReply {
    pub flags: u16,
    pub body: MultipartReplyBody,
}

impl MultipartReply {
    /// Whether more fragments of this reply follow.
    pub fn more(&self) -> bool {
        self.flags & MULTIPART_REPLY_MORE != 0
    }
}

/// Abstractions of OpenFlow messages mapping to message codes, shared by both versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    Error(ErrorMsg),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FeaturesReq,
    FeaturesReply(SwitchFeatures),
    SetConfig(SwitchConfig),
    PacketIn(PacketIn),
    PortStatus(PortStatus),
    FlowMod(FlowMod),
    MultipartRequest(MultipartRequest),
    MultipartReply(MultipartReply),
    BarrierRequest,
    BarrierReply,
    /// A well-formed message of a type the core does not interpret.
    Other { code: MsgCode, body: Vec<u8> },
}

impl Message {
    /// Map a `Message` to its OpenFlow message type code.
    pub fn code(&self) -> MsgCode {
        match *self {
            Message::Hello(_) => MsgCode::Hello,
            Message::Error(_) => MsgCode::Error,
            Message::EchoRequest(_) => MsgCode::EchoReq,
            Message::EchoReply(_) => MsgCode::EchoResp,
            Message::FeaturesReq => MsgCode::FeaturesReq,
            Message::FeaturesReply(_) => MsgCode::FeaturesResp,
            Message::SetConfig(_) => MsgCode::SetConfig,
            Message::PacketIn(_) => MsgCode::PacketIn,
            Message::PortStatus(_) => MsgCode::PortStatus,
            Message::FlowMod(_) => MsgCode::FlowMod,
            Message::MultipartRequest(_) => MsgCode::MultipartReq,
            Message::MultipartReply(_) => MsgCode::MultipartResp,
            Message::BarrierRequest => MsgCode::BarrierReq,
            Message::BarrierReply => MsgCode::BarrierResp,
            Message::Other { code, .. } => code,
        }
    }
}
