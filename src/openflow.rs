use std::fmt::{Display, Error, Formatter};

use crate::ofp_header::OfpVersion;

/// OpenFlow message type codes, used by headers to identify meaning of the rest of a message.
///
/// The variants cover both wire versions. Types that were renamed between 1.0 and 1.3
/// share a variant (`Vendor` became `Experimenter`, stats became multipart).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MsgCode {
    Hello,
    Error,
    EchoReq,
    EchoResp,
    Experimenter,
    FeaturesReq,
    FeaturesResp,
    GetConfigReq,
    GetConfigResp,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    GroupMod,
    PortMod,
    TableMod,
    MultipartReq,
    MultipartResp,
    BarrierReq,
    BarrierResp,
    QueueGetConfigReq,
    QueueGetConfigResp,
    RoleReq,
    RoleResp,
    GetAsyncReq,
    GetAsyncResp,
    SetAsync,
    MeterMod,
}

const CODES_0X01: [MsgCode; 22] = [
    MsgCode::Hello,
    MsgCode::Error,
    MsgCode::EchoReq,
    MsgCode::EchoResp,
    MsgCode::Experimenter,
    MsgCode::FeaturesReq,
    MsgCode::FeaturesResp,
    MsgCode::GetConfigReq,
    MsgCode::GetConfigResp,
    MsgCode::SetConfig,
    MsgCode::PacketIn,
    MsgCode::FlowRemoved,
    MsgCode::PortStatus,
    MsgCode::PacketOut,
    MsgCode::FlowMod,
    MsgCode::PortMod,
    MsgCode::MultipartReq,
    MsgCode::MultipartResp,
    MsgCode::BarrierReq,
    MsgCode::BarrierResp,
    MsgCode::QueueGetConfigReq,
    MsgCode::QueueGetConfigResp,
];

const CODES_0X04: [MsgCode; 30] = [
    MsgCode::Hello,
    MsgCode::Error,
    MsgCode::EchoReq,
    MsgCode::EchoResp,
    MsgCode::Experimenter,
    MsgCode::FeaturesReq,
    MsgCode::FeaturesResp,
    MsgCode::GetConfigReq,
    MsgCode::GetConfigResp,
    MsgCode::SetConfig,
    MsgCode::PacketIn,
    MsgCode::FlowRemoved,
    MsgCode::PortStatus,
    MsgCode::PacketOut,
    MsgCode::FlowMod,
    MsgCode::GroupMod,
    MsgCode::PortMod,
    MsgCode::TableMod,
    MsgCode::MultipartReq,
    MsgCode::MultipartResp,
    MsgCode::BarrierReq,
    MsgCode::BarrierResp,
    MsgCode::QueueGetConfigReq,
    MsgCode::QueueGetConfigResp,
    MsgCode::RoleReq,
    MsgCode::RoleResp,
    MsgCode::GetAsyncReq,
    MsgCode::GetAsyncResp,
    MsgCode::SetAsync,
    MsgCode::MeterMod,
];

impl MsgCode {
    fn table(version: OfpVersion) -> &'static [MsgCode] {
        match version {
            OfpVersion::V1_0 => &CODES_0X01,
            OfpVersion::V1_3 => &CODES_0X04,
        }
    }

    /// Resolve a raw type byte for the given version.
    pub fn from_wire(version: OfpVersion, code: u8) -> Option<MsgCode> {
        MsgCode::table(version).get(code as usize).copied()
    }

    /// The raw type byte of this code for the given version, if the version has it.
    pub fn to_wire(self, version: OfpVersion) -> Option<u8> {
        MsgCode::table(version)
            .iter()
            .position(|c| *c == self)
            .map(|p| p as u8)
    }
}

impl Display for MsgCode {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let text = match self {
            MsgCode::Hello => "Hello",
            MsgCode::Error => "Error",
            MsgCode::EchoReq => "EchoReq",
            MsgCode::EchoResp => "EchoResp",
            MsgCode::Experimenter => "Experimenter",
            MsgCode::FeaturesReq => "FeaturesReq",
            MsgCode::FeaturesResp => "FeaturesResp",
            MsgCode::GetConfigReq => "GetConfigReq",
            MsgCode::GetConfigResp => "GetConfigResp",
            MsgCode::SetConfig => "SetConfig",
            MsgCode::PacketIn => "PacketIn",
            MsgCode::FlowRemoved => "FlowRemoved",
            MsgCode::PortStatus => "PortStatus",
            MsgCode::PacketOut => "PacketOut",
            MsgCode::FlowMod => "FlowMod",
            MsgCode::GroupMod => "GroupMod",
            MsgCode::PortMod => "PortMod",
            MsgCode::TableMod => "TableMod",
            MsgCode::MultipartReq => "MultipartReq",
            MsgCode::MultipartResp => "MultipartResp",
            MsgCode::BarrierReq => "BarrierReq",
            MsgCode::BarrierResp => "BarrierResp",
            MsgCode::QueueGetConfigReq => "QueueGetConfigReq",
            MsgCode::QueueGetConfigResp => "QueueGetConfigResp",
            MsgCode::RoleReq => "RoleReq",
            MsgCode::RoleResp => "RoleResp",
            MsgCode::GetAsyncReq => "GetAsyncReq",
            MsgCode::GetAsyncResp => "GetAsyncResp",
            MsgCode::SetAsync => "SetAsync",
            MsgCode::MeterMod => "MeterMod",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_differ_between_versions() {
        assert_eq!(MsgCode::from_wire(OfpVersion::V1_0, 17), Some(MsgCode::MultipartResp));
        assert_eq!(MsgCode::from_wire(OfpVersion::V1_3, 19), Some(MsgCode::MultipartResp));
        assert_eq!(MsgCode::BarrierReq.to_wire(OfpVersion::V1_0), Some(18));
        assert_eq!(MsgCode::BarrierReq.to_wire(OfpVersion::V1_3), Some(20));
        assert_eq!(MsgCode::GroupMod.to_wire(OfpVersion::V1_0), None);
        assert_eq!(MsgCode::from_wire(OfpVersion::V1_0, 22), None);
    }
}
