use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;

use crate::message::*;
use crate::ofp_message::OfpSerializationError;
use crate::ofp_utils::{
    read_fixed_size_string, read_mac, read_remaining, remaining, skip_bytes, take_slice,
    test_bit, write_fixed_size_string, write_padding_bytes,
};
use crate::ofp_header::OPENFLOW_0_01_VERSION;

const OFP_MAX_PORT_NAME_LEN: usize = 16;
const DESC_STR_LENGTH: usize = 256;
const SERIAL_NUM_LENGTH: usize = 32;

const PHY_PORT_LENGTH: usize = 48;
const FLOW_STATS_HEADER_LENGTH: usize = 88;

const OFPST_DESC: u16 = 0;
const OFPST_FLOW: u16 = 1;

const OFPP_MAX: u16 = 0xff00;
const OFPP_NONE: u16 = 0xffff;
const OFPFW_NW_ALL_BITS: u32 = 63;

/// Common API for message types implementing OpenFlow Message Codes (see `MsgCode` enum).
pub trait MessageType {
    /// Parse a buffer into a message.
    fn parse(buf: &[u8]) -> Result<Self, OfpSerializationError>
    where
        Self: Sized;
    /// Marshal a message into a `u8` buffer.
    fn marshal(msg: Self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError>;
}

fn unavailable(feature: &str) -> OfpSerializationError {
    OfpSerializationError::UnimplementedFeatureInVersion {
        version: OPENFLOW_0_01_VERSION,
        feature: feature.to_string(),
    }
}

create_empty_wrapper!(PortNo, PortNo0x01);

impl PortNo0x01 {
    /// Widen a 1.0 port number. Reserved ports map onto their 1.3 values so the switch
    /// model uses one numbering.
    fn of_int(p: u16) -> u32 {
        if p > OFPP_MAX {
            0xffff_0000 | p as u32
        } else {
            p as u32
        }
    }

    fn to_int(p: u32) -> Result<u16, OfpSerializationError> {
        if p <= OFPP_MAX as u32 {
            Ok(p as u16)
        } else if p >= 0xffff_ff00 {
            Ok((p & 0xffff) as u16)
        } else {
            Err(OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", p),
                field: "port number".to_string(),
                message: "OpenFlow 1.0 port".to_string(),
            })
        }
    }
}

create_empty_wrapper!(Wildcards, Wildcards0x01);

impl Wildcards0x01 {
    fn set_nw_mask(f: u32, offset: usize, v: u32) -> u32 {
        let value = (0x3f & v) << offset;
        f | value
    }

    fn get_nw_mask(f: u32, offset: usize) -> u32 {
        (f >> offset) & 0x3f
    }

    fn nw_bits(field: &Option<Mask<u32>>) -> u32 {
        match field {
            None => OFPFW_NW_ALL_BITS,
            Some(m) => m.mask.unwrap_or(0),
        }
    }

    fn of_pattern(p: &Pattern) -> u32 {
        let flag = |wildcarded: bool, bit: u32| if wildcarded { 1u32 << bit } else { 0 };
        let w = flag(p.in_port.is_none(), 0)
            | flag(p.dl_vlan.is_none(), 1)
            | flag(p.dl_src.is_none(), 2)
            | flag(p.dl_dst.is_none(), 3)
            | flag(p.dl_typ.is_none(), 4)
            | flag(p.nw_proto.is_none(), 5)
            | flag(p.tp_src.is_none(), 6)
            | flag(p.tp_dst.is_none(), 7)
            | flag(p.dl_vlan_pcp.is_none(), 20)
            | flag(p.nw_tos.is_none(), 21);
        let w = Wildcards0x01::set_nw_mask(w, 8, Wildcards0x01::nw_bits(&p.nw_src));
        Wildcards0x01::set_nw_mask(w, 14, Wildcards0x01::nw_bits(&p.nw_dst))
    }
}

create_empty_wrapper!(Pattern, Pattern0x01);

impl Pattern0x01 {
    fn nw_of_bits(value: u32, bits: u32) -> Option<Mask<u32>> {
        if bits >= 32 {
            None
        } else if bits == 0 {
            Some(Mask { value, mask: None })
        } else {
            Some(Mask {
                value,
                mask: Some(bits),
            })
        }
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Pattern, OfpSerializationError> {
        let w = bytes.read_u32::<BigEndian>()?;
        let in_port = bytes.read_u16::<BigEndian>()?;
        let dl_src = read_mac(bytes)?;
        let dl_dst = read_mac(bytes)?;
        let dl_vlan = bytes.read_u16::<BigEndian>()?;
        let dl_vlan_pcp = bytes.read_u8()?;
        skip_bytes(bytes, 1)?;
        let dl_typ = bytes.read_u16::<BigEndian>()?;
        let nw_tos = bytes.read_u8()?;
        let nw_proto = bytes.read_u8()?;
        skip_bytes(bytes, 2)?;
        let nw_src = bytes.read_u32::<BigEndian>()?;
        let nw_dst = bytes.read_u32::<BigEndian>()?;
        let tp_src = bytes.read_u16::<BigEndian>()?;
        let tp_dst = bytes.read_u16::<BigEndian>()?;

        let unless = |bit: u32| !test_bit(bit, w as u64);
        Ok(Pattern {
            in_port: Some(in_port).filter(|_| unless(0)),
            dl_vlan: Some(dl_vlan).filter(|_| unless(1)),
            dl_src: Some(dl_src).filter(|_| unless(2)),
            dl_dst: Some(dl_dst).filter(|_| unless(3)),
            dl_typ: Some(dl_typ).filter(|_| unless(4)),
            nw_proto: Some(nw_proto).filter(|_| unless(5)),
            tp_src: Some(tp_src).filter(|_| unless(6)),
            tp_dst: Some(tp_dst).filter(|_| unless(7)),
            nw_src: Pattern0x01::nw_of_bits(nw_src, Wildcards0x01::get_nw_mask(w, 8)),
            nw_dst: Pattern0x01::nw_of_bits(nw_dst, Wildcards0x01::get_nw_mask(w, 14)),
            dl_vlan_pcp: Some(dl_vlan_pcp).filter(|_| unless(20)),
            nw_tos: Some(nw_tos).filter(|_| unless(21)),
        })
    }

    fn marshal(p: &Pattern, bytes: &mut Vec<u8>) {
        bytes.put_u32(Wildcards0x01::of_pattern(p));
        bytes.put_u16(p.in_port.unwrap_or(0));
        bytes.put_slice(&p.dl_src.unwrap_or_default().octets());
        bytes.put_slice(&p.dl_dst.unwrap_or_default().octets());
        bytes.put_u16(p.dl_vlan.unwrap_or(0));
        bytes.put_u8(p.dl_vlan_pcp.unwrap_or(0));
        write_padding_bytes(bytes, 1);
        bytes.put_u16(p.dl_typ.unwrap_or(0));
        bytes.put_u8(p.nw_tos.unwrap_or(0));
        bytes.put_u8(p.nw_proto.unwrap_or(0));
        write_padding_bytes(bytes, 2);
        bytes.put_u32(p.nw_src.as_ref().map(|m| m.value).unwrap_or(0));
        bytes.put_u32(p.nw_dst.as_ref().map(|m| m.value).unwrap_or(0));
        bytes.put_u16(p.tp_src.unwrap_or(0));
        bytes.put_u16(p.tp_dst.unwrap_or(0));
    }

    fn of_flow_match(m: &FlowMatch) -> Result<&Pattern, OfpSerializationError> {
        match m {
            FlowMatch::V0x01(p) => Ok(p),
            FlowMatch::V0x04(_) => Err(unavailable("OXM match")),
        }
    }
}

const OFPAT_OUTPUT: u16 = 0;
const OFPAT_SET_VLAN_VID: u16 = 1;

create_empty_wrapper!(Action, Action0x01);

impl Action0x01 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Action, OfpSerializationError> {
        let action_type = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < 8 {
            return Err(OfpSerializationError::InvalidLength { length: len });
        }
        let body = take_slice(bytes, len - 4)?;
        let mut body_bytes = Cursor::new(body);
        let action = match action_type {
            OFPAT_OUTPUT => Action::Output {
                port: PortNo0x01::of_int(body_bytes.read_u16::<BigEndian>()?),
                max_len: body_bytes.read_u16::<BigEndian>()?,
            },
            OFPAT_SET_VLAN_VID => Action::SetVlanVid(body_bytes.read_u16::<BigEndian>()?),
            _ => Action::Other {
                action_type,
                body: body.to_vec(),
            },
        };
        Ok(action)
    }

    fn parse_sequence(bytes: &mut Cursor<&[u8]>) -> Result<Vec<Action>, OfpSerializationError> {
        let mut actions = vec![];
        while remaining(bytes) > 0 {
            actions.push(Action0x01::parse(bytes)?);
        }
        Ok(actions)
    }

    fn marshal(act: &Action, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match act {
            Action::Output { port, max_len } => {
                bytes.put_u16(OFPAT_OUTPUT);
                bytes.put_u16(8);
                bytes.put_u16(PortNo0x01::to_int(*port)?);
                bytes.put_u16(*max_len);
            }
            Action::SetVlanVid(vid) => {
                bytes.put_u16(OFPAT_SET_VLAN_VID);
                bytes.put_u16(8);
                bytes.put_u16(*vid);
                write_padding_bytes(bytes, 2);
            }
            Action::Other { action_type, body } => {
                bytes.put_u16(*action_type);
                bytes.put_u16((4 + body.len()) as u16);
                bytes.put_slice(body);
            }
            Action::PushVlan(_) | Action::PopVlan | Action::SetField(_) => {
                return Err(unavailable(&format!("Action {:?}", act)));
            }
        }
        Ok(())
    }
}

create_empty_wrapper!(PortDesc, PortDesc0x01);

impl PortDesc0x01 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortDesc, OfpSerializationError> {
        let port_no = PortNo0x01::of_int(bytes.read_u16::<BigEndian>()?);
        let hw_addr = read_mac(bytes)?;
        let name = read_fixed_size_string(bytes, OFP_MAX_PORT_NAME_LEN)?;
        Ok(PortDesc {
            port_no,
            hw_addr,
            name,
            config: PortConfig(bytes.read_u32::<BigEndian>()?),
            state: PortState(bytes.read_u32::<BigEndian>()?),
            curr: PortFeatures(bytes.read_u32::<BigEndian>()?),
            advertised: PortFeatures(bytes.read_u32::<BigEndian>()?),
            supported: PortFeatures(bytes.read_u32::<BigEndian>()?),
            peer: PortFeatures(bytes.read_u32::<BigEndian>()?),
            curr_speed: None,
            max_speed: None,
        })
    }

    fn parse_sequence(bytes: &mut Cursor<&[u8]>) -> Result<Vec<PortDesc>, OfpSerializationError> {
        let rem = remaining(bytes);
        if rem % PHY_PORT_LENGTH != 0 {
            return Err(OfpSerializationError::InvalidLength { length: rem });
        }
        (0..rem / PHY_PORT_LENGTH)
            .map(|_| PortDesc0x01::parse(bytes))
            .collect()
    }

    fn marshal(pd: &PortDesc, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.put_u16(PortNo0x01::to_int(pd.port_no)?);
        bytes.put_slice(&pd.hw_addr.octets());
        write_fixed_size_string(bytes, &pd.name, OFP_MAX_PORT_NAME_LEN);
        bytes.put_u32(pd.config.0);
        bytes.put_u32(pd.state.0);
        bytes.put_u32(pd.curr.0);
        bytes.put_u32(pd.advertised.0);
        bytes.put_u32(pd.supported.0);
        bytes.put_u32(pd.peer.0);
        Ok(())
    }
}

impl MessageType for SwitchFeatures {
    fn parse(buf: &[u8]) -> Result<SwitchFeatures, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        skip_bytes(&mut bytes, 3)?;
        let capabilities = bytes.read_u32::<BigEndian>()?;
        let actions = bytes.read_u32::<BigEndian>()?;
        let ports = PortDesc0x01::parse_sequence(&mut bytes)?;
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            auxiliary_id: 0,
            capabilities,
            actions: Some(actions),
            ports: Some(ports),
        })
    }

    fn marshal(sf: SwitchFeatures, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.put_u64(sf.datapath_id);
        bytes.put_u32(sf.num_buffers);
        bytes.put_u8(sf.num_tables);
        write_padding_bytes(bytes, 3);
        bytes.put_u32(sf.capabilities);
        bytes.put_u32(sf.actions.unwrap_or(0));
        for port in sf.ports.iter().flatten() {
            PortDesc0x01::marshal(port, bytes)?;
        }
        Ok(())
    }
}

impl MessageType for SwitchConfig {
    fn parse(buf: &[u8]) -> Result<SwitchConfig, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        Ok(SwitchConfig {
            flags: bytes.read_u16::<BigEndian>()?,
            miss_send_len: bytes.read_u16::<BigEndian>()?,
        })
    }

    fn marshal(sc: SwitchConfig, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.put_u16(sc.flags);
        bytes.put_u16(sc.miss_send_len);
        Ok(())
    }
}

const NO_BUFFER: u32 = 0xffff_ffff;

impl MessageType for PacketIn {
    fn parse(buf: &[u8]) -> Result<PacketIn, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let buf_id = bytes.read_u32::<BigEndian>()?;
        let total_len = bytes.read_u16::<BigEndian>()?;
        let in_port = PortNo0x01::of_int(bytes.read_u16::<BigEndian>()?);
        let reason = bytes.read_u8()?;
        skip_bytes(&mut bytes, 1)?;
        let pk = read_remaining(&mut bytes);
        let input_payload = match buf_id {
            NO_BUFFER => Payload::NotBuffered(pk),
            n => Payload::Buffered(n, pk),
        };
        Ok(PacketIn {
            input_payload,
            total_len,
            in_port,
            reason,
            table_id: 0,
            cookie: 0,
            fields: vec![],
        })
    }

    fn marshal(pi: PacketIn, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let buf_id = match pi.input_payload {
            Payload::NotBuffered(_) => NO_BUFFER,
            Payload::Buffered(n, _) => n,
        };
        bytes.put_u32(buf_id);
        bytes.put_u16(pi.total_len);
        bytes.put_u16(PortNo0x01::to_int(pi.in_port)?);
        bytes.put_u8(pi.reason);
        write_padding_bytes(bytes, 1);
        bytes.put_slice(pi.input_payload.data());
        Ok(())
    }
}

impl MessageType for PortStatus {
    fn parse(buf: &[u8]) -> Result<PortStatus, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let raw_reason = bytes.read_u8()?;
        let reason = PortReason::from_u8(raw_reason).ok_or_else(|| {
            OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", raw_reason),
                field: "reason".to_string(),
                message: "port status".to_string(),
            }
        })?;
        skip_bytes(&mut bytes, 7)?;
        let desc = PortDesc0x01::parse(&mut bytes)?;
        Ok(PortStatus { reason, desc })
    }

    fn marshal(ps: PortStatus, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.put_u8(ps.reason as u8);
        write_padding_bytes(bytes, 7);
        PortDesc0x01::marshal(&ps.desc, bytes)
    }
}

fn flow_mod_command(raw: u16) -> Result<FlowModCommand, OfpSerializationError> {
    FlowModCommand::of_int(raw).ok_or_else(|| OfpSerializationError::UnexpectedValueError {
        value: format!("{:x}", raw),
        field: "command".to_string(),
        message: "flow mod".to_string(),
    })
}

impl MessageType for FlowMod {
    fn parse(buf: &[u8]) -> Result<FlowMod, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let pattern = Pattern0x01::parse(&mut bytes)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let command = flow_mod_command(bytes.read_u16::<BigEndian>()?)?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let out_port = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let actions = Action0x01::parse_sequence(&mut bytes)?;
        Ok(FlowMod {
            command,
            table_id: 0,
            pattern: FlowMatch::V0x01(pattern),
            cookie,
            cookie_mask: 0,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id: Some(buffer_id).filter(|id| *id != NO_BUFFER),
            out_port: Some(out_port)
                .filter(|p| *p != OFPP_NONE)
                .map(PortNo0x01::of_int),
            flags,
            instructions: vec![Instruction::ApplyActions(actions)],
        })
    }

    fn marshal(fm: FlowMod, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut actions = vec![];
        for ins in &fm.instructions {
            match ins {
                Instruction::ApplyActions(acts) => {
                    for act in acts {
                        Action0x01::marshal(act, &mut actions)?;
                    }
                }
                _ => return Err(unavailable(&format!("Instruction {:?}", ins))),
            }
        }
        Pattern0x01::marshal(Pattern0x01::of_flow_match(&fm.pattern)?, bytes);
        bytes.put_u64(fm.cookie);
        bytes.put_u16(fm.command as u16);
        bytes.put_u16(fm.idle_timeout);
        bytes.put_u16(fm.hard_timeout);
        bytes.put_u16(fm.priority);
        bytes.put_u32(fm.buffer_id.unwrap_or(NO_BUFFER));
        match fm.out_port {
            None => bytes.put_u16(OFPP_NONE),
            Some(port) => bytes.put_u16(PortNo0x01::to_int(port)?),
        }
        bytes.put_u16(fm.flags);
        bytes.put_slice(&actions);
        Ok(())
    }
}

impl MessageType for ErrorMsg {
    fn parse(buf: &[u8]) -> Result<ErrorMsg, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        Ok(ErrorMsg {
            error_type: bytes.read_u16::<BigEndian>()?,
            code: bytes.read_u16::<BigEndian>()?,
            data: read_remaining(&mut bytes),
        })
    }

    fn marshal(err: ErrorMsg, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.put_u16(err.error_type);
        bytes.put_u16(err.code);
        bytes.put_slice(&err.data);
        Ok(())
    }
}

impl MessageType for MultipartRequest {
    fn parse(buf: &[u8]) -> Result<MultipartRequest, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let req_type = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let body = match req_type {
            OFPST_DESC => MultipartRequestBody::Desc,
            OFPST_FLOW => {
                Pattern0x01::parse(&mut bytes)?;
                let table_id = bytes.read_u8()?;
                skip_bytes(&mut bytes, 1)?;
                let out_port = bytes.read_u16::<BigEndian>()?;
                MultipartRequestBody::Flow {
                    table_id,
                    out_port: if out_port == OFPP_NONE {
                        None
                    } else {
                        Some(PortNo0x01::of_int(out_port))
                    },
                }
            }
            t => {
                return Err(OfpSerializationError::UnexpectedValueError {
                    value: format!("{:x}", t),
                    field: "type".to_string(),
                    message: "stats request".to_string(),
                })
            }
        };
        Ok(MultipartRequest { flags, body })
    }

    fn marshal(sr: MultipartRequest, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match sr.body {
            MultipartRequestBody::Desc => {
                bytes.put_u16(OFPST_DESC);
                bytes.put_u16(sr.flags);
            }
            MultipartRequestBody::Flow { table_id, out_port } => {
                bytes.put_u16(OFPST_FLOW);
                bytes.put_u16(sr.flags);
                Pattern0x01::marshal(&Pattern::match_all(), bytes);
                bytes.put_u8(table_id);
                write_padding_bytes(bytes, 1);
                bytes.put_u16(match out_port {
                    Some(p) => PortNo0x01::to_int(p)?,
                    None => OFPP_NONE,
                });
            }
            MultipartRequestBody::PortDesc => return Err(unavailable("Port description request")),
        }
        Ok(())
    }
}

create_empty_wrapper!(FlowStats, FlowStats0x01);

impl FlowStats0x01 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStats, OfpSerializationError> {
        let length = bytes.read_u16::<BigEndian>()? as usize;
        if length < FLOW_STATS_HEADER_LENGTH {
            return Err(OfpSerializationError::InvalidLength { length });
        }
        let entry = take_slice(bytes, length - 2)?;
        let mut bytes = Cursor::new(entry);
        let table_id = bytes.read_u8()?;
        skip_bytes(&mut bytes, 1)?;
        let pattern = Pattern0x01::parse(&mut bytes)?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        skip_bytes(&mut bytes, 6)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let actions = Action0x01::parse_sequence(&mut bytes)?;
        Ok(FlowStats {
            table_id,
            pattern: FlowMatch::V0x01(pattern),
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            flags: 0,
            cookie,
            packet_count,
            byte_count,
            instructions: vec![Instruction::ApplyActions(actions)],
        })
    }

    fn marshal(fs: &FlowStats, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut actions = vec![];
        for act in fs.apply_actions() {
            Action0x01::marshal(&act, &mut actions)?;
        }
        bytes.put_u16((FLOW_STATS_HEADER_LENGTH + actions.len()) as u16);
        bytes.put_u8(fs.table_id);
        write_padding_bytes(bytes, 1);
        Pattern0x01::marshal(Pattern0x01::of_flow_match(&fs.pattern)?, bytes);
        bytes.put_u32(fs.duration_sec);
        bytes.put_u32(fs.duration_nsec);
        bytes.put_u16(fs.priority);
        bytes.put_u16(fs.idle_timeout);
        bytes.put_u16(fs.hard_timeout);
        write_padding_bytes(bytes, 6);
        bytes.put_u64(fs.cookie);
        bytes.put_u64(fs.packet_count);
        bytes.put_u64(fs.byte_count);
        bytes.put_slice(&actions);
        Ok(())
    }
}

create_empty_wrapper!(SwitchDescription, SwitchDescription0x01);

impl SwitchDescription0x01 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<SwitchDescription, OfpSerializationError> {
        Ok(SwitchDescription {
            manufacturer: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
            hardware: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
            software: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
            serial_number: read_fixed_size_string(bytes, SERIAL_NUM_LENGTH)?,
            datapath: read_fixed_size_string(bytes, DESC_STR_LENGTH)?,
        })
    }

    fn marshal(desc: &SwitchDescription, bytes: &mut Vec<u8>) {
        write_fixed_size_string(bytes, &desc.manufacturer, DESC_STR_LENGTH);
        write_fixed_size_string(bytes, &desc.hardware, DESC_STR_LENGTH);
        write_fixed_size_string(bytes, &desc.software, DESC_STR_LENGTH);
        write_fixed_size_string(bytes, &desc.serial_number, SERIAL_NUM_LENGTH);
        write_fixed_size_string(bytes, &desc.datapath, DESC_STR_LENGTH);
    }
}

impl MessageType for MultipartReply {
    fn parse(buf: &[u8]) -> Result<MultipartReply, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let reply_type = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let body = match reply_type {
            OFPST_DESC => MultipartReplyBody::Desc(SwitchDescription0x01::parse(&mut bytes)?),
            OFPST_FLOW => {
                let mut flow_stats = vec![];
                while remaining(&bytes) > 0 {
                    flow_stats.push(FlowStats0x01::parse(&mut bytes)?);
                }
                MultipartReplyBody::Flow(flow_stats)
            }
            _ => MultipartReplyBody::Other {
                reply_type,
                body: read_remaining(&mut bytes),
            },
        };
        Ok(MultipartReply { flags, body })
    }

    fn marshal(sr: MultipartReply, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match sr.body {
            MultipartReplyBody::Desc(desc) => {
                bytes.put_u16(OFPST_DESC);
                bytes.put_u16(sr.flags);
                SwitchDescription0x01::marshal(&desc, bytes);
            }
            MultipartReplyBody::Flow(flow_stats) => {
                bytes.put_u16(OFPST_FLOW);
                bytes.put_u16(sr.flags);
                for fs in &flow_stats {
                    FlowStats0x01::marshal(fs, bytes)?;
                }
            }
            MultipartReplyBody::Other { reply_type, body } => {
                bytes.put_u16(reply_type);
                bytes.put_u16(sr.flags);
                bytes.put_slice(&body);
            }
            MultipartReplyBody::PortDesc(_) => return Err(unavailable("Port description reply")),
        }
        Ok(())
    }
}

/// Encapsulates handling of messages implementing `MessageType` trait.
pub mod message {
    use super::*;
    use crate::ofp_header::{OfpHeader, OfpVersion, Xid};
    use crate::ofp_message::OfpMessage;
    use crate::openflow::MsgCode;

    pub struct Message0x01 {
        inner: Message,
    }

    impl From<Message> for Message0x01 {
        fn from(m: Message) -> Self {
            Message0x01 { inner: m }
        }
    }

    impl Message0x01 {
        pub fn message(self) -> Message {
            self.inner
        }

        fn msg_code_of_message_u8(msg: &Message) -> Result<u8, OfpSerializationError> {
            let code = msg.code();
            code.to_wire(OfpVersion::V1_0)
                .ok_or(OfpSerializationError::UnsupportedMessageCode {
                    version: OPENFLOW_0_01_VERSION,
                    code,
                })
        }

        /// Marshal the OpenFlow message `msg`.
        fn marshal_body(msg: Message, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
            match msg {
                Message::Hello(_) => Ok(()),
                Message::Error(err) => ErrorMsg::marshal(err, bytes),
                Message::EchoRequest(buf) | Message::EchoReply(buf) => {
                    bytes.put_slice(&buf);
                    Ok(())
                }
                Message::FeaturesReq => Ok(()),
                Message::FeaturesReply(feats) => SwitchFeatures::marshal(feats, bytes),
                Message::SetConfig(config) => SwitchConfig::marshal(config, bytes),
                Message::PacketIn(packet_in) => PacketIn::marshal(packet_in, bytes),
                Message::PortStatus(status) => PortStatus::marshal(status, bytes),
                Message::FlowMod(flow_mod) => FlowMod::marshal(flow_mod, bytes),
                Message::MultipartRequest(req) => MultipartRequest::marshal(req, bytes),
                Message::MultipartReply(reply) => MultipartReply::marshal(reply, bytes),
                Message::BarrierRequest | Message::BarrierReply => Ok(()),
                Message::Other { body, .. } => {
                    bytes.put_slice(&body);
                    Ok(())
                }
            }
        }
    }

    impl OfpMessage for Message0x01 {
        fn marshal(xid: Xid, msg: Message0x01) -> Result<Vec<u8>, OfpSerializationError> {
            let typ = Self::msg_code_of_message_u8(&msg.inner)?;
            let mut body = vec![];
            Message0x01::marshal_body(msg.inner, &mut body)?;
            let length = OfpHeader::size() + body.len();
            if length > u16::MAX as usize {
                return Err(OfpSerializationError::InvalidLength { length });
            }
            let mut bytes = Vec::with_capacity(length);
            OfpHeader::marshal(
                &mut bytes,
                OfpHeader::new(OPENFLOW_0_01_VERSION, typ, length as u16, xid),
            );
            bytes.put_slice(&body);
            Ok(bytes)
        }

        fn parse(
            header: &OfpHeader,
            buf: &[u8],
        ) -> Result<(Xid, Message0x01), OfpSerializationError> {
            let typ = MsgCode::from_wire(OfpVersion::V1_0, header.raw_type()).ok_or_else(|| {
                OfpSerializationError::UnexpectedValueError {
                    value: format!("0x{:x}", header.raw_type()),
                    field: "message type".to_string(),
                    message: "message header".to_string(),
                }
            })?;
            let inner = match typ {
                MsgCode::Hello => Message::Hello(Hello::default()),
                MsgCode::Error => Message::Error(ErrorMsg::parse(buf)?),
                MsgCode::EchoReq => Message::EchoRequest(buf.to_vec()),
                MsgCode::EchoResp => Message::EchoReply(buf.to_vec()),
                MsgCode::FeaturesReq => Message::FeaturesReq,
                MsgCode::FeaturesResp => Message::FeaturesReply(SwitchFeatures::parse(buf)?),
                MsgCode::SetConfig => Message::SetConfig(SwitchConfig::parse(buf)?),
                MsgCode::PacketIn => Message::PacketIn(PacketIn::parse(buf)?),
                MsgCode::PortStatus => Message::PortStatus(PortStatus::parse(buf)?),
                MsgCode::FlowMod => Message::FlowMod(FlowMod::parse(buf)?),
                MsgCode::MultipartReq => Message::MultipartRequest(MultipartRequest::parse(buf)?),
                MsgCode::MultipartResp => Message::MultipartReply(MultipartReply::parse(buf)?),
                MsgCode::BarrierReq => Message::BarrierRequest,
                MsgCode::BarrierResp => Message::BarrierReply,
                code => Message::Other {
                    code,
                    body: buf.to_vec(),
                },
            };
            Ok((header.xid(), Message0x01 { inner }))
        }
    }

}
