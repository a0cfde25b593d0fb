use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;

use crate::message::*;
use crate::ofp_header::OPENFLOW_0_04_VERSION;
use crate::ofp_message::OfpSerializationError;
use crate::ofp_utils::{
    padding_to_8, read_bytes, read_fixed_size_string, read_mac, read_remaining, remaining,
    skip_bytes, take_slice, test_bit, write_fixed_size_string, write_padding_bytes,
};

const OFP_MAX_PORT_NAME_LEN: usize = 16;
const DESC_STR_LENGTH: usize = 256;
const SERIAL_NUM_LENGTH: usize = 32;

const PORT_LENGTH: usize = 64;
const FLOW_STATS_HEADER_LENGTH: usize = 48;

const OFPHET_VERSIONBITMAP: u16 = 1;
const OFPMT_OXM: u16 = 1;

const OFPMP_DESC: u16 = 0;
const OFPMP_FLOW: u16 = 1;
const OFPMP_PORT_DESC: u16 = 13;

const OFPP_ANY: u32 = 0xffff_ffff;
const OFPG_ANY: u32 = 0xffff_ffff;
const NO_BUFFER: u32 = 0xffff_ffff;

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
        version: OPENFLOW_0_04_VERSION,
        feature: feature.to_string(),
    }
}

/// Hello elements are understood by every version that sends them, so the version
/// negotiation reads them through here regardless of the header version.
impl MessageType for Hello {
    fn parse(buf: &[u8]) -> Result<Hello, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut versions = vec![];
        while remaining(&bytes) >= 4 {
            let element_type = bytes.read_u16::<BigEndian>()?;
            let length = bytes.read_u16::<BigEndian>()? as usize;
            if length < 4 {
                return Err(OfpSerializationError::InvalidLength { length });
            }
            let body = take_slice(&mut bytes, length - 4)?;
            if element_type == OFPHET_VERSIONBITMAP {
                let mut words = Cursor::new(body);
                let mut index = 0u32;
                while remaining(&words) >= 4 {
                    let bitmap = words.read_u32::<BigEndian>()?;
                    for bit in 0..32 {
                        let version = index * 32 + bit;
                        if version <= u8::MAX as u32 && test_bit(bit, bitmap as u64) {
                            versions.push(version as u8);
                        }
                    }
                    index += 1;
                }
            }
            let pad = padding_to_8(length).min(remaining(&bytes));
            skip_bytes(&mut bytes, pad)?;
        }
        Ok(Hello { versions })
    }

    fn marshal(hello: Hello, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let highest = match hello.highest_bitmap_version() {
            Some(v) => v as usize,
            None => return Ok(()),
        };
        let mut bitmaps = vec![0u32; highest / 32 + 1];
        for v in hello.versions {
            bitmaps[v as usize / 32] |= 1 << (v as u32 % 32);
        }
        let length = 4 + 4 * bitmaps.len();
        bytes.put_u16(OFPHET_VERSIONBITMAP);
        bytes.put_u16(length as u16);
        for bitmap in bitmaps {
            bytes.put_u32(bitmap);
        }
        write_padding_bytes(bytes, padding_to_8(length));
        Ok(())
    }
}

create_empty_wrapper!(OxmField, OxmField0x04);

impl OxmField0x04 {
    fn size_of(f: &OxmField) -> usize {
        4 + f.value.len() + f.mask.as_ref().map_or(0, |m| m.len())
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<OxmField, OfpSerializationError> {
        let header = bytes.read_u32::<BigEndian>()?;
        let class = (header >> 16) as u16;
        let field = ((header >> 9) & 0x7f) as u8;
        let has_mask = test_bit(8, header as u64);
        let len = (header & 0xff) as usize;
        if has_mask {
            if len % 2 != 0 {
                return Err(OfpSerializationError::InvalidLength { length: len });
            }
            let value = read_bytes(bytes, len / 2)?;
            let mask = read_bytes(bytes, len / 2)?;
            Ok(OxmField {
                class,
                field,
                value,
                mask: Some(mask),
            })
        } else {
            Ok(OxmField {
                class,
                field,
                value: read_bytes(bytes, len)?,
                mask: None,
            })
        }
    }

    fn marshal(f: &OxmField, bytes: &mut Vec<u8>) {
        let has_mask = f.mask.is_some() as u32;
        let len = OxmField0x04::size_of(f) - 4;
        bytes.put_u32(
            (f.class as u32) << 16 | (f.field as u32 & 0x7f) << 9 | has_mask << 8 | len as u32,
        );
        bytes.put_slice(&f.value);
        if let Some(mask) = &f.mask {
            bytes.put_slice(mask);
        }
    }
}

create_empty_wrapper!(FlowMatch, Match0x04);

impl Match0x04 {
    fn size_of(fields: &[OxmField]) -> usize {
        let len = 4 + fields.iter().map(OxmField0x04::size_of).sum::<usize>();
        len + padding_to_8(len)
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Vec<OxmField>, OfpSerializationError> {
        let match_type = bytes.read_u16::<BigEndian>()?;
        if match_type != OFPMT_OXM {
            return Err(OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", match_type),
                field: "type".to_string(),
                message: "match".to_string(),
            });
        }
        let length = bytes.read_u16::<BigEndian>()? as usize;
        if length < 4 {
            return Err(OfpSerializationError::InvalidLength { length });
        }
        let mut oxm = Cursor::new(take_slice(bytes, length - 4)?);
        let mut fields = vec![];
        while remaining(&oxm) > 0 {
            fields.push(OxmField0x04::parse(&mut oxm)?);
        }
        skip_bytes(bytes, padding_to_8(length))?;
        Ok(fields)
    }

    fn marshal(fields: &[OxmField], bytes: &mut Vec<u8>) {
        let length = 4 + fields.iter().map(OxmField0x04::size_of).sum::<usize>();
        bytes.put_u16(OFPMT_OXM);
        bytes.put_u16(length as u16);
        for f in fields {
            OxmField0x04::marshal(f, bytes);
        }
        write_padding_bytes(bytes, padding_to_8(length));
    }

    fn of_flow_match(m: &FlowMatch) -> Result<&[OxmField], OfpSerializationError> {
        match m {
            FlowMatch::V0x04(fields) => Ok(fields),
            FlowMatch::V0x01(_) => Err(unavailable("OpenFlow 1.0 fixed match")),
        }
    }
}

const OFPAT_OUTPUT: u16 = 0;
const OFPAT_PUSH_VLAN: u16 = 17;
const OFPAT_POP_VLAN: u16 = 18;
const OFPAT_SET_FIELD: u16 = 25;

create_empty_wrapper!(Action, Action0x04);

impl Action0x04 {
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
                port: body_bytes.read_u32::<BigEndian>()?,
                max_len: body_bytes.read_u16::<BigEndian>()?,
            },
            OFPAT_PUSH_VLAN => Action::PushVlan(body_bytes.read_u16::<BigEndian>()?),
            OFPAT_POP_VLAN => Action::PopVlan,
            OFPAT_SET_FIELD => Action::SetField(OxmField0x04::parse(&mut body_bytes)?),
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
            actions.push(Action0x04::parse(bytes)?);
        }
        Ok(actions)
    }

    fn marshal(act: &Action, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match act {
            Action::Output { port, max_len } => {
                bytes.put_u16(OFPAT_OUTPUT);
                bytes.put_u16(16);
                bytes.put_u32(*port);
                bytes.put_u16(*max_len);
                write_padding_bytes(bytes, 6);
            }
            Action::PushVlan(ethertype) => {
                bytes.put_u16(OFPAT_PUSH_VLAN);
                bytes.put_u16(8);
                bytes.put_u16(*ethertype);
                write_padding_bytes(bytes, 2);
            }
            Action::PopVlan => {
                bytes.put_u16(OFPAT_POP_VLAN);
                bytes.put_u16(8);
                write_padding_bytes(bytes, 4);
            }
            Action::SetField(field) => {
                let len = 4 + OxmField0x04::size_of(field);
                bytes.put_u16(OFPAT_SET_FIELD);
                bytes.put_u16((len + padding_to_8(len)) as u16);
                OxmField0x04::marshal(field, bytes);
                write_padding_bytes(bytes, padding_to_8(len));
            }
            Action::Other { action_type, body } => {
                bytes.put_u16(*action_type);
                bytes.put_u16((4 + body.len()) as u16);
                bytes.put_slice(body);
            }
            Action::SetVlanVid(_) => return Err(unavailable("Action SetVlanVid")),
        }
        Ok(())
    }
}

const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_WRITE_ACTIONS: u16 = 3;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPIT_CLEAR_ACTIONS: u16 = 5;

create_empty_wrapper!(Instruction, Instruction0x04);

impl Instruction0x04 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Instruction, OfpSerializationError> {
        let instruction_type = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < 8 {
            return Err(OfpSerializationError::InvalidLength { length: len });
        }
        let body = take_slice(bytes, len - 4)?;
        let mut body_bytes = Cursor::new(body);
        let instruction = match instruction_type {
            OFPIT_GOTO_TABLE => Instruction::GotoTable(body_bytes.read_u8()?),
            OFPIT_WRITE_ACTIONS | OFPIT_APPLY_ACTIONS => {
                skip_bytes(&mut body_bytes, 4)?;
                let actions = Action0x04::parse_sequence(&mut body_bytes)?;
                if instruction_type == OFPIT_WRITE_ACTIONS {
                    Instruction::WriteActions(actions)
                } else {
                    Instruction::ApplyActions(actions)
                }
            }
            OFPIT_CLEAR_ACTIONS => Instruction::ClearActions,
            _ => Instruction::Other {
                instruction_type,
                body: body.to_vec(),
            },
        };
        Ok(instruction)
    }

    fn marshal(ins: &Instruction, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        match ins {
            Instruction::GotoTable(table_id) => {
                bytes.put_u16(OFPIT_GOTO_TABLE);
                bytes.put_u16(8);
                bytes.put_u8(*table_id);
                write_padding_bytes(bytes, 3);
            }
            Instruction::WriteActions(actions) | Instruction::ApplyActions(actions) => {
                let mut body = vec![];
                for act in actions {
                    Action0x04::marshal(act, &mut body)?;
                }
                let typ = match ins {
                    Instruction::WriteActions(_) => OFPIT_WRITE_ACTIONS,
                    _ => OFPIT_APPLY_ACTIONS,
                };
                bytes.put_u16(typ);
                bytes.put_u16((8 + body.len()) as u16);
                write_padding_bytes(bytes, 4);
                bytes.put_slice(&body);
            }
            Instruction::ClearActions => {
                bytes.put_u16(OFPIT_CLEAR_ACTIONS);
                bytes.put_u16(8);
                write_padding_bytes(bytes, 4);
            }
            Instruction::Other {
                instruction_type,
                body,
            } => {
                bytes.put_u16(*instruction_type);
                bytes.put_u16((4 + body.len()) as u16);
                bytes.put_slice(body);
            }
        }
        Ok(())
    }
}

create_empty_wrapper!(PortDesc, PortDesc0x04);

impl PortDesc0x04 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<PortDesc, OfpSerializationError> {
        let port_no = bytes.read_u32::<BigEndian>()?;
        skip_bytes(bytes, 4)?;
        let hw_addr = read_mac(bytes)?;
        skip_bytes(bytes, 2)?;
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
            curr_speed: Some(bytes.read_u32::<BigEndian>()?),
            max_speed: Some(bytes.read_u32::<BigEndian>()?),
        })
    }

    fn parse_sequence(bytes: &mut Cursor<&[u8]>) -> Result<Vec<PortDesc>, OfpSerializationError> {
        let rem = remaining(bytes);
        if rem % PORT_LENGTH != 0 {
            return Err(OfpSerializationError::InvalidLength { length: rem });
        }
        (0..rem / PORT_LENGTH)
            .map(|_| PortDesc0x04::parse(bytes))
            .collect()
    }

    fn marshal(pd: &PortDesc, bytes: &mut Vec<u8>) {
        bytes.put_u32(pd.port_no);
        write_padding_bytes(bytes, 4);
        bytes.put_slice(&pd.hw_addr.octets());
        write_padding_bytes(bytes, 2);
        write_fixed_size_string(bytes, &pd.name, OFP_MAX_PORT_NAME_LEN);
        bytes.put_u32(pd.config.0);
        bytes.put_u32(pd.state.0);
        bytes.put_u32(pd.curr.0);
        bytes.put_u32(pd.advertised.0);
        bytes.put_u32(pd.supported.0);
        bytes.put_u32(pd.peer.0);
        bytes.put_u32(pd.curr_speed.unwrap_or(0));
        bytes.put_u32(pd.max_speed.unwrap_or(0));
    }
}

impl MessageType for SwitchFeatures {
    fn parse(buf: &[u8]) -> Result<SwitchFeatures, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        let auxiliary_id = bytes.read_u8()?;
        skip_bytes(&mut bytes, 2)?;
        let capabilities = bytes.read_u32::<BigEndian>()?;
        let _reserved = bytes.read_u32::<BigEndian>()?;
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            auxiliary_id,
            capabilities,
            actions: None,
            ports: None,
        })
    }

    fn marshal(sf: SwitchFeatures, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        if sf.ports.as_ref().map_or(false, |p| !p.is_empty()) {
            return Err(unavailable("Ports in features reply"));
        }
        bytes.put_u64(sf.datapath_id);
        bytes.put_u32(sf.num_buffers);
        bytes.put_u8(sf.num_tables);
        bytes.put_u8(sf.auxiliary_id);
        write_padding_bytes(bytes, 2);
        bytes.put_u32(sf.capabilities);
        bytes.put_u32(0);
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

impl MessageType for PacketIn {
    fn parse(buf: &[u8]) -> Result<PacketIn, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let buf_id = bytes.read_u32::<BigEndian>()?;
        let total_len = bytes.read_u16::<BigEndian>()?;
        let reason = bytes.read_u8()?;
        let table_id = bytes.read_u8()?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let mut fields = Match0x04::parse(&mut bytes)?;
        skip_bytes(&mut bytes, 2)?;

        let in_port_pos = fields
            .iter()
            .position(|f| f.is_basic(OXM_OF_IN_PORT) && f.value.len() == 4)
            .ok_or_else(|| OfpSerializationError::UnexpectedValueError {
                value: "none".to_string(),
                field: "in_port".to_string(),
                message: "packet in match".to_string(),
            })?;
        let in_port_field = fields.remove(in_port_pos);
        let in_port = Cursor::new(&in_port_field.value[..]).read_u32::<BigEndian>()?;

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
            table_id,
            cookie,
            fields,
        })
    }

    fn marshal(pi: PacketIn, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let buf_id = match pi.input_payload {
            Payload::NotBuffered(_) => NO_BUFFER,
            Payload::Buffered(n, _) => n,
        };
        bytes.put_u32(buf_id);
        bytes.put_u16(pi.total_len);
        bytes.put_u8(pi.reason);
        bytes.put_u8(pi.table_id);
        bytes.put_u64(pi.cookie);
        let mut fields = vec![OxmField::in_port(pi.in_port)];
        fields.extend(pi.fields);
        Match0x04::marshal(&fields, bytes);
        write_padding_bytes(bytes, 2);
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
        let desc = PortDesc0x04::parse(&mut bytes)?;
        Ok(PortStatus { reason, desc })
    }

    fn marshal(ps: PortStatus, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.put_u8(ps.reason as u8);
        write_padding_bytes(bytes, 7);
        PortDesc0x04::marshal(&ps.desc, bytes);
        Ok(())
    }
}

impl MessageType for FlowMod {
    fn parse(buf: &[u8]) -> Result<FlowMod, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let cookie_mask = bytes.read_u64::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        let raw_command = bytes.read_u8()?;
        let command = FlowModCommand::of_int(raw_command as u16).ok_or_else(|| {
            OfpSerializationError::UnexpectedValueError {
                value: format!("{:x}", raw_command),
                field: "command".to_string(),
                message: "flow mod".to_string(),
            }
        })?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let out_port = bytes.read_u32::<BigEndian>()?;
        let _out_group = bytes.read_u32::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        skip_bytes(&mut bytes, 2)?;
        let pattern = Match0x04::parse(&mut bytes)?;
        let mut instructions = vec![];
        while remaining(&bytes) > 0 {
            instructions.push(Instruction0x04::parse(&mut bytes)?);
        }
        Ok(FlowMod {
            command,
            table_id,
            pattern: FlowMatch::V0x04(pattern),
            cookie,
            cookie_mask,
            idle_timeout,
            hard_timeout,
            priority,
            buffer_id: Some(buffer_id).filter(|id| *id != NO_BUFFER),
            out_port: Some(out_port).filter(|p| *p != OFPP_ANY),
            flags,
            instructions,
        })
    }

    fn marshal(fm: FlowMod, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let fields = Match0x04::of_flow_match(&fm.pattern)?;
        bytes.put_u64(fm.cookie);
        bytes.put_u64(fm.cookie_mask);
        bytes.put_u8(fm.table_id);
        bytes.put_u8(fm.command as u8);
        bytes.put_u16(fm.idle_timeout);
        bytes.put_u16(fm.hard_timeout);
        bytes.put_u16(fm.priority);
        bytes.put_u32(fm.buffer_id.unwrap_or(NO_BUFFER));
        bytes.put_u32(fm.out_port.unwrap_or(OFPP_ANY));
        bytes.put_u32(OFPG_ANY);
        bytes.put_u16(fm.flags);
        write_padding_bytes(bytes, 2);
        Match0x04::marshal(fields, bytes);
        for ins in &fm.instructions {
            Instruction0x04::marshal(ins, bytes)?;
        }
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
        skip_bytes(&mut bytes, 4)?;
        let body = match req_type {
            OFPMP_DESC => MultipartRequestBody::Desc,
            OFPMP_PORT_DESC => MultipartRequestBody::PortDesc,
            OFPMP_FLOW => {
                let table_id = bytes.read_u8()?;
                skip_bytes(&mut bytes, 3)?;
                let out_port = bytes.read_u32::<BigEndian>()?;
                MultipartRequestBody::Flow {
                    table_id,
                    out_port: Some(out_port).filter(|p| *p != OFPP_ANY),
                }
            }
            t => {
                return Err(OfpSerializationError::UnexpectedValueError {
                    value: format!("{:x}", t),
                    field: "type".to_string(),
                    message: "multipart request".to_string(),
                })
            }
        };
        Ok(MultipartRequest { flags, body })
    }

    fn marshal(mr: MultipartRequest, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let req_type = match mr.body {
            MultipartRequestBody::Desc => OFPMP_DESC,
            MultipartRequestBody::Flow { .. } => OFPMP_FLOW,
            MultipartRequestBody::PortDesc => OFPMP_PORT_DESC,
        };
        bytes.put_u16(req_type);
        bytes.put_u16(mr.flags);
        write_padding_bytes(bytes, 4);
        if let MultipartRequestBody::Flow { table_id, out_port } = mr.body {
            bytes.put_u8(table_id);
            write_padding_bytes(bytes, 3);
            bytes.put_u32(out_port.unwrap_or(OFPP_ANY));
            bytes.put_u32(OFPG_ANY);
            write_padding_bytes(bytes, 4);
            bytes.put_u64(0); // cookie
            bytes.put_u64(0); // cookie mask
            Match0x04::marshal(&[], bytes);
        }
        Ok(())
    }
}

create_empty_wrapper!(FlowStats, FlowStats0x04);

impl FlowStats0x04 {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStats, OfpSerializationError> {
        let length = bytes.read_u16::<BigEndian>()? as usize;
        if length < FLOW_STATS_HEADER_LENGTH {
            return Err(OfpSerializationError::InvalidLength { length });
        }
        let mut bytes = Cursor::new(take_slice(bytes, length - 2)?);
        let table_id = bytes.read_u8()?;
        skip_bytes(&mut bytes, 1)?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        skip_bytes(&mut bytes, 4)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let pattern = Match0x04::parse(&mut bytes)?;
        let mut instructions = vec![];
        while remaining(&bytes) > 0 {
            instructions.push(Instruction0x04::parse(&mut bytes)?);
        }
        Ok(FlowStats {
            table_id,
            pattern: FlowMatch::V0x04(pattern),
            duration_sec,
            duration_nsec,
            priority,
            idle_timeout,
            hard_timeout,
            flags,
            cookie,
            packet_count,
            byte_count,
            instructions,
        })
    }

    fn marshal(fs: &FlowStats, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let fields = Match0x04::of_flow_match(&fs.pattern)?;
        let mut instructions = vec![];
        for ins in &fs.instructions {
            Instruction0x04::marshal(ins, &mut instructions)?;
        }
        let length = FLOW_STATS_HEADER_LENGTH + Match0x04::size_of(fields) + instructions.len();
        bytes.put_u16(length as u16);
        bytes.put_u8(fs.table_id);
        write_padding_bytes(bytes, 1);
        bytes.put_u32(fs.duration_sec);
        bytes.put_u32(fs.duration_nsec);
        bytes.put_u16(fs.priority);
        bytes.put_u16(fs.idle_timeout);
        bytes.put_u16(fs.hard_timeout);
        bytes.put_u16(fs.flags);
        write_padding_bytes(bytes, 4);
        bytes.put_u64(fs.cookie);
        bytes.put_u64(fs.packet_count);
        bytes.put_u64(fs.byte_count);
        Match0x04::marshal(fields, bytes);
        bytes.put_slice(&instructions);
        Ok(())
    }
}

create_empty_wrapper!(SwitchDescription, SwitchDescription0x04);

impl SwitchDescription0x04 {
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
        skip_bytes(&mut bytes, 4)?;
        let body = match reply_type {
            OFPMP_DESC => MultipartReplyBody::Desc(SwitchDescription0x04::parse(&mut bytes)?),
            OFPMP_FLOW => {
                let mut flow_stats = vec![];
                while remaining(&bytes) > 0 {
                    flow_stats.push(FlowStats0x04::parse(&mut bytes)?);
                }
                MultipartReplyBody::Flow(flow_stats)
            }
            OFPMP_PORT_DESC => {
                MultipartReplyBody::PortDesc(PortDesc0x04::parse_sequence(&mut bytes)?)
            }
            _ => MultipartReplyBody::Other {
                reply_type,
                body: read_remaining(&mut bytes),
            },
        };
        Ok(MultipartReply { flags, body })
    }

    fn marshal(mr: MultipartReply, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let reply_type = match &mr.body {
            MultipartReplyBody::Desc(_) => OFPMP_DESC,
            MultipartReplyBody::Flow(_) => OFPMP_FLOW,
            MultipartReplyBody::PortDesc(_) => OFPMP_PORT_DESC,
            MultipartReplyBody::Other { reply_type, .. } => *reply_type,
        };
        bytes.put_u16(reply_type);
        bytes.put_u16(mr.flags);
        write_padding_bytes(bytes, 4);
        match mr.body {
            MultipartReplyBody::Desc(desc) => SwitchDescription0x04::marshal(&desc, bytes),
            MultipartReplyBody::Flow(flow_stats) => {
                for fs in &flow_stats {
                    FlowStats0x04::marshal(fs, bytes)?;
                }
            }
            MultipartReplyBody::PortDesc(ports) => {
                for port in &ports {
                    PortDesc0x04::marshal(port, bytes);
                }
            }
            MultipartReplyBody::Other { body, .. } => bytes.put_slice(&body),
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

    pub struct Message0x04 {
        inner: Message,
    }

    impl From<Message> for Message0x04 {
        fn from(m: Message) -> Self {
            Message0x04 { inner: m }
        }
    }

    impl Message0x04 {
        pub fn message(self) -> Message {
            self.inner
        }

        fn msg_code_of_message_u8(msg: &Message) -> Result<u8, OfpSerializationError> {
            let code = msg.code();
            code.to_wire(OfpVersion::V1_3)
                .ok_or(OfpSerializationError::UnsupportedMessageCode {
                    version: OPENFLOW_0_04_VERSION,
                    code,
                })
        }

        fn marshal_body(msg: Message, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
            match msg {
                Message::Hello(hello) => Hello::marshal(hello, bytes),
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

    impl OfpMessage for Message0x04 {
        fn marshal(xid: Xid, msg: Message0x04) -> Result<Vec<u8>, OfpSerializationError> {
            let typ = Self::msg_code_of_message_u8(&msg.inner)?;
            let mut body = vec![];
            Message0x04::marshal_body(msg.inner, &mut body)?;
            let length = OfpHeader::size() + body.len();
            if length > u16::MAX as usize {
                return Err(OfpSerializationError::InvalidLength { length });
            }
            let mut bytes = Vec::with_capacity(length);
            OfpHeader::marshal(
                &mut bytes,
                OfpHeader::new(OPENFLOW_0_04_VERSION, typ, length as u16, xid),
            );
            bytes.put_slice(&body);
            Ok(bytes)
        }

        fn parse(
            header: &OfpHeader,
            buf: &[u8],
        ) -> Result<(Xid, Message0x04), OfpSerializationError> {
            let typ = MsgCode::from_wire(OfpVersion::V1_3, header.raw_type()).ok_or_else(|| {
                OfpSerializationError::UnexpectedValueError {
                    value: format!("0x{:x}", header.raw_type()),
                    field: "message type".to_string(),
                    message: "message header".to_string(),
                }
            })?;
            let inner = match typ {
                MsgCode::Hello => Message::Hello(Hello::parse(buf)?),
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
            Ok((header.xid(), Message0x04 { inner }))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::packet::MacAddr;

        const TEST_XID: u32 = 0x12345678;
        const TEST_DPID: u64 = 0x0011223344556677;

        fn parse(data: Vec<u8>) -> (OfpHeader, Message) {
            let (header, tail) = data.split_at(OfpHeader::size());
            let ofp_header = OfpHeader::parse(header).unwrap();
            let (payload, _) = tail.split_at(ofp_header.length() - OfpHeader::size());
            let (_xid, ofp_message) = Message0x04::parse(&ofp_header, payload).unwrap();
            (ofp_header, ofp_message.inner)
        }

        fn marshal(msg: Message) -> Vec<u8> {
            Message0x04::marshal(TEST_XID, Message0x04::from(msg)).unwrap()
        }

        fn port_desc(port_no: u32) -> PortDesc {
            PortDesc {
                port_no,
                hw_addr: MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, port_no as u8]),
                name: format!("eth{}", port_no),
                config: PortConfig(0),
                state: PortState(PortState::LINK_DOWN),
                curr: PortFeatures(0x820),
                advertised: PortFeatures(0),
                supported: PortFeatures(0),
                peer: PortFeatures(0),
                curr_speed: Some(10_000_000),
                max_speed: Some(10_000_000),
            }
        }

        #[test]
        fn test_marshal_hello_with_bitmap() {
            let data = marshal(Message::Hello(Hello {
                versions: vec![1, 4],
            }));
            assert_eq!(
                data,
                vec![
                    0x04, 0x00, 0x00, 0x10, 0x12, 0x34, 0x56, 0x78, 0x00, 0x01, 0x00, 0x08, 0x00,
                    0x00, 0x00, 0x12
                ]
            );
        }

        #[test]
        fn test_parse_hello_bitmap() {
            let data = vec![
                0x04, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x08, 0x00,
                0x00, 0x00, 0x7e,
            ];
            let (_, message) = parse(data);
            assert_eq!(
                message,
                Message::Hello(Hello {
                    versions: vec![1, 2, 3, 4, 5, 6]
                })
            );
        }

        #[test]
        fn test_plain_hello_has_no_versions() {
            let (_, message) = parse(vec![0x04, 0x00, 0x00, 0x08, 0, 0, 0, 1]);
            assert_eq!(message, Message::Hello(Hello::default()));
        }

        #[test]
        fn test_parse_features_reply() {
            let mut data = vec![0x04, 0x06, 0x00, 0x20, 0x12, 0x34, 0x56, 0x78];
            data.extend_from_slice(&TEST_DPID.to_be_bytes());
            data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00]); // n_buffers
            data.extend_from_slice(&[0xfe, 0x00, 0x00, 0x00]); // n_tables, aux id, pad
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x4f]); // capabilities
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // reserved

            let (header, message) = parse(data);
            assert_eq!(header.xid(), TEST_XID);
            match message {
                Message::FeaturesReply(feats) => {
                    assert_eq!(feats.datapath_id, TEST_DPID);
                    assert_eq!(feats.num_tables, 254);
                    assert_eq!(feats.capabilities, 0x4f);
                    assert_eq!(feats.ports, None);
                    assert_eq!(feats.actions, None);
                }
                m => panic!("Should be a features reply, got {:?}", m),
            }
        }

        #[test]
        fn test_port_desc_reply() {
            let reply = MultipartReply {
                flags: 0,
                body: MultipartReplyBody::PortDesc(vec![port_desc(1), port_desc(2)]),
            };
            let data = marshal(Message::MultipartReply(reply.clone()));
            assert_eq!(data.len(), 8 + 8 + 2 * 64);
            assert_eq!(data[1], 19);
            let (_, message) = parse(data);
            assert_eq!(message, Message::MultipartReply(reply));
        }

        #[test]
        fn test_port_desc_request_layout() {
            let data = marshal(Message::MultipartRequest(MultipartRequest {
                flags: 0,
                body: MultipartRequestBody::PortDesc,
            }));
            assert_eq!(
                data,
                vec![0x04, 0x12, 0x00, 0x10, 0x12, 0x34, 0x56, 0x78, 0x00, 0x0d, 0, 0, 0, 0, 0, 0]
            );
        }

        #[test]
        fn test_flow_stats_request_layout() {
            let data = marshal(Message::MultipartRequest(MultipartRequest {
                flags: 0,
                body: MultipartRequestBody::Flow {
                    table_id: ALL_TABLES,
                    out_port: None,
                },
            }));
            assert_eq!(data.len(), 8 + 8 + 32 + 8);
            assert_eq!(data[16], 0xff);
            assert_eq!(&data[20..28], &[0xff; 8]);
            assert_eq!(&data[48..52], &[0x00, 0x01, 0x00, 0x04]);
        }

        #[test]
        fn test_flow_mod_layout() {
            let fm = FlowMod {
                command: FlowModCommand::Add,
                table_id: 2,
                pattern: FlowMatch::V0x04(vec![OxmField::in_port(1)]),
                cookie: 0xabcd,
                cookie_mask: 0,
                idle_timeout: 30,
                hard_timeout: 0,
                priority: 10,
                buffer_id: None,
                out_port: None,
                flags: 0,
                instructions: vec![Instruction::ApplyActions(vec![Action::Output {
                    port: 2,
                    max_len: 0xffe5,
                }])],
            };
            let data = marshal(Message::FlowMod(fm.clone()));
            assert_eq!(data[1], 14);
            assert_eq!(data.len(), 8 + 40 + 16 + 24);
            assert_eq!(&data[8..16], &0xabcdu64.to_be_bytes());
            assert_eq!(&data[24..26], &[0x02, 0x00]); // table, add
            assert_eq!(&data[30..32], &[0x00, 10]);
            assert_eq!(&data[32..44], &[0xff; 12]); // no buffer, any port, any group
            assert_eq!(&data[48..52], &[0x00, 0x01, 0x00, 0x0c]);
            assert_eq!(&data[64..66], &[0x00, 0x04]); // apply actions

            let (_, message) = parse(data);
            assert_eq!(message, Message::FlowMod(fm));
        }

        #[test]
        fn test_flow_stats_reply_preserves_entries() {
            let entry = FlowStats {
                table_id: 0,
                pattern: FlowMatch::V0x04(vec![
                    OxmField::in_port(1),
                    OxmField {
                        class: OXM_CLASS_OPENFLOW_BASIC,
                        field: OXM_OF_ETH_DST,
                        value: vec![0x01, 0, 0, 0, 0, 0],
                        mask: Some(vec![0x01, 0, 0, 0, 0, 0]),
                    },
                ]),
                duration_sec: 3,
                duration_nsec: 0,
                priority: 10,
                idle_timeout: 0,
                hard_timeout: 0,
                flags: 1,
                cookie: 0xabcd,
                packet_count: 7,
                byte_count: 700,
                instructions: vec![
                    Instruction::ApplyActions(vec![
                        Action::PushVlan(0x8100),
                        Action::SetField(OxmField::basic(OXM_OF_VLAN_VID, vec![0x10, 0x0a])),
                        Action::Output {
                            port: 2,
                            max_len: 0xffe5,
                        },
                    ]),
                    Instruction::GotoTable(1),
                ],
            };
            let reply = MultipartReply {
                flags: MULTIPART_REPLY_MORE,
                body: MultipartReplyBody::Flow(vec![entry]),
            };
            let data = marshal(Message::MultipartReply(reply.clone()));
            let (_, message) = parse(data);
            match &message {
                Message::MultipartReply(r) => assert!(r.more()),
                m => panic!("Should be a multipart reply, got {:?}", m),
            }
            assert_eq!(message, Message::MultipartReply(reply));
        }

        #[test]
        fn test_parse_packet_in() {
            let pi = PacketIn {
                input_payload: Payload::Buffered(0x100, vec![0xff; 14]),
                total_len: 64,
                in_port: 7,
                reason: 0,
                table_id: 0,
                cookie: 0,
                fields: vec![],
            };
            let data = marshal(Message::PacketIn(pi.clone()));
            // 16 fixed + 16 match (8 header and field, 4 padding) + 2 pad + 14 payload
            assert_eq!(data.len(), 8 + 16 + 16 + 2 + 14);
            let (_, message) = parse(data);
            assert_eq!(message, Message::PacketIn(pi));
        }

        #[test]
        fn test_packet_in_without_in_port_is_rejected() {
            let mut data = vec![0x04, 0x0a, 0x00, 0x22, 0, 0, 0, 1];
            data.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);
            data.extend_from_slice(&[0u8; 8]); // cookie
            data.extend_from_slice(&[0x00, 0x01, 0x00, 0x04, 0, 0, 0, 0]); // empty match
            data.extend_from_slice(&[0, 0]);
            let header = OfpHeader::parse(&data).unwrap();
            assert!(Message0x04::parse(&header, &data[8..]).is_err());
        }

        #[test]
        fn test_port_status() {
            let status = PortStatus {
                reason: PortReason::PortModify,
                desc: port_desc(3),
            };
            let data = marshal(Message::PortStatus(status.clone()));
            assert_eq!(data.len(), 8 + 8 + 64);
            let (_, message) = parse(data);
            assert_eq!(message, Message::PortStatus(status));
        }

        #[test]
        fn test_set_vlan_vid_is_unavailable() {
            let mut bytes = vec![];
            assert!(Action0x04::marshal(&Action::SetVlanVid(3), &mut bytes).is_err());
        }
    }
}
