use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::BufMut;
use serde::Serialize;

use crate::ofp_message::OfpSerializationError;
use crate::openflow::MsgCode;

pub const OFP_HEADER_LENGTH: usize = 8;

pub type Xid = u32;

pub const OPENFLOW_0_01_VERSION: u8 = 1; // 1.0
pub const OPENFLOW_0_04_VERSION: u8 = 4; // 1.3

/// Wire protocol versions this crate can speak.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OfpVersion {
    #[serde(rename = "1.0")]
    V1_0 = OPENFLOW_0_01_VERSION,
    #[serde(rename = "1.3")]
    V1_3 = OPENFLOW_0_04_VERSION,
}

impl OfpVersion {
    pub fn from_wire(version: u8) -> Option<OfpVersion> {
        match version {
            OPENFLOW_0_01_VERSION => Some(OfpVersion::V1_0),
            OPENFLOW_0_04_VERSION => Some(OfpVersion::V1_3),
            _ => None,
        }
    }

    pub fn wire(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OfpVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OfpVersion::V1_0 => f.write_str("1.0"),
            OfpVersion::V1_3 => f.write_str("1.3"),
        }
    }
}

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: Xid,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: Xid) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        OFP_HEADER_LENGTH
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) {
        bytes.put_u8(header.version);
        bytes.put_u8(header.typ);
        bytes.put_u16(header.length);
        bytes.put_u32(header.xid);
    }

    /// Takes a message buffer (at least sized for an `OfpHeader`) and returns an `OfpHeader`.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        OfpHeader::parse_from_cursor(&mut bytes)
    }

    pub fn parse_from_cursor(
        bytes: &mut Cursor<&[u8]>,
    ) -> Result<OfpHeader, OfpSerializationError> {
        Ok(OfpHeader {
            version: bytes.read_u8()?,
            typ: bytes.read_u8()?,
            length: bytes.read_u16::<BigEndian>()?,
            xid: bytes.read_u32::<BigEndian>()?,
        })
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the raw message type of a header.
    pub fn raw_type(&self) -> u8 {
        self.typ
    }

    /// Return the OpenFlow message type code of a header, interpreted with the header's own
    /// version. Hello is the only type shared by every version, so unknown versions still
    /// resolve it.
    pub fn type_code(&self) -> Result<MsgCode, OfpSerializationError> {
        let version = OfpVersion::from_wire(self.version).unwrap_or(OfpVersion::V1_3);
        MsgCode::from_wire(version, self.typ).ok_or_else(|| {
            OfpSerializationError::UnexpectedValueError {
                value: format!("0x{:x}", self.typ),
                field: "message type".to_string(),
                message: "message header".to_string(),
            }
        })
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    /// Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> Xid {
        self.xid
    }
}
