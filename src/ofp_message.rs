use std::io;

use thiserror::Error;

use crate::ofp_header::{OfpHeader, Xid};
use crate::openflow::MsgCode;

#[derive(Debug, Error)]
pub enum OfpSerializationError {
    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),
    #[error("Unexpected value '{value}' at field '{field}' of '{message}'")]
    UnexpectedValueError {
        value: String,
        field: String,
        message: String,
    },
    #[error("Invalid message length {length}")]
    InvalidLength { length: usize },
    #[error("Unsupported OpenFlow version: {version}")]
    UnsupportedVersion { version: u8 },
    #[error("Unsupported OpenFlow message code {code} for version: {version}")]
    UnsupportedMessageCode { version: u8, code: MsgCode },
    #[error("{feature} is not available in OpenFlow version {version}")]
    UnimplementedFeatureInVersion { version: u8, feature: String },
}

/// OpenFlow Message
///
/// Version-specific API for handling OpenFlow messages at the byte-buffer level.
pub trait OfpMessage: Sized {
    /// Return a marshaled buffer containing an OpenFlow header and the message `msg`.
    fn marshal(xid: Xid, msg: Self) -> Result<Vec<u8>, OfpSerializationError>;
    /// Returns a pair `(Xid, OfpMessage)` of the transaction id and OpenFlow message parsed from
    /// the given OpenFlow header `header`, and body buffer `buf`.
    fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(Xid, Self), OfpSerializationError>;
}
