use bytes::{Bytes, BytesMut};

use crate::message::{Hello, Message};
use crate::ofp_header::{OfpHeader, OfpVersion, Xid};
use crate::ofp_message::OfpSerializationError;
use crate::openflow::MsgCode;

/// Decode a message body with the codec of the header's version. Hellos of versions the
/// crate does not speak are still decoded so that negotiation can answer them.
pub fn parse(header: &OfpHeader, body: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
    match OfpVersion::from_wire(header.version()) {
        Some(OfpVersion::V1_0) => openflow0x01::parse(header, body),
        Some(OfpVersion::V1_3) => openflow0x04::parse(header, body),
        None => {
            if header.type_code()? == MsgCode::Hello {
                use crate::openflow0x04::MessageType;
                Ok((header.xid(), Message::Hello(Hello::parse(body)?)))
            } else {
                Err(OfpSerializationError::UnsupportedVersion {
                    version: header.version(),
                })
            }
        }
    }
}

pub fn marshal(
    version: OfpVersion,
    xid: Xid,
    message: Message,
) -> Result<Vec<u8>, OfpSerializationError> {
    match version {
        OfpVersion::V1_0 => openflow0x01::marshal(xid, message),
        OfpVersion::V1_3 => openflow0x04::marshal(xid, message),
    }
}

pub mod openflow0x01 {
    use super::*;
    use crate::ofp_message::OfpMessage;
    use crate::openflow0x01::message::Message0x01;

    pub fn marshal(xid: Xid, message: Message) -> Result<Vec<u8>, OfpSerializationError> {
        Message0x01::marshal(xid, Message0x01::from(message))
    }

    pub fn parse(header: &OfpHeader, body: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
        Message0x01::parse(header, body).map(|x| (x.0, x.1.message()))
    }
}

pub mod openflow0x04 {
    use super::*;
    use crate::ofp_message::OfpMessage;
    use crate::openflow0x04::message::Message0x04;

    pub fn marshal(xid: Xid, message: Message) -> Result<Vec<u8>, OfpSerializationError> {
        Message0x04::marshal(xid, Message0x04::from(message))
    }

    pub fn parse(header: &OfpHeader, body: &[u8]) -> Result<(Xid, Message), OfpSerializationError> {
        Message0x04::parse(header, body).map(|x| (x.0, x.1.message()))
    }
}

/// Reassembles whole OpenFlow messages out of arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct MessageSlicer {
    rd: BytesMut,
}

impl MessageSlicer {
    pub fn new() -> MessageSlicer {
        MessageSlicer {
            rd: BytesMut::new(),
        }
    }

    fn have_header(&self) -> bool {
        self.rd.len() >= OfpHeader::size()
    }

    fn have_full_message(&self) -> bool {
        self.have_header() && self.rd.len() >= self.get_header_length()
    }

    fn get_header_length(&self) -> usize {
        ((self.rd[2] as usize) << 8) + self.rd[3] as usize
    }

    /// Append `chunk` and return every message it completes, as header and body.
    /// A header announcing less than its own size leaves the stream unrecoverable.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<(OfpHeader, Bytes)>, OfpSerializationError> {
        self.rd.extend_from_slice(chunk);
        let mut frames = vec![];
        while self.have_header() {
            let length = self.get_header_length();
            if length < OfpHeader::size() {
                return Err(OfpSerializationError::InvalidLength { length });
            }
            if !self.have_full_message() {
                break;
            }
            let frame = self.rd.split_to(length).freeze();
            let header = OfpHeader::parse(&frame)?;
            frames.push((header, frame.slice(OfpHeader::size()..)));
        }
        Ok(frames)
    }

    /// Bytes held back waiting for the rest of a message.
    pub fn buffered(&self) -> usize {
        self.rd.len()
    }
}
