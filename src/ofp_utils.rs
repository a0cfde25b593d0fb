use std::io::{self, Cursor, Read};

use bytes::BufMut;

use crate::ofp_message::OfpSerializationError;
use crate::packet::MacAddr;

macro_rules! create_empty_wrapper {
    ($wrapped_name:ident, $wrapper_name:ident) => {
        struct $wrapper_name;
    };
}

pub fn test_bit(bit: u32, value: u64) -> bool {
    (value >> bit) & 1 == 1
}

pub fn write_padding_bytes(bytes: &mut Vec<u8>, count: usize) {
    bytes.put_bytes(0, count);
}

/// Number of padding bytes needed to align `len` to 8 bytes.
pub fn padding_to_8(len: usize) -> usize {
    (8 - len % 8) % 8
}

pub fn remaining(bytes: &Cursor<&[u8]>) -> usize {
    bytes.get_ref().len().saturating_sub(bytes.position() as usize)
}

pub fn skip_bytes(bytes: &mut Cursor<&[u8]>, count: usize) -> Result<(), OfpSerializationError> {
    if remaining(bytes) < count {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    bytes.set_position(bytes.position() + count as u64);
    Ok(())
}

pub fn read_bytes(
    bytes: &mut Cursor<&[u8]>,
    count: usize,
) -> Result<Vec<u8>, OfpSerializationError> {
    let mut buf = vec![0; count];
    bytes.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_remaining(bytes: &mut Cursor<&[u8]>) -> Vec<u8> {
    let pos = (bytes.position() as usize).min(bytes.get_ref().len());
    let rest = bytes.get_ref()[pos..].to_vec();
    bytes.set_position(bytes.get_ref().len() as u64);
    rest
}

/// Sub-cursor over the next `count` bytes, advancing the outer cursor past them.
pub fn take_slice<'a>(
    bytes: &mut Cursor<&'a [u8]>,
    count: usize,
) -> Result<&'a [u8], OfpSerializationError> {
    if remaining(bytes) < count {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    let buf: &'a [u8] = *bytes.get_ref();
    let pos = bytes.position() as usize;
    bytes.set_position((pos + count) as u64);
    Ok(&buf[pos..pos + count])
}

pub fn read_fixed_size_string(
    bytes: &mut Cursor<&[u8]>,
    max_capacity: usize,
) -> Result<String, OfpSerializationError> {
    let raw = read_bytes(bytes, max_capacity)?;
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

/// Writes `value` NUL-padded into exactly `capacity` bytes, truncating so that a
/// terminating NUL always fits.
pub fn write_fixed_size_string(bytes: &mut Vec<u8>, value: &str, capacity: usize) {
    let raw = value.as_bytes();
    let len = raw.len().min(capacity.saturating_sub(1));
    bytes.put_slice(&raw[..len]);
    write_padding_bytes(bytes, capacity - len);
}

pub fn read_mac(bytes: &mut Cursor<&[u8]>) -> Result<MacAddr, OfpSerializationError> {
    let mut arr = [0u8; 6];
    bytes.read_exact(&mut arr)?;
    Ok(MacAddr::new(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size_string() {
        let mut bytes = vec![];
        write_fixed_size_string(&mut bytes, "eth0", 16);
        assert_eq!(bytes.len(), 16);

        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(read_fixed_size_string(&mut cursor, 16).unwrap(), "eth0");
        assert_eq!(remaining(&cursor), 0);
    }

    #[test]
    fn test_long_string_is_truncated() {
        let mut bytes = vec![];
        write_fixed_size_string(&mut bytes, "a-very-long-interface-name", 16);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[15], 0);
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding_to_8(8), 0);
        assert_eq!(padding_to_8(4), 4);
        assert_eq!(padding_to_8(14), 2);
    }

    #[test]
    fn test_skip_past_end_fails() {
        let data = [0u8; 3];
        let mut cursor = Cursor::new(&data[..]);
        assert!(skip_bytes(&mut cursor, 4).is_err());
        assert!(skip_bytes(&mut cursor, 3).is_ok());
    }
}
