use std::fmt;

use serde::{Serialize, Serializer};

pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const ETHERTYPE_LLDP: u16 = 0x88cc;

const ETHERNET_HEADER_LENGTH: usize = 14;
const VLAN_TAG_LENGTH: usize = 4;

/// A 48-bit hardware address.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn new(bytes: [u8; 6]) -> MacAddr {
        MacAddr(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The link-layer header of a frame carried in a packet-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dl_dst: MacAddr,
    pub dl_src: MacAddr,
    pub dl_vlan: Option<u16>,
    pub ether_type: u16,
}

impl EthernetHeader {
    /// Parse the Ethernet header at the start of `frame`, stepping over one 802.1Q tag.
    /// Returns `None` when the frame is too short.
    pub fn parse(frame: &[u8]) -> Option<EthernetHeader> {
        if frame.len() < ETHERNET_HEADER_LENGTH {
            return None;
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&frame[0..6]);
        src.copy_from_slice(&frame[6..12]);
        let outer_type = u16::from_be_bytes([frame[12], frame[13]]);

        let (dl_vlan, ether_type) = if outer_type == ETHERTYPE_VLAN {
            if frame.len() < ETHERNET_HEADER_LENGTH + VLAN_TAG_LENGTH {
                return None;
            }
            let tci = u16::from_be_bytes([frame[14], frame[15]]);
            (Some(tci & 0x0fff), u16::from_be_bytes([frame[16], frame[17]]))
        } else {
            (None, outer_type)
        };

        Some(EthernetHeader {
            dl_dst: MacAddr(dst),
            dl_src: MacAddr(src),
            dl_vlan,
            ether_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ether_type: &[u8]) -> Vec<u8> {
        let mut f = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        f.extend_from_slice(ether_type);
        f.extend_from_slice(&[0u8; 28]);
        f
    }

    #[test]
    fn test_parse_untagged() {
        let eth = EthernetHeader::parse(&frame(&[0x08, 0x06])).unwrap();
        assert_eq!(eth.dl_src.to_string(), "00:11:22:33:44:55");
        assert_eq!(eth.ether_type, 0x0806);
        assert_eq!(eth.dl_vlan, None);
    }

    #[test]
    fn test_parse_vlan_tagged() {
        let eth = EthernetHeader::parse(&frame(&[0x81, 0x00, 0x00, 0x64, 0x86, 0xdd])).unwrap();
        assert_eq!(eth.dl_vlan, Some(100));
        assert_eq!(eth.ether_type, ETHERTYPE_IPV6);
    }

    #[test]
    fn test_short_frame() {
        assert_eq!(EthernetHeader::parse(&[0u8; 10]), None);
    }
}
