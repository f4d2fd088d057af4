//! # Frames
//!
//! A [`Frame`] is an opaque, exact byte sequence. The harness compares frames
//! byte-for-byte and never looks at header fields; the builders below exist
//! only to produce stimulus bytes.
//!
//! Frames cross process boundaries as lowercase hex text.
//!
//! ```text
//!  Ethernet II (no FCS, no padding)
//! +-------------------+-------------------+-----------+-------------+
//! | dst MAC (6)       | src MAC (6)       | type (2)  | payload ... |
//! +-------------------+-------------------+-----------+-------------+
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use internet_checksum::Checksum;

use crate::error::FrameError;
use crate::topology::MacAddr;

// ─── Constants ───────────────────────────────────────────────────────────────

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// Destination MAC + source MAC + EtherType.
pub const ETHERNET_HEADER_LEN: usize = 14;

const ARP_HTYPE_ETHERNET: u16 = 1;
const ARP_OP_REQUEST: u16 = 1;
const IPV4_HEADER_LEN: usize = 20;
const IPPROTO_ICMP: u8 = 1;
const ICMP_ECHO_REQUEST: u8 = 8;
const ICMP_HEADER_LEN: usize = 8;
const DEFAULT_TTL: u8 = 64;

// ─── Frame ───────────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Bytes);

impl Frame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Frame(bytes.into())
    }

    pub fn from_hex(hex: &str) -> Result<Self, FrameError> {
        let bytes = decode_hex(hex)?;
        if bytes.is_empty() {
            return Err(FrameError::Empty);
        }
        Ok(Frame(Bytes::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    /// Exact byte equality against a captured buffer.
    pub fn matches(&self, captured: &[u8]) -> bool {
        self.0.as_ref() == captured
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({} bytes: {})", self.len(), self.to_hex())
    }
}

// ─── Hex ─────────────────────────────────────────────────────────────────────

pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex text, ignoring surrounding whitespace.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, FrameError> {
    let text = text.trim();
    hex::decode(text).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => FrameError::InvalidDigit {
            digit: c,
            offset: index,
        },
        hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
            FrameError::OddLength(text.len())
        }
    })
}

// ─── Builders ────────────────────────────────────────────────────────────────

/// Ethernet II frame with the given payload, unpadded.
pub fn ethernet(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8]) -> Frame {
    let mut buf = BytesMut::with_capacity(ETHERNET_HEADER_LEN + payload.len());
    buf.put_slice(&dst.octets());
    buf.put_slice(&src.octets());
    buf.put_u16(ethertype);
    buf.put_slice(payload);
    Frame(buf.freeze())
}

/// Broadcast ARP who-has request for `target_ip`.
pub fn arp_request(src_mac: MacAddr, src_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Frame {
    let mut arp = BytesMut::with_capacity(28);
    arp.put_u16(ARP_HTYPE_ETHERNET);
    arp.put_u16(ETHERTYPE_IPV4);
    arp.put_u8(6);
    arp.put_u8(4);
    arp.put_u16(ARP_OP_REQUEST);
    arp.put_slice(&src_mac.octets());
    arp.put_slice(&src_ip.octets());
    arp.put_slice(&MacAddr::ZERO.octets());
    arp.put_slice(&target_ip.octets());
    ethernet(MacAddr::BROADCAST, src_mac, ETHERTYPE_ARP, &arp)
}

/// IPv4 ICMP echo request (id 0, seq 0, empty payload).
pub fn icmp_echo(src_mac: MacAddr, src_ip: Ipv4Addr, dst_mac: MacAddr, dst_ip: Ipv4Addr) -> Frame {
    let mut icmp = [0u8; ICMP_HEADER_LEN];
    icmp[0] = ICMP_ECHO_REQUEST;
    let icmp_csum = checksum(&icmp);
    icmp[2..4].copy_from_slice(&icmp_csum);

    let mut ip = BytesMut::with_capacity(IPV4_HEADER_LEN + ICMP_HEADER_LEN);
    ip.put_u8(0x45); // version 4, IHL 5
    ip.put_u8(0); // DSCP/ECN
    ip.put_u16((IPV4_HEADER_LEN + ICMP_HEADER_LEN) as u16);
    ip.put_u16(1); // identification
    ip.put_u16(0); // flags / fragment offset
    ip.put_u8(DEFAULT_TTL);
    ip.put_u8(IPPROTO_ICMP);
    ip.put_u16(0); // checksum placeholder
    ip.put_slice(&src_ip.octets());
    ip.put_slice(&dst_ip.octets());
    let csum = checksum(&ip[..IPV4_HEADER_LEN]);
    ip[10..12].copy_from_slice(&csum);
    ip.put_slice(&icmp);

    ethernet(dst_mac, src_mac, ETHERTYPE_IPV4, &ip)
}

/// RFC 1071 one's-complement checksum, network byte order.
fn checksum(data: &[u8]) -> [u8; 2] {
    let mut cksum = Checksum::new();
    cksum.add_bytes(data);
    cksum.checksum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, last])
    }

    #[test]
    fn hex_decoding_errors() {
        assert_eq!(decode_hex("abc"), Err(FrameError::OddLength(3)));
        assert_eq!(
            decode_hex("0g"),
            Err(FrameError::InvalidDigit {
                digit: 'g',
                offset: 1
            })
        );
        assert_eq!(decode_hex(" 00FF \n").unwrap(), vec![0x00, 0xff]);
        assert_eq!(Frame::from_hex(""), Err(FrameError::Empty));
    }

    #[test]
    fn hex_is_lowercase() {
        let frame = Frame::new(vec![0xde, 0xad, 0x0b]);
        assert_eq!(frame.to_hex(), "dead0b");
        assert_eq!(Frame::from_hex("DEAD0B").unwrap(), frame);
    }

    #[test]
    fn arp_request_layout() {
        let frame = arp_request(
            mac(0xaa),
            Ipv4Addr::new(192, 168, 10, 11),
            Ipv4Addr::new(192, 168, 10, 12),
        );
        assert_eq!(
            frame.to_hex(),
            concat!(
                "ffffffffffff",
                "aaaaaaaaaaaa",
                "0806",
                "0001080006040001",
                "aaaaaaaaaaaa",
                "c0a80a0b",
                "000000000000",
                "c0a80a0c",
            )
        );
        assert_eq!(frame.len(), 42);
    }

    #[test]
    fn icmp_echo_checksums_verify() {
        let frame = icmp_echo(
            mac(0xbb),
            Ipv4Addr::new(192, 168, 10, 12),
            mac(0xaa),
            Ipv4Addr::new(192, 168, 10, 11),
        );
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), ETHERNET_HEADER_LEN + 28);
        assert_eq!(&bytes[0..6], &mac(0xaa).octets());
        assert_eq!(&bytes[6..12], &mac(0xbb).octets());

        let ip = &bytes[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + IPV4_HEADER_LEN];
        assert_eq!(checksum(ip), [0, 0]);
        let icmp = &bytes[ETHERNET_HEADER_LEN + IPV4_HEADER_LEN..];
        assert_eq!(icmp[0], ICMP_ECHO_REQUEST);
        assert_eq!(checksum(icmp), [0, 0]);
    }

    #[test]
    fn icmp_echo_checksum_values() {
        let frame = icmp_echo(
            mac(0xbb),
            Ipv4Addr::new(192, 168, 10, 12),
            mac(0xaa),
            Ipv4Addr::new(192, 168, 10, 11),
        );
        let bytes = frame.as_bytes();
        assert_eq!(&bytes[24..26], &[0xe5, 0x78]);
        assert_eq!(&bytes[36..38], &[0xf7, 0xff]);
    }

    #[test]
    fn hex_round_trips_mixed_case() {
        assert_eq!(decode_hex("0aFf").unwrap(), vec![0x0a, 0xff]);
        assert_eq!(encode_hex(&[0x0a, 0xff]), "0aff");
    }

    #[test]
    fn matching_is_exact() {
        let frame = Frame::new(vec![1, 2, 3]);
        assert!(frame.matches(&[1, 2, 3]));
        assert!(!frame.matches(&[1, 2, 3, 0]));
        assert!(!frame.matches(&[1, 2]));
    }
}
