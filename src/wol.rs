//! Parses an IEEE 802 MAC-48 address and continues to construct a
//! WakeOnLAN packet (so called "Magic Packet Technology").
//!
//! The packet is 6 bytes of `0xFF` followed by the target address repeated
//! 16 times, 102 bytes in total with no padding anywhere.
use std::fmt;
use std::str::FromStr;

use crate::error::WakeError;

pub const MAC_LEN: usize = 6;
const SYNC_LEN: usize = 6;
const REPETITIONS: usize = 16;
pub const MAGIC_PACKET_LEN: usize = SYNC_LEN + REPETITIONS * MAC_LEN;

const SYNC_STREAM: [u8; SYNC_LEN] = [0xFF; SYNC_LEN];

/// `xx?xx?xx?xx?xx?xx`, where every `?` is a separator
const MAC_TEXT_LEN: usize = 3 * MAC_LEN - 1;
const SEPARATORS: [u8; 2] = [b':', b'-'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; MAC_LEN]);

/// Matches exactly five separator terminated groups of two hex digits
/// followed by a final group of two hex digits. Each separator is checked on
/// its own, so `:` and `-` may be mixed within one address.
fn is_mac48(input: &str) -> bool {
    input.len() == MAC_TEXT_LEN
        && input.bytes().enumerate().all(|(index, c)| {
            if index % 3 == 2 {
                SEPARATORS.contains(&c)
            } else {
                c.is_ascii_hexdigit()
            }
        })
}

impl FromStr for MacAddress {
    type Err = WakeError;

    /// Accepts `01:02:03:04:05:06` or `01-02-03-04-05-06`, hex digits in
    /// either case. Octets keep the order they are written in.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WakeError::InvalidAddressFormat(s.to_owned());

        if !is_mac48(s) {
            return Err(invalid());
        }

        let digits: Vec<u8> = s.bytes().filter(u8::is_ascii_hexdigit).collect();
        let mut octets = [0u8; MAC_LEN];
        hex::decode_to_slice(&digits, &mut octets).map_err(|_| invalid())?;

        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagicPacket {
    header: [u8; SYNC_LEN],
    payload: [MacAddress; REPETITIONS],
}

impl MagicPacket {
    pub fn new(mac: MacAddress) -> Self {
        MagicPacket {
            header: SYNC_STREAM,
            payload: [mac; REPETITIONS],
        }
    }

    pub fn target(&self) -> MacAddress {
        self.payload[0]
    }

    /// Lays the packet out on the wire: header first, then every repetition
    /// back to back.
    pub fn to_bytes(&self) -> [u8; MAGIC_PACKET_LEN] {
        let mut bytes = [0u8; MAGIC_PACKET_LEN];
        bytes[..SYNC_LEN].copy_from_slice(&self.header);

        for (block, mac) in bytes[SYNC_LEN..]
            .chunks_exact_mut(MAC_LEN)
            .zip(self.payload.iter())
        {
            block.copy_from_slice(&mac.0);
        }

        bytes
    }
}

/// Creates a magic packet for the given MAC address. The input address must
/// follow the IEEE EUI-48 notation (hexadecimal octets separated by hyphens),
/// alternatively colons (:) can be used instead of hyphens.
pub fn create_magic_packet(mac: &str) -> Result<MagicPacket, WakeError> {
    let mac = mac.parse::<MacAddress>()?;
    Ok(MagicPacket::new(mac))
}

#[test]
fn test_parse_hyphens() {
    let mac: MacAddress = "18-18-18-18-18-18".parse().unwrap();
    assert_eq!(mac.0, [0x18; 6]);
}

#[test]
fn test_parse_colons_keeps_order() {
    let mac: MacAddress = "01:02:03:04:05:06".parse().unwrap();
    assert_eq!(mac.0, [1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_parse_case_insensitive() {
    let lower: MacAddress = "ab:cd:ef:0a:1b:2c".parse().unwrap();
    let upper: MacAddress = "AB:CD:EF:0A:1B:2C".parse().unwrap();
    assert_eq!(lower, upper);
    assert_eq!(lower.0, [0xab, 0xcd, 0xef, 0x0a, 0x1b, 0x2c]);
}

#[test]
fn test_magic_gibberish() {
    assert!(create_magic_packet("hello").is_err());
}

#[test]
fn test_magic_invalid_alphabet() {
    assert!(create_magic_packet("he-js-an-cc-dd-ee").is_err());
}

#[test]
fn test_magic_non_hex() {
    match create_magic_packet("gg:gg:gg:gg:gg:gg") {
        Err(WakeError::InvalidAddressFormat(input)) => assert_eq!(input, "gg:gg:gg:gg:gg:gg"),
        other => panic!("expected InvalidAddressFormat, got {:?}", other),
    }
}

#[test]
fn test_magic_too_short() {
    assert!(create_magic_packet("ab-cd").is_err());
    assert!(create_magic_packet("ab-cd-ab-cd-ab").is_err());
}

#[test]
fn test_magic_too_long() {
    assert!(create_magic_packet("ab-cd-ab-cd-ab-cd-ab-cd-ab").is_err());
    assert!(create_magic_packet("ab-cd-ab-cd-ab-cd-").is_err());
    assert!(create_magic_packet(" ab-cd-ab-cd-ab-cd").is_err());
}

#[test]
fn test_magic_other_notations() {
    // dotted and bare forms are rejected, as are single digit octets
    assert!(create_magic_packet("0102.0304.0506").is_err());
    assert!(create_magic_packet("010203040506").is_err());
    assert!(create_magic_packet("01.02.03.04.05.06").is_err());
    assert!(create_magic_packet("1:2:3:4:5:6:7:8:9").is_err());
    assert!(create_magic_packet("01:02:03:04:05:06:07:08").is_err());
}

#[test]
fn test_magic_separator_mixed() {
    assert!(create_magic_packet("AA-aa:aa-aa-aa-aa").is_ok());
}

#[test]
fn test_magic_separator_order() {
    assert!(create_magic_packet("-----abababababab").is_err());
    assert!(create_magic_packet("abab-ab-ab-ab-ab-").is_err());
}

#[test]
fn test_magic() {
    let pkt = create_magic_packet("18-18-18-18-18-18").unwrap();
    let bytes = pkt.to_bytes();

    assert_eq!(bytes.len(), 102);

    // starts with padding
    assert_eq!(&bytes[..6], &[0xFF; 6]);
    assert_eq!(bytes[0], 0xFF);

    // follows with mac
    assert_eq!(bytes[6], 0x18);
    for block in bytes[6..].chunks(6) {
        assert_eq!(block, &[0x18; 6]);
    }
    assert_eq!(bytes[6..].chunks(6).count(), 16);
}

#[test]
fn test_magic_distinct_blocks() {
    let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let bytes = MagicPacket::new(mac).to_bytes();

    assert_eq!(&bytes[..6], &[0xFF; 6]);
    assert_eq!(&bytes[6..12], &mac.0);
    assert_eq!(&bytes[102 - 6..], &mac.0);
}

#[test]
fn test_magic_deterministic_and_injective() {
    let a = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let b = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x56]);

    assert_eq!(MagicPacket::new(a).to_bytes(), MagicPacket::new(a).to_bytes());
    assert_ne!(MagicPacket::new(a).to_bytes(), MagicPacket::new(b).to_bytes());
}

#[test]
fn test_display_round_trips() {
    let mac: MacAddress = "0A-1b-2C-3d-4E-5f".parse().unwrap();
    assert_eq!(mac.to_string(), "0a:1b:2c:3d:4e:5f");
    assert_eq!(MagicPacket::new(mac).target(), mac);
}
