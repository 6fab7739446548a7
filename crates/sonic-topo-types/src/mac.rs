//! MAC address type with lenient parsing and canonical formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// Parsing accepts every encoding SNMP agents are known to hand back:
///
/// ```
/// use sonic_topo_types::MacAddress;
///
/// let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
/// assert_eq!(mac, "00-11-22-33-44-55".parse().unwrap());
/// assert_eq!(mac, "0011.2233.4455".parse().unwrap());
/// assert_eq!(mac, "0.17.34.51.68.85".parse().unwrap());
/// assert_eq!(mac, "0x001122334455".parse().unwrap());
/// assert_eq!(mac.to_token(), "001122334455");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The broadcast MAC address (FF:FF:FF:FF:FF:FF).
    pub const BROADCAST: MacAddress = MacAddress([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);

    /// The zero/null MAC address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0, 0, 0, 0, 0, 0]);

    /// Creates a new MAC address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Returns the raw bytes of the MAC address.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns true if this is a multicast address (broadcast included).
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns true if this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.0 == Self::BROADCAST.0
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO.0
    }

    /// Returns true if the address can identify a single station.
    pub fn is_endpoint(&self) -> bool {
        !self.is_zero() && !self.is_multicast()
    }

    /// Twelve lowercase hex digits, no separators. Used inside endpoint IDs.
    pub fn to_token(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());

        let lower = s.trim().to_ascii_lowercase();
        let body = lower.strip_prefix("0x").unwrap_or(&lower);
        if body.is_empty() {
            return Err(invalid());
        }

        if let Some(sep) = [':', '-', ' '].into_iter().find(|c| body.contains(*c)) {
            let groups: Vec<&str> = body.split(sep).filter(|g| !g.is_empty()).collect();
            return parse_hex_groups(&groups).ok_or_else(invalid);
        }

        if body.contains('.') {
            let parts: Vec<&str> = body.split('.').collect();
            return match parts.len() {
                // six-part dotted decimal, as rendered by net-snmp for PhysAddress
                6 => {
                    let mut bytes = [0u8; 6];
                    for (i, part) in parts.iter().enumerate() {
                        bytes[i] = part.parse::<u8>().map_err(|_| invalid())?;
                    }
                    Ok(MacAddress(bytes))
                }
                3 => parse_hex_groups(&parts).ok_or_else(invalid),
                _ => Err(invalid()),
            };
        }

        parse_hex_blob(body).ok_or_else(invalid)
    }
}

/// Six groups of one or two hex digits, or three groups of four.
fn parse_hex_groups(groups: &[&str]) -> Option<MacAddress> {
    let mut bytes = [0u8; 6];
    match groups.len() {
        6 => {
            for (i, group) in groups.iter().enumerate() {
                if group.is_empty() || group.len() > 2 {
                    return None;
                }
                bytes[i] = u8::from_str_radix(group, 16).ok()?;
            }
        }
        3 => {
            for (i, group) in groups.iter().enumerate() {
                if group.len() != 4 {
                    return None;
                }
                let word = u16::from_str_radix(group, 16).ok()?;
                bytes[i * 2..i * 2 + 2].copy_from_slice(&word.to_be_bytes());
            }
        }
        _ => return None,
    }
    Some(MacAddress(bytes))
}

fn parse_hex_blob(body: &str) -> Option<MacAddress> {
    if body.len() != 12 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut bytes = [0u8; 6];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&body[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(MacAddress(bytes))
}

/// Canonical `aa:bb:cc:dd:ee:ff` form of a raw MAC string, or `None` when the
/// input does not decode to six bytes.
pub fn canonical_mac(raw: &str) -> Option<String> {
    raw.parse::<MacAddress>().ok().map(|mac| mac.to_string())
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}
