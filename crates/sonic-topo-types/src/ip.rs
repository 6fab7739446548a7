//! IP address canonicalization and subnet membership.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Parses an IP address from its textual form or from a raw SNMP octet
/// string rendered as hex.
///
/// Accepted hex layouts: 4 or 16 raw bytes, optionally `0x` prefixed and
/// optionally separated by `:`, `-` or spaces, plus the 5/17 byte LLDP
/// management-address form carrying a leading IANA family octet (1 = IPv4,
/// 2 = IPv6).
pub fn parse_ip(raw: &str) -> Result<IpAddr, ParseError> {
    let invalid = || ParseError::InvalidIpAddress(raw.to_string());

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    // zone suffix (fe80::1%Ethernet0) is local scope only
    let unzoned = trimmed.split('%').next().unwrap_or(trimmed);
    if let Ok(addr) = unzoned.parse::<IpAddr>() {
        return Ok(addr);
    }

    let lower = trimmed.to_ascii_lowercase();
    let body = lower.strip_prefix("0x").unwrap_or(&lower);
    let hex: String = body
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | ' '))
        .collect();
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid())?);
    }

    match bytes.as_slice() {
        [a, b, c, d] => Ok(IpAddr::V4(Ipv4Addr::new(*a, *b, *c, *d))),
        [1, a, b, c, d] => Ok(IpAddr::V4(Ipv4Addr::new(*a, *b, *c, *d))),
        octets if octets.len() == 16 => Ok(IpAddr::V6(v6_from_slice(octets))),
        octets if octets.len() == 17 && octets[0] == 2 => {
            Ok(IpAddr::V6(v6_from_slice(&octets[1..])))
        }
        _ => Err(invalid()),
    }
}

fn v6_from_slice(octets: &[u8]) -> Ipv6Addr {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&octets[..16]);
    Ipv6Addr::from(buf)
}

/// Canonical textual form of an address (RFC 5952 for IPv6), or `None` when
/// the input does not decode.
pub fn canonical_ip(raw: &str) -> Option<String> {
    parse_ip(raw).ok().map(|addr| addr.to_string())
}

/// True for empty input, `0.0.0.0` and `::`. Address-less OSPF interfaces
/// report the unspecified address.
pub fn is_unspecified_ip(raw: &str) -> bool {
    match parse_ip(raw) {
        Ok(addr) => addr.is_unspecified(),
        Err(_) => raw.trim().is_empty(),
    }
}

/// A network mask, stored as a prefix length.
///
/// Parses dotted masks (`255.255.255.0`), IPv6 masks (`ffff:ffff::`) and bare
/// or slash-prefixed lengths (`24`, `/64`). Non-contiguous masks are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Netmask {
    prefix_len: u8,
}

impl Netmask {
    /// Creates a netmask from a prefix length (at most 128).
    pub fn new(prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > 128 {
            return Err(ParseError::InvalidNetmask(prefix_len.to_string()));
        }
        Ok(Netmask { prefix_len })
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Applies the mask to an address. IPv4 masks longer than 32 bits are
    /// clamped.
    pub fn network_of(&self, addr: IpAddr) -> IpAddr {
        match addr {
            IpAddr::V4(v4) => {
                let len = u32::from(self.prefix_len.min(32));
                let mask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
            }
            IpAddr::V6(v6) => {
                let len = u32::from(self.prefix_len.min(128));
                let mask = if len == 0 { 0 } else { u128::MAX << (128 - len) };
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
            }
        }
    }
}

impl fmt::Display for Netmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.prefix_len)
    }
}

impl FromStr for Netmask {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidNetmask(s.to_string());
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('/').unwrap_or(trimmed);

        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let len: u8 = digits.parse().map_err(|_| invalid())?;
            return Netmask::new(len);
        }

        let bits = match parse_ip(trimmed).map_err(|_| invalid())? {
            IpAddr::V4(v4) => u128::from(u32::from(v4)) << 96,
            IpAddr::V6(v6) => u128::from(v6),
        };
        let ones = bits.leading_ones();
        if bits.checked_shl(ones).unwrap_or(0) != 0 {
            return Err(invalid());
        }
        let len = u8::try_from(ones).map_err(|_| invalid())?;
        Netmask::new(len)
    }
}

/// True when both addresses share a family and fall in the same network
/// under `mask`.
pub fn same_network(a: IpAddr, b: IpAddr, mask: Netmask) -> bool {
    match (a, b) {
        (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
            mask.network_of(a) == mask.network_of(b)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_textual_forms() {
        assert_eq!(canonical_ip("10.0.0.1").as_deref(), Some("10.0.0.1"));
        assert_eq!(canonical_ip(" 10.0.0.1 ").as_deref(), Some("10.0.0.1"));
        assert_eq!(
            canonical_ip("2001:0DB8:0000::0001").as_deref(),
            Some("2001:db8::1")
        );
        assert_eq!(canonical_ip("fe80::1%Ethernet0").as_deref(), Some("fe80::1"));
    }

    #[test]
    fn test_hex_octet_forms() {
        assert_eq!(canonical_ip("0a000001").as_deref(), Some("10.0.0.1"));
        assert_eq!(canonical_ip("0x0A000001").as_deref(), Some("10.0.0.1"));
        assert_eq!(canonical_ip("0a 00 00 01").as_deref(), Some("10.0.0.1"));
        assert_eq!(canonical_ip("01:0a:00:00:01").as_deref(), Some("10.0.0.1"));
        assert_eq!(
            canonical_ip("20010db8000000000000000000000001").as_deref(),
            Some("2001:db8::1")
        );
        assert_eq!(
            canonical_ip("0220010db8000000000000000000000001").as_deref(),
            Some("2001:db8::1")
        );
    }

    #[test]
    fn test_invalid_forms() {
        assert_eq!(canonical_ip(""), None);
        assert_eq!(canonical_ip("switch-1"), None);
        assert_eq!(canonical_ip("0a0000"), None);
        assert_eq!(canonical_ip("0a00000"), None);
    }

    #[test]
    fn test_unspecified() {
        assert!(is_unspecified_ip(""));
        assert!(is_unspecified_ip("0.0.0.0"));
        assert!(is_unspecified_ip("::"));
        assert!(!is_unspecified_ip("10.0.0.1"));
        assert!(!is_unspecified_ip("garbage"));
    }

    #[test]
    fn test_netmask_parse() {
        assert_eq!("255.255.255.0".parse::<Netmask>().unwrap().prefix_len(), 24);
        assert_eq!("255.255.255.252".parse::<Netmask>().unwrap().prefix_len(), 30);
        assert_eq!("/64".parse::<Netmask>().unwrap().prefix_len(), 64);
        assert_eq!("16".parse::<Netmask>().unwrap().prefix_len(), 16);
        assert_eq!("ffff:ffff::".parse::<Netmask>().unwrap().prefix_len(), 32);
        assert!("255.0.255.0".parse::<Netmask>().is_err());
        assert!("129".parse::<Netmask>().is_err());
    }

    #[test]
    fn test_same_network() {
        let mask: Netmask = "255.255.255.252".parse().unwrap();
        let a: IpAddr = "10.1.1.1".parse().unwrap();
        let b: IpAddr = "10.1.1.2".parse().unwrap();
        let c: IpAddr = "10.1.1.5".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(same_network(a, b, mask));
        assert!(!same_network(a, c, mask));
        assert!(!same_network(a, v6, mask));
    }
}
