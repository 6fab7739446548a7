//! Canonical identity keys for SONiC topology discovery.
//!
//! Every device reports its neighbors with locally scoped, vendor-encoded
//! identifiers. This crate turns those encodings into single canonical string
//! forms that the matching engine can compare for equality:
//!
//! - [`MacAddress`]: 48-bit MAC parsed from colon/dash/dot separated hex,
//!   Cisco dotted triplets, six-part dotted decimal, or bare hex blobs
//! - [`canonical_ip`]: textual IPv4/IPv6 or raw 4/16 byte hex octet strings
//! - [`canonical_hostname`]: trimmed, lowercased, trailing-dot-free names
//! - [`canonical_hex_token`]: separator-free lowercase hex (IS-IS system IDs,
//!   chassis IDs)
//! - [`Netmask`]: subnet membership for binding routing neighbors to
//!   local interfaces

mod canon;
mod ip;
mod mac;

pub use canon::{canonical_chassis, canonical_hex_token, canonical_hostname, composite_key};
pub use ip::{canonical_ip, is_unspecified_ip, parse_ip, same_network, Netmask};
pub use mac::{canonical_mac, MacAddress};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid hex token: {0}")]
    InvalidHexToken(String),

    #[error("invalid netmask: {0}")]
    InvalidNetmask(String),
}
