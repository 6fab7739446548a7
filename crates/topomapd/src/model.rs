//! Topology graph produced by a discovery run
//!
//! All collections are emitted pre-sorted and every map/set is ordered, so a
//! serialized [`TopologyResult`] is byte-stable for a given input set.

use crate::bridge_domain::BridgeDomainSummary;
use crate::isis::IsisLinkPair;
use crate::ospf::OspfLinkPair;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sonic_topo_types::MacAddress;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

pub type Labels = BTreeMap<String, String>;

/// Counter names emitted in [`TopologyResult::stats`]
pub mod stats {
    pub const DEVICES_TOTAL: &str = "devices_total";
    pub const LINKS_TOTAL: &str = "links_total";
    pub const LINKS_LLDP: &str = "links_lldp";
    pub const LINKS_CDP: &str = "links_cdp";
    pub const LINKS_OSPF: &str = "links_ospf";
    pub const LINKS_ISIS: &str = "links_isis";
    pub const ATTACHMENTS_TOTAL: &str = "attachments_total";
    pub const ATTACHMENTS_FDB: &str = "attachments_fdb";
    pub const ENRICHMENTS_TOTAL: &str = "enrichments_total";
    pub const ENRICHMENTS_ARP_ND: &str = "enrichments_arp_nd";
    pub const BRIDGE_DOMAINS_TOTAL: &str = "bridge_domains_total";
    pub const ENDPOINTS_TOTAL: &str = "endpoints_total";
    pub const OSPF_PAIRS_TOTAL: &str = "ospf_pairs_total";
    pub const ISIS_PAIRS_TOTAL: &str = "isis_pairs_total";
}

/// Label keys shared by both sides of a verified bidirectional link
pub mod pair_keys {
    pub const PAIR_ID: &str = "pair_id";
    pub const PAIR_SIDE: &str = "pair_side";
    pub const PAIR_PASS: &str = "pair_pass";
}

/// Discovery protocol that produced an adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Lldp,
    Cdp,
    Ospf,
    Isis,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Lldp => "lldp",
            Protocol::Cdp => "cdp",
            Protocol::Ospf => "ospf",
            Protocol::Isis => "isis",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed endpoint identifier: `mac:<12-hex>` or `ip:<canonical-ip>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn from_mac(mac: &MacAddress) -> Self {
        EndpointId(format!("mac:{}", mac.to_token()))
    }

    pub fn from_ip(ip: &IpAddr) -> Self {
        EndpointId(format!("ip:{}", ip))
    }

    pub fn is_mac(&self) -> bool {
        self.0.starts_with("mac:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub hostname: String,
    pub sys_object_id: String,
    pub chassis_id: String,
    pub management_addresses: BTreeSet<String>,
    pub labels: Labels,
}

impl Device {
    pub fn new(id: impl Into<String>) -> Self {
        Device {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Fills empty fields from `other`; populated fields are never replaced.
    /// Address and label sets only grow.
    pub fn enrich(&mut self, other: &Device) {
        fill(&mut self.hostname, &other.hostname);
        fill(&mut self.sys_object_id, &other.sys_object_id);
        fill(&mut self.chassis_id, &other.chassis_id);
        self.management_addresses
            .extend(other.management_addresses.iter().cloned());
        for (k, v) in &other.labels {
            self.labels.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

fn fill(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub device_id: String,
    pub if_index: u32,
    pub name: String,
    pub description: String,
}

/// One directed device-to-device edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency {
    pub protocol: Protocol,
    pub source_device_id: String,
    pub source_port: String,
    pub target_device_id: String,
    pub target_port: String,
    pub labels: Labels,
}

impl Adjacency {
    /// Uniqueness and sort key
    pub fn key(&self) -> AdjacencyKey {
        (
            self.protocol,
            self.source_device_id.clone(),
            self.source_port.clone(),
            self.target_device_id.clone(),
            self.target_port.clone(),
        )
    }

    /// A device may only link to itself between two distinct, named ports.
    pub fn is_self_loop(&self) -> bool {
        self.source_device_id == self.target_device_id
            && (self.source_port.is_empty()
                || self.target_port.is_empty()
                || self.source_port == self.target_port)
    }

    pub fn pair_id(&self) -> Option<&str> {
        self.labels.get(pair_keys::PAIR_ID).map(String::as_str)
    }
}

pub type AdjacencyKey = (Protocol, String, String, String, String);

/// An endpoint bound to one device interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub device_id: String,
    pub if_index: u32,
    pub endpoint_id: EndpointId,
    pub method: String,
    pub labels: Labels,
}

impl Attachment {
    pub fn key(&self) -> AttachmentKey {
        (
            self.device_id.clone(),
            self.if_index,
            self.endpoint_id.clone(),
            self.method.clone(),
        )
    }
}

pub type AttachmentKey = (String, u32, EndpointId, String);

/// Cross-protocol metadata accumulated for one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub endpoint_id: EndpointId,
    pub mac: String,
    pub ips: BTreeSet<String>,
    pub protocols: BTreeSet<String>,
    pub device_ids: BTreeSet<String>,
    pub if_indexes: BTreeSet<u32>,
    pub if_names: BTreeSet<String>,
    pub states: BTreeSet<String>,
    pub address_types: BTreeSet<String>,
}

impl Enrichment {
    pub fn new(endpoint_id: EndpointId) -> Self {
        Enrichment {
            endpoint_id,
            mac: String::new(),
            ips: BTreeSet::new(),
            protocols: BTreeSet::new(),
            device_ids: BTreeSet::new(),
            if_indexes: BTreeSet::new(),
            if_names: BTreeSet::new(),
            states: BTreeSet::new(),
            address_types: BTreeSet::new(),
        }
    }

    /// Unions every set of `other` into `self`. The MAC is only taken when
    /// `self` has none.
    pub fn absorb(&mut self, other: &Enrichment) {
        fill(&mut self.mac, &other.mac);
        self.ips.extend(other.ips.iter().cloned());
        self.protocols.extend(other.protocols.iter().cloned());
        self.device_ids.extend(other.device_ids.iter().cloned());
        self.if_indexes.extend(other.if_indexes.iter().copied());
        self.if_names.extend(other.if_names.iter().cloned());
        self.states.extend(other.states.iter().cloned());
        self.address_types.extend(other.address_types.iter().cloned());
    }
}

/// Output of one L2 or L3 discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyResult {
    pub collected_at: DateTime<Utc>,
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub adjacencies: Vec<Adjacency>,
    pub attachments: Vec<Attachment>,
    pub enrichments: Vec<Enrichment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bridge_domains: Vec<BridgeDomainSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ospf_pairs: Vec<OspfLinkPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub isis_pairs: Vec<IsisLinkPair>,
    pub stats: BTreeMap<String, u64>,
}

impl TopologyResult {
    pub fn stat(&self, name: &str) -> u64 {
        self.stats.get(name).copied().unwrap_or(0)
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn adjacencies_for(&self, protocol: Protocol) -> impl Iterator<Item = &Adjacency> {
        self.adjacencies.iter().filter(move |a| a.protocol == protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_endpoint_id_forms() {
        let mac: MacAddress = "00:1A:2B:3C:4D:5E".parse().unwrap();
        assert_eq!(EndpointId::from_mac(&mac).as_str(), "mac:001a2b3c4d5e");
        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        let id = EndpointId::from_ip(&ip);
        assert_eq!(id.as_str(), "ip:10.0.0.9");
        assert!(!id.is_mac());
    }

    #[test]
    fn test_device_enrich_never_overwrites() {
        let mut device = Device::new("leaf1");
        device.hostname = "leaf1".to_string();
        let mut other = Device::new("leaf1");
        other.hostname = "other-name".to_string();
        other.chassis_id = "00:11:22:33:44:55".to_string();
        other.management_addresses.insert("10.0.0.1".to_string());
        device.enrich(&other);
        assert_eq!(device.hostname, "leaf1");
        assert_eq!(device.chassis_id, "00:11:22:33:44:55");
        assert!(device.management_addresses.contains("10.0.0.1"));
    }

    #[test]
    fn test_self_loop_rule() {
        let mut adj = Adjacency {
            protocol: Protocol::Lldp,
            source_device_id: "a".to_string(),
            source_port: "Ethernet0".to_string(),
            target_device_id: "a".to_string(),
            target_port: "Ethernet4".to_string(),
            labels: Labels::new(),
        };
        assert!(!adj.is_self_loop());
        adj.target_port = "Ethernet0".to_string();
        assert!(adj.is_self_loop());
        adj.target_port = String::new();
        assert!(adj.is_self_loop());
        adj.target_device_id = "b".to_string();
        assert!(!adj.is_self_loop());
    }

    #[test]
    fn test_enrichment_absorb_is_idempotent() {
        let mut base = Enrichment::new(EndpointId("mac:001122334455".to_string()));
        base.mac = "00:11:22:33:44:55".to_string();
        let mut other = Enrichment::new(EndpointId("ip:10.0.0.1".to_string()));
        other.ips.insert("10.0.0.1".to_string());
        other.protocols.insert("arp".to_string());
        base.absorb(&other);
        let once = base.clone();
        base.absorb(&other);
        assert_eq!(base, once);
        assert_eq!(base.mac, "00:11:22:33:44:55");
    }
}
