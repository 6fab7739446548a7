//! Bridge forwarding table to endpoint attachments

use crate::model::{Attachment, EndpointId, Labels};
use crate::types::{DeviceObservation, FdbRow};
use serde::{Deserialize, Serialize};
use sonic_topo_types::MacAddress;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

pub const FDB_METHOD: &str = "fdb";

/// Canonical dot1dTpFdbStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FdbStatus {
    Learned,
    /// One of the bridge's own addresses
    #[serde(rename = "self")]
    Own,
    Ignored,
}

impl FdbStatus {
    /// Lenient parse: MIB codes, enum names and vendor spellings
    pub fn parse(raw: &str) -> Self {
        let status = raw.trim().to_ascii_lowercase();
        match status.as_str() {
            "3" | "learned" => FdbStatus::Learned,
            "4" | "self" | "5" | "mgmt" => FdbStatus::Own,
            s if s.contains("learned") => FdbStatus::Learned,
            s if s.contains("self") => FdbStatus::Own,
            _ => FdbStatus::Ignored,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FdbStatus::Learned => "learned",
            FdbStatus::Own => "self",
            FdbStatus::Ignored => "ignored",
        }
    }
}

/// Where a learned MAC points. Two different destinations for one MAC make
/// it ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Destination {
    IfIndex(u32),
    BridgePort(u32),
}

/// A MAC that survived self-blocking and ambiguity checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnedMac {
    pub mac: MacAddress,
    pub bridge_port: u32,
    /// 0 when the bridge port did not resolve
    pub if_index: u32,
    pub if_name: String,
    pub vlan: u32,
}

impl LearnedMac {
    /// Synthetic broadcast-domain label for the port this MAC was learned on
    pub fn bridge_domain_id(&self, device_id: &str) -> String {
        if self.if_index > 0 {
            format!("bd:{}:if{}", device_id, self.if_index)
        } else {
            format!("bd:{}:bp{}", device_id, self.bridge_port)
        }
    }

    pub fn to_attachment(&self, device_id: &str) -> Attachment {
        let mut labels = Labels::new();
        labels.insert("mac".to_string(), self.mac.to_string());
        labels.insert("fdb_status".to_string(), FdbStatus::Learned.as_str().to_string());
        labels.insert("bridge_domain".to_string(), self.bridge_domain_id(device_id));
        if self.bridge_port > 0 {
            labels.insert("bridge_port".to_string(), self.bridge_port.to_string());
        }
        if !self.if_name.is_empty() {
            labels.insert("if_name".to_string(), self.if_name.clone());
        }
        if self.vlan > 0 {
            labels.insert("vlan".to_string(), self.vlan.to_string());
        }
        Attachment {
            device_id: device_id.to_string(),
            if_index: self.if_index,
            endpoint_id: EndpointId::from_mac(&self.mac),
            method: FDB_METHOD.to_string(),
            labels,
        }
    }
}

/// Result of processing one device's forwarding table
#[derive(Debug, Clone, Default)]
pub struct FdbTable {
    pub device_id: String,
    /// Sorted by MAC
    pub learned: Vec<LearnedMac>,
    /// Self FDB entries plus the chassis and interface addresses
    pub owned_macs: BTreeSet<MacAddress>,
}

struct ParsedRow<'a> {
    mac: MacAddress,
    status: FdbStatus,
    row: &'a FdbRow,
}

/// Extracts learned endpoint MACs from one device.
pub fn extract(obs: &DeviceObservation) -> FdbTable {
    let device_id = obs.device_id.trim();
    // a base port listed twice maps to its lowest ifIndex
    let mut base_ports: HashMap<u32, u32> = HashMap::new();
    for port in obs.bridge_ports.iter().filter(|p| p.base_port > 0 && p.if_index > 0) {
        base_ports
            .entry(port.base_port)
            .and_modify(|idx| *idx = (*idx).min(port.if_index))
            .or_insert(port.if_index);
    }

    let mut rows: Vec<ParsedRow<'_>> = Vec::with_capacity(obs.fdb_entries.len());
    for row in &obs.fdb_entries {
        match row.mac.parse::<MacAddress>() {
            Ok(mac) => rows.push(ParsedRow {
                mac,
                status: FdbStatus::parse(&row.status),
                row,
            }),
            Err(_) => debug!(
                device = %device_id,
                mac = %row.mac,
                "dropping FDB row with unparseable MAC"
            ),
        }
    }
    rows.sort_by(|a, b| {
        (a.row.bridge_port, a.row.if_index, a.mac, a.status)
            .cmp(&(b.row.bridge_port, b.row.if_index, b.mac, b.status))
            .then_with(|| a.row.cmp(b.row))
    });

    let blocked: BTreeSet<MacAddress> = rows
        .iter()
        .filter(|r| r.status == FdbStatus::Own)
        .map(|r| r.mac)
        .collect();

    let mut candidates: BTreeMap<MacAddress, Vec<(Destination, &ParsedRow<'_>)>> = BTreeMap::new();
    for parsed in rows.iter().filter(|r| r.status == FdbStatus::Learned) {
        if blocked.contains(&parsed.mac) {
            continue;
        }
        if !parsed.mac.is_endpoint() {
            debug!(device = %device_id, mac = %parsed.mac, "dropping non-endpoint FDB MAC");
            continue;
        }
        let if_index = if parsed.row.if_index > 0 {
            parsed.row.if_index
        } else {
            base_ports.get(&parsed.row.bridge_port).copied().unwrap_or(0)
        };
        let destination = if if_index > 0 {
            Destination::IfIndex(if_index)
        } else if parsed.row.bridge_port > 0 {
            Destination::BridgePort(parsed.row.bridge_port)
        } else {
            debug!(device = %device_id, mac = %parsed.mac, "dropping FDB MAC without port");
            continue;
        };
        candidates.entry(parsed.mac).or_default().push((destination, parsed));
    }

    let mut learned = Vec::with_capacity(candidates.len());
    for (mac, seen) in candidates {
        let destinations: BTreeSet<Destination> = seen.iter().map(|(d, _)| *d).collect();
        if destinations.len() > 1 {
            debug!(
                device = %device_id,
                mac = %mac,
                ports = destinations.len(),
                "dropping ambiguous FDB MAC"
            );
            continue;
        }
        let (destination, parsed) = seen[0];
        let if_index = match destination {
            Destination::IfIndex(idx) => idx,
            Destination::BridgePort(_) => 0,
        };
        learned.push(LearnedMac {
            mac,
            bridge_port: parsed.row.bridge_port,
            if_index,
            if_name: obs.interface_name(if_index),
            vlan: parsed.row.vlan,
        });
    }

    let mut owned_macs = blocked;
    if let Ok(mac) = obs.chassis_id.parse::<MacAddress>() {
        owned_macs.insert(mac);
    }
    if let Ok(mac) = obs.lldp_local.chassis_id.parse::<MacAddress>() {
        owned_macs.insert(mac);
    }
    for intf in &obs.interfaces {
        if let Ok(mac) = intf.phys_address.parse::<MacAddress>() {
            if mac.is_endpoint() {
                owned_macs.insert(mac);
            }
        }
    }

    FdbTable {
        device_id: device_id.to_string(),
        learned,
        owned_macs,
    }
}
