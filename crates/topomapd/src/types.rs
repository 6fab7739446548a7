//! Per-device observation records
//!
//! One [`DeviceObservation`] carries everything a single device reported
//! about itself and its neighbors, already walked and decoded upstream. Every
//! field defaults when absent so partial collections deserialize cleanly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything collected from one device in one discovery round
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceObservation {
    /// Stable device identifier assigned by the inventory (required)
    pub device_id: String,
    pub hostname: String,
    pub sys_object_id: String,
    pub chassis_id: String,
    pub management_addresses: Vec<String>,
    pub labels: BTreeMap<String, String>,
    /// When the upstream poll finished
    pub collected_at: Option<DateTime<Utc>>,
    pub interfaces: Vec<InterfaceRow>,

    pub lldp_local: LldpLocal,
    pub lldp_remotes: Vec<LldpRemoteRow>,

    /// cdpGlobalDeviceId as advertised by this device
    pub cdp_global_device_id: String,
    pub cdp_remotes: Vec<CdpRemoteRow>,

    pub bridge_ports: Vec<BridgePortRow>,
    pub fdb_entries: Vec<FdbRow>,

    pub arp_entries: Vec<ArpRow>,

    pub ospf_router_id: String,
    pub ospf_interfaces: Vec<OspfInterfaceRow>,
    pub ospf_neighbors: Vec<OspfNeighborRow>,

    pub isis_sys_id: String,
    pub isis_circuits: Vec<IsisCircuitRow>,
    pub isis_adjacencies: Vec<IsisAdjacencyRow>,
}

impl DeviceObservation {
    /// Look up a local interface by ifIndex. Duplicate rows resolve to the
    /// lowest one.
    pub fn interface(&self, if_index: u32) -> Option<&InterfaceRow> {
        if if_index == 0 {
            return None;
        }
        self.interfaces.iter().filter(|i| i.if_index == if_index).min()
    }

    /// Interface name for an ifIndex, falling back to the description
    pub fn interface_name(&self, if_index: u32) -> String {
        self.interface(if_index)
            .map(|i| {
                if i.if_name.trim().is_empty() {
                    i.if_descr.trim().to_string()
                } else {
                    i.if_name.trim().to_string()
                }
            })
            .unwrap_or_default()
    }
}

/// ifTable/ifXTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceRow {
    pub if_index: u32,
    pub if_name: String,
    pub if_descr: String,
    pub if_alias: String,
    /// ifPhysAddress, any MAC encoding
    pub phys_address: String,
}

/// lldpLocalSystemData plus the lldpLocPortTable
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct LldpLocal {
    pub chassis_id: String,
    pub chassis_id_subtype: String,
    pub sys_name: String,
    pub ports: Vec<LldpLocalPort>,
}

/// lldpLocPortTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct LldpLocalPort {
    pub port_num: u32,
    pub port_id: String,
    pub port_id_subtype: String,
    pub port_descr: String,
    /// Resolved ifIndex when the agent exposes the mapping
    pub if_index: u32,
}

/// lldpRemTable row joined with lldpRemManAddrTable
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct LldpRemoteRow {
    pub local_port_num: u32,
    pub chassis_id: String,
    pub chassis_id_subtype: String,
    pub port_id: String,
    pub port_id_subtype: String,
    pub port_descr: String,
    pub sys_name: String,
    pub management_address: String,
}

/// cdpCacheTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpRemoteRow {
    pub local_if_index: u32,
    pub local_if_name: String,
    pub device_id: String,
    pub device_port: String,
    pub address: String,
    pub platform: String,
}

/// dot1dBasePortTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgePortRow {
    pub base_port: u32,
    pub if_index: u32,
}

/// dot1dTpFdbTable / dot1qTpFdbTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct FdbRow {
    pub mac: String,
    pub bridge_port: u32,
    /// Direct ifIndex when the collector already resolved it
    pub if_index: u32,
    pub status: String,
    pub vlan: u32,
}

/// ipNetToMedia / ipNetToPhysical row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpRow {
    pub ip: String,
    pub mac: String,
    pub if_index: u32,
    pub if_name: String,
    pub state: String,
    pub address_type: String,
    /// `arp` or `nd`; inferred from the address family when empty
    pub protocol: String,
}

/// ospfIfTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfInterfaceRow {
    pub ip: String,
    pub address_less_index: u32,
    pub if_index: u32,
    pub area: String,
    pub netmask: String,
}

/// ospfNbrTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfNeighborRow {
    pub router_id: String,
    pub ip: String,
    pub address_less_index: u32,
    pub state: String,
}

/// isisCircTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct IsisCircuitRow {
    pub circuit_index: u32,
    pub if_index: u32,
    pub admin_state: String,
}

/// isisISAdjTable row
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct IsisAdjacencyRow {
    pub circuit_index: u32,
    pub adj_index: u32,
    pub state: String,
    pub neighbor_sys_id: String,
    pub neighbor_snpa: String,
    pub neighbor_sys_type: String,
}

/// Which L2 protocol families a build consumes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolToggles {
    pub lldp: bool,
    pub cdp: bool,
    pub fdb: bool,
    pub arp_nd: bool,
    pub bridge_domains: bool,
}

impl ProtocolToggles {
    /// LLDP and CDP only
    pub const NEIGHBOR_DEFAULT: ProtocolToggles = ProtocolToggles {
        lldp: true,
        cdp: true,
        fdb: false,
        arp_nd: false,
        bridge_domains: false,
    };

    /// Everything enabled
    pub const ALL: ProtocolToggles = ProtocolToggles {
        lldp: true,
        cdp: true,
        fdb: true,
        arp_nd: true,
        bridge_domains: true,
    };

    pub fn any(&self) -> bool {
        self.lldp || self.cdp || self.fdb || self.arp_nd || self.bridge_domains
    }

    /// Applies the LLDP+CDP default when nothing is set. Bridge domains are
    /// built from FDB attachments, so they pull FDB extraction in.
    pub fn effective(self) -> ProtocolToggles {
        let mut toggles = if self.any() {
            self
        } else {
            Self::NEIGHBOR_DEFAULT
        };
        if toggles.bridge_domains {
            toggles.fdb = true;
        }
        toggles
    }
}
