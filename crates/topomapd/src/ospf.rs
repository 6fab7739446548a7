//! OSPF neighbor binding and link pairing

use crate::matching::{DirectedLink, LinkPair, PairState};
use crate::model::Labels;
use crate::types::{DeviceObservation, OspfInterfaceRow, OspfNeighborRow};
use serde::{Deserialize, Serialize};
use sonic_topo_types::{
    canonical_ip, composite_key, is_unspecified_ip, parse_ip, same_network, Netmask,
};
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

pub const IP_PASS: &str = "ip";
pub const UNNUMBERED_PASS: &str = "unnumbered";

/// One device's view of one OSPF neighbor relationship
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfLinkObservation {
    pub device_id: String,
    pub router_id: String,
    /// Empty when the neighbor did not bind to a numbered interface
    pub local_ip: String,
    pub local_address_less_index: u32,
    pub local_if_index: u32,
    pub local_port: String,
    pub area: String,
    pub netmask: String,
    pub remote_router_id: String,
    pub remote_ip: String,
    pub remote_address_less_index: u32,
    pub state: String,
    /// Device owning `remote_router_id`, or a synthetic `ospf-` ID
    pub target_device_id: String,
}

impl OspfLinkObservation {
    fn is_numbered(&self) -> bool {
        !self.local_ip.is_empty() && !self.remote_ip.is_empty()
    }

    fn is_unnumbered(&self) -> bool {
        self.local_ip.is_empty()
            && self.remote_ip.is_empty()
            && self.local_address_less_index > 0
            && !self.router_id.is_empty()
            && !self.remote_router_id.is_empty()
    }
}

impl DirectedLink for OspfLinkObservation {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn local_port(&self) -> String {
        self.local_port.clone()
    }

    fn unpaired_target(&self) -> Option<(String, String)> {
        Some((self.target_device_id.clone(), self.remote_ip.clone()))
    }

    fn labels(&self) -> Labels {
        let mut labels = Labels::new();
        for (key, value) in [
            ("router_id", &self.router_id),
            ("local_ip", &self.local_ip),
            ("remote_router_id", &self.remote_router_id),
            ("remote_ip", &self.remote_ip),
            ("area", &self.area),
            ("state", &self.state),
        ] {
            if !value.is_empty() {
                labels.insert(key.to_string(), value.clone());
            }
        }
        labels
    }
}

/// Both directions of one verified OSPF adjacency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfLinkPair {
    pub a: OspfLinkObservation,
    pub b: OspfLinkObservation,
    pub pass: String,
}

impl OspfLinkPair {
    /// `(local, remote)` as seen by `device_id`
    pub fn perspective(
        &self,
        device_id: &str,
    ) -> Option<(&OspfLinkObservation, &OspfLinkObservation)> {
        if self.a.device_id == device_id {
            Some((&self.a, &self.b))
        } else if self.b.device_id == device_id {
            Some((&self.b, &self.a))
        } else {
            None
        }
    }
}

fn canonical_router_id(raw: &str) -> String {
    canonical_ip(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Synthetic device for a router ID no observation owns
pub fn synthetic_device_id(router_id: &str) -> String {
    format!("ospf-{}", router_id)
}

struct LocalInterface<'a> {
    ip: Option<IpAddr>,
    mask: Option<Netmask>,
    row: &'a OspfInterfaceRow,
}

/// Binds every neighbor row of one device to a local interface.
/// `owners` maps canonical router IDs to observed devices.
pub fn collect_links(
    obs: &DeviceObservation,
    owners: &BTreeMap<String, String>,
) -> Vec<OspfLinkObservation> {
    let device_id = obs.device_id.trim();
    let router_id = canonical_router_id(&obs.ospf_router_id);

    let mut interfaces: Vec<LocalInterface<'_>> = obs
        .ospf_interfaces
        .iter()
        .map(|row| LocalInterface {
            ip: parse_ip(&row.ip).ok().filter(|ip| !ip.is_unspecified()),
            mask: row.netmask.parse().ok(),
            row,
        })
        .collect();
    interfaces.sort_by(|a, b| {
        (a.ip, a.row.address_less_index, a.row.if_index)
            .cmp(&(b.ip, b.row.address_less_index, b.row.if_index))
            .then_with(|| a.row.cmp(b.row))
    });

    let mut neighbors: Vec<&OspfNeighborRow> = obs.ospf_neighbors.iter().collect();
    neighbors.sort_by(|a, b| {
        (&a.router_id, &a.ip, a.address_less_index)
            .cmp(&(&b.router_id, &b.ip, b.address_less_index))
            .then_with(|| a.cmp(b))
    });

    let mut links = Vec::with_capacity(neighbors.len());
    for neighbor in neighbors {
        let remote_router_id = canonical_router_id(&neighbor.router_id);
        let remote_ip = parse_ip(&neighbor.ip).ok().filter(|ip| !ip.is_unspecified());
        if remote_router_id.is_empty() && remote_ip.is_none() {
            debug!(device = %device_id, "dropping OSPF neighbor without router id or address");
            continue;
        }

        let bound = match remote_ip {
            None if neighbor.address_less_index > 0 => interfaces.iter().find(|i| {
                i.ip.is_none() && i.row.address_less_index > 0 && is_unspecified_ip(&i.row.ip)
            }),
            Some(remote) => interfaces.iter().find(|i| match (i.ip, i.mask) {
                (Some(local), Some(mask)) => same_network(local, remote, mask),
                _ => false,
            }),
            None => None,
        };
        if bound.is_none() {
            debug!(
                device = %device_id,
                neighbor = %remote_router_id,
                "OSPF neighbor bound to no local interface"
            );
        }

        let local_ip = bound.and_then(|i| i.ip).map(|ip| ip.to_string()).unwrap_or_default();
        let local_if_index = bound.map(|i| i.row.if_index).unwrap_or(0);
        let local_address_less_index = bound.map(|i| i.row.address_less_index).unwrap_or(0);
        let mut local_port = obs.interface_name(local_if_index);
        if local_port.is_empty() {
            local_port = if !local_ip.is_empty() {
                local_ip.clone()
            } else if local_address_less_index > 0 {
                format!("unnumbered-{}", local_address_less_index)
            } else {
                String::new()
            };
        }

        let remote_ip = remote_ip.map(|ip| ip.to_string()).unwrap_or_default();
        let owner_key = if remote_router_id.is_empty() { &remote_ip } else { &remote_router_id };
        let target_device_id = owners
            .get(owner_key)
            .cloned()
            .unwrap_or_else(|| synthetic_device_id(owner_key));

        links.push(OspfLinkObservation {
            device_id: device_id.to_string(),
            router_id: router_id.clone(),
            local_ip,
            local_address_less_index,
            local_if_index,
            local_port,
            area: bound.map(|i| i.row.area.trim().to_string()).unwrap_or_default(),
            netmask: bound.and_then(|i| i.mask).map(|m| m.to_string()).unwrap_or_default(),
            remote_router_id,
            remote_ip,
            remote_address_less_index: neighbor.address_less_index,
            state: neighbor.state.trim().to_string(),
            target_device_id,
        });
    }
    links
}

/// Numbered links pair on reversed addresses; address-less links then pair
/// on reversed router IDs.
pub fn match_links(links: &[OspfLinkObservation]) -> Vec<LinkPair> {
    let mut state = PairState::new(links.len());
    let by_ip = state.run_pass(
        links,
        IP_PASS,
        |l| vec![composite_key(&[l.local_ip.as_str(), l.remote_ip.as_str()])],
        |l| vec![composite_key(&[l.remote_ip.as_str(), l.local_ip.as_str()])],
        OspfLinkObservation::is_numbered,
        |a, b| a.device_id != b.device_id,
    );
    let by_router = state.run_pass(
        links,
        UNNUMBERED_PASS,
        |l| vec![composite_key(&[l.router_id.as_str(), l.remote_router_id.as_str()])],
        |l| vec![composite_key(&[l.remote_router_id.as_str(), l.router_id.as_str()])],
        OspfLinkObservation::is_unnumbered,
        |a, b| a.device_id != b.device_id,
    );
    debug!(by_ip, by_router, "OSPF pairing complete");
    state.into_pairs()
}

pub fn to_link_pairs(links: &[OspfLinkObservation], pairs: &[LinkPair]) -> Vec<OspfLinkPair> {
    pairs
        .iter()
        .map(|p| OspfLinkPair {
            a: links[p.source].clone(),
            b: links[p.target].clone(),
            pass: p.pass.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn router(
        id: &str,
        rid: &str,
        local: &str,
        peer_rid: &str,
        peer_ip: &str,
    ) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            ospf_router_id: rid.to_string(),
            ospf_interfaces: vec![OspfInterfaceRow {
                ip: local.to_string(),
                if_index: 5,
                area: "0.0.0.0".to_string(),
                netmask: "255.255.255.252".to_string(),
                ..Default::default()
            }],
            ospf_neighbors: vec![OspfNeighborRow {
                router_id: peer_rid.to_string(),
                ip: peer_ip.to_string(),
                state: "full".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_neighbor_binds_to_same_subnet() {
        let r1 = router("r1", "1.1.1.1", "10.0.0.1", "2.2.2.2", "10.0.0.2");
        let links = collect_links(&r1, &BTreeMap::new());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].local_ip, "10.0.0.1");
        assert_eq!(links[0].local_port, "10.0.0.1");
        assert_eq!(links[0].netmask, "/30");
        assert_eq!(links[0].target_device_id, "ospf-2.2.2.2");
    }

    #[test]
    fn test_out_of_subnet_neighbor_still_links() {
        let r1 = router("r1", "1.1.1.1", "10.0.0.1", "2.2.2.2", "10.9.0.2");
        let links = collect_links(&r1, &BTreeMap::new());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].local_ip, "");
        assert!(match_links(&links).is_empty());
    }

    #[test]
    fn test_reversed_addresses_pair() {
        let owners = BTreeMap::from([
            ("1.1.1.1".to_string(), "r1".to_string()),
            ("2.2.2.2".to_string(), "r2".to_string()),
        ]);
        let r1 = router("r1", "1.1.1.1", "10.0.0.1", "2.2.2.2", "10.0.0.2");
        let r2 = router("r2", "2.2.2.2", "10.0.0.2", "1.1.1.1", "10.0.0.1");
        let mut links = collect_links(&r1, &owners);
        links.extend(collect_links(&r2, &owners));
        assert_eq!(links[0].target_device_id, "r2");

        let pairs = to_link_pairs(&links, &match_links(&links));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pass, IP_PASS);
        let (local, remote) = pairs[0].perspective("r2").unwrap();
        assert_eq!(local.local_ip, "10.0.0.2");
        assert_eq!(remote.device_id, "r1");
        assert!(pairs[0].perspective("r3").is_none());
    }

    #[test]
    fn test_unnumbered_pair_on_router_ids() {
        let unnumbered = |id: &str, rid: &str, peer: &str| DeviceObservation {
            device_id: id.to_string(),
            ospf_router_id: rid.to_string(),
            ospf_interfaces: vec![OspfInterfaceRow {
                ip: "0.0.0.0".to_string(),
                address_less_index: 12,
                if_index: 12,
                ..Default::default()
            }],
            ospf_neighbors: vec![OspfNeighborRow {
                router_id: peer.to_string(),
                ip: "0.0.0.0".to_string(),
                address_less_index: 12,
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut links = collect_links(&unnumbered("r1", "1.1.1.1", "2.2.2.2"), &BTreeMap::new());
        links.extend(collect_links(&unnumbered("r2", "2.2.2.2", "1.1.1.1"), &BTreeMap::new()));
        assert_eq!(links[0].local_port, "unnumbered-12");

        let pairs = match_links(&links);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pass, UNNUMBERED_PASS);
    }
}
