//! ARP/ND enrichment accumulation
//!
//! Rows from every device fold into one [`Enrichment`] per endpoint ID. After
//! all devices are in, [`EnrichmentSet::merge_ip_only_into_mac`] moves each
//! IP-only enrichment under the MAC enrichment that already claims one of its
//! addresses.

use crate::model::{EndpointId, Enrichment};
use crate::types::{ArpRow, DeviceObservation};
use sonic_topo_types::{parse_ip, MacAddress};
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

#[derive(Debug, Default)]
pub struct EnrichmentSet {
    by_endpoint: BTreeMap<EndpointId, Enrichment>,
}

impl EnrichmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_endpoint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_endpoint.is_empty()
    }

    /// Accumulates one device's ARP/ND rows.
    pub fn add_observation(&mut self, obs: &DeviceObservation) {
        let mut rows: Vec<&ArpRow> = obs.arp_entries.iter().collect();
        rows.sort_by(|a, b| {
            (a.if_index, &a.ip, &a.mac, &a.state)
                .cmp(&(b.if_index, &b.ip, &b.mac, &b.state))
                .then_with(|| a.cmp(b))
        });
        for row in rows {
            self.add_row(obs, row);
        }
    }

    fn add_row(&mut self, obs: &DeviceObservation, row: &ArpRow) {
        let device_id = obs.device_id.trim();
        let ip = parse_ip(&row.ip).ok();

        let mac = if row.mac.trim().is_empty() {
            None
        } else {
            match row.mac.parse::<MacAddress>() {
                Ok(mac) if mac.is_endpoint() => Some(mac),
                Ok(mac) => {
                    debug!(
                        device = %device_id,
                        mac = %mac,
                        ip = %row.ip,
                        "dropping non-endpoint ARP MAC"
                    );
                    return;
                }
                Err(_) => {
                    debug!(
                        device = %device_id,
                        mac = %row.mac,
                        "dropping ARP row with unparseable MAC"
                    );
                    return;
                }
            }
        };

        let endpoint_id = match (&mac, &ip) {
            (Some(mac), _) => EndpointId::from_mac(mac),
            (None, Some(ip)) => EndpointId::from_ip(ip),
            (None, None) => {
                debug!(device = %device_id, ip = %row.ip, "dropping ARP row without MAC or IP");
                return;
            }
        };

        let entry = self
            .by_endpoint
            .entry(endpoint_id.clone())
            .or_insert_with(|| Enrichment::new(endpoint_id));
        if let Some(mac) = mac {
            if entry.mac.is_empty() {
                entry.mac = mac.to_string();
            }
        }
        if let Some(ip) = ip {
            entry.ips.insert(ip.to_string());
        }
        if let Some(protocol) = row_protocol(row, ip) {
            entry.protocols.insert(protocol);
        }
        entry.device_ids.insert(device_id.to_string());
        if row.if_index > 0 {
            entry.if_indexes.insert(row.if_index);
        }
        let if_name = if row.if_name.trim().is_empty() {
            obs.interface_name(row.if_index)
        } else {
            row.if_name.trim().to_string()
        };
        if !if_name.is_empty() {
            entry.if_names.insert(if_name);
        }
        let state = row.state.trim();
        if !state.is_empty() {
            entry.states.insert(state.to_string());
        }
        match ip {
            Some(IpAddr::V4(_)) => {
                entry.address_types.insert("ipv4".to_string());
            }
            Some(IpAddr::V6(_)) => {
                entry.address_types.insert("ipv6".to_string());
            }
            None if !row.address_type.trim().is_empty() => {
                entry.address_types.insert(row.address_type.trim().to_string());
            }
            None => {}
        }
    }

    /// Folds every IP-only enrichment into the MAC enrichment owning one of
    /// its IPs. The first MAC endpoint (in ID order) to claim an IP owns it.
    /// Returns the number of enrichments folded away.
    pub fn merge_ip_only_into_mac(&mut self) -> usize {
        let mut owners: BTreeMap<String, EndpointId> = BTreeMap::new();
        for (id, enrichment) in self.by_endpoint.iter().filter(|(id, _)| id.is_mac()) {
            for ip in &enrichment.ips {
                owners.entry(ip.clone()).or_insert_with(|| id.clone());
            }
        }

        let ip_only: Vec<EndpointId> = self
            .by_endpoint
            .keys()
            .filter(|id| !id.is_mac())
            .cloned()
            .collect();

        let mut merged = 0;
        for id in ip_only {
            let owner = self.by_endpoint.get(&id).and_then(|enrichment| {
                enrichment.ips.iter().find_map(|ip| owners.get(ip).cloned())
            });
            let Some(owner) = owner else {
                continue;
            };
            if let Some(folded) = self.by_endpoint.remove(&id) {
                if let Some(target) = self.by_endpoint.get_mut(&owner) {
                    target.absorb(&folded);
                    merged += 1;
                }
            }
        }
        merged
    }

    /// Enrichments in endpoint ID order
    pub fn into_enrichments(self) -> Vec<Enrichment> {
        self.by_endpoint.into_values().collect()
    }
}

fn row_protocol(row: &ArpRow, ip: Option<IpAddr>) -> Option<String> {
    let declared = row.protocol.trim().to_ascii_lowercase();
    if !declared.is_empty() {
        return Some(declared);
    }
    match ip {
        Some(IpAddr::V4(_)) => Some("arp".to_string()),
        Some(IpAddr::V6(_)) => Some("nd".to_string()),
        None => None,
    }
}
