//! CDP link extraction and single-pass pairing
//!
//! cdpCacheDeviceId is stable (hostname or serial), so a mirrored
//! (port, interface, device) tuple is enough; no fallback passes.

use crate::identity::{IdentityIndex, RemoteIdentity};
use crate::matching::{DirectedLink, LinkPair, PairState};
use crate::model::{Device, Labels};
use crate::types::{CdpRemoteRow, DeviceObservation};
use sonic_topo_types::{canonical_hostname, canonical_ip, composite_key};
use tracing::debug;

pub const CDP_PASS: &str = "default";

/// One unidirectional CDP neighbor relation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdpLink {
    pub device_id: String,
    pub local_if_index: u32,
    pub local_if_name: String,
    /// This device's own cdpGlobalDeviceId, canonicalized
    pub local_global_id: String,
    /// cdpCacheDeviceId, canonicalized
    pub remote_device_id: String,
    pub remote_port: String,
    pub remote_address: String,
    pub remote_platform: String,
    pub target_device_id: String,
}

impl CdpLink {
    fn index_key(&self) -> Option<String> {
        cdp_key([
            &self.local_if_name,
            &self.remote_port,
            &self.remote_device_id,
            &self.local_global_id,
        ])
    }

    fn query_key(&self) -> Option<String> {
        cdp_key([
            &self.remote_port,
            &self.local_if_name,
            &self.local_global_id,
            &self.remote_device_id,
        ])
    }

    pub fn is_self_loop(&self) -> bool {
        !self.local_global_id.is_empty() && self.local_global_id == self.remote_device_id
    }

    pub fn remote_device(&self) -> Device {
        let mut device = Device::new(self.target_device_id.clone());
        device.hostname = self.remote_device_id.clone();
        if !self.remote_address.is_empty() {
            device.management_addresses.insert(self.remote_address.clone());
        }
        if !self.remote_platform.is_empty() {
            device
                .labels
                .insert("cdp_platform".to_string(), self.remote_platform.clone());
        }
        device
    }
}

fn cdp_key(fields: [&String; 4]) -> Option<String> {
    if fields.iter().any(|f| f.is_empty()) {
        return None;
    }
    let lowered: Vec<String> = fields.iter().map(|f| f.to_ascii_lowercase()).collect();
    let parts: Vec<&str> = lowered.iter().map(String::as_str).collect();
    Some(composite_key(&parts))
}

impl DirectedLink for CdpLink {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn local_port(&self) -> String {
        self.local_if_name.clone()
    }

    fn unpaired_target(&self) -> Option<(String, String)> {
        Some((self.target_device_id.clone(), self.remote_port.clone()))
    }

    fn labels(&self) -> Labels {
        let mut labels = Labels::new();
        labels.insert("remote_device_id".to_string(), self.remote_device_id.clone());
        if !self.remote_address.is_empty() {
            labels.insert("remote_address".to_string(), self.remote_address.clone());
        }
        if !self.remote_platform.is_empty() {
            labels.insert("remote_platform".to_string(), self.remote_platform.clone());
        }
        labels
    }
}

fn local_interface_name(obs: &DeviceObservation, row: &CdpRemoteRow) -> String {
    let named = row.local_if_name.trim();
    if !named.is_empty() {
        return named.to_string();
    }
    match obs.interface(row.local_if_index) {
        Some(intf) if !intf.if_descr.trim().is_empty() => intf.if_descr.trim().to_string(),
        Some(intf) => intf.if_name.trim().to_string(),
        None => String::new(),
    }
}

pub fn collect_links(obs: &DeviceObservation, index: &mut IdentityIndex) -> Vec<CdpLink> {
    let device_id = obs.device_id.trim().to_string();
    let local_global_id = if obs.cdp_global_device_id.trim().is_empty() {
        canonical_hostname(&obs.hostname)
    } else {
        canonical_hostname(&obs.cdp_global_device_id)
    };

    let mut rows: Vec<&CdpRemoteRow> = obs.cdp_remotes.iter().collect();
    rows.sort_by(|a, b| {
        (a.local_if_index, &a.local_if_name, &a.device_id, &a.device_port)
            .cmp(&(b.local_if_index, &b.local_if_name, &b.device_id, &b.device_port))
            .then_with(|| a.cmp(b))
    });

    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
        let remote_device_id = canonical_hostname(&row.device_id);
        if remote_device_id.is_empty() {
            debug!(
                device = %device_id,
                if_index = row.local_if_index,
                "dropping CDP row without device id"
            );
            continue;
        }
        let remote_address = canonical_ip(&row.address).unwrap_or_default();
        let remote = RemoteIdentity::from_canonical(
            remote_device_id.clone(),
            String::new(),
            remote_address.clone(),
        );
        let target_device_id = index.resolve_remote(&remote);

        links.push(CdpLink {
            device_id: device_id.clone(),
            local_if_index: row.local_if_index,
            local_if_name: local_interface_name(obs, row),
            local_global_id: local_global_id.clone(),
            remote_device_id,
            remote_port: row.device_port.trim().to_string(),
            remote_address,
            remote_platform: row.platform.trim().to_string(),
            target_device_id,
        });
    }
    links
}

pub fn match_links(links: &[CdpLink]) -> Vec<LinkPair> {
    let mut state = PairState::new(links.len());
    let matched = state.run_pass(
        links,
        CDP_PASS,
        |l| l.index_key().into_iter().collect(),
        |l| l.query_key().into_iter().collect(),
        |l| !l.is_self_loop(),
        |a, b| a.device_id != b.device_id,
    );
    debug!(matched, "CDP match pass complete");
    state.into_pairs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InterfaceRow;
    use pretty_assertions::assert_eq;

    fn switch(
        id: &str,
        global: &str,
        if_name: &str,
        peer: &str,
        peer_port: &str,
    ) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            cdp_global_device_id: global.to_string(),
            interfaces: vec![InterfaceRow {
                if_index: 10,
                if_descr: if_name.to_string(),
                ..Default::default()
            }],
            cdp_remotes: vec![CdpRemoteRow {
                local_if_index: 10,
                device_id: peer.to_string(),
                device_port: peer_port.to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_mirrored_rows_pair() {
        let a = switch("a", "SW-A", "Gi0/1", "sw-b", "Gi0/2");
        let b = switch("b", "SW-B", "Gi0/2", "SW-A", "gi0/1");
        let mut index = IdentityIndex::new();
        let mut links = collect_links(&a, &mut index);
        links.extend(collect_links(&b, &mut index));
        assert_eq!(links[0].local_if_name, "Gi0/1");

        let pairs = match_links(&links);
        assert_eq!(
            pairs,
            vec![LinkPair {
                source: 0,
                target: 1,
                pass: CDP_PASS
            }]
        );
    }

    #[test]
    fn test_wrong_port_does_not_pair() {
        let a = switch("a", "SW-A", "Gi0/1", "sw-b", "Gi0/3");
        let b = switch("b", "SW-B", "Gi0/2", "SW-A", "Gi0/1");
        let mut index = IdentityIndex::new();
        let mut links = collect_links(&a, &mut index);
        links.extend(collect_links(&b, &mut index));
        assert!(match_links(&links).is_empty());
    }

    #[test]
    fn test_row_order_does_not_change_links() {
        let mut a = switch("a", "SW-A", "Gi0/1", "sw-b", "Gi0/2");
        let mut second = a.cdp_remotes[0].clone();
        a.cdp_remotes[0].address = "10.0.0.2".to_string();
        a.cdp_remotes[0].platform = "WS-C3750".to_string();
        second.address = "10.0.0.1".to_string();
        second.platform = "N9K-C93180".to_string();
        a.cdp_remotes.push(second);

        let forward = collect_links(&a, &mut IdentityIndex::new());
        a.cdp_remotes.reverse();
        let reversed = collect_links(&a, &mut IdentityIndex::new());
        assert_eq!(forward, reversed);
        assert_eq!(forward[0].remote_address, "10.0.0.1");
        assert_eq!(forward[0].remote_platform, "N9K-C93180");
    }

    #[test]
    fn test_row_without_device_id_dropped() {
        let a = switch("a", "SW-A", "Gi0/1", " ", "Gi0/3");
        let mut index = IdentityIndex::new();
        assert!(collect_links(&a, &mut index).is_empty());
    }
}
