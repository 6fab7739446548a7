//! Identity index: hostname / chassis / management IP to device ID
//!
//! Built once per L2 run from every observation, then grown as remote
//! neighbors are resolved so that repeated references to the same unknown
//! remote converge onto one synthetic device ID.

use crate::types::DeviceObservation;
use sonic_topo_types::{canonical_chassis, canonical_hex_token, canonical_hostname, canonical_ip};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct IndexEntry {
    device_id: String,
    /// false for IDs synthesized from a remote advertisement
    known: bool,
}

/// Canonical identity keys of one remote advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub hostname: String,
    pub chassis: String,
    pub ip: String,
}

impl RemoteIdentity {
    /// Canonicalizes raw advertised values.
    pub fn new(hostname: &str, chassis: &str, ip: &str) -> Self {
        RemoteIdentity {
            hostname: canonical_hostname(hostname),
            chassis: canonical_chassis(chassis),
            ip: canonical_ip(ip).unwrap_or_default(),
        }
    }

    /// Takes already-canonical keys as they are.
    pub fn from_canonical(hostname: String, chassis: String, ip: String) -> Self {
        RemoteIdentity {
            hostname,
            chassis,
            ip,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hostname.is_empty() && self.chassis.is_empty() && self.ip.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_hostname: HashMap<String, IndexEntry>,
    by_chassis: HashMap<String, IndexEntry>,
    by_ip: HashMap<String, IndexEntry>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every observed device under its hostname, LLDP sysName, CDP
    /// global ID, chassis IDs and management addresses. Observations must be
    /// pre-sorted; the first device to claim a key keeps it.
    pub fn from_observations(observations: &[&DeviceObservation]) -> Self {
        let mut index = Self::new();
        for obs in observations {
            let id = obs.device_id.trim();
            for name in [
                obs.hostname.as_str(),
                obs.lldp_local.sys_name.as_str(),
                obs.cdp_global_device_id.as_str(),
            ] {
                index.insert_hostname(name, id, true);
            }
            for chassis in [obs.chassis_id.as_str(), obs.lldp_local.chassis_id.as_str()] {
                index.insert_chassis(chassis, id, true);
            }
            for addr in &obs.management_addresses {
                index.insert_ip(addr, id, true);
            }
        }
        index
    }

    fn insert_hostname(&mut self, raw: &str, device_id: &str, known: bool) {
        insert(&mut self.by_hostname, canonical_hostname(raw), device_id, known);
    }

    fn insert_chassis(&mut self, raw: &str, device_id: &str, known: bool) {
        insert(&mut self.by_chassis, canonical_chassis(raw), device_id, known);
    }

    fn insert_ip(&mut self, raw: &str, device_id: &str, known: bool) {
        if let Some(ip) = canonical_ip(raw) {
            insert(&mut self.by_ip, ip, device_id, known);
        }
    }

    fn lookup(&self, remote: &RemoteIdentity) -> Option<&IndexEntry> {
        [
            (&self.by_hostname, &remote.hostname),
            (&self.by_chassis, &remote.chassis),
            (&self.by_ip, &remote.ip),
        ]
        .into_iter()
        .filter(|(_, key)| !key.is_empty())
        .find_map(|(map, key)| map.get(key.as_str()))
    }

    /// Resolves to an observed device only: hostname, then chassis, then IP.
    pub fn resolve_known(&self, remote: &RemoteIdentity) -> Option<String> {
        self.lookup(remote)
            .filter(|entry| entry.known)
            .map(|entry| entry.device_id.clone())
    }

    /// Resolves to an observed or previously synthesized device, deriving a
    /// new synthetic ID when nothing matches. Keys the remote carries that
    /// the index has not seen yet are recorded against the resolved ID.
    pub fn resolve_remote(&mut self, remote: &RemoteIdentity) -> String {
        let (device_id, known) = match self.lookup(remote) {
            Some(entry) => (entry.device_id.clone(), entry.known),
            None => {
                let derived = derive_remote_device_id(remote);
                debug!(device = %derived, "synthesized remote device id");
                (derived, false)
            }
        };

        insert(&mut self.by_hostname, remote.hostname.clone(), &device_id, known);
        insert(&mut self.by_chassis, remote.chassis.clone(), &device_id, known);
        insert(&mut self.by_ip, remote.ip.clone(), &device_id, known);
        device_id
    }
}

fn insert(map: &mut HashMap<String, IndexEntry>, key: String, device_id: &str, known: bool) {
    if key.is_empty() || device_id.is_empty() {
        return;
    }
    map.entry(key).or_insert_with(|| IndexEntry {
        device_id: device_id.to_string(),
        known,
    });
}

/// Deterministic ID for a remote that matches no observed device:
/// hostname, else `chassis-<token>`, else `ip-<ip-with-dashes>`, else
/// `discovered-unknown`.
pub fn derive_remote_device_id(remote: &RemoteIdentity) -> String {
    if !remote.hostname.is_empty() {
        return remote.hostname.clone();
    }
    if !remote.chassis.is_empty() {
        let token = canonical_hex_token(&remote.chassis).unwrap_or_else(|| remote.chassis.clone());
        return format!("chassis-{}", token);
    }
    if !remote.ip.is_empty() {
        return format!("ip-{}", remote.ip.replace(['.', ':'], "-"));
    }
    "discovered-unknown".to_string()
}
