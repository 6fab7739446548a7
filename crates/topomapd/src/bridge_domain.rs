//! Broadcast-domain reconstruction
//!
//! Bridges are grouped under root devices by merging member sets on every
//! bridge-to-bridge record. Ports observed on the same logical port coalesce
//! into segments, and every segment is homed in the first domain whose
//! membership covers one of its devices.
//!
//! ```text
//!   root A ── seg(A|1, B|1) ── B ── seg(B|2, C|1) ── C
//!                                │
//!                                └── seg(B|5) + mac:0011..
//! ```

use crate::fdb::{FdbTable, FDB_METHOD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// One side of a bridge link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePort {
    pub device_id: String,
    pub bridge_port: u32,
    pub if_index: u32,
    pub if_name: String,
}

impl BridgePort {
    /// `device|port` using the best identifier available, or `None` when the
    /// port cannot be identified.
    pub fn key(&self) -> Option<String> {
        if self.device_id.is_empty() {
            return None;
        }
        let port = if self.bridge_port > 0 {
            self.bridge_port.to_string()
        } else if self.if_index > 0 {
            self.if_index.to_string()
        } else if !self.if_name.trim().is_empty() {
            self.if_name.trim().to_lowercase()
        } else {
            return None;
        };
        Some(format!("{}|{}", self.device_id, port))
    }

    /// Fills attributes this port is missing from another sighting
    fn backfill(&mut self, other: &BridgePort) {
        if self.bridge_port == 0 {
            self.bridge_port = other.bridge_port;
        }
        if self.if_index == 0 {
            self.if_index = other.if_index;
        }
        if self.if_name.is_empty() {
            self.if_name = other.if_name.clone();
        }
    }
}

/// Designated (root-facing) port on one bridge facing a port on another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeBridgeLink {
    pub designated: BridgePort,
    pub port: BridgePort,
}

/// A learned endpoint behind a bridge port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMacLink {
    pub port: BridgePort,
    pub mac: String,
    pub method: String,
}

#[derive(Debug, Clone)]
struct Segment {
    designated: BridgePort,
    ports: Vec<BridgePort>,
    macs: BTreeSet<String>,
    bridged: bool,
}

impl Segment {
    fn new(designated: BridgePort, bridged: bool) -> Self {
        Segment {
            ports: vec![designated.clone()],
            designated,
            macs: BTreeSet::new(),
            bridged,
        }
    }

    fn add_port(&mut self, port: &BridgePort) {
        let key = port.key();
        match self.ports.iter_mut().find(|p| p.key() == key) {
            Some(existing) => existing.backfill(port),
            None => self.ports.push(port.clone()),
        }
        if self.designated.key() == key {
            self.designated.backfill(port);
        }
    }

    fn device_ids(&self) -> BTreeSet<&str> {
        self.ports.iter().map(|p| p.device_id.as_str()).collect()
    }

    fn into_summary(mut self) -> SegmentSummary {
        self.ports
            .sort_by(|a, b| a.key().unwrap_or_default().cmp(&b.key().unwrap_or_default()));
        SegmentSummary {
            designated: self.designated,
            ports: self.ports,
            macs: self.macs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub designated: BridgePort,
    /// Every port on the segment, designated included, in key order
    pub ports: Vec<BridgePort>,
    pub macs: BTreeSet<String>,
}

impl SegmentSummary {
    fn sort_key(&self) -> (String, String) {
        let ports: Vec<String> = self.ports.iter().filter_map(BridgePort::key).collect();
        (self.designated.key().unwrap_or_default(), ports.join(","))
    }
}

/// One reconstructed broadcast domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeDomainSummary {
    pub root: String,
    /// Bridge devices, root included
    pub members: BTreeSet<String>,
    pub segments: Vec<SegmentSummary>,
}

impl BridgeDomainSummary {
    fn members_key(&self) -> String {
        self.members.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Root/member sets and segments under construction
#[derive(Debug, Default)]
pub struct BridgeDomainModel {
    /// root device -> members, root excluded
    roots: BTreeMap<String, BTreeSet<String>>,
    segments: Vec<Segment>,
    port_index: HashMap<String, usize>,
}

impl BridgeDomainModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn root_containing(&self, device: &str) -> Option<String> {
        self.roots
            .iter()
            .find(|(_, members)| members.contains(device))
            .map(|(root, _)| root.clone())
    }

    /// Places `subordinate` under `designated`, merging member sets eagerly.
    fn union(&mut self, designated: &str, subordinate: &str) {
        if designated == subordinate {
            return;
        }
        if self.roots.contains_key(designated) {
            let absorbed = self.roots.remove(subordinate);
            if let Some(members) = self.roots.get_mut(designated) {
                members.insert(subordinate.to_string());
                if let Some(absorbed) = absorbed {
                    members.extend(absorbed);
                }
                members.remove(designated);
            }
        } else if let Some(mut members) = self.roots.remove(subordinate) {
            members.insert(subordinate.to_string());
            // designated may itself sit under another root
            match self.root_containing(designated) {
                Some(upper) => {
                    if let Some(upper_members) = self.roots.get_mut(&upper) {
                        upper_members.extend(members);
                        upper_members.remove(&upper);
                    }
                }
                None => {
                    members.remove(designated);
                    self.roots.insert(designated.to_string(), members);
                }
            }
        } else if let Some(root) = self.root_containing(designated) {
            if let Some(members) = self.roots.get_mut(&root) {
                members.insert(subordinate.to_string());
                members.remove(&root);
            }
        } else {
            self.roots.insert(
                designated.to_string(),
                BTreeSet::from([subordinate.to_string()]),
            );
        }
    }

    pub fn add_bridge_link(&mut self, link: &BridgeBridgeLink) {
        let (Some(designated_key), Some(port_key)) = (link.designated.key(), link.port.key())
        else {
            debug!(
                designated = %link.designated.device_id,
                port = %link.port.device_id,
                "dropping bridge link without port identity"
            );
            return;
        };
        if link.designated.device_id == link.port.device_id {
            debug!(device = %link.port.device_id, "dropping bridge link to itself");
            return;
        }
        self.union(&link.designated.device_id, &link.port.device_id);

        let designated_idx = self.port_index.get(&designated_key).copied();
        let port_idx = self.port_index.get(&port_key).copied();
        let idx = match (designated_idx, port_idx) {
            (None, None) => {
                self.segments.push(Segment::new(link.designated.clone(), true));
                self.segments.len() - 1
            }
            (Some(keep), Some(other)) if keep != other => self.merge_segments(keep, other),
            (Some(idx), _) | (None, Some(idx)) => idx,
        };
        let segment = &mut self.segments[idx];
        segment.add_port(&link.designated);
        segment.add_port(&link.port);
        segment.bridged = true;
        self.port_index.insert(designated_key, idx);
        self.port_index.insert(port_key, idx);
    }

    /// Folds segment `other` into `keep` and returns the surviving index.
    /// Every port stays indexed to exactly one segment.
    fn merge_segments(&mut self, keep: usize, other: usize) -> usize {
        let absorbed = self.segments.swap_remove(other);
        // swap_remove moved the former last segment into `other`
        let moved_from = self.segments.len();
        let keep = if keep == moved_from { other } else { keep };
        for idx in self.port_index.values_mut() {
            if *idx == other {
                *idx = keep;
            } else if *idx == moved_from {
                *idx = other;
            }
        }

        let segment = &mut self.segments[keep];
        debug!(
            designated = ?segment.designated.key(),
            absorbed = ?absorbed.designated.key(),
            "merging segments joined by a bridge link"
        );
        for port in &absorbed.ports {
            segment.add_port(port);
        }
        segment.macs.extend(absorbed.macs);
        segment.bridged |= absorbed.bridged;
        keep
    }

    pub fn add_mac_link(&mut self, link: &BridgeMacLink) {
        let Some(port_key) = link.port.key() else {
            debug!(
                device = %link.port.device_id,
                mac = %link.mac,
                "dropping MAC link without port identity"
            );
            return;
        };
        if link.mac.is_empty() {
            return;
        }
        let idx = match self.port_index.get(&port_key).copied() {
            Some(idx) => {
                self.segments[idx].add_port(&link.port);
                idx
            }
            None => {
                self.segments.push(Segment::new(link.port.clone(), false));
                let idx = self.segments.len() - 1;
                self.port_index.insert(port_key, idx);
                idx
            }
        };
        self.segments[idx].macs.insert(link.mac.clone());
    }

    /// Materializes the domains in members order.
    pub fn into_domains(self) -> Vec<BridgeDomainSummary> {
        let mut domains: Vec<BridgeDomainSummary> = self
            .roots
            .into_iter()
            .map(|(root, mut members)| {
                members.insert(root.clone());
                BridgeDomainSummary {
                    root,
                    members,
                    segments: Vec::new(),
                }
            })
            .collect();

        for segment in self.segments {
            let devices = segment.device_ids();
            let home = domains
                .iter()
                .position(|d| devices.iter().any(|dev| d.members.contains(*dev)));
            match home {
                Some(idx) => domains[idx].segments.push(segment.into_summary()),
                None => {
                    if segment.bridged {
                        debug!(
                            designated = %segment.designated.device_id,
                            "bridged segment without a domain"
                        );
                    }
                    let root = segment.designated.device_id.clone();
                    domains.push(BridgeDomainSummary {
                        members: BTreeSet::from([root.clone()]),
                        root,
                        segments: vec![segment.into_summary()],
                    });
                }
            }
        }

        for domain in &mut domains {
            domain.segments.sort_by_cached_key(SegmentSummary::sort_key);
        }
        domains.sort_by_cached_key(BridgeDomainSummary::members_key);
        domains
    }
}

/// Runs every bridge-to-bridge record before any bridge-to-MAC record.
pub fn reconstruct(
    bridge_links: &[BridgeBridgeLink],
    mac_links: &[BridgeMacLink],
) -> Vec<BridgeDomainSummary> {
    let mut model = BridgeDomainModel::new();
    for link in bridge_links {
        model.add_bridge_link(link);
    }
    for link in mac_links {
        model.add_mac_link(link);
    }
    model.into_domains()
}

/// Derives link records from FDB tables. Two bridges that each learned one
/// of the other's MACs form a bridge-to-bridge record, designated on the
/// lower device ID; every other learned MAC is a bridge-to-MAC record.
pub fn derive_links(tables: &[FdbTable]) -> (Vec<BridgeBridgeLink>, Vec<BridgeMacLink>) {
    let mut owners: BTreeMap<_, &str> = BTreeMap::new();
    for table in tables {
        for mac in &table.owned_macs {
            owners.entry(*mac).or_insert(table.device_id.as_str());
        }
    }

    // (seen by, owner) -> port where the owner was learned
    let mut sightings: BTreeMap<(&str, &str), BridgePort> = BTreeMap::new();
    for table in tables {
        for learned in &table.learned {
            let Some(owner) = owners.get(&learned.mac).copied() else {
                continue;
            };
            if owner == table.device_id {
                continue;
            }
            sightings
                .entry((table.device_id.as_str(), owner))
                .or_insert_with(|| BridgePort {
                    device_id: table.device_id.clone(),
                    bridge_port: learned.bridge_port,
                    if_index: learned.if_index,
                    if_name: learned.if_name.clone(),
                });
        }
    }

    let mut bridge_links = Vec::new();
    let mut mutual: BTreeSet<(&str, &str)> = BTreeSet::new();
    for ((seen_by, owner), port) in &sightings {
        if seen_by >= owner {
            continue;
        }
        if let Some(reverse) = sightings.get(&(*owner, *seen_by)) {
            bridge_links.push(BridgeBridgeLink {
                designated: port.clone(),
                port: reverse.clone(),
            });
            mutual.insert((*seen_by, *owner));
            mutual.insert((*owner, *seen_by));
        }
    }

    let mut mac_links = Vec::new();
    for table in tables {
        for learned in &table.learned {
            let owner = owners.get(&learned.mac).copied();
            if owner.is_some_and(|o| mutual.contains(&(table.device_id.as_str(), o))) {
                continue;
            }
            mac_links.push(BridgeMacLink {
                port: BridgePort {
                    device_id: table.device_id.clone(),
                    bridge_port: learned.bridge_port,
                    if_index: learned.if_index,
                    if_name: learned.if_name.clone(),
                },
                mac: learned.mac.to_string(),
                method: FDB_METHOD.to_string(),
            });
        }
    }
    (bridge_links, mac_links)
}
