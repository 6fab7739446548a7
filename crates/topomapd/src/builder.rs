//! Deduplicating accumulator for one discovery run
//!
//! Every collection is keyed by its uniqueness key in a `BTreeMap`, so the
//! first insertion wins and [`TopologyBuilder::finish`] emits each list
//! already sorted.

use crate::error::{Result, TopomapError};
use crate::model::{
    Adjacency, AdjacencyKey, Attachment, AttachmentKey, Device, EndpointId, Enrichment, Interface,
    Protocol, TopologyResult,
};
use crate::types::{DeviceObservation, InterfaceRow};
use chrono::{DateTime, Utc};
use sonic_topo_types::{canonical_chassis, canonical_ip};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct TopologyBuilder {
    devices: BTreeMap<String, Device>,
    interfaces: BTreeMap<(String, u32), Interface>,
    adjacencies: BTreeMap<AdjacencyKey, Adjacency>,
    attachments: BTreeMap<AttachmentKey, Attachment>,
    enrichments: BTreeMap<EndpointId, Enrichment>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the observed device and its interfaces.
    pub fn add_observation(&mut self, obs: &DeviceObservation) {
        let device_id = obs.device_id.trim();
        let mut device = Device::new(device_id);
        device.hostname = obs.hostname.trim().to_string();
        device.sys_object_id = obs.sys_object_id.trim().to_string();
        device.chassis_id = canonical_chassis(&obs.chassis_id);
        device.management_addresses = obs
            .management_addresses
            .iter()
            .filter_map(|addr| canonical_ip(addr))
            .collect();
        device.labels = obs.labels.clone();
        self.merge_device(device);

        let mut rows: Vec<&InterfaceRow> =
            obs.interfaces.iter().filter(|i| i.if_index > 0).collect();
        rows.sort();
        for row in rows {
            let name = if row.if_name.trim().is_empty() {
                row.if_descr.trim()
            } else {
                row.if_name.trim()
            };
            let description = if row.if_alias.trim().is_empty() {
                row.if_descr.trim()
            } else {
                row.if_alias.trim()
            };
            self.interfaces
                .entry((device_id.to_string(), row.if_index))
                .or_insert_with(|| Interface {
                    device_id: device_id.to_string(),
                    if_index: row.if_index,
                    name: name.to_string(),
                    description: description.to_string(),
                });
        }
    }

    /// Creates the device or enriches the existing one.
    pub fn merge_device(&mut self, device: Device) {
        if device.id.is_empty() {
            return;
        }
        match self.devices.get_mut(&device.id) {
            Some(existing) => existing.enrich(&device),
            None => {
                self.devices.insert(device.id.clone(), device);
            }
        }
    }

    pub fn has_device(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Returns false for duplicates and self-loops.
    pub fn add_adjacency(&mut self, adjacency: Adjacency) -> bool {
        if adjacency.is_self_loop() {
            debug!(
                device = %adjacency.source_device_id,
                port = %adjacency.source_port,
                "dropping self adjacency"
            );
            return false;
        }
        let key = adjacency.key();
        if self.adjacencies.contains_key(&key) {
            return false;
        }
        self.adjacencies.insert(key, adjacency);
        true
    }

    pub fn add_attachment(&mut self, attachment: Attachment) -> bool {
        let key = attachment.key();
        if self.attachments.contains_key(&key) {
            return false;
        }
        self.attachments.insert(key, attachment);
        true
    }

    pub fn add_enrichment(&mut self, enrichment: Enrichment) {
        match self.enrichments.get_mut(&enrichment.endpoint_id) {
            Some(existing) => existing.absorb(&enrichment),
            None => {
                self.enrichments
                    .insert(enrichment.endpoint_id.clone(), enrichment);
            }
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn adjacency_count(&self) -> usize {
        self.adjacencies.len()
    }

    pub fn adjacency_count_for(&self, protocol: Protocol) -> usize {
        self.adjacencies.keys().filter(|k| k.0 == protocol).count()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn attachment_count_for(&self, method: &str) -> usize {
        self.attachments.keys().filter(|k| k.3 == method).count()
    }

    pub fn enrichment_count(&self) -> usize {
        self.enrichments.len()
    }

    /// Enrichments whose protocols include one of `protocols`
    pub fn enrichment_count_for(&self, protocols: &[&str]) -> usize {
        self.enrichments
            .values()
            .filter(|e| protocols.iter().any(|p| e.protocols.contains(*p)))
            .count()
    }

    /// Distinct endpoint IDs across attachments and enrichments
    pub fn endpoint_count(&self) -> usize {
        let mut endpoints: BTreeSet<&EndpointId> = self.attachments.keys().map(|k| &k.2).collect();
        endpoints.extend(self.enrichments.keys());
        endpoints.len()
    }

    pub fn finish(
        self,
        collected_at: DateTime<Utc>,
        stats: BTreeMap<String, u64>,
    ) -> TopologyResult {
        TopologyResult {
            collected_at,
            devices: self.devices.into_values().collect(),
            interfaces: self.interfaces.into_values().collect(),
            adjacencies: self.adjacencies.into_values().collect(),
            attachments: self.attachments.into_values().collect(),
            enrichments: self.enrichments.into_values().collect(),
            bridge_domains: Vec::new(),
            ospf_pairs: Vec::new(),
            isis_pairs: Vec::new(),
            stats,
        }
    }
}

/// Rejects an empty set or any observation without a device ID, then sorts
/// by device ID.
///
/// NIST: SI-10 - Input validation at the build boundary
pub fn validated_observations(
    observations: &[DeviceObservation],
) -> Result<Vec<&DeviceObservation>> {
    if observations.is_empty() {
        return Err(TopomapError::EmptyInput);
    }
    if let Some(index) = observations
        .iter()
        .position(|o| o.device_id.trim().is_empty())
    {
        return Err(TopomapError::MissingDeviceId { index });
    }
    Ok(sorted_observations(observations.iter()))
}

/// Sorts by device ID; duplicates fall back to hostname, chassis,
/// collection time and finally the whole record, so the order never depends
/// on the input order.
pub fn sorted_observations<'a>(
    observations: impl Iterator<Item = &'a DeviceObservation>,
) -> Vec<&'a DeviceObservation> {
    let mut sorted: Vec<&DeviceObservation> = observations.collect();
    sorted.sort_by(|a, b| {
        (a.device_id.trim(), &a.hostname, &a.chassis_id, a.collected_at)
            .cmp(&(b.device_id.trim(), &b.hostname, &b.chassis_id, b.collected_at))
            .then_with(|| a.cmp(b))
    });
    sorted
}

/// Latest observation timestamp, or the Unix epoch when none carries one
pub fn collected_at(observations: &[&DeviceObservation]) -> DateTime<Utc> {
    observations
        .iter()
        .filter_map(|o| o.collected_at)
        .max()
        .unwrap_or_default()
}
