//! L3 discovery: OSPF and IS-IS adjacencies

use crate::builder::{collected_at, sorted_observations, TopologyBuilder};
use crate::error::{Result, TopomapError};
use crate::isis;
use crate::matching::emit_adjacencies;
use crate::model::{stats, Device, Protocol, TopologyResult};
use crate::ospf;
use crate::types::DeviceObservation;
use sonic_topo_types::{canonical_hex_token, canonical_ip};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

/// Builds the routing-protocol topology. Fails only on an empty set;
/// observations without a device ID are skipped.
#[instrument(skip_all, fields(observations = observations.len()))]
pub fn build_l3_result(observations: &[DeviceObservation]) -> Result<TopologyResult> {
    if observations.is_empty() {
        return Err(TopomapError::EmptyInput);
    }
    let sorted = sorted_observations(observations.iter().filter(|obs| {
        let keep = !obs.device_id.trim().is_empty();
        if !keep {
            debug!(hostname = %obs.hostname, "skipping observation without device id");
        }
        keep
    }));

    let mut builder = TopologyBuilder::new();
    let mut router_owners: BTreeMap<String, String> = BTreeMap::new();
    let mut system_owners: BTreeMap<String, String> = BTreeMap::new();
    for obs in &sorted {
        builder.add_observation(obs);
        let device_id = obs.device_id.trim().to_string();
        if let Some(router_id) = canonical_ip(&obs.ospf_router_id) {
            router_owners.entry(router_id).or_insert_with(|| device_id.clone());
        }
        if let Some(sys_id) = canonical_hex_token(&obs.isis_sys_id) {
            system_owners.entry(sys_id).or_insert(device_id);
        }
    }

    let mut ospf_links = Vec::new();
    for obs in &sorted {
        ospf_links.extend(ospf::collect_links(obs, &router_owners));
    }
    let ospf_matches = ospf::match_links(&ospf_links);
    let paired: BTreeSet<usize> = ospf_matches.iter().flat_map(|p| [p.source, p.target]).collect();
    for (idx, link) in ospf_links.iter().enumerate() {
        if paired.contains(&idx) || builder.has_device(&link.target_device_id) {
            continue;
        }
        let mut device = Device::new(link.target_device_id.clone());
        if !link.remote_router_id.is_empty() {
            device
                .labels
                .insert("ospf_router_id".to_string(), link.remote_router_id.clone());
        }
        builder.merge_device(device);
    }
    for adjacency in emit_adjacencies(Protocol::Ospf, &ospf_links, &ospf_matches) {
        builder.add_adjacency(adjacency);
    }
    let ospf_pairs = ospf::to_link_pairs(&ospf_links, &ospf_matches);

    let mut isis_links = Vec::new();
    for obs in &sorted {
        isis_links.extend(isis::collect_links(obs, &system_owners));
    }
    let isis_matches = isis::match_links(&isis_links);
    let paired: BTreeSet<usize> = isis_matches.iter().flat_map(|p| [p.source, p.target]).collect();
    for (idx, link) in isis_links.iter().enumerate() {
        if paired.contains(&idx) || builder.has_device(&link.target_device_id) {
            continue;
        }
        let mut device = Device::new(link.target_device_id.clone());
        device
            .labels
            .insert("isis_sys_id".to_string(), link.neighbor_sys_id.clone());
        builder.merge_device(device);
    }
    for adjacency in emit_adjacencies(Protocol::Isis, &isis_links, &isis_matches) {
        builder.add_adjacency(adjacency);
    }
    let isis_pairs = isis::to_link_pairs(&isis_links, &isis_matches);

    let mut counters = BTreeMap::new();
    counters.insert(stats::DEVICES_TOTAL.to_string(), builder.device_count() as u64);
    counters.insert(stats::LINKS_TOTAL.to_string(), builder.adjacency_count() as u64);
    counters.insert(
        stats::LINKS_OSPF.to_string(),
        builder.adjacency_count_for(Protocol::Ospf) as u64,
    );
    counters.insert(
        stats::LINKS_ISIS.to_string(),
        builder.adjacency_count_for(Protocol::Isis) as u64,
    );
    counters.insert(stats::OSPF_PAIRS_TOTAL.to_string(), ospf_pairs.len() as u64);
    counters.insert(stats::ISIS_PAIRS_TOTAL.to_string(), isis_pairs.len() as u64);

    info!(
        devices = builder.device_count(),
        links = builder.adjacency_count(),
        ospf_pairs = ospf_pairs.len(),
        isis_pairs = isis_pairs.len(),
        "L3 topology built"
    );

    let mut result = builder.finish(collected_at(&sorted), counters);
    result.ospf_pairs = ospf_pairs;
    result.isis_pairs = isis_pairs;
    Ok(result)
}
