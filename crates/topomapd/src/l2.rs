//! L2 discovery: LLDP, CDP, FDB, bridge domains and ARP/ND
//!
//! # Pipeline
//!
//! ```text
//! observations ─▶ sort ─▶ IdentityIndex ─┬─▶ LLDP links ─▶ 6 passes ─▶ adjacencies
//!                                        ├─▶ CDP links  ─▶ 1 pass   ─▶ adjacencies
//!                                        ├─▶ FDB tables ─▶ attachments ─▶ bridge domains
//!                                        └─▶ ARP/ND rows ─▶ enrichments ─▶ IP-only fold
//! ```

use crate::arp::EnrichmentSet;
use crate::bridge_domain;
use crate::builder::{collected_at, validated_observations, TopologyBuilder};
use crate::cdp;
use crate::error::Result;
use crate::fdb::{self, FdbTable, FDB_METHOD};
use crate::identity::IdentityIndex;
use crate::lldp;
use crate::matching::{emit_adjacencies, LinkPair};
use crate::model::{stats, Protocol, TopologyResult};
use crate::types::{DeviceObservation, ProtocolToggles};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

/// Builds the L2 topology. Fails only on an empty set or an observation
/// without a device ID. With no toggle set, LLDP and CDP run.
#[instrument(skip_all, fields(observations = observations.len()))]
pub fn build_l2_result(
    observations: &[DeviceObservation],
    toggles: ProtocolToggles,
) -> Result<TopologyResult> {
    let sorted = validated_observations(observations)?;
    let toggles = toggles.effective();
    debug!(?toggles, "building L2 topology");

    let mut index = IdentityIndex::from_observations(&sorted);
    let mut builder = TopologyBuilder::new();
    for obs in &sorted {
        builder.add_observation(obs);
    }

    if toggles.lldp {
        let mut links = Vec::new();
        for obs in &sorted {
            links.extend(lldp::collect_links(obs, &mut index));
        }
        let pairs = lldp::match_links(&links);
        for link in unpaired(&links, &pairs).filter(|l| !l.is_self_loop()) {
            builder.merge_device(link.remote_device());
        }
        for adjacency in emit_adjacencies(Protocol::Lldp, &links, &pairs) {
            builder.add_adjacency(adjacency);
        }
        debug!(links = links.len(), pairs = pairs.len(), "LLDP complete");
    }

    if toggles.cdp {
        let mut links = Vec::new();
        for obs in &sorted {
            links.extend(cdp::collect_links(obs, &mut index));
        }
        let pairs = cdp::match_links(&links);
        for link in unpaired(&links, &pairs).filter(|l| !l.is_self_loop()) {
            builder.merge_device(link.remote_device());
        }
        for adjacency in emit_adjacencies(Protocol::Cdp, &links, &pairs) {
            builder.add_adjacency(adjacency);
        }
        debug!(links = links.len(), pairs = pairs.len(), "CDP complete");
    }

    let mut tables: Vec<FdbTable> = Vec::new();
    if toggles.fdb {
        tables = sorted.iter().map(|obs| fdb::extract(obs)).collect();
        for table in &tables {
            for learned in &table.learned {
                builder.add_attachment(learned.to_attachment(&table.device_id));
            }
        }
    }

    let mut bridge_domains = Vec::new();
    if toggles.bridge_domains {
        let (bridge_links, mac_links) = bridge_domain::derive_links(&tables);
        bridge_domains = bridge_domain::reconstruct(&bridge_links, &mac_links);
        debug!(
            bridge_links = bridge_links.len(),
            mac_links = mac_links.len(),
            domains = bridge_domains.len(),
            "bridge domains complete"
        );
    }

    if toggles.arp_nd {
        let mut enrichments = EnrichmentSet::new();
        for obs in &sorted {
            enrichments.add_observation(obs);
        }
        let folded = enrichments.merge_ip_only_into_mac();
        debug!(folded, "ARP/ND complete");
        for enrichment in enrichments.into_enrichments() {
            builder.add_enrichment(enrichment);
        }
    }

    let mut counters = BTreeMap::new();
    counters.insert(stats::DEVICES_TOTAL.to_string(), builder.device_count() as u64);
    counters.insert(stats::LINKS_TOTAL.to_string(), builder.adjacency_count() as u64);
    counters.insert(
        stats::LINKS_LLDP.to_string(),
        builder.adjacency_count_for(Protocol::Lldp) as u64,
    );
    counters.insert(
        stats::LINKS_CDP.to_string(),
        builder.adjacency_count_for(Protocol::Cdp) as u64,
    );
    counters.insert(stats::ATTACHMENTS_TOTAL.to_string(), builder.attachment_count() as u64);
    counters.insert(
        stats::ATTACHMENTS_FDB.to_string(),
        builder.attachment_count_for(FDB_METHOD) as u64,
    );
    counters.insert(stats::ENRICHMENTS_TOTAL.to_string(), builder.enrichment_count() as u64);
    counters.insert(
        stats::ENRICHMENTS_ARP_ND.to_string(),
        builder.enrichment_count_for(&["arp", "nd"]) as u64,
    );
    counters.insert(stats::BRIDGE_DOMAINS_TOTAL.to_string(), bridge_domains.len() as u64);
    counters.insert(stats::ENDPOINTS_TOTAL.to_string(), builder.endpoint_count() as u64);

    info!(
        devices = builder.device_count(),
        links = builder.adjacency_count(),
        attachments = builder.attachment_count(),
        enrichments = builder.enrichment_count(),
        bridge_domains = bridge_domains.len(),
        "L2 topology built"
    );

    let mut result = builder.finish(collected_at(&sorted), counters);
    result.bridge_domains = bridge_domains;
    Ok(result)
}

fn unpaired<'a, L>(links: &'a [L], pairs: &[LinkPair]) -> impl Iterator<Item = &'a L> {
    let paired: BTreeSet<usize> = pairs.iter().flat_map(|p| [p.source, p.target]).collect();
    links
        .iter()
        .enumerate()
        .filter(move |(idx, _)| !paired.contains(idx))
        .map(|(_, link)| link)
}
