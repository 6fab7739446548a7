//! IS-IS adjacency extraction and pairing

use crate::matching::{DirectedLink, LinkPair, PairState};
use crate::model::Labels;
use crate::types::{DeviceObservation, IsisAdjacencyRow};
use serde::{Deserialize, Serialize};
use sonic_topo_types::{canonical_hex_token, canonical_mac, composite_key};
use std::collections::BTreeMap;
use tracing::debug;

pub const ISIS_PASS: &str = "default";

/// One device's view of one IS-IS adjacency, joined with its circuit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsisLinkObservation {
    pub device_id: String,
    /// Own system ID as a hex token
    pub sys_id: String,
    pub circuit_index: u32,
    /// 0 when the adjacency names no known circuit
    pub if_index: u32,
    pub local_port: String,
    pub adj_index: u32,
    pub neighbor_sys_id: String,
    pub neighbor_snpa: String,
    pub neighbor_sys_type: String,
    pub state: String,
    pub target_device_id: String,
}

impl IsisLinkObservation {
    fn index_key(&self) -> String {
        let adj = self.adj_index.to_string();
        composite_key(&[adj.as_str(), self.sys_id.as_str(), self.neighbor_sys_id.as_str()])
    }

    fn query_key(&self) -> String {
        let adj = self.adj_index.to_string();
        composite_key(&[adj.as_str(), self.neighbor_sys_id.as_str(), self.sys_id.as_str()])
    }

    fn is_pairable(&self) -> bool {
        !self.sys_id.is_empty() && self.sys_id != self.neighbor_sys_id
    }
}

impl DirectedLink for IsisLinkObservation {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn local_port(&self) -> String {
        self.local_port.clone()
    }

    fn unpaired_target(&self) -> Option<(String, String)> {
        Some((self.target_device_id.clone(), self.neighbor_snpa.clone()))
    }

    fn labels(&self) -> Labels {
        let mut labels = Labels::new();
        labels.insert("neighbor_sys_id".to_string(), self.neighbor_sys_id.clone());
        for (key, value) in [
            ("sys_id", &self.sys_id),
            ("neighbor_snpa", &self.neighbor_snpa),
            ("neighbor_sys_type", &self.neighbor_sys_type),
            ("state", &self.state),
        ] {
            if !value.is_empty() {
                labels.insert(key.to_string(), value.clone());
            }
        }
        labels
    }
}

/// Both directions of one verified IS-IS adjacency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsisLinkPair {
    pub a: IsisLinkObservation,
    pub b: IsisLinkObservation,
    pub pass: String,
}

impl IsisLinkPair {
    pub fn perspective(
        &self,
        device_id: &str,
    ) -> Option<(&IsisLinkObservation, &IsisLinkObservation)> {
        if self.a.device_id == device_id {
            Some((&self.a, &self.b))
        } else if self.b.device_id == device_id {
            Some((&self.b, &self.a))
        } else {
            None
        }
    }
}

pub fn synthetic_device_id(sys_id: &str) -> String {
    format!("isis-{}", sys_id)
}

/// `owners` maps system ID tokens to observed devices.
pub fn collect_links(
    obs: &DeviceObservation,
    owners: &BTreeMap<String, String>,
) -> Vec<IsisLinkObservation> {
    let device_id = obs.device_id.trim();
    let sys_id = canonical_hex_token(&obs.isis_sys_id).unwrap_or_default();

    let mut rows: Vec<&IsisAdjacencyRow> = obs.isis_adjacencies.iter().collect();
    rows.sort_by(|a, b| {
        (a.circuit_index, a.adj_index, &a.neighbor_sys_id)
            .cmp(&(b.circuit_index, b.adj_index, &b.neighbor_sys_id))
            .then_with(|| a.cmp(b))
    });

    let mut links = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(neighbor_sys_id) = canonical_hex_token(&row.neighbor_sys_id) else {
            debug!(
                device = %device_id,
                circuit = row.circuit_index,
                "dropping IS-IS adjacency without neighbor system id"
            );
            continue;
        };
        let if_index = obs
            .isis_circuits
            .iter()
            .filter(|c| c.circuit_index == row.circuit_index)
            .min()
            .map(|c| c.if_index)
            .unwrap_or(0);
        let mut local_port = obs.interface_name(if_index);
        if local_port.is_empty() {
            local_port = format!("circuit-{}", row.circuit_index);
        }
        let target_device_id = owners
            .get(&neighbor_sys_id)
            .cloned()
            .unwrap_or_else(|| synthetic_device_id(&neighbor_sys_id));

        links.push(IsisLinkObservation {
            device_id: device_id.to_string(),
            sys_id: sys_id.clone(),
            circuit_index: row.circuit_index,
            if_index,
            local_port,
            adj_index: row.adj_index,
            neighbor_snpa: canonical_mac(&row.neighbor_snpa)
                .unwrap_or_else(|| row.neighbor_snpa.trim().to_string()),
            neighbor_sys_id,
            neighbor_sys_type: row.neighbor_sys_type.trim().to_string(),
            state: row.state.trim().to_string(),
            target_device_id,
        });
    }
    links
}

pub fn match_links(links: &[IsisLinkObservation]) -> Vec<LinkPair> {
    let mut state = PairState::new(links.len());
    let matched = state.run_pass(
        links,
        ISIS_PASS,
        |l| vec![l.index_key()],
        |l| vec![l.query_key()],
        IsisLinkObservation::is_pairable,
        |a, b| a.device_id != b.device_id,
    );
    debug!(matched, "IS-IS pairing complete");
    state.into_pairs()
}

pub fn to_link_pairs(links: &[IsisLinkObservation], pairs: &[LinkPair]) -> Vec<IsisLinkPair> {
    pairs
        .iter()
        .map(|p| IsisLinkPair {
            a: links[p.source].clone(),
            b: links[p.target].clone(),
            pass: p.pass.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IsisCircuitRow;
    use pretty_assertions::assert_eq;

    fn node(id: &str, sys_id: &str, neighbor: &str) -> DeviceObservation {
        DeviceObservation {
            device_id: id.to_string(),
            isis_sys_id: sys_id.to_string(),
            isis_circuits: vec![IsisCircuitRow {
                circuit_index: 1,
                if_index: 21,
                ..Default::default()
            }],
            isis_adjacencies: vec![IsisAdjacencyRow {
                circuit_index: 1,
                adj_index: 1,
                neighbor_sys_id: neighbor.to_string(),
                state: "up".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_mirrored_system_ids_pair() {
        let r1 = node("r1", "0000.0000.0001", "00:00:00:00:00:02");
        let r2 = node("r2", "000000000002", "0x000000000001");
        let mut links = collect_links(&r1, &BTreeMap::new());
        links.extend(collect_links(&r2, &BTreeMap::new()));
        assert_eq!(links[0].if_index, 21);
        assert_eq!(links[0].local_port, "circuit-1");
        assert_eq!(links[0].target_device_id, "isis-000000000002");

        let pairs = to_link_pairs(&links, &match_links(&links));
        assert_eq!(pairs.len(), 1);
        assert_eq!(
            pairs[0].perspective("r2").map(|(l, _)| l.sys_id.as_str()),
            Some("000000000002")
        );
    }

    #[test]
    fn test_missing_circuit_and_neighbor() {
        let mut obs = node("r1", "0000.0000.0001", "");
        obs.isis_adjacencies.push(IsisAdjacencyRow {
            circuit_index: 9,
            adj_index: 2,
            neighbor_sys_id: "0000.0000.0003".to_string(),
            ..Default::default()
        });
        let links = collect_links(&obs, &BTreeMap::new());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].if_index, 0);
        assert_eq!(links[0].circuit_index, 9);
    }
}
