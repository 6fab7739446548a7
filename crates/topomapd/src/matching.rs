//! Shared pairing primitives for the protocol matchers
//!
//! Every matcher reduces to the same shape: index unpaired links under their
//! own-perspective keys, then look each unpaired link up by its mirrored
//! keys. [`PairState`] does that bookkeeping; [`pair_labels`] stamps the two
//! resulting adjacencies.

use crate::model::{pair_keys, Adjacency, Labels, Protocol};
use std::collections::HashMap;

/// Two link indexes found to be mirror images of each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPair {
    pub source: usize,
    pub target: usize,
    pub pass: &'static str,
}

/// Per-link pairing state across successive passes
#[derive(Debug, Clone)]
pub struct PairState {
    peer: Vec<Option<usize>>,
    pairs: Vec<LinkPair>,
}

impl PairState {
    pub fn new(len: usize) -> Self {
        PairState {
            peer: vec![None; len],
            pairs: Vec::new(),
        }
    }

    pub fn is_paired(&self, idx: usize) -> bool {
        self.peer.get(idx).is_some_and(Option::is_some)
    }

    pub fn peer_of(&self, idx: usize) -> Option<usize> {
        self.peer.get(idx).copied().flatten()
    }

    fn record(&mut self, source: usize, target: usize, pass: &'static str) {
        self.peer[source] = Some(target);
        self.peer[target] = Some(source);
        self.pairs.push(LinkPair {
            source,
            target,
            pass,
        });
    }

    pub fn into_pairs(self) -> Vec<LinkPair> {
        self.pairs
    }

    /// Runs one pass. `index_keys` yields a link's own-perspective keys,
    /// `query_keys` its mirrored keys in priority order. `eligible` gates a
    /// link out of the pass entirely and `compatible` vetoes a candidate.
    ///
    /// Links are visited in slice order and the earliest indexed candidate
    /// wins, so the outcome depends only on the (pre-sorted) link order.
    pub fn run_pass<L, I, Q, E, C>(
        &mut self,
        links: &[L],
        pass: &'static str,
        index_keys: I,
        query_keys: Q,
        eligible: E,
        compatible: C,
    ) -> usize
    where
        I: Fn(&L) -> Vec<String>,
        Q: Fn(&L) -> Vec<String>,
        E: Fn(&L) -> bool,
        C: Fn(&L, &L) -> bool,
    {
        let mut table: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, link) in links.iter().enumerate() {
            if self.is_paired(idx) || !eligible(link) {
                continue;
            }
            for key in index_keys(link) {
                let slot = table.entry(key).or_default();
                if !slot.contains(&idx) {
                    slot.push(idx);
                }
            }
        }

        let mut matched = 0;
        for (idx, link) in links.iter().enumerate() {
            if self.is_paired(idx) || !eligible(link) {
                continue;
            }
            let found = query_keys(link).into_iter().find_map(|key| {
                table.get(&key).and_then(|candidates| {
                    candidates.iter().copied().find(|&other| {
                        other != idx && !self.is_paired(other) && compatible(link, &links[other])
                    })
                })
            });
            if let Some(other) = found {
                self.record(idx, other, pass);
                matched += 1;
            }
        }
        matched
    }
}

/// `protocol:device/port`, the per-side half of a pair ID
pub fn side_key(protocol: Protocol, device_id: &str, port: &str) -> String {
    format!("{}:{}/{}", protocol, device_id, port)
}

/// Labels for both directions of a verified pair. The pair ID joins the
/// lower side key with the higher one, so it reads the same from either end;
/// side `a` is the lower key.
pub fn pair_labels(
    protocol: Protocol,
    (a_device, a_port): (&str, &str),
    (b_device, b_port): (&str, &str),
    pass: &str,
) -> (Labels, Labels) {
    let a_key = side_key(protocol, a_device, a_port);
    let b_key = side_key(protocol, b_device, b_port);
    let (pair_id, a_side, b_side) = if a_key <= b_key {
        (format!("{}|{}", a_key, b_key), "a", "b")
    } else {
        (format!("{}|{}", b_key, a_key), "b", "a")
    };

    let build = |side: &str| {
        let mut labels = Labels::new();
        labels.insert(pair_keys::PAIR_ID.to_string(), pair_id.clone());
        labels.insert(pair_keys::PAIR_SIDE.to_string(), side.to_string());
        labels.insert(pair_keys::PAIR_PASS.to_string(), pass.to_string());
        labels
    };
    (build(a_side), build(b_side))
}

/// A unidirectional link as one device reported it
pub trait DirectedLink {
    /// Reporting device
    fn device_id(&self) -> &str;

    /// Port label on the reporting device
    fn local_port(&self) -> String;

    /// Target device and port used when no peer link was found. `None`
    /// drops the link.
    fn unpaired_target(&self) -> Option<(String, String)>;

    /// Protocol-specific labels carried onto the adjacency
    fn labels(&self) -> Labels;
}

/// One adjacency per link. Paired links point at the peer's reporting
/// device and port and carry pair labels; unpaired links fall back to
/// [`DirectedLink::unpaired_target`].
pub fn emit_adjacencies<L: DirectedLink>(
    protocol: Protocol,
    links: &[L],
    pairs: &[LinkPair],
) -> Vec<Adjacency> {
    let mut peers: Vec<Option<(usize, &'static str)>> = vec![None; links.len()];
    for pair in pairs {
        peers[pair.source] = Some((pair.target, pair.pass));
        peers[pair.target] = Some((pair.source, pair.pass));
    }

    let mut adjacencies = Vec::with_capacity(links.len());
    for (idx, link) in links.iter().enumerate() {
        let mut labels = link.labels();
        let source_port = link.local_port();
        let (target_device_id, target_port) = match peers[idx] {
            Some((other, pass)) => {
                let peer = &links[other];
                let peer_port = peer.local_port();
                let (own, _) = pair_labels(
                    protocol,
                    (link.device_id(), &source_port),
                    (peer.device_id(), &peer_port),
                    pass,
                );
                labels.extend(own);
                (peer.device_id().to_string(), peer_port)
            }
            None => match link.unpaired_target() {
                Some(target) => target,
                None => continue,
            },
        };
        adjacencies.push(Adjacency {
            protocol,
            source_device_id: link.device_id().to_string(),
            source_port,
            target_device_id,
            target_port,
            labels,
        });
    }
    adjacencies
}
