//! Topology reconciliation for SONiC
//!
//! Fuses per-device discovery observations (LLDP, CDP, bridge forwarding
//! tables, ARP/ND caches, OSPF and IS-IS neighbor state) into one
//! deduplicated, deterministic topology graph.
//!
//! Two entry points exist: [`build_l2_result`] for the link-layer view and
//! [`build_l3_result`] for routing adjacencies. Both are pure functions of
//! their input, so the same observation set always serializes to the same
//! bytes regardless of input order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ DeviceObservation│     │  IdentityIndex   │     │ TopologyBuilder  │
//! │  (one per device)│────▶│ chassis/sysname/ │────▶│  dedup + sort    │
//! │                  │     │ mgmt IP → device │     │                  │
//! └──────────────────┘     └────────┬─────────┘     └────────┬─────────┘
//!                                   │                        │
//!                          ┌────────▼─────────┐     ┌────────▼─────────┐
//!                          │ per-protocol     │     │  TopologyResult  │
//!                          │ link pairing     │     │  (JSON, stats)   │
//!                          └──────────────────┘     └──────────────────┘
//! ```
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-8: System Component Inventory - Devices, interfaces and links discovered
//! - SI-10: Information Input Validation - Observations validated before use
//! - AU-12: Audit Record Generation - Dropped rows and pass results logged

pub mod arp;
pub mod bridge_domain;
pub mod builder;
pub mod cdp;
pub mod config;
pub mod error;
pub mod fdb;
pub mod identity;
pub mod isis;
pub mod l2;
pub mod l3;
pub mod lldp;
pub mod matching;
pub mod model;
pub mod ospf;
pub mod snapshot;
pub mod types;

pub use bridge_domain::{BridgeDomainSummary, SegmentSummary};
pub use config::TopomapConfig;
pub use error::{Result, TopomapError};
pub use isis::IsisLinkPair;
pub use l2::build_l2_result;
pub use l3::build_l3_result;
pub use model::{
    Adjacency, Attachment, Device, EndpointId, Enrichment, Interface, Protocol, TopologyResult,
};
pub use ospf::OspfLinkPair;
pub use snapshot::TopologyStore;
pub use types::{DeviceObservation, ProtocolToggles};
