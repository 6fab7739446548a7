//! Last-known-good topology snapshot
//!
//! Rebuilds run outside the lock. Only the swap of the finished result takes
//! the write lock, so readers of the previous graph are never held up by a
//! build in progress.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CP-10: System Recovery - A failed rebuild keeps the last good topology
//! - AU-12: Audit Record Generation - Swaps and failures are logged

use crate::error::Result;
use crate::model::TopologyResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Failure recorded by the most recent unsuccessful rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildFailure {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Default)]
struct StoreState {
    current: Option<Arc<TopologyResult>>,
    last_failure: Option<RebuildFailure>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct TopologyStore {
    state: RwLock<StoreState>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest good result, if any rebuild has succeeded
    pub fn current(&self) -> Option<Arc<TopologyResult>> {
        self.state.read().current.clone()
    }

    pub fn last_failure(&self) -> Option<RebuildFailure> {
        self.state.read().last_failure.clone()
    }

    /// Number of successful swaps so far
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Runs `build` and swaps its result in on success. On failure the
    /// previous snapshot stays in place and the error is recorded.
    pub fn rebuild<F>(&self, build: F) -> Result<Arc<TopologyResult>>
    where
        F: FnOnce() -> Result<TopologyResult>,
    {
        match build() {
            Ok(result) => {
                let result = Arc::new(result);
                let mut state = self.state.write();
                state.current = Some(Arc::clone(&result));
                state.last_failure = None;
                state.generation += 1;
                info!(generation = state.generation, "topology snapshot replaced");
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "topology rebuild failed, keeping previous snapshot");
                self.state.write().last_failure = Some(RebuildFailure {
                    at: Utc::now(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
