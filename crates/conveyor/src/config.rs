use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The organization/store pair every dispatch operates under.
///
/// Namespaces blob paths and the persistence snapshot key. Must be bound on
/// the orchestrator before any job is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub org_id: String,
    pub store_id: String,
}

impl Identity {
    pub fn new(org_id: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            store_id: store_id.into(),
        }
    }

    /// Key under which this identity's job snapshot is stored.
    pub fn snapshot_key(&self) -> String {
        format!("{}-{}", self.org_id, self.store_id)
    }

    /// Blob path prefix: `{org}/{store}`.
    pub fn blob_prefix(&self) -> String {
        format!("{}/{}", self.org_id, self.store_id)
    }
}

/// Tuning knobs for dispatch and polling. Defaults match production.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    /// Seconds between background-poll attempts.
    pub poll_interval_secs: u64,
    /// Poll attempts before giving up (60 × 5 s ≈ a five-minute bound).
    pub poll_max_attempts: u32,
    /// Progress shown at the first poll attempt.
    pub poll_progress_floor: u8,
    /// Progress approached as attempts near the maximum.
    pub poll_progress_ceiling: u8,
    /// Most instances auto-associated per 3D-model import.
    pub association_limit: usize,
    /// Spacing of auto-assigned instance positions along the x axis.
    pub grid_step: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            poll_max_attempts: 60,
            poll_progress_floor: 70,
            poll_progress_ceiling: 95,
            association_limit: 10,
            grid_step: 1.5,
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
