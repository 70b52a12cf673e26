//! Test harness wiring an orchestrator to mock collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use conveyor::clock::InstantSleeper;
use conveyor::persist::MemorySnapshotStore;
use conveyor::{Collaborators, Identity, Orchestrator, OrchestratorConfig, SourceFile};

use super::mocks::{MockBlobs, MockFunctions, MockRecords, MockTaxonomy};

pub const TEST_ORG: &str = "acme";
pub const TEST_STORE: &str = "store-1";

pub struct TestHarness {
    pub orchestrator: Orchestrator,
    pub functions: Arc<MockFunctions>,
    pub blobs: Arc<MockBlobs>,
    pub records: Arc<MockRecords>,
    pub taxonomy: Arc<MockTaxonomy>,
    pub snapshot: Arc<MemorySnapshotStore>,
    pub sleeper: Arc<InstantSleeper>,
}

impl TestHarness {
    /// Harness with a default config and no identity bound.
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self::with_snapshot(config, Arc::new(MemorySnapshotStore::new()))
    }

    /// Reusing a snapshot store across harnesses simulates a restart.
    pub fn with_snapshot(config: OrchestratorConfig, snapshot: Arc<MemorySnapshotStore>) -> Self {
        init_tracing();

        let functions = Arc::new(MockFunctions::new());
        let blobs = Arc::new(MockBlobs::new());
        let records = Arc::new(MockRecords::new());
        let taxonomy = Arc::new(MockTaxonomy::new());
        let sleeper = Arc::new(InstantSleeper::new());

        let orchestrator = Orchestrator::new(
            config,
            Collaborators {
                functions: functions.clone(),
                blobs: blobs.clone(),
                records: records.clone(),
                taxonomy: taxonomy.clone(),
                snapshot: snapshot.clone(),
                sleeper: sleeper.clone(),
            },
        );

        Self {
            orchestrator,
            functions,
            blobs,
            records,
            taxonomy,
            snapshot,
            sleeper,
        }
    }

    /// Harness with the test identity already bound.
    pub fn bound() -> Self {
        let harness = Self::new();
        harness.orchestrator.bind_identity(test_identity());
        harness
    }

    pub fn bound_with_config(config: OrchestratorConfig) -> Self {
        let harness = Self::with_config(config);
        harness.orchestrator.bind_identity(test_identity());
        harness
    }
}

pub fn test_identity() -> Identity {
    Identity::new(TEST_ORG, TEST_STORE)
}

/// Installs a compact subscriber once so failing tests show pipeline logs.
/// Safe to call from every harness; later calls are no-ops.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Yields repeatedly so detached tasks and spawned dispatches can run.
pub async fn drain_tasks() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

/// Yields until the condition holds. Panics if it never does.
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached: {}", what);
}

// ─── Source file builders ───────────────────────────────────────────────────

pub fn csv_file(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, b"sku,qty\nA-1,3\nB-2,7\n".to_vec())
}

pub fn json_metadata_file(name: &str) -> SourceFile {
    SourceFile::from_bytes(
        name,
        br#"[{"zone": "entrance", "area": 42}, {"zone": "checkout", "area": 18}]"#.to_vec(),
    )
}

pub fn glb_file(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, b"glTF fake binary payload".to_vec())
}

pub fn telemetry_file(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, b"ts,mac,rssi\n1,aa:bb,-40\n".to_vec())
}
