//! Mock implementations of every external collaborator.
//!
//! Each mock records the calls it receives and answers from a small,
//! test-configured script. All state is behind plain mutexes so tests can
//! assert on interactions after a run.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;

use conveyor::error::RemoteError;
use conveyor::remote::{
    import_status, BlobStore, ImportRecord, InstancePosition, RecordStore, RemoteFunctions,
    TaxonomyCategory, TaxonomyStore,
};

// ─── Remote functions ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockFunctions {
    calls: Mutex<Vec<(String, Value)>>,
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, String>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl MockFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the JSON a named function answers with.
    pub fn respond_with(&self, name: &str, response: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_string(), response);
    }

    /// Makes a named function fail with the given message.
    pub fn fail_with(&self, name: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
    }

    /// Makes a named function block until the returned semaphore receives
    /// a permit. The call is recorded before it blocks, so tests can see
    /// in-flight pipelines.
    pub fn block(&self, name: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(name.to_string(), gate.clone());
        gate
    }

    pub fn unblock(&self, name: &str) {
        self.gates.lock().unwrap().remove(name);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteFunctions for MockFunctions {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value, RemoteError> {
        self.calls.lock().unwrap().push((name.to_string(), body));

        let gate = self.gates.lock().unwrap().get(name).cloned();
        if let Some(gate) = gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => {
                    return Err(RemoteError::Function {
                        name: name.to_string(),
                        message: "gate closed".to_string(),
                    });
                }
            }
        }

        if let Some(message) = self.failures.lock().unwrap().get(name) {
            return Err(RemoteError::Function {
                name: name.to_string(),
                message: message.clone(),
            });
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| json!({ "ok": true })))
    }
}

// ─── Blob storage ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub bucket: String,
    pub path: String,
    pub size: usize,
    pub overwrite: bool,
}

#[derive(Default)]
pub struct MockBlobs {
    uploads: Mutex<Vec<RecordedUpload>>,
    fail: AtomicBool,
}

impl MockBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for MockBlobs {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<String, RemoteError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(RemoteError::Upload {
                path: path.to_string(),
                message: "storage unavailable".to_string(),
            });
        }

        self.uploads.lock().unwrap().push(RecordedUpload {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: bytes.len(),
            overwrite,
        });

        Ok(format!("https://blobs/{}/{}", bucket, path))
    }
}

// ─── Import records ─────────────────────────────────────────────────────────

/// What `find_by_id` should report next. The last step repeats forever.
pub enum PollStep {
    Processing,
    Completed(Value),
    Failed(Option<String>),
}

#[derive(Default)]
pub struct MockRecords {
    next_id: AtomicU32,
    records: Mutex<HashMap<String, ImportRecord>>,
    poll_script: Mutex<Vec<PollStep>>,
    find_calls: AtomicU32,
    fail_insert: AtomicBool,
}

impl MockRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the statuses `find_by_id` walks through, one per call.
    pub fn script_polls(&self, steps: Vec<PollStep>) {
        *self.poll_script.lock().unwrap() = steps;
    }

    pub fn fail_inserts(&self) {
        self.fail_insert.store(true, Ordering::Relaxed);
    }

    pub fn find_calls(&self) -> u32 {
        self.find_calls.load(Ordering::Relaxed)
    }

    pub fn inserted(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn scripted_record(&self, id: &str) -> Option<ImportRecord> {
        let mut script = self.poll_script.lock().unwrap();
        if script.is_empty() {
            return None;
        }
        let step = if script.len() > 1 {
            script.remove(0)
        } else {
            match &script[0] {
                PollStep::Processing => PollStep::Processing,
                PollStep::Completed(v) => PollStep::Completed(v.clone()),
                PollStep::Failed(e) => PollStep::Failed(e.clone()),
            }
        };

        let base = self
            .records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_else(|| {
                ImportRecord::new("scripted", conveyor::FileKind::TabularCsv)
            });

        let mut record = base;
        record.id = Some(id.to_string());
        match step {
            PollStep::Processing => record.status = import_status::PROCESSING.to_string(),
            PollStep::Completed(result) => {
                record.status = import_status::COMPLETED.to_string();
                record.result = Some(result);
            }
            PollStep::Failed(error) => {
                record.status = import_status::FAILED.to_string();
                record.error = error;
            }
        }
        Some(record)
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    async fn insert(&self, mut record: ImportRecord) -> Result<ImportRecord, RemoteError> {
        if self.fail_insert.load(Ordering::Relaxed) {
            return Err(RemoteError::Record("insert rejected".to_string()));
        }

        let id = format!("imp-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        record.id = Some(id.clone());
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ImportRecord>, RemoteError> {
        self.find_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(scripted) = self.scripted_record(id) {
            return Ok(Some(scripted));
        }
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, record: &ImportRecord) -> Result<(), RemoteError> {
        let id = record
            .id
            .clone()
            .ok_or_else(|| RemoteError::Record("update without id".to_string()))?;
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(())
    }
}

// ─── Taxonomy ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockTaxonomy {
    category: Mutex<Option<TaxonomyCategory>>,
    instances: Mutex<Vec<String>>,
    positions: Mutex<Vec<InstancePosition>>,
    fail_positions: AtomicBool,
}

impl MockTaxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(&self, id: &str, name: &str, instances: &[&str]) {
        *self.category.lock().unwrap() = Some(TaxonomyCategory {
            id: id.to_string(),
            name: name.to_string(),
        });
        *self.instances.lock().unwrap() =
            instances.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_position_updates(&self) {
        self.fail_positions.store(true, Ordering::Relaxed);
    }

    pub fn positions(&self) -> Vec<InstancePosition> {
        self.positions.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaxonomyStore for MockTaxonomy {
    async fn find_category(&self, name: &str) -> Result<Option<TaxonomyCategory>, RemoteError> {
        let category = self.category.lock().unwrap().clone();
        Ok(category.filter(|c| c.name == name))
    }

    async fn unassociated_instances(
        &self,
        category_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, RemoteError> {
        let category = self.category.lock().unwrap().clone();
        if category.map(|c| c.id) != Some(category_id.to_string()) {
            return Ok(Vec::new());
        }
        Ok(self
            .instances
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn set_position(&self, update: &InstancePosition) -> Result<(), RemoteError> {
        if self.fail_positions.load(Ordering::Relaxed) {
            return Err(RemoteError::Taxonomy("position update rejected".to_string()));
        }
        self.positions.lock().unwrap().push(update.clone());
        Ok(())
    }
}
