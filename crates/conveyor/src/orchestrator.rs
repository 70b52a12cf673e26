//! The orchestrator: owns the registry, the control state, and the bound
//! identity, and drives every pipeline run.
//!
//! Dispatch is strictly sequential — `batch_run` advances one job at a time
//! to bound outbound concurrency and keep progress observable. A single
//! job's failure never halts the batch; every outcome lands on the job
//! record instead of escaping the loop.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::broadcast::{JobProgressEvent, ProgressBroadcaster};
use crate::clock::Sleeper;
use crate::config::{Identity, OrchestratorConfig};
use crate::control::ControlState;
use crate::error::{Interrupt, PipelineError};
use crate::job::{JobStatus, SourceFile, UploadJob};
use crate::persist::SnapshotStore;
use crate::pipeline::Pipeline;
use crate::registry::JobRegistry;
use crate::remote::{BlobStore, RecordStore, RemoteFunctions, TaxonomyStore};

/// Every external seam the orchestrator needs, bundled for construction.
pub struct Collaborators {
    pub functions: Arc<dyn RemoteFunctions>,
    pub blobs: Arc<dyn BlobStore>,
    pub records: Arc<dyn RecordStore>,
    pub taxonomy: Arc<dyn TaxonomyStore>,
    pub snapshot: Arc<dyn SnapshotStore>,
    pub sleeper: Arc<dyn Sleeper>,
}

pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    registry: Arc<JobRegistry>,
    control: Arc<ControlState>,
    identity: RwLock<Option<Identity>>,
    collaborators: Collaborators,
    broadcaster: ProgressBroadcaster,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Self {
        let broadcaster = ProgressBroadcaster::default();
        let registry = Arc::new(JobRegistry::new(
            Arc::clone(&collaborators.snapshot),
            broadcaster.clone(),
        ));

        Self {
            config: Arc::new(config),
            registry,
            control: Arc::new(ControlState::new()),
            identity: RwLock::new(None),
            collaborators,
            broadcaster,
        }
    }

    /// Binds the org/store identity and restores this identity's persisted
    /// jobs. Returns how many jobs were restored.
    ///
    /// Until an identity is bound, dispatch refuses to run and nothing is
    /// persisted.
    pub fn bind_identity(&self, identity: Identity) -> usize {
        let key = identity.snapshot_key();
        *write_or_recover(&self.identity) = Some(identity);
        self.registry.bind_snapshot_key(&key);

        match self.collaborators.snapshot.load(&key) {
            Ok(records) => {
                let restored = self.registry.restore(records);
                if restored > 0 {
                    info!(restored, key = %key, "Restored persisted jobs");
                }
                restored
            }
            Err(e) => {
                warn!("Failed to load job snapshot '{}': {}", key, e);
                0
            }
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        read_or_recover(&self.identity).clone()
    }

    /// Subscribes to progress events for every job.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    // ── Submission ──

    /// Registers a file as a pending job. Detection and the mime stamp
    /// happen here; nothing runs until dispatch.
    pub fn submit(&self, file: SourceFile) -> String {
        let job = UploadJob::new(file);
        debug!(job_id = %job.id, filename = %job.file.name, kind = %job.kind, "Job submitted");
        self.registry.insert(job)
    }

    pub fn submit_batch(&self, files: Vec<SourceFile>) -> Vec<String> {
        files.into_iter().map(|f| self.submit(f)).collect()
    }

    // ── Queries ──

    pub fn jobs(&self) -> Vec<UploadJob> {
        self.registry.all()
    }

    pub fn job(&self, job_id: &str) -> Option<UploadJob> {
        self.registry.get(job_id)
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// True while the job holds a cancellation token, i.e. its pipeline is
    /// running. Settled and never-dispatched jobs are not cancellable.
    pub fn is_cancellable(&self, job_id: &str) -> bool {
        self.control.is_armed(job_id)
    }

    /// Removes a settled job from the registry. Jobs that are not terminal
    /// stay put.
    pub fn remove(&self, job_id: &str) -> Option<UploadJob> {
        match self.registry.get(job_id) {
            Some(job) if job.status.is_terminal() => self.registry.remove(job_id),
            _ => None,
        }
    }

    // ── Dispatch ──

    /// Runs one job's pipeline to a settled state. Never returns an error:
    /// failures, cancellation and pause all land on the job record.
    pub async fn dispatch(&self, job_id: &str) {
        let Some(job) = self.registry.get(job_id) else {
            return;
        };
        if !job.is_dispatchable() {
            return;
        }

        let Some(identity) = self.identity() else {
            warn!(job_id, "Dispatch without a bound identity");
            self.registry
                .fail(job_id, &PipelineError::MissingIdentity.to_string());
            return;
        };

        if !self.registry.begin_dispatch(job_id) {
            return;
        }
        self.control.arm(job_id);

        let pipeline = Pipeline::new(
            Arc::clone(&self.config),
            identity,
            Arc::clone(&self.collaborators.functions),
            Arc::clone(&self.collaborators.blobs),
            Arc::clone(&self.collaborators.records),
            Arc::clone(&self.collaborators.taxonomy),
            Arc::clone(&self.collaborators.sleeper),
            Arc::clone(&self.control),
            Arc::clone(&self.registry),
        );

        match pipeline.run(&job).await {
            Ok(result) => {
                self.registry.complete(job_id, result);
            }
            Err(PipelineError::Interrupted(Interrupt::Cancelled)) => {
                self.registry.mark_cancelled(job_id);
            }
            Err(PipelineError::Interrupted(Interrupt::Paused)) => {
                self.registry.mark_paused(job_id);
            }
            Err(e) => {
                warn!(job_id, "Pipeline failed: {}", e);
                self.registry.fail(job_id, &e.to_string());
            }
        }

        self.control.disarm(job_id);
    }

    /// Dispatches every pending, non-restored job in submission order, one
    /// at a time. Stops early when the pause flag is raised mid-iteration.
    pub async fn batch_run(&self) {
        let pending: Vec<String> = self
            .registry
            .all()
            .into_iter()
            .filter(UploadJob::is_dispatchable)
            .map(|job| job.id)
            .collect();

        info!(count = pending.len(), "Batch run starting");

        for job_id in pending {
            if self.control.is_paused() {
                info!("Pause requested, stopping batch run");
                break;
            }
            self.dispatch(&job_id).await;
        }
    }

    // ── Bulk commands ──

    /// Raises the pause flag and moves every active job to Paused.
    /// Running pipelines unwind at their next checkpoint. Returns the
    /// number of jobs transitioned.
    pub fn pause_all(&self) -> usize {
        self.control.set_paused(true);

        let mut paused = 0;
        for job in self.registry.all() {
            if job.status.is_active() && self.registry.mark_paused(&job.id) {
                paused += 1;
            }
        }

        info!(paused, "Pause requested for all active jobs");
        paused
    }

    /// Clears the pause flag, moves every paused job back to Pending and
    /// re-dispatches each. Returns the number of jobs resumed.
    pub async fn resume_all(&self) -> usize {
        self.control.set_paused(false);

        let mut resumed = Vec::new();
        for job in self.registry.all() {
            if job.status == JobStatus::Paused && self.registry.resume(&job.id) {
                resumed.push(job.id);
            }
        }

        info!(resumed = resumed.len(), "Resuming paused jobs");
        for job_id in &resumed {
            self.dispatch(job_id).await;
        }
        resumed.len()
    }

    /// Requests cancellation of every active job. Each running pipeline
    /// observes its token at the next checkpoint; jobs settle Cancelled
    /// with no error recorded. Returns the number of jobs transitioned.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for job in self.registry.all() {
            if job.status.is_active() {
                self.control.request_cancel(&job.id);
                if self.registry.mark_cancelled(&job.id) {
                    cancelled += 1;
                }
            }
        }

        info!(cancelled, "Cancel requested for all active jobs");
        cancelled
    }

    /// Cancels one job. A no-op on jobs that already settled.
    pub fn cancel(&self, job_id: &str) -> bool {
        let Some(job) = self.registry.get(job_id) else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }

        self.control.request_cancel(job_id);
        self.registry.mark_cancelled(job_id)
    }

    /// Resumes one paused job and re-dispatches it.
    pub async fn resume(&self, job_id: &str) -> bool {
        if !self.registry.resume(job_id) {
            return false;
        }
        self.dispatch(job_id).await;
        true
    }
}

fn read_or_recover<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Orchestrator identity lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write_or_recover<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Orchestrator identity lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
