//! Job registry: the single holder of job state.
//!
//! Every mutation goes through one path that enforces the state-machine
//! rules (terminal states are write-once, progress is monotonic while
//! active), then persists a byte-free snapshot and broadcasts a progress
//! event. No other module writes job fields directly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::broadcast::{JobProgressEvent, ProgressBroadcaster};
use crate::job::{JobStatus, UploadJob};
use crate::persist::{PersistedJobRecord, SnapshotStore};

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, UploadJob>>,
    /// Submission order, so batch dispatch is deterministic.
    order: RwLock<Vec<String>>,
    snapshot: Arc<dyn SnapshotStore>,
    snapshot_key: RwLock<Option<String>>,
    broadcaster: ProgressBroadcaster,
}

impl JobRegistry {
    pub fn new(snapshot: Arc<dyn SnapshotStore>, broadcaster: ProgressBroadcaster) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            snapshot,
            snapshot_key: RwLock::new(None),
            broadcaster,
        }
    }

    /// Sets the snapshot key all subsequent saves write under.
    pub fn bind_snapshot_key(&self, key: &str) {
        *write_or_recover(&self.snapshot_key) = Some(key.to_string());
    }

    pub fn insert(&self, job: UploadJob) -> String {
        let id = job.id.clone();
        write_or_recover(&self.order).push(id.clone());
        let event = JobProgressEvent::from_job(&job);
        write_or_recover(&self.jobs).insert(id.clone(), job);
        self.save_snapshot();
        self.broadcaster.send(event);
        id
    }

    /// Restores jobs from persisted records, skipping ids already present.
    /// Returns how many were inserted.
    pub fn restore(&self, records: Vec<PersistedJobRecord>) -> usize {
        let mut restored = 0;
        for record in records {
            let job = record.into_restored_job();
            if read_or_recover(&self.jobs).contains_key(&job.id) {
                continue;
            }
            write_or_recover(&self.order).push(job.id.clone());
            write_or_recover(&self.jobs).insert(job.id.clone(), job);
            restored += 1;
        }
        restored
    }

    pub fn get(&self, id: &str) -> Option<UploadJob> {
        read_or_recover(&self.jobs).get(id).cloned()
    }

    /// All jobs in submission order.
    pub fn all(&self) -> Vec<UploadJob> {
        let jobs = read_or_recover(&self.jobs);
        read_or_recover(&self.order)
            .iter()
            .filter_map(|id| jobs.get(id).cloned())
            .collect()
    }

    /// Removes a job entirely. The only way a terminal job leaves the
    /// registry.
    pub fn remove(&self, id: &str) -> Option<UploadJob> {
        let removed = write_or_recover(&self.jobs).remove(id);
        if removed.is_some() {
            write_or_recover(&self.order).retain(|j| j != id);
            self.save_snapshot();
        }
        removed
    }

    // ── State-machine transitions ──

    /// Pending → Uploading at dispatch. Progress restarts for this run.
    pub fn begin_dispatch(&self, id: &str) -> bool {
        self.mutate(id, |job| {
            if job.status != JobStatus::Pending {
                return false;
            }
            job.status = JobStatus::Uploading;
            job.progress_percent = 0;
            job.message = None;
            job.error = None;
            true
        })
    }

    /// Advances an active job's phase, message and progress. Progress never
    /// decreases; writes against a settled job are dropped.
    pub fn set_phase(&self, id: &str, status: JobStatus, progress: u8, message: &str) -> bool {
        self.mutate(id, |job| {
            if !job.status.is_active() {
                return false;
            }
            job.status = status;
            job.progress_percent = job.progress_percent.max(progress.min(100));
            job.message = Some(message.to_string());
            true
        })
    }

    pub fn complete(&self, id: &str, result: Value) -> bool {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                return false;
            }
            job.status = JobStatus::Success;
            job.progress_percent = 100;
            job.message = None;
            job.result = Some(result);
            true
        })
    }

    pub fn fail(&self, id: &str, error: &str) -> bool {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                return false;
            }
            job.status = JobStatus::Error;
            job.message = None;
            job.error = Some(error.to_string());
            true
        })
    }

    /// Silent terminal: no error is recorded.
    pub fn mark_cancelled(&self, id: &str) -> bool {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                return false;
            }
            job.status = JobStatus::Cancelled;
            job.message = None;
            true
        })
    }

    /// Active → Paused. Message cleared, progress kept.
    pub fn mark_paused(&self, id: &str) -> bool {
        self.mutate(id, |job| {
            if !job.status.is_active() {
                return false;
            }
            job.status = JobStatus::Paused;
            job.message = None;
            true
        })
    }

    /// Paused → Pending, ready for re-dispatch.
    pub fn resume(&self, id: &str) -> bool {
        self.mutate(id, |job| {
            if job.status != JobStatus::Paused {
                return false;
            }
            job.status = JobStatus::Pending;
            true
        })
    }

    fn mutate<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut UploadJob) -> bool,
    {
        let event = {
            let mut jobs = write_or_recover(&self.jobs);
            match jobs.get_mut(id) {
                Some(job) => {
                    if f(job) {
                        Some(JobProgressEvent::from_job(job))
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        match event {
            Some(event) => {
                self.save_snapshot();
                self.broadcaster.send(event);
                true
            }
            None => false,
        }
    }

    /// Writes the byte-free projection of every non-placeholder job.
    /// Failures are logged and swallowed — persistence is best-effort.
    fn save_snapshot(&self) {
        let key = match read_or_recover(&self.snapshot_key).clone() {
            Some(key) => key,
            None => return,
        };

        let records: Vec<PersistedJobRecord> = {
            let jobs = read_or_recover(&self.jobs);
            read_or_recover(&self.order)
                .iter()
                .filter_map(|id| jobs.get(id))
                .filter(|job| !job.restored_placeholder)
                .map(PersistedJobRecord::from_job)
                .collect()
        };

        if let Err(e) = self.snapshot.save(&key, &records) {
            log::warn!("Job snapshot save failed: {}", e);
        }
    }
}

fn read_or_recover<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write_or_recover<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
