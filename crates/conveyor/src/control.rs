//! Cooperative pause/cancel state shared by every pipeline.
//!
//! Pipelines call [`ControlState::checkpoint`] before each externally
//! visible step. A step already in flight always runs to completion;
//! interruption takes effect at the next checkpoint, never preemptively.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Interrupt;

/// Pause flag plus per-job cancellation tokens.
///
/// A token exists exactly while a job's pipeline is running — armed at
/// dispatch, removed when the run settles. Token absence means the job is
/// not currently cancellable.
#[derive(Default)]
pub struct ControlState {
    paused: RwLock<bool>,
    tokens: RwLock<HashMap<String, bool>>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&self, paused: bool) {
        *write_or_recover(&self.paused, "pause flag") = paused;
    }

    pub fn is_paused(&self) -> bool {
        *read_or_recover(&self.paused, "pause flag")
    }

    /// Creates this job's cancellation token. Called at dispatch.
    pub fn arm(&self, job_id: &str) {
        write_or_recover(&self.tokens, "token map").insert(job_id.to_string(), false);
    }

    /// Removes this job's token. Called whenever a pipeline run settles.
    pub fn disarm(&self, job_id: &str) {
        write_or_recover(&self.tokens, "token map").remove(job_id);
    }

    /// Requests cancellation. Returns false when the job holds no token
    /// (not running), in which case nothing was changed.
    pub fn request_cancel(&self, job_id: &str) -> bool {
        let mut tokens = write_or_recover(&self.tokens, "token map");
        match tokens.get_mut(job_id) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, job_id: &str) -> bool {
        read_or_recover(&self.tokens, "token map").contains_key(job_id)
    }

    /// Evaluates this job's interruption state. Cancellation wins over
    /// pause so a cancelled job can never settle as paused.
    pub fn checkpoint(&self, job_id: &str) -> Result<(), Interrupt> {
        if read_or_recover(&self.tokens, "token map")
            .get(job_id)
            .copied()
            .unwrap_or(false)
        {
            return Err(Interrupt::Cancelled);
        }
        if self.is_paused() {
            return Err(Interrupt::Paused);
        }
        Ok(())
    }

    /// Ids of all currently armed (running) jobs.
    pub fn armed_jobs(&self) -> Vec<String> {
        read_or_recover(&self.tokens, "token map")
            .keys()
            .cloned()
            .collect()
    }
}

fn read_or_recover<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> std::sync::RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Control {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn write_or_recover<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> std::sync::RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Control {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}
