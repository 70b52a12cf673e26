//! Byte-free job persistence across process restarts.
//!
//! The registry projects every job into a [`PersistedJobRecord`] after each
//! mutation and hands the full set to a [`SnapshotStore`], keyed per bound
//! identity. On restore, file bytes are gone for good: any record that was
//! still in flight is remapped to `Cancelled` and marked as a restored
//! placeholder so it can never be dispatched again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::FileKind;
use crate::error::PersistError;
use crate::job::{JobStatus, SourceFile, UploadJob};
use crate::sanitize;

/// Serializable projection of an [`UploadJob`], minus the bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedJobRecord {
    pub id: String,
    pub filename: String,
    pub size: u64,
    pub kind: FileKind,
    pub status: JobStatus,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PersistedJobRecord {
    pub fn from_job(job: &UploadJob) -> Self {
        Self {
            id: job.id.clone(),
            filename: job.file.name.clone(),
            size: job.file.size,
            kind: job.kind,
            status: job.status,
            progress_percent: job.progress_percent,
            message: job.message.clone(),
            error: job.error.clone(),
            created_at: job.created_at,
        }
    }

    /// Rebuilds a job from this record.
    ///
    /// Terminal jobs come back unchanged. Anything still in flight when the
    /// snapshot was written is remapped to `Cancelled` and flagged as a
    /// restored placeholder — its bytes did not survive the restart.
    pub fn into_restored_job(self) -> UploadJob {
        let remap = !self.status.is_terminal();
        let mime_type = mime_guess::from_path(&self.filename)
            .first()
            .map(|m| m.to_string());

        UploadJob {
            id: self.id,
            file: SourceFile::placeholder(self.filename, self.size),
            kind: self.kind,
            status: if remap { JobStatus::Cancelled } else { self.status },
            progress_percent: self.progress_percent,
            message: if remap { None } else { self.message },
            result: None,
            error: self.error,
            restored_placeholder: remap,
            mime_type,
            created_at: self.created_at,
        }
    }
}

/// Keyed snapshot storage. `load` of an unknown key answers empty.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, key: &str, records: &[PersistedJobRecord]) -> Result<(), PersistError>;
    fn load(&self, key: &str) -> Result<Vec<PersistedJobRecord>, PersistError>;
}

/// One JSON file per key under a snapshot directory.
pub struct JsonSnapshotStore {
    directory: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.json", sanitize::sanitize_filename(key)))
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, key: &str, records: &[PersistedJobRecord]) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| PersistError::CreateDirectory {
            path: self.directory.clone(),
            source: e,
        })?;

        let path = self.path_for(key);
        let json = serde_json::to_vec_pretty(records)?;
        std::fs::write(&path, json).map_err(|e| PersistError::Write { path, source: e })
    }

    fn load(&self, key: &str) -> Result<Vec<PersistedJobRecord>, PersistError> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistError::Read { path, source: e }),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Default snapshot location under the platform data directory.
pub fn default_snapshot_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("conveyor").join("snapshots"))
}

/// Keeps snapshots in memory. For tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<String, Vec<PersistedJobRecord>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, key: &str, records: &[PersistedJobRecord]) -> Result<(), PersistError> {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.to_string(), records.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<PersistedJobRecord>, PersistError> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(entries.get(key).cloned().unwrap_or_default())
    }
}
