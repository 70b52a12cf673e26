use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::{self, FileKind};

/// Handle to a submitted file: name, size, and (until the process restarts)
/// the bytes themselves. Bytes are deliberately not serializable — a restored
/// job has the name and size but nothing to upload.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    bytes: Option<Arc<Vec<u8>>>,
}

impl SourceFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            bytes: Some(Arc::new(bytes)),
        }
    }

    /// A byte-free handle, as reconstructed from a persisted record.
    pub fn placeholder(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            bytes: None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref().map(|b| b.as_slice())
    }

    pub fn has_bytes(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Job lifecycle states.
///
/// `Success`, `Error` and `Cancelled` are terminal: once written they never
/// change except by removing the job from the registry. `Paused` returns to
/// `Pending` only through an explicit resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Uploading,
    Processing,
    Mapping,
    Success,
    Error,
    Cancelled,
    Paused,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error | JobStatus::Cancelled)
    }

    /// Actively running a pipeline (between dispatch and settle).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Uploading | JobStatus::Processing | JobStatus::Mapping
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Uploading => write!(f, "uploading"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Mapping => write!(f, "mapping"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Paused => write!(f, "paused"),
        }
    }
}

/// One submitted file's end-to-end lifecycle record.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: String,
    pub file: SourceFile,
    pub kind: FileKind,
    pub status: JobStatus,
    /// Coarse progress, 0–100. Non-decreasing while the job is active.
    pub progress_percent: u8,
    /// Human-readable phase label, cleared on pause.
    pub message: Option<String>,
    /// Pipeline-specific result payload, set on success.
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    /// True for jobs reconstructed from a persisted snapshot; they carry no
    /// bytes and are never dispatched.
    pub restored_placeholder: bool,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadJob {
    pub fn new(file: SourceFile) -> Self {
        let kind = detect::detect(&file.name);
        let mime_type = mime_guess::from_path(&file.name)
            .first()
            .map(|m| m.to_string());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file,
            kind,
            status: JobStatus::Pending,
            progress_percent: 0,
            message: None,
            result: None,
            error: None,
            restored_placeholder: false,
            mime_type,
            created_at: Utc::now(),
        }
    }

    /// Eligible for `batch_run` dispatch.
    pub fn is_dispatchable(&self) -> bool {
        self.status == JobStatus::Pending && !self.restored_placeholder
    }
}
