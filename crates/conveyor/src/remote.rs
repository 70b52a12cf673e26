//! External collaborator seams.
//!
//! Everything that leaves the process — remote functions, blob storage, the
//! import-record store, the taxonomy store — sits behind a trait here. The
//! remote services are opaque: functions are invoked by name with a JSON
//! body and answer with JSON, and this crate never interprets more of the
//! payload than the pipelines need.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::FileKind;
use crate::error::RemoteError;

/// Remote function names.
pub mod functions {
    /// Column classification / auto-mapping for tabular imports.
    pub const CLASSIFY_MAPPING: &str = "classify-auto-mapping";
    /// 3D model analysis.
    pub const MODEL_ANALYSIS: &str = "analyze-model";
    /// Wifi telemetry processing.
    pub const PROCESS_TELEMETRY: &str = "process-telemetry";
    /// Integrated ETL over a created import record. May answer with
    /// `{"status": "processing"}` instead of a final result.
    pub const INTEGRATED_ETL: &str = "run-integrated-etl";
    /// KPI aggregation, fired after a successful tabular import.
    pub const AGGREGATE_KPIS: &str = "aggregate-kpis";
    /// Recommendation generation, fired after a successful tabular import.
    pub const GENERATE_RECOMMENDATIONS: &str = "generate-recommendations";
}

/// Blob bucket names and sub-paths.
pub mod buckets {
    /// 3D models.
    pub const MODELS: &str = "models";
    /// Everything else.
    pub const IMPORTS: &str = "imports";
    /// Sub-path inside [`IMPORTS`] for JSON metadata files.
    pub const METADATA_PREFIX: &str = "metadata";
}

/// Import-record status values as the remote side reports them.
pub mod import_status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

/// Named remote functions invoked with a JSON body.
#[async_trait]
pub trait RemoteFunctions: Send + Sync {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value, RemoteError>;
}

/// Blob storage: `upload` returns the stored object's URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<String, RemoteError>;
}

/// One import's record in the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// Assigned by the store on insert.
    pub id: Option<String>,
    pub filename: String,
    pub kind: FileKind,
    /// One of [`import_status`].
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Nested result payload, set by the remote side on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ImportRecord {
    pub fn new(filename: impl Into<String>, kind: FileKind) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            kind,
            status: import_status::PENDING.to_string(),
            row_count: None,
            source_url: None,
            result: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_row_count(mut self, count: u64) -> Self {
        self.row_count = Some(count);
        self
    }
}

/// Import-record CRUD. `insert` answers with the id filled in.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: ImportRecord) -> Result<ImportRecord, RemoteError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<ImportRecord>, RemoteError>;
    async fn update(&self, record: &ImportRecord) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyCategory {
    pub id: String,
    pub name: String,
}

/// A position assignment for one unassociated instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePosition {
    pub instance_id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Taxonomy/instance lookups used only by the 3D pipeline.
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn find_category(&self, name: &str) -> Result<Option<TaxonomyCategory>, RemoteError>;
    async fn unassociated_instances(
        &self,
        category_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, RemoteError>;
    async fn set_position(&self, update: &InstancePosition) -> Result<(), RemoteError>;
}

/// True when an integrated-ETL response defers the result to background
/// processing instead of carrying it inline.
pub fn is_background_response(response: &Value) -> bool {
    response
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s == import_status::PROCESSING)
        .unwrap_or(false)
}
