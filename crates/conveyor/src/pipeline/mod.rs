//! Type-specific processing pipelines.
//!
//! Each pipeline is a fixed sequence of checkpointed phases: a checkpoint
//! runs before every externally visible step, so cancellation and pause
//! take effect between steps, never mid-call. Progress milestones are
//! coarse and monotonic, not byte-accurate.

mod metadata;
mod model;
mod poll;
mod tabular;
mod telemetry;

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::Instrument;

use crate::clock::Sleeper;
use crate::config::{Identity, OrchestratorConfig};
use crate::control::ControlState;
use crate::detect::FileKind;
use crate::error::PipelineError;
use crate::job::{JobStatus, UploadJob};
use crate::registry::JobRegistry;
use crate::remote::{functions, BlobStore, RecordStore, RemoteFunctions, TaxonomyStore};
use crate::sanitize;

/// One dispatch's execution environment: the bound identity plus every
/// collaborator a pipeline may touch.
pub struct Pipeline {
    config: Arc<OrchestratorConfig>,
    identity: Identity,
    functions: Arc<dyn RemoteFunctions>,
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    taxonomy: Arc<dyn TaxonomyStore>,
    sleeper: Arc<dyn Sleeper>,
    control: Arc<ControlState>,
    registry: Arc<JobRegistry>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<OrchestratorConfig>,
        identity: Identity,
        functions: Arc<dyn RemoteFunctions>,
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        taxonomy: Arc<dyn TaxonomyStore>,
        sleeper: Arc<dyn Sleeper>,
        control: Arc<ControlState>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            config,
            identity,
            functions,
            blobs,
            records,
            taxonomy,
            sleeper,
            control,
            registry,
        }
    }

    /// Runs the pipeline matching the job's kind to completion, returning
    /// the result payload. Interruptions and failures unwind as
    /// [`PipelineError`]; the dispatcher settles the job accordingly.
    pub async fn run(&self, job: &UploadJob) -> Result<Value, PipelineError> {
        let span = tracing::info_span!(
            "pipeline",
            job_id = %job.id,
            filename = %job.file.name,
            kind = %job.kind,
        );

        async {
            match job.kind {
                FileKind::TabularCsv | FileKind::TabularExcel => tabular::run(self, job).await,
                FileKind::Model3d => model::run(self, job).await,
                FileKind::WifiTelemetry => telemetry::run(self, job).await,
                FileKind::JsonMetadata => metadata::run(self, job).await,
                FileKind::Unknown => Err(PipelineError::UnsupportedType),
            }
        }
        .instrument(span)
        .await
    }

    fn checkpoint(&self, job_id: &str) -> Result<(), PipelineError> {
        Ok(self.control.checkpoint(job_id)?)
    }

    fn phase(&self, job_id: &str, status: JobStatus, progress: u8, message: &str) {
        self.registry.set_phase(job_id, status, progress, message);
    }

    /// Uploads the job's bytes under `{org}/{store}[/{sub}]/{name}` with the
    /// filename sanitized.
    async fn upload_source(
        &self,
        job: &UploadJob,
        bucket: &str,
        sub_path: Option<&str>,
    ) -> Result<String, PipelineError> {
        let bytes = job.file.bytes().ok_or(PipelineError::MissingBytes)?;
        let name = sanitize::sanitize_filename(&job.file.name);
        let path = match sub_path {
            Some(sub) => format!("{}/{}/{}", self.identity.blob_prefix(), sub, name),
            None => format!("{}/{}", self.identity.blob_prefix(), name),
        };

        let url = self.blobs.upload(bucket, &path, bytes, true).await?;
        tracing::debug!(bucket, path = %path, "Uploaded source bytes");
        Ok(url)
    }

    /// Fires the two post-import aggregation calls as detached tasks.
    /// They are never awaited and their failures only reach the log.
    fn spawn_post_import_tasks(&self, import_id: &str) {
        for name in [functions::AGGREGATE_KPIS, functions::GENERATE_RECOMMENDATIONS] {
            let functions = Arc::clone(&self.functions);
            let body = json!({
                "importId": import_id,
                "storeId": self.identity.store_id,
            });
            tokio::spawn(async move {
                if let Err(e) = functions.invoke(name, body).await {
                    tracing::warn!(function = name, "Post-import call failed: {}", e);
                }
            });
        }
    }
}
