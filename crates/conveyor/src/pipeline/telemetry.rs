//! Wifi-telemetry pipeline: upload and remote processing.

use serde_json::{json, Value};

use super::Pipeline;
use crate::error::PipelineError;
use crate::job::{JobStatus, UploadJob};
use crate::remote::{buckets, functions};

pub(super) async fn run(p: &Pipeline, job: &UploadJob) -> Result<Value, PipelineError> {
    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Uploading, 15, "Uploading telemetry");
    let url = p.upload_source(job, buckets::IMPORTS, None).await?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 55, "Processing telemetry");
    let response = p
        .functions
        .invoke(
            functions::PROCESS_TELEMETRY,
            json!({
                "sourceUrl": url,
                "storeId": p.identity.store_id,
                "filename": job.file.name,
            }),
        )
        .await?;

    let processed_count = response
        .get("processedCount")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let metadata_generated = response
        .get("metadataGenerated")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(json!({
        "processedCount": processed_count,
        "metadataGenerated": metadata_generated,
    }))
}
