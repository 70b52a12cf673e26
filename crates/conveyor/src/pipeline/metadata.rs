//! JSON-metadata pipeline: upload under the metadata sub-path, parse, and
//! record the import.

use serde_json::{json, Value};

use super::Pipeline;
use crate::error::{PipelineError, RemoteError};
use crate::job::{JobStatus, UploadJob};
use crate::parse;
use crate::remote::{buckets, ImportRecord};

pub(super) async fn run(p: &Pipeline, job: &UploadJob) -> Result<Value, PipelineError> {
    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Uploading, 15, "Uploading metadata");
    let url = p
        .upload_source(job, buckets::IMPORTS, Some(buckets::METADATA_PREFIX))
        .await?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 45, "Parsing metadata");
    let bytes = job.file.bytes().ok_or(PipelineError::MissingBytes)?;
    let rows = parse::parse_rows(job.kind, bytes)?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 75, "Recording import");
    let record = p
        .records
        .insert(
            ImportRecord::new(&job.file.name, job.kind)
                .with_source_url(&url)
                .with_row_count(rows.len() as u64),
        )
        .await?;
    let import_id = record
        .id
        .ok_or_else(|| RemoteError::Record("insert returned no id".to_string()))?;

    Ok(json!({
        "importId": import_id,
        "recordCount": rows.len(),
    }))
}
