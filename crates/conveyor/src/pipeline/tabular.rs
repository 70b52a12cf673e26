//! Tabular pipeline: CSV and Excel files (and row-shaped JSON).
//!
//! Upload → parse rows → column auto-mapping → import record → integrated
//! ETL. The ETL call either answers with the final result inline or defers
//! to background processing, in which case the bounded poll loop takes
//! over.

use serde_json::{json, Value};

use super::{poll, Pipeline};
use crate::error::{PipelineError, RemoteError};
use crate::job::{JobStatus, UploadJob};
use crate::parse;
use crate::remote::{self, buckets, functions, ImportRecord};

pub(super) async fn run(p: &Pipeline, job: &UploadJob) -> Result<Value, PipelineError> {
    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Uploading, 10, "Uploading file");
    let url = p.upload_source(job, buckets::IMPORTS, None).await?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 35, "Parsing rows");
    let bytes = job.file.bytes().ok_or(PipelineError::MissingBytes)?;
    let rows = parse::parse_rows(job.kind, bytes)?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Mapping, 50, "Mapping columns");
    let columns: Vec<&String> = rows.first().map(|r| r.keys().collect()).unwrap_or_default();
    let mapping = p
        .functions
        .invoke(
            functions::CLASSIFY_MAPPING,
            json!({
                "storeId": p.identity.store_id,
                "filename": job.file.name,
                "columns": columns,
            }),
        )
        .await?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Mapping, 60, "Creating import record");
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

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Mapping, 70, "Running integrated pipeline");
    let response = p
        .functions
        .invoke(
            functions::INTEGRATED_ETL,
            json!({
                "importId": import_id,
                "storeId": p.identity.store_id,
                "sourceUrl": url,
                "rowCount": rows.len(),
                "columnMapping": mapping,
            }),
        )
        .await?;

    let pipeline_result = if remote::is_background_response(&response) {
        poll::wait_for_import(p, &job.id, &import_id).await?
    } else {
        response
    };

    p.spawn_post_import_tasks(&import_id);

    Ok(json!({
        "importId": import_id,
        "rowCount": rows.len(),
        "pipeline": pipeline_result,
    }))
}
