//! 3D-model pipeline: upload, remote analysis, import record, and
//! best-effort auto-association of existing instances.

use futures_util::future::try_join_all;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::Pipeline;
use crate::error::{PipelineError, RemoteError};
use crate::job::{JobStatus, UploadJob};
use crate::remote::{buckets, functions, ImportRecord, InstancePosition};

pub(super) async fn run(p: &Pipeline, job: &UploadJob) -> Result<Value, PipelineError> {
    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Uploading, 10, "Uploading model");
    let url = p.upload_source(job, buckets::MODELS, None).await?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 40, "Analyzing model");
    let analysis = p
        .functions
        .invoke(
            functions::MODEL_ANALYSIS,
            json!({
                "modelUrl": url,
                "storeId": p.identity.store_id,
                "filename": job.file.name,
            }),
        )
        .await?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 60, "Recording import");
    let record = p
        .records
        .insert(ImportRecord::new(&job.file.name, job.kind).with_source_url(&url))
        .await?;
    let import_id = record
        .id
        .ok_or_else(|| RemoteError::Record("insert returned no id".to_string()))?;

    p.checkpoint(&job.id)?;
    p.phase(&job.id, JobStatus::Processing, 80, "Associating instances");
    let affected = associate_instances(p, &analysis).await;

    // The count is part of the result whether or not association happened.
    Ok(json!({
        "importId": import_id,
        "analysis": analysis,
        "affectedInstances": affected,
    }))
}

/// Looks up a taxonomy category matching the analysis's inferred category
/// and lays out its unassociated instances on a fixed grid. Best-effort:
/// any failure is logged and reported as zero affected instances.
async fn associate_instances(p: &Pipeline, analysis: &Value) -> usize {
    let Some(category_name) = analysis.get("category").and_then(Value::as_str) else {
        debug!("Analysis carries no category, skipping association");
        return 0;
    };

    match try_associate(p, category_name).await {
        Ok(affected) => affected,
        Err(e) => {
            warn!(category = category_name, "Instance auto-association failed: {}", e);
            0
        }
    }
}

async fn try_associate(p: &Pipeline, category_name: &str) -> Result<usize, RemoteError> {
    let Some(category) = p.taxonomy.find_category(category_name).await? else {
        return Ok(0);
    };

    let instances = p
        .taxonomy
        .unassociated_instances(&category.id, p.config.association_limit)
        .await?;

    let updates: Vec<InstancePosition> = instances
        .into_iter()
        .take(p.config.association_limit)
        .enumerate()
        .map(|(index, instance_id)| InstancePosition {
            instance_id,
            x: index as f64 * p.config.grid_step,
            y: 0.0,
            z: 0.0,
        })
        .collect();

    // One concurrent batch of position writes.
    try_join_all(updates.iter().map(|update| p.taxonomy.set_position(update))).await?;

    Ok(updates.len())
}
