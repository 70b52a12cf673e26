//! Bounded background polling for deferred remote processing.
//!
//! A plain loop over an injectable sleeper — 60 attempts at 5-second
//! intervals by default, roughly a five-minute bound. At most one poll loop
//! runs per job: it only ever executes inside that job's single pipeline
//! run.

use serde_json::Value;

use super::Pipeline;
use crate::error::PipelineError;
use crate::job::JobStatus;
use crate::remote::import_status;

/// Polls the import record until it completes, fails, or the attempt
/// budget runs out. Progress interpolates between the configured floor and
/// ceiling as attempts accumulate.
pub(super) async fn wait_for_import(
    p: &Pipeline,
    job_id: &str,
    import_id: &str,
) -> Result<Value, PipelineError> {
    let max = p.config.poll_max_attempts.max(1);
    let floor = p.config.poll_progress_floor;
    let ceiling = p.config.poll_progress_ceiling.max(floor);
    let interval = p.config.poll_interval();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        p.checkpoint(job_id)?;

        let record = p.records.find_by_id(import_id).await?;
        match record {
            Some(record) if record.status == import_status::COMPLETED => {
                // The remote nests the actual payload inside the record.
                return Ok(record.result.unwrap_or(Value::Null));
            }
            Some(record) if record.status == import_status::FAILED => {
                let message = record
                    .error
                    .unwrap_or_else(|| "remote processing failed without detail".to_string());
                return Err(PipelineError::RemoteReported(message));
            }
            // Still in flight — or not yet visible, which counts the same.
            _ => {}
        }

        if attempt >= max {
            return Err(PipelineError::PollTimeout { attempts: attempt });
        }

        let span = (ceiling - floor) as u32;
        let progress = floor + (span * attempt / max) as u8;
        p.phase(job_id, JobStatus::Mapping, progress, "Processing in background");
        p.sleeper.sleep(interval).await;
    }
}
