use time::OffsetDateTime;

use crate::services::grading::queue::GradingJob;
use crate::services::grading::{GradingError, GradingOrchestrator};

/// Runs one queued grading job. Failures are already durable by the time they
/// reach here, so they are only logged.
pub(crate) async fn process_job(orchestrator: &GradingOrchestrator, job: &GradingJob) {
    let queue_latency = (OffsetDateTime::now_utc() - job.enqueued_at).as_seconds_f64().max(0.0);
    metrics::histogram!("grading_queue_latency_seconds").record(queue_latency);

    match orchestrator.grade(&job.submission_id).await {
        Ok(result) => tracing::info!(
            submission_id = %job.submission_id,
            grade_id = %result.grade_id,
            needs_review = result.needs_review,
            queue_latency_seconds = queue_latency,
            "Grading job finished"
        ),
        Err(GradingError::GradingFailed { grade_id, cause, .. }) => tracing::warn!(
            submission_id = %job.submission_id,
            grade_id = %grade_id,
            kind = cause.kind(),
            error = %cause,
            "Grading job failed, result stored for manual review"
        ),
        Err(GradingError::InProgress(_)) => tracing::info!(
            submission_id = %job.submission_id,
            "Duplicate grading job skipped, submission is already being graded"
        ),
        Err(err @ GradingError::NotFound { .. }) => tracing::warn!(
            submission_id = %job.submission_id,
            error = %err,
            "Grading job dropped"
        ),
        Err(err) => tracing::error!(
            submission_id = %job.submission_id,
            error = %err,
            "Grading job errored, submission left for stale recovery"
        ),
    }
}
