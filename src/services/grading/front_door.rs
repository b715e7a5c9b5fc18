use std::sync::Arc;

use time::OffsetDateTime;

use crate::core::time::primitive_now_utc;
use crate::db::types::SubmissionStatus;
use crate::services::grading::errors::GradingError;
use crate::services::grading::orchestrator::GradingOrchestrator;
use crate::services::grading::queue::{GradingJob, GradingQueue};

/// How grading requests are executed, fixed when the front door is built.
#[derive(Clone)]
pub(crate) enum GradingDispatch {
    Synchronous,
    Enqueued(Arc<dyn GradingQueue>),
}

impl GradingDispatch {
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::Synchronous => "sync",
            Self::Enqueued(_) => "queue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueStatus {
    Queued,
    Completed,
    Failed,
    AlreadyGraded,
}

impl EnqueueStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::AlreadyGraded => "ALREADY_GRADED",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EnqueueReceipt {
    pub(crate) submission_id: String,
    pub(crate) status: EnqueueStatus,
    pub(crate) timestamp: OffsetDateTime,
    pub(crate) grade_id: Option<String>,
}

impl EnqueueReceipt {
    fn new(submission_id: &str, status: EnqueueStatus, grade_id: Option<String>) -> Self {
        Self {
            submission_id: submission_id.to_string(),
            status,
            timestamp: OffsetDateTime::now_utc(),
            grade_id,
        }
    }
}

pub(crate) struct GradingFrontDoor {
    orchestrator: Arc<GradingOrchestrator>,
    dispatch: GradingDispatch,
}

impl GradingFrontDoor {
    pub(crate) fn new(orchestrator: Arc<GradingOrchestrator>, dispatch: GradingDispatch) -> Self {
        Self { orchestrator, dispatch }
    }

    pub(crate) fn dispatch(&self) -> &GradingDispatch {
        &self.dispatch
    }

    pub(crate) async fn enqueue_grading(
        &self,
        submission_id: &str,
    ) -> Result<EnqueueReceipt, GradingError> {
        let ports = self.orchestrator.ports();

        if let Some(existing) = ports.results.find_by_submission(submission_id).await? {
            return Ok(EnqueueReceipt::new(
                submission_id,
                EnqueueStatus::AlreadyGraded,
                Some(existing.grade_id),
            ));
        }

        let receipt = match &self.dispatch {
            GradingDispatch::Synchronous => self.grade_inline(submission_id).await?,
            GradingDispatch::Enqueued(queue) => self.publish(queue.as_ref(), submission_id).await?,
        };

        metrics::counter!(
            "grading_enqueued_total",
            "mode" => self.dispatch.mode(),
            "status" => receipt.status.as_str()
        )
        .increment(1);

        Ok(receipt)
    }

    async fn grade_inline(&self, submission_id: &str) -> Result<EnqueueReceipt, GradingError> {
        match self.orchestrator.grade(submission_id).await {
            Ok(result) => {
                let status =
                    if result.is_failure() { EnqueueStatus::Failed } else { EnqueueStatus::Completed };
                Ok(EnqueueReceipt::new(submission_id, status, Some(result.grade_id)))
            }
            Err(GradingError::GradingFailed { grade_id, .. }) => {
                Ok(EnqueueReceipt::new(submission_id, EnqueueStatus::Failed, Some(grade_id)))
            }
            Err(err) => Err(err),
        }
    }

    async fn publish(
        &self,
        queue: &dyn GradingQueue,
        submission_id: &str,
    ) -> Result<EnqueueReceipt, GradingError> {
        let submissions = &self.orchestrator.ports().submissions;
        let submission = submissions
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| GradingError::not_found("submission", submission_id))?;

        match submission.status {
            SubmissionStatus::Processing => {
                tracing::info!(submission_id, "Submission already being graded, not republishing");
                return Ok(EnqueueReceipt::new(submission_id, EnqueueStatus::Queued, None));
            }
            status if status.is_terminal() => {
                return Ok(EnqueueReceipt::new(submission_id, EnqueueStatus::AlreadyGraded, None));
            }
            _ => {}
        }

        if !submissions.mark_pending(submission_id, primitive_now_utc()).await? {
            tracing::info!(submission_id, "Submission left PENDING before publish, skipping");
            return Ok(EnqueueReceipt::new(submission_id, EnqueueStatus::Queued, None));
        }

        queue.publish(&GradingJob::new(submission_id)).await?;
        tracing::info!(submission_id, "Grading job enqueued");

        Ok(EnqueueReceipt::new(submission_id, EnqueueStatus::Queued, None))
    }
}
