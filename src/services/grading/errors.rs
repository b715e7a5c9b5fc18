use thiserror::Error;

use crate::services::grading::queue::QueueError;
use crate::services::grading::retry::RetryError;
use crate::services::grading::store::StoreError;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// A FAILED result has already been persisted under `grade_id`.
    #[error("grading failed for submission {submission_id} (grade {grade_id}): {cause}")]
    GradingFailed {
        submission_id: String,
        grade_id: String,
        #[source]
        cause: RetryError,
    },
    #[error("submission {0} is already being graded")]
    InProgress(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl GradingError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub(crate) fn is_rate_limited(&self) -> bool {
        matches!(self, Self::GradingFailed { cause, .. } if cause.is_rate_limited())
    }
}
