use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{GradingResult, RubricEntry, Submission};
use crate::db::types::SubmissionStatus;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// A grading result about to be written. The storage row id is assigned by
/// the store; `grade_id` is the externally addressable key.
#[derive(Debug, Clone)]
pub(crate) struct NewGradingResult {
    pub(crate) grade_id: String,
    pub(crate) submission_id: String,
    pub(crate) ai_score: f64,
    pub(crate) final_score: f64,
    pub(crate) confidence_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) question_results: Value,
    pub(crate) feedback: String,
    pub(crate) processing_time_ms: i64,
    pub(crate) failure_reason: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone)]
pub(crate) enum RecordOutcome {
    Inserted(GradingResult),
    /// Another attempt persisted a result first; the new one was discarded.
    Existing(GradingResult),
}

#[derive(Debug, Clone)]
pub(crate) struct ReviewUpdate {
    pub(crate) final_score: f64,
    pub(crate) teacher_override: bool,
    pub(crate) question_results: Option<Value>,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: PrimitiveDateTime,
}

#[async_trait]
pub(crate) trait SubmissionStore: Send + Sync {
    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError>;

    /// Moves a PENDING submission without a result to PROCESSING. Returns
    /// `false` when another attempt got there first.
    async fn claim_for_grading(&self, id: &str, now: PrimitiveDateTime)
        -> Result<bool, StoreError>;

    /// Heartbeat of a running attempt. Returns `false` when the submission is
    /// no longer PROCESSING.
    async fn refresh_claim(&self, id: &str, now: PrimitiveDateTime) -> Result<bool, StoreError>;

    /// Stamps `queued_at` on a PENDING submission.
    async fn mark_pending(&self, id: &str, now: PrimitiveDateTime) -> Result<bool, StoreError>;

    /// Ungraded submissions whose PROCESSING heartbeat went quiet, or that were
    /// queued but never picked up, before `cutoff`.
    async fn list_stale(&self, cutoff: PrimitiveDateTime) -> Result<Vec<Submission>, StoreError>;

    /// Puts a stale submission back to PENDING with a fresh `queued_at`.
    async fn reset_stale(
        &self,
        id: &str,
        cutoff: PrimitiveDateTime,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub(crate) trait RubricLookup: Send + Sync {
    async fn rubrics_for_template(&self, template_id: &str)
        -> Result<Vec<RubricEntry>, StoreError>;
}

#[async_trait]
pub(crate) trait GradingResultStore: Send + Sync {
    async fn find_by_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<GradingResult>, StoreError>;

    async fn find_by_grade_id(&self, grade_id: &str) -> Result<Option<GradingResult>, StoreError>;

    /// Writes the result and the terminal submission status as one unit.
    /// At most one result per submission ever lands.
    async fn record_outcome(
        &self,
        result: NewGradingResult,
        status: SubmissionStatus,
    ) -> Result<RecordOutcome, StoreError>;

    async fn apply_review(
        &self,
        grade_id: &str,
        update: ReviewUpdate,
    ) -> Result<Option<GradingResult>, StoreError>;

    async fn list_pending_reviews(&self) -> Result<Vec<GradingResult>, StoreError>;
}

#[async_trait]
pub(crate) trait ReviewThresholdLookup: Send + Sync {
    /// The review threshold configured by the teacher owning the assignment.
    async fn teacher_review_threshold(
        &self,
        assignment_id: &str,
    ) -> Result<Option<f64>, StoreError>;
}

/// The persistence collaborators the grading pipeline talks to.
#[derive(Clone)]
pub(crate) struct GradingPorts {
    pub(crate) submissions: Arc<dyn SubmissionStore>,
    pub(crate) rubrics: Arc<dyn RubricLookup>,
    pub(crate) results: Arc<dyn GradingResultStore>,
    pub(crate) thresholds: Arc<dyn ReviewThresholdLookup>,
}

impl GradingPorts {
    pub(crate) fn from_store<S>(store: Arc<S>) -> Self
    where
        S: SubmissionStore + RubricLookup + GradingResultStore + ReviewThresholdLookup + 'static,
    {
        Self {
            submissions: store.clone(),
            rubrics: store.clone(),
            results: store.clone(),
            thresholds: store,
        }
    }
}
