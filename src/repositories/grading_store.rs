use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{GradingResult, RubricEntry, Submission};
use crate::db::types::SubmissionStatus;
use crate::repositories::{grading_results, rubrics, submissions, teacher_settings};
use crate::services::grading::store::{
    GradingResultStore, NewGradingResult, RecordOutcome, ReviewThresholdLookup, ReviewUpdate,
    RubricLookup, StoreError, SubmissionStore,
};

/// Postgres implementation of the grading persistence ports.
#[derive(Clone)]
pub(crate) struct PgGradingStore {
    pool: PgPool,
}

impl PgGradingStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgGradingStore {
    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(submissions::find_by_id(&self.pool, id).await?)
    }

    async fn claim_for_grading(
        &self,
        id: &str,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(submissions::claim_for_grading(&self.pool, id, now).await?)
    }

    async fn refresh_claim(&self, id: &str, now: PrimitiveDateTime) -> Result<bool, StoreError> {
        Ok(submissions::refresh_claim(&self.pool, id, now).await?)
    }

    async fn mark_pending(&self, id: &str, now: PrimitiveDateTime) -> Result<bool, StoreError> {
        Ok(submissions::mark_pending(&self.pool, id, now).await?)
    }

    async fn list_stale(&self, cutoff: PrimitiveDateTime) -> Result<Vec<Submission>, StoreError> {
        Ok(submissions::list_stale(&self.pool, cutoff).await?)
    }

    async fn reset_stale(
        &self,
        id: &str,
        cutoff: PrimitiveDateTime,
        now: PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        Ok(submissions::reset_stale(&self.pool, id, cutoff, now).await?)
    }
}

#[async_trait]
impl RubricLookup for PgGradingStore {
    async fn rubrics_for_template(
        &self,
        template_id: &str,
    ) -> Result<Vec<RubricEntry>, StoreError> {
        Ok(rubrics::list_by_template(&self.pool, template_id).await?)
    }
}

#[async_trait]
impl GradingResultStore for PgGradingStore {
    async fn find_by_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<GradingResult>, StoreError> {
        Ok(grading_results::find_by_submission(&self.pool, submission_id).await?)
    }

    async fn find_by_grade_id(&self, grade_id: &str) -> Result<Option<GradingResult>, StoreError> {
        Ok(grading_results::find_by_grade_id(&self.pool, grade_id).await?)
    }

    async fn record_outcome(
        &self,
        result: NewGradingResult,
        status: SubmissionStatus,
    ) -> Result<RecordOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = grading_results::insert_if_absent(
            &mut *tx,
            grading_results::CreateGradingResult {
                grade_id: &result.grade_id,
                submission_id: &result.submission_id,
                ai_score: result.ai_score,
                final_score: result.final_score,
                confidence_score: result.confidence_score,
                needs_review: result.needs_review,
                question_results: result.question_results,
                feedback: &result.feedback,
                processing_time_ms: result.processing_time_ms,
                failure_reason: result.failure_reason.as_deref(),
                created_at: result.created_at,
            },
        )
        .await?;

        let Some(row) = inserted else {
            tx.rollback().await?;
            let existing =
                grading_results::find_by_submission(&self.pool, &result.submission_id)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!(
                            "result for submission {} conflicted but cannot be read",
                            result.submission_id
                        ))
                    })?;
            return Ok(RecordOutcome::Existing(existing));
        };

        submissions::set_terminal_status(&mut *tx, &result.submission_id, status, result.created_at)
            .await?;
        tx.commit().await?;

        Ok(RecordOutcome::Inserted(row))
    }

    async fn apply_review(
        &self,
        grade_id: &str,
        update: ReviewUpdate,
    ) -> Result<Option<GradingResult>, StoreError> {
        Ok(grading_results::apply_review(
            &self.pool,
            grade_id,
            grading_results::ReviewFields {
                final_score: update.final_score,
                teacher_override: update.teacher_override,
                question_results: update.question_results,
                reviewed_by: update.reviewed_by.as_deref(),
                reviewed_at: update.reviewed_at,
            },
        )
        .await?)
    }

    async fn list_pending_reviews(&self) -> Result<Vec<GradingResult>, StoreError> {
        Ok(grading_results::list_pending_reviews(&self.pool).await?)
    }
}

#[async_trait]
impl ReviewThresholdLookup for PgGradingStore {
    async fn teacher_review_threshold(
        &self,
        assignment_id: &str,
    ) -> Result<Option<f64>, StoreError> {
        Ok(teacher_settings::find_threshold_for_assignment(&self.pool, assignment_id).await?)
    }
}
