use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::GradingResult;

pub(crate) const COLUMNS: &str = "\
    id, grade_id, submission_id, ai_score, final_score, confidence_score, needs_review, \
    question_results, feedback, teacher_override, reviewed_by, reviewed_at, processing_time_ms, \
    failure_reason, created_at, updated_at";

pub(crate) struct CreateGradingResult<'a> {
    pub(crate) grade_id: &'a str,
    pub(crate) submission_id: &'a str,
    pub(crate) ai_score: f64,
    pub(crate) final_score: f64,
    pub(crate) confidence_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) question_results: Value,
    pub(crate) feedback: &'a str,
    pub(crate) processing_time_ms: i64,
    pub(crate) failure_reason: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) struct ReviewFields<'a> {
    pub(crate) final_score: f64,
    pub(crate) teacher_override: bool,
    pub(crate) question_results: Option<Value>,
    pub(crate) reviewed_by: Option<&'a str>,
    pub(crate) reviewed_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_submission(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "SELECT {COLUMNS} FROM grading_results WHERE submission_id = $1"
    ))
    .bind(submission_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_grade_id(
    pool: &PgPool,
    grade_id: &str,
) -> Result<Option<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "SELECT {COLUMNS} FROM grading_results WHERE grade_id = $1"
    ))
    .bind(grade_id)
    .fetch_optional(pool)
    .await
}

/// Inserts unless the submission already has a result; `None` means the
/// unique constraint on `submission_id` kept the existing row.
pub(crate) async fn insert_if_absent(
    conn: &mut PgConnection,
    params: CreateGradingResult<'_>,
) -> Result<Option<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "INSERT INTO grading_results (
            grade_id, submission_id, ai_score, final_score, confidence_score, needs_review,
            question_results, feedback, teacher_override, processing_time_ms, failure_reason,
            created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, $9, $10, $11, $11)
         ON CONFLICT (submission_id) DO NOTHING
         RETURNING {COLUMNS}"
    ))
    .bind(params.grade_id)
    .bind(params.submission_id)
    .bind(params.ai_score)
    .bind(params.final_score)
    .bind(params.confidence_score)
    .bind(params.needs_review)
    .bind(Json(params.question_results))
    .bind(params.feedback)
    .bind(params.processing_time_ms)
    .bind(params.failure_reason)
    .bind(params.created_at)
    .fetch_optional(conn)
    .await
}

/// Writes every review field in one statement so readers never observe a
/// half-applied review.
pub(crate) async fn apply_review(
    pool: &PgPool,
    grade_id: &str,
    fields: ReviewFields<'_>,
) -> Result<Option<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "UPDATE grading_results
         SET final_score = $1,
             teacher_override = $2,
             question_results = COALESCE($3, question_results),
             reviewed_by = $4,
             reviewed_at = $5,
             needs_review = FALSE,
             updated_at = $5
         WHERE grade_id = $6
         RETURNING {COLUMNS}"
    ))
    .bind(fields.final_score)
    .bind(fields.teacher_override)
    .bind(fields.question_results.map(Json))
    .bind(fields.reviewed_by)
    .bind(fields.reviewed_at)
    .bind(grade_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_pending_reviews(pool: &PgPool) -> Result<Vec<GradingResult>, sqlx::Error> {
    sqlx::query_as::<_, GradingResult>(&format!(
        "SELECT {COLUMNS}
         FROM grading_results
         WHERE needs_review = TRUE AND reviewed_at IS NULL
         ORDER BY created_at, id"
    ))
    .fetch_all(pool)
    .await
}
