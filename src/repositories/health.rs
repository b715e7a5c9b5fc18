use sqlx::{FromRow, PgPool};

use crate::db::types::SubmissionStatus;

/// Counts surfaced by the health endpoint.
#[derive(Debug, Clone, Copy, FromRow)]
pub(crate) struct GradingBacklog {
    pub(crate) pending: i64,
    pub(crate) processing: i64,
    pub(crate) awaiting_review: i64,
}

pub(crate) async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

pub(crate) async fn grading_backlog(pool: &PgPool) -> Result<GradingBacklog, sqlx::Error> {
    sqlx::query_as::<_, GradingBacklog>(
        "SELECT
            (SELECT COUNT(*) FROM submissions WHERE status = $1) AS pending,
            (SELECT COUNT(*) FROM submissions WHERE status = $2) AS processing,
            (SELECT COUNT(*) FROM grading_results
             WHERE needs_review = TRUE AND reviewed_at IS NULL) AS awaiting_review",
    )
    .bind(SubmissionStatus::Pending)
    .bind(SubmissionStatus::Processing)
    .fetch_one(pool)
    .await
}
