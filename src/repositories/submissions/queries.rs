use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

use super::types::{COLUMNS, LAST_SIGN_OF_LIFE, UNGRADED};

const STALE_BATCH: i64 = 100;

pub(crate) async fn find_by_id(
    pool: &PgPool,
    submission_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("SELECT {COLUMNS} FROM submissions WHERE id = $1"))
        .bind(submission_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_stale(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS}
         FROM submissions
         WHERE {UNGRADED}
           AND ((status = $1 AND {LAST_SIGN_OF_LIFE} < $3)
                OR (status = $2 AND queued_at < $3))
         ORDER BY updated_at
         LIMIT $4"
    ))
    .bind(SubmissionStatus::Processing)
    .bind(SubmissionStatus::Pending)
    .bind(cutoff)
    .bind(STALE_BATCH)
    .fetch_all(pool)
    .await
}
