use sqlx::{PgConnection, PgPool};
use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;

use super::types::{LAST_SIGN_OF_LIFE, UNGRADED};

pub(crate) async fn claim_for_grading(
    pool: &PgPool,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(&format!(
        "UPDATE submissions
         SET status = $1,
             grading_started_at = $2,
             grading_heartbeat_at = $2,
             updated_at = $2
         WHERE id = $3
           AND status = $4
           AND {UNGRADED}"
    ))
    .bind(SubmissionStatus::Processing)
    .bind(now)
    .bind(submission_id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Pushes the heartbeat of a claim that is still PROCESSING. Returns `false`
/// once the claim has been finished or taken back by stale recovery.
pub(crate) async fn refresh_claim(
    pool: &PgPool,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET grading_heartbeat_at = $1
         WHERE id = $2 AND status = $3",
    )
    .bind(now)
    .bind(submission_id)
    .bind(SubmissionStatus::Processing)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn mark_pending(
    pool: &PgPool,
    submission_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE submissions
         SET queued_at = $1,
             updated_at = $1
         WHERE id = $2 AND status = $3",
    )
    .bind(now)
    .bind(submission_id)
    .bind(SubmissionStatus::Pending)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}

pub(crate) async fn set_terminal_status(
    conn: &mut PgConnection,
    submission_id: &str,
    status: SubmissionStatus,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE submissions SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(now)
        .bind(submission_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub(crate) async fn reset_stale(
    pool: &PgPool,
    submission_id: &str,
    cutoff: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(&format!(
        "UPDATE submissions
         SET status = $1,
             grading_started_at = NULL,
             grading_heartbeat_at = NULL,
             queued_at = $2,
             updated_at = $2
         WHERE id = $3
           AND {UNGRADED}
           AND ((status = $4 AND {LAST_SIGN_OF_LIFE} < $5)
                OR (status = $1 AND queued_at < $5))"
    ))
    .bind(SubmissionStatus::Pending)
    .bind(now)
    .bind(submission_id)
    .bind(SubmissionStatus::Processing)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(updated.rows_affected() == 1)
}
