use sqlx::PgPool;

/// Review threshold set by the teacher who owns `assignment_id`, if any.
pub(crate) async fn find_threshold_for_assignment(
    pool: &PgPool,
    assignment_id: &str,
) -> Result<Option<f64>, sqlx::Error> {
    let threshold = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT t.confidence_threshold
         FROM assignments a
         JOIN teacher_grading_settings t ON t.teacher_id = a.teacher_id
         WHERE a.id = $1",
    )
    .bind(assignment_id)
    .fetch_optional(pool)
    .await?;

    Ok(threshold.flatten())
}
