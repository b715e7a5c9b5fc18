use sqlx::PgPool;

use crate::db::models::RubricEntry;

pub(crate) const COLUMNS: &str = "\
    id, exam_template_id, question_number, expected_answer, acceptable_variations, \
    grading_notes, points_available";

pub(crate) async fn list_by_template(
    pool: &PgPool,
    exam_template_id: &str,
) -> Result<Vec<RubricEntry>, sqlx::Error> {
    sqlx::query_as::<_, RubricEntry>(&format!(
        "SELECT {COLUMNS} FROM rubric_entries WHERE exam_template_id = $1 ORDER BY question_number"
    ))
    .bind(exam_template_id)
    .fetch_all(pool)
    .await
}
