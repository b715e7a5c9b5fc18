pub(crate) const COLUMNS: &str = "\
    id, assignment_id, student_id, exam_template_id, image_locations, file_format, status, \
    submitted_at, grading_started_at, grading_heartbeat_at, queued_at, created_at, updated_at";

/// Submissions that already carry a grading result are never re-graded.
pub(super) const UNGRADED: &str =
    "NOT EXISTS (SELECT 1 FROM grading_results gr WHERE gr.submission_id = submissions.id)";

/// Latest proof that a PROCESSING attempt is alive.
pub(super) const LAST_SIGN_OF_LIFE: &str = "COALESCE(grading_heartbeat_at, grading_started_at)";
