use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::SubmissionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) exam_template_id: Option<String>,
    /// JSON array of image locations, stored as text by the upload service.
    pub(crate) image_locations: Option<String>,
    pub(crate) file_format: Option<String>,
    pub(crate) status: SubmissionStatus,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) grading_started_at: Option<PrimitiveDateTime>,
    /// Refreshed while an attempt runs; stale recovery only takes over
    /// attempts whose heartbeat has gone quiet.
    pub(crate) grading_heartbeat_at: Option<PrimitiveDateTime>,
    pub(crate) queued_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Submission {
    /// First entry of `image_locations`, or `None` when the list is absent,
    /// empty, unparsable or starts with a blank entry.
    pub(crate) fn first_image_location(&self) -> Option<String> {
        let raw = self.image_locations.as_deref()?;
        let locations: Vec<String> = serde_json::from_str(raw).ok()?;
        locations.into_iter().next().filter(|location| !location.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct RubricEntry {
    pub(crate) id: String,
    pub(crate) exam_template_id: String,
    pub(crate) question_number: i32,
    pub(crate) expected_answer: String,
    pub(crate) acceptable_variations: Json<Vec<String>>,
    pub(crate) grading_notes: Option<String>,
    pub(crate) points_available: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradingResult {
    pub(crate) id: i64,
    pub(crate) grade_id: String,
    pub(crate) submission_id: String,
    pub(crate) ai_score: f64,
    pub(crate) final_score: f64,
    pub(crate) confidence_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) question_results: Json<serde_json::Value>,
    pub(crate) feedback: String,
    pub(crate) teacher_override: bool,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<PrimitiveDateTime>,
    pub(crate) processing_time_ms: i64,
    pub(crate) failure_reason: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl GradingResult {
    pub(crate) fn is_failure(&self) -> bool {
        self.failure_reason.is_some()
    }
}
