use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::GradingResult;
use crate::services::grading::{EnqueueReceipt, ReviewRequest};

#[derive(Debug, Serialize)]
pub(crate) struct GradingResultResponse {
    pub(crate) grade_id: String,
    pub(crate) submission_id: String,
    pub(crate) ai_score: f64,
    pub(crate) final_score: f64,
    pub(crate) confidence_score: f64,
    pub(crate) needs_review: bool,
    pub(crate) question_results: serde_json::Value,
    pub(crate) feedback: String,
    pub(crate) teacher_override: bool,
    pub(crate) reviewed_by: Option<String>,
    pub(crate) reviewed_at: Option<String>,
    pub(crate) processing_time_ms: i64,
    pub(crate) failed: bool,
    pub(crate) failure_reason: Option<String>,
    pub(crate) created_at: String,
}

impl From<GradingResult> for GradingResultResponse {
    fn from(result: GradingResult) -> Self {
        Self {
            failed: result.is_failure(),
            grade_id: result.grade_id,
            submission_id: result.submission_id,
            ai_score: result.ai_score,
            final_score: result.final_score,
            confidence_score: result.confidence_score,
            needs_review: result.needs_review,
            question_results: result.question_results.0,
            feedback: result.feedback,
            teacher_override: result.teacher_override,
            reviewed_by: result.reviewed_by,
            reviewed_at: result.reviewed_at.map(format_primitive),
            processing_time_ms: result.processing_time_ms,
            failure_reason: result.failure_reason,
            created_at: format_primitive(result.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EnqueueResponse {
    pub(crate) submission_id: String,
    pub(crate) status: &'static str,
    pub(crate) timestamp: String,
    pub(crate) grade_id: Option<String>,
}

impl From<EnqueueReceipt> for EnqueueResponse {
    fn from(receipt: EnqueueReceipt) -> Self {
        Self {
            submission_id: receipt.submission_id,
            status: receipt.status.as_str(),
            timestamp: receipt
                .timestamp
                .format(&Rfc3339)
                .unwrap_or_else(|_| receipt.timestamp.to_string()),
            grade_id: receipt.grade_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PendingReviewsResponse {
    pub(crate) items: Vec<GradingResultResponse>,
    pub(crate) total: usize,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviewGradeRequest {
    #[serde(alias = "finalScore")]
    #[validate(range(min = 0.0, max = 100.0, message = "final_score must be between 0 and 100"))]
    pub(crate) final_score: f64,
    #[serde(default, alias = "teacherOverride")]
    pub(crate) teacher_override: bool,
    #[serde(default, alias = "questionScores")]
    pub(crate) question_scores: Option<serde_json::Value>,
    #[serde(default, alias = "reviewedBy")]
    #[validate(length(min = 1, message = "reviewed_by must not be empty"))]
    pub(crate) reviewed_by: Option<String>,
}

impl From<ReviewGradeRequest> for ReviewRequest {
    fn from(request: ReviewGradeRequest) -> Self {
        Self {
            final_score: request.final_score,
            teacher_override: request.teacher_override,
            question_scores: request.question_scores,
            reviewed_by: request.reviewed_by,
        }
    }
}
