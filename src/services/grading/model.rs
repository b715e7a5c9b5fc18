use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything the model needs to grade one rubric question against the
/// submitted answer image.
#[derive(Debug, Clone)]
pub(crate) struct QuestionGradeRequest {
    pub(crate) submission_id: String,
    pub(crate) image_location: String,
    pub(crate) file_format: Option<String>,
    pub(crate) question_number: i32,
    pub(crate) expected_answer: String,
    pub(crate) acceptable_variations: Vec<String>,
    pub(crate) grading_notes: Option<String>,
    pub(crate) points_available: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionGrade {
    pub(crate) points_awarded: f64,
    /// Self-reported certainty in `[0.0, 1.0]`.
    pub(crate) confidence: f64,
    pub(crate) feedback: String,
    pub(crate) illegible: bool,
}

/// Failure classes signalled by the model endpoint. Only `RateLimited` is
/// transient; the retry wrapper gives up immediately on everything else.
#[derive(Debug, Clone, Error)]
pub(crate) enum ModelError {
    #[error("model endpoint rate limited the request")]
    RateLimited,
    #[error("model endpoint rejected the request ({status}): {message}")]
    Client { status: u16, message: String },
    #[error("model endpoint failed ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("model returned a malformed response: {0}")]
    Malformed(String),
    #[error("model request failed: {0}")]
    Transport(String),
}

impl ModelError {
    pub(crate) fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Client { .. } => "client_error",
            Self::Server { .. } => "server_error",
            Self::Malformed(_) => "malformed",
            Self::Transport(_) => "transport_error",
        }
    }
}

#[async_trait]
pub(crate) trait GradingModel: Send + Sync {
    async fn grade_question(
        &self,
        request: &QuestionGradeRequest,
    ) -> Result<QuestionGrade, ModelError>;
}
