use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::services::grading::model::{
    GradingModel, ModelError, QuestionGrade, QuestionGradeRequest,
};

const GRADING_SYSTEM_PROMPT: &str = r#"You are an experienced teacher grading one question of a student's handwritten exam.
You receive a photo or scan of the student's answer sheet, the question number, the expected answer,
any acceptable variations, optional grading notes and the number of points available.

Grade ONLY the requested question. Award partial credit where the rubric allows it and never award
more than the points available.

If the answer for the requested question cannot be read, set "illegible" to true, award 0 points
and explain the problem in "feedback".

Respond with strict JSON:
{
  "points_awarded": <number>,
  "confidence": <number between 0.0 and 1.0>,
  "feedback": "<short feedback for the student>",
  "illegible": <true|false>
}
"#;

const ERROR_BODY_LIMIT: usize = 512;

/// OpenAI-compatible chat completions client that grades one question per call.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiGradingModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    #[serde(alias = "pointsAwarded", alias = "points")]
    points_awarded: f64,
    #[serde(alias = "confidenceScore", alias = "confidence_score")]
    confidence: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default, alias = "unreadable")]
    illegible: bool,
}

impl OpenAiGradingModel {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.ai().connect_timeout())
            .timeout(settings.ai().request_timeout())
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build HTTP client: {err}"))?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
            temperature: settings.ai().ai_temperature,
        })
    }

    fn build_payload(&self, request: &QuestionGradeRequest) -> Value {
        let variations = if request.acceptable_variations.is_empty() {
            "none".to_string()
        } else {
            request.acceptable_variations.join("; ")
        };

        let user_prompt = format!(
            "Question number: {}\nPoints available: {}\nExpected answer:\n{}\n\nAcceptable variations: {}\n\nGrading notes:\n{}\n\nGrade the student's answer to question {} on the attached image.",
            request.question_number,
            request.points_available,
            request.expected_answer,
            variations,
            request.grading_notes.as_deref().unwrap_or("none"),
            request.question_number,
        );

        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": GRADING_SYSTEM_PROMPT},
                {"role": "user", "content": [
                    {"type": "text", "text": user_prompt},
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": image_url(&request.image_location, request.file_format.as_deref())
                        }
                    }
                ]}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        })
    }
}

#[async_trait]
impl GradingModel for OpenAiGradingModel {
    async fn grade_question(
        &self,
        request: &QuestionGradeRequest,
    ) -> Result<QuestionGrade, ModelError> {
        let timer = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(request);

        tracing::debug!(
            submission_id = %request.submission_id,
            question_number = request.question_number,
            model = %self.model,
            "Sending question grading request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ModelError::Transport(err.to_string()));

        let result = match response {
            Ok(response) => read_response(response, request.points_available).await,
            Err(err) => Err(err),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.outcome_label(),
        };
        metrics::counter!("grading_model_requests_total", "outcome" => outcome).increment(1);

        match &result {
            Ok(grade) => tracing::info!(
                submission_id = %request.submission_id,
                question_number = request.question_number,
                points_awarded = grade.points_awarded,
                confidence = grade.confidence,
                illegible = grade.illegible,
                duration_ms = timer.elapsed().as_millis() as u64,
                "Question graded"
            ),
            Err(err) => tracing::warn!(
                submission_id = %request.submission_id,
                question_number = request.question_number,
                error = %err,
                "Question grading request failed"
            ),
        }

        result
    }
}

async fn read_response(
    response: reqwest::Response,
    points_available: f64,
) -> Result<QuestionGrade, ModelError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }

    let body: Value =
        response.json().await.map_err(|err| ModelError::Malformed(err.to_string()))?;

    let content = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|value| value.as_str())
        .ok_or_else(|| ModelError::Malformed("missing message content".to_string()))?;

    parse_verdict(content, points_available)
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> ModelError {
    let message: String = body.chars().take(ERROR_BODY_LIMIT).collect();

    if status == StatusCode::TOO_MANY_REQUESTS {
        ModelError::RateLimited
    } else if status.is_client_error() {
        ModelError::Client { status: status.as_u16(), message }
    } else {
        ModelError::Server { status: status.as_u16(), message }
    }
}

/// Parses the model's JSON verdict and clamps it into the valid ranges:
/// confidence to `[0, 1]` and points to `[0, points_available]`.
pub(crate) fn parse_verdict(
    content: &str,
    points_available: f64,
) -> Result<QuestionGrade, ModelError> {
    let trimmed = strip_code_fence(content);
    let verdict: ModelVerdict =
        serde_json::from_str(trimmed).map_err(|err| ModelError::Malformed(err.to_string()))?;

    if !verdict.points_awarded.is_finite() || !verdict.confidence.is_finite() {
        return Err(ModelError::Malformed("non-finite score in verdict".to_string()));
    }

    Ok(QuestionGrade {
        points_awarded: verdict.points_awarded.clamp(0.0, points_available.max(0.0)),
        confidence: verdict.confidence.clamp(0.0, 1.0),
        feedback: verdict.feedback.trim().to_string(),
        illegible: verdict.illegible,
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Remote and data URLs pass through; anything else is treated as an inline
/// base64 payload of the submission's file format.
pub(crate) fn image_url(location: &str, file_format: Option<&str>) -> String {
    if location.starts_with("http://")
        || location.starts_with("https://")
        || location.starts_with("data:")
    {
        return location.to_string();
    }

    format!("data:{};base64,{location}", mime_type(file_format))
}

fn mime_type(file_format: Option<&str>) -> &'static str {
    match file_format.map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase()) {
        Some(ref format) if format == "png" => "image/png",
        Some(ref format) if format == "webp" => "image/webp",
        Some(ref format) if format == "gif" => "image/gif",
        Some(ref format) if format == "pdf" => "application/pdf",
        _ => "image/jpeg",
    }
}
