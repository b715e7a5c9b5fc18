use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::core::config::Settings;
use crate::core::time::primitive_now_utc;
use crate::db::models::{GradingResult, RubricEntry, Submission};
use crate::db::types::SubmissionStatus;
use crate::services::grading::aggregate::{aggregate, resolve_review_threshold, QuestionOutcome};
use crate::services::grading::errors::GradingError;
use crate::services::grading::lease::SubmissionLeases;
use crate::services::grading::model::{GradingModel, QuestionGradeRequest};
use crate::services::grading::retry::{with_retry, RetryError, RetryPolicy};
use crate::services::grading::store::{GradingPorts, NewGradingResult, RecordOutcome, ReviewUpdate};

pub(crate) const MANUAL_REVIEW_FEEDBACK: &str =
    "Automatic grading failed; this submission requires manual review by a teacher.";

/// Configuration resolved once at construction and passed explicitly.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GradingConfig {
    pub(crate) retry: RetryPolicy,
    pub(crate) review_threshold: f64,
    /// How often a running attempt refreshes its PROCESSING claim.
    pub(crate) heartbeat: Duration,
}

impl GradingConfig {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            retry: RetryPolicy::from_settings(settings),
            review_threshold: settings.grading().confidence_threshold,
            heartbeat: settings.grading().heartbeat_interval(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ReviewRequest {
    pub(crate) final_score: f64,
    pub(crate) teacher_override: bool,
    /// Replaces the stored per-question array verbatim when present.
    pub(crate) question_scores: Option<Value>,
    pub(crate) reviewed_by: Option<String>,
}

pub(crate) struct GradingOrchestrator {
    ports: GradingPorts,
    model: Arc<dyn GradingModel>,
    config: GradingConfig,
    leases: SubmissionLeases,
    shutdown: watch::Receiver<bool>,
}

impl GradingOrchestrator {
    pub(crate) fn new(
        ports: GradingPorts,
        model: Arc<dyn GradingModel>,
        config: GradingConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { ports, model, config, leases: SubmissionLeases::default(), shutdown }
    }

    pub(crate) fn ports(&self) -> &GradingPorts {
        &self.ports
    }

    /// Grades a submission once. Later calls return the stored result without
    /// touching the model or the submission.
    pub(crate) async fn grade(&self, submission_id: &str) -> Result<GradingResult, GradingError> {
        if let Some(existing) = self.ports.results.find_by_submission(submission_id).await? {
            tracing::debug!(submission_id, grade_id = %existing.grade_id, "Submission already graded");
            return Ok(existing);
        }

        let _lease = self.leases.acquire(submission_id).await;

        if let Some(existing) = self.ports.results.find_by_submission(submission_id).await? {
            tracing::debug!(submission_id, grade_id = %existing.grade_id, "Graded while waiting for lease");
            return Ok(existing);
        }

        let submission = self
            .ports
            .submissions
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| GradingError::not_found("submission", submission_id))?;

        let template_id = submission
            .exam_template_id
            .clone()
            .ok_or_else(|| GradingError::not_found("exam template for submission", submission_id))?;

        let mut rubrics = self.ports.rubrics.rubrics_for_template(&template_id).await?;
        if rubrics.is_empty() {
            return Err(GradingError::not_found("rubric entries for template", template_id));
        }
        rubrics.sort_by_key(|rubric| rubric.question_number);

        let image_location = submission
            .first_image_location()
            .ok_or_else(|| GradingError::not_found("answer image for submission", submission_id))?;

        let teacher_threshold =
            self.ports.thresholds.teacher_review_threshold(&submission.assignment_id).await?;
        let threshold = resolve_review_threshold(self.config.review_threshold, teacher_threshold);

        let started = Instant::now();
        if !self.ports.submissions.claim_for_grading(submission_id, primitive_now_utc()).await? {
            if let Some(existing) = self.ports.results.find_by_submission(submission_id).await? {
                return Ok(existing);
            }
            tracing::info!(submission_id, "Submission claimed by another grading attempt");
            return Err(GradingError::InProgress(submission_id.to_string()));
        }

        tracing::info!(
            submission_id,
            template_id = %template_id,
            questions = rubrics.len(),
            threshold,
            active_leases = self.leases.active(),
            "Grading submission"
        );

        let graded = self
            .with_claim_heartbeat(
                submission_id,
                self.grade_questions(&submission, &image_location, &rubrics),
            )
            .await;

        match graded {
            Ok(outcomes) => self.record_success(&submission, &outcomes, threshold, started).await,
            Err(cause) => self.record_failure(&submission, cause, started).await,
        }
    }

    /// Drives `work` to completion while refreshing the claim heartbeat, so
    /// stale recovery only takes over attempts that stopped running.
    async fn with_claim_heartbeat<T>(&self, submission_id: &str, work: impl Future<Output = T>) -> T {
        let period = self.config.heartbeat.max(Duration::from_millis(1));
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(work);

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = heartbeat.tick() => self.refresh_claim(submission_id).await,
            }
        }
    }

    async fn refresh_claim(&self, submission_id: &str) {
        match self.ports.submissions.refresh_claim(submission_id, primitive_now_utc()).await {
            Ok(true) => tracing::trace!(submission_id, "Grading claim refreshed"),
            Ok(false) => tracing::warn!(submission_id, "Grading claim no longer held"),
            Err(err) => {
                tracing::warn!(submission_id, error = %err, "Failed to refresh grading claim")
            }
        }
    }

    /// Issues the model calls strictly in ascending question order and stops
    /// at the first terminal failure.
    async fn grade_questions(
        &self,
        submission: &Submission,
        image_location: &str,
        rubrics: &[RubricEntry],
    ) -> Result<Vec<QuestionOutcome>, RetryError> {
        let mut shutdown = self.shutdown.clone();
        let mut outcomes = Vec::with_capacity(rubrics.len());

        for rubric in rubrics {
            let request = QuestionGradeRequest {
                submission_id: submission.id.clone(),
                image_location: image_location.to_string(),
                file_format: submission.file_format.clone(),
                question_number: rubric.question_number,
                expected_answer: rubric.expected_answer.clone(),
                acceptable_variations: rubric.acceptable_variations.0.clone(),
                grading_notes: rubric.grading_notes.clone(),
                points_available: rubric.points_available,
            };
            let operation =
                format!("grade_question(submission={}, question={})", submission.id, rubric.question_number);

            let grade = with_retry(self.config.retry, &operation, &mut shutdown, || {
                self.model.grade_question(&request)
            })
            .await?;

            outcomes.push(QuestionOutcome {
                question_number: rubric.question_number,
                points_awarded: grade.points_awarded,
                points_available: rubric.points_available,
                confidence: grade.confidence,
                feedback: grade.feedback,
                illegible: grade.illegible,
            });
        }

        Ok(outcomes)
    }

    async fn record_success(
        &self,
        submission: &Submission,
        outcomes: &[QuestionOutcome],
        threshold: f64,
        started: Instant,
    ) -> Result<GradingResult, GradingError> {
        let summary = aggregate(outcomes, threshold);
        let processing_time = started.elapsed();

        let record = NewGradingResult {
            grade_id: new_grade_id(),
            submission_id: submission.id.clone(),
            ai_score: summary.ai_score,
            final_score: summary.ai_score,
            confidence_score: summary.confidence_score,
            needs_review: summary.needs_review,
            question_results: summary.question_results,
            feedback: summary.feedback,
            processing_time_ms: processing_time.as_millis() as i64,
            failure_reason: None,
            created_at: primitive_now_utc(),
        };

        match self.ports.results.record_outcome(record, SubmissionStatus::Completed).await? {
            RecordOutcome::Inserted(result) => {
                metrics::counter!("grading_jobs_total", "status" => "completed").increment(1);
                metrics::histogram!("grading_duration_seconds").record(processing_time.as_secs_f64());
                tracing::info!(
                    submission_id = %submission.id,
                    grade_id = %result.grade_id,
                    ai_score = result.ai_score,
                    confidence_score = result.confidence_score,
                    needs_review = result.needs_review,
                    processing_time_ms = result.processing_time_ms,
                    "Submission graded"
                );
                Ok(result)
            }
            RecordOutcome::Existing(result) => {
                tracing::warn!(
                    submission_id = %submission.id,
                    grade_id = %result.grade_id,
                    "Discarding result, submission was graded concurrently"
                );
                Ok(result)
            }
        }
    }

    /// Persists the FAILED record before the failure is surfaced.
    async fn record_failure(
        &self,
        submission: &Submission,
        cause: RetryError,
        started: Instant,
    ) -> Result<GradingResult, GradingError> {
        let record = NewGradingResult {
            grade_id: new_grade_id(),
            submission_id: submission.id.clone(),
            ai_score: 0.0,
            final_score: 0.0,
            confidence_score: 0.0,
            needs_review: true,
            question_results: Value::Array(Vec::new()),
            feedback: MANUAL_REVIEW_FEEDBACK.to_string(),
            processing_time_ms: started.elapsed().as_millis() as i64,
            failure_reason: Some(cause.to_string()),
            created_at: primitive_now_utc(),
        };

        match self.ports.results.record_outcome(record, SubmissionStatus::Failed).await? {
            RecordOutcome::Inserted(result) => {
                metrics::counter!("grading_jobs_total", "status" => "failed").increment(1);
                tracing::error!(
                    submission_id = %submission.id,
                    grade_id = %result.grade_id,
                    kind = cause.kind(),
                    error = %cause,
                    "Grading failed, submission flagged for manual review"
                );
                Err(GradingError::GradingFailed {
                    submission_id: submission.id.clone(),
                    grade_id: result.grade_id,
                    cause,
                })
            }
            RecordOutcome::Existing(result) => {
                tracing::warn!(
                    submission_id = %submission.id,
                    grade_id = %result.grade_id,
                    error = %cause,
                    "Grading failed but a result was recorded concurrently"
                );
                Ok(result)
            }
        }
    }

    pub(crate) async fn get_result(&self, submission_id: &str) -> Result<GradingResult, GradingError> {
        self.ports
            .results
            .find_by_submission(submission_id)
            .await?
            .ok_or_else(|| GradingError::not_found("grading result for submission", submission_id))
    }

    pub(crate) async fn get_grade(&self, grade_id: &str) -> Result<GradingResult, GradingError> {
        self.ports
            .results
            .find_by_grade_id(grade_id)
            .await?
            .ok_or_else(|| GradingError::not_found("grading result", grade_id))
    }

    pub(crate) async fn get_pending_reviews(&self) -> Result<Vec<GradingResult>, GradingError> {
        Ok(self.ports.results.list_pending_reviews().await?)
    }

    /// Overwrites the review fields of a result. Always clears `needs_review`
    /// and never calls the model.
    pub(crate) async fn review_grade(
        &self,
        grade_id: &str,
        request: ReviewRequest,
    ) -> Result<GradingResult, GradingError> {
        if !request.final_score.is_finite() || !(0.0..=100.0).contains(&request.final_score) {
            return Err(GradingError::Validation(format!(
                "final_score must be between 0 and 100, got {}",
                request.final_score
            )));
        }

        if let Some(scores) = &request.question_scores {
            if !scores.is_array() {
                return Err(GradingError::Validation(
                    "question_scores must be an array".to_string(),
                ));
            }
        }

        let update = ReviewUpdate {
            final_score: request.final_score,
            teacher_override: request.teacher_override,
            question_results: request.question_scores,
            reviewed_by: request.reviewed_by,
            reviewed_at: primitive_now_utc(),
        };

        let result = self
            .ports
            .results
            .apply_review(grade_id, update)
            .await?
            .ok_or_else(|| GradingError::not_found("grading result", grade_id))?;

        metrics::counter!("grading_reviews_total").increment(1);
        tracing::info!(
            grade_id,
            submission_id = %result.submission_id,
            final_score = result.final_score,
            teacher_override = result.teacher_override,
            "Grade reviewed"
        );

        Ok(result)
    }
}

fn new_grade_id() -> String {
    format!("grd_{}", Uuid::new_v4().simple())
}
