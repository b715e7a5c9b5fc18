use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::grading::{
    EnqueueResponse, GradingResultResponse, PendingReviewsResponse, ReviewGradeRequest,
};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/submissions/:submission_id/enqueue", post(enqueue_grading))
        .route("/submissions/:submission_id/grade", post(grade_submission))
        .route("/submissions/:submission_id/result", get(get_result))
        .route("/reviews/pending", get(list_pending_reviews))
        .route("/grades/:grade_id", get(get_grade))
        .route("/grades/:grade_id/review", post(review_grade))
}

async fn enqueue_grading(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<EnqueueResponse>, ApiError> {
    let receipt = state.front_door().enqueue_grading(&submission_id).await?;
    Ok(Json(receipt.into()))
}

async fn grade_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GradingResultResponse>, ApiError> {
    let result = state.orchestrator().grade(&submission_id).await?;
    Ok(Json(result.into()))
}

async fn get_result(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GradingResultResponse>, ApiError> {
    let result = state.orchestrator().get_result(&submission_id).await?;
    Ok(Json(result.into()))
}

async fn get_grade(
    Path(grade_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GradingResultResponse>, ApiError> {
    let result = state.orchestrator().get_grade(&grade_id).await?;
    Ok(Json(result.into()))
}

async fn list_pending_reviews(
    State(state): State<AppState>,
) -> Result<Json<PendingReviewsResponse>, ApiError> {
    let items: Vec<GradingResultResponse> = state
        .orchestrator()
        .get_pending_reviews()
        .await?
        .into_iter()
        .map(GradingResultResponse::from)
        .collect();

    Ok(Json(PendingReviewsResponse { total: items.len(), items }))
}

async fn review_grade(
    Path(grade_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<ReviewGradeRequest>,
) -> Result<Json<GradingResultResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let result = state.orchestrator().review_grade(&grade_id, payload.into()).await?;
    Ok(Json(result.into()))
}
