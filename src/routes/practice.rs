use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    dto::practice::{PracticeAnswerRequest, PracticeAnswerResponse},
    error::{AppError, ErrorBody},
    services::practice_service,
    state::SharedState,
};

/// Practice routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/practice/answers", post(record_practice_answer))
}

/// Record an answer given outside of any battle.
#[utoipa::path(
    post,
    path = "/practice/answers",
    tag = "practice",
    request_body = PracticeAnswerRequest,
    responses(
        (status = 201, description = "Answer recorded", body = PracticeAnswerResponse),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn record_practice_answer(
    State(state): State<SharedState>,
    Json(payload): Json<PracticeAnswerRequest>,
) -> Result<(StatusCode, Json<PracticeAnswerResponse>), AppError> {
    let recorded = practice_service::record_answer(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
