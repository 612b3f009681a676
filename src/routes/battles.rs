use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::battle::{
        AnswerAccepted, BattleResultsResponse, CreateBattleRequest, JoinBattleRequest,
        ParticipantRequest, RoomSnapshot, SubmitAnswerRequest,
    },
    error::{AppError, ErrorBody},
    services::battle_service,
    state::SharedState,
};

/// Routes driving battle rooms over plain HTTP.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/battles", post(create_battle))
        .route("/battles/join", post(join_battle))
        .route("/battles/{id}", get(get_battle))
        .route("/battles/{id}/ready", post(ready))
        .route("/battles/{id}/answers", post(submit_answer))
        .route("/battles/{id}/leave", post(leave))
        .route("/battles/{id}/results", get(results))
}

/// Open a new waiting room.
#[utoipa::path(
    post,
    path = "/battles",
    tag = "battles",
    request_body = CreateBattleRequest,
    responses(
        (status = 201, description = "Room created", body = RoomSnapshot),
        (status = 400, description = "Invalid parameters or not enough pool questions", body = ErrorBody),
        (status = 502, description = "Question generation failed", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn create_battle(
    State(state): State<SharedState>,
    Json(payload): Json<CreateBattleRequest>,
) -> Result<(StatusCode, Json<RoomSnapshot>), AppError> {
    payload.validate()?;
    let snapshot = battle_service::create_room(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Join a waiting room by its code.
#[utoipa::path(
    post,
    path = "/battles/join",
    tag = "battles",
    request_body = JoinBattleRequest,
    responses(
        (status = 200, description = "Seat taken", body = RoomSnapshot),
        (status = 404, description = "No live room holds the code", body = ErrorBody),
        (status = 409, description = "Room full, already joined or not waiting", body = ErrorBody)
    )
)]
pub async fn join_battle(
    State(state): State<SharedState>,
    Json(payload): Json<JoinBattleRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    payload.validate()?;
    let snapshot = battle_service::join_room(&state, payload).await?;
    Ok(Json(snapshot))
}

/// Current snapshot of a room.
#[utoipa::path(
    get,
    path = "/battles/{id}",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSnapshot),
        (status = 404, description = "Unknown room", body = ErrorBody)
    )
)]
pub async fn get_battle(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = battle_service::room_snapshot(&state, id).await?;
    Ok(Json(snapshot))
}

/// Mark a participant ready.
#[utoipa::path(
    post,
    path = "/battles/{id}/ready",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = ParticipantRequest,
    responses(
        (status = 200, description = "Participant ready", body = RoomSnapshot),
        (status = 409, description = "Not a participant or room not waiting", body = ErrorBody)
    )
)]
pub async fn ready(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ParticipantRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = battle_service::set_ready(&state, id, payload.user_id).await?;
    Ok(Json(snapshot))
}

/// Answer the current question.
#[utoipa::path(
    post,
    path = "/battles/{id}/answers",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerAccepted),
        (status = 409, description = "Stale question, duplicate answer or room not in progress", body = ErrorBody)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<AnswerAccepted>, AppError> {
    let accepted = battle_service::submit_answer(&state, id, payload).await?;
    Ok(Json(accepted))
}

/// Leave a room.
#[utoipa::path(
    post,
    path = "/battles/{id}/leave",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = ParticipantRequest,
    responses(
        (status = 200, description = "Participant left", body = RoomSnapshot),
        (status = 409, description = "Not a participant", body = ErrorBody)
    )
)]
pub async fn leave(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ParticipantRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = battle_service::leave_room(&state, id, payload.user_id).await?;
    Ok(Json(snapshot))
}

/// Final standings of a completed room.
#[utoipa::path(
    get,
    path = "/battles/{id}/results",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Results in rank order", body = BattleResultsResponse),
        (status = 409, description = "Room not completed yet", body = ErrorBody)
    )
)]
pub async fn results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BattleResultsResponse>, AppError> {
    let results = battle_service::room_results(&state, id).await?;
    Ok(Json(results))
}
