use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse},
    error::{AppError, ErrorBody},
    services::leaderboard_service,
    state::SharedState,
};

/// Leaderboard routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

/// Global leaderboard computed from every recorded answer.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard, best first", body = LeaderboardResponse),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let board = leaderboard_service::leaderboard(&state, query).await?;
    Ok(Json(board))
}
