use axum::Router;

use crate::state::SharedState;

pub mod battles;
pub mod docs;
pub mod health;
pub mod leaderboard;
pub mod practice;
pub mod sse;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(battles::router())
        .merge(leaderboard::router())
        .merge(practice::router())
        .merge(sse::router())
        .merge(websocket::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
