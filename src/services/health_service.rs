use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode and the live room count, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_battle_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let live_rooms = state.live_rooms();
    if state.is_degraded() {
        HealthResponse::degraded(live_rooms)
    } else {
        HealthResponse::ok(live_rooms)
    }
}
