use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the battle store is unreachable.
    pub status: &'static str,
    /// Rooms with a running coordinator.
    pub live_rooms: usize,
}

impl HealthResponse {
    pub fn ok(live_rooms: usize) -> Self {
        Self {
            status: "ok",
            live_rooms,
        }
    }

    pub fn degraded(live_rooms: usize) -> Self {
        Self {
            status: "degraded",
            live_rooms,
        }
    }
}
