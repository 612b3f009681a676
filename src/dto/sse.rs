use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::battle::{BattleResultSummary, RoomSnapshot};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room the stream follows.
    pub room_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the room completes, with its final standings.
pub struct CompletedEvent {
    pub snapshot: RoomSnapshot,
    pub results: Vec<BattleResultSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Last event of a room stream.
pub struct ClosedEvent {
    /// `completed` or `abandoned`.
    pub reason: String,
}
