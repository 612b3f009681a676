use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::battle::{AnswerAccepted, BattleResultSummary, RoomSnapshot};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from participant WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticipantInbound {
    /// First message of every connection.
    Identification { room_id: Uuid, user_id: Uuid },
    Ready,
    Answer {
        question_index: usize,
        chosen_option: usize,
        time_taken: u32,
    },
    Leave,
    #[serde(other)]
    Unknown,
}

impl ParticipantInbound {
    /// Room and user carried by an identification message.
    pub fn identification(&self) -> Option<(Uuid, Uuid)> {
        match self {
            Self::Identification { room_id, user_id } => Some((*room_id, *user_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Messages pushed to participant WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParticipantOutbound {
    /// Identification accepted; snapshots follow.
    Identified { room_id: Uuid, user_id: Uuid },
    Snapshot { snapshot: RoomSnapshot },
    /// Private acknowledgement of the participant's own answer.
    AnswerAccepted { answer: AnswerAccepted },
    /// An action was refused; the room is unchanged.
    Rejected {
        action: String,
        code: String,
        message: String,
    },
    Completed {
        snapshot: RoomSnapshot,
        results: Vec<BattleResultSummary>,
    },
    /// The room stopped; the server closes the socket next.
    Closed { reason: String },
}
