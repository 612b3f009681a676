use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Answer given outside of a battle, recorded for the leaderboard only.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PracticeAnswerRequest {
    pub user_id: Uuid,
    pub is_correct: bool,
    /// Seconds spent on the question.
    pub time_taken: u32,
}

/// Ledger entry created for a practice answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct PracticeAnswerResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_correct: bool,
    pub time_taken: u32,
    pub created_at: String,
}
