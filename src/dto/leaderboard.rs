use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    battle::leaderboard::{LeaderboardBoard, LeaderboardEntry},
    dto::format_system_time,
};

/// Query string of `GET /leaderboard`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of entries to return; clamped to the configured maximum.
    pub limit: Option<usize>,
    /// Recompute from the ledger instead of serving the cached board.
    #[serde(default)]
    pub refresh: bool,
}

/// One ranked user.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntryResponse {
    pub rank: u32,
    pub user_id: Uuid,
    pub username: String,
    pub total_score: u32,
    /// Whole-number percentage of correct answers.
    pub accuracy: u32,
    pub best_streak: u32,
    pub total_questions: u32,
}

/// Leaderboard page, best first.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub generated_at: String,
    /// Number of users with at least one ledger entry.
    pub total_users: usize,
    pub entries: Vec<LeaderboardEntryResponse>,
}

impl LeaderboardResponse {
    /// First `limit` entries of `board`.
    pub fn from_board(board: &LeaderboardBoard, limit: usize) -> Self {
        Self {
            generated_at: format_system_time(board.generated_at),
            total_users: board.entries.len(),
            entries: board
                .entries
                .iter()
                .take(limit)
                .enumerate()
                .map(|(index, entry)| entry_response(index as u32 + 1, entry))
                .collect(),
        }
    }
}

fn entry_response(rank: u32, entry: &LeaderboardEntry) -> LeaderboardEntryResponse {
    LeaderboardEntryResponse {
        rank,
        user_id: entry.user_id,
        username: entry.username.clone(),
        total_score: entry.total_score,
        accuracy: entry.accuracy,
        best_streak: entry.best_streak,
        total_questions: entry.total_questions,
    }
}
