//! Battle engine: scoring, ranking, room actors, result finalization and the global leaderboard.

pub mod coordinator;
pub mod finalizer;
pub mod leaderboard;
pub mod ranking;
pub mod room_code;
pub mod scoring;
