/// Battle room lifecycle operations.
pub mod battle_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Cached global leaderboard.
pub mod leaderboard_service;
/// Solo practice answers.
pub mod practice_service;
/// Question generation client.
pub mod question_generator;
/// Server-Sent Events room streams.
pub mod sse_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
/// Participant WebSocket sessions.
pub mod websocket_service;
