use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz battle backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::battles::create_battle,
        crate::routes::battles::join_battle,
        crate::routes::battles::get_battle,
        crate::routes::battles::ready,
        crate::routes::battles::submit_answer,
        crate::routes::battles::leave,
        crate::routes::battles::results,
        crate::routes::leaderboard::get_leaderboard,
        crate::routes::practice::record_practice_answer,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::battle::CreateBattleRequest,
            crate::dto::battle::HostInput,
            crate::dto::battle::QuestionSource,
            crate::dto::battle::JoinBattleRequest,
            crate::dto::battle::ParticipantRequest,
            crate::dto::battle::SubmitAnswerRequest,
            crate::dto::battle::RoomSnapshot,
            crate::dto::battle::AnswerAccepted,
            crate::dto::battle::BattleResultsResponse,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::practice::PracticeAnswerRequest,
            crate::dto::practice::PracticeAnswerResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::CompletedEvent,
            crate::dto::sse::ClosedEvent,
            crate::dto::ws::ParticipantInbound,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "battles", description = "Battle room lifecycle"),
        (name = "leaderboard", description = "Global leaderboard"),
        (name = "practice", description = "Solo practice answers"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "participants", description = "WebSocket sessions of battle participants"),
    )
)]
pub struct ApiDoc;
