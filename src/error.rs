use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{AbortError, ApplyError, PlanError},
};

/// Errors that can occur in service layer operations.
///
/// Every variant except the storage ones is a rejected action: the room is
/// left exactly as it was.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No live room matches the identifier or code.
    #[error("room not found")]
    RoomNotFound,
    /// Every seat is taken.
    #[error("room is full")]
    RoomFull,
    /// The user already holds a seat in this room.
    #[error("user already joined this room")]
    AlreadyJoined,
    /// The action is only valid while the room is waiting.
    #[error("room is not waiting for players")]
    RoomNotWaiting,
    /// The action is only valid while the room is in progress.
    #[error("room is not in progress")]
    RoomNotInProgress,
    /// The answer targets a question other than the current one.
    #[error("stale question: current question is {expected}, got {got}")]
    StaleQuestion {
        /// Current question index.
        expected: usize,
        /// Index sent by the client.
        got: usize,
    },
    /// The current question was already answered by this participant.
    #[error("question already answered")]
    DuplicateAnswer,
    /// The user has no seat in this room.
    #[error("user is not a participant of this room")]
    NotParticipant,
    /// The room was closed (completed or abandoned) while the request was in flight.
    #[error("room closed")]
    RoomClosed,
    /// The question generator failed or produced an invalid set.
    #[error("question generation failed: {0}")]
    GenerationFailed(String),
    /// No free room code could be found.
    #[error("room code space exhausted after {attempts} attempts")]
    CodeSpaceExhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl ServiceError {
    /// Stable machine-readable reason sent to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ServiceError::RoomNotFound => "room_not_found",
            ServiceError::RoomFull => "room_full",
            ServiceError::AlreadyJoined => "already_joined",
            ServiceError::RoomNotWaiting => "room_not_waiting",
            ServiceError::RoomNotInProgress => "room_not_in_progress",
            ServiceError::StaleQuestion { .. } => "stale_question",
            ServiceError::DuplicateAnswer => "duplicate_answer",
            ServiceError::NotParticipant => "not_participant",
            ServiceError::RoomClosed => "room_closed",
            ServiceError::GenerationFailed(_) => "generation_failed",
            ServiceError::CodeSpaceExhausted { .. } => "code_space_exhausted",
            ServiceError::Unavailable(_) | ServiceError::Degraded => "storage_unavailable",
            ServiceError::InvalidInput(_) => "invalid_input",
            ServiceError::InvalidState(_) => "invalid_state",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Timeout => "timeout",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest {
            code: "invalid_input",
            message: format!("validation failed: {}", err),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {message}")]
    BadRequest {
        /// Reason code.
        code: &'static str,
        /// Details.
        message: String,
    },
    /// Requested resource not found.
    #[error("not found: {message}")]
    NotFound {
        /// Reason code.
        code: &'static str,
        /// Details.
        message: String,
    },
    /// Action rejected by the room in its current state.
    #[error("conflict: {message}")]
    Conflict {
        /// Reason code.
        code: &'static str,
        /// Details.
        message: String,
    },
    /// Upstream dependency (question generator) failed.
    #[error("bad gateway: {message}")]
    BadGateway {
        /// Reason code.
        code: &'static str,
        /// Details.
        message: String,
    },
    /// Service unavailable or degraded.
    #[error("service unavailable: {message}")]
    ServiceUnavailable {
        /// Reason code.
        code: &'static str,
        /// Details.
        message: String,
    },
    /// Internal server error.
    #[error("internal error: {message}")]
    Internal {
        /// Reason code.
        code: &'static str,
        /// Details.
        message: String,
    },
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let code = err.reason_code();
        let message = err.to_string();
        match err {
            ServiceError::RoomNotFound | ServiceError::NotFound(_) => {
                AppError::NotFound { code, message }
            }
            ServiceError::InvalidInput(_) => AppError::BadRequest { code, message },
            ServiceError::RoomFull
            | ServiceError::AlreadyJoined
            | ServiceError::RoomNotWaiting
            | ServiceError::RoomNotInProgress
            | ServiceError::StaleQuestion { .. }
            | ServiceError::DuplicateAnswer
            | ServiceError::NotParticipant
            | ServiceError::RoomClosed
            | ServiceError::InvalidState(_) => AppError::Conflict { code, message },
            ServiceError::GenerationFailed(_) => AppError::BadGateway { code, message },
            ServiceError::Unavailable(_) | ServiceError::Degraded | ServiceError::Timeout => {
                AppError::ServiceUnavailable { code, message }
            }
            ServiceError::CodeSpaceExhausted { .. } => AppError::Internal { code, message },
        }
    }
}

/// JSON body of every error response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Stable reason code.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::NotFound { code, .. } => (StatusCode::NOT_FOUND, *code),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::BadGateway { code, .. } => (StatusCode::BAD_GATEWAY, *code),
            AppError::ServiceUnavailable { code, .. } => (StatusCode::SERVICE_UNAVAILABLE, *code),
            AppError::Internal { code, .. } => (StatusCode::INTERNAL_SERVER_ERROR, *code),
        };

        let payload = Json(ErrorBody {
            code: code.to_string(),
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("state transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "room phase changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::InvalidState(format!(
                    "room version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_conflict_with_reason_code() {
        let err: AppError = ServiceError::StaleQuestion {
            expected: 2,
            got: 1,
        }
        .into();
        match err {
            AppError::Conflict { code, message } => {
                assert_eq!(code, "stale_question");
                assert!(message.contains("current question is 2"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn storage_failures_are_unavailable() {
        let err: AppError = ServiceError::Degraded.into();
        assert!(matches!(
            err,
            AppError::ServiceUnavailable {
                code: "storage_unavailable",
                ..
            }
        ));
        let response = AppError::from(ServiceError::RoomFull).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = AppError::from(ServiceError::RoomNotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
