use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    battle::{
        coordinator::{self, RoomHandle, RoomView},
        finalizer, room_code,
    },
    dao::models::{BattleRoomEntity, QuestionFilter, RoomCommit},
    dto::battle::{
        AnswerAccepted, BattleResultSummary, BattleResultsResponse, CreateBattleRequest,
        JoinBattleRequest, QuestionSource, RoomSnapshot, SubmitAnswerRequest,
    },
    error::ServiceError,
    services::question_generator::{self, GenerationRequest},
    state::{
        SharedState,
        room::{BattleRoom, Question, RoomStatus},
    },
};

/// Open a new waiting room, optionally seating its creator.
pub async fn create_room(
    state: &SharedState,
    request: CreateBattleRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let store = state.require_battle_store().await?;
    let settings = &state.config().battle;

    let total_questions = request
        .total_questions
        .unwrap_or(settings.default_total_questions);
    if !(1..=settings.max_total_questions).contains(&total_questions) {
        return Err(ServiceError::InvalidInput(format!(
            "total_questions must be between 1 and {} (got {total_questions})",
            settings.max_total_questions
        )));
    }

    let time_per_question = request
        .time_per_question
        .unwrap_or(settings.default_time_per_question);
    if !(settings.min_time_per_question..=settings.max_time_per_question)
        .contains(&time_per_question)
    {
        return Err(ServiceError::InvalidInput(format!(
            "time_per_question must be between {} and {} seconds (got {time_per_question})",
            settings.min_time_per_question, settings.max_time_per_question
        )));
    }

    let questions = load_questions(state, &request, total_questions).await?;

    let room_id = Uuid::new_v4();
    let mut attempts = 0;
    let room = loop {
        attempts += 1;
        let code = state.reserve_room_code(room_id)?;
        let room = BattleRoom::new(
            room_id,
            code.clone(),
            request.battle_type,
            request.subject_id,
            request.chapter_id,
            questions.clone(),
            time_per_question,
            SystemTime::now(),
        );

        match store
            .commit(RoomCommit::room_only(BattleRoomEntity::from_room(&room, 0)))
            .await
        {
            Ok(()) => break room,
            Err(err) if err.is_conflict() && attempts < settings.max_code_attempts => {
                warn!(room_code = %code, attempt = attempts, "room code already held in storage; drawing another");
                state.release_room_code(&code, room_id);
            }
            Err(err) => {
                state.release_room_code(&code, room_id);
                return Err(err.into());
            }
        }
    };

    let handle = coordinator::spawn_room(state.clone(), room, 0);
    state.register_room(handle.clone());
    info!(
        room_id = %handle.id(),
        room_code = handle.room_code(),
        battle_type = request.battle_type.as_str(),
        total_questions,
        "battle room created"
    );

    let view = match request.host {
        Some(host) => {
            handle
                .join(host.user_id, host.username.trim().to_owned())
                .await?
        }
        None => handle.snapshot().await?,
    };
    Ok(RoomSnapshot::from(&view))
}

async fn load_questions(
    state: &SharedState,
    request: &CreateBattleRequest,
    count: usize,
) -> Result<Vec<Question>, ServiceError> {
    match &request.question_source {
        QuestionSource::Pool => {
            let store = state.require_battle_store().await?;
            let filter = QuestionFilter {
                subject_id: request.subject_id,
                chapter_id: request.chapter_id,
            };
            let drawn = store.sample_questions(filter, count).await?;
            if drawn.len() < count {
                return Err(ServiceError::InvalidInput(format!(
                    "only {} pool questions match the requested subject and chapter, {count} needed",
                    drawn.len()
                )));
            }
            drawn
                .into_iter()
                .map(|entity| {
                    let id = entity.id;
                    let question = Question::from(entity);
                    question.validate().map_err(|err| {
                        warn!(question_id = %id, error = %err, "malformed pool question");
                        ServiceError::InvalidInput(format!("pool question {id} is invalid: {err}"))
                    })?;
                    Ok(question)
                })
                .collect()
        }
        QuestionSource::Generated { topic, difficulty } => {
            let generator = state.question_generator().ok_or_else(|| {
                ServiceError::GenerationFailed("no question generator is configured".into())
            })?;
            let generated = generator
                .generate(GenerationRequest {
                    topic: topic.clone(),
                    difficulty: difficulty.clone(),
                    count,
                })
                .await
                .and_then(|questions| question_generator::validate_generated(questions, count))
                .map_err(|err| {
                    warn!(topic = %topic, error = %err, "question generation failed");
                    ServiceError::GenerationFailed(err.to_string())
                })?;
            Ok(generated)
        }
    }
}

/// Seat a user in the live room holding `room_code`.
pub async fn join_room(
    state: &SharedState,
    request: JoinBattleRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let code = room_code::normalize_room_code(&request.room_code);
    let handle = state.room_by_code(&code).ok_or(ServiceError::RoomNotFound)?;
    let view = handle
        .join(request.user_id, request.username.trim().to_owned())
        .await?;
    Ok(RoomSnapshot::from(&view))
}

/// Mark a participant ready; the room starts once every seat is filled and ready.
pub async fn set_ready(
    state: &SharedState,
    room_id: Uuid,
    user_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let view = live_room(state, room_id)?.set_ready(user_id).await?;
    Ok(RoomSnapshot::from(&view))
}

/// Answer the current question of a running room.
pub async fn submit_answer(
    state: &SharedState,
    room_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<AnswerAccepted, ServiceError> {
    let outcome = live_room(state, room_id)?
        .submit_answer(
            request.user_id,
            request.question_index,
            request.chosen_option,
            request.time_taken,
        )
        .await?;
    Ok(AnswerAccepted::from(&outcome))
}

/// Leave a waiting room, or stop answering in a running one.
pub async fn leave_room(
    state: &SharedState,
    room_id: Uuid,
    user_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let view = live_room(state, room_id)?.leave(user_id).await?;
    Ok(RoomSnapshot::from(&view))
}

/// Current snapshot of a room; closed rooms are read back from storage.
pub async fn room_snapshot(state: &SharedState, room_id: Uuid) -> Result<RoomSnapshot, ServiceError> {
    if let Some(handle) = state.room(room_id) {
        match handle.snapshot().await {
            Ok(view) => return Ok(RoomSnapshot::from(&view)),
            Err(ServiceError::RoomClosed) => {}
            Err(err) => return Err(err),
        }
    }

    let view = persisted_view(state, room_id).await?;
    Ok(RoomSnapshot::from(&view))
}

/// Final standings of a completed room, best first.
pub async fn room_results(
    state: &SharedState,
    room_id: Uuid,
) -> Result<BattleResultsResponse, ServiceError> {
    let view = persisted_view(state, room_id).await?;
    if view.room.status != RoomStatus::Completed {
        return Err(ServiceError::InvalidState(
            "results are available once the room completes".into(),
        ));
    }

    let settings = &state.config().battle;
    let store = state.require_battle_store().await?;
    let results = finalizer::load_or_finalize(
        store,
        &view.room,
        settings.finalize_attempts,
        settings.retry_delay,
    )
    .await?;

    Ok(BattleResultsResponse {
        battle_room_id: room_id,
        results: results.iter().map(BattleResultSummary::from).collect(),
    })
}

/// Live coordinator of a room.
pub fn live_room(state: &SharedState, room_id: Uuid) -> Result<RoomHandle, ServiceError> {
    state.room(room_id).ok_or(ServiceError::RoomNotFound)
}

async fn persisted_view(state: &SharedState, room_id: Uuid) -> Result<RoomView, ServiceError> {
    let store = state.require_battle_store().await?;
    let entity = store
        .find_room(room_id)
        .await?
        .ok_or(ServiceError::RoomNotFound)?;
    let participants = store.list_participants(room_id).await?;
    let revision = entity.revision;
    Ok(RoomView {
        revision,
        room: entity.into_room(participants),
        question_deadline: None,
    })
}
