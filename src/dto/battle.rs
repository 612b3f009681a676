use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    battle::coordinator::{RoomView, SubmitOutcome},
    dao::models::BattleResultEntity,
    dto::{
        format_system_time,
        validation::{validate_room_code, validate_username},
    },
    state::room::{AnswerRecord, BattleType, Participant, RoomStatus},
};

/// Where the questions of a new room come from.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionSource {
    /// Draw random questions from the stored pool.
    #[default]
    Pool,
    /// Ask the question generator for a fresh set.
    Generated {
        /// Topic handed to the generator.
        topic: String,
        /// Difficulty handed to the generator.
        difficulty: String,
    },
}

/// User creating a room and taking the first seat.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct HostInput {
    pub user_id: Uuid,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

/// Payload used to open a new battle room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateBattleRequest {
    pub battle_type: BattleType,
    #[serde(default)]
    pub subject_id: Option<Uuid>,
    /// `null` draws from every chapter of the subject.
    #[serde(default)]
    pub chapter_id: Option<Uuid>,
    /// Falls back to the configured default.
    #[serde(default)]
    pub total_questions: Option<usize>,
    /// Seconds per question; falls back to the configured default.
    #[serde(default)]
    pub time_per_question: Option<u32>,
    #[serde(default)]
    pub question_source: QuestionSource,
    /// Seat the creator right away.
    #[serde(default)]
    #[validate(nested)]
    pub host: Option<HostInput>,
}

/// Payload used to join a room by its code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinBattleRequest {
    #[validate(custom(function = "validate_room_code"))]
    pub room_code: String,
    pub user_id: Uuid,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

/// Identifies the participant acting on a room.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ParticipantRequest {
    pub user_id: Uuid,
}

/// Answer to the current question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    pub user_id: Uuid,
    pub question_index: usize,
    pub chosen_option: usize,
    /// Seconds spent on the question; values above the limit are clamped.
    pub time_taken: u32,
}

/// Question currently open, without its answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OpenQuestion {
    pub index: usize,
    pub prompt: String,
    pub options: Vec<String>,
}

/// Closed question with its answer revealed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RevealedQuestion {
    pub index: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Closed answer of a participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerSummary {
    pub question_index: usize,
    /// `null` when the question timed out.
    pub chosen_option: Option<usize>,
    pub is_correct: bool,
    pub time_taken: u32,
    pub points: u32,
}

impl From<&AnswerRecord> for AnswerSummary {
    fn from(record: &AnswerRecord) -> Self {
        Self {
            question_index: record.question_index,
            chosen_option: record.chosen_option,
            is_correct: record.is_correct,
            time_taken: record.time_taken,
            points: record.points,
        }
    }
}

/// Public view of a participant. The answer to the open question is only
/// reported as `has_answered`, and its points are not part of `score` yet.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSummary {
    pub user_id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<u8>,
    pub score: u32,
    pub is_ready: bool,
    pub connected: bool,
    pub has_answered: bool,
    pub answers: Vec<AnswerSummary>,
    pub joined_at: String,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id,
            username: participant.username.clone(),
            team: participant.team,
            score: participant.revealed_score(),
            is_ready: participant.is_ready,
            connected: participant.connected,
            has_answered: participant.pending_answer.is_some(),
            answers: participant.answers.iter().map(AnswerSummary::from).collect(),
            joined_at: format_system_time(participant.joined_at),
        }
    }
}

/// Room snapshot broadcast to every subscriber.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub room_code: String,
    pub battle_type: BattleType,
    pub status: RoomStatus,
    /// Clients drop snapshots older than the last one they applied.
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<Uuid>,
    pub max_players: usize,
    pub current_players: usize,
    pub total_questions: usize,
    pub current_question: usize,
    pub time_per_question: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<OpenQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_deadline: Option<String>,
    pub revealed: Vec<RevealedQuestion>,
    pub participants: Vec<ParticipantSummary>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
}

impl From<&RoomView> for RoomSnapshot {
    fn from(view: &RoomView) -> Self {
        let room = &view.room;
        let question = room.current().map(|question| OpenQuestion {
            index: room.current_question,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        });
        let revealed = room
            .questions
            .iter()
            .take(room.current_question)
            .enumerate()
            .map(|(index, question)| RevealedQuestion {
                index,
                prompt: question.prompt.clone(),
                options: question.options.clone(),
                correct_option: question.correct_option,
                explanation: question.explanation.clone(),
            })
            .collect();

        Self {
            id: room.id,
            room_code: room.room_code.clone(),
            battle_type: room.battle_type,
            status: room.status,
            revision: view.revision,
            subject_id: room.subject_id,
            chapter_id: room.chapter_id,
            max_players: room.max_players(),
            current_players: room.current_players(),
            total_questions: room.total_questions(),
            current_question: room.current_question,
            time_per_question: room.time_per_question,
            question,
            question_deadline: view.question_deadline.map(format_system_time),
            revealed,
            participants: room
                .participants
                .values()
                .map(ParticipantSummary::from)
                .collect(),
            created_at: format_system_time(room.created_at),
            started_at: room.started_at.map(format_system_time),
            ended_at: room.ended_at.map(format_system_time),
        }
    }
}

/// Acknowledgement of an accepted answer, sent to its author only.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerAccepted {
    pub question_index: usize,
    pub chosen_option: usize,
    pub is_correct: bool,
    pub time_taken: u32,
    pub points: u32,
    pub speed_bonus: u32,
    pub revision: u64,
}

impl From<&SubmitOutcome> for AnswerAccepted {
    fn from(outcome: &SubmitOutcome) -> Self {
        let record = &outcome.record;
        Self {
            question_index: record.question_index,
            chosen_option: record.chosen_option.unwrap_or_default(),
            is_correct: record.is_correct,
            time_taken: record.time_taken,
            points: record.points,
            speed_bonus: record.speed_bonus,
            revision: outcome.view.revision,
        }
    }
}

/// Final standing of a participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BattleResultSummary {
    pub user_id: Uuid,
    pub username: String,
    pub rank: u32,
    pub final_score: u32,
    pub total_correct: u32,
    pub total_questions: u32,
    pub accuracy_percentage: u32,
    pub time_bonus: u32,
}

impl From<&BattleResultEntity> for BattleResultSummary {
    fn from(result: &BattleResultEntity) -> Self {
        Self {
            user_id: result.user_id,
            username: result.username.clone(),
            rank: result.rank,
            final_score: result.final_score,
            total_correct: result.total_correct,
            total_questions: result.total_questions,
            accuracy_percentage: result.accuracy_percentage,
            time_bonus: result.time_bonus,
        }
    }
}

/// Results of a completed room, best first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BattleResultsResponse {
    pub battle_room_id: Uuid,
    pub results: Vec<BattleResultSummary>,
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::room::{BattleRoom, Question};

    fn view() -> (RoomView, Uuid, Uuid) {
        let questions = (0..3)
            .map(|i| Question {
                prompt: format!("q{i}"),
                options: vec!["a".into(), "b".into()],
                correct_option: 1,
                explanation: Some("because".into()),
            })
            .collect();
        let mut room = BattleRoom::new(
            Uuid::new_v4(),
            "ROOM22".into(),
            BattleType::OneVsOne,
            None,
            None,
            questions,
            20,
            SystemTime::now(),
        );
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        room.join(a, "a".into(), SystemTime::now()).unwrap();
        room.join(b, "b".into(), SystemTime::now()).unwrap();
        room.start(SystemTime::now());
        room.submit_answer(a, 0, 1, 2, SystemTime::now()).unwrap();
        room.submit_answer(b, 0, 0, 2, SystemTime::now()).unwrap();
        room.close_question(SystemTime::now());
        room.submit_answer(a, 1, 1, 2, SystemTime::now()).unwrap();
        (
            RoomView {
                revision: 7,
                room,
                question_deadline: Some(SystemTime::now()),
            },
            a,
            b,
        )
    }

    #[test]
    fn snapshot_hides_open_answers() {
        let (view, a, b) = view();
        let snapshot = RoomSnapshot::from(&view);

        assert_eq!(snapshot.revision, 7);
        let open = snapshot.question.as_ref().unwrap();
        assert_eq!(open.index, 1);
        assert_eq!(snapshot.revealed.len(), 1);
        assert_eq!(snapshot.revealed[0].correct_option, 1);

        let first = snapshot.participants.iter().find(|p| p.user_id == a).unwrap();
        assert!(first.has_answered);
        assert_eq!(first.answers.len(), 1);
        assert_eq!(first.score, 20);
        let second = snapshot.participants.iter().find(|p| p.user_id == b).unwrap();
        assert!(!second.has_answered);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["question"].get("correct_option").is_none());
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["battle_type"], "1v1");
    }

    #[test]
    fn create_request_defaults_to_pool_questions() {
        let request: CreateBattleRequest =
            serde_json::from_str(r#"{"battle_type":"2v2"}"#).unwrap();
        assert!(matches!(request.question_source, QuestionSource::Pool));
        assert!(request.validate().is_ok());

        let request: CreateBattleRequest = serde_json::from_str(
            r#"{"battle_type":"4p","question_source":{"kind":"generated","topic":"algebra","difficulty":"easy"},"host":{"user_id":"7d1d2a3e-8d56-4d4c-9a3a-0c7b9d0e3c11","username":"  "}}"#,
        )
        .unwrap();
        assert!(matches!(
            request.question_source,
            QuestionSource::Generated { .. }
        ));
        assert!(request.validate().is_err());
    }
}
