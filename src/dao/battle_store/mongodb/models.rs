use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{
        AnswerLedgerEntryEntity, BattleResultEntity, BattleRoomEntity, ParticipantEntity,
        ProfileEntity, QuestionEntity,
    },
    state::room::{AnswerRecord, BattleType, Question, RoomStatus},
};

pub const ROOM_COLLECTION: &str = "battle_rooms";
pub const PARTICIPANT_COLLECTION: &str = "participants";
pub const RESULT_COLLECTION: &str = "battle_results";
pub const LEDGER_COLLECTION: &str = "user_answers";
pub const PROFILE_COLLECTION: &str = "profiles";
pub const QUESTION_COLLECTION: &str = "questions";

/// Room row. `active_code` mirrors `room_code` until the room completes so a
/// partial unique index keeps codes unique among active rooms only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: String,
    room_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_code: Option<String>,
    battle_type: BattleType,
    max_players: usize,
    current_players: usize,
    status: RoomStatus,
    subject_id: Option<String>,
    chapter_id: Option<String>,
    questions: Vec<Question>,
    current_question: usize,
    time_per_question: u32,
    total_questions: usize,
    revision: u64,
    created_at: DateTime,
    started_at: Option<DateTime>,
    ended_at: Option<DateTime>,
}

impl From<BattleRoomEntity> for MongoRoomDocument {
    fn from(value: BattleRoomEntity) -> Self {
        let active_code = value.holds_code().then(|| value.room_code.clone());
        Self {
            id: value.id.to_string(),
            room_code: value.room_code,
            active_code,
            battle_type: value.battle_type,
            max_players: value.max_players,
            current_players: value.current_players,
            status: value.status,
            subject_id: value.subject_id.map(|id| id.to_string()),
            chapter_id: value.chapter_id.map(|id| id.to_string()),
            questions: value.questions,
            current_question: value.current_question,
            time_per_question: value.time_per_question,
            total_questions: value.total_questions,
            revision: value.revision,
            created_at: DateTime::from_system_time(value.created_at),
            started_at: value.started_at.map(DateTime::from_system_time),
            ended_at: value.ended_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoRoomDocument> for BattleRoomEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoomDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(ROOM_COLLECTION, &value.id)?,
            room_code: value.room_code,
            battle_type: value.battle_type,
            max_players: value.max_players,
            current_players: value.current_players,
            status: value.status,
            subject_id: parse_optional_id(ROOM_COLLECTION, value.subject_id)?,
            chapter_id: parse_optional_id(ROOM_COLLECTION, value.chapter_id)?,
            questions: value.questions,
            current_question: value.current_question,
            time_per_question: value.time_per_question,
            total_questions: value.total_questions,
            revision: value.revision,
            created_at: value.created_at.to_system_time(),
            started_at: value.started_at.map(|at| at.to_system_time()),
            ended_at: value.ended_at.map(|at| at.to_system_time()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: String,
    battle_room_id: String,
    user_id: String,
    username: String,
    team: Option<u8>,
    score: u32,
    answers: Vec<AnswerRecord>,
    pending_answer: Option<AnswerRecord>,
    is_ready: bool,
    connected: bool,
    joined_at: DateTime,
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id.to_string(),
            battle_room_id: value.battle_room_id.to_string(),
            user_id: value.user_id.to_string(),
            username: value.username,
            team: value.team,
            score: value.score,
            answers: value.answers,
            pending_answer: value.pending_answer,
            is_ready: value.is_ready,
            connected: value.connected,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl TryFrom<MongoParticipantDocument> for ParticipantEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoParticipantDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PARTICIPANT_COLLECTION, &value.id)?,
            battle_room_id: parse_id(PARTICIPANT_COLLECTION, &value.battle_room_id)?,
            user_id: parse_id(PARTICIPANT_COLLECTION, &value.user_id)?,
            username: value.username,
            team: value.team,
            score: value.score,
            answers: value.answers,
            pending_answer: value.pending_answer,
            is_ready: value.is_ready,
            connected: value.connected,
            joined_at: value.joined_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoResultDocument {
    #[serde(rename = "_id")]
    id: String,
    battle_room_id: String,
    user_id: String,
    username: String,
    final_score: u32,
    rank: u32,
    total_correct: u32,
    total_questions: u32,
    accuracy_percentage: u32,
    time_bonus: u32,
    created_at: DateTime,
}

impl From<BattleResultEntity> for MongoResultDocument {
    fn from(value: BattleResultEntity) -> Self {
        Self {
            id: value.id.to_string(),
            battle_room_id: value.battle_room_id.to_string(),
            user_id: value.user_id.to_string(),
            username: value.username,
            final_score: value.final_score,
            rank: value.rank,
            total_correct: value.total_correct,
            total_questions: value.total_questions,
            accuracy_percentage: value.accuracy_percentage,
            time_bonus: value.time_bonus,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoResultDocument> for BattleResultEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoResultDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(RESULT_COLLECTION, &value.id)?,
            battle_room_id: parse_id(RESULT_COLLECTION, &value.battle_room_id)?,
            user_id: parse_id(RESULT_COLLECTION, &value.user_id)?,
            username: value.username,
            final_score: value.final_score,
            rank: value.rank,
            total_correct: value.total_correct,
            total_questions: value.total_questions,
            accuracy_percentage: value.accuracy_percentage,
            time_bonus: value.time_bonus,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLedgerDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    battle_room_id: Option<String>,
    is_correct: bool,
    time_taken: u32,
    created_at: DateTime,
}

impl From<AnswerLedgerEntryEntity> for MongoLedgerDocument {
    fn from(value: AnswerLedgerEntryEntity) -> Self {
        Self {
            id: value.id.to_string(),
            user_id: value.user_id.to_string(),
            battle_room_id: value.battle_room_id.map(|id| id.to_string()),
            is_correct: value.is_correct,
            time_taken: value.time_taken,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoLedgerDocument> for AnswerLedgerEntryEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoLedgerDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(LEDGER_COLLECTION, &value.id)?,
            user_id: parse_id(LEDGER_COLLECTION, &value.user_id)?,
            battle_room_id: parse_optional_id(LEDGER_COLLECTION, value.battle_room_id)?,
            is_correct: value.is_correct,
            time_taken: value.time_taken,
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProfileDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

impl TryFrom<MongoProfileDocument> for ProfileEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoProfileDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(PROFILE_COLLECTION, &value.id)?,
            username: value.username,
            full_name: value.full_name,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    subject_id: Option<String>,
    #[serde(default)]
    chapter_id: Option<String>,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
    #[serde(default)]
    explanation: Option<String>,
}

impl TryFrom<MongoQuestionDocument> for QuestionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuestionDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(QUESTION_COLLECTION, &value.id)?,
            subject_id: parse_optional_id(QUESTION_COLLECTION, value.subject_id)?,
            chapter_id: parse_optional_id(QUESTION_COLLECTION, value.chapter_id)?,
            prompt: value.prompt,
            options: value.options,
            correct_option: value.correct_option,
            explanation: value.explanation,
        })
    }
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|source| MongoDaoError::Decode {
        collection,
        value: value.to_owned(),
        source,
    })
}

fn parse_optional_id(collection: &'static str, value: Option<String>) -> MongoResult<Option<Uuid>> {
    value.map(|raw| parse_id(collection, &raw)).transpose()
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn room_member(room_id: Uuid, user_id: Uuid) -> Document {
    doc! {"battle_room_id": room_id.to_string(), "user_id": user_id.to_string()}
}
