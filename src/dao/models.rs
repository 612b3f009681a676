use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::room::{
    AnswerRecord, BattleRoom, BattleType, Participant, Question, RoomStatus,
};

/// Persisted projection of a battle room (`battle_rooms`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleRoomEntity {
    /// Stable identifier for the room.
    pub id: Uuid,
    /// Join token, unique among rooms that are not completed.
    pub room_code: String,
    /// Seating shape.
    pub battle_type: BattleType,
    /// Seats in the room.
    pub max_players: usize,
    /// Seated participants.
    pub current_players: usize,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Subject the questions were drawn from.
    pub subject_id: Option<Uuid>,
    /// Chapter the questions were drawn from.
    pub chapter_id: Option<Uuid>,
    /// Questions fixed at creation.
    pub questions: Vec<Question>,
    /// Zero-based question cursor.
    pub current_question: usize,
    /// Seconds allowed per question.
    pub time_per_question: u32,
    /// Number of questions.
    pub total_questions: usize,
    /// Revision of the last broadcast snapshot that was persisted.
    pub revision: u64,
    /// Creation time.
    pub created_at: SystemTime,
    /// Start time.
    pub started_at: Option<SystemTime>,
    /// Completion time.
    pub ended_at: Option<SystemTime>,
}

impl BattleRoomEntity {
    /// Project the room row of an authoritative room.
    pub fn from_room(room: &BattleRoom, revision: u64) -> Self {
        Self {
            id: room.id,
            room_code: room.room_code.clone(),
            battle_type: room.battle_type,
            max_players: room.max_players(),
            current_players: room.current_players(),
            status: room.status,
            subject_id: room.subject_id,
            chapter_id: room.chapter_id,
            questions: room.questions.clone(),
            current_question: room.current_question,
            time_per_question: room.time_per_question,
            total_questions: room.total_questions(),
            revision,
            created_at: room.created_at,
            started_at: room.started_at,
            ended_at: room.ended_at,
        }
    }

    /// Whether the room code is still reserved by this room.
    pub fn holds_code(&self) -> bool {
        self.status != RoomStatus::Completed
    }

    /// Rebuild the authoritative room from its rows. Participants keep store order.
    pub fn into_room(self, mut participants: Vec<ParticipantEntity>) -> BattleRoom {
        participants.sort_by_key(|participant| participant.joined_at);
        BattleRoom {
            id: self.id,
            room_code: self.room_code,
            battle_type: self.battle_type,
            status: self.status,
            subject_id: self.subject_id,
            chapter_id: self.chapter_id,
            questions: self.questions,
            current_question: self.current_question,
            time_per_question: self.time_per_question,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            participants: participants
                .into_iter()
                .map(|entity| (entity.user_id, entity.into()))
                .collect(),
        }
    }
}

/// Persisted participant row (`participants`), unique per `(battle_room_id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Row identifier.
    pub id: Uuid,
    /// Owning room.
    pub battle_room_id: Uuid,
    /// Identity of the user.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
    /// Team number for team battles.
    pub team: Option<u8>,
    /// Running score.
    pub score: u32,
    /// Closed answers in question order.
    pub answers: Vec<AnswerRecord>,
    /// Answer to the open question.
    pub pending_answer: Option<AnswerRecord>,
    /// Ready flag.
    pub is_ready: bool,
    /// Connection flag.
    pub connected: bool,
    /// Join time.
    pub joined_at: SystemTime,
}

impl ParticipantEntity {
    /// Project a participant of `room_id`.
    pub fn from_participant(room_id: Uuid, participant: &Participant) -> Self {
        Self {
            id: participant.id,
            battle_room_id: room_id,
            user_id: participant.user_id,
            username: participant.username.clone(),
            team: participant.team,
            score: participant.score,
            answers: participant.answers.clone(),
            pending_answer: participant.pending_answer.clone(),
            is_ready: participant.is_ready,
            connected: participant.connected,
            joined_at: participant.joined_at,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            username: value.username,
            team: value.team,
            score: value.score,
            answers: value.answers,
            pending_answer: value.pending_answer,
            is_ready: value.is_ready,
            connected: value.connected,
            joined_at: value.joined_at,
        }
    }
}

/// Write-once final standing of a participant (`battle_results`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleResultEntity {
    /// Row identifier.
    pub id: Uuid,
    /// Room the result belongs to.
    pub battle_room_id: Uuid,
    /// Participant's user.
    pub user_id: Uuid,
    /// Display name at the time of the battle.
    pub username: String,
    /// Score at completion.
    pub final_score: u32,
    /// 1-based strict rank.
    pub rank: u32,
    /// Correct answers.
    pub total_correct: u32,
    /// Questions in the room.
    pub total_questions: u32,
    /// Rounded accuracy.
    pub accuracy_percentage: u32,
    /// Sum of speed bonuses.
    pub time_bonus: u32,
    /// Write time.
    pub created_at: SystemTime,
}

/// Global, append-only answer record (`user_answers`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerLedgerEntryEntity {
    /// Row identifier.
    pub id: Uuid,
    /// User who answered.
    pub user_id: Uuid,
    /// Room the answer was given in, `None` for solo practice.
    pub battle_room_id: Option<Uuid>,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// Seconds spent.
    pub time_taken: u32,
    /// Append time.
    pub created_at: SystemTime,
}

impl AnswerLedgerEntryEntity {
    /// Ledger entry for an answer scored inside a room.
    pub fn from_answer(user_id: Uuid, battle_room_id: Uuid, answer: &AnswerRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            battle_room_id: Some(battle_room_id),
            is_correct: answer.is_correct,
            time_taken: answer.time_taken,
            created_at: answer.answered_at,
        }
    }

    /// Ledger entry for a solo practice answer.
    pub fn practice(user_id: Uuid, is_correct: bool, time_taken: u32, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            battle_room_id: None,
            is_correct,
            time_taken,
            created_at: now,
        }
    }
}

/// Read-only user profile (`profiles`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntity {
    /// User identifier.
    pub id: Uuid,
    /// Public handle.
    pub username: Option<String>,
    /// Full name.
    pub full_name: Option<String>,
}

impl ProfileEntity {
    /// Best available name for display.
    pub fn display_name(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.full_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Question stored in the shared pool (`questions`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Row identifier.
    pub id: Uuid,
    /// Subject the question belongs to.
    pub subject_id: Option<Uuid>,
    /// Chapter the question belongs to.
    pub chapter_id: Option<Uuid>,
    /// Prompt text.
    pub prompt: String,
    /// Options in display order.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option: usize,
    /// Optional explanation.
    pub explanation: Option<String>,
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            prompt: value.prompt,
            options: value.options,
            correct_option: value.correct_option,
            explanation: value.explanation,
        }
    }
}

/// Filter applied when drawing questions from the pool. `None` matches any value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    /// Restrict to one subject.
    pub subject_id: Option<Uuid>,
    /// Restrict to one chapter.
    pub chapter_id: Option<Uuid>,
}

impl QuestionFilter {
    /// Whether a pool question satisfies the filter.
    pub fn matches(&self, question: &QuestionEntity) -> bool {
        self.subject_id
            .is_none_or(|subject| question.subject_id == Some(subject))
            && self
                .chapter_id
                .is_none_or(|chapter| question.chapter_id == Some(chapter))
    }
}

/// One atomic write of a room: its row, changed participant rows, removed
/// participants and the ledger entries produced by the same mutation.
#[derive(Debug, Clone)]
pub struct RoomCommit {
    /// Room row after the mutation.
    pub room: BattleRoomEntity,
    /// Participant rows to upsert.
    pub participants: Vec<ParticipantEntity>,
    /// Users whose participant row is deleted.
    pub removed_participants: Vec<Uuid>,
    /// Ledger entries to append.
    pub ledger: Vec<AnswerLedgerEntryEntity>,
}

impl RoomCommit {
    /// Commit carrying only the room row.
    pub fn room_only(room: BattleRoomEntity) -> Self {
        Self {
            room,
            participants: Vec::new(),
            removed_participants: Vec::new(),
            ledger: Vec::new(),
        }
    }
}
