//! Authoritative model of a battle room, its participants and their answers.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{battle::scoring, error::ServiceError};

/// Smallest number of options a question may offer.
pub const MIN_OPTIONS: usize = 2;
/// Largest number of options a question may offer.
pub const MAX_OPTIONS: usize = 6;

/// Shape of a battle: how many players it seats and how they are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BattleType {
    /// Two players, no teams.
    #[serde(rename = "1v1")]
    OneVsOne,
    /// Four players split into two teams.
    #[serde(rename = "2v2")]
    TwoVsTwo,
    /// Four players, each on their own team.
    #[serde(rename = "4p")]
    FourPlayer,
}

impl BattleType {
    /// Number of seats in a room of this type.
    pub const fn max_players(self) -> usize {
        match self {
            BattleType::OneVsOne => 2,
            BattleType::TwoVsTwo | BattleType::FourPlayer => 4,
        }
    }

    /// Number of teams participants are spread across, `None` when teams are not used.
    pub const fn team_count(self) -> Option<u8> {
        match self {
            BattleType::OneVsOne => None,
            BattleType::TwoVsTwo => Some(2),
            BattleType::FourPlayer => Some(4),
        }
    }

    /// Wire name of the battle type.
    pub const fn as_str(self) -> &'static str {
        match self {
            BattleType::OneVsOne => "1v1",
            BattleType::TwoVsTwo => "2v2",
            BattleType::FourPlayer => "4p",
        }
    }
}

/// Lifecycle status of a room as persisted and exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Accepting participants.
    Waiting,
    /// Questions are being played.
    InProgress,
    /// Final; results are (or are being) written.
    Completed,
}

/// A multiple-choice question played in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Question {
    /// Text shown to participants.
    pub prompt: String,
    /// Candidate answers, in display order.
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_option: usize,
    /// Optional explanation revealed once the question closes.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Reasons a question is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// The prompt is blank.
    #[error("question prompt is empty")]
    EmptyPrompt,
    /// Too few or too many options.
    #[error("question must have between {MIN_OPTIONS} and {MAX_OPTIONS} options (got {count})")]
    OptionCount {
        /// Number of options received.
        count: usize,
    },
    /// An option is blank.
    #[error("option {index} is empty")]
    EmptyOption {
        /// Offending option.
        index: usize,
    },
    /// Two options carry the same text.
    #[error("option {index} duplicates an earlier option")]
    DuplicateOption {
        /// Offending option.
        index: usize,
    },
    /// The correct option does not point at an option.
    #[error("correct option {index} is out of range for {count} options")]
    CorrectOptionOutOfRange {
        /// Declared correct option.
        index: usize,
        /// Number of options.
        count: usize,
    },
}

impl Question {
    /// Check the question against the fixed schema used by every room.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        let count = self.options.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
            return Err(QuestionError::OptionCount { count });
        }

        for (index, option) in self.options.iter().enumerate() {
            let normalized = option.trim();
            if normalized.is_empty() {
                return Err(QuestionError::EmptyOption { index });
            }
            if self.options[..index]
                .iter()
                .any(|earlier| earlier.trim().eq_ignore_ascii_case(normalized))
            {
                return Err(QuestionError::DuplicateOption { index });
            }
        }

        if self.correct_option >= count {
            return Err(QuestionError::CorrectOptionOutOfRange {
                index: self.correct_option,
                count,
            });
        }

        Ok(())
    }
}

/// One scored answer of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Question the answer belongs to.
    pub question_index: usize,
    /// Chosen option, `None` when the question timed out.
    pub chosen_option: Option<usize>,
    /// Whether the chosen option was the correct one.
    pub is_correct: bool,
    /// Seconds spent, clamped to the question's time limit.
    pub time_taken: u32,
    /// Points awarded (base plus speed bonus).
    pub points: u32,
    /// Share of `points` that came from answering quickly.
    pub speed_bonus: u32,
    /// When the answer was recorded.
    pub answered_at: SystemTime,
}

impl AnswerRecord {
    /// Record for a question the participant never answered.
    pub fn timed_out(question_index: usize, time_limit: u32, now: SystemTime) -> Self {
        Self {
            question_index,
            chosen_option: None,
            is_correct: false,
            time_taken: time_limit,
            points: 0,
            speed_bonus: 0,
            answered_at: now,
        }
    }
}

/// A user seated in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Row identifier.
    pub id: Uuid,
    /// Identity of the user.
    pub user_id: Uuid,
    /// Display name captured at join time.
    pub username: String,
    /// Team number (starting at 1) for team battles.
    pub team: Option<u8>,
    /// Running score, including a not yet revealed answer.
    pub score: u32,
    /// Closed questions, in question order.
    pub answers: Vec<AnswerRecord>,
    /// Answer to the current question, hidden from other participants until it closes.
    pub pending_answer: Option<AnswerRecord>,
    /// Whether the participant is ready to start.
    pub is_ready: bool,
    /// Whether the participant is expected to keep answering.
    pub connected: bool,
    /// Join timestamp, used as a ranking tie-breaker.
    pub joined_at: SystemTime,
}

impl Participant {
    /// Score visible to everyone: the pending answer's points are not revealed yet.
    pub fn revealed_score(&self) -> u32 {
        let pending = self.pending_answer.as_ref().map_or(0, |answer| answer.points);
        self.score.saturating_sub(pending)
    }

    /// Number of correct closed answers.
    pub fn total_correct(&self) -> u32 {
        self.answers.iter().filter(|answer| answer.is_correct).count() as u32
    }

    /// Cumulative seconds spent on closed answers.
    pub fn total_time(&self) -> u64 {
        self.answers
            .iter()
            .map(|answer| u64::from(answer.time_taken))
            .sum()
    }

    /// Sum of the speed bonuses earned on closed answers.
    pub fn time_bonus(&self) -> u32 {
        self.answers.iter().map(|answer| answer.speed_bonus).sum()
    }
}

/// Authoritative state of a room, owned by its coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleRoom {
    /// Room identifier.
    pub id: Uuid,
    /// Short join token.
    pub room_code: String,
    /// Seating shape.
    pub battle_type: BattleType,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Subject the questions were drawn from.
    pub subject_id: Option<Uuid>,
    /// Chapter the questions were drawn from, `None` for a mixed set.
    pub chapter_id: Option<Uuid>,
    /// Questions fixed at creation.
    pub questions: Vec<Question>,
    /// Zero-based cursor; equals the question count once completed.
    pub current_question: usize,
    /// Seconds allowed per question.
    pub time_per_question: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Set when the room leaves `waiting`.
    pub started_at: Option<SystemTime>,
    /// Set when the room completes.
    pub ended_at: Option<SystemTime>,
    /// Participants keyed by user, in join order.
    pub participants: IndexMap<Uuid, Participant>,
}

impl BattleRoom {
    /// Build a fresh waiting room.
    pub fn new(
        id: Uuid,
        room_code: String,
        battle_type: BattleType,
        subject_id: Option<Uuid>,
        chapter_id: Option<Uuid>,
        questions: Vec<Question>,
        time_per_question: u32,
        now: SystemTime,
    ) -> Self {
        Self {
            id,
            room_code,
            battle_type,
            status: RoomStatus::Waiting,
            subject_id,
            chapter_id,
            questions,
            current_question: 0,
            time_per_question,
            created_at: now,
            started_at: None,
            ended_at: None,
            participants: IndexMap::new(),
        }
    }

    /// Number of seats.
    pub fn max_players(&self) -> usize {
        self.battle_type.max_players()
    }

    /// Number of seated participants.
    pub fn current_players(&self) -> usize {
        self.participants.len()
    }

    /// Number of questions in the room.
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Whether every seat is taken.
    pub fn is_full(&self) -> bool {
        self.current_players() >= self.max_players()
    }

    /// Whether the room satisfies the start condition.
    pub fn can_start(&self) -> bool {
        self.status == RoomStatus::Waiting
            && self.is_full()
            && self.participants.values().all(|p| p.is_ready)
    }

    /// Question currently being played.
    pub fn current(&self) -> Option<&Question> {
        match self.status {
            RoomStatus::InProgress => self.questions.get(self.current_question),
            _ => None,
        }
    }

    /// Look up a participant by user.
    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.get(&user_id)
    }

    /// Seat a user, assigning a team for team battles.
    pub fn join(
        &mut self,
        user_id: Uuid,
        username: String,
        now: SystemTime,
    ) -> Result<&Participant, ServiceError> {
        if self.participants.contains_key(&user_id) {
            return Err(ServiceError::AlreadyJoined);
        }
        if self.is_full() {
            return Err(ServiceError::RoomFull);
        }
        if self.status != RoomStatus::Waiting {
            return Err(ServiceError::RoomNotWaiting);
        }

        let team = self.next_team();
        let participant = Participant {
            id: Uuid::new_v4(),
            user_id,
            username,
            team,
            score: 0,
            answers: Vec::new(),
            pending_answer: None,
            is_ready: false,
            connected: true,
            joined_at: now,
        };
        let seated = self.participants.entry(user_id).or_insert(participant);
        Ok(&*seated)
    }

    /// Remove a participant from a waiting room.
    pub fn leave(&mut self, user_id: Uuid) -> Result<Participant, ServiceError> {
        if self.status != RoomStatus::Waiting {
            return Err(ServiceError::RoomNotWaiting);
        }
        self.participants
            .shift_remove(&user_id)
            .ok_or(ServiceError::NotParticipant)
    }

    /// Mark a participant ready. Returns whether anything changed.
    pub fn set_ready(&mut self, user_id: Uuid) -> Result<bool, ServiceError> {
        if self.status != RoomStatus::Waiting {
            return Err(ServiceError::RoomNotWaiting);
        }
        let participant = self
            .participants
            .get_mut(&user_id)
            .ok_or(ServiceError::NotParticipant)?;
        let changed = !participant.is_ready;
        participant.is_ready = true;
        Ok(changed)
    }

    /// Flip a participant's connection flag. Returns whether anything changed.
    pub fn set_connected(&mut self, user_id: Uuid, connected: bool) -> Result<bool, ServiceError> {
        let participant = self
            .participants
            .get_mut(&user_id)
            .ok_or(ServiceError::NotParticipant)?;
        let changed = participant.connected != connected;
        participant.connected = connected;
        Ok(changed)
    }

    /// Record an answer to the current question and credit its points.
    pub fn submit_answer(
        &mut self,
        user_id: Uuid,
        question_index: usize,
        chosen_option: usize,
        time_taken: u32,
        now: SystemTime,
    ) -> Result<AnswerRecord, ServiceError> {
        if self.status != RoomStatus::InProgress {
            return Err(ServiceError::RoomNotInProgress);
        }
        let current = self.current_question;
        let time_limit = self.time_per_question;
        let question = self
            .questions
            .get(current)
            .ok_or(ServiceError::RoomNotInProgress)?;
        let option_count = question.options.len();
        let is_correct = question.correct_option == chosen_option;

        let participant = self
            .participants
            .get_mut(&user_id)
            .ok_or(ServiceError::NotParticipant)?;
        if question_index != current {
            return Err(ServiceError::StaleQuestion {
                expected: current,
                got: question_index,
            });
        }
        if participant.pending_answer.is_some() {
            return Err(ServiceError::DuplicateAnswer);
        }
        if chosen_option >= option_count {
            return Err(ServiceError::InvalidInput(format!(
                "option {chosen_option} does not exist (question has {option_count} options)"
            )));
        }

        let time_taken = time_taken.min(time_limit);
        let scored = scoring::score_answer(is_correct, time_taken, time_limit);
        let record = AnswerRecord {
            question_index,
            chosen_option: Some(chosen_option),
            is_correct,
            time_taken,
            points: scored.points,
            speed_bonus: scored.speed_bonus,
            answered_at: now,
        };
        participant.score += record.points;
        participant.pending_answer = Some(record.clone());
        Ok(record)
    }

    /// Whether the current question can close early: at least one participant is
    /// connected and every connected participant has answered.
    pub fn all_connected_answered(&self) -> bool {
        let mut connected = self.participants.values().filter(|p| p.connected).peekable();
        connected.peek().is_some() && connected.all(|p| p.pending_answer.is_some())
    }

    /// Enter `in_progress` on the first question.
    pub fn start(&mut self, now: SystemTime) {
        self.status = RoomStatus::InProgress;
        self.started_at = Some(now);
        self.current_question = 0;
    }

    /// Close the current question: pending answers are revealed, missing ones are
    /// recorded as timeouts, and the cursor moves forward.
    ///
    /// Returns the timeouts that were filled in, keyed by user.
    pub fn close_question(&mut self, now: SystemTime) -> Vec<(Uuid, AnswerRecord)> {
        let index = self.current_question;
        let time_limit = self.time_per_question;
        let mut timeouts = Vec::new();

        for participant in self.participants.values_mut() {
            let record = match participant.pending_answer.take() {
                Some(record) => record,
                None => {
                    let record = AnswerRecord::timed_out(index, time_limit, now);
                    timeouts.push((participant.user_id, record.clone()));
                    record
                }
            };
            participant.answers.push(record);
        }

        self.current_question = (index + 1).min(self.total_questions());
        timeouts
    }

    /// Enter `completed`. A room that never started gets both timestamps.
    pub fn complete(&mut self, now: SystemTime) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = RoomStatus::Completed;
        self.ended_at = Some(now);
        self.current_question = self.total_questions();
    }

    /// Least populated team, lowest number first.
    fn next_team(&self) -> Option<u8> {
        let teams = self.battle_type.team_count()?;
        (1..=teams).min_by_key(|team| {
            self.participants
                .values()
                .filter(|p| p.team == Some(*team))
                .count()
        })
    }
}
