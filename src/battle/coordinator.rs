//! One actor task per room. The actor owns the authoritative [`BattleRoom`];
//! everyone else talks to it through a [`RoomHandle`].
//!
//! Every mutation is applied to a draft copy, persisted as one [`RoomCommit`],
//! and only then installed and broadcast. A failed write leaves the room untouched.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Instant, sleep_until, timeout},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    battle::finalizer,
    config::BattleSettings,
    dao::models::{
        AnswerLedgerEntryEntity, BattleResultEntity, BattleRoomEntity, ParticipantEntity,
        RoomCommit,
    },
    error::ServiceError,
    state::{
        SharedState,
        room::{AnswerRecord, BattleRoom, RoomStatus},
        state_machine::{RoomEvent, RoomPhase, RoomStateMachine},
    },
};

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

/// Why a participant stops playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The participant asked to leave.
    Left,
    /// The participant's connection went away.
    Disconnected,
}

/// Requests processed by a room actor, in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    /// Seat a user.
    Join {
        /// Joining user.
        user_id: Uuid,
        /// Display name.
        username: String,
        /// Snapshot after the join.
        reply: Reply<RoomView>,
    },
    /// Mark a participant ready.
    Ready {
        /// Participant.
        user_id: Uuid,
        /// Snapshot after the update.
        reply: Reply<RoomView>,
    },
    /// Answer the current question.
    Submit {
        /// Participant.
        user_id: Uuid,
        /// Question the answer targets.
        question_index: usize,
        /// Chosen option.
        chosen_option: usize,
        /// Seconds spent, as measured by the client.
        time_taken: u32,
        /// Scored answer and snapshot.
        reply: Reply<SubmitOutcome>,
    },
    /// Leave a waiting room, or stop answering in a running one.
    Leave {
        /// Participant.
        user_id: Uuid,
        /// Reason, for logging.
        departure: Departure,
        /// Snapshot after the update.
        reply: Reply<RoomView>,
    },
    /// Mark a participant connected again.
    Connect {
        /// Participant.
        user_id: Uuid,
        /// Snapshot after the update.
        reply: Reply<RoomView>,
    },
    /// Read the current snapshot.
    Snapshot {
        /// Current snapshot.
        reply: oneshot::Sender<RoomView>,
    },
}

/// Authoritative room state at a given revision.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    /// Increases with every accepted mutation.
    pub revision: u64,
    /// Room state. Pending answers must be hidden before this leaves the server.
    pub room: BattleRoom,
    /// When the open question times out.
    pub question_deadline: Option<SystemTime>,
}

/// Result of an accepted answer.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The scored answer.
    pub record: AnswerRecord,
    /// Snapshot right after the answer was recorded.
    pub view: RoomView,
}

/// How a room ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The last question closed.
    Completed,
    /// The room sat idle in `waiting` for too long.
    Abandoned,
}

impl CloseReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Completed => "completed",
            CloseReason::Abandoned => "abandoned",
        }
    }
}

/// Updates fanned out to every subscriber of a room.
#[derive(Debug, Clone)]
pub enum RoomUpdate {
    /// A mutation was accepted.
    Snapshot(RoomView),
    /// The room completed and results were computed.
    Completed {
        /// Final snapshot.
        view: RoomView,
        /// Results in rank order.
        results: Vec<BattleResultEntity>,
    },
    /// The actor stopped; no further updates follow.
    Closed {
        /// How the room ended.
        reason: CloseReason,
    },
}

/// Cloneable address of a room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: Uuid,
    room_code: Arc<str>,
    commands: mpsc::Sender<RoomCommand>,
    updates: broadcast::Sender<RoomUpdate>,
}

impl RoomHandle {
    /// Room identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Join code of the room.
    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Receive every update broadcast from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomUpdate> {
        self.updates.subscribe()
    }

    /// Seat a user in the room.
    pub async fn join(&self, user_id: Uuid, username: String) -> Result<RoomView, ServiceError> {
        self.request(|reply| RoomCommand::Join {
            user_id,
            username,
            reply,
        })
        .await
    }

    /// Mark a participant ready.
    pub async fn set_ready(&self, user_id: Uuid) -> Result<RoomView, ServiceError> {
        self.request(|reply| RoomCommand::Ready { user_id, reply })
            .await
    }

    /// Answer the current question.
    pub async fn submit_answer(
        &self,
        user_id: Uuid,
        question_index: usize,
        chosen_option: usize,
        time_taken: u32,
    ) -> Result<SubmitOutcome, ServiceError> {
        self.request(|reply| RoomCommand::Submit {
            user_id,
            question_index,
            chosen_option,
            time_taken,
            reply,
        })
        .await
    }

    /// Leave the room.
    pub async fn leave(&self, user_id: Uuid) -> Result<RoomView, ServiceError> {
        self.request(|reply| RoomCommand::Leave {
            user_id,
            departure: Departure::Left,
            reply,
        })
        .await
    }

    /// Report a lost connection.
    pub async fn disconnect(&self, user_id: Uuid) -> Result<RoomView, ServiceError> {
        self.request(|reply| RoomCommand::Leave {
            user_id,
            departure: Departure::Disconnected,
            reply,
        })
        .await
    }

    /// Report a (re)established connection.
    pub async fn connect(&self, user_id: Uuid) -> Result<RoomView, ServiceError> {
        self.request(|reply| RoomCommand::Connect { user_id, reply })
            .await
    }

    /// Current snapshot.
    pub async fn snapshot(&self) -> Result<RoomView, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::Snapshot { reply })
            .await
            .map_err(|_| ServiceError::RoomClosed)?;
        rx.await.map_err(|_| ServiceError::RoomClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::RoomClosed)?;
        rx.await.map_err(|_| ServiceError::RoomClosed)?
    }
}

/// Start the actor of a room that was just persisted at `revision`.
pub fn spawn_room(state: SharedState, room: BattleRoom, revision: u64) -> RoomHandle {
    let settings = state.config().battle.clone();
    let (commands, inbox) = mpsc::channel(settings.command_capacity);
    let (updates, _) = broadcast::channel(settings.update_capacity);

    let handle = RoomHandle {
        id: room.id,
        room_code: Arc::from(room.room_code.as_str()),
        commands,
        updates: updates.clone(),
    };

    let actor = RoomActor::new(state, room, revision, updates, settings);
    tokio::spawn(actor.run(inbox));
    handle
}

struct RoomActor {
    state: SharedState,
    room: BattleRoom,
    machine: RoomStateMachine,
    revision: u64,
    updates: broadcast::Sender<RoomUpdate>,
    settings: BattleSettings,
    timer: Instant,
    question_deadline: Option<(Instant, SystemTime)>,
    last_activity: Instant,
    close_reason: CloseReason,
}

impl RoomActor {
    fn new(
        state: SharedState,
        room: BattleRoom,
        revision: u64,
        updates: broadcast::Sender<RoomUpdate>,
        settings: BattleSettings,
    ) -> Self {
        let now = Instant::now();
        let machine = RoomStateMachine::new(room.total_questions());
        Self {
            state,
            timer: now + settings.abandonment_window,
            room,
            machine,
            revision,
            updates,
            settings,
            question_deadline: None,
            last_activity: now,
            close_reason: CloseReason::Completed,
        }
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<RoomCommand>) {
        info!(
            room_id = %self.room.id,
            room_code = %self.room.room_code,
            battle_type = self.room.battle_type.as_str(),
            "room opened"
        );

        while self.room.status != RoomStatus::Completed {
            tokio::select! {
                command = inbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        debug!(room_id = %self.room.id, "room inbox closed");
                        return;
                    }
                },
                _ = sleep_until(self.timer) => self.on_timer().await,
            }
        }

        inbox.close();
        self.finish().await;
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                user_id,
                username,
                reply,
            } => {
                let result = self.join(user_id, username).await;
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.touch();
                }
            }
            RoomCommand::Ready { user_id, reply } => {
                let result = self.ready(user_id).await;
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.touch();
                    self.try_start().await;
                }
            }
            RoomCommand::Submit {
                user_id,
                question_index,
                chosen_option,
                time_taken,
                reply,
            } => {
                let result = self
                    .submit(user_id, question_index, chosen_option, time_taken)
                    .await;
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.check_advance().await;
                }
            }
            RoomCommand::Leave {
                user_id,
                departure,
                reply,
            } => {
                let was_waiting = self.room.status == RoomStatus::Waiting;
                let result = self.depart(user_id, departure).await;
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    if was_waiting {
                        self.touch();
                    } else {
                        self.check_advance().await;
                    }
                }
            }
            RoomCommand::Connect { user_id, reply } => {
                let result = self.connect(user_id).await;
                let accepted = result.is_ok();
                let _ = reply.send(result);
                if accepted {
                    self.touch();
                }
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.view());
            }
        }
    }

    async fn join(&mut self, user_id: Uuid, username: String) -> Result<RoomView, ServiceError> {
        let mut draft = self.room.clone();
        let team = draft.join(user_id, username, SystemTime::now())?.team;
        let view = self.persist(draft, &[user_id], Vec::new(), Vec::new()).await?;
        info!(room_id = %self.room.id, user_id = %user_id, team = ?team, "participant joined");
        Ok(view)
    }

    async fn ready(&mut self, user_id: Uuid) -> Result<RoomView, ServiceError> {
        let mut draft = self.room.clone();
        if !draft.set_ready(user_id)? {
            return Ok(self.view());
        }
        self.persist(draft, &[user_id], Vec::new(), Vec::new())
            .await
    }

    async fn submit(
        &mut self,
        user_id: Uuid,
        question_index: usize,
        chosen_option: usize,
        time_taken: u32,
    ) -> Result<SubmitOutcome, ServiceError> {
        let mut draft = self.room.clone();
        let record = draft.submit_answer(
            user_id,
            question_index,
            chosen_option,
            time_taken,
            SystemTime::now(),
        )?;
        let ledger = vec![AnswerLedgerEntryEntity::from_answer(
            user_id, draft.id, &record,
        )];
        let view = self.persist(draft, &[user_id], Vec::new(), ledger).await?;
        debug!(
            room_id = %self.room.id,
            user_id = %user_id,
            question_index,
            is_correct = record.is_correct,
            points = record.points,
            "answer recorded"
        );
        Ok(SubmitOutcome { record, view })
    }

    async fn depart(&mut self, user_id: Uuid, departure: Departure) -> Result<RoomView, ServiceError> {
        let mut draft = self.room.clone();
        let view = match self.room.status {
            RoomStatus::Waiting => {
                draft.leave(user_id)?;
                self.persist(draft, &[], vec![user_id], Vec::new()).await?
            }
            RoomStatus::InProgress => {
                if !draft.set_connected(user_id, false)? {
                    return Ok(self.view());
                }
                self.persist(draft, &[user_id], Vec::new(), Vec::new())
                    .await?
            }
            RoomStatus::Completed => return Err(ServiceError::RoomClosed),
        };
        info!(
            room_id = %self.room.id,
            user_id = %user_id,
            departure = ?departure,
            status = ?self.room.status,
            "participant departed"
        );
        Ok(view)
    }

    async fn connect(&mut self, user_id: Uuid) -> Result<RoomView, ServiceError> {
        let mut draft = self.room.clone();
        if !draft.set_connected(user_id, true)? {
            return Ok(self.view());
        }
        let view = self.persist(draft, &[user_id], Vec::new(), Vec::new()).await?;
        info!(room_id = %self.room.id, user_id = %user_id, "participant reconnected");
        Ok(view)
    }

    async fn on_timer(&mut self) {
        let now = Instant::now();
        match self.room.status {
            RoomStatus::Waiting => {
                let idle_until = self.last_activity + self.settings.abandonment_window;
                if self.room.can_start() {
                    self.try_start().await;
                } else if now >= idle_until {
                    self.abandon().await;
                } else {
                    self.timer = idle_until;
                }
            }
            RoomStatus::InProgress => {
                let due = self.question_deadline.is_none_or(|(at, _)| now >= at);
                if due || self.room.all_connected_answered() {
                    self.advance().await;
                } else if let Some((at, _)) = self.question_deadline {
                    self.timer = at;
                }
            }
            RoomStatus::Completed => {}
        }
    }

    async fn try_start(&mut self) {
        if !self.room.can_start() {
            return;
        }
        match self.transition(RoomEvent::Start).await {
            Ok(()) => info!(
                room_id = %self.room.id,
                players = self.room.current_players(),
                questions = self.room.total_questions(),
                "battle started"
            ),
            Err(err) => {
                warn!(room_id = %self.room.id, error = %err, "failed to start battle; retrying");
                self.schedule_retry();
            }
        }
    }

    async fn check_advance(&mut self) {
        if self.room.status == RoomStatus::InProgress && self.room.all_connected_answered() {
            self.advance().await;
        }
    }

    async fn advance(&mut self) {
        let question_index = self.room.current_question;
        match self.transition(RoomEvent::Advance).await {
            Ok(()) => debug!(room_id = %self.room.id, question_index, "question closed"),
            Err(err) => {
                warn!(
                    room_id = %self.room.id,
                    question_index,
                    error = %err,
                    "failed to close question; retrying"
                );
                self.schedule_retry();
            }
        }
    }

    async fn abandon(&mut self) {
        match self.transition(RoomEvent::Abandon).await {
            Ok(()) => {
                self.close_reason = CloseReason::Abandoned;
                warn!(
                    room_id = %self.room.id,
                    room_code = %self.room.room_code,
                    players = self.room.current_players(),
                    "waiting room abandoned"
                );
            }
            Err(err) => {
                warn!(room_id = %self.room.id, error = %err, "failed to abandon room; retrying");
                self.schedule_retry();
            }
        }
    }

    /// Plan `event`, persist the resulting room, then apply the plan.
    async fn transition(&mut self, event: RoomEvent) -> Result<(), ServiceError> {
        let now = SystemTime::now();
        let plan = self.machine.plan(event)?;

        let mut draft = self.room.clone();
        let mut changed = Vec::new();
        let mut ledger = Vec::new();
        match event {
            RoomEvent::Start => draft.start(now),
            RoomEvent::Advance => {
                for (user_id, record) in draft.close_question(now) {
                    ledger.push(AnswerLedgerEntryEntity::from_answer(
                        user_id, draft.id, &record,
                    ));
                }
                changed.extend(draft.participants.keys().copied());
                if plan.to == RoomPhase::Completed {
                    draft.complete(now);
                }
            }
            RoomEvent::Abandon => draft.complete(now),
        }

        let revision = match self.store_commit(&draft, &changed, Vec::new(), ledger).await {
            Ok(revision) => revision,
            Err(err) => {
                if let Err(abort_err) = self.machine.abort(plan.id) {
                    warn!(
                        room_id = %self.room.id,
                        event = ?event,
                        plan_id = %plan.id,
                        error = ?abort_err,
                        "failed to abort transition after storage error"
                    );
                }
                return Err(err);
            }
        };

        self.machine.apply(plan.id)?;
        self.question_deadline = match plan.to {
            RoomPhase::InProgress { .. } => {
                let limit = Duration::from_secs(u64::from(draft.time_per_question));
                let at = Instant::now() + limit;
                self.timer = at;
                Some((at, now + limit))
            }
            RoomPhase::Waiting | RoomPhase::Completed => None,
        };
        self.install(draft, revision);
        Ok(())
    }

    /// Persist `draft`, then make it the authoritative state.
    async fn persist(
        &mut self,
        draft: BattleRoom,
        changed: &[Uuid],
        removed: Vec<Uuid>,
        ledger: Vec<AnswerLedgerEntryEntity>,
    ) -> Result<RoomView, ServiceError> {
        let revision = self.store_commit(&draft, changed, removed, ledger).await?;
        self.install(draft, revision);
        Ok(self.view())
    }

    async fn store_commit(
        &self,
        draft: &BattleRoom,
        changed: &[Uuid],
        removed: Vec<Uuid>,
        ledger: Vec<AnswerLedgerEntryEntity>,
    ) -> Result<u64, ServiceError> {
        let store = self.state.require_battle_store().await?;
        let revision = self.revision + 1;
        let commit = RoomCommit {
            room: BattleRoomEntity::from_room(draft, revision),
            participants: changed
                .iter()
                .filter_map(|user_id| draft.participant(*user_id))
                .map(|participant| ParticipantEntity::from_participant(draft.id, participant))
                .collect(),
            removed_participants: removed,
            ledger,
        };

        timeout(self.settings.storage_timeout, store.commit(commit))
            .await
            .map_err(|_| ServiceError::Timeout)??;
        Ok(revision)
    }

    fn install(&mut self, room: BattleRoom, revision: u64) {
        self.room = room;
        self.revision = revision;
        let _ = self.updates.send(RoomUpdate::Snapshot(self.view()));
    }

    fn view(&self) -> RoomView {
        RoomView {
            revision: self.revision,
            room: self.room.clone(),
            question_deadline: self.question_deadline.map(|(_, at)| at),
        }
    }

    /// Reset the abandonment window of a waiting room.
    fn touch(&mut self) {
        if self.room.status != RoomStatus::Waiting {
            return;
        }
        self.last_activity = Instant::now();
        self.timer = self.last_activity + self.settings.abandonment_window;
    }

    fn schedule_retry(&mut self) {
        let now = Instant::now();
        let retry = now + self.settings.retry_delay;
        self.timer = match self.question_deadline {
            Some((at, _)) if at > now => retry.min(at),
            _ => retry,
        };
    }

    /// Write results exactly once, announce them and release the room.
    async fn finish(self) {
        let results = finalizer::compute_results(&self.room, SystemTime::now());
        match self.state.require_battle_store().await {
            Ok(store) => {
                if let Err(err) = finalizer::finalize(
                    store,
                    results.clone(),
                    self.settings.finalize_attempts,
                    self.settings.retry_delay,
                )
                .await
                {
                    error!(
                        room_id = %self.room.id,
                        error = %err,
                        "failed to persist battle results"
                    );
                }
            }
            Err(err) => error!(
                room_id = %self.room.id,
                error = %err,
                "battle results not persisted"
            ),
        }

        self.state
            .unregister_room(self.room.id, &self.room.room_code);
        info!(
            room_id = %self.room.id,
            reason = self.close_reason.as_str(),
            participants = results.len(),
            "room closed"
        );
        let _ = self.updates.send(RoomUpdate::Completed {
            view: self.view(),
            results,
        });
        let _ = self.updates.send(RoomUpdate::Closed {
            reason: self.close_reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::battle_store::{BattleStore, memory::InMemoryBattleStore},
        state::{
            AppState,
            room::{BattleType, Question},
        },
    };

    fn questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| Question {
                prompt: format!("question {i}"),
                options: vec!["yes".into(), "no".into()],
                correct_option: 0,
                explanation: None,
            })
            .collect()
    }

    async fn open_room(count: usize) -> (SharedState, InMemoryBattleStore, RoomHandle) {
        let state = AppState::new(AppConfig::default(), None);
        let store = InMemoryBattleStore::new();
        state.set_battle_store(Arc::new(store.clone())).await;

        let room = BattleRoom::new(
            Uuid::new_v4(),
            "TESTQQ".into(),
            BattleType::OneVsOne,
            None,
            None,
            questions(count),
            30,
            SystemTime::now(),
        );
        BattleStore::commit(
            &store,
            RoomCommit::room_only(BattleRoomEntity::from_room(&room, 0)),
        )
        .await
        .unwrap();
        let handle = spawn_room(state.clone(), room, 0);
        state.register_room(handle.clone());
        (state, store, handle)
    }

    async fn next_closed(updates: &mut broadcast::Receiver<RoomUpdate>) -> Vec<RoomUpdate> {
        let mut seen = Vec::new();
        loop {
            let update = updates.recv().await.unwrap();
            let closed = matches!(update, RoomUpdate::Closed { .. });
            seen.push(update);
            if closed {
                return seen;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_questions_time_out() {
        let (state, store, handle) = open_room(2).await;
        let mut updates = handle.subscribe();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        handle.join(a, "a".into()).await.unwrap();
        handle.join(b, "b".into()).await.unwrap();
        handle.set_ready(a).await.unwrap();
        let started = handle.set_ready(b).await.unwrap();
        assert_eq!(started.room.status, RoomStatus::Waiting);

        let view = handle.snapshot().await.unwrap();
        assert_eq!(view.room.status, RoomStatus::InProgress);
        assert!(view.question_deadline.is_some());

        handle.submit_answer(a, 0, 0, 4).await.unwrap();

        let seen = next_closed(&mut updates).await;
        let Some(RoomUpdate::Completed { view, results }) = seen
            .iter()
            .find(|update| matches!(update, RoomUpdate::Completed { .. }))
        else {
            panic!("room never completed");
        };
        assert_eq!(view.room.current_question, 2);
        assert_eq!(results[0].user_id, a);
        assert_eq!(results[0].final_score, 20);
        for participant in view.room.participants.values() {
            assert_eq!(participant.answers.len(), 2);
        }
        let timed_out = &view.room.participant(b).unwrap().answers;
        assert!(timed_out.iter().all(|answer| answer.time_taken == 30 && !answer.is_correct));

        // one submitted answer plus three timeouts
        assert_eq!(store.list_ledger().await.unwrap().len(), 4);
        assert!(state.room(handle.id()).is_none());
        assert!(matches!(handle.snapshot().await, Err(ServiceError::RoomClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_waiting_rooms_are_abandoned() {
        let (state, store, handle) = open_room(3).await;
        let mut updates = handle.subscribe();
        let user = Uuid::new_v4();
        handle.join(user, "lonely".into()).await.unwrap();

        let seen = next_closed(&mut updates).await;
        assert!(matches!(
            seen.last(),
            Some(RoomUpdate::Closed {
                reason: CloseReason::Abandoned
            })
        ));
        assert!(state.room_by_code("TESTQQ").is_none());

        let persisted = store.find_room(handle.id()).await.unwrap().unwrap();
        assert_eq!(persisted.status, RoomStatus::Completed);
        assert!(persisted.started_at.is_some());
        assert!(persisted.ended_at.is_some());
        let results = store.list_results(handle.id()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].final_score, 0);
    }

    #[tokio::test]
    async fn storage_outage_leaves_room_untouched() {
        let (_state, store, handle) = open_room(1).await;
        let before = handle.snapshot().await.unwrap();

        store.set_offline(true);
        let err = handle
            .join(Uuid::new_v4(), "x".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(handle.snapshot().await.unwrap(), before);

        store.set_offline(false);
        let after = handle.join(Uuid::new_v4(), "x".into()).await.unwrap();
        assert_eq!(after.revision, before.revision + 1);
        assert_eq!(after.room.current_players(), 1);
    }
}
