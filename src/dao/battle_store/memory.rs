//! Process-local store used for development and as the test double of [`BattleStore`].

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    battle_store::BattleStore,
    models::{
        AnswerLedgerEntryEntity, BattleResultEntity, BattleRoomEntity, ParticipantEntity,
        ProfileEntity, QuestionEntity, QuestionFilter, RoomCommit,
    },
    storage::{StorageError, StorageResult},
};

/// Tables guarded by a single lock so a [`RoomCommit`] is applied atomically.
#[derive(Default)]
struct Tables {
    rooms: IndexMap<Uuid, BattleRoomEntity>,
    participants: IndexMap<(Uuid, Uuid), ParticipantEntity>,
    results: IndexMap<(Uuid, Uuid), BattleResultEntity>,
    ledger: Vec<AnswerLedgerEntryEntity>,
    profiles: HashMap<Uuid, ProfileEntity>,
    questions: Vec<QuestionEntity>,
}

/// In-memory [`BattleStore`] with a switch that simulates an outage.
#[derive(Clone, Default)]
pub struct InMemoryBattleStore {
    tables: Arc<RwLock<Tables>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryBattleStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with [`StorageError::Unavailable`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Add questions to the pool.
    pub async fn seed_questions(&self, questions: impl IntoIterator<Item = QuestionEntity>) {
        self.tables.write().await.questions.extend(questions);
    }

    /// Add or replace user profiles.
    pub async fn seed_profiles(&self, profiles: impl IntoIterator<Item = ProfileEntity>) {
        let mut tables = self.tables.write().await;
        for profile in profiles {
            tables.profiles.insert(profile.id, profile);
        }
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "store switched offline"),
            ));
        }
        Ok(())
    }

    async fn apply_commit(&self, commit: RoomCommit) -> StorageResult<()> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;

        let room = commit.room;
        if room.holds_code()
            && tables.rooms.values().any(|other| {
                other.id != room.id && other.holds_code() && other.room_code == room.room_code
            })
        {
            return Err(StorageError::conflict(format!(
                "room code `{}` is held by another active room",
                room.room_code
            )));
        }

        let room_id = room.id;
        tables.rooms.insert(room_id, room);
        for user_id in commit.removed_participants {
            tables.participants.shift_remove(&(room_id, user_id));
        }
        for participant in commit.participants {
            tables
                .participants
                .insert((room_id, participant.user_id), participant);
        }
        tables.ledger.extend(commit.ledger);
        Ok(())
    }

    async fn insert_results(&self, results: Vec<BattleResultEntity>) -> StorageResult<()> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        for result in results {
            tables
                .results
                .entry((result.battle_room_id, result.user_id))
                .or_insert(result);
        }
        Ok(())
    }

    async fn draw_questions(
        &self,
        filter: QuestionFilter,
        count: usize,
    ) -> StorageResult<Vec<QuestionEntity>> {
        self.ensure_online()?;
        let mut candidates: Vec<QuestionEntity> = {
            let tables = self.tables.read().await;
            tables
                .questions
                .iter()
                .filter(|question| filter.matches(question))
                .cloned()
                .collect()
        };
        candidates.shuffle(&mut rand::rng());
        candidates.truncate(count);
        Ok(candidates)
    }
}

impl BattleStore for InMemoryBattleStore {
    fn commit(&self, commit: RoomCommit) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.apply_commit(commit).await })
    }

    fn save_results(
        &self,
        results: Vec<BattleResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_results(results).await })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleRoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.tables.read().await.rooms.get(&id).cloned())
        })
    }

    fn list_participants(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.tables.read().await;
            Ok(tables
                .participants
                .values()
                .filter(|participant| participant.battle_room_id == room_id)
                .cloned()
                .collect())
        })
    }

    fn list_results(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleResultEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.tables.read().await;
            let mut results: Vec<BattleResultEntity> = tables
                .results
                .values()
                .filter(|result| result.battle_room_id == room_id)
                .cloned()
                .collect();
            results.sort_by_key(|result| result.rank);
            Ok(results)
        })
    }

    fn append_ledger_entry(
        &self,
        entry: AnswerLedgerEntryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.tables.write().await.ledger.push(entry);
            Ok(())
        })
    }

    fn list_ledger(&self) -> BoxFuture<'static, StorageResult<Vec<AnswerLedgerEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.tables.read().await.ledger.clone())
        })
    }

    fn find_profiles(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let tables = store.tables.read().await;
            Ok(ids
                .iter()
                .filter_map(|id| tables.profiles.get(id).cloned())
                .collect())
        })
    }

    fn sample_questions(
        &self,
        filter: QuestionFilter,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.draw_questions(filter, count).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::room::{BattleRoom, BattleType, Question, RoomStatus};

    fn room(code: &str) -> BattleRoom {
        BattleRoom::new(
            Uuid::new_v4(),
            code.into(),
            BattleType::OneVsOne,
            None,
            None,
            vec![Question {
                prompt: "Capital of France?".into(),
                options: vec!["Paris".into(), "Rome".into()],
                correct_option: 0,
                explanation: None,
            }],
            30,
            SystemTime::now(),
        )
    }

    #[tokio::test]
    async fn active_codes_are_unique() {
        let store = InMemoryBattleStore::new();
        let first = room("QWERTY");
        store
            .commit(RoomCommit::room_only(BattleRoomEntity::from_room(&first, 0)))
            .await
            .unwrap();

        let clash = room("QWERTY");
        let err = BattleStore::commit(
            &store,
            RoomCommit::room_only(BattleRoomEntity::from_room(&clash, 0)),
        )
        .await
        .unwrap_err();
        assert!(err.is_conflict());

        let mut finished = first.clone();
        finished.complete(SystemTime::now());
        store
            .commit(RoomCommit::room_only(BattleRoomEntity::from_room(
                &finished, 1,
            )))
            .await
            .unwrap();
        BattleStore::commit(
            &store,
            RoomCommit::room_only(BattleRoomEntity::from_room(&clash, 0)),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn commit_applies_participants_and_ledger_together() {
        let store = InMemoryBattleStore::new();
        let mut room = room("ZXCVBN");
        let user = Uuid::new_v4();
        room.join(user, "ada".into(), SystemTime::now()).unwrap();
        let participant = ParticipantEntity::from_participant(room.id, &room.participants[&user]);
        let entry = AnswerLedgerEntryEntity::practice(user, true, 4, SystemTime::now());

        BattleStore::commit(
            &store,
            RoomCommit {
                room: BattleRoomEntity::from_room(&room, 1),
                participants: vec![participant],
                removed_participants: Vec::new(),
                ledger: vec![entry.clone()],
            },
        )
        .await
        .unwrap();

        let rows = store.list_participants(room.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.list_ledger().await.unwrap(), vec![entry]);

        let loaded = store.find_room(room.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_players, 1);
        assert_eq!(loaded.status, RoomStatus::Waiting);
        let rebuilt = loaded.into_room(rows);
        assert_eq!(rebuilt, room);
    }

    #[tokio::test]
    async fn results_are_insert_if_absent() {
        let store = InMemoryBattleStore::new();
        let room_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let result = |score| BattleResultEntity {
            id: Uuid::new_v4(),
            battle_room_id: room_id,
            user_id,
            username: "ada".into(),
            final_score: score,
            rank: 1,
            total_correct: 1,
            total_questions: 1,
            accuracy_percentage: 100,
            time_bonus: 0,
            created_at: SystemTime::now(),
        };

        BattleStore::save_results(&store, vec![result(10)])
            .await
            .unwrap();
        BattleStore::save_results(&store, vec![result(99)])
            .await
            .unwrap();

        let stored = store.list_results(room_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].final_score, 10);
    }

    #[tokio::test]
    async fn offline_store_rejects_everything() {
        let store = InMemoryBattleStore::new();
        store.set_offline(true);
        assert!(store.health_check().await.is_err());
        assert!(store.list_ledger().await.is_err());
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn sampling_respects_filters() {
        let store = InMemoryBattleStore::new();
        let subject = Uuid::new_v4();
        let pool = (0..6).map(|i| QuestionEntity {
            id: Uuid::new_v4(),
            subject_id: if i % 2 == 0 { Some(subject) } else { None },
            chapter_id: None,
            prompt: format!("question {i}"),
            options: vec!["yes".into(), "no".into()],
            correct_option: 0,
            explanation: None,
        });
        store.seed_questions(pool).await;

        let picked = BattleStore::sample_questions(
            &store,
            QuestionFilter {
                subject_id: Some(subject),
                chapter_id: None,
            },
            10,
        )
        .await
        .unwrap();
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|q| q.subject_id == Some(subject)));
    }
}
