pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    AnswerLedgerEntryEntity, BattleResultEntity, BattleRoomEntity, ParticipantEntity,
    ProfileEntity, QuestionEntity, QuestionFilter, RoomCommit,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for rooms, results, the answer ledger and the question pool.
pub trait BattleStore: Send + Sync {
    /// Persist a room mutation as one unit. Rejects an active room code held by another active room.
    fn commit(&self, commit: RoomCommit) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert results that are not stored yet; rows already present for `(room, user)` are kept.
    fn save_results(
        &self,
        results: Vec<BattleResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleRoomEntity>>>;
    fn list_participants(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    fn list_results(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleResultEntity>>>;
    fn append_ledger_entry(
        &self,
        entry: AnswerLedgerEntryEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Full ledger in append order.
    fn list_ledger(&self) -> BoxFuture<'static, StorageResult<Vec<AnswerLedgerEntryEntity>>>;
    fn find_profiles(&self, ids: Vec<Uuid>)
    -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>>;
    /// Draw up to `count` random pool questions matching `filter`.
    fn sample_questions(
        &self,
        filter: QuestionFilter,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
