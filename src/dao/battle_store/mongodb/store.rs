use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        LEDGER_COLLECTION, MongoLedgerDocument, MongoParticipantDocument, MongoProfileDocument,
        MongoQuestionDocument, MongoResultDocument, MongoRoomDocument, PARTICIPANT_COLLECTION,
        PROFILE_COLLECTION, QUESTION_COLLECTION, RESULT_COLLECTION, ROOM_COLLECTION, doc_id,
        room_member,
    },
};
use crate::dao::{
    battle_store::BattleStore,
    models::{
        AnswerLedgerEntryEntity, BattleResultEntity, BattleRoomEntity, ParticipantEntity,
        ProfileEntity, QuestionEntity, QuestionFilter, RoomCommit,
    },
    storage::StorageResult,
};

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed [`BattleStore`]. Room commits run inside a multi-document
/// transaction, which requires a replica set or sharded cluster.
#[derive(Clone)]
pub struct MongoBattleStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl MongoBattleStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let indexes: [(&'static str, &'static str, Document, IndexOptions); 5] = [
            (
                ROOM_COLLECTION,
                "active_code",
                doc! {"active_code": 1},
                IndexOptions::builder()
                    .name(Some("active_room_code_idx".to_owned()))
                    .unique(Some(true))
                    .partial_filter_expression(Some(doc! {"active_code": {"$exists": true}}))
                    .build(),
            ),
            (
                PARTICIPANT_COLLECTION,
                "battle_room_id,user_id",
                doc! {"battle_room_id": 1, "user_id": 1},
                IndexOptions::builder()
                    .name(Some("participant_room_user_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            ),
            (
                RESULT_COLLECTION,
                "battle_room_id,user_id",
                doc! {"battle_room_id": 1, "user_id": 1},
                IndexOptions::builder()
                    .name(Some("result_room_user_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            ),
            (
                LEDGER_COLLECTION,
                "created_at",
                doc! {"created_at": 1},
                IndexOptions::builder()
                    .name(Some("ledger_created_at_idx".to_owned()))
                    .build(),
            ),
            (
                QUESTION_COLLECTION,
                "subject_id,chapter_id",
                doc! {"subject_id": 1, "chapter_id": 1},
                IndexOptions::builder()
                    .name(Some("question_scope_idx".to_owned()))
                    .build(),
            ),
        ];

        for (collection, index, keys, options) in indexes {
            let model = IndexModel::builder().keys(keys).options(options).build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn client(&self) -> Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn commit(&self, commit: RoomCommit) -> MongoResult<()> {
        let client = self.client().await;
        let database = self.database().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction { source })?;

        match write_commit(&database, &mut session, commit).await {
            Ok(()) => session
                .commit_transaction()
                .await
                .map_err(|source| MongoDaoError::Transaction { source }),
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!(error = %abort_err, "failed to abort room commit transaction");
                }
                Err(err)
            }
        }
    }

    async fn save_results(&self, results: Vec<BattleResultEntity>) -> MongoResult<()> {
        let collection = self
            .collection::<MongoResultDocument>(RESULT_COLLECTION)
            .await;
        for result in results {
            let room_id = result.battle_room_id;
            let document: MongoResultDocument = result.into();
            match collection.insert_one(&document).await {
                Ok(_) => {}
                Err(source) if is_duplicate_key(&source) => {}
                Err(source) => return Err(MongoDaoError::SaveResults { room_id, source }),
            }
        }
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<BattleRoomEntity>> {
        let collection = self.collection::<MongoRoomDocument>(ROOM_COLLECTION).await;
        collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_participants(&self, room_id: Uuid) -> MongoResult<Vec<ParticipantEntity>> {
        let collection = self
            .collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION)
            .await;
        let documents: Vec<MongoParticipantDocument> = collection
            .find(doc! {"battle_room_id": room_id.to_string()})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListParticipants { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListParticipants { room_id, source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_results(&self, room_id: Uuid) -> MongoResult<Vec<BattleResultEntity>> {
        let collection = self
            .collection::<MongoResultDocument>(RESULT_COLLECTION)
            .await;
        let documents: Vec<MongoResultDocument> = collection
            .find(doc! {"battle_room_id": room_id.to_string()})
            .sort(doc! {"rank": 1})
            .await
            .map_err(|source| MongoDaoError::ListResults { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListResults { room_id, source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn append_ledger_entry(&self, entry: AnswerLedgerEntryEntity) -> MongoResult<()> {
        let collection = self
            .collection::<MongoLedgerDocument>(LEDGER_COLLECTION)
            .await;
        let document: MongoLedgerDocument = entry.into();
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendLedger { source })?;
        Ok(())
    }

    async fn list_ledger(&self) -> MongoResult<Vec<AnswerLedgerEntryEntity>> {
        let collection = self
            .collection::<MongoLedgerDocument>(LEDGER_COLLECTION)
            .await;
        let documents: Vec<MongoLedgerDocument> = collection
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListLedger { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListLedger { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_profiles(&self, ids: Vec<Uuid>) -> MongoResult<Vec<ProfileEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let collection = self
            .collection::<MongoProfileDocument>(PROFILE_COLLECTION)
            .await;
        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let documents: Vec<MongoProfileDocument> = collection
            .find(doc! {"_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::LoadProfiles { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadProfiles { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn sample_questions(
        &self,
        filter: QuestionFilter,
        count: usize,
    ) -> MongoResult<Vec<QuestionEntity>> {
        let collection = self.collection::<Document>(QUESTION_COLLECTION).await;
        let mut matcher = Document::new();
        if let Some(subject_id) = filter.subject_id {
            matcher.insert("subject_id", subject_id.to_string());
        }
        if let Some(chapter_id) = filter.chapter_id {
            matcher.insert("chapter_id", chapter_id.to_string());
        }
        let pipeline = vec![
            doc! {"$match": matcher},
            doc! {"$sample": {"size": count as i64}},
        ];

        let documents: Vec<MongoQuestionDocument> = collection
            .aggregate(pipeline)
            .with_type::<MongoQuestionDocument>()
            .await
            .map_err(|source| MongoDaoError::SampleQuestions { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::SampleQuestions { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }
}

/// Apply every write of a room commit inside `session`.
async fn write_commit(
    database: &Database,
    session: &mut ClientSession,
    commit: RoomCommit,
) -> MongoResult<()> {
    let room_id = commit.room.id;
    let code = commit.room.room_code.clone();

    let rooms = database.collection::<MongoRoomDocument>(ROOM_COLLECTION);
    let room: MongoRoomDocument = commit.room.into();
    rooms
        .replace_one(doc_id(room_id), &room)
        .upsert(true)
        .session(&mut *session)
        .await
        .map_err(|source| {
            if is_duplicate_key(&source) {
                MongoDaoError::DuplicateCode { code }
            } else {
                MongoDaoError::SaveRoom {
                    id: room_id,
                    source,
                }
            }
        })?;

    let participants = database.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION);
    for user_id in commit.removed_participants {
        participants
            .delete_one(room_member(room_id, user_id))
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::SaveParticipants { room_id, source })?;
    }
    for participant in commit.participants {
        let filter = room_member(room_id, participant.user_id);
        let document: MongoParticipantDocument = participant.into();
        participants
            .replace_one(filter, &document)
            .upsert(true)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::SaveParticipants { room_id, source })?;
    }

    if !commit.ledger.is_empty() {
        let ledger = database.collection::<MongoLedgerDocument>(LEDGER_COLLECTION);
        let documents: Vec<MongoLedgerDocument> =
            commit.ledger.into_iter().map(Into::into).collect();
        ledger
            .insert_many(&documents)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::AppendLedger { source })?;
    }

    Ok(())
}

impl BattleStore for MongoBattleStore {
    fn commit(&self, commit: RoomCommit) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit(commit).await.map_err(Into::into) })
    }

    fn save_results(
        &self,
        results: Vec<BattleResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_results(results).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleRoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn list_participants(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participants(room_id).await.map_err(Into::into) })
    }

    fn list_results(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_results(room_id).await.map_err(Into::into) })
    }

    fn append_ledger_entry(
        &self,
        entry: AnswerLedgerEntryEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_ledger_entry(entry).await.map_err(Into::into) })
    }

    fn list_ledger(&self) -> BoxFuture<'static, StorageResult<Vec<AnswerLedgerEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_ledger().await.map_err(Into::into) })
    }

    fn find_profiles(
        &self,
        ids: Vec<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profiles(ids).await.map_err(Into::into) })
    }

    fn sample_questions(
        &self,
        filter: QuestionFilter,
        count: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .sample_questions(filter, count)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
