use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB transaction failed")]
    Transaction {
        #[source]
        source: MongoError,
    },
    #[error("room code `{code}` is already held by an active room")]
    DuplicateCode { code: String },
    #[error("failed to save room `{id}`")]
    SaveRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save participants of room `{room_id}`")]
    SaveParticipants {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save results of room `{room_id}`")]
    SaveResults {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to append to the answer ledger")]
    AppendLedger {
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{id}`")]
    LoadRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list participants of room `{room_id}`")]
    ListParticipants {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list results of room `{room_id}`")]
    ListResults {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to read the answer ledger")]
    ListLedger {
        #[source]
        source: MongoError,
    },
    #[error("failed to load profiles")]
    LoadProfiles {
        #[source]
        source: MongoError,
    },
    #[error("failed to sample questions")]
    SampleQuestions {
        #[source]
        source: MongoError,
    },
    #[error("stored identifier `{value}` in `{collection}` is not a UUID")]
    Decode {
        collection: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
}
