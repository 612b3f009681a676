pub mod room;
pub mod state_machine;

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    battle::{coordinator::RoomHandle, leaderboard::LeaderboardBoard, room_code},
    config::AppConfig,
    dao::battle_store::BattleStore,
    error::ServiceError,
    services::question_generator::QuestionGenerator,
};

pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId};

pub type SharedState = Arc<AppState>;

/// Central application state: live rooms, storage handle and cached read models.
pub struct AppState {
    battle_store: RwLock<Option<Arc<dyn BattleStore>>>,
    degraded: watch::Sender<bool>,
    rooms: DashMap<Uuid, RoomHandle>,
    room_codes: DashMap<String, Uuid>,
    leaderboard: RwLock<Option<Arc<LeaderboardBoard>>>,
    question_generator: Option<Arc<dyn QuestionGenerator>>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        question_generator: Option<Arc<dyn QuestionGenerator>>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            battle_store: RwLock::new(None),
            degraded: degraded_tx,
            rooms: DashMap::new(),
            room_codes: DashMap::new(),
            leaderboard: RwLock::new(None),
            question_generator,
            config: Arc::new(config),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current battle store, if one is installed.
    pub async fn battle_store(&self) -> Option<Arc<dyn BattleStore>> {
        let guard = self.battle_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current battle store, or [`ServiceError::Degraded`] while storage is unavailable.
    pub async fn require_battle_store(&self) -> Result<Arc<dyn BattleStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.battle_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new battle store implementation and leave degraded mode.
    pub async fn set_battle_store(&self, store: Arc<dyn BattleStore>) {
        {
            let mut guard = self.battle_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current battle store and enter degraded mode.
    pub async fn clear_battle_store(&self) {
        {
            let mut guard = self.battle_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if self.is_degraded() == value {
            return;
        }

        self.degraded.send_replace(value);
    }

    /// Configured question generator, if any.
    pub fn question_generator(&self) -> Option<Arc<dyn QuestionGenerator>> {
        self.question_generator.clone()
    }

    /// Track a live room so it can be reached by id and code.
    pub fn register_room(&self, handle: RoomHandle) {
        self.room_codes
            .insert(handle.room_code().to_owned(), handle.id());
        self.rooms.insert(handle.id(), handle);
    }

    /// Live room by id.
    pub fn room(&self, id: Uuid) -> Option<RoomHandle> {
        self.rooms.get(&id).map(|entry| entry.value().clone())
    }

    /// Live room by join code.
    pub fn room_by_code(&self, code: &str) -> Option<RoomHandle> {
        let id = *self.room_codes.get(code)?.value();
        self.room(id)
    }

    /// Number of live rooms.
    pub fn live_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Forget a room and release its join code.
    pub fn unregister_room(&self, id: Uuid, code: &str) {
        self.rooms.remove(&id);
        self.release_room_code(code, id);
    }

    /// Reserve a join code that no live room holds.
    pub fn reserve_room_code(&self, room_id: Uuid) -> Result<String, ServiceError> {
        let settings = &self.config.battle;
        let mut rng = rand::rng();
        for _ in 0..settings.max_code_attempts {
            let code = room_code::generate_room_code(&mut rng, settings.room_code_length);
            if let Entry::Vacant(slot) = self.room_codes.entry(code.clone()) {
                slot.insert(room_id);
                return Ok(code);
            }
        }

        Err(ServiceError::CodeSpaceExhausted {
            attempts: settings.max_code_attempts,
        })
    }

    /// Release a code, but only while it still points at `room_id`.
    pub fn release_room_code(&self, code: &str, room_id: Uuid) {
        self.room_codes.remove_if(code, |_, holder| *holder == room_id);
    }

    /// Most recently computed leaderboard.
    pub async fn cached_leaderboard(&self) -> Option<Arc<LeaderboardBoard>> {
        self.leaderboard.read().await.clone()
    }

    /// Replace the cached leaderboard.
    pub async fn store_leaderboard(&self, board: Arc<LeaderboardBoard>) {
        *self.leaderboard.write().await = Some(board);
    }
}
