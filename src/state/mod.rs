/// Bounded room cache.
pub mod cache;
/// Fleet router state.
pub mod fleet;
/// Runtime game model.
pub mod game;
/// Game store slot and degraded mode.
pub mod storage;

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::pictures::PictureSigner,
    services::{
        persistence::PersistenceQueue,
        rating_engine::{BradleyTerryEngine, RatingEngine},
    },
};

use self::{cache::RoomCache, storage::StorageSlot};

/// Shared handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central state of a game server: room cache, collaborators and live sessions.
pub struct AppState {
    storage: Arc<StorageSlot>,
    cache: RoomCache,
    signer: Arc<dyn PictureSigner>,
    engine: Arc<dyn RatingEngine>,
    persistence: PersistenceQueue,
    config: Arc<AppConfig>,
    sessions: DashMap<Uuid, String>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        storage: Arc<StorageSlot>,
        signer: Arc<dyn PictureSigner>,
    ) -> SharedState {
        let engine = Arc::new(BradleyTerryEngine::new(config.rating));
        Self::with_engine(config, storage, signer, engine)
    }

    /// Same as [`AppState::new`] with a custom rating engine.
    pub fn with_engine(
        config: AppConfig,
        storage: Arc<StorageSlot>,
        signer: Arc<dyn PictureSigner>,
        engine: Arc<dyn RatingEngine>,
    ) -> SharedState {
        Arc::new(Self {
            cache: RoomCache::new(config.cache_capacity, config.eviction_sample_size),
            persistence: PersistenceQueue::new(storage.clone(), config.persistence_concurrency),
            storage,
            signer,
            engine,
            config: Arc::new(config),
            sessions: DashMap::new(),
        })
    }

    /// Slot holding the game store.
    pub fn storage(&self) -> &Arc<StorageSlot> {
        &self.storage
    }

    /// Rooms held in memory.
    pub fn cache(&self) -> &RoomCache {
        &self.cache
    }

    /// Signer for picture URLs.
    pub fn signer(&self) -> &dyn PictureSigner {
        self.signer.as_ref()
    }

    /// Rating model applied to votes.
    pub fn engine(&self) -> &dyn RatingEngine {
        self.engine.as_ref()
    }

    /// Background writer of rating batches.
    pub fn persistence(&self) -> &PersistenceQueue {
        &self.persistence
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Track a new live session for `room_id`.
    pub fn register_session(&self, room_id: &str) -> Uuid {
        let session_id = Uuid::new_v4();
        self.sessions.insert(session_id, room_id.to_owned());
        session_id
    }

    /// Forget a session registered by [`AppState::register_session`].
    pub fn unregister_session(&self, session_id: &Uuid) {
        self.sessions.remove(session_id);
    }

    /// Number of sessions currently connected to this server.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }
}
