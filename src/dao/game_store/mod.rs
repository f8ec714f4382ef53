/// CouchDB adapter.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Process-local adapter.
pub mod memory;
/// MongoDB adapter.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{env, sync::Arc};

use futures::future::BoxFuture;

use crate::dao::models::{GameEntity, RatingUpdateEntity};
use crate::dao::storage::{StorageError, StorageResult};

/// Abstraction over the durable store holding the authoritative game records.
pub trait GameStore: Send + Sync {
    /// Load the record of `room_id`, `None` when no such game exists.
    fn find_game(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Create (or replace) a game record.
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Overwrite the given leaderboard entries of an existing game.
    fn apply_rating_batch(
        &self,
        room_id: &str,
        updates: Vec<RatingUpdateEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether a game is stored under `room_id`.
    fn game_exists(&self, room_id: &str) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Storage backend selected through the `GAME_STORE` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store, lost on restart.
    Memory,
    /// CouchDB over HTTP, configured through `COUCH_*`.
    #[cfg(feature = "couch-store")]
    Couch,
    /// MongoDB, configured through `MONGO_URI` and `MONGO_DB`.
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl StoreBackend {
    /// Parse a backend name, `None` when unknown or compiled out.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Some(Self::Couch),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Some(Self::Mongo),
            _ => None,
        }
    }

    /// Resolve the backend from the environment, preferring the richest compiled-in store.
    pub fn from_env() -> Self {
        env::var("GAME_STORE")
            .ok()
            .and_then(|value| Self::parse(&value))
            .unwrap_or_else(Self::compiled_default)
    }

    fn compiled_default() -> Self {
        #[cfg(feature = "mongo-store")]
        {
            Self::Mongo
        }
        #[cfg(all(not(feature = "mongo-store"), feature = "couch-store"))]
        {
            Self::Couch
        }
        #[cfg(all(not(feature = "mongo-store"), not(feature = "couch-store")))]
        {
            Self::Memory
        }
    }
}

/// Build a factory connecting to the configured backend, suitable for the storage supervisor.
///
/// The in-memory store is created once so reconnect attempts keep the same data.
pub fn connector(
    backend: StoreBackend,
) -> impl FnMut() -> BoxFuture<'static, Result<Arc<dyn GameStore>, StorageError>> + Send + 'static {
    let memory: Arc<dyn GameStore> = Arc::new(memory::InMemoryGameStore::new());
    move || -> BoxFuture<'static, Result<Arc<dyn GameStore>, StorageError>> {
        let memory = memory.clone();
        Box::pin(async move {
            match backend {
                StoreBackend::Memory => Ok(memory),
                #[cfg(feature = "couch-store")]
                StoreBackend::Couch => {
                    let config = couchdb::CouchConfig::from_env()?;
                    let store = couchdb::CouchGameStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn GameStore>)
                }
                #[cfg(feature = "mongo-store")]
                StoreBackend::Mongo => {
                    let config = mongodb::MongoConfig::from_env().await?;
                    let store = mongodb::MongoGameStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn GameStore>)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_backends() {
        assert_eq!(StoreBackend::parse("memory"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse(" MEMORY "), Some(StoreBackend::Memory));
        #[cfg(feature = "couch-store")]
        assert_eq!(StoreBackend::parse("couchdb"), Some(StoreBackend::Couch));
        #[cfg(feature = "mongo-store")]
        assert_eq!(StoreBackend::parse("mongo"), Some(StoreBackend::Mongo));
        assert_eq!(StoreBackend::parse("postgres"), None);
    }
}
