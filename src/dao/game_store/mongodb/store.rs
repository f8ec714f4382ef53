use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::{Document, doc},
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, doc_id, rating_update},
};
use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, RatingUpdateEntity},
    storage::{StorageError, StorageResult},
};

const GAME_COLLECTION_NAME: &str = "games";

/// Game store backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
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
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });
        Ok(Self { inner })
    }

    async fn collection<T: Send + Sync>(&self) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(GAME_COLLECTION_NAME)
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let room_id = game.id.clone();
        let document: MongoGameDocument = game.into();
        self.collection::<MongoGameDocument>()
            .await
            .replace_one(doc_id(&room_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame { room_id, source })?;
        Ok(())
    }

    async fn find_game(&self, room_id: &str) -> MongoResult<Option<GameEntity>> {
        let document = self
            .collection::<MongoGameDocument>()
            .await
            .find_one(doc_id(room_id))
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                room_id: room_id.to_owned(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn game_exists(&self, room_id: &str) -> MongoResult<bool> {
        let found = self
            .collection::<Document>()
            .await
            .find_one(doc_id(room_id))
            .projection(doc! { "_id": 1 })
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                room_id: room_id.to_owned(),
                source,
            })?;
        Ok(found.is_some())
    }

    async fn apply_ratings(
        &self,
        room_id: &str,
        updates: &[RatingUpdateEntity],
    ) -> StorageResult<()> {
        let result = self
            .collection::<MongoGameDocument>()
            .await
            .update_one(doc_id(room_id), rating_update(updates))
            .await
            .map_err(|source| MongoDaoError::UpdateRatings {
                room_id: room_id.to_owned(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(StorageError::NotFound(format!("game `{room_id}`")));
        }
        Ok(())
    }
}

impl GameStore for MongoGameStore {
    fn find_game(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move { store.find_game(&room_id).await.map_err(Into::into) })
    }

    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn apply_rating_batch(
        &self,
        room_id: &str,
        updates: Vec<RatingUpdateEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move {
            if updates.iter().any(|update| !update.is_valid()) {
                return Err(StorageError::invalid_rating_target());
            }
            if updates.is_empty() {
                return Ok(());
            }
            store.apply_ratings(&room_id, &updates).await
        })
    }

    fn game_exists(&self, room_id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let room_id = room_id.to_owned();
        Box::pin(async move { store.game_exists(&room_id).await.map_err(Into::into) })
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
