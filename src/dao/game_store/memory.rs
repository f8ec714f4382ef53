use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, RatingUpdateEntity},
    storage::{StorageError, StorageResult},
};

/// Process-local game store used for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryGameStore {
    games: Arc<DashMap<String, GameEntity>>,
}

impl InMemoryGameStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous snapshot of a stored game, handy for assertions.
    pub fn snapshot(&self, room_id: &str) -> Option<GameEntity> {
        self.games.get(room_id).map(|entry| entry.value().clone())
    }
}

impl GameStore for InMemoryGameStore {
    fn find_game(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let found = self.snapshot(room_id);
        Box::pin(async move { Ok(found) })
    }

    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.games.insert(game.id.clone(), game);
        Box::pin(async { Ok(()) })
    }

    fn apply_rating_batch(
        &self,
        room_id: &str,
        updates: Vec<RatingUpdateEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = if updates.iter().any(|update| !update.is_valid()) {
            Err(StorageError::invalid_rating_target())
        } else {
            match self.games.get_mut(room_id) {
                Some(mut game) => {
                    game.apply_ratings(&updates);
                    Ok(())
                }
                None => Err(StorageError::NotFound(format!("game `{room_id}`"))),
            }
        };
        Box::pin(async move { result })
    }

    fn game_exists(&self, room_id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let exists = self.games.contains_key(room_id);
        Box::pin(async move { Ok(exists) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::RatingEntity,
        state::game::{Candidate, GameRecord, Question, Rating},
    };

    fn game() -> GameEntity {
        GameRecord::new(
            "ab12",
            "test",
            vec![Question {
                id: 1,
                value: "Who?".into(),
            }],
            vec![Candidate {
                id: 1,
                first_name: "Ada".into(),
                last_name: String::new(),
                picture: None,
                games_played: 0,
            }],
            Rating::default(),
        )
        .into()
    }

    fn update(question_id: u32, candidate_id: u32) -> RatingUpdateEntity {
        RatingUpdateEntity {
            question_id,
            candidate_id,
            rating: RatingEntity {
                mu: 30.0,
                sigma: 7.0,
            },
        }
    }

    #[tokio::test]
    async fn rating_batches_update_stored_games() {
        let store = InMemoryGameStore::new();
        store.create_game(game()).await.unwrap();
        assert!(store.game_exists("ab12").await.unwrap());

        store
            .apply_rating_batch("ab12", vec![update(1, 1)])
            .await
            .unwrap();
        let stored = store.find_game("ab12").await.unwrap().unwrap();
        assert_eq!(stored.leaderboard[&1][&1].mu, 30.0);
    }

    #[tokio::test]
    async fn rating_batches_for_unknown_or_invalid_targets_fail() {
        let store = InMemoryGameStore::new();
        store.create_game(game()).await.unwrap();

        assert!(matches!(
            store.apply_rating_batch("zz99", vec![update(1, 1)]).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.apply_rating_batch("ab12", vec![update(0, 1)]).await,
            Err(StorageError::Rejected(_))
        ));
        assert_eq!(store.snapshot("ab12").unwrap().leaderboard[&1][&1].mu, 25.0);
    }
}
