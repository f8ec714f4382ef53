use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, info};

use crate::dao::{
    game_store::GameStore,
    models::{GameEntity, RatingUpdateEntity},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchGameDocument, game_doc_id},
};

const MAX_CONFLICT_RETRIES: u32 = 3;

/// Game store keeping one CouchDB document per room.
#[derive(Clone)]
pub struct CouchGameStore {
    inner: Arc<CouchInner>,
}

struct CouchInner {
    client: Client,
    config: CouchConfig,
}

impl CouchGameStore {
    /// Connect and create the database when it does not exist yet.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder().build().map_err(CouchDaoError::Client)?;
        let store = Self {
            inner: Arc::new(CouchInner { client, config }),
        };
        store.ensure_database().await?;
        info!(database = %store.inner.config.database, "connected to CouchDB");
        Ok(store)
    }

    /// `path` is relative to the database; empty addresses the database itself.
    fn url(&self, path: &str) -> String {
        let config = &self.inner.config;
        if path.is_empty() {
            format!("{}/{}", config.base_url, config.database)
        } else {
            format!("{}/{}/{}", config.base_url, config.database, path)
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&CouchGameDocument>,
    ) -> CouchResult<Response> {
        let mut request = self.inner.client.request(method.clone(), self.url(path));
        if let Some(credentials) = &self.inner.config.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|source| CouchDaoError::Transport {
                method,
                path: path.to_owned(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        match self.send(Method::GET, "", None).await?.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let created = self.send(Method::PUT, "", None).await?.status();
                // 412: created concurrently by another process.
                if created.is_success() || created == StatusCode::PRECONDITION_FAILED {
                    Ok(())
                } else {
                    Err(unexpected(Method::PUT, "", created))
                }
            }
            other => Err(unexpected(Method::GET, "", other)),
        }
    }

    async fn fetch(&self, doc_id: &str) -> CouchResult<Option<CouchGameDocument>> {
        let response = self.send(Method::GET, doc_id, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response
                    .json()
                    .await
                    .map(Some)
                    .map_err(|source| CouchDaoError::Decode {
                        path: doc_id.to_owned(),
                        source,
                    })
            }
            other => Err(unexpected(Method::GET, doc_id, other)),
        }
    }

    /// `false` when the revision was stale.
    async fn put(&self, doc: &CouchGameDocument) -> CouchResult<bool> {
        match self.send(Method::PUT, &doc.id, Some(doc)).await?.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(unexpected(Method::PUT, &doc.id, other)),
        }
    }

    async fn exists(&self, doc_id: &str) -> CouchResult<bool> {
        match self.send(Method::HEAD, doc_id, None).await?.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(unexpected(Method::HEAD, doc_id, other)),
        }
    }

    /// Read-modify-write of one game document, retried on revision conflicts.
    async fn update<F>(&self, room_id: &str, mut change: F) -> StorageResult<()>
    where
        F: FnMut(Option<GameEntity>) -> StorageResult<GameEntity> + Send,
    {
        let doc_id = game_doc_id(room_id);
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let current = self.fetch(&doc_id).await?;
            let rev = current.as_ref().and_then(|doc| doc.rev.clone());
            let game = change(current.map(CouchGameDocument::into_entity))?;
            if self.put(&CouchGameDocument::from_entity(game, rev)).await? {
                return Ok(());
            }
            debug!(doc_id = %doc_id, attempt, "revision conflict; retrying");
        }
        Err(CouchDaoError::Conflict {
            path: doc_id,
            attempts: MAX_CONFLICT_RETRIES,
        }
        .into())
    }
}

fn unexpected(method: Method, path: &str, status: StatusCode) -> CouchDaoError {
    CouchDaoError::Status {
        method,
        path: path.to_owned(),
        status,
    }
}

impl GameStore for CouchGameStore {
    fn find_game(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        let doc_id = game_doc_id(room_id);
        Box::pin(async move {
            let doc = store.fetch(&doc_id).await?;
            Ok(doc.map(CouchGameDocument::into_entity))
        })
    }

    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let room_id = game.id.clone();
            store.update(&room_id, |_| Ok(game.clone())).await
        })
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
            store
                .update(&room_id, |current| match current {
                    Some(mut game) => {
                        game.apply_ratings(&updates);
                        Ok(game)
                    }
                    None => Err(StorageError::NotFound(format!("game `{room_id}`"))),
                })
                .await
        })
    }

    fn game_exists(&self, room_id: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let doc_id = game_doc_id(room_id);
        Box::pin(async move { Ok(store.exists(&doc_id).await?) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let status = store.send(Method::GET, "", None).await?.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(unexpected(Method::GET, "", status).into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.ensure_database().await?) })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
    };
    use dashmap::DashMap;
    use serde_json::Value;
    use tokio::net::TcpListener;

    use super::*;
    use crate::{
        dao::models::RatingEntity,
        state::game::{Candidate, GameRecord, Question, Rating},
    };

    type Docs = Arc<DashMap<String, Value>>;

    async fn get_doc(State(docs): State<Docs>, Path((_, id)): Path<(String, String)>) -> Response {
        match docs.get(&id) {
            Some(doc) => Json(doc.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Revision check of a real CouchDB: the body must carry the current `_rev`.
    async fn put_doc(
        State(docs): State<Docs>,
        Path((_, id)): Path<(String, String)>,
        Json(mut body): Json<Value>,
    ) -> StatusCode {
        let current = docs.get(&id).map(|doc| doc["_rev"].clone());
        if current.is_some() && current.as_ref() != body.get("_rev") {
            return StatusCode::CONFLICT;
        }
        let generation = current
            .and_then(|rev| rev.as_str()?.split('-').next()?.parse::<u32>().ok())
            .unwrap_or(0);
        body["_rev"] = Value::String(format!("{}-x", generation + 1));
        docs.insert(id, body);
        StatusCode::CREATED
    }

    async fn fake_couch() -> CouchConfig {
        let docs: Docs = Arc::default();
        let app = Router::new()
            .route("/{db}", get(|| async { StatusCode::OK }))
            .route("/{db}/{id}", get(get_doc).put(put_doc))
            .with_state(docs);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        CouchConfig {
            base_url: format!("http://{address}"),
            database: "rankrat".into(),
            credentials: None,
        }
    }

    fn game() -> GameEntity {
        GameRecord::new(
            "ab12",
            "test",
            vec![Question {
                id: 1,
                value: "Who?".into(),
            }],
            (1..=2)
                .map(|id| Candidate {
                    id,
                    first_name: format!("c{id}"),
                    last_name: String::new(),
                    picture: None,
                    games_played: 0,
                })
                .collect(),
            Rating::default(),
        )
        .into()
    }

    #[tokio::test]
    async fn stores_and_updates_game_documents() {
        let store = CouchGameStore::connect(fake_couch().await).await.unwrap();
        store.health_check().await.unwrap();
        assert!(!store.game_exists("ab12").await.unwrap());

        store.create_game(game()).await.unwrap();
        // Second write must pick up the current revision.
        store.create_game(game()).await.unwrap();
        assert!(store.game_exists("ab12").await.unwrap());

        let update = RatingUpdateEntity {
            question_id: 1,
            candidate_id: 2,
            rating: RatingEntity {
                mu: 27.5,
                sigma: 8.0,
            },
        };
        store.apply_rating_batch("ab12", vec![update]).await.unwrap();

        let stored = store.find_game("ab12").await.unwrap().unwrap();
        assert_eq!(stored.leaderboard[&1][&2].mu, 27.5);
        assert_eq!(stored.leaderboard[&1][&1], game().leaderboard[&1][&1]);

        assert!(matches!(
            store.apply_rating_batch("zz99", vec![update]).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
