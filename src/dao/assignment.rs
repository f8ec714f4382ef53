//! Room-to-server mapping consulted by the reverse proxy.
//!
//! Every created room gets a `room:<id>` key holding the name of the game
//! server that owns it. Entries never expire.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::future::BoxFuture;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::dao::storage::{StorageError, StorageResult};

/// Key prefix shared with the proxy configuration.
pub const ROOM_KEY_PREFIX: &str = "room:";

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Key under which the owner of `room_id` is stored.
pub fn room_key(room_id: &str) -> String {
    format!("{ROOM_KEY_PREFIX}{room_id}")
}

/// Write access to the room routing table.
pub trait RoomAssignmentStore: Send + Sync {
    /// Record that `room_id` is served by `server_name`.
    fn set_room_server(
        &self,
        room_id: &str,
        server_name: &str,
    ) -> BoxFuture<'static, StorageResult<()>>;
}

/// Failures talking to Redis.
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// A required variable is unset.
    #[error("missing Redis environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Client construction or handshake failed.
    #[error("failed to connect to Redis")]
    Connect {
        #[source]
        source: redis::RedisError,
    },
    /// Redis rejected the `SET`.
    #[error("failed to write `{key}`")]
    Write {
        key: String,
        #[source]
        source: redis::RedisError,
    },
    /// The `SET` did not complete in time.
    #[error("writing `{key}` timed out after {elapsed:?}")]
    Timeout { key: String, elapsed: Duration },
}

impl From<AssignmentError> for StorageError {
    fn from(err: AssignmentError) -> Self {
        StorageError::unavailable("redis", err)
    }
}

/// Redis-backed routing table.
#[derive(Clone)]
pub struct RedisAssignmentStore {
    connection: MultiplexedConnection,
    write_timeout: Duration,
}

impl RedisAssignmentStore {
    /// Open a multiplexed connection to `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, AssignmentError> {
        let client = redis::Client::open(redis_url)
            .map_err(|source| AssignmentError::Connect { source })?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|source| AssignmentError::Connect { source })?;
        Ok(Self {
            connection,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// Connect using `REDIS_CONN_STRING`.
    pub async fn from_env() -> Result<Self, AssignmentError> {
        let url = std::env::var("REDIS_CONN_STRING").map_err(|_| {
            AssignmentError::MissingEnvVar {
                var: "REDIS_CONN_STRING",
            }
        })?;
        Self::connect(&url).await
    }

    /// Bound every write by `write_timeout`.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }
}

impl RoomAssignmentStore for RedisAssignmentStore {
    fn set_room_server(
        &self,
        room_id: &str,
        server_name: &str,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let mut connection = self.connection.clone();
        let write_timeout = self.write_timeout;
        let key = room_key(room_id);
        let server_name = server_name.to_owned();
        Box::pin(async move {
            let write = connection.set::<_, _, ()>(&key, &server_name);
            let outcome = timeout(write_timeout, write).await;
            match outcome {
                Ok(Ok(())) => {
                    debug!(key = %key, server = %server_name, "room assignment stored");
                    Ok(())
                }
                Ok(Err(source)) => Err(AssignmentError::Write { key, source }.into()),
                Err(_) => Err(AssignmentError::Timeout {
                    key,
                    elapsed: write_timeout,
                }
                .into()),
            }
        })
    }
}

/// Process-local routing table for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryAssignmentStore {
    entries: Arc<DashMap<String, String>>,
}

impl InMemoryAssignmentStore {
    /// Empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Number of mapped rooms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RoomAssignmentStore for InMemoryAssignmentStore {
    fn set_room_server(
        &self,
        room_id: &str,
        server_name: &str,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.entries
            .insert(room_key(room_id), server_name.to_owned());
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_with_room() {
        assert_eq!(room_key("ab12"), "room:ab12");
    }

    #[tokio::test]
    async fn memory_store_overwrites_previous_owner() {
        let store = InMemoryAssignmentStore::new();
        store.set_room_server("ab12", "server1").await.unwrap();
        store.set_room_server("ab12", "server2").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("room:ab12").as_deref(), Some("server2"));
    }
}
