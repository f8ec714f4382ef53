use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::storage::StorageSlot,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep `storage` connected, holding it in degraded mode while the backend is unreachable.
///
/// Runs forever; spawn it once per process.
pub async fn run<F, Fut>(storage: Arc<StorageSlot>, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                storage.set_game_store(store.clone()).await;
                info!("storage connection established");
                delay = INITIAL_DELAY;

                watch_store(&storage, store.as_ref()).await;

                warn!("storage lost; dropping the store and reconnecting from scratch");
                storage.clear_game_store().await;
            }
            Err(err) => {
                warn!(error = %err, retry_in = ?delay, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll `store` until it fails and cannot be reconnected in place.
async fn watch_store(storage: &StorageSlot, store: &dyn GameStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if storage.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    storage.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed; entering degraded mode");
                storage.update_degraded(true).await;
                if !reconnect_in_place(store).await {
                    return;
                }
                storage.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect_in_place(store: &dyn GameStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnected");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }
    false
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::InMemoryGameStore;

    #[test]
    fn backoff_is_capped() {
        let mut delay = INITIAL_DELAY;
        for _ in 0..10 {
            delay = next_delay(delay);
        }
        assert_eq!(delay, MAX_DELAY);
    }

    #[tokio::test]
    async fn successful_connect_installs_the_store() {
        let storage = Arc::new(StorageSlot::new());
        let mut watcher = storage.degraded_watcher();

        let supervisor = tokio::spawn(run(storage.clone(), || async {
            Ok(Arc::new(InMemoryGameStore::new()) as Arc<dyn GameStore>)
        }));

        tokio::time::timeout(Duration::from_secs(2), watcher.wait_for(|degraded| !degraded))
            .await
            .unwrap()
            .unwrap();
        assert!(storage.game_store().await.is_some());

        supervisor.abort();
    }
}
