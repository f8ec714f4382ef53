use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{dao::game_store::GameStore, error::ServiceError};

/// Slot holding the current durable store, empty while running degraded.
pub struct StorageSlot {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
}

impl StorageSlot {
    /// Empty slot; starts in degraded mode until a store is installed.
    pub fn new() -> Self {
        let (degraded, _rx) = watch::channel(true);
        Self {
            game_store: RwLock::new(None),
            degraded,
        }
    }

    /// Slot pre-filled with `store`.
    pub fn with_store(store: Arc<dyn GameStore>) -> Self {
        let (degraded, _rx) = watch::channel(false);
        Self {
            game_store: RwLock::new(Some(store)),
            degraded,
        }
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        self.game_store.read().await.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`].
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        *self.game_store.write().await = Some(store);
        self.update_degraded(false).await;
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        self.game_store.write().await.take();
        self.update_degraded(true).await;
    }

    /// Whether the slot is in degraded mode.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

impl Default for StorageSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::game_store::memory::InMemoryGameStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let slot = StorageSlot::new();
        let mut watcher = slot.degraded_watcher();
        assert!(slot.is_degraded().await);
        assert!(matches!(
            slot.require_game_store().await,
            Err(ServiceError::Degraded)
        ));

        slot.set_game_store(Arc::new(InMemoryGameStore::new())).await;
        assert!(!slot.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        slot.clear_game_store().await;
        assert!(slot.is_degraded().await);
        assert!(slot.game_store().await.is_none());
    }
}
