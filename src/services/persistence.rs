//! Background writes of rating batches to the durable store.
//!
//! Batches of one room are written in submission order by a per-room lane
//! task; different rooms write concurrently up to a global limit. The
//! session that produced a batch never waits for the outcome.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{
    Semaphore,
    mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError},
    watch,
};
use tracing::{debug, warn};

use crate::{
    dao::models::RatingUpdateEntity,
    state::{game::RatingUpdateBatch, storage::StorageSlot},
};

/// Default maximum number of concurrent background writes.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Counters describing the queue activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceStats {
    /// Batches submitted but not yet written or dropped.
    pub pending: usize,
    /// Batches written to the store.
    pub completed: u64,
    /// Batches dropped, either degraded mode or a store error.
    pub failed: u64,
}

/// Fire-and-forget writer for rating batches.
#[derive(Clone)]
pub struct PersistenceQueue {
    storage: Arc<StorageSlot>,
    permits: Arc<Semaphore>,
    stats: Arc<watch::Sender<PersistenceStats>>,
    lanes: Arc<DashMap<String, UnboundedSender<RatingUpdateBatch>>>,
}

impl PersistenceQueue {
    /// Queue writing through `storage` with at most `concurrency` writes in flight.
    pub fn new(storage: Arc<StorageSlot>, concurrency: usize) -> Self {
        let (stats, _rx) = watch::channel(PersistenceStats::default());
        Self {
            storage,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            stats: Arc::new(stats),
            lanes: Arc::new(DashMap::new()),
        }
    }

    /// Queue the write of `batch` behind earlier batches of the same room.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, batch: RatingUpdateBatch) {
        self.stats.send_modify(|stats| stats.pending += 1);

        // Sends happen under the lane's shard lock, which the lane also takes before retiring.
        let room_id = batch.room_id.clone();
        let mut lane = self
            .lanes
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_lane(&room_id));
        if let Err(mpsc::error::SendError(batch)) = lane.send(batch) {
            warn!(room_id = %room_id, "persistence lane stopped; starting a new one");
            let fresh = self.spawn_lane(&room_id);
            if fresh.send(batch).is_err() {
                self.record(false);
            }
            *lane = fresh;
        }
    }

    fn spawn_lane(&self, room_id: &str) -> UnboundedSender<RatingUpdateBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.clone().drain_lane(room_id.to_owned(), rx));
        tx
    }

    async fn drain_lane(self, room_id: String, mut rx: UnboundedReceiver<RatingUpdateBatch>) {
        loop {
            match rx.try_recv() {
                Ok(batch) => {
                    let stored = self.write(batch).await;
                    self.record(stored);
                }
                Err(TryRecvError::Empty) => {
                    if self
                        .lanes
                        .remove_if(&room_id, |_, _| rx.is_empty())
                        .is_some()
                    {
                        return;
                    }
                }
                Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    fn record(&self, stored: bool) {
        self.stats.send_modify(|stats| {
            stats.pending -= 1;
            if stored {
                stats.completed += 1;
            } else {
                stats.failed += 1;
            }
        });
    }

    async fn write(&self, batch: RatingUpdateBatch) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            warn!(room_id = %batch.room_id, "persistence queue closed; dropping rating batch");
            return false;
        };

        let Some(store) = self.storage.game_store().await else {
            warn!(
                room_id = %batch.room_id,
                updates = batch.updates.len(),
                "storage unavailable (degraded mode); dropping rating batch"
            );
            return false;
        };

        let count = batch.updates.len();
        let updates: Vec<RatingUpdateEntity> =
            batch.updates.into_iter().map(Into::into).collect();
        match store.apply_rating_batch(&batch.room_id, updates).await {
            Ok(()) => {
                debug!(room_id = %batch.room_id, updates = count, "rating batch persisted");
                true
            }
            Err(err) => {
                warn!(room_id = %batch.room_id, error = %err, "failed to persist rating batch");
                false
            }
        }
    }

    /// Current counters.
    pub fn stats(&self) -> PersistenceStats {
        *self.stats.borrow()
    }

    /// Wait until no batch is pending and return the counters at that point.
    pub async fn wait_idle(&self) -> PersistenceStats {
        let mut rx = self.stats.subscribe();
        match rx.wait_for(|stats| stats.pending == 0).await {
            Ok(stats) => *stats,
            Err(_) => self.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        dao::{
            game_store::{GameStore, memory::InMemoryGameStore},
            models::GameEntity,
            storage::StorageResult,
        },
        state::game::{Candidate, GameRecord, Question, Rating, RatingUpdate},
    };

    /// Store whose first rating write stalls before reaching the inner store.
    #[derive(Clone)]
    struct StallFirstWrite {
        inner: InMemoryGameStore,
        stalled: Arc<AtomicBool>,
        stall: Duration,
    }

    impl StallFirstWrite {
        fn new(inner: InMemoryGameStore, stall: Duration) -> Self {
            Self {
                inner,
                stalled: Arc::new(AtomicBool::new(false)),
                stall,
            }
        }
    }

    impl GameStore for StallFirstWrite {
        fn find_game(
            &self,
            room_id: &str,
        ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            self.inner.find_game(room_id)
        }

        fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.create_game(game)
        }

        fn apply_rating_batch(
            &self,
            room_id: &str,
            updates: Vec<RatingUpdateEntity>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            let delay = if self.stalled.swap(true, Ordering::SeqCst) {
                Duration::ZERO
            } else {
                self.stall
            };
            let inner = self.inner.clone();
            let room_id = room_id.to_owned();
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                inner.apply_rating_batch(&room_id, updates).await
            })
        }

        fn game_exists(&self, room_id: &str) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.game_exists(room_id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    fn game(room_id: &str) -> GameRecord {
        GameRecord::new(
            room_id,
            "test",
            vec![Question {
                id: 1,
                value: "Who?".into(),
            }],
            vec![Candidate {
                id: 1,
                first_name: "Ada".into(),
                last_name: "L".into(),
                picture: None,
                games_played: 0,
            }],
            Rating::default(),
        )
    }

    fn batch(room_id: &str, mu: f64) -> RatingUpdateBatch {
        RatingUpdateBatch {
            room_id: room_id.into(),
            updates: vec![RatingUpdate {
                question_id: 1,
                candidate_id: 1,
                rating: Rating::new(mu, 7.5),
            }],
        }
    }

    fn stored_mu(store: &InMemoryGameStore, room_id: &str) -> f64 {
        store.snapshot(room_id).unwrap().leaderboard[&1][&1].mu
    }

    #[tokio::test]
    async fn writes_batches_in_background() {
        let store = InMemoryGameStore::new();
        store.create_game(game("ab12").into()).await.unwrap();
        let queue = PersistenceQueue::new(
            Arc::new(StorageSlot::with_store(Arc::new(store.clone()))),
            2,
        );

        queue.submit(batch("ab12", 27.0));
        let stats = queue.wait_idle().await;

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stored_mu(&store, "ab12"), 27.0);
    }

    #[tokio::test]
    async fn failures_are_counted_not_raised() {
        let queue = PersistenceQueue::new(
            Arc::new(StorageSlot::with_store(Arc::new(InMemoryGameStore::new()))),
            2,
        );
        queue.submit(batch("missing", 27.0));

        let degraded = PersistenceQueue::new(Arc::new(StorageSlot::new()), 2);
        degraded.submit(batch("ab12", 27.0));

        assert_eq!(queue.wait_idle().await.failed, 1);
        assert_eq!(degraded.wait_idle().await.failed, 1);
    }

    #[tokio::test]
    async fn later_batch_of_a_room_is_never_overwritten_by_an_earlier_one() {
        let inner = InMemoryGameStore::new();
        inner.create_game(game("ab12").into()).await.unwrap();
        let store = StallFirstWrite::new(inner.clone(), Duration::from_millis(100));
        let queue = PersistenceQueue::new(Arc::new(StorageSlot::with_store(Arc::new(store))), 4);

        queue.submit(batch("ab12", 27.0));
        queue.submit(batch("ab12", 28.0));
        let stats = queue.wait_idle().await;

        assert_eq!(stats.completed, 2);
        assert_eq!(stored_mu(&inner, "ab12"), 28.0);
    }

    #[tokio::test]
    async fn slow_room_does_not_hold_back_other_rooms() {
        let inner = InMemoryGameStore::new();
        inner.create_game(game("slow").into()).await.unwrap();
        inner.create_game(game("fast").into()).await.unwrap();
        let store = StallFirstWrite::new(inner.clone(), Duration::from_secs(1));
        let queue = PersistenceQueue::new(Arc::new(StorageSlot::with_store(Arc::new(store))), 4);

        queue.submit(batch("slow", 27.0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.submit(batch("fast", 30.0));

        tokio::time::timeout(Duration::from_millis(500), async {
            while stored_mu(&inner, "fast") != 30.0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_ne!(stored_mu(&inner, "slow"), 27.0);

        assert_eq!(queue.wait_idle().await.completed, 2);
        assert_eq!(stored_mu(&inner, "slow"), 27.0);
    }
}
