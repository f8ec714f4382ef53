//! Bounded in-memory cache of active rooms.
//!
//! Eviction approximates LRU: when the cache is full, a fixed-size random
//! sample of the live entries is drawn in a single pass and the sampled entry
//! with the oldest access stamp is dropped.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

use crate::state::game::GameRecord;

/// Room record guarded for exclusive mutation, shared by every session of the room.
pub type SharedRoom = Arc<Mutex<GameRecord>>;

/// Default maximum number of cached rooms.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Default number of entries inspected per eviction.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

struct CacheEntry {
    room: SharedRoom,
    last_access: AtomicU64,
}

/// Concurrent room cache keyed by room id.
pub struct RoomCache {
    entries: DashMap<String, CacheEntry>,
    // Approximate; bumped after the insert so concurrent inserts may overshoot briefly.
    size: AtomicUsize,
    capacity: usize,
    sample_size: usize,
    clock: AtomicU64,
}

impl RoomCache {
    /// Empty cache holding at most `capacity` rooms, sampling `sample_size` entries per eviction.
    pub fn new(capacity: usize, sample_size: usize) -> Self {
        Self {
            entries: DashMap::new(),
            size: AtomicUsize::new(0),
            capacity: capacity.max(1),
            sample_size: sample_size.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Cached room, refreshing its access stamp.
    pub fn get(&self, room_id: &str) -> Option<SharedRoom> {
        let entry = self.entries.get(room_id)?;
        entry.last_access.store(self.tick(), Ordering::Relaxed);
        Some(entry.room.clone())
    }

    /// Cache `record`, replacing any previous entry for the room.
    pub fn insert(&self, room_id: impl Into<String>, record: GameRecord) -> SharedRoom {
        let room_id = room_id.into();
        if !self.entries.contains_key(&room_id) {
            self.make_room();
        }

        let room: SharedRoom = Arc::new(Mutex::new(record));
        let entry = CacheEntry {
            room: room.clone(),
            last_access: AtomicU64::new(self.tick()),
        };
        if self.entries.insert(room_id, entry).is_none() {
            self.size.fetch_add(1, Ordering::Relaxed);
        }
        room
    }

    /// Cache `record` unless the room is already present, returning the cached handle.
    ///
    /// Concurrent loaders of the same room converge on a single record.
    pub fn get_or_insert(&self, room_id: impl Into<String>, record: GameRecord) -> SharedRoom {
        self.get_or_adopt(room_id.into(), || Arc::new(Mutex::new(record)))
    }

    /// Mark `room_id` as used by a live session.
    ///
    /// An evicted room is reinstated with the session's `room` handle so later
    /// sessions share its lock. Returns the handle the session should keep.
    pub fn touch(&self, room_id: &str, room: &SharedRoom) -> SharedRoom {
        self.get_or_adopt(room_id.to_owned(), || room.clone())
    }

    fn get_or_adopt(&self, room_id: String, room: impl FnOnce() -> SharedRoom) -> SharedRoom {
        if let Some(cached) = self.get(&room_id) {
            return cached;
        }

        self.make_room();
        let stamp = self.tick();
        match self.entries.entry(room_id) {
            Entry::Occupied(occupied) => {
                occupied.get().last_access.store(stamp, Ordering::Relaxed);
                occupied.get().room.clone()
            }
            Entry::Vacant(vacant) => {
                let room = room();
                vacant.insert(CacheEntry {
                    room: room.clone(),
                    last_access: AtomicU64::new(stamp),
                });
                self.size.fetch_add(1, Ordering::Relaxed);
                room
            }
        }
    }

    /// Drop `room_id` from the cache. Sessions holding the handle keep it.
    pub fn remove(&self, room_id: &str) -> Option<SharedRoom> {
        let (_, entry) = self.entries.remove(room_id)?;
        self.size.fetch_sub(1, Ordering::Relaxed);
        Some(entry.room)
    }

    /// Whether `room_id` is cached, without refreshing it.
    pub fn contains(&self, room_id: &str) -> bool {
        self.entries.contains_key(room_id)
    }

    /// Approximate number of cached rooms.
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Whether no room is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured maximum number of rooms.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn make_room(&self) {
        let mut rng = rand::rng();
        // A concurrent eviction may have claimed the sampled victim; retry until there is space.
        while self.len() >= self.capacity {
            if self.evict_one(&mut rng).is_none() && self.entries.is_empty() {
                break;
            }
        }
    }

    /// Drop the least recently used entry among a random sample.
    fn evict_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let candidates = self.entries.iter().map(|entry| {
            (
                entry.key().clone(),
                entry.value().last_access.load(Ordering::Relaxed),
            )
        });
        let sample = reservoir_sample(candidates, self.sample_size, rng);
        let (victim, stamp) = sample.into_iter().min_by_key(|(_, stamp)| *stamp)?;

        self.remove(&victim)?;
        debug!(room_id = %victim, last_access = stamp, "evicted room from cache");
        Some(victim)
    }
}

impl Default for RoomCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_SAMPLE_SIZE)
    }
}

/// Uniform sample of at most `k` items drawn in a single pass (Algorithm R).
pub fn reservoir_sample<I, R>(items: I, k: usize, rng: &mut R) -> Vec<I::Item>
where
    I: IntoIterator,
    R: Rng + ?Sized,
{
    let mut reservoir = Vec::with_capacity(k);
    if k == 0 {
        return reservoir;
    }

    for (seen, item) in items.into_iter().enumerate() {
        if seen < k {
            reservoir.push(item);
        } else {
            let slot = rng.random_range(0..=seen);
            if slot < k {
                reservoir[slot] = item;
            }
        }
    }
    reservoir
}
