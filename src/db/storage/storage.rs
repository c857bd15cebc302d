//! Fixed-capacity LRU cache with time-based expiry.
//!
//! Entries live in a fixed arena of slots. A slot is free iff it holds no payload.
//! Live slots are ordered by [`LRUList`]; a key index gives O(1) lookups.
//! One mutex serializes every operation and nothing under it performs I/O.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::time::Clock;

use super::lru::LRUList;

/// Errors reported by [`Storage`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to allocate {size} bytes for cache payload")]
    Alloc { size: usize },
    #[error("ttl {ttl:?} puts the expiry out of range")]
    TtlOutOfRange { ttl: Duration },
}

/// A cache hit: the stored payload and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub payload: Bytes,
    pub expires_at: SystemTime,
}

impl Entry {
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Point-in-time description of one live slot, used for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: String,
    pub size: usize,
    pub expires_at: SystemTime,
    pub expired: bool,
}

/// Counters accumulated since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub reaped: u64,
}

#[derive(Debug)]
struct Slot {
    key: String,
    payload: Option<Bytes>,
    expires_at: SystemTime,
}

impl Slot {
    fn empty() -> Self {
        Self {
            key: String::new(),
            payload: None,
            expires_at: SystemTime::UNIX_EPOCH,
        }
    }

    fn is_free(&self) -> bool {
        self.payload.is_none()
    }
}

struct Inner {
    slots: Vec<Slot>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    lru: LRUList,
    stats: Stats,
}

impl Inner {
    /// Unlinks a live slot and returns it to the free list.
    fn release(&mut self, idx: usize) {
        self.lru.unlink(idx);
        let slot = &mut self.slots[idx];
        slot.payload = None;
        self.index.remove(&slot.key);
        slot.key.clear();
        self.free.push(idx);
    }

    fn reap(&mut self, now: SystemTime) -> usize {
        let mut reaped = 0;
        let mut cursor = self.lru.head();
        while let Some(idx) = cursor {
            cursor = self.lru.next(idx);
            let slot = &self.slots[idx];
            if slot.expires_at <= now {
                debug!(
                    component = "storage",
                    event = "entry_reaped",
                    key = %slot.key,
                    "removing expired entry"
                );
                self.release(idx);
                reaped += 1;
            }
        }
        self.stats.reaped += reaped as u64;
        reaped
    }

    /// Picks the slot for `key`: its current slot, a free slot, or the evicted tail.
    fn select_slot(&mut self, key: &str) -> Option<usize> {
        if let Some(&idx) = self.index.get(key) {
            return Some(idx);
        }
        if let Some(idx) = self.free.pop() {
            return Some(idx);
        }

        let victim = self.lru.tail()?;
        debug!(
            component = "storage",
            event = "entry_evicted",
            key = %self.slots[victim].key,
            "evicting least recently used entry"
        );
        self.release(victim);
        self.stats.evictions += 1;
        // release() put the victim on the free list; take it straight back.
        self.free.pop()
    }
}

/// Thread-safe LRU cache keyed by request target.
pub struct Storage {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    max_key_len: usize,
}

impl Storage {
    /// Creates a cache with `capacity` slots. Keys are cut to `max_key_len` bytes.
    pub fn new(capacity: usize, max_key_len: usize, clock: Arc<dyn Clock>) -> Self {
        let slots = (0..capacity).map(|_| Slot::empty()).collect();
        // Reversed so that slot 0 is handed out first.
        let free = (0..capacity).rev().collect();

        info!(
            component = "storage",
            event = "initialized",
            capacity,
            max_key_len,
            "cache initialized"
        );

        Self {
            inner: Mutex::new(Inner {
                slots,
                free,
                index: HashMap::with_capacity(capacity),
                lru: LRUList::new(capacity),
                stats: Stats::default(),
            }),
            clock,
            capacity,
            max_key_len,
        }
    }

    /// Looks up a live entry and promotes it to most recently used.
    pub fn find(&self, key: &str) -> Option<Entry> {
        let key = truncate_key(key, self.max_key_len);
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let hit = inner
            .index
            .get(key)
            .copied()
            .filter(|&idx| inner.slots[idx].expires_at > now);

        let Some(idx) = hit else {
            inner.stats.misses += 1;
            debug!(component = "storage", event = "miss", key = key, "cache miss");
            return None;
        };

        inner.lru.move_to_front(idx);
        inner.stats.hits += 1;
        let slot = &inner.slots[idx];
        debug!(component = "storage", event = "hit", key = key, "cache hit");

        slot.payload.as_ref().map(|payload| Entry {
            key: slot.key.clone(),
            payload: payload.clone(),
            expires_at: slot.expires_at,
        })
    }

    /// Inserts or overwrites `key`, expiring `ttl` from now, as the most recently used entry.
    ///
    /// Expired entries are reaped first so their slots are reused before anything
    /// live is evicted. The payload copy and the expiry are settled before the
    /// cache is touched, so a failure of either leaves the cache exactly as it was.
    pub fn add(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<(), StorageError> {
        let key = truncate_key(key, self.max_key_len);
        let payload = copy_payload(payload)?;
        let size = payload.len();
        let now = self.clock.now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or(StorageError::TtlOutOfRange { ttl })?;

        let mut inner = self.inner.lock();
        inner.reap(now);

        let Some(idx) = inner.select_slot(key) else {
            // Zero-capacity cache.
            return Ok(());
        };

        let slot = &mut inner.slots[idx];
        if slot.is_free() {
            slot.key.clear();
            slot.key.push_str(key);
        }
        slot.payload = Some(payload);
        slot.expires_at = expires_at;

        inner.index.insert(key.to_owned(), idx);
        inner.lru.move_to_front(idx);
        inner.stats.inserts += 1;

        info!(
            component = "storage",
            event = "entry_added",
            key = key,
            size,
            ttl_secs = ttl.as_secs(),
            "cache entry added"
        );
        Ok(())
    }

    /// Removes every entry whose expiry has passed. Returns how many were removed.
    pub fn reap_expired(&self) -> usize {
        let now = self.clock.now();
        self.inner.lock().reap(now)
    }

    /// Returns live entries from most to least recently used.
    pub fn snapshot(&self) -> Vec<EntryInfo> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        inner
            .lru
            .iter()
            .map(|idx| {
                let slot = &inner.slots[idx];
                EntryInfo {
                    key: slot.key.clone(),
                    size: slot.payload.as_ref().map_or(0, Bytes::len),
                    expires_at: slot.expires_at,
                    expired: slot.expires_at <= now,
                }
            })
            .collect()
    }

    /// Number of occupied slots, including expired entries not yet reaped.
    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.lock();
        Stats {
            len: inner.lru.len(),
            ..inner.stats
        }
    }

    /// Panics unless the slot arena, free list, key index and recency list agree.
    #[cfg(test)]
    pub(crate) fn assert_integrity(&self) {
        let inner = self.inner.lock();

        let forward: Vec<usize> = inner.lru.iter().collect();
        let mut backward: Vec<usize> = inner.lru.iter_rev().collect();
        backward.reverse();
        assert_eq!(forward, backward, "reverse walk must mirror forward walk");
        assert_eq!(forward.len(), inner.lru.len());
        assert_eq!(inner.lru.head().is_none(), inner.lru.tail().is_none());

        for (pos, &idx) in forward.iter().enumerate() {
            assert!(!inner.slots[idx].is_free(), "free slot {idx} is linked");
            assert_eq!(inner.index.get(&inner.slots[idx].key), Some(&idx));
            if let Some(next) = inner.lru.next(idx) {
                assert_eq!(inner.lru.prev(next), Some(idx));
                assert_eq!(forward.get(pos + 1), Some(&next));
            }
        }

        let live = inner.slots.iter().filter(|s| !s.is_free()).count();
        assert_eq!(live, forward.len(), "every live slot is linked exactly once");
        assert_eq!(inner.index.len(), live);
        assert_eq!(inner.free.len() + live, self.capacity);
        for &idx in &inner.free {
            assert!(inner.slots[idx].is_free());
            assert!(!inner.lru.contains(idx));
            assert_eq!(inner.lru.next(idx), None);
        }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        let stats = self.stats();
        info!(
            component = "storage",
            event = "destroyed",
            len = stats.len,
            hits = stats.hits,
            misses = stats.misses,
            "cache destroyed"
        );
    }
}

/// Cuts `key` to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_key(key: &str, max: usize) -> &str {
    if key.len() <= max {
        return key;
    }
    let mut end = max;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    &key[..end]
}

fn copy_payload(data: &[u8]) -> Result<Bytes, StorageError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(data.len())
        .map_err(|_| StorageError::Alloc { size: data.len() })?;
    buf.extend_from_slice(data);
    Ok(Bytes::from(buf))
}
