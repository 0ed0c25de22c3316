//! Beacon cache (C3, spec.md §4.3): per-session append-only queues of
//! serialized records with byte accounting and observer fan-out.
//!
//! Concurrency follows §5: a per-entry [`parking_lot::Mutex`] guards each
//! entry's four sequences and its byte counter; a short global lock guards
//! the entry map for structural changes; the byte total is a plain atomic.
//! Observers are notified outside any entry lock.

pub mod entry;
pub mod evictor;
pub mod record;
pub mod strategy;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::entry::BeaconCacheEntry;
use crate::cache::record::BeaconCacheRecord;

/// Notified exactly once per `add_event`/`add_action`/`reset_chunked_data`
/// call, outside any entry lock (spec.md §4.3, §9 "Observer callback
/// inside the cache").
pub trait CacheObserver: Send + Sync {
    fn on_data_added(&self);
}

pub struct BeaconCache {
    entries: Mutex<HashMap<i64, Arc<Mutex<BeaconCacheEntry>>>>,
    total_bytes: AtomicI64,
    observers: Mutex<Vec<Arc<dyn CacheObserver>>>,
}

impl BeaconCache {
    pub fn new() -> Self {
        BeaconCache {
            entries: Mutex::new(HashMap::new()),
            total_bytes: AtomicI64::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn CacheObserver>) {
        self.observers.lock().push(observer);
    }

    fn notify_observers(&self) {
        // Snapshot under the lock, then call back outside it: an observer
        // must never be able to re-enter the cache while we hold its lock.
        let observers = self.observers.lock().clone();
        for observer in observers {
            observer.on_data_added();
        }
    }

    fn entry_for(&self, session_id: i64) -> Arc<Mutex<BeaconCacheEntry>> {
        self.entries
            .lock()
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(BeaconCacheEntry::new())))
            .clone()
    }

    pub fn add_event(&self, session_id: i64, timestamp_ms: i64, data: impl Into<String>) {
        let entry = self.entry_for(session_id);
        let record = BeaconCacheRecord::new(timestamp_ms, data);
        let cost = entry.lock().add_event(record);
        self.total_bytes.fetch_add(cost, Ordering::Relaxed);
        self.notify_observers();
    }

    pub fn add_action(&self, session_id: i64, timestamp_ms: i64, data: impl Into<String>) {
        let entry = self.entry_for(session_id);
        let record = BeaconCacheRecord::new(timestamp_ms, data);
        let cost = entry.lock().add_action(record);
        self.total_bytes.fetch_add(cost, Ordering::Relaxed);
        self.notify_observers();
    }

    /// Removes the entry entirely. Adjusts the global counter; does NOT
    /// signal observers.
    pub fn delete_entry(&self, session_id: i64) {
        let removed = self.entries.lock().remove(&session_id);
        if let Some(entry) = removed {
            let entry = entry.lock();
            let remaining: i64 = entry
                .events
                .iter()
                .chain(entry.actions.iter())
                .chain(entry.events_being_sent.iter())
                .chain(entry.actions_being_sent.iter())
                .map(BeaconCacheRecord::cost)
                .sum();
            self.total_bytes.fetch_sub(remaining, Ordering::Relaxed);
        }
    }

    pub fn get_next_chunk(&self, session_id: i64, prefix: &str, max_bytes: usize, separator: &str) -> String {
        let Some(entry) = self.entries.lock().get(&session_id).cloned() else {
            return String::new();
        };
        entry.lock().next_chunk(prefix, max_bytes, separator)
    }

    pub fn remove_chunked_data(&self, session_id: i64) {
        let Some(entry) = self.entries.lock().get(&session_id).cloned() else {
            return;
        };
        let removed = entry.lock().remove_chunked_data();
        self.total_bytes.fetch_sub(removed, Ordering::Relaxed);
    }

    pub fn reset_chunked_data(&self, session_id: i64) {
        let Some(entry) = self.entries.lock().get(&session_id).cloned() else {
            return;
        };
        entry.lock().reset_chunked_data();
        self.notify_observers();
    }

    pub fn evict_by_age(&self, session_id: i64, min_ts_exclusive: i64) -> usize {
        let Some(entry) = self.entries.lock().get(&session_id).cloned() else {
            return 0;
        };
        let mut guard = entry.lock();
        let before = guard.bytes;
        let removed = guard.evict_by_age(min_ts_exclusive);
        let freed = before - guard.bytes;
        drop(guard);
        self.total_bytes.fetch_sub(freed, Ordering::Relaxed);
        removed
    }

    pub fn evict_by_number(&self, session_id: i64, n: usize) -> usize {
        let Some(entry) = self.entries.lock().get(&session_id).cloned() else {
            return 0;
        };
        let mut guard = entry.lock();
        let before = guard.bytes;
        let removed = guard.evict_by_number(n);
        let freed = before - guard.bytes;
        drop(guard);
        self.total_bytes.fetch_sub(freed, Ordering::Relaxed);
        removed
    }

    pub fn get_beacon_ids(&self) -> Vec<i64> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, e)| e.lock().has_any_records())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_empty(&self, session_id: i64) -> bool {
        match self.entries.lock().get(&session_id) {
            Some(entry) => entry.lock().is_empty(),
            None => true,
        }
    }

    pub fn total_bytes(&self) -> i64 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}

impl Default for BeaconCache {
    fn default() -> Self {
        BeaconCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct CountingObserver(Arc<AtomicUsize>);
    impl CacheObserver for CountingObserver {
        fn on_data_added(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn concurrent_increments_from_five_workers() {
        let cache = Arc::new(BeaconCache::new());
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..20 {
                        cache.add_event(42, i, "x");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.get_beacon_ids(), vec![42]);
        let cost = record::BeaconCacheRecord::new(0, "x").cost();
        assert_eq!(cache.total_bytes(), 100 * cost);
    }

    #[test]
    fn add_signals_observer_exactly_once_per_call() {
        let cache = BeaconCache::new();
        let count = Arc::new(AtomicUsize::new(0));
        cache.register_observer(Arc::new(CountingObserver(count.clone())));
        cache.add_event(1, 0, "a");
        cache.add_action(1, 0, "b");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn chunk_then_remove_reduces_total_bytes() {
        let cache = BeaconCache::new();
        cache.add_event(1, 0, "aaaa");
        let before = cache.total_bytes();
        let chunk = cache.get_next_chunk(1, "", 1000, "&");
        assert_eq!(chunk, "aaaa");
        cache.remove_chunked_data(1);
        assert!(cache.total_bytes() < before);
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn chunk_then_reset_restores_state() {
        let cache = BeaconCache::new();
        cache.add_event(1, 0, "aaaa");
        let before = cache.total_bytes();
        cache.get_next_chunk(1, "", 1000, "&");
        cache.reset_chunked_data(1);
        assert_eq!(cache.total_bytes(), before);
    }

    #[test]
    fn delete_entry_does_not_notify_observers() {
        let cache = BeaconCache::new();
        let count = Arc::new(AtomicUsize::new(0));
        cache.register_observer(Arc::new(CountingObserver(count.clone())));
        cache.add_event(1, 0, "x");
        count.store(0, Ordering::SeqCst);
        cache.delete_entry(1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(cache.total_bytes(), 0);
    }
}
