//! Eviction strategies (C4, spec.md §4.4). Both are stateless with respect
//! to the cache itself: they read configuration, consult a timing source
//! and an "is-alive" predicate, and invoke [`crate::cache::BeaconCache`]
//! operations.
//!
//! Grounded on `caching::TimeEvictionStrategy` / `SpaceEvictionStrategy`
//! from the original implementation: same `should_run` / `execute` split,
//! same last-run timestamp gate on the time strategy.

use std::sync::atomic::{AtomicI64, Ordering};

use tracing::{debug, info};

use crate::cache::BeaconCache;

/// A caller-supplied predicate checked between eviction steps so a
/// shutdown request can interrupt a long-running pass.
pub trait IsAlive: Fn() -> bool + Send + Sync {}
impl<T: Fn() -> bool + Send + Sync> IsAlive for T {}

pub trait TimeSource: Fn() -> i64 + Send + Sync {}
impl<T: Fn() -> i64 + Send + Sync> TimeSource for T {}

/// Age-based eviction: drops records older than `max_record_age_ms`, at
/// most once per `max_record_age_ms` interval.
pub struct TimeEvictionStrategy {
    max_record_age_ms: i64,
    last_run_ms: AtomicI64,
}

impl TimeEvictionStrategy {
    pub fn new(max_record_age_ms: i64) -> Self {
        TimeEvictionStrategy {
            max_record_age_ms,
            last_run_ms: AtomicI64::new(0),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_record_age_ms <= 0
    }

    pub fn should_run(&self, now_ms: i64) -> bool {
        now_ms - self.last_run_ms.load(Ordering::Relaxed) >= self.max_record_age_ms
    }

    pub fn execute(&self, cache: &BeaconCache, now_ms: impl Fn() -> i64, is_alive: impl Fn() -> bool) {
        if self.is_disabled() {
            info!("time eviction strategy is disabled");
            return;
        }
        let now = now_ms();
        if !self.should_run(now) {
            return;
        }

        let threshold = now - self.max_record_age_ms;
        for id in cache.get_beacon_ids() {
            if !is_alive() {
                break;
            }
            let removed = cache.evict_by_age(id, threshold);
            if removed > 0 {
                debug!(session_id = id, removed, "time-evicted records");
            }
        }
        self.last_run_ms.store(now, Ordering::Relaxed);
    }
}

/// Space-based eviction: round-robin removes one record per session at a
/// time until the cache total drops to `lower_bound_bytes`, triggered once
/// the total exceeds `upper_bound_bytes`.
pub struct SpaceEvictionStrategy {
    lower_bound_bytes: i64,
    upper_bound_bytes: i64,
}

impl SpaceEvictionStrategy {
    pub fn new(lower_bound_bytes: i64, upper_bound_bytes: i64) -> Self {
        SpaceEvictionStrategy {
            lower_bound_bytes,
            upper_bound_bytes,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.lower_bound_bytes <= 0
            || self.upper_bound_bytes <= 0
            || self.upper_bound_bytes < self.lower_bound_bytes
    }

    pub fn should_run(&self, cache: &BeaconCache) -> bool {
        cache.total_bytes() > self.upper_bound_bytes
    }

    pub fn execute(&self, cache: &BeaconCache, is_alive: impl Fn() -> bool) {
        if self.is_disabled() || !self.should_run(cache) {
            return;
        }

        let mut totals: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
        while is_alive() && cache.total_bytes() > self.lower_bound_bytes {
            let ids = cache.get_beacon_ids();
            if ids.is_empty() {
                break;
            }
            let mut any_removed = false;
            for id in ids {
                if !is_alive() || cache.total_bytes() <= self.lower_bound_bytes {
                    break;
                }
                let removed = cache.evict_by_number(id, 1);
                if removed > 0 {
                    *totals.entry(id).or_insert(0) += removed;
                    any_removed = true;
                }
            }
            if !any_removed {
                break;
            }
        }
        for (id, count) in totals {
            debug!(session_id = id, removed = count, "space-evicted records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_strategy_disabled_when_non_positive() {
        assert!(TimeEvictionStrategy::new(0).is_disabled());
        assert!(TimeEvictionStrategy::new(-1).is_disabled());
        assert!(!TimeEvictionStrategy::new(1000).is_disabled());
    }

    #[test]
    fn space_strategy_disabled_when_bounds_invalid() {
        assert!(SpaceEvictionStrategy::new(0, 100).is_disabled());
        assert!(SpaceEvictionStrategy::new(100, 0).is_disabled());
        assert!(SpaceEvictionStrategy::new(200, 100).is_disabled());
        assert!(!SpaceEvictionStrategy::new(100, 200).is_disabled());
    }

    #[test]
    fn round_robin_space_eviction_alternates_sessions() {
        let cache = BeaconCache::new();
        for i in 0..10 {
            cache.add_event(1, i, "x");
            cache.add_event(2, i, "x");
        }
        let cost = crate::cache::record::BeaconCacheRecord::new(0, "x").cost();
        let strategy = SpaceEvictionStrategy::new(5 * cost, 15 * cost);
        strategy.execute(&cache, || true);
        assert!(cache.total_bytes() <= 5 * cost);
    }
}
