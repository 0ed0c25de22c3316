//! Evictor task (C5, spec.md §4.5): a single background worker that hosts
//! the eviction strategies (C4) and wakes on a condition signalled by the
//! cache's observer callback.
//!
//! Edge-triggered coalescing: multiple `on_data_added` signals between two
//! wakeups fuse into a single pass, matching "clears the pending flag" in
//! spec.md §4.5.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::cache::strategy::{SpaceEvictionStrategy, TimeEvictionStrategy};
use crate::cache::{BeaconCache, CacheObserver};

struct Signal {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl CacheObserver for Signal {
    fn on_data_added(&self) {
        *self.pending.lock() = true;
        self.condvar.notify_one();
    }
}

/// Owns the time and space eviction strategies and runs them on a
/// dedicated background thread.
pub struct Evictor {
    cache: Arc<BeaconCache>,
    time_strategy: Arc<TimeEvictionStrategy>,
    space_strategy: Arc<SpaceEvictionStrategy>,
    signal: Arc<Signal>,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Evictor {
    pub fn new(cache: Arc<BeaconCache>, max_record_age_ms: i64, lower_bound_bytes: i64, upper_bound_bytes: i64) -> Arc<Self> {
        let evictor = Arc::new(Evictor {
            cache,
            time_strategy: Arc::new(TimeEvictionStrategy::new(max_record_age_ms)),
            space_strategy: Arc::new(SpaceEvictionStrategy::new(lower_bound_bytes, upper_bound_bytes)),
            signal: Arc::new(Signal {
                pending: Mutex::new(false),
                condvar: Condvar::new(),
            }),
            stop: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        });
        evictor
    }

    /// Registers the observer and spawns the worker thread. A no-op
    /// returning `false` if the evictor is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return false;
        }

        self.cache.register_observer(self.signal.clone());
        self.stop.store(false, Ordering::SeqCst);

        let cache = self.cache.clone();
        let time_strategy = self.time_strategy.clone();
        let space_strategy = self.space_strategy.clone();
        let signal = self.signal.clone();
        let stop = self.stop.clone();

        *handle = Some(thread::spawn(move || {
            run_loop(cache, time_strategy, space_strategy, signal, stop);
        }));
        true
    }

    /// Signals the worker to stop and waits for it to exit. A no-op
    /// returning `false` if the evictor isn't running.
    pub fn stop(&self) -> bool {
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return false;
        };
        self.stop.store(true, Ordering::SeqCst);
        *self.signal.pending.lock() = true;
        self.signal.condvar.notify_one();
        let _ = handle.join();
        true
    }
}

fn run_loop(
    cache: Arc<BeaconCache>,
    time_strategy: Arc<TimeEvictionStrategy>,
    space_strategy: Arc<SpaceEvictionStrategy>,
    signal: Arc<Signal>,
    stop: Arc<AtomicBool>,
) {
    loop {
        {
            let mut pending = signal.pending.lock();
            while !*pending && !stop.load(Ordering::SeqCst) {
                signal.condvar.wait(&mut pending);
            }
            *pending = false;
        }

        if stop.load(Ordering::SeqCst) {
            debug!("evictor task stopping");
            return;
        }

        let is_alive = || !stop.load(Ordering::SeqCst);
        time_strategy.execute(&cache, now_ms, is_alive);
        space_strategy.execute(&cache, is_alive);
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn start_twice_is_a_noop() {
        let cache = Arc::new(BeaconCache::new());
        let evictor = Evictor::new(cache, -1, -1, -1);
        assert!(evictor.start());
        assert!(!evictor.start());
        assert!(evictor.stop());
    }

    #[test]
    fn stop_when_not_running_returns_false() {
        let cache = Arc::new(BeaconCache::new());
        let evictor = Evictor::new(cache, -1, -1, -1);
        assert!(!evictor.stop());
    }

    #[test]
    fn signal_wakes_loop_and_runs_strategies() {
        let cache = Arc::new(BeaconCache::new());
        let evictor = Evictor::new(cache.clone(), -1, 0, 1);
        evictor.start();
        cache.add_event(1, 0, "x");
        thread::sleep(Duration::from_millis(50));
        evictor.stop();
    }
}
