//! Time-windowed caching for expensive console checks

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default reuse window for cached checks (15 minutes)
pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_secs(900);

/// Source of monotonic time for cache decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed_ms: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }
}

/// A cached value and the time it was produced
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub checked_at: Instant,
    pub value: T,
}

/// Single-slot cache reused while `now - checked_at < window`
#[derive(Debug, Clone)]
pub struct TimedCache<T> {
    window: Duration,
    entry: Option<CacheEntry<T>>,
}

impl<T> TimedCache<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entry: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// The cached value, if still inside the window at `now`
    pub fn get(&self, now: Instant) -> Option<&T> {
        self.entry
            .as_ref()
            .filter(|entry| now.saturating_duration_since(entry.checked_at) < self.window)
            .map(|entry| &entry.value)
    }

    /// Replace the cached value, stamping it with `now`
    pub fn store(&mut self, now: Instant, value: T) {
        self.entry = Some(CacheEntry {
            checked_at: now,
            value,
        });
    }

    pub fn entry(&self) -> Option<&CacheEntry<T>> {
        self.entry.as_ref()
    }
}

impl<T> Default for TimedCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_WINDOW)
    }
}
