use ahash::AHashMap;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    hash::Hash,
    time::{Duration, Instant},
};

struct Window {
    hits: VecDeque<Instant>,
    span: Duration,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) < self.span {
                break;
            }
            self.hits.pop_front();
        }
    }

    fn retry_after(&self, limit: usize, now: Instant) -> Option<Duration> {
        if self.hits.len() < limit.max(1) {
            return None;
        }
        let oldest = self.hits.front().copied().unwrap_or(now);
        Some(self.span.saturating_sub(now.saturating_duration_since(oldest)))
    }
}

/// Sliding-window hit counter.
///
/// Each key keeps the timestamps of its hits inside the window. Keys that
/// have been quiet for a whole window are removed by [`RateLimiter::sweep`].
pub struct RateLimiter<K> {
    windows: Mutex<AHashMap<K, Window>>,
}

impl<K: Hash + Eq> Default for RateLimiter<K> {
    fn default() -> Self {
        RateLimiter {
            windows: Mutex::new(AHashMap::new()),
        }
    }
}

impl<K: Hash + Eq> RateLimiter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit for `key` unless it already has `limit` hits inside `window`.
    ///
    /// On refusal returns how long until the oldest hit leaves the window.
    pub fn check(&self, key: K, limit: usize, window: Duration, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock();
        let entry = windows.entry(key).or_insert_with(|| Window {
            hits: VecDeque::new(),
            span: window,
        });
        entry.span = window;
        entry.prune(now);

        if let Some(retry) = entry.retry_after(limit, now) {
            return Err(retry);
        }

        entry.hits.push_back(now);
        Ok(())
    }

    /// Like [`RateLimiter::check`] but records nothing.
    pub fn peek(&self, key: &K, limit: usize, window: Duration, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock();
        let Some(entry) = windows.get_mut(key) else {
            return Ok(());
        };
        entry.span = window;
        entry.prune(now);

        entry.retry_after(limit, now).map_or(Ok(()), Err)
    }

    /// Takes back the newest hit of `key`.
    pub fn undo(&self, key: &K) {
        let mut windows = self.windows.lock();
        if let Some(entry) = windows.get_mut(key) {
            entry.hits.pop_back();
            if entry.hits.is_empty() {
                windows.remove(key);
            }
        }
    }

    /// Drops keys whose newest hit is older than their window. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| {
            window
                .hits
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < window.span)
        });
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn allows_up_to_limit_then_refuses() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.check("alice", 3, MINUTE, start + Duration::from_secs(i)).is_ok());
        }

        let retry = limiter
            .check("alice", 3, MINUTE, start + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));
        assert!(limiter.check("bob", 3, MINUTE, start).is_ok());
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.check("alice", 1, MINUTE, start).unwrap();
        assert!(limiter.check("alice", 1, MINUTE, start + Duration::from_secs(59)).is_err());
        assert!(limiter.check("alice", 1, MINUTE, start + MINUTE).is_ok());
    }

    #[test]
    fn sweep_drops_quiet_keys() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.check("alice", 5, MINUTE, start).unwrap();
        limiter.check("bob", 5, MINUTE, start + Duration::from_secs(30)).unwrap();

        assert_eq!(limiter.sweep(start + Duration::from_secs(70)), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.sweep(start + Duration::from_secs(100)), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn peek_and_undo_leave_no_trace() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.peek(&"alice", 1, MINUTE, start).is_ok());
        }
        assert!(limiter.is_empty());

        limiter.check("alice", 1, MINUTE, start).unwrap();
        assert_eq!(limiter.peek(&"alice", 1, MINUTE, start), Err(MINUTE));

        limiter.undo(&"alice");
        assert!(limiter.is_empty());
        assert!(limiter.check("alice", 1, MINUTE, start).is_ok());
    }
}
