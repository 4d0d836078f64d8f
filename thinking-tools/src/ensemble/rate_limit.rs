//! Sliding-window rate limiter
//!
//! Counts operations per `(session, agent)` pair. Timestamps older than the
//! window are pruned lazily on every check, so memory stays bounded by
//! `max_ops` per active pair.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

type Windows = HashMap<String, HashMap<String, VecDeque<Instant>>>;

pub type SharedRateLimiter = Arc<RateLimiter>;

#[derive(Debug)]
pub struct RateLimiter {
    max_ops: usize,
    window: Duration,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(max_ops: usize, window: Duration) -> Self {
        Self {
            max_ops,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> SharedRateLimiter {
        Arc::new(self)
    }

    pub fn max_ops(&self) -> usize {
        self.max_ops
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `agent` has used up its window in `session`.
    pub fn is_limited(&self, session: &str, agent: &str) -> bool {
        self.is_limited_at(session, agent, Instant::now())
    }

    pub fn is_limited_at(&self, session: &str, agent: &str, now: Instant) -> bool {
        let mut windows = self.lock();
        let queue = windows
            .entry(session.to_string())
            .or_default()
            .entry(agent.to_string())
            .or_default();
        prune(queue, now, self.window);
        let limited = queue.len() >= self.max_ops;
        debug!(session, agent, count = queue.len(), limited, "rate limit check");
        limited
    }

    /// Record one operation. Never fails and never checks the limit.
    pub fn record(&self, session: &str, agent: &str) {
        self.record_at(session, agent, Instant::now());
    }

    pub fn record_at(&self, session: &str, agent: &str, now: Instant) {
        let mut windows = self.lock();
        windows
            .entry(session.to_string())
            .or_default()
            .entry(agent.to_string())
            .or_default()
            .push_back(now);
    }

    /// Operation counts inside the window, by session then agent.
    pub fn status(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> BTreeMap<String, BTreeMap<String, usize>> {
        let mut windows = self.lock();
        windows
            .iter_mut()
            .map(|(session, agents)| {
                let counts = agents
                    .iter_mut()
                    .map(|(agent, queue)| {
                        prune(queue, now, self.window);
                        (agent.clone(), queue.len())
                    })
                    .collect();
                (session.clone(), counts)
            })
            .collect()
    }

    /// Clear the window for `agent` in one session, or in all of them.
    pub fn reset(&self, agent: &str, session: Option<&str>) {
        let mut windows = self.lock();
        match session {
            Some(session) => {
                if let Some(queue) = windows.get_mut(session).and_then(|a| a.get_mut(agent)) {
                    queue.clear();
                }
            }
            None => {
                for agents in windows.values_mut() {
                    if let Some(queue) = agents.get_mut(agent) {
                        queue.clear();
                    }
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        // Plain timestamps: still consistent after a poisoning panic.
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    while queue.front().is_some_and(|&t| t < cutoff) {
        queue.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixth_op_is_limited() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(!limiter.is_limited_at("s", "analytical", t0));
            limiter.record_at("s", "analytical", t0 + Duration::from_secs(i));
        }
        assert!(limiter.is_limited_at("s", "analytical", t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_window_expiry_prunes() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let t0 = Instant::now();
        for _ in 0..5 {
            limiter.record_at("s", "analytical", t0);
        }
        let later = t0 + Duration::from_secs(61);
        assert!(!limiter.is_limited_at("s", "analytical", later));
        assert_eq!(limiter.status_at(later)["s"]["analytical"], 0);
    }

    #[test]
    fn test_scoped_per_session_and_agent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        limiter.record_at("s1", "analytical", t0);
        assert!(limiter.is_limited_at("s1", "analytical", t0));
        assert!(!limiter.is_limited_at("s2", "analytical", t0));
        assert!(!limiter.is_limited_at("s1", "skeptical", t0));
    }

    #[test]
    fn test_reset_single_session_and_all() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let t0 = Instant::now();
        limiter.record_at("s1", "creative", t0);
        limiter.record_at("s2", "creative", t0);

        limiter.reset("creative", Some("s1"));
        assert!(!limiter.is_limited_at("s1", "creative", t0));
        assert!(limiter.is_limited_at("s2", "creative", t0));

        limiter.reset("creative", None);
        assert!(!limiter.is_limited_at("s2", "creative", t0));
    }
}
