use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Where attempt timestamps live between checks.
pub trait LedgerStore: Send + Sync {
    fn load(&self, key: &str) -> Vec<DateTime<Utc>>;
    fn save(&self, key: &str, attempts: Vec<DateTime<Utc>>);
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl LedgerStore for MemoryLedger {
    fn load(&self, key: &str) -> Vec<DateTime<Utc>> {
        self.entries.lock().get(key).cloned().unwrap_or_default()
    }

    fn save(&self, key: &str, attempts: Vec<DateTime<Utc>>) {
        self.entries.lock().insert(key.to_string(), attempts);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub max_attempts: usize,
    pub window: Duration,
}

impl ThrottlePolicy {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }
}

/// Sliding-window attempt log per action key.
///
/// Advisory friction against rapid repetition of sensitive actions; the backend enforces its
/// own limits. Keys are independent and rejected attempts are not recorded.
pub struct Throttle<C = SystemClock, S = MemoryLedger> {
    clock: C,
    store: S,
}

impl Throttle {
    pub fn new() -> Self {
        Self::with_parts(SystemClock, MemoryLedger::default())
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock, S: LedgerStore> Throttle<C, S> {
    pub fn with_parts(clock: C, store: S) -> Self {
        Self { clock, store }
    }

    /// Returns `true` and records the attempt when `key` has fewer than `max_attempts`
    /// attempts inside the trailing `window`; returns `false` otherwise.
    pub fn check(&self, key: &str, max_attempts: usize, window: Duration) -> bool {
        let now = self.clock.now();
        let mut attempts = self.store.load(key);
        attempts.retain(|at| now - *at < window);

        if attempts.len() >= max_attempts {
            // The compacted log is kept; the rejected attempt itself is not recorded.
            self.store.save(key, attempts);
            return false;
        }

        attempts.push(now);
        self.store.save(key, attempts);
        true
    }

    pub fn check_policy(&self, key: &str, policy: &ThrottlePolicy) -> bool {
        self.check(key, policy.max_attempts, policy.window)
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixture() -> (Arc<ManualClock>, Throttle<Arc<ManualClock>, MemoryLedger>) {
        let start = Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(start));
        let throttle = Throttle::with_parts(clock.clone(), MemoryLedger::default());
        (clock, throttle)
    }

    #[test]
    fn allows_up_to_max_then_blocks() {
        let (_, throttle) = fixture();
        let window = Duration::milliseconds(1000);
        assert!(throttle.check("k", 3, window));
        assert!(throttle.check("k", 3, window));
        assert!(throttle.check("k", 3, window));
        assert!(!throttle.check("k", 3, window));
    }

    #[test]
    fn window_expiry_is_exclusive() {
        let (clock, throttle) = fixture();
        let window = Duration::milliseconds(1000);
        for _ in 0..3 {
            assert!(throttle.check("k", 3, window));
        }

        clock.advance(Duration::milliseconds(999));
        assert!(!throttle.check("k", 3, window));

        clock.advance(Duration::milliseconds(1));
        assert!(throttle.check("k", 3, window));
    }

    #[test]
    fn rejected_attempts_do_not_consume_budget() {
        let (clock, throttle) = fixture();
        let window = Duration::milliseconds(1000);
        assert!(throttle.check("k", 1, window));
        clock.advance(Duration::milliseconds(500));
        assert!(!throttle.check("k", 1, window));
        assert!(!throttle.check("k", 1, window));

        // Only the first attempt counts, so the key frees up 1000ms after it.
        clock.advance(Duration::milliseconds(500));
        assert!(throttle.check("k", 1, window));
    }

    #[test]
    fn keys_are_independent() {
        let (_, throttle) = fixture();
        let policy = ThrottlePolicy::new(1, Duration::minutes(5));
        assert!(throttle.check_policy("signin", &policy));
        assert!(!throttle.check_policy("signin", &policy));
        assert!(throttle.check_policy("signup", &policy));
    }

    #[test]
    fn expired_entries_are_purged() {
        let (clock, throttle) = fixture();
        let window = Duration::seconds(10);
        throttle.check("k", 5, window);
        throttle.check("k", 5, window);
        clock.advance(Duration::seconds(11));
        throttle.check("k", 5, window);
        assert_eq!(throttle.store.load("k").len(), 1);
    }

    #[test]
    fn zero_budget_always_blocks() {
        let (_, throttle) = fixture();
        assert!(!throttle.check("k", 0, Duration::seconds(1)));
    }
}
