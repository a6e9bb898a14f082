//! Clock Abstraction
//!
//! Every "now" the recorder, flusher and scheduler consult goes through the
//! [`Clock`] trait, so tests can pin time to a known minute bucket instead
//! of racing the wall clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current Unix time in whole seconds
pub trait Clock: Send + Sync + Clone + 'static {
    /// Current Unix timestamp in seconds
    fn now_secs(&self) -> u64;
}

/// Production clock backed by the system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        // A clock set before 1970 reads as the epoch rather than panicking.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances when explicitly told to via `advance_secs()` or `set()`.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    time_secs: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    /// Create a new simulated clock starting at the given time
    pub fn new(start_secs: u64) -> Self {
        SimulatedClock {
            time_secs: Arc::new(AtomicU64::new(start_secs)),
        }
    }

    /// Advance time by seconds
    pub fn advance_secs(&self, secs: u64) {
        self.time_secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set time to a specific value
    pub fn set(&self, time_secs: u64) {
        self.time_secs.store(time_secs, Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now_secs(&self) -> u64 {
        self.time_secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        let clock = SystemClock::new();
        assert!(clock.now_secs() > 1_577_836_800);
    }

    #[test]
    fn test_simulated_clock_deterministic() {
        let clock = SimulatedClock::new(1000);

        // Time doesn't advance on its own
        assert_eq!(clock.now_secs(), clock.now_secs());

        clock.advance_secs(60);
        assert_eq!(clock.now_secs(), 1060);

        clock.set(5000);
        assert_eq!(clock.now_secs(), 5000);
    }

    #[test]
    fn test_simulated_clock_shared() {
        let clock = SimulatedClock::new(0);
        let clock2 = clock.clone();

        clock.advance_secs(100);
        assert_eq!(clock2.now_secs(), 100, "Clones should share state");
    }
}
