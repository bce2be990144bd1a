//! Clock abstraction for deterministic testing.
//!
//! Production code uses `SystemClock` (real time). Tests use `TestClock`
//! with manual time advancement. Host timestamps throughout the pipeline
//! are seconds since session start, read through this trait.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trait abstracting time sources for testability.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic instant.
    fn now(&self) -> Instant;

    /// Returns seconds elapsed since the session started.
    fn session_secs(&self) -> f64;
}

/// Production clock using real monotonic time, anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn session_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Test clock with manually controlled time.
pub struct TestClock {
    instant: Mutex<Instant>,
    elapsed: Mutex<Duration>,
}

impl TestClock {
    /// Create a test clock at session time zero.
    pub fn new() -> Self {
        Self {
            instant: Mutex::new(Instant::now()),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Advance time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut inst = self.instant.lock().unwrap();
        *inst += duration;
        let mut el = self.elapsed.lock().unwrap();
        *el += duration;
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.instant.lock().unwrap()
    }

    fn session_secs(&self) -> f64 {
        self.elapsed.lock().unwrap().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_system_clock_starts_near_zero() {
        let clock = SystemClock::new();
        let s = clock.session_secs();
        assert!(s >= 0.0);
        assert!(s < 1.0);
        // Monotonic: a second read is >= the first
        assert!(clock.session_secs() >= s);
    }

    #[test]
    fn test_test_clock_advance() {
        let clock = TestClock::new();
        assert_eq!(clock.session_secs(), 0.0);
        let t0 = clock.now();

        clock.advance(Duration::from_millis(2500));

        assert!((clock.session_secs() - 2.5).abs() < 1e-9);
        assert_eq!(clock.now() - t0, Duration::from_millis(2500));
    }

    #[test]
    fn test_clock_trait_object() {
        let clock: Arc<dyn Clock> = Arc::new(TestClock::new());
        assert_eq!(clock.session_secs(), 0.0);

        let sys: Arc<dyn Clock> = Arc::new(SystemClock::new());
        assert!(sys.session_secs() >= 0.0);
    }
}
