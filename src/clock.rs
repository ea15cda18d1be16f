/// Clock Abstraction
///
/// Both the breaker and the liveness monitor reason about monotonic time
/// (cooldown windows, cleanup sweeps, heartbeat deadlines) but never need
/// wall-clock time. Reading time through this trait instead of calling
/// `Instant::now()` directly lets tests substitute a virtual clock and
/// exercise minute- and hour-scale timeouts without real sleeps.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A source of monotonic time, measured in milliseconds since some
/// unspecified epoch. Only relative differences between two calls are
/// meaningful.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Production clock backed by `tokio::time::Instant` rather than
/// `std::time::Instant`: this keeps `now_millis()` in lockstep with
/// `tokio::time::sleep`/`timeout` under `tokio::time::pause()`, so a test
/// that fast-forwards the runtime's timer with `tokio::time::advance()`
/// also fast-forwards every cooldown/cleanup/disconnect comparison that
/// reads this clock.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Virtual clock for deterministic tests. Starts at zero and only moves
/// forward when explicitly advanced, so tests can assert cooldown and
/// cleanup behavior at exact boundaries instead of racing real time.
pub struct MockClock {
    millis: AtomicU64,
}

impl MockClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicU64::new(0),
        })
    }

    pub fn advance(&self, duration: Duration) {
        self.millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
