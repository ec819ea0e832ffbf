//! Throttle
//!
//! Rate-limits a burst of calls to at most one delivery per interval.
//!
//! # Semantics
//!
//! - The first call after a quiet period is delivered immediately (leading
//!   edge).
//! - Calls that arrive while the interval is still running are held; each
//!   replaces the previous held call.
//! - When the interval runs out, the held call is delivered (trailing edge)
//!   and starts a new interval.
//!
//! The throttle never reads a clock itself. Callers pass `now` in, which
//! keeps it deterministic under test; [`Clock`] exists for callers that want
//! to abstract over where `now` comes from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The system monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// The tokio clock, which can be paused and advanced in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Leading- and trailing-edge throttle over values of type `T`.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    last_fired: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Offer a value at `now`.
    ///
    /// Returns the value back if it should be delivered right away. Otherwise
    /// it is held for trailing delivery through [`poll`](Self::poll).
    pub fn call(&mut self, value: T, now: Instant) -> Option<T> {
        if self.window_open(now) {
            // Anything still held is older than this call.
            self.pending = None;
            self.last_fired = Some(now);
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Deliver the held value if its interval has run out.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.window_open(now) {
            self.last_fired = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// When the held value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        Some(match self.last_fired {
            Some(last) => last + self.interval,
            None => Instant::now(),
        })
    }

    /// Whether a value is waiting for trailing delivery.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn window_open(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}
