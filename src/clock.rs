//! Wall-clock sources
//!
//! Everything that needs "now" asks a [`Clock`] so the countdown and the
//! scheduler can be driven by a fake clock in tests and simulations.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Local;

use crate::types::{Millis, ms_from_midnight};

/// Source of the current local time of day.
pub trait Clock: Send + Sync {
    /// Milliseconds since local midnight, truncated to whole seconds.
    fn now_ms_from_midnight(&self) -> Millis;
}

/// The host's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now_ms_from_midnight(&self) -> Millis {
        ms_from_midnight(&Local::now())
    }
}

/// A settable clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: Millis) -> Self {
        Self { now: Arc::new(AtomicI64::new(now)) }
    }

    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Millis) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms_from_midnight(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms_from_midnight(&self) -> Millis {
        (**self).now_ms_from_midnight()
    }
}
