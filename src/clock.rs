//! The narrow time source the timing wheel consumes (spec §6, "Time
//! source"): a wall clock for the start-time anchor, and a monotonic
//! clock in centiseconds that the wheel polls from `advance()`.
//!
//! The teacher has no analog (its `clock.rs` reads a hardware tick
//! counter directly), so this module is grounded on the original
//! `skynet_timer.c`'s `systime()`/`gettime()` pair, re-expressed as a
//! trait so tests can supply a deterministic clock instead of
//! `SystemTime`/`Instant`.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Centiseconds per second (one tick, spec GLOSSARY "Tick").
pub const CENTIS_PER_SEC: u64 = 100;

pub trait Clock: Send + Sync {
    /// Wall-clock seconds and the centisecond remainder, taken once at
    /// wheel initialization (`skynet_timer_init`'s `systime()` call).
    fn wall_clock_now(&self) -> (u32, u32);

    /// Monotonic centiseconds since an arbitrary, clock-specific epoch.
    /// Must be non-decreasing across calls in the absence of a clock
    /// regression; the wheel tolerates (but logs) regressions rather than
    /// trusting this invariant (spec §6, §7).
    fn monotonic_centis(&self) -> u64;
}

/// The real system clock, backed by `SystemTime` (wall clock) and
/// `Instant` (monotonic), matching `CLOCK_REALTIME`/`CLOCK_MONOTONIC` in
/// the source system's `systime()`/`gettime()`.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
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
    fn wall_clock_now(&self) -> (u32, u32) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        (now.as_secs() as u32, (now.subsec_millis() / 10) as u32)
    }

    fn monotonic_centis(&self) -> u64 {
        let elapsed = self.epoch.elapsed();
        elapsed.as_secs() * CENTIS_PER_SEC + u64::from(elapsed.subsec_millis()) / 10
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A clock whose monotonic reading is advanced explicitly by tests,
    /// one "tick" (one centisecond) at a time.
    pub(crate) struct MockClock {
        centis: AtomicU64,
    }

    impl MockClock {
        pub(crate) fn new(start: u64) -> Self {
            MockClock {
                centis: AtomicU64::new(start),
            }
        }

        pub(crate) fn advance(&self, centis: u64) {
            self.centis.fetch_add(centis, Ordering::SeqCst);
        }

        pub(crate) fn rewind_to(&self, centis: u64) {
            self.centis.store(centis, Ordering::SeqCst);
        }
    }

    impl Clock for MockClock {
        fn wall_clock_now(&self) -> (u32, u32) {
            (0, 0)
        }

        fn monotonic_centis(&self) -> u64 {
            self.centis.load(Ordering::SeqCst)
        }
    }
}
