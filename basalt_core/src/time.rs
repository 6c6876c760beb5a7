// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic tick time and clocks.
//!
//! [`HostTime`] is a point on a monotonic tick counter (a SysTick counter on a
//! microcontroller, `Instant` on a host). [`Timebase`] converts ticks to
//! nanoseconds for diagnostics. [`Clock`] is the source the engine reads
//! timestamps from; [`ManualClock`] is driven by hand for tests and
//! simulations.

use core::fmt;
use core::ops::{Add, Sub};
use core::sync::atomic::{AtomicU64, Ordering};

/// A point in time expressed as monotonic ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the duration since `earlier`, or zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// A span of ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({})", self.0)
    }
}

/// Rational conversion factor from ticks to nanoseconds.
///
/// `nanoseconds = ticks * numer / denom`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// Ticks are nanoseconds.
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Ticks are milliseconds (a typical 1 kHz `SysTick`).
    pub const MILLIS: Self = Self {
        numer: 1_000_000,
        denom: 1,
    };

    /// Converts a tick count to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn ticks_to_nanos(self, ticks: u64) -> u64 {
        (ticks as u128 * self.numer as u128 / self.denom as u128) as u64
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> HostTime;

    /// Returns the tick-to-nanosecond conversion for [`now`](Self::now).
    fn timebase(&self) -> Timebase {
        Timebase::NANOS
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
    timebase: Option<Timebase>,
}

impl ManualClock {
    /// Creates a clock starting at `start` with nanosecond ticks.
    #[must_use]
    pub const fn new(start: HostTime) -> Self {
        Self {
            ticks: AtomicU64::new(start.0),
            timebase: None,
        }
    }

    /// Creates a clock starting at `start` using the given timebase.
    #[must_use]
    pub const fn with_timebase(start: HostTime, timebase: Timebase) -> Self {
        Self {
            ticks: AtomicU64::new(start.0),
            timebase: Some(timebase),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.ticks.fetch_add(by.0, Ordering::Relaxed);
    }

    /// Jumps to an absolute time (never backwards).
    pub fn set(&self, to: HostTime) {
        self.ticks.fetch_max(to.0, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.ticks.load(Ordering::Relaxed))
    }

    fn timebase(&self) -> Timebase {
        self.timebase.unwrap_or(Timebase::NANOS)
    }
}

/// Nanosecond clock backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicClock {
    /// Creates a clock whose zero is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for MonotonicClock {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u64 nanoseconds cover centuries of uptime"
    )]
    fn now(&self) -> HostTime {
        HostTime(self.origin.elapsed().as_nanos() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_timebase() {
        assert_eq!(Timebase::MILLIS.ticks_to_nanos(3), 3_000_000);
        assert_eq!(Timebase::NANOS.ticks_to_nanos(3), 3);
    }

    #[test]
    fn manual_clock_is_monotonic() {
        let clock = ManualClock::new(HostTime(100));
        clock.advance(Duration(50));
        assert_eq!(clock.now(), HostTime(150));
        clock.set(HostTime(120));
        assert_eq!(clock.now(), HostTime(150), "set never moves backwards");
        clock.set(HostTime(400));
        assert_eq!(clock.now(), HostTime(400));
    }

    #[test]
    fn host_time_arithmetic() {
        let t = HostTime(1000);
        assert_eq!((t + Duration(200)).ticks(), 1200);
        assert_eq!(HostTime(1200) - t, Duration(200));
        assert_eq!(t.saturating_duration_since(HostTime(1500)), Duration::ZERO);
    }
}
