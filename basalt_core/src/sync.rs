// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Level-triggered wake signal.
//!
//! A [`Signal`] is a monotonically increasing epoch. [`notify`](Signal::notify)
//! bumps the epoch and wakes every waiter; a waiter remembers the epoch it has
//! already handled and [`wait_past`](Signal::wait_past) returns as soon as the
//! epoch differs. A notification that lands between reading the epoch and
//! starting to wait is therefore never lost, and several notifications
//! collapse into one wake-up.
//!
//! With the `std` feature waiters block on a condition variable. Without it
//! they spin, calling an optional idle hook on every round.

use core::sync::atomic::{AtomicUsize, Ordering};

/// A notify-all epoch counter.
#[derive(Debug, Default)]
pub struct Signal {
    epoch: AtomicUsize,
    #[cfg(feature = "std")]
    lock: std::sync::Mutex<()>,
    #[cfg(feature = "std")]
    cond: std::sync::Condvar,
}

impl Signal {
    /// Creates a signal at epoch zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current epoch.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> usize {
        self.epoch.load(Ordering::Acquire)
    }

    /// Advances the epoch and wakes all waiters.
    pub fn notify(&self) {
        #[cfg(feature = "std")]
        {
            let _guard = self
                .lock
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            self.epoch.fetch_add(1, Ordering::AcqRel);
            self.cond.notify_all();
        }
        #[cfg(not(feature = "std"))]
        {
            self.epoch.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Waits until the epoch differs from `seen` and returns the new epoch.
    pub fn wait_past(&self, seen: usize) -> usize {
        #[cfg(feature = "std")]
        {
            let mut guard = self
                .lock
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            loop {
                let now = self.epoch();
                if now != seen {
                    return now;
                }
                guard = self
                    .cond
                    .wait(guard)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
        }
        #[cfg(not(feature = "std"))]
        {
            self.wait_past_with(seen, &core::hint::spin_loop)
        }
    }

    /// Waits until the epoch differs from `seen`, calling `idle` between
    /// checks instead of blocking.
    ///
    /// `idle` is expected to yield or sleep briefly; it must return.
    pub fn wait_past_with(&self, seen: usize, idle: &dyn Fn()) -> usize {
        loop {
            let now = self.epoch();
            if now != seen {
                return now;
            }
            idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    #[test]
    fn notifications_before_waiting_are_not_lost() {
        let s = Signal::new();
        let seen = s.epoch();
        s.notify();
        s.notify();
        assert_eq!(s.wait_past(seen), seen + 2, "both notifies collapse");
    }

    #[test]
    fn idle_hook_runs_until_notified() {
        let s = Signal::new();
        let rounds = Cell::new(0);
        let seen = s.epoch();
        let got = s.wait_past_with(seen, &|| {
            rounds.set(rounds.get() + 1);
            if rounds.get() == 3 {
                s.notify();
            }
        });
        assert_eq!(got, seen + 1);
        assert_eq!(rounds.get(), 3);
    }

    #[cfg(feature = "std")]
    #[test]
    fn wakes_a_blocked_thread() {
        use std::sync::Arc;

        let s = Arc::new(Signal::new());
        let seen = s.epoch();
        let waiter = {
            let s = Arc::clone(&s);
            std::thread::spawn(move || s.wait_past(seen))
        };
        std::thread::sleep(std::time::Duration::from_millis(10));
        s.notify();
        assert_eq!(waiter.join().unwrap(), seen + 1);
    }
}
