// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Offering queued tasks to render units.
//!
//! The dispatcher never polls. Every state change that might make new work
//! eligible (a task pushed, a task finished, a buffer acknowledged, an
//! accelerator becoming ready) calls [`Dispatcher::request_redispatch`],
//! which advances an epoch counter. Requests are level-triggered: any number
//! of requests made before a pass are served by that one pass, and a request
//! made during a pass guarantees another.
//!
//! One pass visits every registered display, every live layer with queued
//! work, and every unit of that display. A unit is offered the same layer
//! until it stops claiming, so inline units drain everything they can in one
//! go, while worker units take one task and report busy afterwards.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::display::Display;
use crate::output::DisplayId;
use crate::sync::Signal;
use crate::unit::DispatchOutcome;

/// What one dispatch pass achieved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Tasks claimed during the pass.
    pub claimed: usize,
    /// Offers a unit turned down because it was busy or not ready.
    pub deferred: usize,
}

impl PassReport {
    fn merge(&mut self, other: Self) {
        self.claimed += other.claimed;
        self.deferred += other.deferred;
    }
}

/// Drives render units across displays.
pub struct Dispatcher {
    displays: spin::Mutex<Vec<Arc<Display>>>,
    signal: Arc<Signal>,
    handled: AtomicUsize,
}

impl Dispatcher {
    /// Creates a dispatcher with no displays.
    #[must_use]
    pub fn new() -> Self {
        Self {
            displays: spin::Mutex::new(Vec::new()),
            signal: Arc::new(Signal::new()),
            handled: AtomicUsize::new(0),
        }
    }

    /// The wake signal shared with render units.
    pub(crate) fn signal(&self) -> &Arc<Signal> {
        &self.signal
    }

    /// Adds `display` to the set visited by each pass.
    pub fn register(&self, display: Arc<Display>) {
        let mut displays = self.displays.lock();
        if !displays.iter().any(|d| d.id() == display.id()) {
            displays.push(display);
        }
    }

    /// Stops dispatching `id`. Returns `false` if it was not registered.
    pub fn unregister(&self, id: DisplayId) -> bool {
        let mut displays = self.displays.lock();
        let before = displays.len();
        displays.retain(|d| d.id() != id);
        displays.len() != before
    }

    /// Number of registered displays.
    #[must_use]
    pub fn display_count(&self) -> usize {
        self.displays.lock().len()
    }

    /// Asks for another pass. Never blocks; safe from any thread.
    pub fn request_redispatch(&self) {
        self.signal.notify();
    }

    /// The request epoch; pass it to [`wait_for_request`](Self::wait_for_request).
    #[must_use]
    pub fn epoch(&self) -> usize {
        self.signal.epoch()
    }

    /// Runs one pass over every registered display.
    pub fn dispatch(&self) -> PassReport {
        self.handled.store(self.signal.epoch(), Ordering::Release);
        let displays = self.displays.lock().clone();
        let mut report = PassReport::default();
        for display in &displays {
            report.merge(dispatch_display(display));
        }
        report
    }

    /// Runs a pass only if a redispatch was requested since the last one.
    pub fn dispatch_pending(&self) -> Option<PassReport> {
        let epoch = self.signal.epoch();
        if self.handled.load(Ordering::Acquire) == epoch {
            return None;
        }
        Some(self.dispatch())
    }

    /// Waits until a redispatch is requested after epoch `seen`.
    ///
    /// Blocks with `std`, spins otherwise.
    pub fn wait_for_request(&self, seen: usize) -> usize {
        self.signal.wait_past(seen)
    }
}

/// One pass over the layers and units of a single display.
pub(crate) fn dispatch_display(display: &Display) -> PassReport {
    let units = display.units();
    let mut report = PassReport::default();
    if units.is_empty() {
        return report;
    }
    for layer in display.layers() {
        if layer.is_retired() || !layer.has_queued() {
            continue;
        }
        for unit in &units {
            loop {
                match unit.dispatch(&layer) {
                    Ok(DispatchOutcome::Claimed) => report.claimed += 1,
                    Ok(DispatchOutcome::Busy | DispatchOutcome::NotReady) => {
                        report.deferred += 1;
                        break;
                    }
                    Ok(DispatchOutcome::NothingAvailable) => break,
                    Err(e) => {
                        log::warn!("{}: unit {:?}: {e}", display.id(), unit.id());
                        display.record_dispatch_error(e);
                        break;
                    }
                }
            }
        }
    }
    report
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("displays", &self.display_count())
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}
