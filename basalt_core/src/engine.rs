// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine: owner of displays and the dispatcher.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::dispatch::Dispatcher;
use crate::display::{Display, DisplayConfig, Env};
use crate::error::{ConfigError, RenderError};
use crate::output::DisplayId;
use crate::refresh::{self, RefreshReport};
use crate::time::{Clock, HostTime};
use crate::trace::Tracer;

/// Creates displays and drives their refreshes.
///
/// ```
/// use basalt_core::area::Area;
/// use basalt_core::display::DisplayConfig;
/// use basalt_core::engine::Engine;
/// use basalt_core::flush::FlushFrame;
/// use basalt_core::renderer::Renderers;
/// use basalt_core::unit::ExecutionMode;
///
/// let engine = Engine::new();
/// let display = engine.create_display(DisplayConfig::partial(64, 32, 8)).unwrap();
/// display.add_software_unit(Renderers::new(), ExecutionMode::Inline);
/// display.set_flush_target(|frame: FlushFrame| frame.ready());
///
/// display.invalidate(&Area::new(0, 0, 63, 15));
/// let report = engine.refresh(&display).unwrap();
/// assert_eq!(report.flushes, 2);
/// ```
pub struct Engine {
    dispatcher: Dispatcher,
    displays: spin::Mutex<Vec<Arc<Display>>>,
    next_display: AtomicU32,
    clock: Arc<dyn Clock>,
    tracer: Tracer,
}

impl Engine {
    /// Creates an engine with the default clock and no tracing.
    ///
    /// The default clock is [`MonotonicClock`](crate::time::MonotonicClock)
    /// with `std` and a [`ManualClock`](crate::time::ManualClock) stuck at
    /// zero otherwise.
    #[must_use]
    pub fn new() -> Self {
        #[cfg(feature = "std")]
        let clock: Arc<dyn Clock> = Arc::new(crate::time::MonotonicClock::new());
        #[cfg(not(feature = "std"))]
        let clock: Arc<dyn Clock> = Arc::new(crate::time::ManualClock::default());
        Self {
            dispatcher: Dispatcher::new(),
            displays: spin::Mutex::new(Vec::new()),
            next_display: AtomicU32::new(0),
            clock,
            tracer: Tracer::none(),
        }
    }

    /// Uses `clock` for timestamps. Affects displays created afterwards.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sends trace events to `tracer`. Affects displays created afterwards.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// The current time on the engine's clock.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.now()
    }

    /// The dispatcher shared by all displays.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Creates a display and registers it for dispatch.
    pub fn create_display(&self, config: DisplayConfig) -> Result<Arc<Display>, ConfigError> {
        let id = DisplayId(self.next_display.fetch_add(1, Ordering::Relaxed));
        let env = Env {
            signal: Arc::clone(self.dispatcher.signal()),
            tracer: self.tracer.clone(),
            clock: Arc::clone(&self.clock),
        };
        let display = Arc::new(Display::new(id, &config, env)?);
        self.displays.lock().push(Arc::clone(&display));
        self.dispatcher.register(Arc::clone(&display));
        log::info!("created {id}");
        Ok(display)
    }

    /// Removes a display; it is no longer dispatched or refreshed.
    pub fn remove_display(&self, id: DisplayId) -> Option<Arc<Display>> {
        self.dispatcher.unregister(id);
        let mut displays = self.displays.lock();
        let at = displays.iter().position(|d| d.id() == id)?;
        log::info!("removed {id}");
        Some(displays.remove(at))
    }

    /// Looks up a display.
    #[must_use]
    pub fn display(&self, id: DisplayId) -> Option<Arc<Display>> {
        self.displays.lock().iter().find(|d| d.id() == id).cloned()
    }

    /// Every display, in creation order.
    #[must_use]
    pub fn displays(&self) -> Vec<Arc<Display>> {
        self.displays.lock().clone()
    }

    /// Refreshes one display. A removed display reports an idle refresh.
    pub fn refresh(&self, display: &Display) -> Result<RefreshReport, RenderError> {
        if self.display(display.id()).is_none() {
            log::debug!("{}: not managed by this engine, skipping refresh", display.id());
            return Ok(RefreshReport::default());
        }
        refresh::refresh(display, &self.dispatcher)
    }

    /// Refreshes every display in turn.
    pub fn refresh_all(&self) -> Vec<(DisplayId, Result<RefreshReport, RenderError>)> {
        self.displays()
            .iter()
            .map(|d| (d.id(), refresh::refresh(d, &self.dispatcher)))
            .collect()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("displays", &self.displays.lock().len())
            .field("dispatcher", &self.dispatcher)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;

    #[test]
    fn display_ids_are_unique_and_removal_sticks() {
        let engine = Engine::new();
        let a = engine.create_display(DisplayConfig::partial(8, 8, 2)).unwrap();
        let b = engine.create_display(DisplayConfig::partial(8, 8, 2)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(engine.dispatcher().display_count(), 2);

        assert!(engine.remove_display(a.id()).is_some());
        assert!(engine.display(a.id()).is_none());
        assert_eq!(engine.dispatcher().display_count(), 1);

        a.invalidate(&Area::new(0, 0, 3, 3));
        let report = engine.refresh(&a).unwrap();
        assert!(report.is_idle(), "removed display is not refreshed");
    }

    #[test]
    fn bad_config_is_rejected() {
        let engine = Engine::new();
        assert!(matches!(
            engine.create_display(DisplayConfig::partial(0, 8, 2)),
            Err(ConfigError::ZeroResolution { .. })
        ));
        assert!(engine.displays().is_empty());
    }
}
