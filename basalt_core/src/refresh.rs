// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The refresh cycle.
//!
//! One call to [`refresh`] turns a display's dirty areas into flushed pixels:
//!
//! 1. **Checkout**: the merged dirty set is taken from the tracker; later
//!    invalidations start a fresh set for the next refresh.
//! 2. **Paint**: for each region to render, a draw buffer is bound to the
//!    base layer and the display's [`Painter`] pushes draw tasks for it.
//! 3. **Render**: the region's tasks are dispatched to the display's render
//!    units until every layer is drained. The cycle sleeps on the dispatcher
//!    signal in between; it never spins on task state.
//! 4. **Flush**: the buffer is handed to the flush target.
//!
//! How regions map onto buffers depends on the [`RenderMode`]. Partial mode
//! splits each dirty area into bands that fit the draw buffer and flushes
//! band by band. Direct mode keeps a screen-sized buffer, redraws each dirty
//! area in place and flushes it; with two buffers, areas drawn in the
//! previous refresh are first copied over from the other buffer so both stay
//! current. Full mode redraws the whole screen into a screen-sized buffer.
//!
//! If rendering fails (a layer buffer cannot be allocated, a unit breaks
//! protocol, nothing can run the queued tasks), the cycle lets in-progress
//! tasks finish, discards the rest, returns the draw buffer to its slot, and
//! marks the dirty areas dirty again so a later refresh can retry.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::area::Area;
use crate::buffer::PixelBuffer;
use crate::dispatch::{Dispatcher, dispatch_display};
use crate::display::{Display, DisplayEvent, RenderMode};
use crate::error::RenderError;
use crate::flush::{FlushTarget, WaitCallback};
use crate::invalidate::DirtySet;
use crate::layer::Layer;
use crate::task::TaskState;
use crate::time::HostTime;
use crate::trace::{PhaseBeginEvent, PhaseEndEvent, PhaseKind, RefreshBeginEvent, RefreshSummaryBuilder};

/// Pushes draw tasks for a region of the screen.
///
/// Called once per band (partial mode) or dirty area (direct mode) with the
/// base layer already bound to the draw buffer. Painters may create
/// transient layers with [`Display::create_layer`] and composite them onto
/// `layer`.
pub trait Painter: Send + Sync {
    /// Pushes the tasks that redraw `area`.
    fn paint(&self, display: &Display, layer: &Arc<Layer>, area: &Area);
}

impl<F> Painter for F
where
    F: Fn(&Display, &Arc<Layer>, &Area) + Send + Sync,
{
    fn paint(&self, display: &Display, layer: &Arc<Layer>, area: &Area) {
        self(display, layer, area);
    }
}

/// What a refresh did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Index of this refresh on its display.
    pub refresh_index: u64,
    /// Dirty areas that were rendered.
    pub dirty: DirtySet,
    /// Draw tasks run.
    pub tasks: usize,
    /// Frames handed to the flush target.
    pub flushes: usize,
}

impl RefreshReport {
    /// Returns `true` if there was nothing to redraw.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.dirty.is_empty()
    }
}

/// Refreshes `display`: renders its dirty areas and flushes them.
///
/// Returns once the last frame has been submitted; the flush target may
/// still be writing it out. Rendering waits for the draw buffer to come back
/// from the hardware when needed.
///
/// Refreshing a display that is already being refreshed is a protocol
/// violation.
pub fn refresh(display: &Display, dispatcher: &Dispatcher) -> Result<RefreshReport, RenderError> {
    let index = display.begin_refresh()?;
    let result = run(display, dispatcher, index);
    display.end_refresh(result.as_ref().is_ok_and(|r| !r.is_idle()));
    result
}

fn run(display: &Display, dispatcher: &Dispatcher, index: u64) -> Result<RefreshReport, RenderError> {
    let clock = &display.env().clock;
    let checkout_start = clock.now();
    let dirty = display.checkout_dirty();
    let checkout_end = clock.now();
    if dirty.is_empty() {
        return Ok(RefreshReport {
            refresh_index: index,
            ..RefreshReport::default()
        });
    }
    let Some(target) = display.flush_target() else {
        log::warn!("{}: dirty but no flush target", display.id());
        requeue(display, &dirty);
        return Err(RenderError::NoFlushTarget(display.id()));
    };

    let mut cycle = Cycle::new(display, dispatcher, target, index, &dirty);
    cycle.checkout_phase(checkout_start, checkout_end);
    display.emit(&DisplayEvent::RenderStart);

    let rendered = match display.render_mode() {
        RenderMode::Partial => cycle.partial(&dirty),
        RenderMode::Direct => cycle.direct(dirty.areas(), true),
        RenderMode::Full => cycle.direct(&[display.screen_area()], false),
    };
    match rendered {
        Ok(()) => {
            cycle.finish();
            Ok(RefreshReport {
                refresh_index: index,
                tasks: cycle.tasks,
                flushes: cycle.flushes,
                dirty,
            })
        }
        Err(e) => {
            log::warn!("{}: refresh {index} failed: {e}", display.id());
            cycle.abort(&dirty);
            Err(e)
        }
    }
}

/// Marks `dirty` for redraw again.
fn requeue(display: &Display, dirty: &DirtySet) {
    display.restore_dirty(dirty);
}

fn in_progress(display: &Display) -> bool {
    display
        .layers()
        .iter()
        .any(|l| l.task_count(TaskState::InProgress) > 0)
}

fn dim(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

struct Cycle<'a> {
    display: &'a Display,
    dispatcher: &'a Dispatcher,
    target: Arc<dyn FlushTarget>,
    wait: Option<Arc<WaitCallback<'static>>>,
    painter: Option<Arc<dyn Painter>>,
    base: Arc<Layer>,
    index: u64,
    summary: Option<RefreshSummaryBuilder>,
    /// Slot of the draw buffer currently bound to the base layer.
    held: Option<usize>,
    tasks: usize,
    flushes: usize,
}

impl<'a> Cycle<'a> {
    fn new(
        display: &'a Display,
        dispatcher: &'a Dispatcher,
        target: Arc<dyn FlushTarget>,
        index: u64,
        dirty: &DirtySet,
    ) -> Self {
        let painter = display.painter();
        if painter.is_none() {
            log::debug!("{}: no painter, flushing buffer contents as they are", display.id());
        }
        let tracer = &display.env().tracer;
        let summary = tracer.is_enabled().then(|| {
            let begin = RefreshBeginEvent {
                refresh_index: index,
                display: display.id(),
                timestamp: display.env().clock.now(),
                dirty_areas: u32::try_from(dirty.len()).unwrap_or(u32::MAX),
                dirty_pixels: dirty.pixel_count(),
            };
            tracer.refresh_begin(&begin);
            #[cfg(feature = "trace-rich")]
            {
                let rects: Vec<_> = dirty.areas().iter().map(crate::trace::DamageRect::from).collect();
                tracer.dirty_areas(display.id(), index, &rects);
            }
            RefreshSummaryBuilder::new(&begin)
        });
        Self {
            display,
            dispatcher,
            target,
            wait: display.wait_callback(),
            painter,
            base: display.base_layer(),
            index,
            summary,
            held: None,
            tasks: 0,
            flushes: 0,
        }
    }

    // --- modes ----------------------------------------------------------

    fn partial(&mut self, dirty: &DirtySet) -> Result<(), RenderError> {
        let areas = dirty.areas();
        let buffer_pixels = self.display.buffer_pixels();
        for (i, area) in areas.iter().enumerate() {
            let width = usize::try_from(area.width()).unwrap_or(1).max(1);
            let rows = i32::try_from(buffer_pixels / width).unwrap_or(i32::MAX);
            let mut bands = area.rows(rows).peekable();
            while let Some(band) = bands.next() {
                let last = i + 1 == areas.len() && bands.peek().is_none();
                self.band(band, last)?;
            }
        }
        Ok(())
    }

    fn band(&mut self, band: Area, last: bool) -> Result<(), RenderError> {
        let (slot, mut pixels) = self.take_buffer();
        if let Err(e) = pixels.reshape(self.display.color_format(), dim(band.width()), dim(band.height())) {
            self.display.handoff.restore(slot, pixels);
            return Err(e.into());
        }
        self.base.bind(pixels, band, band);
        self.held = Some(slot);
        self.draw(&band)?;

        let mut pixels = self.release_base();
        if let Some(to) = self.display.flush_format()
            && let Err(e) = pixels.convert(to)
        {
            self.display.handoff.restore(slot, pixels);
            return Err(e.into());
        }
        self.submit(slot, pixels, band, last, true)
    }

    fn direct(&mut self, areas: &[Area], sync: bool) -> Result<(), RenderError> {
        let display = self.display;
        let screen = display.screen_area();
        let (slot, mut pixels) = self.take_buffer();
        if let Err(e) = pixels.reshape(display.color_format(), dim(screen.width()), dim(screen.height())) {
            display.handoff.restore(slot, pixels);
            return Err(e.into());
        }
        if sync {
            let previous = display.swap_previous_areas(areas.to_vec());
            if display.is_double_buffered() {
                self.sync_from_other(&mut pixels, &previous, areas);
            }
        }
        self.base.bind(pixels, screen, screen);
        self.held = Some(slot);

        for (i, area) in areas.iter().enumerate() {
            let last = i + 1 == areas.len();
            self.base.set_clip_area(*area);
            self.draw(area)?;
            let pixels = self.release_base();
            // Only the final area swaps; the others flush from the same
            // buffer, which comes back once acknowledged.
            self.submit(slot, pixels, *area, last, last)?;
            if !last {
                let (again, pixels) = self.take_buffer();
                self.base.bind(pixels, screen, screen);
                self.held = Some(again);
            }
        }
        Ok(())
    }

    /// Copies areas drawn into the other buffer by the previous refresh and
    /// not about to be redrawn.
    fn sync_from_other(&self, pixels: &mut PixelBuffer, previous: &[Area], current: &[Area]) {
        let stale: Vec<Area> = previous
            .iter()
            .filter(|p| !current.iter().any(|c| c.contains(p)))
            .copied()
            .collect();
        if stale.is_empty() {
            return;
        }
        self.display
            .handoff
            .with_inactive(self.wait.as_deref(), |other| {
                let Some(other) = other else { return };
                for area in &stale {
                    if !pixels.copy_from(area, other, area) {
                        log::warn!("{}: draw buffers differ in format, cannot sync", self.display.id());
                        return;
                    }
                }
            });
    }

    // --- steps ----------------------------------------------------------

    /// Paints `area` into the bound buffer and waits for its tasks.
    fn draw(&mut self, area: &Area) -> Result<(), RenderError> {
        if self.display.is_transparent() {
            self.base.clear_area(area);
        }
        self.phase(PhaseKind::Paint, |c| {
            if let Some(painter) = &c.painter {
                painter.paint(c.display, &c.base, area);
            }
        });
        self.phase(PhaseKind::Render, Self::drain)?;
        for layer in self.display.layers() {
            layer.remove_ready();
        }
        self.display.prune_layers(false);
        self.display.emit(&DisplayEvent::RenderReady);
        Ok(())
    }

    /// Dispatches until every layer is drained.
    fn drain(&mut self) -> Result<(), RenderError> {
        let display = self.display;
        loop {
            let seen = self.dispatcher.epoch();
            let pass = dispatch_display(display);
            self.tasks += pass.claimed;
            if let Some(summary) = &mut self.summary {
                summary.add_tasks(pass.claimed);
            }
            if let Some(e) = display.take_dispatch_error() {
                return Err(e);
            }
            if display.is_drained() {
                return Ok(());
            }
            if pass.claimed == 0 && pass.deferred == 0 && !in_progress(display) {
                log::error!("{}: queued tasks but no render unit takes them", display.id());
                return Err(RenderError::NoRenderUnits(display.id()));
            }
            self.dispatcher.wait_for_request(seen);
        }
    }

    fn submit(
        &mut self,
        slot: usize,
        pixels: PixelBuffer,
        area: Area,
        last: bool,
        swap: bool,
    ) -> Result<(), RenderError> {
        let physical = self.display.physical_area(&area);
        self.phase(PhaseKind::Flush, |c| {
            // With two buffers the previous frame may still be on the wire.
            c.display.handoff.wait_idle(c.wait.as_deref());
            c.display
                .handoff
                .submit(&*c.target, slot, pixels, area, physical, last, swap)
        })?;
        self.flushes += 1;
        if let Some(summary) = &mut self.summary {
            summary.add_flush();
        }
        Ok(())
    }

    fn take_buffer(&self) -> (usize, PixelBuffer) {
        self.display.handoff.take_buffer(self.wait.as_deref())
    }

    /// Detaches the draw buffer from the base layer.
    fn release_base(&mut self) -> PixelBuffer {
        self.held = None;
        self.base.unbind().unwrap_or_else(|| {
            // Only a resolution change in the middle of a refresh gets here.
            log::error!("{}: draw buffer lost during refresh, replacing it", self.display.id());
            let pixels = u32::try_from(self.display.buffer_pixels()).unwrap_or(u32::MAX);
            PixelBuffer::new(self.display.color_format(), pixels, 1)
        })
    }

    // --- completion -----------------------------------------------------

    fn finish(&mut self) {
        self.display.prune_layers(true);
        self.base.resize(self.display.screen_area());
        self.emit_summary();
    }

    fn abort(&mut self, dirty: &DirtySet) {
        let display = self.display;
        loop {
            let seen = self.dispatcher.epoch();
            if !in_progress(display) {
                break;
            }
            self.dispatcher.wait_for_request(seen);
        }
        let mut dropped = 0;
        for layer in display.layers() {
            dropped += layer.discard_queued();
            layer.remove_ready();
        }
        if dropped > 0 {
            log::debug!("{}: discarded {dropped} queued tasks", display.id());
        }
        display.prune_layers(true);
        _ = display.take_dispatch_error();
        if let Some(slot) = self.held.take()
            && let Some(pixels) = self.base.unbind()
        {
            display.handoff.restore(slot, pixels);
        }
        self.base.resize(display.screen_area());
        requeue(display, dirty);
        self.emit_summary();
    }

    // --- tracing --------------------------------------------------------

    fn phase<R>(&mut self, kind: PhaseKind, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.summary.is_none() {
            return f(self);
        }
        let start = self.display.env().clock.now();
        self.mark(kind, start, true);
        let result = f(self);
        let end = self.display.env().clock.now();
        self.mark(kind, end, false);
        result
    }

    fn checkout_phase(&mut self, start: HostTime, end: HostTime) {
        if self.summary.is_some() {
            self.mark(PhaseKind::Checkout, start, true);
            self.mark(PhaseKind::Checkout, end, false);
        }
    }

    fn mark(&mut self, phase: PhaseKind, timestamp: HostTime, begin: bool) {
        let Some(summary) = &mut self.summary else {
            return;
        };
        let tracer = &self.display.env().tracer;
        let (refresh_index, display) = (self.index, self.display.id());
        if begin {
            summary.phase_begin(phase, timestamp);
            tracer.phase_begin(&PhaseBeginEvent {
                refresh_index,
                display,
                phase,
                timestamp,
            });
        } else {
            summary.phase_end(phase, timestamp);
            tracer.phase_end(&PhaseEndEvent {
                refresh_index,
                display,
                phase,
                timestamp,
            });
        }
    }

    fn emit_summary(&mut self) {
        if let Some(summary) = self.summary.take() {
            let finished = self.display.env().clock.now();
            self.display
                .env()
                .tracer
                .refresh_summary(&summary.finish(finished));
        }
    }
}

impl fmt::Debug for Cycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cycle")
            .field("display", &self.display.id())
            .field("index", &self.index)
            .field("tasks", &self.tasks)
            .field("flushes", &self.flushes)
            .finish_non_exhaustive()
    }
}
