// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the refresh cycle.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! refresh cycle, render units, and flush handoff call at each stage. All
//! method bodies default to no-ops, so implementing only the events you care
//! about is fine.
//!
//! [`Tracer`] is a cloneable handle around an optional shared sink. Render
//! units running on worker threads emit through their own clone, so the sink
//! sits behind a [`spin::Mutex`]. When the `trace` feature is **off**, every
//! `Tracer` method compiles to nothing (zero overhead). When **on**, each
//! method performs a single `Option` branch before locking and dispatching.
//!
//! [`RefreshSummaryBuilder`] collects phase timestamps during a refresh and
//! produces a [`RefreshSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies.
//! - `trace-rich` (implies `trace`): gates [`DamageRect`] events and the
//!   corresponding `TraceSink` method.

use alloc::sync::Arc;

use crate::area::Area;
use crate::layer::LayerId;
use crate::output::DisplayId;
use crate::task::{TaskId, TaskKind};
use crate::time::HostTime;
use crate::unit::UnitId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a refresh is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Taking the merged dirty areas out of the tracker.
    Checkout,
    /// Painters pushing tasks.
    Paint,
    /// Dispatching tasks and waiting for them to finish.
    Render,
    /// Handing pixels to the flush target.
    Flush,
}

impl PhaseKind {
    /// All phases, in order.
    pub const ALL: [Self; 4] = [Self::Checkout, Self::Paint, Self::Render, Self::Flush];

    const fn index(self) -> usize {
        match self {
            Self::Checkout => 0,
            Self::Paint => 1,
            Self::Render => 2,
            Self::Flush => 3,
        }
    }
}

/// Lifecycle point of a draw task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStage {
    /// A unit claimed the task.
    Claimed,
    /// The task finished.
    Ready,
}

/// Lifecycle point of a flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlushStage {
    /// Pixels were handed to the flush target.
    Submit,
    /// The flush target acknowledged.
    Ready,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a refresh finds dirty areas to render.
#[derive(Clone, Copy, Debug)]
pub struct RefreshBeginEvent {
    /// Per-display refresh counter.
    pub refresh_index: u64,
    /// Which display.
    pub display: DisplayId,
    /// When the refresh started.
    pub timestamp: HostTime,
    /// Number of merged dirty areas.
    pub dirty_areas: u32,
    /// Pixels across the dirty areas.
    pub dirty_pixels: u64,
}

/// Marks the beginning of a refresh phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Per-display refresh counter.
    pub refresh_index: u64,
    /// Which display.
    pub display: DisplayId,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a refresh phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Per-display refresh counter.
    pub refresh_index: u64,
    /// Which display.
    pub display: DisplayId,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when a render unit claims or finishes a task.
#[derive(Clone, Copy, Debug)]
pub struct TaskEvent {
    /// Which display.
    pub display: DisplayId,
    /// Layer holding the task.
    pub layer: LayerId,
    /// The task.
    pub task: TaskId,
    /// Kind of the task.
    pub kind: TaskKind,
    /// Unit running the task.
    pub unit: UnitId,
    /// Claimed or ready.
    pub stage: TaskStage,
    /// When it happened.
    pub timestamp: HostTime,
}

/// Emitted when pixels are submitted or acknowledged.
#[derive(Clone, Copy, Debug)]
pub struct FlushEvent {
    /// Which display.
    pub display: DisplayId,
    /// Flushed area in display coordinates.
    pub area: Area,
    /// Whether this is the final flush of the refresh.
    pub is_last: bool,
    /// Submit or ready.
    pub stage: FlushStage,
    /// When it happened.
    pub timestamp: HostTime,
}

/// Emitted when a dirty set runs out of slots and collapses to full screen.
#[derive(Clone, Copy, Debug)]
pub struct DirtyOverflowEvent {
    /// Which display.
    pub display: DisplayId,
    /// Overflows so far on this display.
    pub overflow_count: u64,
    /// When it happened.
    pub timestamp: HostTime,
}

/// Per-refresh summary produced by [`RefreshSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct RefreshSummary {
    /// Per-display refresh counter.
    pub refresh_index: u64,
    /// Which display.
    pub display: DisplayId,
    /// When the refresh started.
    pub started: HostTime,
    /// When the refresh finished.
    pub finished: HostTime,
    /// Number of merged dirty areas.
    pub dirty_areas: u32,
    /// Pixels across the dirty areas.
    pub dirty_pixels: u64,
    /// Tasks run.
    pub tasks: u32,
    /// Flushes submitted.
    pub flushes: u32,
    /// Checkout phase duration in ticks (0 if not measured).
    pub checkout_ticks: u64,
    /// Paint phase duration in ticks, summed over passes.
    pub paint_ticks: u64,
    /// Render phase duration in ticks, summed over passes.
    pub render_ticks: u64,
    /// Flush phase duration in ticks, summed over passes.
    pub flush_ticks: u64,
}

/// An axis-aligned damage rectangle.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct DamageRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

#[cfg(feature = "trace-rich")]
impl From<&Area> for DamageRect {
    fn from(a: &Area) -> Self {
        Self {
            x: a.x1,
            y: a.y1,
            width: a.width().unsigned_abs(),
            height: a.height().unsigned_abs(),
        }
    }
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the refresh cycle.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a refresh with dirty areas starts.
    fn on_refresh_begin(&mut self, e: &RefreshBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a refresh phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a refresh phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a task is claimed or finished.
    fn on_task(&mut self, e: &TaskEvent) {
        _ = e;
    }

    /// Called when a flush is submitted or acknowledged.
    fn on_flush(&mut self, e: &FlushEvent) {
        _ = e;
    }

    /// Called when a dirty set overflows.
    fn on_dirty_overflow(&mut self, e: &DirtyOverflowEvent) {
        _ = e;
    }

    /// Called with a per-refresh summary.
    fn on_refresh_summary(&mut self, s: &RefreshSummary) {
        _ = s;
    }

    /// Called with the dirty areas of a refresh (requires `trace-rich`
    /// feature).
    #[cfg(feature = "trace-rich")]
    fn on_dirty_areas(&mut self, display: DisplayId, refresh_index: u64, rects: &[DamageRect]) {
        _ = (display, refresh_index, rects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer handle
// ---------------------------------------------------------------------------

/// Shared handle to an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
/// When **on**, each method checks the inner `Option` (one branch) before
/// locking the sink.
#[derive(Clone, Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Arc<spin::Mutex<dyn TraceSink + Send>>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! emit {
    ($self:ident, $method:ident, $($arg:expr),*) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &$self.sink {
            s.lock().$method($($arg),*);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = ($($arg),*);
        }
    }};
}

impl Tracer {
    /// Creates a tracer that dispatches to `sink`.
    ///
    /// Keep a clone of `sink` to read the sink back after tracing.
    #[inline]
    #[must_use]
    pub fn new<S: TraceSink + Send + 'static>(sink: Arc<spin::Mutex<S>>) -> Self {
        #[cfg(feature = "trace")]
        {
            let sink: Arc<spin::Mutex<dyn TraceSink + Send>> = sink;
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Shares `sink` and returns a tracer feeding it, plus the shared sink.
    #[must_use]
    pub fn with_sink<S: TraceSink + Send + 'static>(sink: S) -> (Self, Arc<spin::Mutex<S>>) {
        let shared = Arc::new(spin::Mutex::new(sink));
        (Self::new(Arc::clone(&shared)), shared)
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits a [`RefreshBeginEvent`].
    #[inline]
    pub fn refresh_begin(&self, e: &RefreshBeginEvent) {
        emit!(self, on_refresh_begin, e);
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&self, e: &PhaseBeginEvent) {
        emit!(self, on_phase_begin, e);
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&self, e: &PhaseEndEvent) {
        emit!(self, on_phase_end, e);
    }

    /// Emits a [`TaskEvent`].
    #[inline]
    pub fn task(&self, e: &TaskEvent) {
        emit!(self, on_task, e);
    }

    /// Emits a [`FlushEvent`].
    #[inline]
    pub fn flush(&self, e: &FlushEvent) {
        emit!(self, on_flush, e);
    }

    /// Emits a [`DirtyOverflowEvent`].
    #[inline]
    pub fn dirty_overflow(&self, e: &DirtyOverflowEvent) {
        emit!(self, on_dirty_overflow, e);
    }

    /// Emits a [`RefreshSummary`].
    #[inline]
    pub fn refresh_summary(&self, s: &RefreshSummary) {
        emit!(self, on_refresh_summary, s);
    }

    /// Emits dirty areas (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn dirty_areas(&self, display: DisplayId, refresh_index: u64, rects: &[DamageRect]) {
        if let Some(s) = &self.sink {
            s.lock().on_dirty_areas(display, refresh_index, rects);
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a refresh and produces a
/// [`RefreshSummary`].
///
/// Phases entered several times in one refresh (one render pass per band)
/// accumulate.
#[derive(Debug)]
pub struct RefreshSummaryBuilder {
    begin: RefreshBeginEvent,
    open: [Option<HostTime>; 4],
    ticks: [u64; 4],
    tasks: u32,
    flushes: u32,
}

impl RefreshSummaryBuilder {
    /// Starts building a summary for the given refresh.
    #[must_use]
    pub fn new(begin: &RefreshBeginEvent) -> Self {
        Self {
            begin: *begin,
            open: [None; 4],
            ticks: [0; 4],
            tasks: 0,
            flushes: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.open[phase.index()] = Some(t);
    }

    /// Records the end of a phase, adding its length to the total.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        if let Some(start) = self.open[phase.index()].take() {
            self.ticks[phase.index()] += t.saturating_duration_since(start).ticks();
        }
    }

    /// Adds finished tasks.
    pub fn add_tasks(&mut self, n: usize) {
        self.tasks = self.tasks.saturating_add(u32::try_from(n).unwrap_or(u32::MAX));
    }

    /// Counts one submitted flush.
    pub fn add_flush(&mut self) {
        self.flushes = self.flushes.saturating_add(1);
    }

    /// Consumes the builder and produces the final [`RefreshSummary`].
    #[must_use]
    pub fn finish(self, finished: HostTime) -> RefreshSummary {
        RefreshSummary {
            refresh_index: self.begin.refresh_index,
            display: self.begin.display,
            started: self.begin.timestamp,
            finished,
            dirty_areas: self.begin.dirty_areas,
            dirty_pixels: self.begin.dirty_pixels,
            tasks: self.tasks,
            flushes: self.flushes,
            checkout_ticks: self.ticks[PhaseKind::Checkout.index()],
            paint_ticks: self.ticks[PhaseKind::Paint.index()],
            render_ticks: self.ticks[PhaseKind::Render.index()],
            flush_ticks: self.ticks[PhaseKind::Flush.index()],
        }
    }
}
