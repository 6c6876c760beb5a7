// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].

use std::io::Write;

use basalt_core::area::Area;
use basalt_core::output::DisplayId;
use basalt_core::time::{HostTime, Timebase};
use basalt_core::trace::{
    DamageRect, DirtyOverflowEvent, FlushEvent, FlushStage, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, RefreshBeginEvent, RefreshSummary, TaskEvent, TaskStage, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns the writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn ticks_to_us(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_nanos(ticks) as f64 / 1000.0
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.ticks_to_us(t.ticks())
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Checkout => "checkout",
        PhaseKind::Paint => "paint",
        PhaseKind::Render => "render",
        PhaseKind::Flush => "flush",
    }
}

fn area(a: &Area) -> String {
    format!("({},{})..({},{})", a.x1, a.y1, a.x2, a.y2)
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_refresh_begin(&mut self, e: &RefreshBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[refresh] #{} display={} at {:.1}µs dirty={} ({} px)",
            e.refresh_index,
            e.display.0,
            self.host_us(e.timestamp),
            e.dirty_areas,
            e.dirty_pixels,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] #{} {} at {:.1}µs",
            e.refresh_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] #{} {} at {:.1}µs",
            e.refresh_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_task(&mut self, e: &TaskEvent) {
        let stage = match e.stage {
            TaskStage::Claimed => "claimed",
            TaskStage::Ready => "ready",
        };
        let _ = writeln!(
            self.writer,
            "[task:{stage}] display={} layer={} task={} {:?} unit={} at {:.1}µs",
            e.display.0,
            e.layer.0,
            e.task.0,
            e.kind,
            e.unit.0,
            self.host_us(e.timestamp),
        );
    }

    fn on_flush(&mut self, e: &FlushEvent) {
        let stage = match e.stage {
            FlushStage::Submit => "submit",
            FlushStage::Ready => "ready",
        };
        let last = if e.is_last { " last" } else { "" };
        let _ = writeln!(
            self.writer,
            "[flush:{stage}] display={} {}{last} at {:.1}µs",
            e.display.0,
            area(&e.area),
            self.host_us(e.timestamp),
        );
    }

    fn on_dirty_overflow(&mut self, e: &DirtyOverflowEvent) {
        let _ = writeln!(
            self.writer,
            "[overflow] display={} count={} at {:.1}µs",
            e.display.0,
            e.overflow_count,
            self.host_us(e.timestamp),
        );
    }

    fn on_refresh_summary(&mut self, s: &RefreshSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] #{} display={} tasks={} flushes={} checkout={:.1}µs \
             paint={:.1}µs render={:.1}µs flush={:.1}µs total={:.1}µs",
            s.refresh_index,
            s.display.0,
            s.tasks,
            s.flushes,
            self.ticks_to_us(s.checkout_ticks),
            self.ticks_to_us(s.paint_ticks),
            self.ticks_to_us(s.render_ticks),
            self.ticks_to_us(s.flush_ticks),
            self.ticks_to_us(s.finished.ticks().saturating_sub(s.started.ticks())),
        );
    }

    fn on_dirty_areas(&mut self, display: DisplayId, refresh_index: u64, rects: &[DamageRect]) {
        let _ = writeln!(
            self.writer,
            "[dirty] #{refresh_index} display={} areas={}",
            display.0,
            rects.len(),
        );
    }
}
