// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Each display becomes a process. Refresh phases are duration slices on
//! thread 0, render units get one thread each (`unit + 1`), and flushes are
//! async slices keyed by display.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use basalt_core::time::Timebase;
use basalt_core::trace::{FlushStage, TaskStage};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Timestamps are converted to microseconds using the provided [`Timebase`].
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::RefreshBegin(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RefreshBegin",
                    "cat": "Refresh",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": e.display.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "refresh_index": e.refresh_index,
                        "dirty_areas": e.dirty_areas,
                        "dirty_pixels": e.dirty_pixels,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.phase),
                    "cat": "Refresh",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": e.display.0,
                    "tid": 0,
                    "args": {
                        "refresh_index": e.refresh_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.phase),
                    "cat": "Refresh",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": e.display.0,
                    "tid": 0,
                    "args": {
                        "refresh_index": e.refresh_index,
                    }
                }));
            }
            RecordedEvent::Task(e) => {
                let ph = match e.stage {
                    TaskStage::Claimed => "B",
                    TaskStage::Ready => "E",
                };
                events.push(json!({
                    "ph": ph,
                    "name": format!("{:?}", e.kind),
                    "cat": "Task",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": e.display.0,
                    "tid": u64::from(e.unit.0) + 1,
                    "args": {
                        "layer": e.layer.0,
                        "task": e.task.0,
                    }
                }));
            }
            RecordedEvent::Flush(e) => {
                let ph = match e.stage {
                    FlushStage::Submit => "b",
                    FlushStage::Ready => "e",
                };
                events.push(json!({
                    "ph": ph,
                    "name": "Flush",
                    "cat": "Flush",
                    "id": e.display.0,
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": e.display.0,
                    "tid": 0,
                    "args": {
                        "area": [e.area.x1, e.area.y1, e.area.x2, e.area.y2],
                        "is_last": e.is_last,
                    }
                }));
            }
            RecordedEvent::DirtyOverflow(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "DirtyOverflow",
                    "cat": "Invalidate",
                    "ts": ticks_to_us(e.timestamp.ticks(), timebase),
                    "pid": e.display.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "overflow_count": e.overflow_count,
                    }
                }));
            }
            RecordedEvent::RefreshSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "RefreshSummary",
                    "cat": "Summary",
                    "ts": ticks_to_us(s.finished.ticks(), timebase),
                    "pid": s.display.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "refresh_index": s.refresh_index,
                        "dirty_areas": s.dirty_areas,
                        "dirty_pixels": s.dirty_pixels,
                        "tasks": s.tasks,
                        "flushes": s.flushes,
                        "checkout_us": ticks_to_us(s.checkout_ticks, timebase),
                        "paint_us": ticks_to_us(s.paint_ticks, timebase),
                        "render_us": ticks_to_us(s.render_ticks, timebase),
                        "flush_us": ticks_to_us(s.flush_ticks, timebase),
                    }
                }));
            }
            RecordedEvent::DirtyAreasCount {
                display,
                refresh_index,
                count,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "DirtyAreas",
                    "cat": "Rich",
                    "ts": 0,
                    "pid": display.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "refresh_index": refresh_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ticks_to_us(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_nanos(ticks) as f64 / 1000.0
}
