// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Dirty area events ([`on_dirty_areas`](TraceSink::on_dirty_areas)) store
//! only the count.

use basalt_core::area::Area;
use basalt_core::layer::LayerId;
use basalt_core::output::DisplayId;
use basalt_core::task::{TaskId, TaskKind};
use basalt_core::time::HostTime;
use basalt_core::trace::{
    DamageRect, DirtyOverflowEvent, FlushEvent, FlushStage, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, RefreshBeginEvent, RefreshSummary, TaskEvent, TaskStage, TraceSink,
};
use basalt_core::unit::UnitId;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_REFRESH_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_TASK: u8 = 4;
const TAG_FLUSH: u8 = 5;
const TAG_DIRTY_OVERFLOW: u8 = 6;
const TAG_REFRESH_SUMMARY: u8 = 7;
const TAG_DIRTY_AREAS_COUNT: u8 = 8;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_area(&mut self, a: Area) {
        self.write_i32(a.x1);
        self.write_i32(a.y1);
        self.write_i32(a.x2);
        self.write_i32(a.y2);
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Checkout => 0,
            PhaseKind::Paint => 1,
            PhaseKind::Render => 2,
            PhaseKind::Flush => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_refresh_begin(&mut self, e: &RefreshBeginEvent) {
        self.write_u8(TAG_REFRESH_BEGIN);
        self.write_u64(e.refresh_index);
        self.write_u32(e.display.0);
        self.write_u64(e.timestamp.ticks());
        self.write_u32(e.dirty_areas);
        self.write_u64(e.dirty_pixels);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.refresh_index);
        self.write_u32(e.display.0);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.refresh_index);
        self.write_u32(e.display.0);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_task(&mut self, e: &TaskEvent) {
        self.write_u8(TAG_TASK);
        self.write_u32(e.display.0);
        self.write_u32(e.layer.0);
        self.write_u64(e.task.0);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "there are four task kinds"
        )]
        self.write_u8(e.kind.index() as u8);
        self.write_u32(e.unit.0);
        self.write_u8(match e.stage {
            TaskStage::Claimed => 0,
            TaskStage::Ready => 1,
        });
        self.write_u64(e.timestamp.ticks());
    }

    fn on_flush(&mut self, e: &FlushEvent) {
        self.write_u8(TAG_FLUSH);
        self.write_u32(e.display.0);
        self.write_area(e.area);
        self.write_u8(u8::from(e.is_last));
        self.write_u8(match e.stage {
            FlushStage::Submit => 0,
            FlushStage::Ready => 1,
        });
        self.write_u64(e.timestamp.ticks());
    }

    fn on_dirty_overflow(&mut self, e: &DirtyOverflowEvent) {
        self.write_u8(TAG_DIRTY_OVERFLOW);
        self.write_u32(e.display.0);
        self.write_u64(e.overflow_count);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_refresh_summary(&mut self, s: &RefreshSummary) {
        self.write_u8(TAG_REFRESH_SUMMARY);
        self.write_u64(s.refresh_index);
        self.write_u32(s.display.0);
        self.write_u64(s.started.ticks());
        self.write_u64(s.finished.ticks());
        self.write_u32(s.dirty_areas);
        self.write_u64(s.dirty_pixels);
        self.write_u32(s.tasks);
        self.write_u32(s.flushes);
        self.write_u64(s.checkout_ticks);
        self.write_u64(s.paint_ticks);
        self.write_u64(s.render_ticks);
        self.write_u64(s.flush_ticks);
    }

    fn on_dirty_areas(&mut self, display: DisplayId, refresh_index: u64, rects: &[DamageRect]) {
        self.write_u8(TAG_DIRTY_AREAS_COUNT);
        self.write_u32(display.0);
        self.write_u64(refresh_index);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "dirty area count capped at u32::MAX for recording"
        )]
        self.write_u32(rects.len().min(u32::MAX as usize) as u32);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`RefreshBeginEvent`].
    RefreshBegin(RefreshBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`TaskEvent`].
    Task(TaskEvent),
    /// A [`FlushEvent`].
    Flush(FlushEvent),
    /// A [`DirtyOverflowEvent`].
    DirtyOverflow(DirtyOverflowEvent),
    /// A [`RefreshSummary`].
    RefreshSummary(RefreshSummary),
    /// Dirty area count for a refresh.
    DirtyAreasCount {
        /// Which display.
        display: DisplayId,
        /// Refresh counter.
        refresh_index: u64,
        /// Number of dirty areas.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_display(&mut self) -> Option<DisplayId> {
        self.read_u32().map(DisplayId)
    }

    fn read_area(&mut self) -> Option<Area> {
        Some(Area::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        ))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Checkout,
            1 => PhaseKind::Paint,
            2 => PhaseKind::Render,
            _ => PhaseKind::Flush,
        })
    }

    fn read_kind(&mut self) -> Option<TaskKind> {
        TaskKind::ALL.get(usize::from(self.read_u8()?)).copied()
    }

    fn decode_refresh_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RefreshBegin(RefreshBeginEvent {
            refresh_index: self.read_u64()?,
            display: self.read_display()?,
            timestamp: self.read_time()?,
            dirty_areas: self.read_u32()?,
            dirty_pixels: self.read_u64()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            refresh_index: self.read_u64()?,
            display: self.read_display()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            refresh_index: self.read_u64()?,
            display: self.read_display()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_task(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Task(TaskEvent {
            display: self.read_display()?,
            layer: LayerId(self.read_u32()?),
            task: TaskId(self.read_u64()?),
            kind: self.read_kind()?,
            unit: UnitId(self.read_u32()?),
            stage: if self.read_u8()? == 0 {
                TaskStage::Claimed
            } else {
                TaskStage::Ready
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_flush(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Flush(FlushEvent {
            display: self.read_display()?,
            area: self.read_area()?,
            is_last: self.read_u8()? != 0,
            stage: if self.read_u8()? == 0 {
                FlushStage::Submit
            } else {
                FlushStage::Ready
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_dirty_overflow(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::DirtyOverflow(DirtyOverflowEvent {
            display: self.read_display()?,
            overflow_count: self.read_u64()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_refresh_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RefreshSummary(RefreshSummary {
            refresh_index: self.read_u64()?,
            display: self.read_display()?,
            started: self.read_time()?,
            finished: self.read_time()?,
            dirty_areas: self.read_u32()?,
            dirty_pixels: self.read_u64()?,
            tasks: self.read_u32()?,
            flushes: self.read_u32()?,
            checkout_ticks: self.read_u64()?,
            paint_ticks: self.read_u64()?,
            render_ticks: self.read_u64()?,
            flush_ticks: self.read_u64()?,
        }))
    }

    fn decode_dirty_areas_count(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::DirtyAreasCount {
            display: self.read_display()?,
            refresh_index: self.read_u64()?,
            count: self.read_u32()?,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_REFRESH_BEGIN => self.decode_refresh_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_TASK => self.decode_task(),
            TAG_FLUSH => self.decode_flush(),
            TAG_DIRTY_OVERFLOW => self.decode_dirty_overflow(),
            TAG_REFRESH_SUMMARY => self.decode_refresh_summary(),
            TAG_DIRTY_AREAS_COUNT => self.decode_dirty_areas_count(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> RefreshSummary {
        RefreshSummary {
            refresh_index: 7,
            display: DisplayId(1),
            started: HostTime(1_000_000),
            finished: HostTime(1_004_000),
            dirty_areas: 3,
            dirty_pixels: 4_800,
            tasks: 12,
            flushes: 4,
            checkout_ticks: 100,
            paint_ticks: 400,
            render_ticks: 2_500,
            flush_ticks: 900,
        }
    }

    fn sample_task(stage: TaskStage) -> TaskEvent {
        TaskEvent {
            display: DisplayId(1),
            layer: LayerId(2),
            task: TaskId(40),
            kind: TaskKind::Image,
            unit: UnitId(3),
            stage,
            timestamp: HostTime(1_001_000),
        }
    }

    #[test]
    fn task_lifecycle_survives_recording() {
        let mut rec = RecorderSink::new();
        rec.on_task(&sample_task(TaskStage::Claimed));
        rec.on_task(&sample_task(TaskStage::Ready));

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::Task(e) => {
                assert_eq!(e.layer, LayerId(2));
                assert_eq!(e.task, TaskId(40));
                assert_eq!(e.kind, TaskKind::Image);
                assert_eq!(e.unit, UnitId(3));
                assert_eq!(e.stage, TaskStage::Claimed);
            }
            other => panic!("expected Task, got {other:?}"),
        }
        assert!(
            matches!(&events[1], RecordedEvent::Task(e) if e.stage == TaskStage::Ready),
            "second event is the ready stage"
        );
    }

    #[test]
    fn flush_keeps_negative_coordinates() {
        let mut rec = RecorderSink::new();
        rec.on_flush(&FlushEvent {
            display: DisplayId(0),
            area: Area::new(-4, 0, 15, 7),
            is_last: true,
            stage: FlushStage::Submit,
            timestamp: HostTime(9),
        });
        match decode(rec.as_bytes()).next() {
            Some(RecordedEvent::Flush(e)) => {
                assert_eq!(e.area, Area::new(-4, 0, 15, 7));
                assert!(e.is_last, "last flag preserved");
                assert_eq!(e.stage, FlushStage::Submit);
            }
            other => panic!("expected Flush, got {other:?}"),
        }
    }

    #[test]
    fn refresh_summary_fields() {
        let mut rec = RecorderSink::new();
        let orig = sample_summary();
        rec.on_refresh_summary(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::RefreshSummary(s) => {
                assert_eq!(s.refresh_index, orig.refresh_index);
                assert_eq!(s.finished, orig.finished);
                assert_eq!(s.tasks, orig.tasks);
                assert_eq!(s.flushes, orig.flushes);
                assert_eq!(s.render_ticks, orig.render_ticks);
                assert_eq!(s.flush_ticks, orig.flush_ticks);
            }
            other => panic!("expected RefreshSummary, got {other:?}"),
        }
    }

    #[test]
    fn mixed_stream_decodes_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_refresh_begin(&RefreshBeginEvent {
            refresh_index: 7,
            display: DisplayId(1),
            timestamp: HostTime(1_000_000),
            dirty_areas: 3,
            dirty_pixels: 4_800,
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            refresh_index: 7,
            display: DisplayId(1),
            phase: PhaseKind::Paint,
            timestamp: HostTime(1_000_100),
        });
        rec.on_dirty_overflow(&DirtyOverflowEvent {
            display: DisplayId(1),
            overflow_count: 2,
            timestamp: HostTime(1_000_200),
        });
        rec.on_dirty_areas(DisplayId(1), 7, &[]);
        rec.on_refresh_summary(&sample_summary());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], RecordedEvent::RefreshBegin(_)), "begin first");
        assert!(
            matches!(&events[1], RecordedEvent::PhaseBegin(e) if e.phase == PhaseKind::Paint),
            "then paint"
        );
        assert!(
            matches!(&events[2], RecordedEvent::DirtyOverflow(e) if e.overflow_count == 2),
            "then overflow"
        );
        assert!(
            matches!(events[3], RecordedEvent::DirtyAreasCount { count: 0, .. }),
            "then the dirty area count"
        );
        assert!(matches!(events[4], RecordedEvent::RefreshSummary(_)), "summary last");
    }

    #[test]
    fn truncated_record_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_refresh_summary(&sample_summary());
        let bytes = rec.into_bytes();
        assert_eq!(decode(&bytes[..bytes.len() - 1]).count(), 0);
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty(), "no bytes, no events");
    }
}
