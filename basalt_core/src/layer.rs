// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Off-screen layers.
//!
//! A [`Layer`] pairs a task queue with the pixel buffer its tasks draw into.
//! Every display has a *base* layer that renders into the display's draw
//! buffer, bound for the duration of one render pass. Painters may create
//! *transient* layers for effects (opacity, masking); those own a lazily
//! allocated buffer, are composited onto their parent by a layer-composite
//! task, and are dropped from the display once that task is ready.
//!
//! # Locking
//!
//! The queue and the pixel surface sit behind separate [`spin::Mutex`]es. When
//! both are needed the queue is locked first. Render units hold neither while
//! a renderer runs: the task's region is copied out into a
//! [`DrawTarget`], drawn, and written back.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::area::Area;
use crate::buffer::{MemoryBudget, PixelBuffer};
use crate::color::ColorFormat;
use crate::error::{ProtocolViolation, RenderError};
use crate::output::DisplayId;
use crate::sync::Signal;
use crate::target::DrawTarget;
use crate::task::{Descriptor, DrawTask, TaskId, TaskKind, TaskQueue, TaskState, TaskView};
use crate::unit::UnitId;

/// Identifies a layer within its display.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayerId(pub u32);

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {}", self.0)
    }
}

#[derive(Debug)]
struct Surface {
    pixels: Option<PixelBuffer>,
    buf_area: Area,
    clip: Area,
}

/// A task queue and the buffer its tasks draw into.
pub struct Layer {
    id: LayerId,
    display: DisplayId,
    format: ColorFormat,
    transient: bool,
    budget: Option<Arc<MemoryBudget>>,
    /// Raised on every push so a dispatcher sees new work.
    signal: Arc<Signal>,
    queue: spin::Mutex<TaskQueue>,
    surface: spin::Mutex<Surface>,
    pending: AtomicUsize,
    retired: AtomicBool,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        display: DisplayId,
        format: ColorFormat,
        area: Area,
        transient: bool,
        budget: Option<Arc<MemoryBudget>>,
        signal: Arc<Signal>,
    ) -> Self {
        Self {
            id,
            display,
            format,
            transient,
            budget,
            signal,
            queue: spin::Mutex::new(TaskQueue::new()),
            surface: spin::Mutex::new(Surface {
                pixels: None,
                buf_area: area,
                clip: area,
            }),
            pending: AtomicUsize::new(0),
            retired: AtomicBool::new(false),
        }
    }

    /// The layer's id.
    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// The display the layer belongs to.
    #[must_use]
    pub fn display(&self) -> DisplayId {
        self.display
    }

    /// Pixel format of the layer's buffer.
    #[must_use]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Returns `true` for effect layers created during painting.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Returns `true` once the composite of this transient layer is done.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// The display area the buffer covers.
    #[must_use]
    pub fn buf_area(&self) -> Area {
        self.surface.lock().buf_area
    }

    /// The area tasks are currently clipped to.
    #[must_use]
    pub fn clip_area(&self) -> Area {
        self.surface.lock().clip
    }

    /// Narrows or moves the clip for tasks pushed from now on.
    pub fn set_clip_area(&self, clip: Area) {
        self.surface.lock().clip = clip;
    }

    /// Returns `true` if a buffer is allocated or bound.
    #[must_use]
    pub fn has_buffer(&self) -> bool {
        self.surface.lock().pixels.is_some()
    }

    /// Queues a paint operation clipped to the current clip area.
    pub fn push_task(&self, kind: TaskKind, area: Area, descriptor: Descriptor) -> TaskId {
        let clip = self.clip_area();
        self.push_task_clipped(kind, area, clip, descriptor)
    }

    /// Queues a paint operation with an explicit clip.
    pub fn push_task_clipped(
        &self,
        kind: TaskKind,
        area: Area,
        clip: Area,
        descriptor: Descriptor,
    ) -> TaskId {
        self.push(kind, area, clip, descriptor, None)
    }

    /// Queues a composite of `source` onto this layer.
    ///
    /// The task becomes eligible only after every task of `source` is ready,
    /// so push it after the source's own tasks.
    pub fn push_composite(&self, area: Area, source: &Arc<Self>, descriptor: Descriptor) -> TaskId {
        let clip = self.clip_area();
        self.push(TaskKind::Layer, area, clip, descriptor, Some(Arc::clone(source)))
    }

    fn push(
        &self,
        kind: TaskKind,
        area: Area,
        clip: Area,
        descriptor: Descriptor,
        source: Option<Arc<Self>>,
    ) -> TaskId {
        let id = {
            let mut queue = self.queue.lock();
            self.pending.fetch_add(1, Ordering::AcqRel);
            queue.push(kind, area, clip, descriptor, source)
        };
        self.signal.notify();
        id
    }

    /// Returns `true` when no task is queued or in progress.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    /// Returns `true` if some task waits to be claimed.
    #[must_use]
    pub fn has_queued(&self) -> bool {
        self.queue.lock().has_queued()
    }

    /// Number of tasks currently in `state`.
    #[must_use]
    pub fn task_count(&self, state: TaskState) -> usize {
        self.queue.lock().count(state)
    }

    /// State of a task, or `None` once it has been removed.
    #[must_use]
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.queue.lock().get(id).map(DrawTask::state)
    }

    /// The earliest task that may start now; see
    /// [`TaskQueue::next_available`].
    #[must_use]
    pub fn next_available(&self, after: Option<TaskId>) -> Option<TaskId> {
        self.queue.lock().next_available(after)
    }

    /// Finds the earliest eligible task `accept` agrees to and claims it for
    /// `unit`, all under the queue lock.
    ///
    /// The buffer is allocated (zeroed) before the first claim. If that
    /// fails the task stays queued and the error is returned.
    pub fn claim_next(
        &self,
        unit: UnitId,
        mut accept: impl FnMut(&DrawTask) -> bool,
    ) -> Result<Option<TaskView>, RenderError> {
        let mut queue = self.queue.lock();
        let mut after = None;
        let id = loop {
            let Some(id) = queue.next_available(after) else {
                return Ok(None);
            };
            if queue.get(id).is_some_and(&mut accept) {
                break id;
            }
            after = Some(id);
        };
        self.ensure_buffer()?;
        Ok(Some(queue.claim(id, unit)?))
    }

    /// Marks a claimed task ready.
    ///
    /// Completing a composite retires its source layer.
    pub fn complete(&self, id: TaskId) -> Result<(), ProtocolViolation> {
        let mut queue = self.queue.lock();
        queue.complete(id)?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        if let Some(source) = queue.get(id).and_then(DrawTask::source) {
            source.retired.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Drops ready tasks, returning how many were removed.
    pub fn remove_ready(&self) -> usize {
        self.queue.lock().remove_ready()
    }

    /// Drops every queued task that has not started, returning how many
    /// were removed. In-progress tasks are left to finish.
    pub fn discard_queued(&self) -> usize {
        let mut queue = self.queue.lock();
        let dropped = queue.remove_queued();
        self.pending.fetch_sub(dropped, Ordering::AcqRel);
        dropped
    }

    /// Allocates the buffer if it is missing.
    pub fn ensure_buffer(&self) -> Result<(), RenderError> {
        let mut surface = self.surface.lock();
        if surface.pixels.is_some() {
            return Ok(());
        }
        let (w, h) = (dim(surface.buf_area.width()), dim(surface.buf_area.height()));
        let pixels = PixelBuffer::try_new(self.format, w, h, self.budget.as_ref()).map_err(|e| {
            log::warn!("{} of {}: {e}", self.id, self.display);
            RenderError::BufferAlloc {
                layer: self.id,
                bytes: e.bytes,
            }
        })?;
        log::debug!("{} of {}: allocated {}x{} buffer", self.id, self.display, w, h);
        surface.pixels = Some(pixels);
        Ok(())
    }

    /// Attaches an externally owned buffer covering `buf_area`, with tasks
    /// clipped to `clip`.
    pub fn bind(&self, pixels: PixelBuffer, buf_area: Area, clip: Area) {
        let mut surface = self.surface.lock();
        surface.pixels = Some(pixels);
        surface.buf_area = buf_area;
        surface.clip = clip;
    }

    /// Moves the layer to cover `area`, dropping a buffer of the old size.
    pub(crate) fn resize(&self, area: Area) {
        let mut surface = self.surface.lock();
        if surface.buf_area != area {
            surface.pixels = None;
            surface.buf_area = area;
            surface.clip = area;
        }
    }

    /// Detaches and returns the buffer.
    pub fn unbind(&self) -> Option<PixelBuffer> {
        self.surface.lock().pixels.take()
    }

    /// Zeroes `area` (display coordinates) of the buffer, if one exists.
    pub fn clear_area(&self, area: &Area) {
        let mut surface = self.surface.lock();
        let origin = surface.buf_area;
        if let Some(pixels) = &mut surface.pixels {
            pixels.clear(&area.translate(-origin.x1, -origin.y1));
        }
    }

    /// Copies `area` (display coordinates) out of the buffer.
    ///
    /// Returns `None` without a buffer or when `area` misses the buffer.
    #[must_use]
    pub fn load_target(&self, area: &Area) -> Option<DrawTarget> {
        let surface = self.surface.lock();
        let pixels = surface.pixels.as_ref()?;
        let area = area.intersect(&surface.buf_area)?;
        let local = area.translate(-surface.buf_area.x1, -surface.buf_area.y1);
        let mut copy = PixelBuffer::new(pixels.format(), dim(area.width()), dim(area.height()));
        pixels.read_area(&local, copy.as_bytes_mut());
        Some(DrawTarget::from_pixels(area, copy))
    }

    /// Writes a target produced by [`load_target`](Self::load_target) back.
    pub fn store_target(&self, target: DrawTarget) {
        let (area, copy) = target.into_parts();
        let mut surface = self.surface.lock();
        let origin = surface.buf_area;
        if let Some(pixels) = &mut surface.pixels
            && pixels.format() == copy.format()
        {
            pixels.write_area(&area.translate(-origin.x1, -origin.y1), copy.as_bytes());
        }
    }

    /// Runs `f` with the buffer and the area it covers.
    pub fn with_pixels<R>(&self, f: impl FnOnce(Option<&PixelBuffer>, Area) -> R) -> R {
        let surface = self.surface.lock();
        f(surface.pixels.as_ref(), surface.buf_area)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("display", &self.display)
            .field("format", &self.format)
            .field("transient", &self.transient)
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn dim(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    const UNIT: UnitId = UnitId(0);

    fn layer(area: Area, budget: Option<Arc<MemoryBudget>>) -> Arc<Layer> {
        Arc::new(Layer::new(
            LayerId(1),
            DisplayId(0),
            ColorFormat::Argb8888,
            area,
            true,
            budget,
            Arc::new(Signal::new()),
        ))
    }

    #[test]
    fn first_claim_allocates_zeroed_buffer() {
        let l = layer(Area::new(10, 10, 19, 19), None);
        l.push_task(TaskKind::Rectangle, Area::new(10, 10, 12, 12), Arc::new(()));
        assert!(!l.has_buffer());
        let view = l.claim_next(UNIT, |_| true).unwrap().unwrap();
        assert!(l.has_buffer());
        let target = l.load_target(&view.area).unwrap();
        assert_eq!(target.area(), Area::new(10, 10, 12, 12));
        assert_eq!(target.pixel(11, 11), Some(Color::TRANSPARENT));
    }

    #[test]
    fn allocation_failure_leaves_task_queued() {
        let budget = Arc::new(MemoryBudget::limited(16));
        let l = layer(Area::new(0, 0, 9, 9), Some(budget));
        let t = l.push_task(TaskKind::Rectangle, Area::new(0, 0, 1, 1), Arc::new(()));
        let err = l.claim_next(UNIT, |_| true).unwrap_err();
        assert_eq!(
            err,
            RenderError::BufferAlloc {
                layer: LayerId(1),
                bytes: 400
            }
        );
        assert_eq!(l.task_state(t), Some(TaskState::Queued));
    }

    #[test]
    fn rejected_candidates_are_skipped() {
        let l = layer(Area::new(0, 0, 99, 99), None);
        l.push_task(TaskKind::Label, Area::new(0, 0, 9, 9), Arc::new(()));
        let rect = l.push_task(TaskKind::Rectangle, Area::new(20, 0, 29, 9), Arc::new(()));
        let view = l
            .claim_next(UNIT, |t| t.kind() == TaskKind::Rectangle)
            .unwrap()
            .unwrap();
        assert_eq!(view.id, rect);
        assert!(l.claim_next(UNIT, |t| t.kind() == TaskKind::Rectangle).unwrap().is_none());
    }

    #[test]
    fn store_target_writes_back_region() {
        let l = layer(Area::new(0, 0, 9, 9), None);
        l.ensure_buffer().unwrap();
        let mut target = l.load_target(&Area::new(2, 2, 4, 4)).unwrap();
        target.fill(&target.area(), Color::WHITE);
        l.store_target(target);
        l.with_pixels(|pixels, area| {
            let pixels = pixels.unwrap();
            assert_eq!(area, Area::new(0, 0, 9, 9));
            assert_eq!(pixels.pixel(3, 3), Color::WHITE);
            assert_eq!(pixels.pixel(5, 5), Color::TRANSPARENT);
        });
    }

    #[test]
    fn pending_tracks_drain_and_composite_retires_source() {
        let parent = layer(Area::new(0, 0, 9, 9), None);
        let child = layer(Area::new(0, 0, 4, 4), None);
        let inner = child.push_task(TaskKind::Rectangle, Area::new(0, 0, 4, 4), Arc::new(()));
        let comp = parent.push_composite(Area::new(0, 0, 4, 4), &child, Arc::new(()));

        assert!(!child.is_drained());
        assert!(parent.claim_next(UNIT, |_| true).unwrap().is_none(), "source not drained");

        child.claim_next(UNIT, |_| true).unwrap().unwrap();
        child.complete(inner).unwrap();
        assert!(child.is_drained());

        let view = parent.claim_next(UNIT, |_| true).unwrap().unwrap();
        assert_eq!(view.id, comp);
        assert!(!child.is_retired());
        parent.complete(comp).unwrap();
        assert!(child.is_retired());
        assert!(parent.is_drained());
    }

    #[test]
    fn discard_queued_keeps_in_progress() {
        let l = layer(Area::new(0, 0, 99, 99), None);
        let a = l.push_task(TaskKind::Rectangle, Area::new(0, 0, 9, 9), Arc::new(()));
        l.push_task(TaskKind::Rectangle, Area::new(20, 0, 29, 9), Arc::new(()));
        l.claim_next(UNIT, |_| true).unwrap().unwrap();
        assert_eq!(l.discard_queued(), 1);
        assert!(!l.is_drained());
        l.complete(a).unwrap();
        assert!(l.is_drained());
    }
}
