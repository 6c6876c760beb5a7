// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Handing finished pixels to the display hardware.
//!
//! Each display owns one or two draw buffers. To flush, the refresh cycle
//! *moves* a rendered buffer into a [`FlushFrame`] and passes it to the
//! display's [`FlushTarget`]. The target writes the pixels out (possibly
//! asynchronously, from a DMA-complete interrupt or another thread) and then
//! calls [`FlushFrame::ready`], which moves the buffer back into its slot.
//! Since `ready` consumes the frame, a flush can be acknowledged at most once.
//!
//! The handoff state alternates strictly between [`FlushState::Idle`] and
//! [`FlushState::Flushing`]; only one frame per display is in flight at a
//! time. With double buffering the active slot swaps when a frame is
//! submitted, so rendering continues into the other buffer while the hardware
//! still reads the submitted one. All slot and state changes happen under one
//! lock, so a buffer released by the hardware is fully visible to the next
//! render pass that takes it.
//!
//! While the refresh cycle waits for an acknowledgment it either blocks on a
//! [`Signal`] or, if the display has a wait callback, keeps calling that
//! callback until the frame is back.

use alloc::sync::Arc;
use core::fmt;

use crate::area::Area;
use crate::buffer::PixelBuffer;
use crate::color::ColorFormat;
use crate::error::{ProtocolViolation, violation};
use crate::output::DisplayId;
use crate::sync::Signal;
use crate::time::Clock;
use crate::trace::{FlushEvent, FlushStage, Tracer};

/// Whether a frame is with the hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlushState {
    /// No frame in flight.
    #[default]
    Idle,
    /// A frame was submitted and not yet acknowledged.
    Flushing,
}

/// Writes finished pixels to the display hardware.
///
/// Must eventually call [`FlushFrame::ready`] exactly once per frame, from any
/// thread or interrupt context. Acknowledging inside `flush` is fine.
pub trait FlushTarget: Send + Sync {
    /// Starts writing `frame` out.
    fn flush(&self, frame: FlushFrame);
}

impl<F> FlushTarget for F
where
    F: Fn(FlushFrame) + Send + Sync,
{
    fn flush(&self, frame: FlushFrame) {
        self(frame);
    }
}

/// Called with the display id while waiting for an acknowledgment.
///
/// Displays store `WaitCallback<'static>`; a wait may also borrow one that
/// lives only as long as the call.
pub type WaitCallback<'a> = dyn Fn(DisplayId) + Send + Sync + 'a;

#[derive(Debug)]
struct State {
    flushing: bool,
    last_chunk: bool,
    slots: [Option<PixelBuffer>; 2],
    double: bool,
    active: usize,
    submitted: u64,
    acknowledged: u64,
}

struct Shared {
    display: DisplayId,
    state: spin::Mutex<State>,
    signal: Signal,
    tracer: Tracer,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn acknowledge(&self, slot: usize, pixels: PixelBuffer, area: Area, is_last: bool) {
        {
            let mut state = self.state.lock();
            if !state.flushing {
                // Keep the buffer; dropping it would leave the slot empty.
                state.slots[slot] = Some(pixels);
                drop(state);
                _ = violation(ProtocolViolation::UnexpectedAcknowledge);
                return;
            }
            state.slots[slot] = Some(pixels);
            state.flushing = false;
            state.acknowledged += 1;
        }
        if self.tracer.is_enabled() {
            self.tracer.flush(&FlushEvent {
                display: self.display,
                area,
                is_last,
                stage: FlushStage::Ready,
                timestamp: self.clock.now(),
            });
        }
        self.signal.notify();
    }
}

/// A rendered buffer on its way to the hardware.
///
/// In partial render mode the buffer holds exactly [`area`](Self::area). In
/// direct and full mode it holds the whole screen and `area` names the part
/// that changed.
pub struct FlushFrame {
    shared: Arc<Shared>,
    pixels: Option<PixelBuffer>,
    slot: usize,
    area: Area,
    physical_area: Area,
    is_last: bool,
}

impl FlushFrame {
    /// The display being flushed.
    #[must_use]
    pub fn display(&self) -> DisplayId {
        self.shared.display
    }

    /// Changed area in display coordinates.
    #[must_use]
    pub fn area(&self) -> Area {
        self.area
    }

    /// Changed area in panel coordinates (display offset applied).
    #[must_use]
    pub fn physical_area(&self) -> Area {
        self.physical_area
    }

    /// Returns `true` for the final flush of a refresh.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Which draw buffer slot the pixels come from.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Pixel format of the bytes.
    #[must_use]
    pub fn format(&self) -> ColorFormat {
        self.buffer().map_or(ColorFormat::default(), PixelBuffer::format)
    }

    /// The buffer being flushed.
    #[must_use]
    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    /// Packed pixel bytes, row by row.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_ref().map_or(&[][..], PixelBuffer::as_bytes)
    }

    /// Acknowledges the flush, returning the buffer for reuse.
    pub fn ready(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(pixels) = self.pixels.take() {
            self.shared
                .acknowledge(self.slot, pixels, self.area, self.is_last);
        }
    }
}

impl Drop for FlushFrame {
    fn drop(&mut self) {
        if self.pixels.is_some() {
            log::error!(
                "{}: flush frame {:?} dropped without acknowledgment",
                self.shared.display,
                self.area
            );
            self.release();
        }
    }
}

impl fmt::Debug for FlushFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushFrame")
            .field("display", &self.shared.display)
            .field("area", &self.area)
            .field("physical_area", &self.physical_area)
            .field("is_last", &self.is_last)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Per-display flush state and draw buffers.
pub(crate) struct Handoff {
    shared: Arc<Shared>,
}

impl Handoff {
    pub(crate) fn new(
        display: DisplayId,
        first: PixelBuffer,
        second: Option<PixelBuffer>,
        tracer: Tracer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let double = second.is_some();
        Self {
            shared: Arc::new(Shared {
                display,
                state: spin::Mutex::new(State {
                    flushing: false,
                    last_chunk: false,
                    slots: [Some(first), second],
                    double,
                    active: 0,
                    submitted: 0,
                    acknowledged: 0,
                }),
                signal: Signal::new(),
                tracer,
                clock,
            }),
        }
    }

    pub(crate) fn state(&self) -> FlushState {
        if self.shared.state.lock().flushing {
            FlushState::Flushing
        } else {
            FlushState::Idle
        }
    }

    pub(crate) fn is_last_chunk(&self) -> bool {
        self.shared.state.lock().last_chunk
    }

    pub(crate) fn is_double_buffered(&self) -> bool {
        self.shared.state.lock().double
    }

    pub(crate) fn active_index(&self) -> usize {
        self.shared.state.lock().active
    }

    /// `(submitted, acknowledged)` frame counts.
    pub(crate) fn counts(&self) -> (u64, u64) {
        let state = self.shared.state.lock();
        (state.submitted, state.acknowledged)
    }

    /// Capacity in bytes of the smallest draw buffer.
    pub(crate) fn buffer_capacity(&self) -> Option<usize> {
        let state = self.shared.state.lock();
        state
            .slots
            .iter()
            .flatten()
            .map(PixelBuffer::capacity)
            .min()
    }

    /// Takes the active draw buffer, waiting for the hardware to return it.
    pub(crate) fn take_buffer(&self, wait: Option<&WaitCallback<'_>>) -> (usize, PixelBuffer) {
        loop {
            let seen = self.shared.signal.epoch();
            {
                let mut state = self.shared.state.lock();
                let active = state.active;
                if let Some(pixels) = state.slots[active].take() {
                    return (active, pixels);
                }
            }
            self.wait(seen, wait);
        }
    }

    /// Puts a buffer back without flushing it.
    pub(crate) fn restore(&self, slot: usize, pixels: PixelBuffer) {
        self.shared.state.lock().slots[slot] = Some(pixels);
    }

    /// Waits until no frame is in flight.
    pub(crate) fn wait_idle(&self, wait: Option<&WaitCallback<'_>>) {
        loop {
            let seen = self.shared.signal.epoch();
            if !self.shared.state.lock().flushing {
                return;
            }
            self.wait(seen, wait);
        }
    }

    /// Runs `f` with the draw buffer that is not active, once it is back
    /// from the hardware.
    pub(crate) fn with_inactive<R>(
        &self,
        wait: Option<&WaitCallback<'_>>,
        f: impl FnOnce(Option<&PixelBuffer>) -> R,
    ) -> R {
        self.wait_idle(wait);
        let state = self.shared.state.lock();
        if !state.double {
            return f(None);
        }
        f(state.slots[state.active ^ 1].as_ref())
    }

    /// Hands `pixels` to `target`.
    ///
    /// With `swap` and double buffering the active slot flips. Submitting
    /// while a frame is in flight is a protocol violation; the buffer then
    /// returns to its slot unflushed.
    pub(crate) fn submit(
        &self,
        target: &dyn FlushTarget,
        slot: usize,
        pixels: PixelBuffer,
        area: Area,
        physical_area: Area,
        is_last: bool,
        swap: bool,
    ) -> Result<(), ProtocolViolation> {
        {
            let mut state = self.shared.state.lock();
            if state.flushing {
                state.slots[slot] = Some(pixels);
                drop(state);
                return Err(violation(ProtocolViolation::FlushInFlight));
            }
            state.flushing = true;
            state.last_chunk = is_last;
            state.submitted += 1;
            if swap && state.double {
                state.active ^= 1;
            }
        }
        let shared = &self.shared;
        if shared.tracer.is_enabled() {
            shared.tracer.flush(&FlushEvent {
                display: shared.display,
                area,
                is_last,
                stage: FlushStage::Submit,
                timestamp: shared.clock.now(),
            });
        }
        target.flush(FlushFrame {
            shared: Arc::clone(shared),
            pixels: Some(pixels),
            slot,
            area,
            physical_area,
            is_last,
        });
        Ok(())
    }

    fn wait(&self, seen: usize, wait: Option<&WaitCallback<'_>>) {
        match wait {
            Some(cb) => {
                let display = self.shared.display;
                self.shared.signal.wait_past_with(seen, &|| cb(display));
            }
            None => {
                self.shared.signal.wait_past(seen);
            }
        }
    }
}

impl fmt::Debug for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff")
            .field("display", &self.shared.display)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
