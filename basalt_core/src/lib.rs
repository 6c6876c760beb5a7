// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-region tracking, draw-task dispatch, and flush handoff for embedded
//! GUI rendering.
//!
//! `basalt_core` is the part of a GUI engine between "something changed on
//! screen" and "pixels reached the panel". It does not know about widgets,
//! fonts or images: painters turn screen regions into opaque draw tasks, and
//! renderers (CPU or hardware accelerated) execute them. It is `no_std`
//! compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   Display::invalidate ──► InvalidationTracker (merged dirty areas)
//!                                   │ checkout
//!                                   ▼
//!   refresh ──► Painter::paint ──► Layer task queue
//!      │                               │ claim
//!      │        Dispatcher ──► RenderUnit (inline or worker thread)
//!      │            ▲                  │ ready
//!      │            └──── Signal ◄─────┘
//!      ▼
//!   FlushHandoff ──► FlushTarget::flush ──► FlushFrame::ready
//! ```
//!
//! **[`invalidate`]**: Per-display dirty area set. Overlapping areas merge
//! when that saves work; too many areas collapse to the full screen.
//!
//! **[`layer`]** and **[`task`]**: A layer is a buffer plus an ordered queue
//! of draw tasks. Tasks whose bounds overlap run in the order they were
//! pushed; disjoint tasks may run in parallel on different units.
//!
//! **[`unit`]**: Render units claim one task at a time and execute it inline
//! or on a dedicated worker thread (`std`).
//!
//! **[`dispatch`]**: Offers queued tasks to idle units. Driven by a
//! level-triggered redispatch signal, never by polling.
//!
//! **[`refresh`]**: The refresh cycle that ties everything together, in
//! partial, direct, or full render mode.
//!
//! **[`flush`]**: Moves finished draw buffers to the hardware and back.
//!
//! **[`display`]** and **[`engine`]**: Displays own all of the above; the
//! engine creates them and owns the dispatcher.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! refresh instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Worker threads, blocking waits, and
//!   [`MonotonicClock`](time::MonotonicClock). Without it waits spin.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-refresh
//!   dirty area events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod area;
pub mod buffer;
pub mod color;
pub mod dispatch;
pub mod display;
pub mod engine;
pub mod error;
pub mod flush;
pub mod invalidate;
pub mod layer;
pub mod output;
pub mod refresh;
pub mod renderer;
pub mod sync;
pub mod target;
pub mod task;
pub mod time;
pub mod trace;
pub mod unit;
