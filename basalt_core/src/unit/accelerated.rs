// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Accelerated render units.
//!
//! An [`Accelerator`] fronts a GPU, 2D engine, or DMA controller. Unlike the
//! software renderers it may decline tasks it cannot draw (those stay queued
//! for another unit) and may report that it is not ready while the hardware
//! is still busy. An accelerator that reports not-ready must call
//! [`Dispatcher::request_redispatch`](crate::dispatch::Dispatcher::request_redispatch)
//! once it becomes ready again, or queued work may wait for the next state
//! change.

use super::{Backend, Unit, UnitKind};
use crate::target::DrawTarget;
use crate::task::{DrawTask, TaskView};

/// A hardware drawing engine.
pub trait Accelerator: Send + Sync + 'static {
    /// Returns `true` if the engine can draw `task`.
    fn supports(&self, task: &DrawTask) -> bool;

    /// Returns `false` while the engine cannot start another task.
    fn is_ready(&self) -> bool {
        true
    }

    /// Draws `task` into `target`, returning once the pixels are written.
    fn execute(&self, target: &mut DrawTarget, task: &TaskView);
}

/// Adapts an [`Accelerator`] to the unit [`Backend`] interface.
#[derive(Debug)]
pub struct Accelerated<A>(pub A);

/// A render unit driving an [`Accelerator`].
pub type AcceleratedUnit<A> = Unit<Accelerated<A>>;

impl<A: Accelerator> Backend for Accelerated<A> {
    const KIND: UnitKind = UnitKind::Accelerated;

    fn is_ready(&self) -> bool {
        self.0.is_ready()
    }

    fn accepts(&self, task: &DrawTask) -> bool {
        self.0.supports(task)
    }

    fn execute(&self, target: &mut DrawTarget, task: &TaskView) {
        self.0.execute(target, task);
    }
}
