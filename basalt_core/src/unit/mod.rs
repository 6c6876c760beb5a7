// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render units.
//!
//! A render unit is an execution backend that claims one task at a time from
//! a layer and runs it. [`RenderUnit`] is the capability interface the
//! dispatcher drives; it is implemented once, generically, by [`Unit`] over a
//! [`Backend`]:
//!
//! - [`SoftwareUnit`] runs [`Renderers`](crate::renderer::Renderers) on the
//!   CPU.
//! - [`AcceleratedUnit`] runs an [`Accelerator`], which may accept only some
//!   tasks and may be temporarily not ready.
//!
//! Where a claimed task runs is decided by the [`ExecutionMode`] chosen at
//! construction: inline on the dispatching thread, or on a dedicated worker
//! thread (`std` feature).
//!
//! A unit never holds more than one task. [`RenderUnit::dispatch`] is
//! non-blocking: it either claims a task and starts it, or reports why it did
//! not.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::RenderError;
use crate::layer::Layer;
use crate::output::DisplayId;
use crate::sync::Signal;
use crate::target::DrawTarget;
use crate::task::{DrawTask, TaskView};
use crate::time::Clock;
use crate::trace::{TaskEvent, TaskStage, Tracer};

mod accelerated;
mod exec;
mod software;

pub use accelerated::{Accelerated, AcceleratedUnit, Accelerator};
pub use exec::ExecutionMode;
pub use software::SoftwareUnit;

use exec::Executor;

/// Identifies a render unit within its display.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UnitId(pub u32);

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

/// Which family of backend a unit belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// CPU renderers.
    Software,
    /// A GPU, DMA engine, or other accelerator.
    Accelerated,
}

/// Result of offering a layer to a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
    /// A task was claimed and started.
    Claimed,
    /// The unit is still running a task.
    Busy,
    /// The unit cannot take work right now (its engine is occupied).
    NotReady,
    /// No eligible task the unit accepts.
    NothingAvailable,
}

/// The dispatch interface of a render unit.
pub trait RenderUnit: Send + Sync {
    /// The unit's id.
    fn id(&self) -> UnitId;

    /// Which family of backend this is.
    fn kind(&self) -> UnitKind;

    /// Tries to claim and start one task of `layer`.
    ///
    /// Never blocks on the task itself. Fails only if the layer buffer could
    /// not be allocated or a protocol violation was detected.
    fn dispatch(&self, layer: &Arc<Layer>) -> Result<DispatchOutcome, RenderError>;

    /// Returns `true` while a task is in progress.
    fn is_busy(&self) -> bool;
}

/// What a unit needs from the display that owns it.
#[derive(Clone)]
pub struct UnitContext {
    pub(crate) display: DisplayId,
    pub(crate) signal: Arc<Signal>,
    pub(crate) tracer: Tracer,
    pub(crate) clock: Arc<dyn Clock>,
}

impl UnitContext {
    /// The owning display.
    #[must_use]
    pub fn display(&self) -> DisplayId {
        self.display
    }
}

impl fmt::Debug for UnitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitContext")
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

/// The execution half of a render unit.
pub trait Backend: Send + Sync + 'static {
    /// Which family of backend this is.
    const KIND: UnitKind;

    /// Returns `false` while the backend cannot start another task.
    fn is_ready(&self) -> bool {
        true
    }

    /// Returns `true` if the backend can run `task`.
    fn accepts(&self, task: &DrawTask) -> bool {
        _ = task;
        true
    }

    /// Runs `task` into `target`.
    fn execute(&self, target: &mut DrawTarget, task: &TaskView);
}

/// A claimed task travelling to wherever it will run.
pub(crate) struct Job {
    pub(crate) layer: Arc<Layer>,
    pub(crate) task: TaskView,
}

/// State shared between a unit and its worker.
pub(crate) struct Core<B> {
    id: UnitId,
    backend: B,
    ctx: UnitContext,
    busy: AtomicBool,
}

impl<B: Backend> Core<B> {
    /// Runs a job to completion and frees the unit.
    pub(crate) fn run(&self, job: Job) {
        let Job { layer, task } = job;
        let region = task.area.intersect(&task.clip);
        if let Some(mut target) = region.and_then(|r| layer.load_target(&r)) {
            self.backend.execute(&mut target, &task);
            layer.store_target(target);
        }
        // A failure here was already reported; the task is left as is.
        _ = layer.complete(task.id);
        self.trace(&layer, &task, TaskStage::Ready);
        self.busy.store(false, Ordering::Release);
        self.ctx.signal.notify();
    }

    fn trace(&self, layer: &Layer, task: &TaskView, stage: TaskStage) {
        if !self.ctx.tracer.is_enabled() {
            return;
        }
        self.ctx.tracer.task(&TaskEvent {
            display: self.ctx.display,
            layer: layer.id(),
            task: task.id,
            kind: task.kind,
            unit: self.id,
            stage,
            timestamp: self.ctx.clock.now(),
        });
    }
}

/// A render unit driving backend `B`.
pub struct Unit<B: Backend> {
    core: Arc<Core<B>>,
    exec: Executor,
}

impl<B: Backend> Unit<B> {
    /// Creates a unit; with [`ExecutionMode::Worker`] this spawns its thread.
    #[must_use]
    pub fn new(id: UnitId, backend: B, mode: ExecutionMode, ctx: UnitContext) -> Self {
        let core = Arc::new(Core {
            id,
            backend,
            ctx,
            busy: AtomicBool::new(false),
        });
        let exec = Executor::new(&core, mode);
        Self { core, exec }
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.core.backend
    }

    /// Where claimed tasks run.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.exec.mode()
    }
}

impl<B: Backend> RenderUnit for Unit<B> {
    fn id(&self) -> UnitId {
        self.core.id
    }

    fn kind(&self) -> UnitKind {
        B::KIND
    }

    fn dispatch(&self, layer: &Arc<Layer>) -> Result<DispatchOutcome, RenderError> {
        let core = &self.core;
        if core.busy.swap(true, Ordering::AcqRel) {
            return Ok(DispatchOutcome::Busy);
        }
        if !core.backend.is_ready() {
            core.busy.store(false, Ordering::Release);
            return Ok(DispatchOutcome::NotReady);
        }
        let claimed = layer.claim_next(core.id, |t| core.backend.accepts(t));
        let task = match claimed {
            Ok(Some(task)) => task,
            Ok(None) => {
                core.busy.store(false, Ordering::Release);
                return Ok(DispatchOutcome::NothingAvailable);
            }
            Err(e) => {
                core.busy.store(false, Ordering::Release);
                return Err(e);
            }
        };
        core.trace(layer, &task, TaskStage::Claimed);
        self.exec.start(
            core,
            Job {
                layer: Arc::clone(layer),
                task,
            },
        );
        Ok(DispatchOutcome::Claimed)
    }

    fn is_busy(&self) -> bool {
        self.core.busy.load(Ordering::Acquire)
    }
}

impl<B: Backend> fmt::Debug for Unit<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.core.id)
            .field("kind", &B::KIND)
            .field("mode", &self.exec.mode())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::area::Area;
    use crate::color::{Color, ColorFormat};
    use crate::layer::LayerId;
    use crate::renderer::Renderers;
    use crate::task::{TaskKind, TaskState};
    use crate::time::ManualClock;

    pub(crate) fn context() -> UnitContext {
        UnitContext {
            display: DisplayId(0),
            signal: Arc::new(Signal::new()),
            tracer: Tracer::none(),
            clock: Arc::new(ManualClock::default()),
        }
    }

    fn base_layer() -> Arc<Layer> {
        let area = Area::new(0, 0, 9, 9);
        Arc::new(Layer::new(
            LayerId(0),
            DisplayId(0),
            ColorFormat::Rgb888,
            area,
            false,
            None,
            Arc::new(Signal::new()),
        ))
    }

    fn white_fill() -> Renderers {
        Renderers::new().with(TaskKind::Rectangle, |t: &mut DrawTarget, v: &TaskView| {
            t.fill(&v.area, Color::WHITE);
        })
    }

    #[test]
    fn inline_unit_runs_task_to_completion() {
        let ctx = context();
        let signal = Arc::clone(&ctx.signal);
        let unit = SoftwareUnit::new(UnitId(0), white_fill(), ExecutionMode::Inline, ctx);
        let layer = base_layer();
        let t = layer.push_task(TaskKind::Rectangle, Area::new(0, 0, 4, 4), Arc::new(()));

        let seen = signal.epoch();
        assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::Claimed);
        assert_eq!(layer.task_state(t), Some(TaskState::Ready));
        assert!(!unit.is_busy());
        assert_ne!(signal.epoch(), seen, "completion requests a redispatch");
        layer.with_pixels(|px, _| {
            let px = px.unwrap();
            assert_eq!(px.pixel(4, 4), Color::WHITE);
            assert_eq!(px.pixel(5, 5), Color::BLACK);
        });
        assert_eq!(
            unit.dispatch(&layer).unwrap(),
            DispatchOutcome::NothingAvailable
        );
    }

    #[test]
    fn missing_renderer_still_completes() {
        let unit = SoftwareUnit::new(UnitId(0), Renderers::new(), ExecutionMode::Inline, context());
        let layer = base_layer();
        let t = layer.push_task(TaskKind::Label, Area::new(0, 0, 4, 4), Arc::new(()));
        assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::Claimed);
        assert_eq!(layer.task_state(t), Some(TaskState::Ready));
    }

    struct Picky {
        ready: AtomicBool,
    }

    impl Accelerator for Picky {
        fn supports(&self, task: &DrawTask) -> bool {
            task.kind() == TaskKind::Image
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::Acquire)
        }

        fn execute(&self, target: &mut DrawTarget, task: &TaskView) {
            target.fill(&task.area, Color::rgb(0, 0, 255));
        }
    }

    #[test]
    fn accelerated_unit_takes_only_supported_tasks() {
        let unit = AcceleratedUnit::new(
            UnitId(1),
            Accelerated(Picky {
                ready: AtomicBool::new(false),
            }),
            ExecutionMode::Inline,
            context(),
        );
        assert_eq!(unit.kind(), UnitKind::Accelerated);
        let layer = base_layer();
        layer.push_task(TaskKind::Rectangle, Area::new(0, 0, 1, 1), Arc::new(()));
        let img = layer.push_task(TaskKind::Image, Area::new(5, 5, 6, 6), Arc::new(()));

        assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::NotReady);
        unit.backend().0.ready.store(true, Ordering::Release);
        assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::Claimed);
        assert_eq!(layer.task_state(img), Some(TaskState::Ready));
        assert_eq!(
            unit.dispatch(&layer).unwrap(),
            DispatchOutcome::NothingAvailable,
            "rectangle is left for someone else"
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn worker_unit_reports_busy_until_done() {
        use alloc::vec::Vec;
        use std::sync::{Barrier, Mutex};

        let gate = Arc::new(Barrier::new(2));
        let order = Arc::new(Mutex::new(Vec::new()));
        let renderers = {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            Renderers::new().with(TaskKind::Rectangle, move |_: &mut DrawTarget, v: &TaskView| {
                gate.wait();
                order.lock().unwrap().push(v.id);
            })
        };
        let ctx = context();
        let signal = Arc::clone(&ctx.signal);
        let unit = SoftwareUnit::new(UnitId(0), renderers, ExecutionMode::Worker, ctx);
        let layer = base_layer();
        let t = layer.push_task(TaskKind::Rectangle, Area::new(0, 0, 1, 1), Arc::new(()));
        layer.push_task(TaskKind::Rectangle, Area::new(5, 5, 6, 6), Arc::new(()));

        let seen = signal.epoch();
        assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::Claimed);
        assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::Busy);
        assert_eq!(layer.task_state(t), Some(TaskState::InProgress));

        gate.wait();
        signal.wait_past(seen);
        while unit.is_busy() {
            std::thread::yield_now();
        }
        assert_eq!(layer.task_state(t), Some(TaskState::Ready));
        assert_eq!(*order.lock().unwrap(), [t]);
        drop(unit);
    }

    #[cfg(feature = "std")]
    #[test]
    fn dropping_worker_unit_finishes_claimed_task() {
        for _ in 0..50 {
            let unit = SoftwareUnit::new(UnitId(0), white_fill(), ExecutionMode::Worker, context());
            let layer = base_layer();
            let t = layer.push_task(TaskKind::Rectangle, Area::new(0, 0, 4, 4), Arc::new(()));
            assert_eq!(unit.dispatch(&layer).unwrap(), DispatchOutcome::Claimed);
            drop(unit);
            assert_eq!(
                layer.task_state(t),
                Some(TaskState::Ready),
                "a claimed task completes even when its unit goes away"
            );
        }
    }
}
