// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw tasks and the per-layer task queue.
//!
//! A [`DrawTask`] is one paint operation: an area, a [`TaskKind`], an opaque
//! descriptor the matching renderer understands, and a clip. Its
//! [`TaskState`] only moves forward, `Queued → InProgress → Ready`.
//!
//! [`TaskQueue`] keeps tasks in insertion order and decides which task may run
//! next. Tasks whose areas overlap must run in insertion order; disjoint tasks
//! may run in any order or concurrently. A queued task is therefore eligible
//! only when no overlapping task is in progress and no earlier overlapping
//! task is still waiting. Layer-composite tasks additionally wait until their
//! source layer has drained.
//!
//! The queue itself is plain data. The owning [`Layer`] wraps it in a lock so
//! that finding and claiming a task is one atomic step.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::area::Area;
use crate::error::{ProtocolViolation, violation};
use crate::layer::Layer;
use crate::unit::UnitId;

/// Opaque, shareable draw descriptor.
///
/// Renderers downcast it to the concrete type they expect.
pub type Descriptor = Arc<dyn Any + Send + Sync>;

/// Identifies a task within its layer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TaskId(pub u64);

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// The kind of paint operation a task performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Filled or outlined rectangle.
    Rectangle,
    /// Shaped text.
    Label,
    /// Decoded image.
    Image,
    /// Composite of another layer's pixels.
    Layer,
}

impl TaskKind {
    /// Number of kinds.
    pub const COUNT: usize = 4;

    /// All kinds, in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Rectangle, Self::Label, Self::Image, Self::Layer];

    /// Dense index for per-kind tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Rectangle => 0,
            Self::Label => 1,
            Self::Image => 2,
            Self::Layer => 3,
        }
    }
}

/// Lifecycle of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting for a render unit.
    Queued,
    /// Claimed by exactly one render unit.
    InProgress,
    /// Finished.
    Ready,
}

/// One paint operation on a layer.
pub struct DrawTask {
    id: TaskId,
    kind: TaskKind,
    area: Area,
    clip: Area,
    descriptor: Descriptor,
    source: Option<Arc<Layer>>,
    state: TaskState,
    owner: Option<UnitId>,
}

impl DrawTask {
    /// The task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The kind of paint operation.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// The area being painted.
    #[must_use]
    pub fn area(&self) -> Area {
        self.area
    }

    /// The clip in effect when the task was pushed.
    #[must_use]
    pub fn clip(&self) -> Area {
        self.clip
    }

    /// The pixels the task may write: its area inside its clip.
    #[must_use]
    pub fn bounds(&self) -> Area {
        self.area.intersect(&self.clip).unwrap_or(Area::EMPTY)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Source layer of a layer-composite task.
    #[must_use]
    pub fn source(&self) -> Option<&Arc<Layer>> {
        self.source.as_ref()
    }

    /// The unit holding or having held the task.
    #[must_use]
    pub fn owner(&self) -> Option<UnitId> {
        self.owner
    }

    /// Snapshot handed to renderers.
    #[must_use]
    pub fn view(&self) -> TaskView {
        TaskView {
            id: self.id,
            kind: self.kind,
            area: self.area,
            clip: self.clip,
            descriptor: Arc::clone(&self.descriptor),
            source: self.source.clone(),
        }
    }
}

impl fmt::Debug for DrawTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawTask")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("area", &self.area)
            .field("clip", &self.clip)
            .field("state", &self.state)
            .field("owner", &self.owner)
            .field("source", &self.source.as_ref().map(|l| l.id()))
            .finish_non_exhaustive()
    }
}

/// What a renderer sees of a claimed task.
#[derive(Clone)]
pub struct TaskView {
    /// The task's id.
    pub id: TaskId,
    /// The kind of paint operation.
    pub kind: TaskKind,
    /// The area being painted.
    pub area: Area,
    /// The clip in effect.
    pub clip: Area,
    /// Kind-specific payload.
    pub descriptor: Descriptor,
    /// Source layer of a layer-composite task.
    pub source: Option<Arc<Layer>>,
}

impl TaskView {
    /// Downcasts the descriptor.
    #[must_use]
    pub fn descriptor<T: Any>(&self) -> Option<&T> {
        self.descriptor.downcast_ref()
    }
}

impl fmt::Debug for TaskView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskView")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("area", &self.area)
            .field("clip", &self.clip)
            .field("source", &self.source.as_ref().map(|l| l.id()))
            .finish_non_exhaustive()
    }
}

/// Ordered tasks of one layer.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<DrawTask>,
    next_id: u64,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a queued task.
    pub fn push(
        &mut self,
        kind: TaskKind,
        area: Area,
        clip: Area,
        descriptor: Descriptor,
        source: Option<Arc<Layer>>,
    ) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(DrawTask {
            id,
            kind,
            area,
            clip,
            descriptor,
            source,
            state: TaskState::Queued,
            owner: None,
        });
        id
    }

    /// Returns the earliest task that may start now.
    ///
    /// With `after`, only tasks inserted after that one are considered, which
    /// lets a unit that rejects a candidate look further.
    #[must_use]
    pub fn next_available(&self, after: Option<TaskId>) -> Option<TaskId> {
        let start = after
            .and_then(|id| self.position(id))
            .map_or(0, |i| i + 1);
        self.tasks
            .iter()
            .enumerate()
            .skip(start)
            .find(|(i, t)| t.state == TaskState::Queued && self.is_unblocked(*i))
            .map(|(_, t)| t.id)
    }

    /// Moves a queued task to in-progress on behalf of `unit`.
    pub fn claim(&mut self, id: TaskId, unit: UnitId) -> Result<TaskView, ProtocolViolation> {
        let Some(task) = self.get_mut(id) else {
            return Err(violation(ProtocolViolation::TaskNotQueued));
        };
        if task.state != TaskState::Queued {
            return Err(violation(ProtocolViolation::TaskNotQueued));
        }
        task.state = TaskState::InProgress;
        task.owner = Some(unit);
        Ok(task.view())
    }

    /// Moves an in-progress task to ready.
    pub fn complete(&mut self, id: TaskId) -> Result<(), ProtocolViolation> {
        match self.get_mut(id) {
            Some(task) if task.state == TaskState::InProgress => {
                task.state = TaskState::Ready;
                Ok(())
            }
            _ => Err(violation(ProtocolViolation::TaskNotInProgress)),
        }
    }

    /// Looks up a task.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&DrawTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Iterates over tasks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DrawTask> + '_ {
        self.tasks.iter()
    }

    /// Number of tasks, ready or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if the queue holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks in `state`.
    #[must_use]
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    /// Returns `true` once every task is ready.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Ready)
    }

    /// Returns `true` if some task is waiting to be claimed.
    #[must_use]
    pub fn has_queued(&self) -> bool {
        self.tasks.iter().any(|t| t.state == TaskState::Queued)
    }

    /// Drops finished tasks, returning how many were removed.
    pub fn remove_ready(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.state != TaskState::Ready);
        before - self.tasks.len()
    }

    /// Drops tasks nobody has claimed yet, returning how many were removed.
    pub fn remove_queued(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.state != TaskState::Queued);
        before - self.tasks.len()
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TaskId) -> Option<&mut DrawTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn is_unblocked(&self, i: usize) -> bool {
        let task = &self.tasks[i];
        if task.source.as_ref().is_some_and(|src| !src.is_drained()) {
            return false;
        }
        let bounds = task.bounds();
        self.tasks.iter().enumerate().all(|(j, other)| {
            j == i
                || !other.bounds().overlaps(&bounds)
                || match other.state {
                    TaskState::Ready => true,
                    TaskState::InProgress => false,
                    TaskState::Queued => j > i,
                }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP: Area = Area::new(0, 0, 99, 99);
    const UNIT: UnitId = UnitId(0);

    fn desc() -> Descriptor {
        Arc::new(())
    }

    fn push(q: &mut TaskQueue, area: Area) -> TaskId {
        q.push(TaskKind::Rectangle, area, CLIP, desc(), None)
    }

    #[test]
    fn disjoint_tasks_are_all_available() {
        let mut q = TaskQueue::new();
        let a = push(&mut q, Area::new(0, 0, 9, 9));
        let b = push(&mut q, Area::new(20, 0, 29, 9));
        assert_eq!(q.next_available(None), Some(a));
        q.claim(a, UNIT).unwrap();
        assert_eq!(q.next_available(None), Some(b));
    }

    #[test]
    fn overlapping_tasks_run_in_insertion_order() {
        let mut q = TaskQueue::new();
        let t1 = push(&mut q, Area::new(0, 0, 9, 9));
        let t2 = push(&mut q, Area::new(5, 5, 14, 14));
        assert_eq!(q.next_available(None), Some(t1));
        // Even when t1 is skipped, t2 must wait behind it.
        assert_eq!(q.next_available(Some(t1)), None);

        q.claim(t1, UNIT).unwrap();
        assert_eq!(q.next_available(None), None, "t2 overlaps in-progress t1");
        q.complete(t1).unwrap();
        assert_eq!(q.next_available(None), Some(t2));
    }

    #[test]
    fn clip_limits_overlap() {
        let mut q = TaskQueue::new();
        q.push(
            TaskKind::Rectangle,
            Area::new(0, 0, 20, 20),
            Area::new(0, 0, 9, 9),
            desc(),
            None,
        );
        let b = push(&mut q, Area::new(10, 10, 20, 20));
        assert_eq!(q.next_available(Some(TaskId(0))), Some(b));
    }

    #[test]
    fn states_only_move_forward() {
        let mut q = TaskQueue::new();
        let t = push(&mut q, Area::new(0, 0, 1, 1));
        assert_eq!(q.get(t).unwrap().state(), TaskState::Queued);
        let view = q.claim(t, UNIT).unwrap();
        assert_eq!(view.id, t);
        assert_eq!(q.get(t).unwrap().owner(), Some(UNIT));
        q.complete(t).unwrap();
        assert_eq!(q.get(t).unwrap().state(), TaskState::Ready);
        assert!(q.all_ready());
        assert_eq!(q.remove_ready(), 1);
        assert!(q.is_empty());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "protocol violation")]
    fn double_claim_panics_in_debug() {
        let mut q = TaskQueue::new();
        let t = push(&mut q, Area::new(0, 0, 1, 1));
        q.claim(t, UNIT).unwrap();
        _ = q.claim(t, UnitId(1));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "protocol violation")]
    fn completing_a_queued_task_panics_in_debug() {
        let mut q = TaskQueue::new();
        let t = push(&mut q, Area::new(0, 0, 1, 1));
        _ = q.complete(t);
    }

    #[test]
    fn descriptor_downcast() {
        let mut q = TaskQueue::new();
        let t = q.push(TaskKind::Label, Area::new(0, 0, 1, 1), CLIP, Arc::new(7_u32), None);
        let view = q.claim(t, UNIT).unwrap();
        assert_eq!(view.descriptor::<u32>(), Some(&7));
        assert_eq!(view.descriptor::<i64>(), None);
    }
}
