// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kind-specific renderers.
//!
//! A [`Renderer`] draws one claimed task into a [`DrawTarget`]. The core
//! treats renderers as opaque: rectangle filling, text, and image decoding all
//! live outside it. [`Renderers`] maps each [`TaskKind`] to at most one
//! renderer and is what software render units execute with.

use alloc::sync::Arc;
use core::fmt;

use crate::target::DrawTarget;
use crate::task::{TaskKind, TaskView};

/// Draws one kind of task.
///
/// Called synchronously by a single render unit at a time for a given task;
/// implementations must not block on the refresh cycle.
pub trait Renderer: Send + Sync {
    /// Draws `task` into `target`.
    ///
    /// `target` covers exactly the part of the layer the task may touch.
    fn render(&self, target: &mut DrawTarget, task: &TaskView);
}

impl<F> Renderer for F
where
    F: Fn(&mut DrawTarget, &TaskView) + Send + Sync,
{
    fn render(&self, target: &mut DrawTarget, task: &TaskView) {
        self(target, task);
    }
}

/// One renderer slot per [`TaskKind`].
#[derive(Clone, Default)]
pub struct Renderers {
    table: [Option<Arc<dyn Renderer>>; TaskKind::COUNT],
}

impl Renderers {
    /// A table with no renderers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table with `renderer` installed for `kind`.
    #[must_use]
    pub fn with(mut self, kind: TaskKind, renderer: impl Renderer + 'static) -> Self {
        self.set(kind, renderer);
        self
    }

    /// Installs `renderer` for `kind`, replacing any previous one.
    pub fn set(&mut self, kind: TaskKind, renderer: impl Renderer + 'static) {
        self.table[kind.index()] = Some(Arc::new(renderer));
    }

    /// Removes the renderer for `kind`.
    pub fn remove(&mut self, kind: TaskKind) {
        self.table[kind.index()] = None;
    }

    /// The renderer for `kind`, if installed.
    #[must_use]
    pub fn get(&self, kind: TaskKind) -> Option<&dyn Renderer> {
        self.table[kind.index()].as_deref()
    }

    /// Returns `true` if `kind` has a renderer.
    #[must_use]
    pub fn handles(&self, kind: TaskKind) -> bool {
        self.table[kind.index()].is_some()
    }
}

impl fmt::Debug for Renderers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for kind in TaskKind::ALL {
            if self.handles(kind) {
                list.entry(&kind);
            }
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::color::{Color, ColorFormat};
    use crate::task::TaskId;

    #[test]
    fn closures_are_renderers() {
        let renderers = Renderers::new().with(TaskKind::Rectangle, |t: &mut DrawTarget, v: &TaskView| {
            t.fill(&v.area, Color::WHITE);
        });
        assert!(renderers.handles(TaskKind::Rectangle));
        assert!(!renderers.handles(TaskKind::Label));

        let view = TaskView {
            id: TaskId(0),
            kind: TaskKind::Rectangle,
            area: Area::new(0, 0, 1, 1),
            clip: Area::new(0, 0, 9, 9),
            descriptor: Arc::new(()),
            source: None,
        };
        let mut target = DrawTarget::new(Area::new(0, 0, 3, 3), ColorFormat::Rgb565);
        renderers
            .get(TaskKind::Rectangle)
            .unwrap()
            .render(&mut target, &view);
        assert_eq!(target.pixel(1, 1), Some(Color::WHITE));
        assert_eq!(target.pixel(2, 2), Some(Color::BLACK));
    }
}
