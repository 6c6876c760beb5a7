// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU render units.

use super::{Backend, Unit, UnitKind};
use crate::renderer::Renderers;
use crate::target::DrawTarget;
use crate::task::TaskView;

/// A render unit that runs [`Renderers`] on the CPU.
pub type SoftwareUnit = Unit<Renderers>;

impl Backend for Renderers {
    const KIND: UnitKind = UnitKind::Software;

    fn execute(&self, target: &mut DrawTarget, task: &TaskView) {
        match self.get(task.kind) {
            Some(renderer) => renderer.render(target, task),
            None => log::debug!("no renderer for {:?}, skipping {:?}", task.kind, task.id),
        }
    }
}
