// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer composites.

use basalt_core::renderer::Renderer;
use basalt_core::target::DrawTarget;
use basalt_core::task::TaskView;

/// Payload of a [`TaskKind::Layer`](basalt_core::task::TaskKind::Layer) task
/// drawn by [`CompositeRenderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerDescriptor {
    /// Opacity of the whole layer (255 = as is).
    pub opa: u8,
}

impl Default for LayerDescriptor {
    fn default() -> Self {
        Self { opa: 255 }
    }
}

/// Blends a task's source layer onto the target.
///
/// The source is read at the same display coordinates it is drawn to. Tasks
/// without a [`LayerDescriptor`] composite at full opacity.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositeRenderer;

impl Renderer for CompositeRenderer {
    fn render(&self, target: &mut DrawTarget, task: &TaskView) {
        let Some(source) = &task.source else {
            log::debug!("{:?}: layer task without a source layer", task.id);
            return;
        };
        let opa = task.descriptor::<LayerDescriptor>().map_or(255, |d| d.opa);
        if opa == 0 {
            return;
        }
        let Some(region) = task.area.intersect(&task.clip) else {
            return;
        };
        if let Some(src) = source.load_target(&region) {
            target.blit(&src, opa);
        }
    }
}
