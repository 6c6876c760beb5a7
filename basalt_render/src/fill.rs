// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle fills.

use basalt_core::area::Area;
use basalt_core::color::Color;
use basalt_core::renderer::Renderer;
use basalt_core::target::DrawTarget;
use basalt_core::task::TaskView;

/// A border drawn inside the rectangle's edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Border {
    /// Border color.
    pub color: Color,
    /// Thickness in pixels.
    pub width: i32,
}

/// Payload of a [`TaskKind::Rectangle`](basalt_core::task::TaskKind::Rectangle)
/// task drawn by [`FillRenderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectDescriptor {
    /// Fill color.
    pub color: Color,
    /// Extra opacity applied to fill and border (255 = as is).
    pub opa: u8,
    /// Optional border.
    pub border: Option<Border>,
}

impl RectDescriptor {
    /// An opaque fill without border.
    #[must_use]
    pub const fn solid(color: Color) -> Self {
        Self {
            color,
            opa: 255,
            border: None,
        }
    }

    /// Sets the opacity.
    #[must_use]
    pub const fn with_opa(mut self, opa: u8) -> Self {
        self.opa = opa;
        self
    }

    /// Adds a border.
    #[must_use]
    pub const fn with_border(mut self, color: Color, width: i32) -> Self {
        self.border = Some(Border { color, width });
        self
    }
}

/// Draws [`RectDescriptor`] rectangles.
///
/// Tasks without a `RectDescriptor` are skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct FillRenderer;

impl Renderer for FillRenderer {
    fn render(&self, target: &mut DrawTarget, task: &TaskView) {
        let Some(rect) = task.descriptor::<RectDescriptor>() else {
            log::debug!("{:?}: rectangle task without RectDescriptor", task.id);
            return;
        };
        let Some(area) = task.area.intersect(&task.clip) else {
            return;
        };
        target.blend(&area, rect.color, rect.opa);

        let Some(border) = rect.border.filter(|b| b.width > 0) else {
            return;
        };
        let outer = task.area;
        let w = border.width;
        let edges = [
            Area::new(outer.x1, outer.y1, outer.x2, outer.y1 + w - 1),
            Area::new(outer.x1, outer.y2 - w + 1, outer.x2, outer.y2),
            Area::new(outer.x1, outer.y1 + w, outer.x1 + w - 1, outer.y2 - w),
            Area::new(outer.x2 - w + 1, outer.y1 + w, outer.x2, outer.y2 - w),
        ];
        for edge in edges {
            if let Some(edge) = edge.intersect(&area) {
                target.blend(&edge, border.color, rect.opa);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use basalt_core::color::ColorFormat;
    use basalt_core::task::{TaskId, TaskKind};

    use super::*;

    fn view(area: Area, clip: Area, rect: RectDescriptor) -> TaskView {
        TaskView {
            id: TaskId(0),
            kind: TaskKind::Rectangle,
            area,
            clip,
            descriptor: Arc::new(rect),
            source: None,
        }
    }

    #[test]
    fn fill_respects_clip() {
        let mut target = DrawTarget::new(Area::new(0, 0, 9, 9), ColorFormat::Rgb888);
        let task = view(
            Area::new(0, 0, 9, 9),
            Area::new(0, 0, 4, 9),
            RectDescriptor::solid(Color::WHITE),
        );
        FillRenderer.render(&mut target, &task);
        assert_eq!(target.pixel(4, 5), Some(Color::WHITE));
        assert_eq!(target.pixel(5, 5), Some(Color::BLACK), "outside the clip");
    }

    #[test]
    fn border_is_drawn_inside_the_edge() {
        let red = Color::rgb(255, 0, 0);
        let mut target = DrawTarget::new(Area::new(0, 0, 9, 9), ColorFormat::Rgb888);
        let task = view(
            Area::new(0, 0, 9, 9),
            Area::new(0, 0, 9, 9),
            RectDescriptor::solid(Color::WHITE).with_border(red, 2),
        );
        FillRenderer.render(&mut target, &task);
        assert_eq!(target.pixel(0, 0), Some(red));
        assert_eq!(target.pixel(1, 5), Some(red));
        assert_eq!(target.pixel(8, 8), Some(red));
        assert_eq!(target.pixel(2, 2), Some(Color::WHITE));
    }

    #[test]
    fn translucent_fill_blends() {
        let mut target = DrawTarget::new(Area::new(0, 0, 1, 1), ColorFormat::Rgb888);
        let task = view(
            Area::new(0, 0, 1, 1),
            Area::new(0, 0, 1, 1),
            RectDescriptor::solid(Color::WHITE).with_opa(128),
        );
        FillRenderer.render(&mut target, &task);
        let px = target.pixel(0, 0).unwrap();
        assert!(px.r > 100 && px.r < 160, "half way between black and white, got {px:?}");
    }

    #[test]
    fn missing_descriptor_draws_nothing() {
        let mut target = DrawTarget::new(Area::new(0, 0, 1, 1), ColorFormat::Rgb888);
        let mut task = view(
            Area::new(0, 0, 1, 1),
            Area::new(0, 0, 1, 1),
            RectDescriptor::solid(Color::WHITE),
        );
        task.descriptor = Arc::new(7_u32);
        FillRenderer.render(&mut target, &task);
        assert_eq!(target.pixel(0, 0), Some(Color::BLACK));
    }
}
