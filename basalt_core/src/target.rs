// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The pixels a renderer draws into.
//!
//! A [`DrawTarget`] is a private copy of the region of a layer a task may
//! touch, addressed in absolute display coordinates. The render unit copies
//! the region out of the layer, lets the renderer draw, and writes the region
//! back. Tasks running concurrently on different units never overlap, so
//! their write-backs never collide.

use core::fmt;

use crate::area::Area;
use crate::buffer::PixelBuffer;
use crate::color::{Color, ColorFormat};

/// A rectangular pixel region in display coordinates.
pub struct DrawTarget {
    area: Area,
    pixels: PixelBuffer,
}

impl DrawTarget {
    /// Creates a zeroed target covering `area`.
    #[must_use]
    pub fn new(area: Area, format: ColorFormat) -> Self {
        let pixels = PixelBuffer::new(format, dim(area.width()), dim(area.height()));
        Self { area, pixels }
    }

    pub(crate) fn from_pixels(area: Area, pixels: PixelBuffer) -> Self {
        Self { area, pixels }
    }

    /// The region covered, in display coordinates.
    #[inline]
    #[must_use]
    pub fn area(&self) -> Area {
        self.area
    }

    /// Pixel format.
    #[inline]
    #[must_use]
    pub fn format(&self) -> ColorFormat {
        self.pixels.format()
    }

    /// The underlying buffer, addressed from the target's top-left corner.
    #[must_use]
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Mutable access to the underlying buffer.
    #[must_use]
    pub fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    /// Reads the pixel at display coordinates `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let (lx, ly) = self.local(x, y)?;
        Some(self.pixels.pixel(lx, ly))
    }

    /// Writes the pixel at display coordinates `(x, y)`; outside pixels are
    /// ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some((lx, ly)) = self.local(x, y) {
            self.pixels.set_pixel(lx, ly, color);
        }
    }

    /// Fills `area` (display coordinates) with `color`, clipped to the
    /// target.
    pub fn fill(&mut self, area: &Area, color: Color) {
        let local = area.translate(-self.area.x1, -self.area.y1);
        self.pixels.fill(&local, color);
    }

    /// Zeroes `area` (display coordinates), clipped to the target.
    pub fn clear(&mut self, area: &Area) {
        let local = area.translate(-self.area.x1, -self.area.y1);
        self.pixels.clear(&local);
    }

    /// Blends `color` over `area` with extra opacity `opa`.
    ///
    /// An opaque color at full opacity takes the [`fill`](Self::fill) fast
    /// path.
    pub fn blend(&mut self, area: &Area, color: Color, opa: u8) {
        if opa == 255 && color.a == 255 {
            self.fill(area, color);
            return;
        }
        let Some(area) = area.intersect(&self.area) else {
            return;
        };
        for y in area.y1..=area.y2 {
            for x in area.x1..=area.x2 {
                if let Some(dst) = self.pixel(x, y) {
                    self.set_pixel(x, y, color.over(dst, opa));
                }
            }
        }
    }

    /// Composites `src` over the overlapping part of `self` with extra
    /// opacity `opa`.
    pub fn blit(&mut self, src: &Self, opa: u8) {
        let Some(area) = src.area.intersect(&self.area) else {
            return;
        };
        if opa == 255 && !src.format().has_alpha() && src.format() == self.format() {
            let dst = area.translate(-self.area.x1, -self.area.y1);
            let from = area.translate(-src.area.x1, -src.area.y1);
            self.pixels.copy_from(&dst, &src.pixels, &from);
            return;
        }
        for y in area.y1..=area.y2 {
            for x in area.x1..=area.x2 {
                if let (Some(s), Some(d)) = (src.pixel(x, y), self.pixel(x, y)) {
                    self.set_pixel(x, y, s.over(d, opa));
                }
            }
        }
    }

    pub(crate) fn into_parts(self) -> (Area, PixelBuffer) {
        (self.area, self.pixels)
    }

    fn local(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        self.area
            .contains_point(x, y)
            .then(|| ((x - self.area.x1) as u32, (y - self.area.y1) as u32))
    }
}

impl fmt::Debug for DrawTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawTarget")
            .field("area", &self.area)
            .field("format", &self.format())
            .finish_non_exhaustive()
    }
}

fn dim(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}
