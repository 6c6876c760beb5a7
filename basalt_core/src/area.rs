// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer rectangle algebra.
//!
//! An [`Area`] is an axis-aligned rectangle in display pixels with
//! **inclusive** corners: `Area::new(0, 0, 9, 9)` covers 10×10 pixels. Every
//! other module (invalidation, task overlap checks, buffer copies, flush
//! regions) speaks in `Area`s.
//!
//! Float geometry produced by layout code can be brought onto the pixel grid
//! with [`Area::from_rect`], which rounds outward so no touched pixel is lost.

use core::fmt;

/// An axis-aligned pixel rectangle with inclusive corners.
///
/// An area whose right edge lies left of its left edge (or bottom above top)
/// is *empty* and covers no pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Area {
    /// Left column (inclusive).
    pub x1: i32,
    /// Top row (inclusive).
    pub y1: i32,
    /// Right column (inclusive).
    pub x2: i32,
    /// Bottom row (inclusive).
    pub y2: i32,
}

impl Area {
    /// An area covering no pixels.
    pub const EMPTY: Self = Self {
        x1: 0,
        y1: 0,
        x2: -1,
        y2: -1,
    };

    /// Creates an area from inclusive corner coordinates.
    #[inline]
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Creates an area from its top-left corner and a size in pixels.
    ///
    /// A zero width or height yields an empty area.
    #[inline]
    #[must_use]
    pub const fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width - 1,
            y2: y + height - 1,
        }
    }

    /// Width in pixels (zero for empty areas).
    #[inline]
    #[must_use]
    pub const fn width(&self) -> i32 {
        if self.x2 < self.x1 {
            0
        } else {
            self.x2 - self.x1 + 1
        }
    }

    /// Height in pixels (zero for empty areas).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> i32 {
        if self.y2 < self.y1 {
            0
        } else {
            self.y2 - self.y1 + 1
        }
    }

    /// Number of pixels covered.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Returns `true` if the area covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.x2 < self.x1 || self.y2 < self.y1
    }

    /// Returns the common part of two areas, or `None` if they share no
    /// pixel.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let res = Self {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        };
        (!res.is_empty()).then_some(res)
    }

    /// Returns the smallest area containing both inputs.
    ///
    /// Empty inputs are ignored; joining two empty areas yields
    /// [`Area::EMPTY`].
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => Self::EMPTY,
            (true, false) => *other,
            (false, true) => *self,
            (false, false) => Self {
                x1: self.x1.min(other.x1),
                y1: self.y1.min(other.y1),
                x2: self.x2.max(other.x2),
                y2: self.y2.max(other.y2),
            },
        }
    }

    /// Returns `true` if the two areas share at least one pixel.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x1 <= other.x2
            && self.x2 >= other.x1
            && self.y1 <= other.y2
            && self.y2 >= other.y1
    }

    /// Returns `true` if `other` lies completely inside `self`.
    ///
    /// An empty `other` is never contained.
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        !other.is_empty()
            && other.x1 >= self.x1
            && other.y1 >= self.y1
            && other.x2 <= self.x2
            && other.y2 <= self.y2
    }

    /// Returns `true` if the pixel `(x, y)` is inside the area.
    #[inline]
    #[must_use]
    pub const fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// Returns the area shifted by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn translate(&self, dx: i32, dy: i32) -> Self {
        Self {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Splits the area into horizontal bands of at most `max_rows` rows.
    ///
    /// `max_rows` of zero is treated as one.
    #[must_use]
    pub fn rows(&self, max_rows: i32) -> Rows {
        Rows {
            area: *self,
            next_y: self.y1,
            step: max_rows.max(1),
        }
    }

    /// Converts a float rectangle to the pixel grid, rounding outward.
    ///
    /// A pixel is included when the rectangle touches any part of it.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "display coordinates fit comfortably in i32"
    )]
    pub fn from_rect(rect: kurbo::Rect) -> Self {
        let r = rect.abs().expand();
        if r.width() <= 0.0 || r.height() <= 0.0 {
            return Self::EMPTY;
        }
        Self {
            x1: r.x0 as i32,
            y1: r.y0 as i32,
            x2: r.x1 as i32 - 1,
            y2: r.y1 as i32 - 1,
        }
    }

    /// Converts the area to a float rectangle covering the same pixels.
    #[must_use]
    pub fn to_rect(&self) -> kurbo::Rect {
        if self.is_empty() {
            return kurbo::Rect::ZERO;
        }
        kurbo::Rect::new(
            f64::from(self.x1),
            f64::from(self.y1),
            f64::from(self.x2) + 1.0,
            f64::from(self.y2) + 1.0,
        )
    }
}

impl fmt::Debug for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Area({},{} → {},{})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Iterator over the horizontal bands of an [`Area`].
///
/// Created by [`Area::rows`].
#[derive(Clone, Debug)]
pub struct Rows {
    area: Area,
    next_y: i32,
    step: i32,
}

impl Iterator for Rows {
    type Item = Area;

    fn next(&mut self) -> Option<Area> {
        if self.area.is_empty() || self.next_y > self.area.y2 {
            return None;
        }
        let y1 = self.next_y;
        let y2 = (y1 + self.step - 1).min(self.area.y2);
        self.next_y = y2 + 1;
        Some(Area::new(self.area.x1, y1, self.area.x2, y2))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn inclusive_dimensions() {
        let a = Area::new(0, 0, 9, 4);
        assert_eq!(a.width(), 10);
        assert_eq!(a.height(), 5);
        assert_eq!(a.size(), 50);
        assert!(!a.is_empty());
        assert!(Area::EMPTY.is_empty());
        assert_eq!(Area::EMPTY.size(), 0);
    }

    #[test]
    fn from_origin_size_matches_new() {
        assert_eq!(Area::from_origin_size(3, 4, 2, 2), Area::new(3, 4, 4, 5));
        assert!(Area::from_origin_size(3, 4, 0, 2).is_empty());
    }

    #[test]
    fn intersect_and_overlap() {
        let a = Area::new(0, 0, 10, 10);
        let b = Area::new(5, 5, 15, 15);
        assert_eq!(a.intersect(&b), Some(Area::new(5, 5, 10, 10)));
        assert!(a.overlaps(&b));

        // Touching edges share no pixel.
        let c = Area::new(11, 0, 20, 10);
        assert_eq!(a.intersect(&c), None);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn join_ignores_empty() {
        let a = Area::new(0, 0, 10, 10);
        let b = Area::new(5, 5, 15, 15);
        assert_eq!(a.join(&b), Area::new(0, 0, 15, 15));
        assert_eq!(a.join(&Area::EMPTY), a);
        assert_eq!(Area::EMPTY.join(&Area::EMPTY), Area::EMPTY);
    }

    #[test]
    fn containment() {
        let outer = Area::new(0, 0, 10, 10);
        assert!(outer.contains(&Area::new(2, 2, 5, 5)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&Area::new(2, 2, 11, 5)));
        assert!(!outer.contains(&Area::EMPTY));
        assert!(outer.contains_point(10, 10));
        assert!(!outer.contains_point(11, 10));
    }

    #[test]
    fn rows_cover_area_exactly() {
        let a = Area::new(0, 0, 99, 9);
        let bands: Vec<_> = a.rows(4).collect();
        assert_eq!(
            bands,
            [
                Area::new(0, 0, 99, 3),
                Area::new(0, 4, 99, 7),
                Area::new(0, 8, 99, 9)
            ]
        );
        let total: u64 = bands.iter().map(Area::size).sum();
        assert_eq!(total, a.size());
        assert_eq!(Area::EMPTY.rows(4).count(), 0);
    }

    #[test]
    fn rect_round_trip_rounds_outward() {
        let a = Area::from_rect(kurbo::Rect::new(1.2, 2.5, 4.1, 4.0));
        assert_eq!(a, Area::new(1, 2, 4, 3));
        assert_eq!(Area::new(1, 2, 4, 3).to_rect(), kurbo::Rect::new(1.0, 2.0, 5.0, 4.0));
        assert!(Area::from_rect(kurbo::Rect::new(1.0, 1.0, 1.0, 5.0)).is_empty());
    }
}
