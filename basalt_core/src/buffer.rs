// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel buffers and the memory they are charged against.
//!
//! A [`PixelBuffer`] is a zero-initialized block of packed pixels with a
//! format, a width, and a height. Storage is kept as `u32` words so every
//! buffer is 4-byte aligned regardless of format; [`bytemuck`] provides the
//! byte view that renderers and flush targets work with.
//!
//! Buffers may be *reshaped* to any geometry that fits their capacity. Partial
//! rendering relies on this: one draw buffer holds successive horizontal bands
//! of varying width.
//!
//! Buffers allocated with [`PixelBuffer::try_new`] are charged against an
//! optional [`MemoryBudget`] and hand the bytes back when dropped.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::area::Area;
use crate::color::{Color, ColorFormat};
use crate::error::ConfigError;

/// An upper bound on layer pixel memory.
#[derive(Debug)]
pub struct MemoryBudget {
    limit: Option<usize>,
    used: AtomicUsize,
}

impl MemoryBudget {
    /// A budget that never refuses.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            limit: None,
            used: AtomicUsize::new(0),
        }
    }

    /// A budget of at most `bytes` bytes.
    #[must_use]
    pub const fn limited(bytes: usize) -> Self {
        Self {
            limit: Some(bytes),
            used: AtomicUsize::new(0),
        }
    }

    /// The configured limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Bytes currently charged.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Charges `bytes` if they fit. Returns `false` without charging
    /// otherwise.
    pub fn try_charge(&self, bytes: usize) -> bool {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                match self.limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            })
            .is_ok()
    }

    /// Returns `bytes` to the budget.
    pub fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Pixel memory could not be obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot allocate {bytes} bytes of pixel memory")]
pub struct AllocError {
    /// Requested size.
    pub bytes: usize,
}

/// A block of packed pixels.
pub struct PixelBuffer {
    words: Vec<u32>,
    format: ColorFormat,
    width: u32,
    height: u32,
    charged: Option<(Arc<MemoryBudget>, usize)>,
}

impl PixelBuffer {
    /// Allocates a zeroed buffer of `width × height` pixels.
    #[must_use]
    pub fn new(format: ColorFormat, width: u32, height: u32) -> Self {
        let bytes = byte_len(format, width, height);
        Self {
            words: alloc::vec![0; bytes.div_ceil(4)],
            format,
            width,
            height,
            charged: None,
        }
    }

    /// Allocates a zeroed buffer, charging it against `budget`.
    ///
    /// Fails when the budget is exhausted or the allocator refuses.
    pub fn try_new(
        format: ColorFormat,
        width: u32,
        height: u32,
        budget: Option<&Arc<MemoryBudget>>,
    ) -> Result<Self, AllocError> {
        let bytes = byte_len(format, width, height);
        if let Some(budget) = budget
            && !budget.try_charge(bytes)
        {
            return Err(AllocError { bytes });
        }
        let release = || {
            if let Some(budget) = budget {
                budget.release(bytes);
            }
        };
        let mut words = Vec::new();
        if words.try_reserve_exact(bytes.div_ceil(4)).is_err() {
            release();
            return Err(AllocError { bytes });
        }
        words.resize(bytes.div_ceil(4), 0);
        Ok(Self {
            words,
            format,
            width,
            height,
            charged: budget.map(|b| (Arc::clone(b), bytes)),
        })
    }

    /// Pixel format.
    #[inline]
    #[must_use]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Bytes in use for the current geometry.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Returns `true` if the buffer holds no pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes of backing storage.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len() * 4
    }

    /// The local area covered, `(0, 0)` to `(width - 1, height - 1)`.
    #[must_use]
    pub fn bounds(&self) -> Area {
        Area::from_origin_size(0, 0, self.width as i32, self.height as i32)
    }

    /// Pixel bytes for the current geometry.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.len();
        &bytemuck::cast_slice(&self.words)[..len]
    }

    /// Mutable pixel bytes for the current geometry.
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut bytemuck::cast_slice_mut(&mut self.words)[..len]
    }

    /// Changes the geometry without touching the pixel bytes.
    ///
    /// Fails if the new geometry needs more than [`capacity`](Self::capacity)
    /// bytes.
    pub fn reshape(
        &mut self,
        format: ColorFormat,
        width: u32,
        height: u32,
    ) -> Result<(), ConfigError> {
        let needed = byte_len(format, width, height);
        if needed > self.capacity() {
            let bpp = format.bytes_per_pixel();
            return Err(ConfigError::BufferTooSmall {
                needed: needed / bpp,
                available: self.capacity() / bpp,
            });
        }
        self.format = format;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Reads the pixel at local `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let bpp = self.format.bytes_per_pixel();
        let at = self.offset(x, y);
        Color::read(self.format, &self.as_bytes()[at..at + bpp])
    }

    /// Writes the pixel at local `(x, y)`.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        let bpp = self.format.bytes_per_pixel();
        let at = self.offset(x, y);
        let format = self.format;
        color.write(format, &mut self.as_bytes_mut()[at..at + bpp]);
    }

    /// Zeroes the pixels of `area` (local coordinates, clipped to the
    /// buffer).
    pub fn clear(&mut self, area: &Area) {
        self.for_each_row(area, |row| row.fill(0));
    }

    /// Fills `area` (local coordinates, clipped to the buffer) with `color`.
    pub fn fill(&mut self, area: &Area, color: Color) {
        let format = self.format;
        let bpp = format.bytes_per_pixel();
        let mut px = [0_u8; 4];
        color.write(format, &mut px[..bpp]);
        self.for_each_row(area, |row| {
            for chunk in row.chunks_exact_mut(bpp) {
                chunk.copy_from_slice(&px[..bpp]);
            }
        });
    }

    /// Copies `src_area` of `src` to `dst_area` of `self`.
    ///
    /// Both areas are in the local coordinates of their buffer. The copied
    /// size is the smaller of the two areas, further clipped to both buffers.
    /// Formats must match; mismatched formats copy nothing and return
    /// `false`.
    pub fn copy_from(&mut self, dst_area: &Area, src: &Self, src_area: &Area) -> bool {
        if self.format != src.format {
            return false;
        }
        let w = dst_area.width().min(src_area.width());
        let h = dst_area.height().min(src_area.height());
        let dst = Area::from_origin_size(dst_area.x1, dst_area.y1, w, h);
        let Some(dst) = dst.intersect(&self.bounds()) else {
            return true;
        };
        let (dx, dy) = (src_area.x1 - dst_area.x1, src_area.y1 - dst_area.y1);
        let Some(src_clip) = dst.translate(dx, dy).intersect(&src.bounds()) else {
            return true;
        };
        let dst = src_clip.translate(-dx, -dy);

        let bpp = self.format.bytes_per_pixel();
        let row_len = dst.width() as usize * bpp;
        for row in 0..dst.height() {
            let s = src.offset_area(&src_clip, row);
            let d = self.offset_area(&dst, row);
            self.as_bytes_mut()[d..d + row_len].copy_from_slice(&src.as_bytes()[s..s + row_len]);
        }
        true
    }

    /// Copies the pixels of `area` (local coordinates) into `out`, row by
    /// row.
    ///
    /// `out` must be `area.size() * bytes_per_pixel` long and `area` must lie
    /// inside the buffer.
    pub fn read_area(&self, area: &Area, out: &mut [u8]) {
        if area.is_empty() {
            return;
        }
        let row_len = area.width() as usize * self.format.bytes_per_pixel();
        for (row, chunk) in (0..area.height()).zip(out.chunks_exact_mut(row_len)) {
            let at = self.offset_area(area, row);
            chunk.copy_from_slice(&self.as_bytes()[at..at + row_len]);
        }
    }

    /// Writes row-packed pixels from `data` into `area` (local
    /// coordinates).
    ///
    /// The inverse of [`read_area`](Self::read_area).
    pub fn write_area(&mut self, area: &Area, data: &[u8]) {
        if area.is_empty() {
            return;
        }
        let row_len = area.width() as usize * self.format.bytes_per_pixel();
        for (row, chunk) in (0..area.height()).zip(data.chunks_exact(row_len)) {
            let at = self.offset_area(area, row);
            self.as_bytes_mut()[at..at + row_len].copy_from_slice(chunk);
        }
    }

    /// Converts the pixels to `to` in place.
    ///
    /// Only conversions that never grow a pixel are possible in place:
    /// RGB565 byte swaps, ARGB8888 to RGB888 or RGB565, and RGB888 to RGB565.
    /// Converting to the current format is a no-op.
    pub fn convert(&mut self, to: ColorFormat) -> Result<(), ConfigError> {
        use ColorFormat::{Argb8888, Rgb565, Rgb565Swapped, Rgb888};

        let from = self.format;
        if from == to {
            return Ok(());
        }
        match (from, to) {
            (Rgb565, Rgb565Swapped) | (Rgb565Swapped, Rgb565) => {
                for px in self.as_bytes_mut().chunks_exact_mut(2) {
                    px.swap(0, 1);
                }
            }
            (Argb8888, Rgb888) | (Argb8888, Rgb565) | (Rgb888, Rgb565) => {
                let (src_bpp, dst_bpp) = (from.bytes_per_pixel(), to.bytes_per_pixel());
                let count = self.width as usize * self.height as usize;
                let bytes = self.as_bytes_mut();
                for i in 0..count {
                    let c = Color::read(from, &bytes[i * src_bpp..(i + 1) * src_bpp]);
                    c.write(to, &mut bytes[i * dst_bpp..(i + 1) * dst_bpp]);
                }
            }
            _ => return Err(ConfigError::UnsupportedConversion { from, to }),
        }
        self.format = to;
        Ok(())
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride() + x as usize * self.format.bytes_per_pixel()
    }

    fn offset_area(&self, area: &Area, row: i32) -> usize {
        self.offset(area.x1 as u32, (area.y1 + row) as u32)
    }

    fn for_each_row(&mut self, area: &Area, mut f: impl FnMut(&mut [u8])) {
        let Some(area) = area.intersect(&self.bounds()) else {
            return;
        };
        let row_len = area.width() as usize * self.format.bytes_per_pixel();
        for row in 0..area.height() {
            let at = self.offset_area(&area, row);
            f(&mut self.as_bytes_mut()[at..at + row_len]);
        }
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        if let Some((budget, bytes)) = self.charged.take() {
            budget.release(bytes);
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

fn byte_len(format: ColorFormat, width: u32, height: u32) -> usize {
    width as usize * height as usize * format.bytes_per_pixel()
}
