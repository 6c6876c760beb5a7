// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel formats and packed colors.

/// Memory layout of a single pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// 8-bit luminance.
    L8,
    /// 16-bit RGB 5-6-5, little-endian.
    #[default]
    Rgb565,
    /// 16-bit RGB 5-6-5 with the two bytes swapped (for SPI panels that
    /// expect big-endian pixels).
    Rgb565Swapped,
    /// 24-bit RGB, byte order B, G, R.
    Rgb888,
    /// 32-bit ARGB, byte order B, G, R, A.
    Argb8888,
}

impl ColorFormat {
    /// Size of one pixel in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::L8 => 1,
            Self::Rgb565 | Self::Rgb565Swapped => 2,
            Self::Rgb888 => 3,
            Self::Argb8888 => 4,
        }
    }

    /// Returns `true` if the format stores an alpha channel.
    #[inline]
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Argb8888)
    }

    /// Returns `true` if a buffer in this format can be rewritten as `to`
    /// without growing.
    #[must_use]
    pub const fn converts_in_place(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Rgb565, Self::Rgb565Swapped)
                | (Self::Rgb565Swapped, Self::Rgb565)
                | (Self::Argb8888, Self::Rgb888 | Self::Rgb565)
                | (Self::Rgb888, Self::Rgb565)
        ) || self as u8 == to as u8
    }
}

/// A 32-bit ARGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    /// Alpha (255 = opaque).
    pub a: u8,
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        a: 0,
        r: 0,
        g: 0,
        b: 0,
    };

    /// Creates an opaque color.
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 255, r, g, b }
    }

    /// Creates a color with the given alpha.
    #[inline]
    #[must_use]
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Packs the color into `out` using `format`.
    ///
    /// `out` must be exactly [`ColorFormat::bytes_per_pixel`] long.
    pub fn write(self, format: ColorFormat, out: &mut [u8]) {
        match format {
            ColorFormat::L8 => out[0] = self.luma(),
            ColorFormat::Rgb565 => out.copy_from_slice(&self.to_rgb565().to_le_bytes()),
            ColorFormat::Rgb565Swapped => out.copy_from_slice(&self.to_rgb565().to_be_bytes()),
            ColorFormat::Rgb888 => out.copy_from_slice(&[self.b, self.g, self.r]),
            ColorFormat::Argb8888 => out.copy_from_slice(&[self.b, self.g, self.r, self.a]),
        }
    }

    /// Unpacks a pixel stored in `format`.
    #[must_use]
    pub fn read(format: ColorFormat, px: &[u8]) -> Self {
        match format {
            ColorFormat::L8 => Self::rgb(px[0], px[0], px[0]),
            ColorFormat::Rgb565 => Self::from_rgb565(u16::from_le_bytes([px[0], px[1]])),
            ColorFormat::Rgb565Swapped => Self::from_rgb565(u16::from_be_bytes([px[0], px[1]])),
            ColorFormat::Rgb888 => Self::rgb(px[2], px[1], px[0]),
            ColorFormat::Argb8888 => Self::argb(px[3], px[2], px[1], px[0]),
        }
    }

    /// Returns the color packed as RGB 5-6-5.
    #[inline]
    #[must_use]
    pub const fn to_rgb565(self) -> u16 {
        ((self.r as u16 & 0xF8) << 8) | ((self.g as u16 & 0xFC) << 3) | (self.b as u16 >> 3)
    }

    /// Expands an RGB 5-6-5 value to an opaque color.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "each channel is masked to at most 8 bits"
    )]
    pub const fn from_rgb565(v: u16) -> Self {
        let r = ((v >> 11) & 0x1F) as u8;
        let g = ((v >> 5) & 0x3F) as u8;
        let b = (v & 0x1F) as u8;
        Self::rgb((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
    }

    /// Integer luma approximation (BT.601 weights).
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "weighted sum divided by 256 stays below 256"
    )]
    pub const fn luma(self) -> u8 {
        ((self.r as u32 * 77 + self.g as u32 * 150 + self.b as u32 * 29) >> 8) as u8
    }

    /// Blends `self` over `dst` with an extra opacity factor (0-255).
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "channel mixes are divided back into 0..=255"
    )]
    pub fn over(self, dst: Self, opa: u8) -> Self {
        let a = self.a as u32 * opa as u32 / 255;
        if a == 0 {
            return dst;
        }
        let inv = 255 - a;
        let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv) / 255) as u8;
        let out_a = a + dst.a as u32 * inv / 255;
        Self {
            a: out_a as u8,
            r: mix(self.r, dst.r),
            g: mix(self.g, dst.g),
            b: mix(self.b, dst.b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_sizes() {
        assert_eq!(ColorFormat::L8.bytes_per_pixel(), 1);
        assert_eq!(ColorFormat::Rgb565.bytes_per_pixel(), 2);
        assert_eq!(ColorFormat::Rgb888.bytes_per_pixel(), 3);
        assert_eq!(ColorFormat::Argb8888.bytes_per_pixel(), 4);
        assert!(ColorFormat::Argb8888.has_alpha());
        assert!(!ColorFormat::Rgb565.has_alpha());
    }

    #[test]
    fn rgb565_packing_preserves_primaries() {
        assert_eq!(Color::rgb(255, 0, 0).to_rgb565(), 0xF800);
        assert_eq!(Color::rgb(0, 255, 0).to_rgb565(), 0x07E0);
        assert_eq!(Color::rgb(0, 0, 255).to_rgb565(), 0x001F);
        assert_eq!(Color::from_rgb565(0xF800), Color::rgb(255, 0, 0));
    }

    #[test]
    fn swapped_format_reverses_bytes() {
        let mut native = [0_u8; 2];
        let mut swapped = [0_u8; 2];
        let c = Color::rgb(255, 0, 0);
        c.write(ColorFormat::Rgb565, &mut native);
        c.write(ColorFormat::Rgb565Swapped, &mut swapped);
        assert_eq!(native, [0x00, 0xF8]);
        assert_eq!(swapped, [0xF8, 0x00]);
        assert_eq!(Color::read(ColorFormat::Rgb565Swapped, &swapped), c);
    }

    #[test]
    fn over_respects_opacity() {
        let red = Color::rgb(255, 0, 0);
        assert_eq!(red.over(Color::BLACK, 255), red);
        assert_eq!(red.over(Color::BLACK, 0), Color::BLACK);
        let half = red.over(Color::BLACK, 128);
        assert!(half.r > 120 && half.r < 135, "got {half:?}");
    }
}
