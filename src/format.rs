//! Pixel format descriptors.
//!
//! [`PixelFormat`] describes how a bitmap stores its pixels without
//! carrying the data itself: bit depth, indexed/grayscale/alpha flags,
//! premultiplication and the color representation that reads it without
//! loss.

use crate::color::Representation;

/// Supported pixel formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum PixelFormat {
    /// 8-bit RGBA, straight alpha.
    Rgba32,
    /// 8-bit RGBA, premultiplied alpha.
    Prgba32,
    /// 8-bit RGB, no alpha.
    Rgb24,
    /// 16-bit packed 5-6-5 RGB.
    Rgb565,
    /// 16-bit packed 1-5-5-5 ARGB with single-bit alpha.
    Argb1555,
    /// 8-bit grayscale.
    Gray8,
    /// 16-bit grayscale.
    Gray16,
    /// 16-bit RGBA, straight alpha.
    Rgba64,
    /// 16-bit RGBA, premultiplied alpha.
    Prgba64,
    /// Linear-light `f32` RGBA, straight alpha.
    RgbaF32,
    /// Linear-light `f32` RGBA, premultiplied alpha.
    PrgbaF32,
    /// 1 bit per pixel palette index.
    Indexed1,
    /// 4 bits per pixel palette index.
    Indexed4,
    /// 8 bits per pixel palette index.
    Indexed8,
}

/// A fixed-size encoding whose raw values map one-to-one to colors.
///
/// Used to count distinct colors without decoding pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CompactEncoding {
    /// Bytes per encoded pixel.
    pub bytes: usize,
    /// Number of significant value bits.
    pub value_bits: u32,
    /// Bit that marks an opaque pixel, if the encoding has alpha.
    pub opaque_bit: Option<u32>,
}

impl PixelFormat {
    /// Storage bits per pixel.
    #[inline]
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Indexed1 => 1,
            Self::Indexed4 => 4,
            Self::Indexed8 | Self::Gray8 => 8,
            Self::Rgb565 | Self::Argb1555 | Self::Gray16 => 16,
            Self::Rgb24 => 24,
            Self::Rgba32 | Self::Prgba32 => 32,
            Self::Rgba64 | Self::Prgba64 => 64,
            Self::RgbaF32 | Self::PrgbaF32 => 128,
        }
    }

    /// Packed byte length of a row of `width` pixels.
    #[inline]
    pub const fn row_bytes(self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() as usize).div_ceil(8)
    }

    /// Minimum byte alignment of a row start (1, 2 or 4).
    #[inline]
    pub const fn alignment(self) -> usize {
        match self {
            Self::Rgb565 | Self::Argb1555 | Self::Gray16 | Self::Rgba64 | Self::Prgba64 => 2,
            Self::RgbaF32 | Self::PrgbaF32 => 4,
            _ => 1,
        }
    }

    /// Default stride for a given width, aligned to [`alignment`](Self::alignment).
    #[inline]
    pub const fn aligned_stride(self, width: u32) -> usize {
        self.row_bytes(width).next_multiple_of(self.alignment())
    }

    /// Whether pixels are palette indices.
    #[inline]
    pub const fn is_indexed(self) -> bool {
        matches!(self, Self::Indexed1 | Self::Indexed4 | Self::Indexed8)
    }

    /// Whether the format stores a single luminance channel.
    #[inline]
    pub const fn is_grayscale(self) -> bool {
        matches!(self, Self::Gray8 | Self::Gray16)
    }

    /// Whether the format stores an alpha channel.
    ///
    /// Indexed formats report `false`; their transparency comes from the palette.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Rgba32
                | Self::Prgba32
                | Self::Argb1555
                | Self::Rgba64
                | Self::Prgba64
                | Self::RgbaF32
                | Self::PrgbaF32
        )
    }

    /// Whether alpha is a single on/off bit.
    #[inline]
    pub const fn has_single_bit_alpha(self) -> bool {
        matches!(self, Self::Argb1555)
    }

    /// Whether color channels are stored premultiplied by alpha.
    #[inline]
    pub const fn is_premultiplied(self) -> bool {
        matches!(self, Self::Prgba32 | Self::Prgba64 | Self::PrgbaF32)
    }

    /// Whether the format stores linear-light values by default.
    #[inline]
    pub const fn is_linear(self) -> bool {
        matches!(self, Self::RgbaF32 | Self::PrgbaF32)
    }

    /// Width of the color representation that reads this format without
    /// loss: 32, 64 or 128 bits.
    #[inline]
    pub const fn color_bits(self) -> u32 {
        match self {
            Self::Gray16 | Self::Rgba64 | Self::Prgba64 => 64,
            Self::RgbaF32 | Self::PrgbaF32 => 128,
            _ => 32,
        }
    }

    /// Preferred color representation for reading this format.
    #[inline]
    pub const fn representation(self) -> Representation {
        Representation::from_parts(self.color_bits(), self.is_premultiplied())
    }

    /// Whether dithering can improve this format's output.
    ///
    /// True for formats with fewer than 8 bits per color channel and for
    /// formats that drop color information (grayscale, indexed).
    #[inline]
    pub const fn can_be_dithered(self) -> bool {
        self.is_indexed() || self.is_grayscale() || matches!(self, Self::Rgb565 | Self::Argb1555)
    }

    /// Largest number of distinct colors the format can hold.
    ///
    /// All fully transparent pixels count as one color.
    pub const fn max_colors(self) -> u64 {
        match self {
            Self::Indexed1 => 2,
            Self::Indexed4 => 16,
            Self::Indexed8 | Self::Gray8 => 256,
            Self::Rgb565 | Self::Gray16 => 1 << 16,
            Self::Argb1555 => (1 << 15) + 1,
            Self::Rgb24 => 1 << 24,
            _ => u64::MAX,
        }
    }

    /// Maximum palette length for indexed formats.
    pub const fn max_palette_entries(self) -> Option<usize> {
        if self.is_indexed() {
            Some(1 << self.bits_per_pixel())
        } else {
            None
        }
    }

    /// Full-precision format with alpha for intermediate results rendered
    /// on behalf of this format.
    pub const fn intermediate(self) -> PixelFormat {
        match (self.color_bits(), self.is_premultiplied()) {
            (128, true) => Self::PrgbaF32,
            (128, false) => Self::RgbaF32,
            (64, true) => Self::Prgba64,
            (64, false) => Self::Rgba64,
            (_, true) => Self::Prgba32,
            _ => Self::Rgba32,
        }
    }

    /// This format if it has alpha, otherwise the closest format with alpha.
    pub const fn with_alpha(self) -> PixelFormat {
        if self.has_alpha() {
            self
        } else if self.color_bits() == 64 {
            Self::Rgba64
        } else {
            Self::Rgba32
        }
    }

    pub(crate) const fn compact_encoding(self) -> Option<CompactEncoding> {
        match self {
            Self::Rgb24 => Some(CompactEncoding {
                bytes: 3,
                value_bits: 24,
                opaque_bit: None,
            }),
            Self::Rgb565 | Self::Gray16 => Some(CompactEncoding {
                bytes: 2,
                value_bits: 16,
                opaque_bit: None,
            }),
            Self::Argb1555 => Some(CompactEncoding {
                bytes: 2,
                value_bits: 16,
                opaque_bit: Some(15),
            }),
            Self::Gray8 => Some(CompactEncoding {
                bytes: 1,
                value_bits: 8,
                opaque_bit: None,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_and_strides() {
        assert_eq!(PixelFormat::Rgb24.row_bytes(3), 9);
        assert_eq!(PixelFormat::Rgb24.aligned_stride(3), 9);
        assert_eq!(PixelFormat::Indexed1.row_bytes(9), 2);
        assert_eq!(PixelFormat::Indexed4.row_bytes(3), 2);
        assert_eq!(PixelFormat::Rgba64.aligned_stride(3), 24);
        assert_eq!(PixelFormat::RgbaF32.aligned_stride(1), 16);
    }

    #[test]
    fn representations() {
        assert_eq!(PixelFormat::Rgba32.representation(), Representation::Color32);
        assert_eq!(PixelFormat::Prgba32.representation(), Representation::PColor32);
        assert_eq!(PixelFormat::Gray16.representation(), Representation::Color64);
        assert_eq!(PixelFormat::Prgba64.representation(), Representation::PColor64);
        assert_eq!(PixelFormat::RgbaF32.representation(), Representation::ColorF);
        assert_eq!(PixelFormat::PrgbaF32.representation(), Representation::PColorF);
        assert_eq!(PixelFormat::Indexed8.representation(), Representation::Color32);
    }

    #[test]
    fn flags() {
        assert!(PixelFormat::Indexed4.is_indexed());
        assert!(!PixelFormat::Indexed4.has_alpha());
        assert!(PixelFormat::Argb1555.has_single_bit_alpha());
        assert!(PixelFormat::Rgb565.can_be_dithered());
        assert!(!PixelFormat::Rgba32.can_be_dithered());
        assert!(PixelFormat::Gray8.can_be_dithered());
        assert_eq!(PixelFormat::Indexed4.max_palette_entries(), Some(16));
        assert_eq!(PixelFormat::Rgb24.max_palette_entries(), None);
    }

    #[test]
    fn intermediate_and_alpha_counterparts() {
        assert_eq!(PixelFormat::Rgb24.intermediate(), PixelFormat::Rgba32);
        assert_eq!(PixelFormat::Indexed1.intermediate(), PixelFormat::Rgba32);
        assert_eq!(PixelFormat::Gray16.intermediate(), PixelFormat::Rgba64);
        assert_eq!(PixelFormat::PrgbaF32.intermediate(), PixelFormat::PrgbaF32);
        assert_eq!(PixelFormat::Rgb565.with_alpha(), PixelFormat::Rgba32);
        assert_eq!(PixelFormat::Gray16.with_alpha(), PixelFormat::Rgba64);
        assert_eq!(PixelFormat::Argb1555.with_alpha(), PixelFormat::Argb1555);
    }
}
