//! Owned bitmap storage.
//!
//! [`Bitmap`] is the concrete buffer the engine allocates for clones,
//! temporaries and two-phase intermediates, and the type returned by
//! [`Transform::clone_region`](crate::Transform::clone_region) and
//! [`Transform::resize`](crate::Transform::resize). Pixels are stored as
//! little-endian bytes with a row stride; indexed formats pack indices
//! most significant bit first.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use imgref::ImgRef;
use rgb::{Gray, Rgb, Rgba};

use crate::bitmap::{BitmapData, BitmapDataMut};
use crate::color::{
    Color32, Color64, ColorF, PColor32, PColor64, PColorF, Premultiplied, StraightColor,
    WorkingColorSpace, blend_with_background, color_f_to_32, color_f_to_64, color32_to_64,
    color32_to_f, color64_to_32, color64_to_f, luma8, luma16,
};
use crate::error::TransformError;
use crate::format::PixelFormat;
use crate::palette::Palette;
use crate::rect::Size;

/// Owned, strided pixel storage in one of the supported [`PixelFormat`]s.
///
/// # Example
///
/// ```
/// use zenblit::{Bitmap, PixelFormat, BitmapData, BitmapDataMut};
/// use zenblit::rgb::Rgba;
///
/// let mut bmp = Bitmap::new(4, 4, PixelFormat::Rgb565)?
///     .with_back_color(Rgba::new(255, 255, 255, 255));
/// bmp.set_color32(0, 0, Rgba::new(0, 0, 0, 0));
/// assert_eq!(bmp.get_color32(0, 0), Rgba::new(255, 255, 255, 255));
/// # Ok::<(), zenblit::TransformError>(())
/// ```
#[derive(Clone)]
pub struct Bitmap {
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    palette: Option<Palette>,
    back_color: Color32,
    alpha_threshold: u8,
    working_space: WorkingColorSpace,
}

fn validate_size(width: u32, height: u32) -> Result<(), TransformError> {
    if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
        return Err(TransformError::InvalidSize { width, height });
    }
    Ok(())
}

impl Bitmap {
    /// Allocate a zero-filled bitmap.
    ///
    /// Zero bytes are transparent in formats with alpha, black in formats
    /// without, and palette index 0 in indexed formats, which receive the
    /// format's default [`Palette`].
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, TransformError> {
        validate_size(width, height)?;
        let stride = format.aligned_stride(width);
        let len = stride
            .checked_mul(height as usize)
            .ok_or(TransformError::InvalidSize { width, height })?;
        Ok(Self::with_data(vec![0u8; len], width, height, stride, format))
    }

    /// Wrap existing bytes.
    ///
    /// `stride` must be at least the packed row size, and `data` must hold
    /// `height` rows (the last one may omit its padding).
    pub fn from_vec(
        data: Vec<u8>,
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, TransformError> {
        validate_size(width, height)?;
        let row_bytes = format.row_bytes(width);
        if stride < row_bytes {
            return Err(TransformError::StrideTooSmall);
        }
        let required = (height as usize - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or(TransformError::InsufficientData)?;
        if data.len() < required {
            return Err(TransformError::InsufficientData);
        }
        Ok(Self::with_data(data, width, height, stride, format))
    }

    fn with_data(data: Vec<u8>, width: u32, height: u32, stride: usize, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            stride,
            format,
            palette: Palette::for_format(format),
            back_color: Rgba::new(0, 0, 0, 255),
            alpha_threshold: 128,
            working_space: WorkingColorSpace::Default,
        }
    }

    /// A new bitmap with the settings of `template`: back color, alpha
    /// threshold, working space and, when the format matches, the palette.
    pub(crate) fn compatible(
        template: &dyn BitmapData,
        size: Size,
        format: PixelFormat,
    ) -> Result<Self, TransformError> {
        let mut bitmap = Self::new(size.width, size.height, format)?
            .with_back_color(template.back_color())
            .with_alpha_threshold(template.alpha_threshold())
            .with_working_space(template.working_space());
        if format == template.pixel_format()
            && let Some(palette) = template.palette()
        {
            bitmap = bitmap.with_palette(palette.clone())?;
        }
        Ok(bitmap)
    }

    /// Set the back color. Its alpha is ignored.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.back_color = Rgba { a: 255, ..color };
        self.palette = self.palette.map(|p| p.with_back_color(color));
        self
    }

    /// Set the alpha threshold.
    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self.palette = self.palette.map(|p| p.with_alpha_threshold(threshold));
        self
    }

    /// Set the working color space.
    pub fn with_working_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_space = space;
        self.palette = self.palette.map(|p| p.with_working_space(space));
        self
    }

    /// Replace the palette of an indexed bitmap.
    ///
    /// The bitmap adopts the palette's back color, alpha threshold and
    /// working space. Existing indices are kept as they are.
    pub fn with_palette(mut self, palette: Palette) -> Result<Self, TransformError> {
        palette.check_capacity(self.format)?;
        self.back_color = palette.back_color();
        self.alpha_threshold = palette.alpha_threshold();
        self.working_space = palette.working_space();
        self.palette = Some(palette);
        Ok(self)
    }

    /// Byte distance between the starts of consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The whole backing buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Packed bytes of row `y`, without padding.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.format.row_bytes(self.width)]
    }

    /// Mutable packed bytes of row `y`, without padding.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.format.row_bytes(self.width);
        &mut self.data[start..start + len]
    }

    /// Consume the bitmap, returning its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Fill every pixel with `color`.
    pub fn clear(&mut self, color: Color32) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_color32(x, y, color);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + (x as usize * self.format.bits_per_pixel() as usize) / 8
    }

    #[inline]
    fn bytes<const N: usize>(&self, x: u32, y: u32) -> [u8; N] {
        let at = self.offset(x, y);
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[at..at + N]);
        out
    }

    #[inline]
    fn put<const N: usize>(&mut self, x: u32, y: u32, bytes: [u8; N]) {
        let at = self.offset(x, y);
        self.data[at..at + N].copy_from_slice(&bytes);
    }

    #[inline]
    fn u16_at(&self, x: u32, y: u32, channel: usize) -> u16 {
        let at = self.offset(x, y) + channel * 2;
        u16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    #[inline]
    fn put_u16(&mut self, x: u32, y: u32, channel: usize, value: u16) {
        let at = self.offset(x, y) + channel * 2;
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn rgba16(&self, x: u32, y: u32) -> Rgba<u16> {
        Rgba::new(
            self.u16_at(x, y, 0),
            self.u16_at(x, y, 1),
            self.u16_at(x, y, 2),
            self.u16_at(x, y, 3),
        )
    }

    fn put_rgba16(&mut self, x: u32, y: u32, c: Rgba<u16>) {
        for (channel, v) in [c.r, c.g, c.b, c.a].into_iter().enumerate() {
            self.put_u16(x, y, channel, v);
        }
    }

    fn rgba_f(&self, x: u32, y: u32) -> Rgba<f32> {
        let at = self.offset(x, y);
        let channel = |i: usize| {
            let b = &self.data[at + i * 4..at + i * 4 + 4];
            f32::from_le_bytes([b[0], b[1], b[2], b[3]])
        };
        Rgba::new(channel(0), channel(1), channel(2), channel(3))
    }

    fn put_rgba_f(&mut self, x: u32, y: u32, c: Rgba<f32>) {
        let at = self.offset(x, y);
        for (i, v) in [c.r, c.g, c.b, c.a].into_iter().enumerate() {
            self.data[at + i * 4..at + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
    }

    fn index_at(&self, x: u32, y: u32) -> usize {
        let bpp = self.format.bits_per_pixel();
        let bit = x as usize * bpp as usize;
        let byte = self.data[y as usize * self.stride + bit / 8];
        let shift = 8 - bpp as usize - bit % 8;
        ((byte >> shift) & ((1u16 << bpp) - 1) as u8) as usize
    }

    fn put_index(&mut self, x: u32, y: u32, index: usize) {
        let bpp = self.format.bits_per_pixel();
        let bit = x as usize * bpp as usize;
        let at = y as usize * self.stride + bit / 8;
        let shift = 8 - bpp as usize - bit % 8;
        let mask = (((1u16 << bpp) - 1) as u8) << shift;
        self.data[at] = (self.data[at] & !mask) | (((index as u8) << shift) & mask);
    }

    /// Flatten a translucent color onto the back color.
    fn flatten(&self, c: Color32) -> Color32 {
        blend_with_background(c, self.back_color, self.resolved_working_space())
    }

    fn flatten64(&self, c: Color64) -> Color64 {
        if c.a == u16::MAX {
            return c;
        }
        let back = color32_to_64(self.back_color);
        let blended = match self.resolved_working_space() {
            WorkingColorSpace::Linear => color_f_to_64(color64_to_f(c).blend_over(color64_to_f(back))),
            _ => c.blend_over(back),
        };
        Rgba { a: u16::MAX, ..blended }
    }
}

#[inline]
const fn expand5(v: u16) -> u8 {
    let v = (v & 31) as u8;
    (v << 3) | (v >> 2)
}

#[inline]
const fn expand6(v: u16) -> u8 {
    let v = (v & 63) as u8;
    (v << 2) | (v >> 4)
}

impl BitmapData for Bitmap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn working_space(&self) -> WorkingColorSpace {
        self.working_space
    }

    fn back_color(&self) -> Color32 {
        self.back_color
    }

    fn alpha_threshold(&self) -> u8 {
        self.alpha_threshold
    }

    fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    fn get_color32(&self, x: u32, y: u32) -> Color32 {
        match self.format {
            PixelFormat::Rgba32 => {
                let [r, g, b, a] = self.bytes::<4>(x, y);
                Rgba::new(r, g, b, a)
            }
            PixelFormat::Prgba32 => self.get_pcolor32(x, y).to_straight(),
            PixelFormat::Rgb24 => {
                let [r, g, b] = self.bytes::<3>(x, y);
                Rgba::new(r, g, b, 255)
            }
            PixelFormat::Rgb565 => {
                let v = self.u16_at(x, y, 0);
                Rgba::new(expand5(v >> 11), expand6(v >> 5), expand5(v), 255)
            }
            PixelFormat::Argb1555 => {
                let v = self.u16_at(x, y, 0);
                let a = if v & 0x8000 != 0 { 255 } else { 0 };
                Rgba::new(expand5(v >> 10), expand5(v >> 5), expand5(v), a)
            }
            PixelFormat::Gray8 => {
                let [v] = self.bytes::<1>(x, y);
                Rgba::new(v, v, v, 255)
            }
            PixelFormat::Gray16 | PixelFormat::Rgba64 | PixelFormat::Prgba64 => {
                color64_to_32(self.get_color64(x, y))
            }
            PixelFormat::RgbaF32 | PixelFormat::PrgbaF32 => color_f_to_32(self.get_color_f(x, y)),
            PixelFormat::Indexed1 | PixelFormat::Indexed4 | PixelFormat::Indexed8 => {
                let index = self.index_at(x, y);
                self.palette
                    .as_ref()
                    .map_or(Rgba::new(0, 0, 0, 255), |p| p.get(index))
            }
        }
    }

    fn get_pcolor32(&self, x: u32, y: u32) -> PColor32 {
        if self.format == PixelFormat::Prgba32 {
            let [r, g, b, a] = self.bytes::<4>(x, y);
            return Premultiplied(Rgba::new(r, g, b, a));
        }
        Premultiplied::<u8>::from_straight(self.get_color32(x, y))
    }

    fn get_color64(&self, x: u32, y: u32) -> Color64 {
        match self.format {
            PixelFormat::Gray16 => {
                let v = self.u16_at(x, y, 0);
                Rgba::new(v, v, v, u16::MAX)
            }
            PixelFormat::Rgba64 => self.rgba16(x, y),
            PixelFormat::Prgba64 => Premultiplied(self.rgba16(x, y)).to_straight(),
            PixelFormat::RgbaF32 | PixelFormat::PrgbaF32 => color_f_to_64(self.get_color_f(x, y)),
            _ => color32_to_64(self.get_color32(x, y)),
        }
    }

    fn get_pcolor64(&self, x: u32, y: u32) -> PColor64 {
        if self.format == PixelFormat::Prgba64 {
            return Premultiplied(self.rgba16(x, y));
        }
        Premultiplied::<u16>::from_straight(self.get_color64(x, y))
    }

    fn get_color_f(&self, x: u32, y: u32) -> ColorF {
        match self.format {
            PixelFormat::RgbaF32 => self.rgba_f(x, y),
            PixelFormat::PrgbaF32 => Premultiplied(self.rgba_f(x, y)).to_straight(),
            PixelFormat::Gray16 | PixelFormat::Rgba64 | PixelFormat::Prgba64 => {
                color64_to_f(self.get_color64(x, y))
            }
            _ => color32_to_f(self.get_color32(x, y)),
        }
    }

    fn get_pcolor_f(&self, x: u32, y: u32) -> PColorF {
        if self.format == PixelFormat::PrgbaF32 {
            return Premultiplied(self.rgba_f(x, y));
        }
        Premultiplied::<f32>::from_straight(self.get_color_f(x, y))
    }

    fn raw_pixels(&self) -> Option<&[u8]> {
        let row_bytes = self.format.row_bytes(self.width);
        if self.stride != row_bytes {
            return None;
        }
        self.data.get(..row_bytes * self.height as usize)
    }
}

impl BitmapDataMut for Bitmap {
    fn set_color32(&mut self, x: u32, y: u32, color: Color32) {
        match self.format {
            PixelFormat::Rgba32 => self.put(x, y, [color.r, color.g, color.b, color.a]),
            PixelFormat::Prgba32 => self.set_pcolor32(x, y, Premultiplied::<u8>::from_straight(color)),
            PixelFormat::Rgb24 => {
                let c = self.flatten(color);
                self.put(x, y, [c.r, c.g, c.b]);
            }
            PixelFormat::Rgb565 => {
                let c = self.flatten(color);
                let v = (c.r as u16 >> 3) << 11 | (c.g as u16 >> 2) << 5 | c.b as u16 >> 3;
                self.put_u16(x, y, 0, v);
            }
            PixelFormat::Argb1555 => {
                let v = if color.a < self.alpha_threshold {
                    0
                } else {
                    let c = self.flatten(color);
                    0x8000 | (c.r as u16 >> 3) << 10 | (c.g as u16 >> 3) << 5 | c.b as u16 >> 3
                };
                self.put_u16(x, y, 0, v);
            }
            PixelFormat::Gray8 => {
                let v = luma8(self.flatten(color));
                self.put(x, y, [v]);
            }
            PixelFormat::Gray16 | PixelFormat::Rgba64 | PixelFormat::Prgba64 => {
                self.set_color64(x, y, color32_to_64(color));
            }
            PixelFormat::RgbaF32 | PixelFormat::PrgbaF32 => self.set_color_f(x, y, color32_to_f(color)),
            PixelFormat::Indexed1 | PixelFormat::Indexed4 | PixelFormat::Indexed8 => {
                let index = self.palette.as_ref().map_or(0, |p| p.nearest_index(color));
                self.put_index(x, y, index);
            }
        }
    }

    fn set_pcolor32(&mut self, x: u32, y: u32, color: PColor32) {
        if self.format == PixelFormat::Prgba32 {
            let c = color.0;
            self.put(x, y, [c.r, c.g, c.b, c.a]);
        } else {
            self.set_color32(x, y, color.to_straight());
        }
    }

    fn set_color64(&mut self, x: u32, y: u32, color: Color64) {
        match self.format {
            PixelFormat::Rgba64 => self.put_rgba16(x, y, color),
            PixelFormat::Prgba64 => self.put_rgba16(x, y, Premultiplied::<u16>::from_straight(color).0),
            PixelFormat::Gray16 => {
                let v = luma16(self.flatten64(color));
                self.put_u16(x, y, 0, v);
            }
            PixelFormat::RgbaF32 | PixelFormat::PrgbaF32 => self.set_color_f(x, y, color64_to_f(color)),
            _ => self.set_color32(x, y, color64_to_32(color)),
        }
    }

    fn set_pcolor64(&mut self, x: u32, y: u32, color: PColor64) {
        if self.format == PixelFormat::Prgba64 {
            self.put_rgba16(x, y, color.0);
        } else {
            self.set_color64(x, y, color.to_straight());
        }
    }

    fn set_color_f(&mut self, x: u32, y: u32, color: ColorF) {
        match self.format {
            PixelFormat::RgbaF32 => self.put_rgba_f(x, y, color),
            PixelFormat::PrgbaF32 => self.put_rgba_f(x, y, Premultiplied::<f32>::from_straight(color).0),
            PixelFormat::Gray16 | PixelFormat::Rgba64 | PixelFormat::Prgba64 => {
                self.set_color64(x, y, color_f_to_64(color));
            }
            _ => self.set_color32(x, y, color_f_to_32(color)),
        }
    }

    fn set_pcolor_f(&mut self, x: u32, y: u32, color: PColorF) {
        if self.format == PixelFormat::PrgbaF32 {
            self.put_rgba_f(x, y, color.0);
        } else {
            self.set_color_f(x, y, color.to_straight());
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bitmap({}x{}, {:?}, stride {})",
            self.width, self.height, self.format, self.stride
        )
    }
}

// ---------------------------------------------------------------------------
// ImgRef → Bitmap (always copies)
// ---------------------------------------------------------------------------

macro_rules! impl_from_imgref {
    ($pixel:ty, $format:expr, |$px:ident| $bytes:expr) => {
        impl TryFrom<ImgRef<'_, $pixel>> for Bitmap {
            type Error = TransformError;

            fn try_from(img: ImgRef<'_, $pixel>) -> Result<Self, Self::Error> {
                let format = $format;
                let (width, height) = (img.width() as u32, img.height() as u32);
                let mut bitmap = Bitmap::new(width, height, format)?;
                for (y, row) in img.rows().enumerate() {
                    let out = bitmap.row_mut(y as u32);
                    let mut at = 0;
                    for $px in row {
                        for byte in $bytes {
                            out[at] = byte;
                            at += 1;
                        }
                    }
                }
                Ok(bitmap)
            }
        }
    };
}

fn le16(values: [u16; 4]) -> impl Iterator<Item = u8> {
    values.into_iter().flat_map(u16::to_le_bytes)
}

fn le32(values: [f32; 4]) -> impl Iterator<Item = u8> {
    values.into_iter().flat_map(f32::to_le_bytes)
}

impl_from_imgref!(Rgba<u8>, PixelFormat::Rgba32, |p| [p.r, p.g, p.b, p.a]);
impl_from_imgref!(Rgb<u8>, PixelFormat::Rgb24, |p| [p.r, p.g, p.b]);
impl_from_imgref!(Gray<u8>, PixelFormat::Gray8, |p| [p.value()]);
impl_from_imgref!(Gray<u16>, PixelFormat::Gray16, |p| p.value().to_le_bytes());
impl_from_imgref!(Rgba<u16>, PixelFormat::Rgba64, |p| le16([p.r, p.g, p.b, p.a]));
impl_from_imgref!(Rgba<f32>, PixelFormat::RgbaF32, |p| le32([p.r, p.g, p.b, p.a]));
