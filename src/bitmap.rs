//! Capability interface over 2-D pixel grids.
//!
//! The engine never assumes a memory layout. It reads and writes pixels
//! through [`BitmapData`] and [`BitmapDataMut`], one pixel at a time, in
//! whichever of the six color representations an operation selected.
//! Implementors only have to provide the 8-bit accessors; wide formats
//! override the 16-bit and float accessors to avoid losing precision.

use core::fmt;

use rgb::Rgba;

use crate::color::{
    Color32, Color64, ColorF, PColor32, PColor64, PColorF, Premultiplied, WorkingColorSpace,
    color_f_to_32, color_f_to_64, color32_to_64, color32_to_f, color64_to_32,
};
use crate::format::PixelFormat;
use crate::palette::Palette;
use crate::rect::{Rect, Size};

/// What kind of alpha a bitmap currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphaContent {
    /// Every pixel is fully opaque.
    None,
    /// Pixels are either fully opaque or fully transparent.
    Binary,
    /// At least one pixel is translucent.
    MultiLevel,
}

/// Readable bitmap.
///
/// Coordinates are always inside `0..width` and `0..height`; the engine
/// clips every region before touching pixels.
pub trait BitmapData {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Pixel format descriptor.
    fn pixel_format(&self) -> PixelFormat;

    /// Read a pixel as 8-bit straight sRGB.
    fn get_color32(&self, x: u32, y: u32) -> Color32;

    /// Working color space for blending and quantizing.
    fn working_space(&self) -> WorkingColorSpace {
        WorkingColorSpace::Default
    }

    /// Color that translucent pixels are blended with when written to a
    /// format without alpha. Always opaque.
    fn back_color(&self) -> Color32 {
        Rgba::new(0, 0, 0, 255)
    }

    /// Alpha below which a pixel counts as transparent in formats with
    /// single-bit alpha or indexed transparency.
    fn alpha_threshold(&self) -> u8 {
        128
    }

    /// Palette of indexed formats.
    fn palette(&self) -> Option<&Palette> {
        None
    }

    /// Read a pixel as 8-bit premultiplied sRGB.
    fn get_pcolor32(&self, x: u32, y: u32) -> PColor32 {
        Premultiplied::<u8>::from_straight(self.get_color32(x, y))
    }

    /// Read a pixel as 16-bit straight sRGB.
    fn get_color64(&self, x: u32, y: u32) -> Color64 {
        color32_to_64(self.get_color32(x, y))
    }

    /// Read a pixel as 16-bit premultiplied sRGB.
    fn get_pcolor64(&self, x: u32, y: u32) -> PColor64 {
        Premultiplied::<u16>::from_straight(self.get_color64(x, y))
    }

    /// Read a pixel as linear-light straight `f32`.
    fn get_color_f(&self, x: u32, y: u32) -> ColorF {
        color32_to_f(self.get_color32(x, y))
    }

    /// Read a pixel as linear-light premultiplied `f32`.
    fn get_pcolor_f(&self, x: u32, y: u32) -> PColorF {
        Premultiplied::<f32>::from_straight(self.get_color_f(x, y))
    }

    /// Packed pixel bytes, when rows are stored back to back with no
    /// padding between them.
    fn raw_pixels(&self) -> Option<&[u8]> {
        None
    }

    /// Scan the bitmap for transparency.
    fn alpha_content(&self) -> AlphaContent {
        let format = self.pixel_format();
        let palette_alpha = self.palette().is_some_and(Palette::has_alpha);
        if !format.has_alpha() && !palette_alpha {
            return AlphaContent::None;
        }
        let mut content = AlphaContent::None;
        for y in 0..self.height() {
            for x in 0..self.width() {
                match self.get_color32(x, y).a {
                    255 => {}
                    0 => content = AlphaContent::Binary,
                    _ => return AlphaContent::MultiLevel,
                }
            }
        }
        content
    }

    /// Width and height.
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// The rectangle covering the whole bitmap.
    fn bounds(&self) -> Rect {
        Rect::from_size(self.size())
    }

    /// [`working_space`](Self::working_space) with `Default` resolved
    /// against the pixel format.
    fn resolved_working_space(&self) -> WorkingColorSpace {
        self.working_space().resolve(self.pixel_format())
    }
}

/// Writable bitmap.
///
/// Writers must encode each color the way the pixel format requires:
/// blend translucent colors with the back color for formats without
/// alpha, apply the alpha threshold for single-bit alpha, and pick the
/// nearest palette entry for indexed formats.
pub trait BitmapDataMut: BitmapData {
    /// Write a pixel given as 8-bit straight sRGB.
    fn set_color32(&mut self, x: u32, y: u32, color: Color32);

    /// Write a pixel given as 8-bit premultiplied sRGB.
    fn set_pcolor32(&mut self, x: u32, y: u32, color: PColor32) {
        self.set_color32(x, y, color.to_straight());
    }

    /// Write a pixel given as 16-bit straight sRGB.
    fn set_color64(&mut self, x: u32, y: u32, color: Color64) {
        self.set_color32(x, y, color64_to_32(color));
    }

    /// Write a pixel given as 16-bit premultiplied sRGB.
    fn set_pcolor64(&mut self, x: u32, y: u32, color: PColor64) {
        self.set_color64(x, y, color.to_straight());
    }

    /// Write a pixel given as linear-light straight `f32`.
    fn set_color_f(&mut self, x: u32, y: u32, color: ColorF) {
        if self.pixel_format().color_bits() == 64 {
            self.set_color64(x, y, color_f_to_64(color));
        } else {
            self.set_color32(x, y, color_f_to_32(color));
        }
    }

    /// Write a pixel given as linear-light premultiplied `f32`.
    fn set_pcolor_f(&mut self, x: u32, y: u32, color: PColorF) {
        self.set_color_f(x, y, color.to_straight());
    }
}

/// Where an operation reads from.
///
/// `Target` means the source is the very bitmap being written. Rust's
/// borrow rules make a shared and an exclusive reference to one bitmap
/// impossible, so aliasing is stated explicitly instead of detected.
#[derive(Clone, Copy)]
pub enum Source<'a> {
    /// A bitmap distinct from the target.
    Other(&'a dyn BitmapData),
    /// The target bitmap itself.
    Target,
}

impl<'a> Source<'a> {
    /// Whether the source is the target.
    pub fn is_target(&self) -> bool {
        matches!(self, Self::Target)
    }

    /// Resolve to a readable bitmap, borrowing `target` when needed.
    pub(crate) fn view<'s>(&self, target: &'s dyn BitmapDataMut) -> &'s dyn BitmapData
    where
        'a: 's,
    {
        match *self {
            Self::Other(source) => source,
            Self::Target => target,
        }
    }
}

impl<'a, B: BitmapData + 'a> From<&'a B> for Source<'a> {
    fn from(bitmap: &'a B) -> Self {
        Self::Other(bitmap)
    }
}

impl<'a> From<&'a dyn BitmapData> for Source<'a> {
    fn from(bitmap: &'a dyn BitmapData) -> Self {
        Self::Other(bitmap)
    }
}

impl fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(b) => write!(f, "Other({}x{} {:?})", b.width(), b.height(), b.pixel_format()),
            Self::Target => f.write_str("Target"),
        }
    }
}

/// Read-only view of a rectangle inside another bitmap.
///
/// Collaborators are initialized against this view so that they only see
/// the pixels an operation actually reads.
pub struct ClippedBitmap<'a> {
    inner: &'a dyn BitmapData,
    x: u32,
    y: u32,
    size: Size,
}

impl<'a> ClippedBitmap<'a> {
    /// View `rect` of `inner`. `rect` is clipped to the bitmap bounds.
    pub fn new(inner: &'a dyn BitmapData, rect: Rect) -> Self {
        let rect = rect.intersect(inner.bounds());
        Self {
            inner,
            x: rect.x.max(0) as u32,
            y: rect.y.max(0) as u32,
            size: rect.size(),
        }
    }

    /// The viewed region in coordinates of the underlying bitmap.
    pub fn region(&self) -> Rect {
        Rect::new(self.x as i32, self.y as i32, self.size.width as i32, self.size.height as i32)
    }
}

impl BitmapData for ClippedBitmap<'_> {
    fn width(&self) -> u32 {
        self.size.width
    }
    fn height(&self) -> u32 {
        self.size.height
    }
    fn pixel_format(&self) -> PixelFormat {
        self.inner.pixel_format()
    }
    fn get_color32(&self, x: u32, y: u32) -> Color32 {
        self.inner.get_color32(self.x + x, self.y + y)
    }
    fn working_space(&self) -> WorkingColorSpace {
        self.inner.working_space()
    }
    fn back_color(&self) -> Color32 {
        self.inner.back_color()
    }
    fn alpha_threshold(&self) -> u8 {
        self.inner.alpha_threshold()
    }
    fn palette(&self) -> Option<&Palette> {
        self.inner.palette()
    }
    fn get_pcolor32(&self, x: u32, y: u32) -> PColor32 {
        self.inner.get_pcolor32(self.x + x, self.y + y)
    }
    fn get_color64(&self, x: u32, y: u32) -> Color64 {
        self.inner.get_color64(self.x + x, self.y + y)
    }
    fn get_pcolor64(&self, x: u32, y: u32) -> PColor64 {
        self.inner.get_pcolor64(self.x + x, self.y + y)
    }
    fn get_color_f(&self, x: u32, y: u32) -> ColorF {
        self.inner.get_color_f(self.x + x, self.y + y)
    }
    fn get_pcolor_f(&self, x: u32, y: u32) -> PColorF {
        self.inner.get_pcolor_f(self.x + x, self.y + y)
    }
}
