//! Color representations and working color spaces.
//!
//! Pixels travel through the engine as one of six representations:
//! 8-bit, 16-bit and `f32` RGBA, each straight or premultiplied. The 8-
//! and 16-bit types hold sRGB-encoded values; the `f32` types hold
//! linear-light values. [`ColorRepr`] is sealed over exactly these six
//! types, so every operation picks its representation once and runs one
//! monomorphized code path for it.

use core::fmt;

use rgb::Rgba;

use crate::bitmap::{BitmapData, BitmapDataMut};
use crate::format::PixelFormat;

/// 8-bit sRGB RGBA with straight alpha.
pub type Color32 = Rgba<u8>;
/// 16-bit sRGB RGBA with straight alpha.
pub type Color64 = Rgba<u16>;
/// Linear-light `f32` RGBA with straight alpha.
pub type ColorF = Rgba<f32>;

/// RGBA with color channels premultiplied by alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct Premultiplied<T>(pub Rgba<T>);

/// 8-bit sRGB RGBA with premultiplied alpha.
pub type PColor32 = Premultiplied<u8>;
/// 16-bit sRGB RGBA with premultiplied alpha.
pub type PColor64 = Premultiplied<u16>;
/// Linear-light `f32` RGBA with premultiplied alpha.
pub type PColorF = Premultiplied<f32>;

/// One of the six color representations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Representation {
    /// [`Color32`]
    Color32,
    /// [`PColor32`]
    PColor32,
    /// [`Color64`]
    Color64,
    /// [`PColor64`]
    PColor64,
    /// [`ColorF`]
    ColorF,
    /// [`PColorF`]
    PColorF,
}

impl Representation {
    /// Select by width in bits (32, 64 or 128) and premultiplication.
    pub const fn from_parts(bits: u32, premultiplied: bool) -> Self {
        match (bits, premultiplied) {
            (128, false) => Self::ColorF,
            (128, true) => Self::PColorF,
            (64, false) => Self::Color64,
            (64, true) => Self::PColor64,
            (_, false) => Self::Color32,
            (_, true) => Self::PColor32,
        }
    }

    /// Width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Color32 | Self::PColor32 => 32,
            Self::Color64 | Self::PColor64 => 64,
            Self::ColorF | Self::PColorF => 128,
        }
    }

    /// Whether color channels are premultiplied.
    pub const fn is_premultiplied(self) -> bool {
        matches!(self, Self::PColor32 | Self::PColor64 | Self::PColorF)
    }

    /// Representation for a plain pixel transfer between two formats.
    ///
    /// Uses the wider of both formats, premultiplied only when both are,
    /// so neither side loses precision to the transfer.
    pub const fn for_transfer(source: PixelFormat, target: PixelFormat) -> Self {
        let bits = if source.color_bits() > target.color_bits() {
            source.color_bits()
        } else {
            target.color_bits()
        };
        Self::from_parts(bits, source.is_premultiplied() && target.is_premultiplied())
    }

    /// Straight representation used to alpha-blend `source` onto `target`.
    ///
    /// Blending in linear space always goes through [`ColorF`].
    pub const fn for_blend(source: PixelFormat, target: PixelFormat, space: WorkingColorSpace) -> Self {
        if matches!(space, WorkingColorSpace::Linear) {
            return Self::ColorF;
        }
        if source.color_bits() >= 64 || target.color_bits() >= 64 {
            Self::Color64
        } else {
            Self::Color32
        }
    }
}

/// Color space in which blending and quantizing math is performed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WorkingColorSpace {
    /// Linear for linear-light formats, sRGB for everything else.
    #[default]
    Default,
    /// Gamma-encoded sRGB values.
    Srgb,
    /// Linear-light values.
    Linear,
}

impl WorkingColorSpace {
    /// Resolve [`Default`](Self::Default) against a pixel format.
    pub const fn resolve(self, format: PixelFormat) -> Self {
        match self {
            Self::Default if format.is_linear() => Self::Linear,
            Self::Default => Self::Srgb,
            other => other,
        }
    }
}

/// Decode an sRGB-encoded value in `0..=1` to linear light.
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        libm::powf((v + 0.055) / 1.055, 2.4)
    }
}

/// Encode a linear-light value in `0..=1` as sRGB.
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * libm::powf(v, 1.0 / 2.4) - 0.055
    }
}

#[inline]
pub(crate) fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[inline]
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (clamp_unit(v) * 255.0 + 0.5) as u8
}

#[inline]
pub(crate) fn unit_to_u16(v: f32) -> u16 {
    (clamp_unit(v) * 65535.0 + 0.5) as u16
}

#[inline]
pub(crate) const fn u8_to_u16(v: u8) -> u16 {
    v as u16 * 257
}

#[inline]
pub(crate) const fn u16_to_u8(v: u16) -> u8 {
    ((v as u32 * 255 + 32767) / 65535) as u8
}

/// Widen an 8-bit color to 16 bits per channel.
pub const fn color32_to_64(c: Color32) -> Color64 {
    Rgba {
        r: u8_to_u16(c.r),
        g: u8_to_u16(c.g),
        b: u8_to_u16(c.b),
        a: u8_to_u16(c.a),
    }
}

/// Narrow a 16-bit color to 8 bits per channel, rounding to nearest.
pub const fn color64_to_32(c: Color64) -> Color32 {
    Rgba {
        r: u16_to_u8(c.r),
        g: u16_to_u8(c.g),
        b: u16_to_u8(c.b),
        a: u16_to_u8(c.a),
    }
}

/// Decode an 8-bit sRGB color to linear light.
pub fn color32_to_f(c: Color32) -> ColorF {
    Rgba {
        r: srgb_to_linear(c.r as f32 / 255.0),
        g: srgb_to_linear(c.g as f32 / 255.0),
        b: srgb_to_linear(c.b as f32 / 255.0),
        a: c.a as f32 / 255.0,
    }
}

/// Encode a linear-light color as 8-bit sRGB. Out-of-range channels are clamped.
pub fn color_f_to_32(c: ColorF) -> Color32 {
    Rgba {
        r: unit_to_u8(linear_to_srgb(clamp_unit(c.r))),
        g: unit_to_u8(linear_to_srgb(clamp_unit(c.g))),
        b: unit_to_u8(linear_to_srgb(clamp_unit(c.b))),
        a: unit_to_u8(c.a),
    }
}

/// Decode a 16-bit sRGB color to linear light.
pub fn color64_to_f(c: Color64) -> ColorF {
    Rgba {
        r: srgb_to_linear(c.r as f32 / 65535.0),
        g: srgb_to_linear(c.g as f32 / 65535.0),
        b: srgb_to_linear(c.b as f32 / 65535.0),
        a: c.a as f32 / 65535.0,
    }
}

/// Encode a linear-light color as 16-bit sRGB.
pub fn color_f_to_64(c: ColorF) -> Color64 {
    Rgba {
        r: unit_to_u16(linear_to_srgb(clamp_unit(c.r))),
        g: unit_to_u16(linear_to_srgb(clamp_unit(c.g))),
        b: unit_to_u16(linear_to_srgb(clamp_unit(c.b))),
        a: unit_to_u16(c.a),
    }
}

const fn mul8(v: u8, a: u8) -> u8 {
    ((v as u32 * a as u32 + 127) / 255) as u8
}

const fn div8(v: u8, a: u8) -> u8 {
    let a = a as u32;
    let v = (v as u32 * 255 + a / 2) / a;
    if v > 255 { 255 } else { v as u8 }
}

const fn mul16(v: u16, a: u16) -> u16 {
    ((v as u32 * a as u32 + 32767) / 65535) as u16
}

const fn div16(v: u16, a: u16) -> u16 {
    let a = a as u64;
    let v = (v as u64 * 65535 + a / 2) / a;
    if v > 65535 { u16::MAX } else { v as u16 }
}

impl Premultiplied<u8> {
    /// Premultiply a straight color.
    pub const fn from_straight(c: Color32) -> Self {
        if c.a == 255 {
            return Self(c);
        }
        Self(Rgba {
            r: mul8(c.r, c.a),
            g: mul8(c.g, c.a),
            b: mul8(c.b, c.a),
            a: c.a,
        })
    }

    /// Recover the straight color.
    pub const fn to_straight(self) -> Color32 {
        let c = self.0;
        match c.a {
            255 => c,
            0 => Rgba { r: 0, g: 0, b: 0, a: 0 },
            alpha => Rgba {
                r: div8(c.r, alpha),
                g: div8(c.g, alpha),
                b: div8(c.b, alpha),
                a: alpha,
            },
        }
    }
}

impl Premultiplied<u16> {
    /// Premultiply a straight color.
    pub const fn from_straight(c: Color64) -> Self {
        if c.a == u16::MAX {
            return Self(c);
        }
        Self(Rgba {
            r: mul16(c.r, c.a),
            g: mul16(c.g, c.a),
            b: mul16(c.b, c.a),
            a: c.a,
        })
    }

    /// Recover the straight color.
    pub const fn to_straight(self) -> Color64 {
        let c = self.0;
        match c.a {
            u16::MAX => c,
            0 => Rgba { r: 0, g: 0, b: 0, a: 0 },
            alpha => Rgba {
                r: div16(c.r, alpha),
                g: div16(c.g, alpha),
                b: div16(c.b, alpha),
                a: alpha,
            },
        }
    }
}

impl Premultiplied<f32> {
    /// Premultiply a straight color.
    pub fn from_straight(c: ColorF) -> Self {
        Self(Rgba {
            r: c.r * c.a,
            g: c.g * c.a,
            b: c.b * c.a,
            a: c.a,
        })
    }

    /// Recover the straight color.
    pub fn to_straight(self) -> ColorF {
        let c = self.0;
        if c.a <= 0.0 {
            return Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
        }
        Rgba {
            r: c.r / c.a,
            g: c.g / c.a,
            b: c.b / c.a,
            a: c.a,
        }
    }
}

/// Evaluate `$body` with the type alias `$c` bound to the color type of a
/// [`Representation`], monomorphizing one code path per representation.
macro_rules! with_representation {
    ($repr:expr, $c:ident => $body:expr) => {
        match $repr {
            $crate::color::Representation::Color32 => {
                type $c = $crate::color::Color32;
                $body
            }
            $crate::color::Representation::PColor32 => {
                type $c = $crate::color::PColor32;
                $body
            }
            $crate::color::Representation::Color64 => {
                type $c = $crate::color::Color64;
                $body
            }
            $crate::color::Representation::PColor64 => {
                type $c = $crate::color::PColor64;
                $body
            }
            $crate::color::Representation::ColorF => {
                type $c = $crate::color::ColorF;
                $body
            }
            $crate::color::Representation::PColorF => {
                type $c = $crate::color::PColorF;
                $body
            }
        }
    };
}
pub(crate) use with_representation;

/// Like [`with_representation!`] for the straight representations chosen
/// by [`Representation::for_blend`]; premultiplied tags fall back to their
/// straight counterpart.
macro_rules! with_straight {
    ($repr:expr, $c:ident => $body:expr) => {
        match $repr.bits() {
            128 => {
                type $c = $crate::color::ColorF;
                $body
            }
            64 => {
                type $c = $crate::color::Color64;
                $body
            }
            _ => {
                type $c = $crate::color::Color32;
                $body
            }
        }
    };
}
pub(crate) use with_straight;

/// Source-over blend on straight unit values.
fn blend_units(src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let (sa, da) = (src[3], dst[3]);
    if sa >= 1.0 || da <= 0.0 {
        return src;
    }
    if sa <= 0.0 {
        return dst;
    }
    let inv = da * (1.0 - sa);
    let a = sa + inv;
    let channel = |i: usize| (src[i] * sa + dst[i] * inv) / a;
    [channel(0), channel(1), channel(2), a]
}

/// Blend `src` over `dst` in the given working space.
///
/// `space` must already be resolved; [`WorkingColorSpace::Default`] blends in sRGB.
pub fn blend_color32(src: Color32, dst: Color32, space: WorkingColorSpace) -> Color32 {
    if src.a == 255 || dst.a == 0 {
        return src;
    }
    if src.a == 0 {
        return dst;
    }
    match space {
        WorkingColorSpace::Linear => color_f_to_32(color32_to_f(src).blend_over(color32_to_f(dst))),
        _ => src.blend_over(dst),
    }
}

/// Flatten a translucent color onto an opaque background color.
pub fn blend_with_background(c: Color32, back: Color32, space: WorkingColorSpace) -> Color32 {
    if c.a == 255 {
        return c;
    }
    let back = Rgba { a: 255, ..back };
    let blended = blend_color32(c, back, space);
    Rgba { a: 255, ..blended }
}

/// Rec. 709 luma of an 8-bit color.
pub(crate) const fn luma8(c: Color32) -> u8 {
    ((c.r as u32 * 54 + c.g as u32 * 183 + c.b as u32 * 19 + 128) >> 8) as u8
}

/// Rec. 709 luma of a 16-bit color.
pub(crate) const fn luma16(c: Color64) -> u16 {
    ((c.r as u32 * 54 + c.g as u32 * 183 + c.b as u32 * 19 + 128) >> 8) as u16
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Color32 {}
    impl Sealed for super::Color64 {}
    impl Sealed for super::ColorF {}
    impl Sealed for super::PColor32 {}
    impl Sealed for super::PColor64 {}
    impl Sealed for super::PColorF {}
}

/// One of the six color representations a bitmap can be read and written as.
///
/// This trait is sealed.
pub trait ColorRepr: Copy + PartialEq + fmt::Debug + sealed::Sealed + 'static {
    /// The matching [`Representation`] tag.
    const REPRESENTATION: Representation;
    /// The canonical fully transparent value.
    const TRANSPARENT: Self;
    /// Totally ordered de-duplication key of a [`normalized`](Self::normalized) color.
    type Key: Ord + Copy;

    /// Read the pixel at `(x, y)`.
    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self;
    /// Write the pixel at `(x, y)`.
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self);
    /// Convert from 8-bit straight sRGB.
    fn from_color32(color: Color32) -> Self;
    /// Convert from 16-bit straight sRGB.
    fn from_color64(color: Color64) -> Self;
    /// Convert from linear straight `f32`.
    fn from_color_f(color: ColorF) -> Self;
    /// Convert to 8-bit straight sRGB.
    fn to_color32(self) -> Color32;
    /// Whether alpha is zero.
    fn is_transparent(self) -> bool;
    /// Whether alpha is at its maximum.
    fn is_opaque(self) -> bool;
    /// Clamp channels into range and map full transparency to [`TRANSPARENT`](Self::TRANSPARENT).
    fn normalized(self) -> Self;
    /// De-duplication key.
    fn key(self) -> Self::Key;
}

/// The straight-alpha representations, which support blending and combining.
///
/// This trait is sealed.
pub trait StraightColor: ColorRepr {
    /// Source-over blend of `self` onto `background`.
    fn blend_over(self, background: Self) -> Self;
}

#[inline]
fn pack32(c: Color32) -> u32 {
    u32::from_le_bytes([c.r, c.g, c.b, c.a])
}

#[inline]
fn pack64(c: Color64) -> u64 {
    (c.r as u64) | (c.g as u64) << 16 | (c.b as u64) << 32 | (c.a as u64) << 48
}

/// Bit pattern of a clamped float with `-0.0` folded into `0.0`.
#[inline]
fn float_key(v: f32) -> u32 {
    (v + 0.0).to_bits()
}

impl ColorRepr for Color32 {
    const REPRESENTATION: Representation = Representation::Color32;
    const TRANSPARENT: Self = Rgba { r: 0, g: 0, b: 0, a: 0 };
    type Key = u32;

    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self {
        bitmap.get_color32(x, y)
    }
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self) {
        bitmap.set_color32(x, y, color);
    }
    fn from_color32(color: Color32) -> Self {
        color
    }
    fn from_color64(color: Color64) -> Self {
        color64_to_32(color)
    }
    fn from_color_f(color: ColorF) -> Self {
        color_f_to_32(color)
    }
    fn to_color32(self) -> Color32 {
        self
    }
    fn is_transparent(self) -> bool {
        self.a == 0
    }
    fn is_opaque(self) -> bool {
        self.a == u8::MAX
    }
    fn normalized(self) -> Self {
        if self.a == 0 { Self::TRANSPARENT } else { self }
    }
    fn key(self) -> u32 {
        pack32(self)
    }
}

impl ColorRepr for PColor32 {
    const REPRESENTATION: Representation = Representation::PColor32;
    const TRANSPARENT: Self = Premultiplied(Rgba { r: 0, g: 0, b: 0, a: 0 });
    type Key = u32;

    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self {
        bitmap.get_pcolor32(x, y)
    }
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self) {
        bitmap.set_pcolor32(x, y, color);
    }
    fn from_color32(color: Color32) -> Self {
        Self::from_straight(color)
    }
    fn from_color64(color: Color64) -> Self {
        Self::from_straight(color64_to_32(color))
    }
    fn from_color_f(color: ColorF) -> Self {
        Self::from_straight(color_f_to_32(color))
    }
    fn to_color32(self) -> Color32 {
        self.to_straight()
    }
    fn is_transparent(self) -> bool {
        self.0.a == 0
    }
    fn is_opaque(self) -> bool {
        self.0.a == u8::MAX
    }
    fn normalized(self) -> Self {
        if self.0.a == 0 { Self::TRANSPARENT } else { self }
    }
    fn key(self) -> u32 {
        pack32(self.0)
    }
}

impl ColorRepr for Color64 {
    const REPRESENTATION: Representation = Representation::Color64;
    const TRANSPARENT: Self = Rgba { r: 0, g: 0, b: 0, a: 0 };
    type Key = u64;

    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self {
        bitmap.get_color64(x, y)
    }
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self) {
        bitmap.set_color64(x, y, color);
    }
    fn from_color32(color: Color32) -> Self {
        color32_to_64(color)
    }
    fn from_color64(color: Color64) -> Self {
        color
    }
    fn from_color_f(color: ColorF) -> Self {
        color_f_to_64(color)
    }
    fn to_color32(self) -> Color32 {
        color64_to_32(self)
    }
    fn is_transparent(self) -> bool {
        self.a == 0
    }
    fn is_opaque(self) -> bool {
        self.a == u16::MAX
    }
    fn normalized(self) -> Self {
        if self.a == 0 { Self::TRANSPARENT } else { self }
    }
    fn key(self) -> u64 {
        pack64(self)
    }
}

impl ColorRepr for PColor64 {
    const REPRESENTATION: Representation = Representation::PColor64;
    const TRANSPARENT: Self = Premultiplied(Rgba { r: 0, g: 0, b: 0, a: 0 });
    type Key = u64;

    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self {
        bitmap.get_pcolor64(x, y)
    }
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self) {
        bitmap.set_pcolor64(x, y, color);
    }
    fn from_color32(color: Color32) -> Self {
        Self::from_straight(color32_to_64(color))
    }
    fn from_color64(color: Color64) -> Self {
        Self::from_straight(color)
    }
    fn from_color_f(color: ColorF) -> Self {
        Self::from_straight(color_f_to_64(color))
    }
    fn to_color32(self) -> Color32 {
        color64_to_32(self.to_straight())
    }
    fn is_transparent(self) -> bool {
        self.0.a == 0
    }
    fn is_opaque(self) -> bool {
        self.0.a == u16::MAX
    }
    fn normalized(self) -> Self {
        if self.0.a == 0 { Self::TRANSPARENT } else { self }
    }
    fn key(self) -> u64 {
        pack64(self.0)
    }
}

impl ColorRepr for ColorF {
    const REPRESENTATION: Representation = Representation::ColorF;
    const TRANSPARENT: Self = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
    type Key = [u32; 4];

    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self {
        bitmap.get_color_f(x, y)
    }
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self) {
        bitmap.set_color_f(x, y, color);
    }
    fn from_color32(color: Color32) -> Self {
        color32_to_f(color)
    }
    fn from_color64(color: Color64) -> Self {
        color64_to_f(color)
    }
    fn from_color_f(color: ColorF) -> Self {
        color
    }
    fn to_color32(self) -> Color32 {
        color_f_to_32(self)
    }
    fn is_transparent(self) -> bool {
        !(self.a > 0.0)
    }
    fn is_opaque(self) -> bool {
        self.a >= 1.0
    }
    fn normalized(self) -> Self {
        let a = clamp_unit(self.a);
        if a == 0.0 {
            return Self::TRANSPARENT;
        }
        Rgba {
            r: clamp_unit(self.r),
            g: clamp_unit(self.g),
            b: clamp_unit(self.b),
            a,
        }
    }
    fn key(self) -> [u32; 4] {
        [float_key(self.r), float_key(self.g), float_key(self.b), float_key(self.a)]
    }
}

impl ColorRepr for PColorF {
    const REPRESENTATION: Representation = Representation::PColorF;
    const TRANSPARENT: Self = Premultiplied(Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 });
    type Key = [u32; 4];

    fn read<B: BitmapData + ?Sized>(bitmap: &B, x: u32, y: u32) -> Self {
        bitmap.get_pcolor_f(x, y)
    }
    fn write<B: BitmapDataMut + ?Sized>(bitmap: &mut B, x: u32, y: u32, color: Self) {
        bitmap.set_pcolor_f(x, y, color);
    }
    fn from_color32(color: Color32) -> Self {
        Self::from_straight(color32_to_f(color))
    }
    fn from_color64(color: Color64) -> Self {
        Self::from_straight(color64_to_f(color))
    }
    fn from_color_f(color: ColorF) -> Self {
        Self::from_straight(color)
    }
    fn to_color32(self) -> Color32 {
        color_f_to_32(self.to_straight())
    }
    fn is_transparent(self) -> bool {
        !(self.0.a > 0.0)
    }
    fn is_opaque(self) -> bool {
        self.0.a >= 1.0
    }
    fn normalized(self) -> Self {
        let a = clamp_unit(self.0.a);
        if a == 0.0 {
            return Self::TRANSPARENT;
        }
        // premultiplied channels never exceed alpha
        let channel = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, a) };
        Premultiplied(Rgba {
            r: channel(self.0.r),
            g: channel(self.0.g),
            b: channel(self.0.b),
            a,
        })
    }
    fn key(self) -> [u32; 4] {
        let c = self.0;
        [float_key(c.r), float_key(c.g), float_key(c.b), float_key(c.a)]
    }
}

impl StraightColor for Color32 {
    fn blend_over(self, background: Self) -> Self {
        if self.a == u8::MAX || background.a == 0 {
            return self;
        }
        if self.a == 0 {
            return background;
        }
        let unit = |c: Self| {
            [
                c.r as f32 / 255.0,
                c.g as f32 / 255.0,
                c.b as f32 / 255.0,
                c.a as f32 / 255.0,
            ]
        };
        let [r, g, b, a] = blend_units(unit(self), unit(background));
        Rgba {
            r: unit_to_u8(r),
            g: unit_to_u8(g),
            b: unit_to_u8(b),
            a: unit_to_u8(a),
        }
    }
}

impl StraightColor for Color64 {
    fn blend_over(self, background: Self) -> Self {
        if self.a == u16::MAX || background.a == 0 {
            return self;
        }
        if self.a == 0 {
            return background;
        }
        let unit = |c: Self| {
            [
                c.r as f32 / 65535.0,
                c.g as f32 / 65535.0,
                c.b as f32 / 65535.0,
                c.a as f32 / 65535.0,
            ]
        };
        let [r, g, b, a] = blend_units(unit(self), unit(background));
        Rgba {
            r: unit_to_u16(r),
            g: unit_to_u16(g),
            b: unit_to_u16(b),
            a: unit_to_u16(a),
        }
    }
}

impl StraightColor for ColorF {
    fn blend_over(self, background: Self) -> Self {
        let [r, g, b, a] = blend_units(
            [self.r, self.g, self.b, self.a],
            [background.r, background.g, background.b, background.a],
        );
        Rgba { r, g, b, a }
    }
}
