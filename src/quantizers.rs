//! Reference quantizers.
//!
//! [`PredefinedColorsQuantizer`] maps onto a fixed color set chosen up
//! front and never looks at pixels. [`PopularityQuantizer`] builds a
//! palette from the most frequent colors of its source, so the engine
//! has to show it the final rendered content.

use alloc::boxed::Box;
use alloc::vec::Vec;

use enough::{Stop, StopReason};
use rgb::Rgba;

use crate::bitmap::BitmapData;
use crate::color::{Color32, WorkingColorSpace, blend_with_background, luma8};
use crate::format::PixelFormat;
use crate::palette::Palette;
use crate::session::{Quantizer, QuantizingSession};

const TRANSPARENT: Color32 = Rgba { r: 0, g: 0, b: 0, a: 0 };

#[derive(Clone, Debug, PartialEq)]
enum Predefined {
    Palette,
    Rgb888,
    Argb8888,
    Rgb565,
    Argb1555,
    Grayscale,
    BlackAndWhite,
}

/// Quantizer over a predefined color set: a palette or the colors a pixel
/// format can represent.
#[derive(Clone, Debug, PartialEq)]
pub struct PredefinedColorsQuantizer {
    kind: Predefined,
    palette: Option<Palette>,
    back_color: Color32,
    alpha_threshold: u8,
    working_space: WorkingColorSpace,
}

impl PredefinedColorsQuantizer {
    fn with_kind(kind: Predefined, back_color: Color32, alpha_threshold: u8) -> Self {
        let palette = match kind {
            Predefined::Grayscale => Some(Palette::grayscale(256).with_back_color(back_color)),
            Predefined::BlackAndWhite => Some(Palette::black_and_white().with_back_color(back_color)),
            _ => None,
        };
        Self {
            kind,
            palette,
            back_color: Rgba { a: 255, ..back_color },
            alpha_threshold,
            working_space: WorkingColorSpace::Default,
        }
    }

    /// Nearest entry of `palette`, using the palette's own back color,
    /// alpha threshold and working space.
    pub fn from_palette(palette: Palette) -> Self {
        let threshold = if palette.transparent_index().is_some() {
            palette.alpha_threshold()
        } else {
            0
        };
        Self {
            kind: Predefined::Palette,
            back_color: palette.back_color(),
            alpha_threshold: threshold,
            working_space: palette.working_space(),
            palette: Some(palette),
        }
    }

    /// 24-bit RGB; translucent colors are blended with `back_color`.
    pub fn rgb888(back_color: Color32) -> Self {
        Self::with_kind(Predefined::Rgb888, back_color, 0)
    }

    /// 32-bit ARGB; colors with alpha below `alpha_threshold` become
    /// transparent, everything else is kept.
    pub fn argb8888(back_color: Color32, alpha_threshold: u8) -> Self {
        Self::with_kind(Predefined::Argb8888, back_color, alpha_threshold)
    }

    /// 16-bit 5-6-5 RGB.
    pub fn rgb565(back_color: Color32) -> Self {
        Self::with_kind(Predefined::Rgb565, back_color, 0)
    }

    /// 16-bit 1-5-5-5 ARGB.
    pub fn argb1555(back_color: Color32, alpha_threshold: u8) -> Self {
        Self::with_kind(Predefined::Argb1555, back_color, alpha_threshold)
    }

    /// 256 gray shades.
    pub fn grayscale(back_color: Color32) -> Self {
        Self::with_kind(Predefined::Grayscale, back_color, 0)
    }

    /// Black and white, split at mid luminance.
    pub fn black_and_white(back_color: Color32) -> Self {
        Self::with_kind(Predefined::BlackAndWhite, back_color, 0)
    }

    /// The color set `bitmap` can store, with its back color, alpha
    /// threshold and working space.
    pub fn for_bitmap(bitmap: &dyn BitmapData) -> Self {
        let back = bitmap.back_color();
        let threshold = bitmap.alpha_threshold();
        let quantizer = match bitmap.pixel_format() {
            PixelFormat::Indexed1 | PixelFormat::Indexed4 | PixelFormat::Indexed8 => {
                match bitmap.palette() {
                    Some(palette) => return Self::from_palette(palette.clone()),
                    None => Self::black_and_white(back),
                }
            }
            PixelFormat::Rgb565 => Self::rgb565(back),
            PixelFormat::Argb1555 => Self::argb1555(back, threshold),
            PixelFormat::Gray8 | PixelFormat::Gray16 => Self::grayscale(back),
            PixelFormat::Rgb24 => Self::rgb888(back),
            _ => Self::argb8888(back, 0),
        };
        quantizer.with_working_space(bitmap.working_space())
    }

    /// Set the working color space used for blending with the back color.
    pub fn with_working_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_space = space;
        self.palette = self.palette.map(|p| p.with_working_space(space));
        self
    }

    fn flatten(&self, color: Color32) -> Color32 {
        blend_with_background(color, self.back_color, self.working_space)
    }
}

struct PredefinedSession<'a>(&'a PredefinedColorsQuantizer);

impl QuantizingSession for PredefinedSession<'_> {
    fn palette(&self) -> Option<&Palette> {
        self.0.palette.as_ref()
    }

    fn back_color(&self) -> Color32 {
        self.0.back_color
    }

    fn alpha_threshold(&self) -> u8 {
        self.0.alpha_threshold
    }

    fn working_space(&self) -> WorkingColorSpace {
        self.0.working_space
    }

    fn quantize(&self, color: Color32) -> Color32 {
        let q = self.0;
        match q.kind {
            Predefined::Palette => q
                .palette
                .as_ref()
                .map_or(color, |palette| palette.nearest_color(color)),
            Predefined::Rgb888 => q.flatten(color),
            Predefined::Argb8888 if color.a < q.alpha_threshold => TRANSPARENT,
            Predefined::Argb8888 => color,
            Predefined::Rgb565 => {
                let c = q.flatten(color);
                Rgba::new(reduce(c.r, 5), reduce(c.g, 6), reduce(c.b, 5), 255)
            }
            Predefined::Argb1555 if color.a < q.alpha_threshold => TRANSPARENT,
            Predefined::Argb1555 => {
                let c = q.flatten(color);
                Rgba::new(reduce(c.r, 5), reduce(c.g, 5), reduce(c.b, 5), 255)
            }
            Predefined::Grayscale => {
                let v = luma8(q.flatten(color));
                Rgba::new(v, v, v, 255)
            }
            Predefined::BlackAndWhite => {
                let v = if luma8(q.flatten(color)) >= 128 { 255 } else { 0 };
                Rgba::new(v, v, v, 255)
            }
        }
    }
}

/// Truncate to `bits` and replicate the high bits back into the low ones.
#[inline]
fn reduce(v: u8, bits: u32) -> u8 {
    let kept = v >> (8 - bits);
    (kept << (8 - bits)) | (kept >> (2 * bits - 8))
}

impl Quantizer for PredefinedColorsQuantizer {
    fn initialize_reads_content(&self) -> bool {
        false
    }

    fn working_space(&self) -> WorkingColorSpace {
        self.working_space
    }

    fn initialize<'a>(
        &'a self,
        _source: &dyn BitmapData,
        stop: &dyn Stop,
    ) -> Result<Box<dyn QuantizingSession + 'a>, StopReason> {
        stop.check()?;
        Ok(Box::new(PredefinedSession(self)))
    }
}

/// Palette of the most frequent colors of the source.
///
/// Colors are binned at 5 bits per channel; each palette entry is the
/// average of one bin. When the source has pixels below the alpha
/// threshold, one entry is reserved for transparency.
#[derive(Clone, Debug, PartialEq)]
pub struct PopularityQuantizer {
    max_colors: usize,
    back_color: Color32,
    alpha_threshold: u8,
    working_space: WorkingColorSpace,
}

impl PopularityQuantizer {
    /// Up to `max_colors` entries, clamped to `2..=256`.
    pub fn new(max_colors: usize) -> Self {
        Self {
            max_colors: max_colors.clamp(2, 256),
            back_color: Rgba::new(0, 0, 0, 255),
            alpha_threshold: 128,
            working_space: WorkingColorSpace::Default,
        }
    }

    /// Set the back color. Its alpha is ignored.
    pub fn with_back_color(mut self, color: Color32) -> Self {
        self.back_color = Rgba { a: 255, ..color };
        self
    }

    /// Set the alpha threshold; 0 disables transparency.
    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = threshold;
        self
    }

    /// Set the working color space.
    pub fn with_working_space(mut self, space: WorkingColorSpace) -> Self {
        self.working_space = space;
        self
    }

    fn build_palette(&self, source: &dyn BitmapData, stop: &dyn Stop) -> Result<Palette, StopReason> {
        const BINS: usize = 1 << 15;
        let mut counts = alloc::vec![0u32; BINS];
        let mut sums = alloc::vec![[0u64; 3]; BINS];
        let mut has_transparent = false;
        for y in 0..source.height() {
            stop.check()?;
            for x in 0..source.width() {
                let color = source.get_color32(x, y);
                if color.a < self.alpha_threshold {
                    has_transparent = true;
                    continue;
                }
                let c = blend_with_background(color, self.back_color, self.working_space);
                let bin = (c.r as usize >> 3) << 10 | (c.g as usize >> 3) << 5 | c.b as usize >> 3;
                counts[bin] += 1;
                let sum = &mut sums[bin];
                sum[0] += c.r as u64;
                sum[1] += c.g as u64;
                sum[2] += c.b as u64;
            }
        }

        let mut bins: Vec<usize> = (0..BINS).filter(|&bin| counts[bin] != 0).collect();
        bins.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
        let room = self.max_colors - usize::from(has_transparent);
        let mut entries: Vec<Color32> = bins
            .into_iter()
            .take(room)
            .map(|bin| {
                let n = counts[bin] as u64;
                let avg = |sum: u64| ((sum + n / 2) / n) as u8;
                let [r, g, b] = sums[bin];
                Rgba::new(avg(r), avg(g), avg(b), 255)
            })
            .collect();
        if has_transparent || entries.is_empty() {
            entries.push(TRANSPARENT);
        }
        log::trace!("popularity palette with {} entries", entries.len());
        Ok(Palette::from_entries(entries)
            .with_back_color(self.back_color)
            .with_alpha_threshold(self.alpha_threshold)
            .with_working_space(self.working_space))
    }
}

struct PaletteSession {
    palette: Palette,
}

impl QuantizingSession for PaletteSession {
    fn palette(&self) -> Option<&Palette> {
        Some(&self.palette)
    }

    fn back_color(&self) -> Color32 {
        self.palette.back_color()
    }

    fn alpha_threshold(&self) -> u8 {
        if self.palette.transparent_index().is_some() {
            self.palette.alpha_threshold()
        } else {
            0
        }
    }

    fn working_space(&self) -> WorkingColorSpace {
        self.palette.working_space()
    }

    fn quantize(&self, color: Color32) -> Color32 {
        self.palette.nearest_color(color)
    }
}

impl Quantizer for PopularityQuantizer {
    fn initialize_reads_content(&self) -> bool {
        true
    }

    fn working_space(&self) -> WorkingColorSpace {
        self.working_space
    }

    fn initialize<'a>(
        &'a self,
        source: &dyn BitmapData,
        stop: &dyn Stop,
    ) -> Result<Box<dyn QuantizingSession + 'a>, StopReason> {
        let palette = self.build_palette(source, stop)?;
        Ok(Box::new(PaletteSession { palette }))
    }
}
