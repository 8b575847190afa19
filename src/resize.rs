//! Scaled drawing and resizing.
//!
//! Target pixels are sampled from the requested source rectangle as if
//! nothing were clipped; clipping only decides which target pixels are
//! produced and which source pixels may be read. Interpolating filters
//! accumulate premultiplied `f32` values in the target's working color
//! space, so transparent pixels never bleed their hidden color.

use alloc::vec::Vec;

use bitvec::vec::BitVec;

use log::debug;
use rgb::Rgba;

use crate::aliasing::{Temporary, guard};
use crate::bitmap::{BitmapData, BitmapDataMut, Source};
use crate::buffer::Bitmap;
use crate::color::{ColorRepr, WorkingColorSpace, clamp_unit, unit_to_u16};
use crate::context::{Context, Stage};
use crate::copy::{Collaborators, Pipeline, RowReader, Rows, copy};
use crate::error::TransformError;
use crate::rect::{Point, Rect, Size, fit_aspect_ratio, reconcile_scaled};

/// How pixels are resampled when source and target sizes differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScalingMode {
    /// Never scale; the source is copied at its own size.
    NoScaling,
    /// Pick the closest source pixel.
    NearestNeighbor,
    /// Average the source pixels each target pixel covers.
    Box,
    /// Linear interpolation between neighbouring pixels.
    Bilinear,
    /// Catmull-Rom cubic interpolation.
    Bicubic,
    /// Bilinear.
    #[default]
    Auto,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Kernel {
    Nearest,
    Box,
    Triangle,
    CatmullRom,
}

impl Kernel {
    fn for_mode(mode: ScalingMode) -> Self {
        match mode {
            ScalingMode::NearestNeighbor | ScalingMode::NoScaling => Self::Nearest,
            ScalingMode::Box => Self::Box,
            ScalingMode::Bilinear | ScalingMode::Auto => Self::Triangle,
            ScalingMode::Bicubic => Self::CatmullRom,
        }
    }

    fn support(self) -> f32 {
        match self {
            Self::Nearest | Self::Box => 0.5,
            Self::Triangle => 1.0,
            Self::CatmullRom => 2.0,
        }
    }

    fn weight(self, x: f32) -> f32 {
        let ax = x.abs();
        match self {
            Self::Nearest | Self::Box => {
                if (-0.5..0.5).contains(&x) {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Triangle => (1.0 - ax).max(0.0),
            Self::CatmullRom => {
                if ax < 1.0 {
                    1.5 * ax * ax * ax - 2.5 * ax * ax + 1.0
                } else if ax < 2.0 {
                    -0.5 * ax * ax * ax + 2.5 * ax * ax - 4.0 * ax + 2.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Source pixels contributing to one target column or row.
#[derive(Clone, Debug, PartialEq)]
struct Taps {
    start: u32,
    weights: Vec<f32>,
}

/// Closest source index for target index `t` of a `to`-long span mapped
/// from a `from`-long span starting at `origin`, clamped to `lo..hi`.
fn nearest(t: i64, to: i64, from: i64, origin: i64, lo: i64, hi: i64) -> u32 {
    let s = origin + (2 * t + 1) * from / (2 * to);
    s.clamp(lo, hi - 1) as u32
}

/// Filter taps along one axis.
///
/// `from`/`to` are the requested source and target spans, `clip` the
/// readable source span and `out` the produced target span.
fn axis_taps(kernel: Kernel, from: (i32, i32), to: (i32, i32), clip: (i32, i32), out: (i32, i32)) -> Vec<Taps> {
    let (from_origin, from_len) = (from.0 as i64, from.1 as i64);
    let (to_origin, to_len) = (to.0 as i64, to.1 as i64);
    let (lo, hi) = (clip.0 as i64, clip.0 as i64 + clip.1 as i64);
    let scale = from_len as f32 / to_len as f32;
    let stretch = scale.max(1.0);
    let support = kernel.support() * stretch;
    (out.0..out.0 + out.1)
        .map(|t| {
            let rel = t as i64 - to_origin;
            if kernel == Kernel::Nearest {
                return Taps {
                    start: nearest(rel, to_len, from_len, from_origin, lo, hi),
                    weights: alloc::vec![1.0],
                };
            }
            let center = from_origin as f32 + (rel as f32 + 0.5) * scale - 0.5;
            let first = libm::floorf(center - support) as i64;
            let last = libm::ceilf(center + support) as i64;
            let start = first.clamp(lo, hi - 1);
            let end = last.clamp(lo, hi - 1);
            let mut weights = alloc::vec![0.0f32; (end - start + 1) as usize];
            for i in first..=last {
                let w = kernel.weight((i as f32 - center) / stretch);
                if w != 0.0 {
                    weights[(i.clamp(start, end) - start) as usize] += w;
                }
            }
            let total: f32 = weights.iter().sum();
            if total.abs() < f32::EPSILON {
                return Taps {
                    start: nearest(rel, to_len, from_len, from_origin, lo, hi),
                    weights: alloc::vec![1.0],
                };
            }
            weights.iter_mut().for_each(|w| *w /= total);
            Taps {
                start: start as u32,
                weights,
            }
        })
        .collect()
}

/// Produces the resampled rows of a scaled region.
pub(crate) struct Resampler {
    kernel: Kernel,
    clip: Rect,
    out: Size,
    space: WorkingColorSpace,
    columns: Vec<Taps>,
    rows: Vec<Taps>,
}

impl Resampler {
    /// Map requested `from` (in readable source coordinates) onto requested
    /// `to`, reading only `clip` and producing only `out`.
    pub(crate) fn new(mode: ScalingMode, from: Rect, to: Rect, clip: Rect, out: Rect, space: WorkingColorSpace) -> Self {
        let kernel = Kernel::for_mode(mode);
        Self {
            kernel,
            clip,
            out: out.size(),
            space,
            columns: axis_taps(kernel, (from.x, from.width), (to.x, to.width), (clip.x, clip.width), (out.x, out.width)),
            rows: axis_taps(kernel, (from.y, from.height), (to.y, to.height), (clip.y, clip.height), (out.y, out.height)),
        }
    }

    /// Premultiplied unit values in the working space.
    fn sample(&self, source: &dyn BitmapData, x: u32, y: u32) -> [f32; 4] {
        let [r, g, b, a] = match self.space {
            WorkingColorSpace::Linear => {
                let c = source.get_color_f(x, y);
                [c.r, c.g, c.b, clamp_unit(c.a)]
            }
            _ => {
                let c = source.get_color64(x, y);
                let unit = |v: u16| v as f32 / 65535.0;
                [unit(c.r), unit(c.g), unit(c.b), unit(c.a)]
            }
        };
        [r * a, g * a, b * a, a]
    }

    fn finish<C: ColorRepr>(&self, sum: [f32; 4]) -> C {
        let a = clamp_unit(sum[3]);
        if a <= 0.0 {
            return C::TRANSPARENT;
        }
        let channel = |i: usize| clamp_unit(sum[i] / a);
        match self.space {
            WorkingColorSpace::Linear => C::from_color_f(Rgba::new(channel(0), channel(1), channel(2), a)),
            _ => C::from_color64(Rgba::new(
                unit_to_u16(channel(0)),
                unit_to_u16(channel(1)),
                unit_to_u16(channel(2)),
                unit_to_u16(a),
            )),
        }
    }
}

impl RowReader for Resampler {
    fn source_rect(&self) -> Rect {
        self.clip
    }

    fn extent(&self) -> Size {
        self.out
    }

    fn read_row<C: ColorRepr>(&self, source: &dyn BitmapData, y: u32, row: &mut Vec<C>) {
        let vertical = &self.rows[y as usize];
        if self.kernel == Kernel::Nearest {
            row.extend(self.columns.iter().map(|column| C::read(source, column.start, vertical.start)));
            return;
        }
        for column in &self.columns {
            let mut sum = [0.0f32; 4];
            for (sy, wy) in (vertical.start..).zip(&vertical.weights) {
                for (sx, wx) in (column.start..).zip(&column.weights) {
                    let w = wx * wy;
                    let p = self.sample(source, sx, sy);
                    for (acc, v) in sum.iter_mut().zip(p) {
                        *acc += v * w;
                    }
                }
            }
            row.push(self.finish(sum));
        }
    }
}

/// Draw `source_rect` of `source` scaled into `target_rect` of `target`.
///
/// Falls back to an unscaled [`copy`] when the sizes match or scaling is
/// disabled. With content-dependent collaborators the resampled pixels are
/// blended into a full-precision copy of the target region first; only the
/// pixels that were written are then quantized back into the target.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_resized(
    ctx: &Context<'_>,
    collaborators: Collaborators<'_>,
    source: Source<'_>,
    target: &mut dyn BitmapDataMut,
    source_rect: Rect,
    target_rect: Rect,
    mode: ScalingMode,
    blend: bool,
) -> Result<(), TransformError> {
    if mode == ScalingMode::NoScaling || source_rect.size() == target_rect.size() {
        return copy(ctx, collaborators, source, target, source_rect, target_rect.location(), blend);
    }
    let source_size = source.view(&*target).size();
    let region = reconcile_scaled(source_size, source_rect, target.size(), target_rect);
    if region.is_empty() {
        debug!("nothing left of {source_rect:?} -> {target_rect:?} after clipping");
        return Ok(());
    }
    let plan = collaborators.plan(&*target);
    // filter taps near the clip edges still read the whole readable source
    let readable = source_rect.intersect(Rect::from_size(source_size));
    let mut slot = None;
    let Some((source, clip)) = guard(
        ctx,
        source,
        &*target,
        readable,
        region.target,
        true,
        true,
        &mut slot,
    )?
    else {
        return Ok(());
    };
    // a captured source is read at shifted coordinates
    let from = source_rect.offset(clip.x - readable.x, clip.y - readable.y);
    let space = target.resolved_working_space();
    let resampler = Resampler::new(mode, from, target_rect, clip, region.target, space);
    let location = region.target.location();

    if !plan.reads_content() {
        return Rows {
            blend,
            ..Rows::new(Stage::Resize, source, resampler, location)
        }
        .run_planned(ctx, &plan, target);
    }

    debug!("content-dependent collaborators, resampling into an intermediate");
    let format = target.pixel_format().intermediate();
    let mut temp = Temporary::capture_as(ctx, &*target, region.target, format)?;
    let mut touched: BitVec = BitVec::repeat(false, region.target.size().pixel_count());
    let view = source.view(&*target);
    Rows {
        blend,
        skip_transparent: blend,
        ..Rows::new(Stage::Resize, Source::Other(view), resampler, Point::ORIGIN)
    }
    .run(ctx, temp.bitmap_mut(), &mut Pipeline::Direct, Some(touched.as_mut_bitslice()))?;
    Rows {
        mask: Some(touched.as_bitslice()),
        ..Rows::new(Stage::Copy, Source::Other(&*temp), temp.bounds(), location)
    }
    .run_planned(ctx, &plan, target)
}

/// Resample `source` into a new bitmap of `size`.
///
/// With `keep_aspect_ratio` the content is centered and the borders are
/// left transparent; formats without alpha are widened to their
/// alpha-capable counterpart when borders remain.
pub(crate) fn resize(
    ctx: &Context<'_>,
    collaborators: Collaborators<'_>,
    source: &dyn BitmapData,
    size: Size,
    mode: ScalingMode,
    keep_aspect_ratio: bool,
) -> Result<Bitmap, TransformError> {
    let content = if keep_aspect_ratio {
        fit_aspect_ratio(source.size(), size)
    } else {
        Rect::from_size(size)
    };
    let mut format = source.pixel_format();
    if content.size() != size && !format.has_alpha() {
        debug!("letterboxing {format:?}, widening to {:?}", format.with_alpha());
        format = format.with_alpha();
    }
    let mut result = Bitmap::compatible(source, size, format)?;
    draw_resized(
        ctx,
        collaborators,
        Source::Other(source),
        &mut result,
        source.bounds(),
        content,
        mode,
        false,
    )?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color32;
    use crate::context::tests::StopAfter;
    use crate::copy::tests::{pixels, random_bitmap};
    use crate::format::PixelFormat;
    use crate::quantizers::PopularityQuantizer;
    use crate::sampler::tests::XorShift;

    fn draw(source: Source<'_>, target: &mut dyn BitmapDataMut, from: Rect, to: Rect, mode: ScalingMode) {
        draw_resized(&Context::new(), Collaborators::default(), source, target, from, to, mode, true).unwrap();
    }

    #[test]
    fn nearest_draw_into_sub_rectangle() {
        let red = Rgba::new(255, 0, 0, 255);
        let mut source = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        source.clear(red);
        let mut target = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        let backdrop = Rgba::new(0, 0, 255, 255);
        target.clear(backdrop);
        draw(Source::from(&source), &mut target, source.bounds(), Rect::new(1, 1, 2, 2), ScalingMode::NearestNeighbor);
        for y in 0..8 {
            for x in 0..8 {
                let inside = (1..=2).contains(&x) && (1..=2).contains(&y);
                let expected = if inside { red } else { backdrop };
                assert_eq!(target.get_color32(x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn nearest_picks_cell_centers() {
        let mut source = Bitmap::new(4, 1, PixelFormat::Gray8).unwrap();
        for x in 0..4 {
            let v = (x * 50) as u8;
            source.set_color32(x, 0, Rgba::new(v, v, v, 255));
        }
        let mut target = Bitmap::new(2, 1, PixelFormat::Gray8).unwrap();
        let bounds = target.bounds();
        draw(Source::from(&source), &mut target, source.bounds(), bounds, ScalingMode::NearestNeighbor);
        assert_eq!(target.get_color32(0, 0).r, 50);
        assert_eq!(target.get_color32(1, 0).r, 150);
    }

    #[test]
    fn box_downscale_averages() {
        let mut source = Bitmap::new(2, 2, PixelFormat::Rgba32).unwrap();
        source.set_color32(0, 0, Rgba::new(200, 200, 200, 255));
        source.set_color32(1, 1, Rgba::new(200, 200, 200, 255));
        let mut target = Bitmap::new(1, 1, PixelFormat::Rgba32).unwrap();
        let bounds = target.bounds();
        draw_resized(
            &Context::new(),
            Collaborators::default(),
            Source::from(&source),
            &mut target,
            source.bounds(),
            bounds,
            ScalingMode::Box,
            false,
        )
        .unwrap();
        // the two transparent pixels contribute no color, only coverage
        assert_eq!(target.get_color32(0, 0), Rgba::new(200, 200, 200, 128));
    }

    #[test]
    fn interpolation_keeps_flat_colors_flat() {
        for mode in [ScalingMode::Bilinear, ScalingMode::Bicubic, ScalingMode::Box, ScalingMode::Auto] {
            let mut source = Bitmap::new(5, 3, PixelFormat::Rgb24).unwrap();
            source.clear(Rgba::new(10, 120, 240, 255));
            let result = resize(&Context::new(), Collaborators::default(), &source, Size::new(13, 7), mode, false).unwrap();
            assert!(pixels(&result).iter().all(|&c| c == Rgba::new(10, 120, 240, 255)), "{mode:?}");
        }
    }

    #[test]
    fn letterbox_is_transparent_outside_and_matches_plain_resize_inside() {
        let mut rng = XorShift(5);
        let source = random_bitmap(&mut rng, 8, 4, PixelFormat::Rgb24);
        for mode in [ScalingMode::NearestNeighbor, ScalingMode::Bilinear] {
            let boxed = resize(&Context::new(), Collaborators::default(), &source, Size::new(10, 10), mode, true).unwrap();
            assert_eq!(boxed.pixel_format(), PixelFormat::Rgba32);
            let content = fit_aspect_ratio(source.size(), Size::new(10, 10));
            assert_eq!(content, Rect::new(0, 2, 10, 5));
            let plain = resize(&Context::new(), Collaborators::default(), &source, content.size(), mode, false).unwrap();
            for y in 0..10 {
                for x in 0..10 {
                    let c = boxed.get_color32(x, y);
                    if content.contains(Rect::new(x as i32, y as i32, 1, 1)) {
                        assert_eq!(c, plain.get_color32(x, y - 2), "{mode:?} ({x}, {y})");
                        assert_eq!(c.a, 255);
                    } else {
                        assert_eq!(c, Rgba::new(0, 0, 0, 0), "{mode:?} ({x}, {y})");
                    }
                }
            }
        }
    }

    #[test]
    fn clipped_target_samples_like_unclipped() {
        let mut rng = XorShift(77);
        let source = random_bitmap(&mut rng, 6, 6, PixelFormat::Rgba32);
        let mut full = Bitmap::new(12, 12, PixelFormat::Rgba32).unwrap();
        draw(Source::from(&source), &mut full, source.bounds(), Rect::new(0, 0, 12, 12), ScalingMode::Bilinear);
        let mut clipped = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        draw(Source::from(&source), &mut clipped, source.bounds(), Rect::new(-4, -4, 12, 12), ScalingMode::Bilinear);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(clipped.get_color32(x, y), full.get_color32(x + 4, y + 4));
            }
        }
    }

    #[test]
    fn overlapping_scaled_draw_reads_a_capture() {
        let mut rng = XorShift(21);
        let original = random_bitmap(&mut rng, 10, 10, PixelFormat::Rgba32);
        let snapshot = original.clone();
        let mut aliased = original.clone();
        let mut expected = original;
        let (from, to) = (Rect::new(0, 0, 6, 6), Rect::new(2, 2, 8, 8));
        draw(Source::Target, &mut aliased, from, to, ScalingMode::Bicubic);
        draw(Source::from(&snapshot), &mut expected, from, to, ScalingMode::Bicubic);
        assert_eq!(pixels(&aliased), pixels(&expected));
    }

    #[test]
    fn clipped_source_never_writes_past_target_rect() {
        let red = Rgba::new(255, 0, 0, 255);
        let blue = Rgba::new(0, 0, 255, 255);
        let mut source = Bitmap::new(1, 2, PixelFormat::Rgba32).unwrap();
        source.clear(red);
        let mut target = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        target.clear(blue);
        draw(Source::from(&source), &mut target, Rect::new(-1, 0, 2, 2), Rect::new(0, 0, 3, 3), ScalingMode::NearestNeighbor);
        for y in 0..8 {
            for x in 0..8 {
                let expected = if x == 2 && y < 3 { red } else { blue };
                assert_eq!(target.get_color32(x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn two_phase_scaled_draw_equals_blend_then_quantize() {
        let mut checker = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let c = if (x + y) % 2 == 0 { Rgba::new(0, 255, 0, 255) } else { Rgba::new(0, 0, 255, 255) };
                checker.set_color32(x, y, c);
            }
        }
        let mut source = Bitmap::new(2, 2, PixelFormat::Rgba32).unwrap();
        source.clear(Rgba::new(255, 0, 0, 128));
        let quantizer = PopularityQuantizer::new(2);
        let collaborators = Collaborators {
            quantizer: Some(&quantizer),
            ditherer: None,
        };
        let to = checker.bounds();

        let mut actual = checker.clone();
        draw_resized(&Context::new(), collaborators, Source::from(&source), &mut actual, source.bounds(), to, ScalingMode::Bilinear, true)
            .unwrap();

        let mut blended = checker.clone();
        draw(Source::from(&source), &mut blended, source.bounds(), to, ScalingMode::Bilinear);
        let mut expected = checker;
        copy(&Context::new(), collaborators, Source::from(&blended), &mut expected, blended.bounds(), Point::ORIGIN, false)
            .unwrap();

        assert_eq!(pixels(&actual), pixels(&expected));
        // both blended backdrops survive as palette entries
        assert_ne!(actual.get_color32(0, 0), actual.get_color32(1, 0));
        assert_eq!(actual.get_color32(0, 0).r, actual.get_color32(1, 0).r);
    }

    #[test]
    fn content_dependent_resize_skips_letterbox() {
        let mut source = Bitmap::new(4, 2, PixelFormat::Rgb24).unwrap();
        source.clear(Rgba::new(250, 10, 10, 255));
        let quantizer = PopularityQuantizer::new(4);
        let collaborators = Collaborators {
            quantizer: Some(&quantizer),
            ditherer: None,
        };
        let result = resize(&Context::new(), collaborators, &source, Size::new(8, 8), ScalingMode::Bilinear, true).unwrap();
        let colors: Vec<Color32> = pixels(&result);
        let opaque = colors.iter().filter(|c| c.a == 255).count();
        assert_eq!(opaque, 8 * 4);
        assert!(colors.iter().filter(|c| c.a == 255).all(|c| c.r >= 240));
        assert!(colors.iter().filter(|c| c.a != 255).all(|c| *c == Rgba::new(0, 0, 0, 0)));
    }

    #[test]
    fn canceled_resize_fails_internally() {
        let source = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        let stop = StopAfter::new(1);
        let ctx = Context::new().with_stop(&stop);
        assert_eq!(
            resize(&ctx, Collaborators::default(), &source, Size::new(8, 8), ScalingMode::Bilinear, false).err(),
            Some(TransformError::Canceled)
        );
    }
}
