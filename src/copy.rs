//! Row pipelines shared by every operation that writes pixels.
//!
//! A [`Plan`] resolves which collaborators an operation actually uses; the
//! sessions it starts are wrapped in a [`Pipeline`] that maps each pixel on
//! its way to the target. [`Rows`] drives the row loop: one source row is
//! decoded into a buffer before any pixel of the matching target row is
//! written, and the stop token is polled before every row.

use alloc::boxed::Box;
use alloc::vec::Vec;

use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;
use log::debug;

use crate::aliasing::{Temporary, guard};
use crate::bitmap::{BitmapData, BitmapDataMut, ClippedBitmap, Source};
use crate::buffer::Bitmap;
use crate::color::{
    Color32, ColorRepr, Representation, StraightColor, blend_color32, with_representation,
    with_straight,
};
use crate::context::{Context, Stage};
use crate::error::TransformError;
use crate::format::PixelFormat;
use crate::quantizers::PredefinedColorsQuantizer;
use crate::rect::{Point, Rect, Size, reconcile};
use crate::session::{
    Ditherer, DitheringSession, Quantizer, QuantizingSession, start_dithering, start_quantizing,
};

/// Quantizer and ditherer requested for an operation.
#[derive(Clone, Copy, Default)]
pub(crate) struct Collaborators<'c> {
    pub quantizer: Option<&'c dyn Quantizer>,
    pub ditherer: Option<&'c dyn Ditherer>,
}

impl<'c> Collaborators<'c> {
    /// Resolve against the bitmap that will receive the pixels.
    ///
    /// A ditherer without a quantizer gets one that maps to the colors the
    /// target can store, unless the target's format cannot be dithered, in
    /// which case the ditherer is ignored.
    pub(crate) fn plan(self, target: &dyn BitmapData) -> Plan<'c> {
        let format = target.pixel_format();
        let (ditherer, implicit) = match (self.quantizer, self.ditherer) {
            (None, Some(_)) if !format.can_be_dithered() => {
                debug!("{format:?} cannot be dithered, ignoring ditherer");
                (None, None)
            }
            (None, Some(d)) => {
                debug!("dithering without quantizer, using the colors of {format:?}");
                (Some(d), Some(PredefinedColorsQuantizer::for_bitmap(target)))
            }
            (_, d) => (d, None),
        };
        Plan {
            quantizer: self.quantizer,
            ditherer,
            implicit,
        }
    }
}

/// Collaborators resolved for one target.
pub(crate) struct Plan<'c> {
    quantizer: Option<&'c dyn Quantizer>,
    ditherer: Option<&'c dyn Ditherer>,
    implicit: Option<PredefinedColorsQuantizer>,
}

impl Plan<'_> {
    fn quantizer(&self) -> Option<&dyn Quantizer> {
        match (self.quantizer, &self.implicit) {
            (Some(q), _) => Some(q),
            (None, Some(q)) => Some(q as &dyn Quantizer),
            (None, None) => None,
        }
    }

    /// Whether pixels pass through unchanged.
    pub(crate) fn is_direct(&self) -> bool {
        self.quantizer().is_none()
    }

    /// Whether a collaborator has to see the rendered pixels before it can
    /// be initialized.
    pub(crate) fn reads_content(&self) -> bool {
        self.quantizer().is_some_and(|q| q.initialize_reads_content())
            || self.ditherer.is_some_and(|d| d.initialize_reads_content())
    }

    pub(crate) fn start_quantizer(
        &self,
        ctx: &Context<'_>,
        init: &dyn BitmapData,
    ) -> Result<Option<Box<dyn QuantizingSession + '_>>, TransformError> {
        self.quantizer()
            .map(|q| start_quantizing(ctx, q, init))
            .transpose()
    }

    pub(crate) fn start_ditherer<'s>(
        &'s self,
        ctx: &Context<'_>,
        init: &dyn BitmapData,
        quantizing: Option<&'s dyn QuantizingSession>,
    ) -> Result<Option<Box<dyn DitheringSession + 's>>, TransformError> {
        match (self.ditherer, quantizing) {
            (Some(d), Some(q)) => start_dithering(ctx, d, init, q).map(Some),
            _ => Ok(None),
        }
    }
}

/// How pixels are mapped on their way to the target.
pub(crate) enum Pipeline<'p> {
    /// Unchanged.
    Direct,
    /// Through a quantizing session.
    Quantized(&'p dyn QuantizingSession),
    /// Through a dithering session, which quantizes as well.
    QuantizedDithered(&'p dyn QuantizingSession, &'p mut dyn DitheringSession),
}

impl<'p> Pipeline<'p> {
    pub(crate) fn new<'s: 'p>(
        quantizing: Option<&'p (dyn QuantizingSession + 's)>,
        dithering: &'p mut Option<Box<dyn DitheringSession + 's>>,
    ) -> Self {
        match (quantizing, dithering.as_deref_mut()) {
            (None, _) => Self::Direct,
            (Some(q), None) => Self::Quantized(q),
            (Some(q), Some(d)) => Self::QuantizedDithered(q, d),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Quantized(_) => "quantized",
            Self::QuantizedDithered(..) => "dithered",
        }
    }

    #[inline]
    pub(crate) fn map(&mut self, color: Color32, x: u32, y: u32) -> Color32 {
        match self {
            Self::Direct => color,
            Self::Quantized(q) => q.quantize(color),
            Self::QuantizedDithered(_, d) => d.dither(color, x, y),
        }
    }
}

/// Produces the pixel rows of one pass from its source.
pub(crate) trait RowReader {
    /// Region of the source the pass reads.
    fn source_rect(&self) -> Rect;

    /// Width and height of the produced region.
    fn extent(&self) -> Size;

    /// Append row `y` of the produced region to `row`.
    fn read_row<C: ColorRepr>(&self, source: &dyn BitmapData, y: u32, row: &mut Vec<C>);
}

impl RowReader for Rect {
    fn source_rect(&self) -> Rect {
        *self
    }

    fn extent(&self) -> Size {
        Rect::size(*self)
    }

    fn read_row<C: ColorRepr>(&self, source: &dyn BitmapData, y: u32, row: &mut Vec<C>) {
        let (x0, y0) = (self.x as u32, self.y as u32 + y);
        row.extend((0..self.width as u32).map(|x| C::read(source, x0 + x, y0)));
    }
}

/// One pass from a source onto a rectangle of a target.
pub(crate) struct Rows<'a, R = Rect> {
    pub stage: Stage,
    pub source: Source<'a>,
    pub region: R,
    /// Top-left corner of the written region in the target.
    pub target: Point,
    /// Alpha-blend over the existing target pixels instead of overwriting.
    pub blend: bool,
    /// Leave the target untouched where the source is fully transparent.
    pub skip_transparent: bool,
    /// Per-pixel write mask over the region, row-major.
    pub mask: Option<&'a BitSlice>,
}

impl<'a, R: RowReader> Rows<'a, R> {
    /// A plain overwrite of `region` at `target`.
    pub(crate) fn new(stage: Stage, source: Source<'a>, region: R, target: Point) -> Self {
        Self {
            stage,
            source,
            region,
            target,
            blend: false,
            skip_transparent: false,
            mask: None,
        }
    }

    /// Initialize the planned sessions against the source region, then run.
    pub(crate) fn run_planned(
        &self,
        ctx: &Context<'_>,
        plan: &Plan<'_>,
        target: &mut dyn BitmapDataMut,
    ) -> Result<(), TransformError> {
        let quantizing;
        let mut dithering;
        {
            let init = ClippedBitmap::new(self.source.view(&*target), self.region.source_rect());
            quantizing = plan.start_quantizer(ctx, &init)?;
            dithering = plan.start_ditherer(ctx, &init, quantizing.as_deref())?;
        }
        let mut pipeline = Pipeline::new(quantizing.as_deref(), &mut dithering);
        self.run(ctx, target, &mut pipeline, None)
    }

    /// Process every row. Pixels actually written are recorded in `touched`.
    pub(crate) fn run(
        &self,
        ctx: &Context<'_>,
        target: &mut dyn BitmapDataMut,
        pipeline: &mut Pipeline<'_>,
        mut touched: Option<&mut BitSlice>,
    ) -> Result<(), TransformError> {
        debug!(
            "{:?}: {} pipeline, {:?} -> {:?}, blend {}",
            self.stage,
            pipeline.name(),
            self.region.source_rect(),
            self.target,
            self.blend
        );
        ctx.new_phase(self.stage, self.region.extent().height as usize);
        let source_format = self.source.view(&*target).pixel_format();
        let target_format = target.pixel_format();
        let space = target.resolved_working_space();
        match pipeline {
            Pipeline::Direct if self.blend => {
                with_straight!(Representation::for_blend(source_format, target_format, space), C => {
                    self.drive::<C>(ctx, target, &mut touched, blend_pixel::<C>)
                })
            }
            Pipeline::Direct => {
                with_representation!(Representation::for_transfer(source_format, target_format), C => {
                    self.drive::<C>(ctx, target, &mut touched, |t, _, _, x, y, c| C::write(t, x, y, c))
                })
            }
            mapped => {
                let blend = self.blend;
                self.drive::<Color32>(ctx, target, &mut touched, |t, rx, ry, x, y, c| {
                    let c = if blend {
                        blend_color32(c, t.get_color32(x, y), space)
                    } else {
                        c
                    };
                    t.set_color32(x, y, mapped.map(c, rx, ry));
                })
            }
        }
    }

    fn drive<C: ColorRepr>(
        &self,
        ctx: &Context<'_>,
        target: &mut dyn BitmapDataMut,
        touched: &mut Option<&mut BitSlice>,
        mut write: impl FnMut(&mut dyn BitmapDataMut, u32, u32, u32, u32, C),
    ) -> Result<(), TransformError> {
        let Size { width, height } = self.region.extent();
        let (tx, ty) = (self.target.x as u32, self.target.y as u32);
        let mut row: Vec<C> = Vec::with_capacity(width as usize);
        for ry in 0..height {
            ctx.check()?;
            row.clear();
            self.region.read_row(self.source.view(&*target), ry, &mut row);
            for (rx, &color) in (0u32..).zip(row.iter()) {
                let index = (ry * width + rx) as usize;
                if self.mask.is_some_and(|m| !m[index]) || (self.skip_transparent && color.is_transparent()) {
                    continue;
                }
                write(&mut *target, rx, ry, tx + rx, ty + ry, color);
                if let Some(t) = touched.as_deref_mut() {
                    t.set(index, true);
                }
            }
            ctx.increment();
        }
        Ok(())
    }
}

fn blend_pixel<C: StraightColor>(target: &mut dyn BitmapDataMut, _: u32, _: u32, x: u32, y: u32, color: C) {
    let back = C::read(&*target, x, y);
    C::write(target, x, y, color.blend_over(back));
}

/// Copy (`blend == false`) or draw `source_rect` of `source` onto `target`
/// at `location`.
pub(crate) fn copy(
    ctx: &Context<'_>,
    collaborators: Collaborators<'_>,
    source: Source<'_>,
    target: &mut dyn BitmapDataMut,
    source_rect: Rect,
    location: Point,
    blend: bool,
) -> Result<(), TransformError> {
    let source_size = source.view(&*target).size();
    let region = reconcile(source_size, source_rect, target.size(), location);
    if region.is_empty() {
        debug!("nothing left of {source_rect:?} after clipping");
        return Ok(());
    }
    let plan = collaborators.plan(&*target);
    let transforms = blend || !plan.is_direct();
    let mut slot = None;
    let Some((source, source_rect)) = guard(
        ctx,
        source,
        &*target,
        region.source,
        region.target,
        transforms,
        false,
        &mut slot,
    )?
    else {
        return Ok(());
    };
    if blend && plan.reads_content() {
        return draw_two_phase(ctx, &plan, source, source_rect, target, region.target);
    }
    let stage = if blend { Stage::Draw } else { Stage::Copy };
    Rows {
        blend,
        ..Rows::new(stage, source, source_rect, region.target.location())
    }
    .run_planned(ctx, &plan, target)
}

/// Blend into a full-precision copy of the target region first, then
/// quantize only the pixels the source touched back into the target.
fn draw_two_phase(
    ctx: &Context<'_>,
    plan: &Plan<'_>,
    source: Source<'_>,
    source_rect: Rect,
    target: &mut dyn BitmapDataMut,
    target_rect: Rect,
) -> Result<(), TransformError> {
    debug!("content-dependent collaborators, drawing through an intermediate");
    let format = target.pixel_format().intermediate();
    let mut temp = Temporary::capture_as(ctx, &*target, target_rect, format)?;
    let mut touched: BitVec = BitVec::repeat(false, target_rect.size().pixel_count());
    let view = source.view(&*target);
    Rows {
        blend: true,
        skip_transparent: true,
        ..Rows::new(Stage::Draw, Source::Other(view), source_rect, Point::ORIGIN)
    }
    .run(ctx, temp.bitmap_mut(), &mut Pipeline::Direct, Some(touched.as_mut_bitslice()))?;
    Rows {
        mask: Some(touched.as_bitslice()),
        ..Rows::new(Stage::Copy, Source::Other(&*temp), temp.bounds(), target_rect.location())
    }
    .run_planned(ctx, plan, target)
}

/// Copy `rect` of `source` into a new bitmap.
///
/// Indexed results take their palette from the quantizing session when it
/// has one, otherwise from the source when it fits.
pub(crate) fn clone_region(
    ctx: &Context<'_>,
    collaborators: Collaborators<'_>,
    source: &dyn BitmapData,
    rect: Rect,
    format: Option<PixelFormat>,
) -> Result<Bitmap, TransformError> {
    let rect = rect.intersect(source.bounds());
    if rect.is_empty() {
        return Err(TransformError::EmptyRegion);
    }
    let format = format.unwrap_or(source.pixel_format());
    let mut result = Bitmap::compatible(source, rect.size(), format)?;
    if format.is_indexed()
        && format != source.pixel_format()
        && let Some(palette) = source.palette()
        && palette.check_capacity(format).is_ok()
    {
        result = result.with_palette(palette.clone())?;
    }

    let plan = collaborators.plan(&result);
    let init = ClippedBitmap::new(source, rect);
    let quantizing = plan.start_quantizer(ctx, &init)?;
    if format.is_indexed()
        && let Some(palette) = quantizing.as_deref().and_then(|q| q.palette())
        && palette.check_capacity(format).is_ok()
    {
        debug!("clone adopts the quantizer's {} entry palette", palette.len());
        result = result.with_palette(palette.clone())?;
    }
    let mut dithering = plan.start_ditherer(ctx, &init, quantizing.as_deref())?;
    let mut pipeline = Pipeline::new(quantizing.as_deref(), &mut dithering);
    Rows::new(Stage::Clone, Source::Other(source), rect, Point::ORIGIN).run(
        ctx,
        &mut result,
        &mut pipeline,
        None,
    )?;
    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::context::tests::{Recorder, StopAfter};
    use crate::ditherers::{BayerMatrix, OrderedDitherer};
    use crate::quantizers::PopularityQuantizer;
    use crate::sampler::tests::XorShift;
    use core::cell::Cell;
    use rgb::Rgba;

    pub(crate) fn random_bitmap(rng: &mut XorShift, width: u32, height: u32, format: PixelFormat) -> Bitmap {
        let mut b = Bitmap::new(width, height, format).unwrap();
        for y in 0..height {
            for x in 0..width {
                b.set_color32(x, y, Rgba::new(rng.byte(), rng.byte(), rng.byte(), rng.byte()));
            }
        }
        b
    }

    pub(crate) fn pixels(b: &dyn BitmapData) -> Vec<Color32> {
        let mut out = Vec::new();
        for y in 0..b.height() {
            for x in 0..b.width() {
                out.push(b.get_color32(x, y));
            }
        }
        out
    }

    /// Counts writes to the wrapped bitmap.
    pub(crate) struct Counting {
        pub inner: Bitmap,
        pub writes: Cell<usize>,
    }

    impl BitmapData for Counting {
        fn width(&self) -> u32 {
            self.inner.width()
        }
        fn height(&self) -> u32 {
            self.inner.height()
        }
        fn pixel_format(&self) -> PixelFormat {
            self.inner.pixel_format()
        }
        fn get_color32(&self, x: u32, y: u32) -> Color32 {
            self.inner.get_color32(x, y)
        }
    }

    impl BitmapDataMut for Counting {
        fn set_color32(&mut self, x: u32, y: u32, color: Color32) {
            self.writes.set(self.writes.get() + 1);
            self.inner.set_color32(x, y, color);
        }
    }

    fn run_copy(
        collaborators: Collaborators<'_>,
        source: Source<'_>,
        target: &mut dyn BitmapDataMut,
        source_rect: Rect,
        location: Point,
        blend: bool,
    ) {
        copy(&Context::new(), collaborators, source, target, source_rect, location, blend).unwrap();
    }

    #[test]
    fn copy_reproduces_source_pixels() {
        let mut rng = XorShift(7);
        for format in [PixelFormat::Rgba32, PixelFormat::Rgba64, PixelFormat::RgbaF32, PixelFormat::Rgb565] {
            let source = random_bitmap(&mut rng, 6, 5, format);
            let mut target = Bitmap::new(10, 10, format).unwrap();
            run_copy(Collaborators::default(), Source::from(&source), &mut target, source.bounds(), Point::new(3, 4), false);
            for y in 0..5 {
                for x in 0..6 {
                    assert_eq!(target.get_color64(x + 3, y + 4), source.get_color64(x, y), "{format:?}");
                }
            }
            assert_eq!(target.get_color32(2, 4), Rgba::new(0, 0, 0, if format.has_alpha() { 0 } else { 255 }));
        }
    }

    #[test]
    fn copy_clips_to_both_bitmaps() {
        let mut source = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        source.clear(Rgba::new(1, 2, 3, 255));
        let mut target = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        run_copy(Collaborators::default(), Source::from(&source), &mut target, Rect::new(-1, 0, 4, 4), Point::new(2, 2), false);
        // requested column -1 falls off the source, columns past 3 off the target
        let written = pixels(&target).iter().filter(|c| c.a == 255).count();
        assert_eq!(written, 2);
        assert_eq!(target.get_color32(3, 2), Rgba::new(1, 2, 3, 255));
        assert_eq!(target.get_color32(3, 3), Rgba::new(1, 2, 3, 255));
    }

    #[test]
    fn same_region_copy_writes_nothing() {
        let mut rng = XorShift(3);
        let mut target = Counting {
            inner: random_bitmap(&mut rng, 8, 8, PixelFormat::Rgba32),
            writes: Cell::new(0),
        };
        let rect = Rect::new(1, 2, 5, 4);
        run_copy(Collaborators::default(), Source::Target, &mut target, rect, rect.location(), false);
        assert_eq!(target.writes.get(), 0);

        let quantizer = PredefinedColorsQuantizer::rgb565(Rgba::new(0, 0, 0, 255));
        let with_quantizer = Collaborators {
            quantizer: Some(&quantizer),
            ditherer: None,
        };
        run_copy(with_quantizer, Source::Target, &mut target, rect, rect.location(), false);
        assert_eq!(target.writes.get(), 20);
    }

    #[test]
    fn overlapping_copies_match_copies_from_a_clone() {
        let mut rng = XorShift(0xdead_beef);
        for _ in 0..40 {
            let original = random_bitmap(&mut rng, 16, 16, PixelFormat::Rgba32);
            let rect = Rect::new(rng.below(8) as i32, rng.below(8) as i32, 8, 8);
            let location = Point::new(rect.x + rng.below(7) as i32 - 3, rect.y + rng.below(7) as i32 - 3);

            let mut aliased = original.clone();
            run_copy(Collaborators::default(), Source::Target, &mut aliased, rect, location, false);

            let snapshot = original.clone();
            let mut expected = original;
            run_copy(Collaborators::default(), Source::from(&snapshot), &mut expected, rect, location, false);

            assert_eq!(pixels(&aliased), pixels(&expected), "{rect:?} -> {location:?}");
        }
    }

    #[test]
    fn draw_blends_and_keeps_transparent_source_pixels_out() {
        let mut source = Bitmap::new(2, 1, PixelFormat::Rgba32).unwrap();
        source.set_color32(0, 0, Rgba::new(255, 255, 255, 128));
        let mut target = Bitmap::new(2, 1, PixelFormat::Rgb24).unwrap();
        target.clear(Rgba::new(0, 0, 200, 255));
        run_copy(Collaborators::default(), Source::from(&source), &mut target, source.bounds(), Point::ORIGIN, true);
        let blended = target.get_color32(0, 0);
        assert!((127..=129).contains(&blended.r), "{blended:?}");
        assert_eq!(target.get_color32(1, 0), Rgba::new(0, 0, 200, 255));
    }

    #[test]
    fn ditherer_alone_uses_target_colors() {
        let mut source = Bitmap::new(8, 8, PixelFormat::Rgb24).unwrap();
        source.clear(Rgba::new(128, 128, 128, 255));
        let ditherer = OrderedDitherer::new(BayerMatrix::Bayer4);
        let collaborators = Collaborators {
            quantizer: None,
            ditherer: Some(&ditherer),
        };

        let mut indexed = Bitmap::new(8, 8, PixelFormat::Indexed1).unwrap();
        run_copy(collaborators, Source::from(&source), &mut indexed, source.bounds(), Point::ORIGIN, false);
        let white = pixels(&indexed).iter().filter(|c| c.r == 255).count();
        assert_eq!(white, 32);

        // not ditherable: the ditherer is ignored
        let mut truecolor = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        run_copy(collaborators, Source::from(&source), &mut truecolor, source.bounds(), Point::ORIGIN, false);
        assert_eq!(pixels(&truecolor), pixels(&source));
    }

    #[test]
    fn two_phase_draw_equals_blend_then_quantize() {
        let mut rng = XorShift(99);
        let backdrop = random_bitmap(&mut rng, 8, 8, PixelFormat::Rgb24);
        let mut source = Bitmap::new(6, 6, PixelFormat::Rgba32).unwrap();
        for y in 0..6 {
            for x in 0..6 {
                let a = [64, 128, 255][rng.below(3) as usize];
                source.set_color32(x, y, Rgba::new(rng.byte(), rng.byte(), rng.byte(), a));
            }
        }
        let quantizer = PopularityQuantizer::new(6);
        let collaborators = Collaborators {
            quantizer: Some(&quantizer),
            ditherer: None,
        };
        let location = Point::new(1, 2);

        let mut actual = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        run_copy(Collaborators::default(), Source::from(&backdrop), &mut actual, backdrop.bounds(), Point::ORIGIN, false);
        let mut expected = actual.clone();
        run_copy(collaborators, Source::from(&source), &mut actual, source.bounds(), location, true);

        let region = Rect::at(location, source.size());
        let mut blended = clone_region(&Context::new(), Collaborators::default(), &expected, region, None).unwrap();
        run_copy(Collaborators::default(), Source::from(&source), &mut blended, source.bounds(), Point::ORIGIN, true);
        run_copy(collaborators, Source::from(&blended), &mut expected, blended.bounds(), location, false);

        assert_eq!(pixels(&actual), pixels(&expected));
    }

    #[test]
    fn two_phase_draw_leaves_untouched_pixels_alone() {
        let mut source = Bitmap::new(4, 1, PixelFormat::Rgba32).unwrap();
        source.set_color32(1, 0, Rgba::new(255, 0, 0, 255));
        let mut target = Bitmap::new(4, 1, PixelFormat::Rgba32).unwrap();
        target.clear(Rgba::new(10, 200, 30, 255));
        let quantizer = PopularityQuantizer::new(2);
        let collaborators = Collaborators {
            quantizer: Some(&quantizer),
            ditherer: None,
        };
        run_copy(collaborators, Source::from(&source), &mut target, source.bounds(), Point::ORIGIN, true);
        assert_eq!(target.get_color32(0, 0), Rgba::new(10, 200, 30, 255));
        assert_eq!(target.get_color32(1, 0), Rgba::new(255, 0, 0, 255));
    }

    #[test]
    fn clone_adopts_quantizer_palette() {
        let mut source = Bitmap::new(3, 1, PixelFormat::Rgba32).unwrap();
        source.set_color32(0, 0, Rgba::new(255, 0, 0, 255));
        source.set_color32(1, 0, Rgba::new(0, 255, 0, 255));
        source.set_color32(2, 0, Rgba::new(0, 0, 255, 255));
        let quantizer = PopularityQuantizer::new(16);
        let collaborators = Collaborators {
            quantizer: Some(&quantizer),
            ditherer: None,
        };
        let clone = clone_region(&Context::new(), collaborators, &source, source.bounds(), Some(PixelFormat::Indexed4)).unwrap();
        assert_eq!(clone.palette().map(|p| p.len()), Some(3));
        assert_eq!(pixels(&clone), pixels(&source));
    }

    #[test]
    fn clone_reports_progress_and_empty_regions() {
        let source = Bitmap::new(3, 2, PixelFormat::Gray8).unwrap();
        let recorder = Recorder::default();
        let ctx = Context::new().with_progress(&recorder);
        let clone = clone_region(&ctx, Collaborators::default(), &source, Rect::new(1, 0, 5, 5), None).unwrap();
        assert_eq!(clone.size(), crate::rect::Size::new(2, 2));
        assert_eq!(recorder.0.borrow().as_slice(), &[(Stage::Clone, 0)]);
        assert_eq!(
            clone_region(&ctx, Collaborators::default(), &source, Rect::new(9, 9, 1, 1), None).err(),
            Some(TransformError::EmptyRegion)
        );
    }

    #[test]
    fn canceled_copy_stops_between_rows() {
        let source = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        let mut target = Counting {
            inner: Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap(),
            writes: Cell::new(0),
        };
        let stop = StopAfter::new(2);
        let ctx = Context::new().with_stop(&stop);
        let result = copy(&ctx, Collaborators::default(), Source::from(&source), &mut target, source.bounds(), Point::ORIGIN, false);
        assert_eq!(result, Err(TransformError::Canceled));
        assert_eq!(target.writes.get(), 8);
    }
}
