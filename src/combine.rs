//! Pixel-wise combination of two sources into a target.

use alloc::vec::Vec;

use log::debug;

use crate::aliasing::{GuardedPair, Temporary, guard_combine};
use crate::bitmap::{BitmapData, BitmapDataMut, ClippedBitmap, Source};
use crate::buffer::Bitmap;
use crate::color::StraightColor;
use crate::context::{Context, Stage};
use crate::copy::{Collaborators, Pipeline, Rows};
use crate::error::TransformError;
use crate::rect::{CombineArea, Point, reconcile_combine};

/// Combine `area` of `first` and `second` through `f` into `target`.
///
/// `f` receives same-position pixels of both sources in representation
/// `C` and returns the pixel to store.
pub(crate) fn combine<C: StraightColor>(
    ctx: &Context<'_>,
    collaborators: Collaborators<'_>,
    first: Source<'_>,
    second: Source<'_>,
    target: &mut dyn BitmapDataMut,
    area: CombineArea,
    f: impl Fn(C, C) -> C,
) -> Result<(), TransformError> {
    let first_size = first.view(&*target).size();
    let second_size = second.view(&*target).size();
    let region = reconcile_combine(first_size, second_size, target.size(), area);
    if region.is_empty() {
        debug!("nothing left to combine after clipping");
        return Ok(());
    }
    let mut slot = None;
    let pair = guard_combine(ctx, first, second, &*target, region, &mut slot)?;
    let plan = collaborators.plan(&*target);
    let location = region.target.location();

    if plan.is_direct() {
        return combine_rows(ctx, &pair, target, location, &f, &mut Pipeline::Direct);
    }

    if plan.reads_content() {
        debug!("content-dependent collaborators, combining into an intermediate");
        let format = target.pixel_format().intermediate();
        let mut temp = Temporary::new(
            Bitmap::compatible(&*target, region.size(), format)?,
            location,
        );
        let resolved = GuardedPair {
            first: Source::Other(pair.first.view(&*target)),
            second: Source::Other(pair.second.view(&*target)),
            ..pair
        };
        combine_rows(ctx, &resolved, temp.bitmap_mut(), Point::ORIGIN, &f, &mut Pipeline::Direct)?;
        return Rows::new(Stage::Copy, Source::Other(&*temp), temp.bounds(), location)
            .run_planned(ctx, &plan, target);
    }

    let quantizing;
    let mut dithering;
    {
        let init = ClippedBitmap::new(pair.first.view(&*target), pair.first_rect);
        quantizing = plan.start_quantizer(ctx, &init)?;
        dithering = plan.start_ditherer(ctx, &init, quantizing.as_deref())?;
    }
    let mut pipeline = Pipeline::new(quantizing.as_deref(), &mut dithering);
    combine_rows(ctx, &pair, target, location, &f, &mut pipeline)
}

fn combine_rows<C: StraightColor>(
    ctx: &Context<'_>,
    pair: &GuardedPair<'_>,
    target: &mut dyn BitmapDataMut,
    location: Point,
    f: &impl Fn(C, C) -> C,
    pipeline: &mut Pipeline<'_>,
) -> Result<(), TransformError> {
    let width = pair.first_rect.width as u32;
    let height = pair.first_rect.height as u32;
    let (ax, ay) = (pair.first_rect.x as u32, pair.first_rect.y as u32);
    let (bx, by) = (pair.second_rect.x as u32, pair.second_rect.y as u32);
    let (tx, ty) = (location.x as u32, location.y as u32);
    let direct = matches!(pipeline, Pipeline::Direct);
    ctx.new_phase(Stage::Combine, height as usize);
    let mut row: Vec<C> = Vec::with_capacity(width as usize);
    for y in 0..height {
        ctx.check()?;
        row.clear();
        let first = pair.first.view(&*target);
        let second = pair.second.view(&*target);
        row.extend((0..width).map(|x| f(C::read(first, ax + x, ay + y), C::read(second, bx + x, by + y))));
        for (x, &color) in (0u32..).zip(row.iter()) {
            if direct {
                C::write(&mut *target, tx + x, ty + y, color);
            } else {
                let c = pipeline.map(color.to_color32(), x, y);
                target.set_color32(tx + x, ty + y, c);
            }
        }
        ctx.increment();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color32, Color64};
    use crate::copy::tests::{pixels, random_bitmap};
    use crate::copy::{clone_region, copy};
    use crate::ditherers::ErrorDiffusionDitherer;
    use crate::format::PixelFormat;
    use crate::rect::{Rect, Size};
    use crate::sampler::tests::XorShift;
    use rgb::Rgba;

    fn average(a: Color32, b: Color32) -> Color32 {
        let mid = |x: u8, y: u8| ((x as u16 + y as u16) / 2) as u8;
        Rgba::new(mid(a.r, b.r), mid(a.g, b.g), mid(a.b, b.b), mid(a.a, b.a))
    }

    fn run<C: StraightColor>(
        collaborators: Collaborators<'_>,
        first: Source<'_>,
        second: Source<'_>,
        target: &mut dyn BitmapDataMut,
        area: CombineArea,
        f: impl Fn(C, C) -> C,
    ) {
        combine(&Context::new(), collaborators, first, second, target, area, f).unwrap();
    }

    #[test]
    fn combines_same_positions() {
        let mut a = Bitmap::new(3, 3, PixelFormat::Rgba32).unwrap();
        let mut b = Bitmap::new(5, 5, PixelFormat::Rgba32).unwrap();
        a.clear(Rgba::new(200, 0, 100, 255));
        b.clear(Rgba::new(0, 100, 100, 255));
        let mut target = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        let area = CombineArea::new(Rect::new(0, 0, 3, 3), Point::new(2, 2), Point::new(1, 1));
        run(Collaborators::default(), Source::from(&a), Source::from(&b), &mut target, area, average);
        assert_eq!(target.get_color32(1, 1), Rgba::new(100, 50, 100, 255));
        assert_eq!(target.get_color32(3, 3), Rgba::new(100, 50, 100, 255));
        assert_eq!(target.get_color32(0, 0), Rgba::new(0, 0, 0, 0));
    }

    #[test]
    fn clips_all_three_to_one_size() {
        let a = Bitmap::new(10, 10, PixelFormat::Rgba64).unwrap();
        let b = Bitmap::new(3, 8, PixelFormat::Rgba64).unwrap();
        let mut target = Bitmap::new(6, 6, PixelFormat::Rgba64).unwrap();
        let calls = core::cell::Cell::new(0usize);
        let area = CombineArea::new(Rect::new(0, 0, 10, 10), Point::ORIGIN, Point::new(1, 0));
        run(Collaborators::default(), Source::from(&a), Source::from(&b), &mut target, area, |x: Color64, _| {
            calls.set(calls.get() + 1);
            x
        });
        // width limited by the second source, height by the target
        assert_eq!(calls.get(), 3 * 6);
    }

    #[test]
    fn aliased_sources_match_combining_snapshots() {
        let mut rng = XorShift(0x5eed);
        for _ in 0..30 {
            let original = random_bitmap(&mut rng, 12, 12, PixelFormat::Rgba32);
            let mut pick = || Point::new(rng.below(6) as i32, rng.below(6) as i32);
            let first_rect = Rect::at(pick(), Size::new(6, 6));
            let area = CombineArea::new(first_rect, pick(), pick());
            let snapshot = original.clone();

            let mut both = original.clone();
            run(Collaborators::default(), Source::Target, Source::Target, &mut both, area, average);
            let mut expected = original.clone();
            run(Collaborators::default(), Source::from(&snapshot), Source::from(&snapshot), &mut expected, area, average);
            assert_eq!(pixels(&both), pixels(&expected), "{area:?}");

            let mut second_only = original.clone();
            run(Collaborators::default(), Source::from(&snapshot), Source::Target, &mut second_only, area, average);
            assert_eq!(pixels(&second_only), pixels(&expected), "{area:?}");
        }
    }

    #[test]
    fn content_dependent_ditherer_sees_combined_result() {
        let mut rng = XorShift(11);
        let a = random_bitmap(&mut rng, 8, 8, PixelFormat::Rgb24);
        let b = random_bitmap(&mut rng, 8, 8, PixelFormat::Rgb24);
        let ditherer = ErrorDiffusionDitherer::floyd_steinberg();
        let collaborators = Collaborators {
            quantizer: None,
            ditherer: Some(&ditherer),
        };
        let area = CombineArea::full(Size::new(8, 8));

        let mut actual = Bitmap::new(8, 8, PixelFormat::Indexed1).unwrap();
        run(collaborators, Source::from(&a), Source::from(&b), &mut actual, area, average);

        let mut combined = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        run(Collaborators::default(), Source::from(&a), Source::from(&b), &mut combined, area, average);
        let mut expected = Bitmap::new(8, 8, PixelFormat::Indexed1).unwrap();
        copy(&Context::new(), collaborators, Source::from(&combined), &mut expected, combined.bounds(), Point::ORIGIN, false).unwrap();

        assert_eq!(pixels(&actual), pixels(&expected));
        let clone = clone_region(&Context::new(), collaborators, &combined, combined.bounds(), Some(PixelFormat::Indexed1)).unwrap();
        assert_eq!(pixels(&clone), pixels(&expected));
    }
}
