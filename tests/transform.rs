use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use zenblit::{
    Bitmap, BitmapData, BitmapDataMut, Color32, CombineArea, Context, ImgVec, PixelFormat, Point, PopularityQuantizer,
    Progress, Rect, Rgba, ScalingMode, Size, Source, Stage, Stop, StopReason, Transform, TransformError,
};

/// Caller-owned buffer exposing only the required capabilities.
struct Canvas(ImgVec<Color32>);

impl BitmapData for Canvas {
    fn width(&self) -> u32 {
        self.0.width() as u32
    }

    fn height(&self) -> u32 {
        self.0.height() as u32
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Rgba32
    }

    fn get_color32(&self, x: u32, y: u32) -> Color32 {
        self.0[(x as usize, y as usize)]
    }
}

impl BitmapDataMut for Canvas {
    fn set_color32(&mut self, x: u32, y: u32, color: Color32) {
        self.0[(x as usize, y as usize)] = color;
    }
}

fn gradient(width: u32, height: u32) -> Bitmap {
    let mut b = Bitmap::new(width, height, PixelFormat::Rgba32).unwrap();
    for y in 0..height {
        for x in 0..width {
            b.set_color32(x, y, Rgba::new((x * 16) as u8, (y * 16) as u8, 128, 255));
        }
    }
    b
}

fn pixels(b: &dyn BitmapData) -> Vec<Color32> {
    (0..b.height())
        .flat_map(|y| (0..b.width()).map(move |x| (x, y)))
        .map(|(x, y)| b.get_color32(x, y))
        .collect()
}

struct Flag(AtomicBool);

impl Stop for Flag {
    fn check(&self) -> Result<(), StopReason> {
        if self.0.load(Ordering::Relaxed) {
            Err(StopReason::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct Phases(RefCell<Vec<(Stage, usize, usize)>>);

impl Progress for Phases {
    fn new_phase(&self, stage: Stage, maximum: usize) {
        self.0.borrow_mut().push((stage, maximum, 0));
    }

    fn increment(&self) {
        if let Some(last) = self.0.borrow_mut().last_mut() {
            last.2 += 1;
        }
    }
}

#[test]
fn copy_into_caller_buffer() {
    let source = gradient(8, 8);
    let mut canvas = Canvas(ImgVec::new(vec![Rgba::new(0, 0, 0, 0); 16], 4, 4));
    let copied = Transform::new()
        .copy(Source::from(&source), &mut canvas, Rect::new(2, 2, 8, 8), Point::new(-1, 0))
        .unwrap();
    assert!(copied);
    // source column 3 lands in target column 0
    assert_eq!(canvas.get_color32(0, 0), source.get_color32(3, 2));
    assert_eq!(canvas.get_color32(3, 3), source.get_color32(6, 5));
}

#[test]
fn concurrent_copies_from_one_source() {
    let source = gradient(16, 16);
    let results: Vec<Bitmap> = (0..8)
        .into_par_iter()
        .map(|i| {
            let mut target = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
            let origin = Point::new(i, i);
            Transform::new()
                .copy(Source::from(&source), &mut target, Rect::at(origin, Size::new(8, 8)), Point::ORIGIN)
                .unwrap();
            target
        })
        .collect();
    for (i, target) in results.iter().enumerate() {
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(target.get_color32(x, y), source.get_color32(x + i as u32, y + i as u32));
            }
        }
    }
}

#[test]
fn transparent_pixels_are_one_color() {
    let mut b = Bitmap::new(2, 2, PixelFormat::Rgba32).unwrap();
    b.set_color32(0, 0, Rgba::new(255, 0, 0, 0));
    b.set_color32(1, 0, Rgba::new(0, 255, 0, 0));
    b.set_color32(0, 1, Rgba::new(0, 0, 255, 0));
    b.set_color32(1, 1, Rgba::new(9, 9, 9, 0));
    let job = Transform::new();
    assert_eq!(job.colors(&b, 0, false).unwrap().len(), 1);
    assert_eq!(job.color_count(&b).unwrap(), 1);
}

#[test]
fn raised_flag_gives_no_result() {
    let source = gradient(8, 8);
    let flag = Flag(AtomicBool::new(true));
    let job = Transform::new().with_stop(&flag);
    assert_eq!(job.resize(&source, Size::new(4, 4), ScalingMode::Box, false).map(|b| b.is_none()), Ok(true));
    let mut target = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
    assert_eq!(job.draw(Source::from(&source), &mut target, source.bounds(), Point::ORIGIN), Ok(false));
    assert!(pixels(&target).iter().all(|&c| c == Rgba::new(0, 0, 0, 0)));

    let strict = Transform::new().with_context(Context::new().with_stop(&flag).with_cancel_as_error(true));
    assert_eq!(
        strict.copy(Source::from(&source), &mut target, source.bounds(), Point::ORIGIN),
        Err(TransformError::Canceled)
    );
    flag.0.store(false, Ordering::Relaxed);
    assert_eq!(strict.copy(Source::from(&source), &mut target, source.bounds(), Point::ORIGIN), Ok(true));
    assert_eq!(pixels(&target), pixels(&source));
}

#[test]
fn progress_reports_every_row() {
    let source = gradient(6, 5);
    let phases = Phases::default();
    let quantizer = PopularityQuantizer::new(4);
    let job = Transform::new()
        .with_context(Context::new().with_progress(&phases))
        .with_quantizer(&quantizer);
    let clone = job.clone_region(&source, source.bounds(), Some(PixelFormat::Indexed4)).unwrap();
    assert!(clone.is_some());
    let phases = phases.0.into_inner();
    let copy = phases.iter().find(|p| p.0 == Stage::Clone).unwrap();
    assert_eq!((copy.1, copy.2), (5, 5));
    assert!(phases.iter().any(|p| p.0 == Stage::InitializingQuantizer));
}

#[test]
fn self_overlapping_draw_resized() {
    let original = gradient(12, 12);
    let snapshot = original.clone();
    let mut aliased = original.clone();
    let mut expected = original;
    let job = Transform::new();
    let (from, to) = (Rect::new(0, 0, 8, 8), Rect::new(3, 3, 6, 6));
    job.draw_resized(Source::Target, &mut aliased, from, to, ScalingMode::Bilinear).unwrap();
    job.draw_resized(Source::from(&snapshot), &mut expected, from, to, ScalingMode::Bilinear).unwrap();
    assert_eq!(pixels(&aliased), pixels(&expected));
}

#[test]
fn combine_with_target_as_source() {
    let mut target = gradient(4, 4);
    let overlay = {
        let mut b = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        b.clear(Rgba::new(255, 255, 255, 255));
        b
    };
    let before = pixels(&target);
    let invert = |t: Color32, o: Color32| Rgba::new(o.r - t.r, o.g - t.g, o.b - t.b, 255);
    Transform::new()
        .combine(Source::Target, Source::from(&overlay), &mut target, CombineArea::full(Size::new(4, 4)), invert)
        .unwrap();
    for (after, before) in pixels(&target).iter().zip(before) {
        assert_eq!(after.r, 255 - before.r);
        assert_eq!(after.b, 127);
    }
}

#[test]
fn color_count_with_workers() {
    let mut b = Bitmap::new(16, 300, PixelFormat::Rgb24).unwrap();
    for y in 0..300 {
        for x in 0..16 {
            b.set_color32(x, y, Rgba::new((x * 16) as u8, (y % 7) as u8, (y / 50) as u8, 255));
        }
    }
    let phases = Phases::default();
    let job = Transform::new().with_context(Context::new().with_progress(&phases).with_max_degree_of_parallelism(4));
    assert_eq!(job.color_count(&b).unwrap(), 16 * 7 * 6);
    assert_eq!(Transform::new().color_count(&b).unwrap(), 16 * 7 * 6);
    assert_eq!(phases.0.into_inner(), vec![(Stage::GetColors, 300, 300)]);
}
