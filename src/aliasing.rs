//! Source/target aliasing decisions.
//!
//! A [`Source::Target`] reads from the bitmap being written. Before any
//! pixel is written the guard decides whether that is harmless, a no-op,
//! or whether the source region must first be captured into a
//! [`Temporary`] so that no row is read after it was overwritten.

use core::ops::Deref;

use log::{debug, trace};

use crate::bitmap::{BitmapData, BitmapDataMut, Source};
use crate::buffer::Bitmap;
use crate::color::{ColorRepr, Representation, with_representation};
use crate::context::Context;
use crate::error::TransformError;
use crate::format::PixelFormat;
use crate::rect::{CombineRegion, Point, Rect};

/// How an operation's source relates to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Aliasing {
    /// Different bitmaps.
    Distinct,
    /// Same bitmap, non-overlapping regions: read directly.
    SameBufferDisjoint,
    /// Same bitmap and region, values unchanged: skip all work.
    NoOp,
    /// Same bitmap and region with a value-changing transform: each pixel
    /// is read before it is written, so it can run in place.
    InPlace,
    /// Overlapping but unequal regions: capture the source region first.
    MustClone,
}

/// Classify a single-source operation.
///
/// `transforms` is true when pixel values change on the way through
/// (quantizing, dithering, blending). Scaled operations never run in
/// place because a target pixel reads several source pixels.
pub fn classify(same_bitmap: bool, source: Rect, target: Rect, transforms: bool, scaled: bool) -> Aliasing {
    if !same_bitmap {
        return Aliasing::Distinct;
    }
    if !scaled && source == target {
        return if transforms {
            Aliasing::InPlace
        } else {
            Aliasing::NoOp
        };
    }
    if source.intersects_with(target) {
        Aliasing::MustClone
    } else {
        Aliasing::SameBufferDisjoint
    }
}

/// What a combine operation has to capture before writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CombineAliasing {
    /// Both sources can be read directly.
    Direct,
    /// Capture the first source's region.
    CloneFirst,
    /// Capture the second source's region.
    CloneSecond,
    /// Capture the union of both source regions once; both sources read
    /// from the same capture.
    CloneUnion,
}

/// Classify a combine operation. A source needs capturing when it is the
/// target and its region overlaps, but does not equal, the target region.
pub fn classify_combine(first_is_target: bool, second_is_target: bool, region: CombineRegion) -> CombineAliasing {
    let conflicts = |is_target: bool, rect: Rect| {
        is_target && rect != region.target && rect.intersects_with(region.target)
    };
    match (
        conflicts(first_is_target, region.source1),
        conflicts(second_is_target, region.source2),
    ) {
        (false, false) => CombineAliasing::Direct,
        (true, false) => CombineAliasing::CloneFirst,
        (false, true) => CombineAliasing::CloneSecond,
        (true, true) => CombineAliasing::CloneUnion,
    }
}

/// Engine-owned bitmap that lives for one operation.
///
/// Dropped on every exit path, including cancellation and panics.
pub(crate) struct Temporary {
    bitmap: Bitmap,
    origin: Point,
}

impl Temporary {
    /// Wrap a bitmap allocated by the engine.
    pub(crate) fn new(bitmap: Bitmap, origin: Point) -> Self {
        trace!("allocated temporary {bitmap:?}");
        Self { bitmap, origin }
    }

    /// Copy `rect` of `source` into a new bitmap of the same format and
    /// settings, without any loss.
    pub(crate) fn capture(
        ctx: &Context<'_>,
        source: &dyn BitmapData,
        rect: Rect,
    ) -> Result<Self, TransformError> {
        Self::capture_as(ctx, source, rect, source.pixel_format())
    }

    /// Like [`capture`](Self::capture) but stored as `format`.
    pub(crate) fn capture_as(
        ctx: &Context<'_>,
        source: &dyn BitmapData,
        rect: Rect,
        format: PixelFormat,
    ) -> Result<Self, TransformError> {
        let mut bitmap = Bitmap::compatible(source, rect.size(), format)?;
        with_representation!(Representation::for_transfer(source.pixel_format(), format), C => {
            capture_rows::<C>(ctx, source, rect, &mut bitmap)?
        });
        Ok(Self::new(bitmap, rect.location()))
    }

    /// Translate a rectangle of the original bitmap into capture coordinates.
    pub(crate) fn local(&self, rect: Rect) -> Rect {
        rect.offset(-self.origin.x, -self.origin.y)
    }

    pub(crate) fn bitmap_mut(&mut self) -> &mut Bitmap {
        &mut self.bitmap
    }
}

impl Deref for Temporary {
    type Target = Bitmap;

    fn deref(&self) -> &Bitmap {
        &self.bitmap
    }
}

impl Drop for Temporary {
    fn drop(&mut self) {
        trace!("released temporary {:?}", self.bitmap);
    }
}

fn capture_rows<C: ColorRepr>(
    ctx: &Context<'_>,
    source: &dyn BitmapData,
    rect: Rect,
    bitmap: &mut dyn BitmapDataMut,
) -> Result<(), TransformError> {
    let (x0, y0) = (rect.x as u32, rect.y as u32);
    for y in 0..rect.height as u32 {
        ctx.check()?;
        for x in 0..rect.width as u32 {
            C::write(bitmap, x, y, C::read(source, x0 + x, y0 + y));
        }
    }
    Ok(())
}

/// Apply the single-source guard.
///
/// Returns `None` when the operation is a no-op. Otherwise returns the
/// source to read and the region to read from it; a captured region is
/// stored in `slot` and read at its local coordinates.
#[allow(clippy::too_many_arguments)]
pub(crate) fn guard<'a>(
    ctx: &Context<'_>,
    source: Source<'a>,
    target: &dyn BitmapData,
    source_rect: Rect,
    target_rect: Rect,
    transforms: bool,
    scaled: bool,
    slot: &'a mut Option<Temporary>,
) -> Result<Option<(Source<'a>, Rect)>, TransformError> {
    let aliasing = classify(source.is_target(), source_rect, target_rect, transforms, scaled);
    match aliasing {
        Aliasing::NoOp => {
            debug!("source and target regions are identical, nothing to do");
            Ok(None)
        }
        Aliasing::MustClone => {
            debug!("source region {source_rect:?} overlaps target region {target_rect:?}, capturing it");
            let temp: &'a Temporary = slot.insert(Temporary::capture(ctx, target, source_rect)?);
            Ok(Some((Source::Other(&**temp), temp.local(source_rect))))
        }
        Aliasing::Distinct | Aliasing::SameBufferDisjoint | Aliasing::InPlace => Ok(Some((source, source_rect))),
    }
}

/// Sources of a combine operation after the guard ran.
pub(crate) struct GuardedPair<'a> {
    pub first: Source<'a>,
    pub first_rect: Rect,
    pub second: Source<'a>,
    pub second_rect: Rect,
}

/// Apply the three-way guard of a combine operation.
pub(crate) fn guard_combine<'a>(
    ctx: &Context<'_>,
    first: Source<'a>,
    second: Source<'a>,
    target: &dyn BitmapData,
    region: CombineRegion,
    slot: &'a mut Option<Temporary>,
) -> Result<GuardedPair<'a>, TransformError> {
    let aliasing = classify_combine(first.is_target(), second.is_target(), region);
    let capture_rect = match aliasing {
        CombineAliasing::Direct => {
            return Ok(GuardedPair {
                first,
                first_rect: region.source1,
                second,
                second_rect: region.source2,
            });
        }
        CombineAliasing::CloneFirst => region.source1,
        CombineAliasing::CloneSecond => region.source2,
        CombineAliasing::CloneUnion => region.source1.union(region.source2),
    };
    debug!("combine aliasing {aliasing:?}, capturing {capture_rect:?}");
    let temp: &'a Temporary = slot.insert(Temporary::capture(ctx, target, capture_rect)?);
    let captured = Source::Other(&**temp);
    let (first, first_rect) = match aliasing {
        CombineAliasing::CloneFirst | CombineAliasing::CloneUnion => (captured, temp.local(region.source1)),
        _ => (first, region.source1),
    };
    let (second, second_rect) = match aliasing {
        CombineAliasing::CloneSecond | CombineAliasing::CloneUnion => (captured, temp.local(region.source2)),
        _ => (second, region.source2),
    };
    Ok(GuardedPair {
        first,
        first_rect,
        second,
        second_rect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rect::Size;
    use rgb::Rgba;

    #[test]
    fn classification() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(2, 2, 4, 4);
        let c = Rect::new(8, 0, 4, 4);
        assert_eq!(classify(false, a, a, false, false), Aliasing::Distinct);
        assert_eq!(classify(true, a, a, false, false), Aliasing::NoOp);
        assert_eq!(classify(true, a, a, true, false), Aliasing::InPlace);
        assert_eq!(classify(true, a, b, false, false), Aliasing::MustClone);
        assert_eq!(classify(true, a, c, true, false), Aliasing::SameBufferDisjoint);
        assert_eq!(classify(true, a, a, false, true), Aliasing::MustClone);
    }

    #[test]
    fn combine_classification() {
        let t = Rect::new(2, 0, 4, 4);
        let region = |s1: Rect, s2: Rect| CombineRegion {
            source1: s1,
            source2: s2,
            target: t,
        };
        let overlapping = Rect::new(0, 0, 4, 4);
        let far = Rect::new(10, 10, 4, 4);
        assert_eq!(
            classify_combine(true, true, region(overlapping, Rect::new(3, 1, 4, 4))),
            CombineAliasing::CloneUnion
        );
        assert_eq!(classify_combine(true, true, region(overlapping, t)), CombineAliasing::CloneFirst);
        assert_eq!(classify_combine(false, true, region(overlapping, far)), CombineAliasing::Direct);
        assert_eq!(
            classify_combine(false, true, region(far, overlapping)),
            CombineAliasing::CloneSecond
        );
    }

    #[test]
    fn capture_keeps_format_and_settings() {
        let mut b = Bitmap::new(4, 4, PixelFormat::Rgba64)
            .unwrap()
            .with_alpha_threshold(7);
        b.set_color64(2, 3, Rgba::new(1, 2, 3, 65535));
        let temp = Temporary::capture(&Context::new(), &b, Rect::new(1, 2, 3, 2)).unwrap();
        assert_eq!(temp.size(), Size::new(3, 2));
        assert_eq!(temp.pixel_format(), PixelFormat::Rgba64);
        assert_eq!(temp.alpha_threshold(), 7);
        assert_eq!(temp.get_color64(1, 1), Rgba::new(1, 2, 3, 65535));
        assert_eq!(temp.local(Rect::new(2, 3, 1, 1)), Rect::new(1, 1, 1, 1));
    }

    #[test]
    fn guard_captures_union_once() {
        let b = Bitmap::new(8, 8, PixelFormat::Rgba32).unwrap();
        let region = CombineRegion {
            source1: Rect::new(0, 0, 4, 4),
            source2: Rect::new(1, 1, 4, 4),
            target: Rect::new(2, 2, 4, 4),
        };
        let mut slot = None;
        let pair = guard_combine(&Context::new(), Source::Target, Source::Target, &b, region, &mut slot).unwrap();
        assert_eq!(pair.first_rect, Rect::new(0, 0, 4, 4));
        assert_eq!(pair.second_rect, Rect::new(1, 1, 4, 4));
        assert!(!pair.first.is_target() && !pair.second.is_target());
    }
}
