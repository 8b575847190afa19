//! Rectangle algebra.
//!
//! Every operation starts by reconciling the rectangles the caller asked
//! for with the bounds of the bitmaps involved. Clipping one side must
//! shrink the other side by the same amount, so the reconciled rectangles
//! always describe congruent pixel counts (or, for scaling, the same
//! ratio). An empty result is a successful no-op, never an error.

use core::cmp::{max, min};

/// A location in bitmap coordinates. May be negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Width and height of a bitmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total number of pixels.
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An axis-aligned rectangle. Width or height `<= 0` means empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// The canonical empty rectangle.
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin covering `size`.
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    /// Rectangle at `location` covering `size`.
    pub const fn at(location: Point, size: Size) -> Self {
        Self::new(location.x, location.y, size.width as i32, size.height as i32)
    }

    /// Top-left corner.
    pub const fn location(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Dimensions, with negative extents reported as zero.
    pub const fn size(self) -> Size {
        let width = if self.width > 0 { self.width as u32 } else { 0 };
        let height = if self.height > 0 { self.height as u32 } else { 0 };
        Size::new(width, height)
    }

    /// Exclusive right edge.
    pub const fn right(self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }

    /// Whether the rectangle covers no pixels.
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Move the rectangle by `(dx, dy)`.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Common area of both rectangles, or [`Rect::EMPTY`].
    pub fn intersect(self, other: Rect) -> Rect {
        let left = max(self.x, other.x);
        let top = max(self.y, other.y);
        let right = min(self.right(), other.right());
        let bottom = min(self.bottom(), other.bottom());
        if right <= left || bottom <= top {
            return Rect::EMPTY;
        }
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Whether both rectangles share at least one pixel.
    pub fn intersects_with(self, other: Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(self, other: Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle covering both. Empty inputs are ignored.
    pub fn union(self, other: Rect) -> Rect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let left = min(self.x, other.x);
        let top = min(self.y, other.y);
        let right = max(self.right(), other.right());
        let bottom = max(self.bottom(), other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// Reconciled source and target rectangles of a non-scaling operation.
///
/// Both rectangles have identical size and lie inside their bitmaps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionPair {
    /// Region to read, in source coordinates.
    pub source: Rect,
    /// Region to write, in target coordinates.
    pub target: Rect,
}

impl RegionPair {
    /// The no-op pair.
    pub const EMPTY: Self = Self {
        source: Rect::EMPTY,
        target: Rect::EMPTY,
    };

    /// Whether there is nothing to process.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() || self.target.is_empty()
    }

    /// Common width and height of both rectangles.
    pub fn size(&self) -> Size {
        self.source.size()
    }
}

/// Reconciled rectangles of a scaling operation.
///
/// The two rectangles are not congruent; the scale ratio is
/// `target.width / source.width` (and likewise vertically).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScaledRegion {
    /// Region to sample, in source coordinates.
    pub source: Rect,
    /// Region to render, in target coordinates.
    pub target: Rect,
}

impl ScaledRegion {
    /// The no-op region.
    pub const EMPTY: Self = Self {
        source: Rect::EMPTY,
        target: Rect::EMPTY,
    };

    /// Whether there is nothing to render.
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() || self.target.is_empty()
    }
}

/// Reconciled rectangles of a combine operation. All three share one size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CombineRegion {
    /// Region of the first source.
    pub source1: Rect,
    /// Region of the second source.
    pub source2: Rect,
    /// Region of the target.
    pub target: Rect,
}

impl CombineRegion {
    /// The no-op region.
    pub const EMPTY: Self = Self {
        source1: Rect::EMPTY,
        source2: Rect::EMPTY,
        target: Rect::EMPTY,
    };

    /// Whether there is nothing to combine.
    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Common width and height of the three rectangles.
    pub fn size(&self) -> Size {
        self.target.size()
    }
}

/// Where the rectangles of a combine operation are placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombineArea {
    /// Requested region of the first source; its size drives the operation.
    pub source1: Rect,
    /// Top-left corner of the matching region in the second source.
    pub source2: Point,
    /// Top-left corner of the matching region in the target.
    pub target: Point,
}

impl CombineArea {
    /// Create a placement.
    pub const fn new(source1: Rect, source2: Point, target: Point) -> Self {
        Self {
            source1,
            source2,
            target,
        }
    }

    /// All three regions start at the origin and cover `size`.
    pub const fn full(size: Size) -> Self {
        Self::new(Rect::from_size(size), Point::ORIGIN, Point::ORIGIN)
    }
}

/// Clip `source_rect` to `source_size` and the congruent rectangle at
/// `target_location` to `target_size`, keeping both in lock-step.
pub fn reconcile(
    source_size: Size,
    source_rect: Rect,
    target_size: Size,
    target_location: Point,
) -> RegionPair {
    let target_rect = Rect::new(
        target_location.x,
        target_location.y,
        source_rect.width,
        source_rect.height,
    );
    match common_window(&[(source_rect, source_size), (target_rect, target_size)]) {
        Some(window) => RegionPair {
            source: window.offset(source_rect.x, source_rect.y),
            target: window.offset(target_rect.x, target_rect.y),
        },
        None => RegionPair::EMPTY,
    }
}

/// Three-way variant of [`reconcile`] used by combine.
///
/// The three requested rectangles share the size of `area.source1`. Each
/// is clipped against its own bounds, then all three are shrunk to the
/// smallest common window and re-derived from their requested origins in
/// a single pass, so clipping never oscillates between pairs.
pub fn reconcile_combine(
    source1_size: Size,
    source2_size: Size,
    target_size: Size,
    area: CombineArea,
) -> CombineRegion {
    let first = area.source1;
    let second = Rect::new(area.source2.x, area.source2.y, first.width, first.height);
    let target = Rect::new(area.target.x, area.target.y, first.width, first.height);
    match common_window(&[
        (first, source1_size),
        (second, source2_size),
        (target, target_size),
    ]) {
        Some(window) => CombineRegion {
            source1: window.offset(first.x, first.y),
            source2: window.offset(second.x, second.y),
            target: window.offset(target.x, target.y),
        },
        None => CombineRegion::EMPTY,
    }
}

/// The part of a shared `width x height` window (relative to each
/// requested origin) that survives clipping every request to its bounds.
fn common_window(requests: &[(Rect, Size)]) -> Option<Rect> {
    let (first, _) = requests.first()?;
    let mut window = Rect::new(0, 0, first.width, first.height);
    for &(requested, bounds) in requests {
        let clipped = requested.intersect(Rect::from_size(bounds));
        if clipped.is_empty() {
            return None;
        }
        window = window.intersect(clipped.offset(-requested.x, -requested.y));
        if window.is_empty() {
            return None;
        }
    }
    Some(window)
}

/// Clip a scaling operation's rectangles against both bitmaps.
///
/// The source rectangle is clipped first and the cut is mapped into the
/// target rectangle; then the target is clipped and the cut is mapped
/// back into the source. Both mappings round to nearest, so for some
/// ratio/offset combinations the two passes disagree by one pixel and the
/// resulting ratio differs slightly from the requested one. The target
/// region never leaves `target_rect`.
pub fn reconcile_scaled(
    source_size: Size,
    source_rect: Rect,
    target_size: Size,
    target_rect: Rect,
) -> ScaledRegion {
    if source_rect.is_empty() || target_rect.is_empty() {
        return ScaledRegion::EMPTY;
    }
    let (sw, sh) = (source_rect.width, source_rect.height);
    let (tw, th) = (target_rect.width, target_rect.height);

    let mut source = source_rect.intersect(Rect::from_size(source_size));
    if source.is_empty() {
        return ScaledRegion::EMPTY;
    }
    let mapped = if source == source_rect {
        target_rect
    } else {
        Rect::new(
            target_rect.x + scale_round(source.x - source_rect.x, tw, sw),
            target_rect.y + scale_round(source.y - source_rect.y, th, sh),
            scale_round(source.width, tw, sw),
            scale_round(source.height, th, sh),
        )
    };

    // rounding offset and width separately can overshoot the request
    let target = mapped.intersect(target_rect).intersect(Rect::from_size(target_size));
    if target.is_empty() {
        return ScaledRegion::EMPTY;
    }
    if target != mapped {
        let back = Rect::new(
            source.x + scale_round(target.x - mapped.x, sw, tw),
            source.y + scale_round(target.y - mapped.y, sh, th),
            scale_round(target.width, sw, tw),
            scale_round(target.height, sh, th),
        );
        source = back.intersect(source);
        if source.is_empty() {
            return ScaledRegion::EMPTY;
        }
    }
    ScaledRegion { source, target }
}

/// Largest rectangle with the aspect ratio of `content` that fits into
/// `canvas`, centered.
pub fn fit_aspect_ratio(content: Size, canvas: Size) -> Rect {
    if content.is_empty() || canvas.is_empty() {
        return Rect::EMPTY;
    }
    let (cw, ch) = (content.width as i64, content.height as i64);
    let (w, h) = (canvas.width as i64, canvas.height as i64);
    let (fit_w, fit_h) = if w * ch <= h * cw {
        (w, max(1, (ch * w * 2 + cw) / (cw * 2)))
    } else {
        (max(1, (cw * h * 2 + ch) / (ch * 2)), h)
    };
    let fit_w = min(fit_w, w);
    let fit_h = min(fit_h, h);
    Rect::new(
        ((w - fit_w) / 2) as i32,
        ((h - fit_h) / 2) as i32,
        fit_w as i32,
        fit_h as i32,
    )
}

/// `round(value * num / den)`, halves away from zero.
fn scale_round(value: i32, num: i32, den: i32) -> i32 {
    let product = value as i64 * num as i64 * 2;
    let den = den as i64 * 2;
    let half = den / 2;
    let rounded = if product >= 0 {
        (product + half) / den
    } else {
        (product - half) / den
    };
    rounded as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_and_union() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(b), Rect::new(5, 5, 5, 5));
        assert_eq!(a.union(b), Rect::new(0, 0, 15, 15));
        assert!(a.intersect(Rect::new(10, 0, 5, 5)).is_empty());
        assert!(!a.intersects_with(Rect::new(10, 0, 5, 5)));
        assert!(a.contains(Rect::new(2, 2, 3, 3)));
        assert_eq!(Rect::EMPTY.union(b), b);
    }

    #[test]
    fn reconcile_inside_bounds() {
        let pair = reconcile(
            Size::new(10, 10),
            Rect::new(2, 2, 4, 4),
            Size::new(10, 10),
            Point::new(5, 5),
        );
        assert_eq!(pair.source, Rect::new(2, 2, 4, 4));
        assert_eq!(pair.target, Rect::new(5, 5, 4, 4));
    }

    #[test]
    fn reconcile_target_clip_shrinks_source() {
        // Target location hangs off the left/top edge: both sides lose the
        // same leading columns and rows.
        let pair = reconcile(
            Size::new(10, 10),
            Rect::new(0, 0, 6, 6),
            Size::new(8, 8),
            Point::new(-2, -3),
        );
        assert_eq!(pair.source, Rect::new(2, 3, 4, 3));
        assert_eq!(pair.target, Rect::new(0, 0, 4, 3));
    }

    #[test]
    fn reconcile_source_clip_shrinks_target() {
        let pair = reconcile(
            Size::new(4, 4),
            Rect::new(-1, 2, 6, 6),
            Size::new(20, 20),
            Point::new(10, 10),
        );
        assert_eq!(pair.source, Rect::new(0, 2, 4, 2));
        assert_eq!(pair.target, Rect::new(11, 10, 4, 2));
    }

    #[test]
    fn reconcile_disjoint_is_empty() {
        let pair = reconcile(
            Size::new(4, 4),
            Rect::new(0, 0, 4, 4),
            Size::new(4, 4),
            Point::new(4, 0),
        );
        assert!(pair.is_empty());
        let pair = reconcile(
            Size::new(4, 4),
            Rect::new(5, 5, 4, 4),
            Size::new(4, 4),
            Point::ORIGIN,
        );
        assert_eq!(pair, RegionPair::EMPTY);
    }

    #[test]
    fn reconcile_combine_uses_smallest_window() {
        let region = reconcile_combine(
            Size::new(10, 10),
            Size::new(5, 10),
            Size::new(10, 4),
            CombineArea::new(Rect::new(1, 1, 8, 8), Point::new(-1, 0), Point::new(2, 1)),
        );
        // second source loses column 0 (x = -1) and ends at x = 5;
        // target ends at y = 4.
        assert_eq!(region.source2, Rect::new(0, 0, 5, 3));
        assert_eq!(region.source1, Rect::new(2, 1, 5, 3));
        assert_eq!(region.target, Rect::new(3, 1, 5, 3));
        assert_eq!(region.size(), Size::new(5, 3));
    }

    #[test]
    fn reconcile_combine_disjoint() {
        let region = reconcile_combine(
            Size::new(4, 4),
            Size::new(4, 4),
            Size::new(4, 4),
            CombineArea::new(Rect::new(0, 0, 4, 4), Point::ORIGIN, Point::new(10, 10)),
        );
        assert!(region.is_empty());
    }

    #[test]
    fn scaled_without_clipping_keeps_rects() {
        let region = reconcile_scaled(
            Size::new(4, 4),
            Rect::new(0, 0, 4, 4),
            Size::new(8, 8),
            Rect::new(1, 1, 2, 2),
        );
        assert_eq!(region.source, Rect::new(0, 0, 4, 4));
        assert_eq!(region.target, Rect::new(1, 1, 2, 2));
    }

    #[test]
    fn scaled_source_clip_maps_into_target() {
        let region = reconcile_scaled(
            Size::new(4, 4),
            Rect::new(-2, 0, 8, 4),
            Size::new(16, 8),
            Rect::new(0, 0, 16, 8),
        );
        assert_eq!(region.source, Rect::new(0, 0, 4, 4));
        assert_eq!(region.target, Rect::new(4, 0, 8, 8));
    }

    #[test]
    fn scaled_clipping_rounds_asymmetrically() {
        // 10 -> 15 (ratio 1.5), target hanging one pixel off each leading
        // edge. Mapping the cut back gives 0.67 -> 1 and 6.67 -> 7, so the
        // effective ratio becomes 10/7 instead of 1.5.
        let region = reconcile_scaled(
            Size::new(10, 10),
            Rect::new(0, 0, 10, 10),
            Size::new(10, 10),
            Rect::new(-1, -1, 15, 15),
        );
        assert_eq!(region.target, Rect::new(0, 0, 10, 10));
        assert_eq!(region.source, Rect::new(1, 1, 7, 7));
    }

    #[test]
    fn scaled_source_clip_stays_inside_target_rect() {
        // 2 -> 3 with half the source cut off: offset and width both round
        // 1.5 up, which would reach x = 4
        let region = reconcile_scaled(
            Size::new(1, 2),
            Rect::new(-1, 0, 2, 2),
            Size::new(8, 8),
            Rect::new(0, 0, 3, 3),
        );
        assert_eq!(region.target, Rect::new(2, 0, 1, 3));
        assert_eq!(region.source, Rect::new(0, 0, 1, 2));
        assert_eq!(region.target.intersect(Rect::new(0, 0, 3, 3)), region.target);
    }

    #[test]
    fn scaled_downscale_clip_rounds_back() {
        // 9 -> 3 (ratio 1/3) with the target clipped by two pixels at the
        // right: 1 target pixel maps back to 3 source pixels.
        let region = reconcile_scaled(
            Size::new(9, 9),
            Rect::new(0, 0, 9, 9),
            Size::new(1, 3),
            Rect::new(0, 0, 3, 3),
        );
        assert_eq!(region.target, Rect::new(0, 0, 1, 3));
        assert_eq!(region.source, Rect::new(0, 0, 3, 9));
    }

    #[test]
    fn scaled_outside_is_empty() {
        let region = reconcile_scaled(
            Size::new(4, 4),
            Rect::new(0, 0, 4, 4),
            Size::new(4, 4),
            Rect::new(4, 4, 8, 8),
        );
        assert!(region.is_empty());
    }

    #[test]
    fn aspect_fit_letterboxes() {
        assert_eq!(
            fit_aspect_ratio(Size::new(4, 2), Size::new(8, 8)),
            Rect::new(0, 2, 8, 4)
        );
        assert_eq!(
            fit_aspect_ratio(Size::new(2, 4), Size::new(8, 8)),
            Rect::new(2, 0, 4, 8)
        );
        assert_eq!(
            fit_aspect_ratio(Size::new(3, 3), Size::new(6, 6)),
            Rect::new(0, 0, 6, 6)
        );
    }

    #[test]
    fn scale_round_halves_away_from_zero() {
        assert_eq!(scale_round(1, 1, 2), 1);
        assert_eq!(scale_round(-1, 1, 2), -1);
        assert_eq!(scale_round(10, 10, 15), 7);
        assert_eq!(scale_round(2, 1, 3), 1);
    }
}
