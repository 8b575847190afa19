//! Public entry point.

use core::fmt;

use enough::Stop;

use crate::bitmap::{BitmapData, BitmapDataMut, Source};
use crate::buffer::Bitmap;
use crate::color::StraightColor;
use crate::context::Context;
use crate::copy::Collaborators;
use crate::error::TransformError;
use crate::format::PixelFormat;
use crate::rect::{CombineArea, Point, Rect, Size};
use crate::resize::ScalingMode;
use crate::sampler::ColorSet;
use crate::session::{Ditherer, Quantizer};
use crate::{combine, copy, resize, sampler};

/// A configured bitmap transform job.
///
/// Holds the execution [`Context`] and the optional quantizer and ditherer
/// applied to every pixel written by the job. The job only borrows its
/// collaborators, so one configuration can be reused for any number of
/// operations.
///
/// Operations that are canceled return their "no result" value
/// (`Ok(false)`, `Ok(None)`, an empty [`ColorSet`] or `0`) unless the
/// context was built [`with_cancel_as_error`](Context::with_cancel_as_error).
///
/// ```
/// use zenblit::{BayerMatrix, Bitmap, BitmapData, OrderedDitherer, PixelFormat, Point, Rgba, Source, Transform};
///
/// let mut source = Bitmap::new(4, 4, PixelFormat::Rgba32)?;
/// source.clear(Rgba::new(128, 128, 128, 255));
/// let mut target = Bitmap::new(4, 4, PixelFormat::Indexed1)?;
///
/// let ditherer = OrderedDitherer::new(BayerMatrix::Bayer4);
/// let job = Transform::new().with_ditherer(&ditherer);
/// assert!(job.copy(Source::from(&source), &mut target, source.bounds(), Point::ORIGIN)?);
/// # Ok::<(), zenblit::TransformError>(())
/// ```
#[derive(Clone, Copy, Default)]
pub struct Transform<'a> {
    context: Context<'a>,
    quantizer: Option<&'a dyn Quantizer>,
    ditherer: Option<&'a dyn Ditherer>,
}

impl<'a> Transform<'a> {
    /// A job with a default context and no collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the execution context.
    pub fn with_context(mut self, context: Context<'a>) -> Self {
        self.context = context;
        self
    }

    /// Shorthand for setting the context's stop token.
    pub fn with_stop(mut self, stop: &'a dyn Stop) -> Self {
        self.context = self.context.with_stop(stop);
        self
    }

    /// Map written colors through `quantizer`.
    pub fn with_quantizer(mut self, quantizer: &'a dyn Quantizer) -> Self {
        self.quantizer = Some(quantizer);
        self
    }

    /// Dither written colors with `ditherer`.
    ///
    /// Without a quantizer the ditherer is only used for ditherable target
    /// formats, paired with the target's own palette.
    pub fn with_ditherer(mut self, ditherer: &'a dyn Ditherer) -> Self {
        self.ditherer = Some(ditherer);
        self
    }

    /// The execution context every operation of this job runs under.
    pub fn context(&self) -> &Context<'a> {
        &self.context
    }

    fn collaborators(&self) -> Collaborators<'a> {
        Collaborators {
            quantizer: self.quantizer,
            ditherer: self.ditherer,
        }
    }

    /// Copy `rect` of `source` into a new bitmap, optionally converting it
    /// to `format`.
    ///
    /// Indexed results take their palette from the quantizing session, or
    /// from the source when it fits, or use the format's default palette.
    ///
    /// # Errors
    ///
    /// [`TransformError::EmptyRegion`] when `rect` does not intersect the
    /// source.
    ///
    /// # Panics
    ///
    /// When a collaborator fails to start a session without a stop request.
    pub fn clone_region(
        &self,
        source: &dyn BitmapData,
        rect: Rect,
        format: Option<PixelFormat>,
    ) -> Result<Option<Bitmap>, TransformError> {
        let result = copy::clone_region(&self.context, self.collaborators(), source, rect, format);
        self.context.finish(result.map(Some), || None)
    }

    /// Overwrite the target with `source_rect` of `source`, placed at
    /// `location`. Parts falling outside either bitmap are clipped.
    ///
    /// Returns `Ok(false)` when canceled.
    ///
    /// # Panics
    ///
    /// When a collaborator fails to start a session without a stop request.
    pub fn copy(
        &self,
        source: Source<'_>,
        target: &mut dyn BitmapDataMut,
        source_rect: Rect,
        location: Point,
    ) -> Result<bool, TransformError> {
        let result = copy::copy(&self.context, self.collaborators(), source, target, source_rect, location, false);
        self.context.finish(result.map(|()| true), || false)
    }

    /// Alpha-blend `source_rect` of `source` over the target at `location`,
    /// in the target's working color space.
    ///
    /// Returns `Ok(false)` when canceled.
    ///
    /// # Panics
    ///
    /// When a collaborator fails to start a session without a stop request.
    pub fn draw(
        &self,
        source: Source<'_>,
        target: &mut dyn BitmapDataMut,
        source_rect: Rect,
        location: Point,
    ) -> Result<bool, TransformError> {
        let result = copy::copy(&self.context, self.collaborators(), source, target, source_rect, location, true);
        self.context.finish(result.map(|()| true), || false)
    }

    /// Alpha-blend `source_rect` of `source` over `target_rect` of the
    /// target, resampling with `mode` when the sizes differ.
    ///
    /// Returns `Ok(false)` when canceled.
    ///
    /// # Panics
    ///
    /// When a collaborator fails to start a session without a stop request.
    pub fn draw_resized(
        &self,
        source: Source<'_>,
        target: &mut dyn BitmapDataMut,
        source_rect: Rect,
        target_rect: Rect,
        mode: ScalingMode,
    ) -> Result<bool, TransformError> {
        let result = resize::draw_resized(
            &self.context,
            self.collaborators(),
            source,
            target,
            source_rect,
            target_rect,
            mode,
            true,
        );
        self.context.finish(result.map(|()| true), || false)
    }

    /// Resample `source` into a new bitmap of `size`.
    ///
    /// With `keep_aspect_ratio` the content is centered and the uncovered
    /// borders stay transparent.
    pub fn resize(
        &self,
        source: &dyn BitmapData,
        size: Size,
        mode: ScalingMode,
        keep_aspect_ratio: bool,
    ) -> Result<Option<Bitmap>, TransformError> {
        let result = resize::resize(&self.context, self.collaborators(), source, size, mode, keep_aspect_ratio);
        self.context.finish(result.map(Some), || None)
    }

    /// Combine same-position pixels of two sources through `f` and write
    /// the results into the target.
    ///
    /// `area` names the first source's rectangle and where the second
    /// source and the target line up with it; all three are clipped to one
    /// common size. Either source may be the target itself.
    ///
    /// ```
    /// use zenblit::{Bitmap, BitmapData, Color32, CombineArea, PixelFormat, Rgba, Size, Source, Transform};
    ///
    /// let mut a = Bitmap::new(2, 2, PixelFormat::Rgba32)?;
    /// a.clear(Rgba::new(200, 0, 0, 255));
    /// let mut target = Bitmap::new(2, 2, PixelFormat::Rgba32)?;
    /// target.clear(Rgba::new(0, 0, 200, 255));
    ///
    /// let max = |x: Color32, y: Color32| Rgba::new(x.r.max(y.r), x.g.max(y.g), x.b.max(y.b), 255);
    /// let area = CombineArea::full(Size::new(2, 2));
    /// Transform::new().combine(Source::from(&a), Source::Target, &mut target, area, max)?;
    /// assert_eq!(target.get_color32(1, 1), Rgba::new(200, 0, 200, 255));
    /// # Ok::<(), zenblit::TransformError>(())
    /// ```
    pub fn combine<C: StraightColor>(
        &self,
        first: Source<'_>,
        second: Source<'_>,
        target: &mut dyn BitmapDataMut,
        area: CombineArea,
        f: impl Fn(C, C) -> C,
    ) -> Result<bool, TransformError> {
        let result = combine::combine(&self.context, self.collaborators(), first, second, target, area, f);
        self.context.finish(result.map(|()| true), || false)
    }

    /// Distinct colors of `source`, at most `max_colors` of them (`0` means
    /// as many as the format can hold).
    ///
    /// Fully transparent pixels count as one color. Indexed sources report
    /// their palette unless `force_scan` is set.
    pub fn colors(&self, source: &dyn BitmapData, max_colors: usize, force_scan: bool) -> Result<ColorSet, TransformError> {
        let result = sampler::colors(&self.context, source, max_colors, force_scan);
        self.context.finish(result, ColorSet::default)
    }

    /// Number of distinct colors actually used by `source`.
    pub fn color_count(&self, source: &dyn BitmapData) -> Result<usize, TransformError> {
        let result = sampler::color_count(&self.context, source);
        self.context.finish(result, || 0)
    }
}

impl fmt::Debug for Transform<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("context", &self.context)
            .field("quantizer", &self.quantizer.is_some())
            .field("ditherer", &self.ditherer.is_some())
            .finish()
    }
}
