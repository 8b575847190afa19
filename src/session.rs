//! Quantizer and ditherer collaborator contracts.
//!
//! A [`Quantizer`] or [`Ditherer`] is a reusable configuration. Each
//! operation initializes it into a session that lives exactly as long as
//! the operation: the boxed session is dropped on every exit path.
//!
//! Initialization returns `Err(StopReason)` only when the stop token it was
//! given requested cancellation. Reporting a stop that was never requested
//! is a bug in the collaborator and makes the engine panic.

use alloc::boxed::Box;

use enough::{Stop, StopReason};

use crate::bitmap::BitmapData;
use crate::color::{Color32, WorkingColorSpace};
use crate::context::{Context, Stage};
use crate::error::TransformError;
use crate::palette::Palette;

/// Maps arbitrary colors onto a constrained set of colors.
pub trait Quantizer {
    /// Whether [`initialize`](Self::initialize) inspects the pixels of its
    /// source. Content-dependent quantizers make drawing and resizing run
    /// in two phases so that they see the rendered result.
    fn initialize_reads_content(&self) -> bool;

    /// Preferred working color space.
    fn working_space(&self) -> WorkingColorSpace {
        WorkingColorSpace::Default
    }

    /// Start a session for `source`.
    fn initialize<'a>(
        &'a self,
        source: &dyn BitmapData,
        stop: &dyn Stop,
    ) -> Result<Box<dyn QuantizingSession + 'a>, StopReason>;
}

/// An initialized quantizer.
pub trait QuantizingSession {
    /// The colors this session maps to, when they form a palette.
    fn palette(&self) -> Option<&Palette>;

    /// Opaque color translucent inputs are blended with.
    fn back_color(&self) -> Color32;

    /// Alpha below which an input maps to transparent. Zero when the
    /// session never produces transparency.
    fn alpha_threshold(&self) -> u8;

    /// Color space used for blending and distance calculations.
    fn working_space(&self) -> WorkingColorSpace;

    /// Map `color` to its quantized counterpart.
    fn quantize(&self, color: Color32) -> Color32;
}

/// Distributes quantization error to reduce banding.
pub trait Ditherer {
    /// Whether [`initialize`](Self::initialize) inspects the pixels of its
    /// source.
    fn initialize_reads_content(&self) -> bool;

    /// Start a session for `source` that dithers towards `quantizer`.
    fn initialize<'a>(
        &'a self,
        source: &dyn BitmapData,
        quantizer: &'a dyn QuantizingSession,
        stop: &dyn Stop,
    ) -> Result<Box<dyn DitheringSession + 'a>, StopReason>;
}

/// An initialized ditherer.
///
/// Pixels are visited row by row, left to right. `x` and `y` are relative
/// to the top-left corner of the region being written.
pub trait DitheringSession {
    /// Dither and quantize one pixel.
    fn dither(&mut self, color: Color32, x: u32, y: u32) -> Color32;
}

fn resolve<S>(ctx: &Context<'_>, result: Result<S, StopReason>, what: &str) -> Result<S, TransformError> {
    match result {
        Ok(session) => Ok(session),
        Err(_) if ctx.stop().check().is_err() => {
            log::debug!("{what} initialization canceled");
            Err(TransformError::Canceled)
        }
        Err(reason) => panic!("{what} reported {reason:?} without a stop request"),
    }
}

/// Initialize `quantizer` against `source`.
///
/// # Panics
///
/// Panics if the quantizer reports cancellation that was not requested.
pub(crate) fn start_quantizing<'q>(
    ctx: &Context<'_>,
    quantizer: &'q dyn Quantizer,
    source: &dyn BitmapData,
) -> Result<Box<dyn QuantizingSession + 'q>, TransformError> {
    ctx.check()?;
    ctx.new_phase(Stage::InitializingQuantizer, 0);
    resolve(ctx, quantizer.initialize(source, ctx.stop()), "quantizer")
}

/// Initialize `ditherer` against `source` and a ready quantizing session.
///
/// # Panics
///
/// Panics if the ditherer reports cancellation that was not requested.
pub(crate) fn start_dithering<'d>(
    ctx: &Context<'_>,
    ditherer: &'d dyn Ditherer,
    source: &dyn BitmapData,
    quantizer: &'d dyn QuantizingSession,
) -> Result<Box<dyn DitheringSession + 'd>, TransformError> {
    ctx.check()?;
    ctx.new_phase(Stage::InitializingDitherer, 0);
    resolve(ctx, ditherer.initialize(source, quantizer, ctx.stop()), "ditherer")
}
