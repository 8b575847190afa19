//! Aliasing-safe bitmap transforms over capability-based pixel buffers.
//!
//! Every operation reads from one or two [`BitmapData`] sources and writes
//! into a [`BitmapDataMut`] target:
//!
//! - [`Transform::copy`] / [`Transform::draw`] overwrite or alpha-blend a
//!   region of a source onto a target
//! - [`Transform::draw_resized`] / [`Transform::resize`] resample with a
//!   [`ScalingMode`]
//! - [`Transform::combine`] merges two sources pixel by pixel
//! - [`Transform::clone_region`] copies a region into a new [`Bitmap`]
//! - [`Transform::colors`] / [`Transform::color_count`] enumerate colors
//!
//! Rectangles are clipped against every bitmap involved ([`reconcile`] and
//! friends). A source may be the target itself ([`Source::Target`]); the
//! engine then reads directly, skips the work, or captures the source
//! region first, so that no pixel is read after it was overwritten.
//!
//! Written pixels can be mapped through a [`Quantizer`] and a [`Ditherer`].
//! Collaborators whose sessions depend on the source content get a
//! finished intermediate image to look at instead of a partial one.
//!
//! Long-running operations poll an [`enough::Stop`] token once per row and
//! report per-row [`Progress`].
//!
//! ## Feature flags
//! - `parallel` (default): [`Transform::color_count`] decodes raw rows on up
//!   to [`Context::max_degree_of_parallelism`] rayon workers.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

mod aliasing;
mod bitmap;
mod buffer;
mod color;
mod combine;
mod context;
mod copy;
mod ditherers;
mod error;
mod format;
mod palette;
mod quantizers;
mod rect;
mod resize;
mod sampler;
mod session;
mod transform;

pub use aliasing::{Aliasing, CombineAliasing, classify, classify_combine};
pub use bitmap::{AlphaContent, BitmapData, BitmapDataMut, ClippedBitmap, Source};
pub use buffer::Bitmap;
pub use color::{
    Color32, Color64, ColorF, ColorRepr, PColor32, PColor64, PColorF, Premultiplied, Representation,
    StraightColor, WorkingColorSpace, blend_color32, blend_with_background, color_f_to_32, color_f_to_64,
    color32_to_64, color32_to_f, color64_to_32, color64_to_f, linear_to_srgb, srgb_to_linear,
};
pub use context::{Context, Progress, Stage};
pub use ditherers::{BayerMatrix, ErrorDiffusionDitherer, OrderedDitherer};
pub use error::TransformError;
pub use format::PixelFormat;
pub use palette::Palette;
pub use quantizers::{PopularityQuantizer, PredefinedColorsQuantizer};
pub use rect::{
    CombineArea, CombineRegion, Point, Rect, RegionPair, ScaledRegion, Size, fit_aspect_ratio, reconcile,
    reconcile_combine, reconcile_scaled,
};
pub use resize::ScalingMode;
pub use sampler::ColorSet;
pub use session::{Ditherer, DitheringSession, Quantizer, QuantizingSession};
pub use transform::Transform;

pub use enough::{Stop, StopReason, Unstoppable};
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb;
pub use rgb::{Gray, Rgb, Rgba};
