//! Distinct color enumeration and counting.
//!
//! Pixels are read in the representation preferred by the bitmap's pixel
//! format and normalized before de-duplication: every fully transparent
//! pixel becomes the canonical transparent value, and float channels are
//! clamped into range, so hidden or out-of-range components never create
//! extra colors.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use bitvec::vec::BitVec;

use crate::bitmap::BitmapData;
use crate::color::{
    Color32, Color64, ColorF, ColorRepr, PColor32, PColor64, PColorF, Representation,
    with_representation,
};
use crate::context::{Context, Stage};
use crate::error::TransformError;
use crate::format::CompactEncoding;

/// De-duplicated colors in the representation they were read in.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorSet {
    /// 8-bit straight colors.
    Color32(Vec<Color32>),
    /// 8-bit premultiplied colors.
    PColor32(Vec<PColor32>),
    /// 16-bit straight colors.
    Color64(Vec<Color64>),
    /// 16-bit premultiplied colors.
    PColor64(Vec<PColor64>),
    /// Linear `f32` straight colors.
    ColorF(Vec<ColorF>),
    /// Linear `f32` premultiplied colors.
    PColorF(Vec<PColorF>),
}

impl Default for ColorSet {
    fn default() -> Self {
        Self::Color32(Vec::new())
    }
}

impl ColorSet {
    /// Number of distinct colors.
    pub fn len(&self) -> usize {
        match self {
            Self::Color32(v) => v.len(),
            Self::PColor32(v) => v.len(),
            Self::Color64(v) => v.len(),
            Self::PColor64(v) => v.len(),
            Self::ColorF(v) => v.len(),
            Self::PColorF(v) => v.len(),
        }
    }

    /// Whether the set is empty; a canceled enumeration returns an empty set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Representation of the stored colors.
    pub fn representation(&self) -> Representation {
        match self {
            Self::Color32(_) => Representation::Color32,
            Self::PColor32(_) => Representation::PColor32,
            Self::Color64(_) => Representation::Color64,
            Self::PColor64(_) => Representation::PColor64,
            Self::ColorF(_) => Representation::ColorF,
            Self::PColorF(_) => Representation::PColorF,
        }
    }

    /// All colors converted to 8-bit straight sRGB. The result may contain
    /// duplicates when wide colors collapse.
    pub fn to_color32s(&self) -> Vec<Color32> {
        fn convert<C: ColorRepr>(colors: &[C]) -> Vec<Color32> {
            colors.iter().map(|c| c.to_color32()).collect()
        }
        match self {
            Self::Color32(v) => v.clone(),
            Self::PColor32(v) => convert(v),
            Self::Color64(v) => convert(v),
            Self::PColor64(v) => convert(v),
            Self::ColorF(v) => convert(v),
            Self::PColorF(v) => convert(v),
        }
    }
}

trait Collect: ColorRepr {
    fn wrap(colors: Vec<Self>) -> ColorSet;
}

macro_rules! impl_collect {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl Collect for $ty {
            fn wrap(colors: Vec<Self>) -> ColorSet {
                ColorSet::$variant(colors)
            }
        })*
    };
}

impl_collect!(
    Color32 => Color32,
    PColor32 => PColor32,
    Color64 => Color64,
    PColor64 => PColor64,
    ColorF => ColorF,
    PColorF => PColorF,
);

/// Enumerate the distinct colors of `source`.
///
/// Stops as soon as `max_colors` colors were found; 0 means the most the
/// pixel format can hold. Indexed bitmaps report their palette without
/// reading pixels unless `force_scan` is set.
pub(crate) fn colors(
    ctx: &Context<'_>,
    source: &dyn BitmapData,
    max_colors: usize,
    force_scan: bool,
) -> Result<ColorSet, TransformError> {
    let format = source.pixel_format();
    if !force_scan
        && format.is_indexed()
        && let Some(palette) = source.palette()
        && palette.len() <= 256
    {
        log::debug!("reporting palette of {} entries without scanning", palette.len());
        let limit = if max_colors == 0 { usize::MAX } else { max_colors };
        return Ok(ColorSet::Color32(distinct(palette.entries().iter().copied(), limit)));
    }
    let limit = match max_colors {
        0 => usize::try_from(format.max_colors()).unwrap_or(usize::MAX),
        n => n,
    };
    with_representation!(format.representation(), C => scan::<C>(ctx, source, limit))
}

fn distinct<C: ColorRepr>(colors: impl Iterator<Item = C>, limit: usize) -> Vec<C> {
    let mut keys = BTreeSet::new();
    let mut out = Vec::new();
    for c in colors {
        let c = c.normalized();
        if keys.insert(c.key()) {
            out.push(c);
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

fn scan<C: Collect>(ctx: &Context<'_>, source: &dyn BitmapData, limit: usize) -> Result<ColorSet, TransformError> {
    ctx.new_phase(Stage::GetColors, source.height() as usize);
    let mut keys = BTreeSet::new();
    let mut found = Vec::new();
    'rows: for y in 0..source.height() {
        ctx.check()?;
        for x in 0..source.width() {
            let c = C::read(source, x, y).normalized();
            if keys.insert(c.key()) {
                found.push(c);
                if found.len() >= limit {
                    break 'rows;
                }
            }
        }
        ctx.increment();
    }
    Ok(C::wrap(found))
}

/// Rows one worker decodes per batch.
#[cfg(feature = "parallel")]
const ROWS_PER_TASK: usize = 32;

/// Count the distinct colors of `source`.
///
/// Formats whose raw values map one-to-one to colors are counted from
/// their bytes when the rows carry no padding. Those bytes are decoded on
/// several workers when the context allows it.
pub(crate) fn color_count(ctx: &Context<'_>, source: &dyn BitmapData) -> Result<usize, TransformError> {
    let format = source.pixel_format();
    if let Some(encoding) = format.compact_encoding()
        && let Some(raw) = source.raw_pixels()
    {
        ctx.new_phase(Stage::GetColors, source.height() as usize);
        let row_bytes = format.row_bytes(source.width());
        let mut seen: BitVec = BitVec::repeat(false, 1 << encoding.value_bits);
        #[cfg(feature = "parallel")]
        if ctx.max_degree_of_parallelism() > 1 {
            return count_raw_parallel(ctx, raw, row_bytes, encoding, &mut seen);
        }
        let mut count = 0;
        for row in raw.chunks_exact(row_bytes) {
            ctx.check()?;
            for pixel in row.chunks_exact(encoding.bytes) {
                if !seen.replace(raw_value(pixel, encoding), true) {
                    count += 1;
                }
            }
            ctx.increment();
        }
        return Ok(count);
    }
    Ok(colors(ctx, source, usize::MAX, true)?.len())
}

/// Little-endian raw value; hidden colors of transparent pixels read as 0.
fn raw_value(pixel: &[u8], encoding: CompactEncoding) -> usize {
    let value = pixel
        .iter()
        .rev()
        .fold(0usize, |acc, &b| acc << 8 | b as usize);
    match encoding.opaque_bit {
        Some(bit) if value & (1 << bit) == 0 => 0,
        _ => value,
    }
}

/// Decode batches of rows on the rayon pool, at most one task per allowed
/// worker at a time, and merge the values found into `seen`.
#[cfg(feature = "parallel")]
fn count_raw_parallel(
    ctx: &Context<'_>,
    raw: &[u8],
    row_bytes: usize,
    encoding: CompactEncoding,
    seen: &mut BitVec,
) -> Result<usize, TransformError> {
    use rayon::prelude::*;

    let workers = ctx.max_degree_of_parallelism();
    let task_bytes = row_bytes * ROWS_PER_TASK;
    log::debug!("counting colors of {} rows on up to {workers} workers", raw.len() / row_bytes);
    let mut count = 0;
    for batch in raw.chunks(task_bytes * workers) {
        // the stop token and progress sink stay on this thread
        ctx.check()?;
        let found: Vec<Vec<usize>> = batch
            .par_chunks(task_bytes)
            .map(|rows| {
                let mut values: Vec<usize> = rows
                    .chunks_exact(row_bytes)
                    .flat_map(|row| row.chunks_exact(encoding.bytes))
                    .map(|pixel| raw_value(pixel, encoding))
                    .collect();
                values.sort_unstable();
                values.dedup();
                values
            })
            .collect();
        for value in found.into_iter().flatten() {
            if !seen.replace(value, true) {
                count += 1;
            }
        }
        for _ in 0..batch.len() / row_bytes {
            ctx.increment();
        }
    }
    Ok(count)
}
