//! Error type shared by all transform operations.

use core::fmt;

/// Errors from bitmap transform operations.
///
/// Cancellation is reported as [`TransformError::Canceled`] only when the
/// [`Context`](crate::Context) was built with
/// [`with_cancel_as_error(true)`](crate::Context::with_cancel_as_error).
/// Otherwise a canceled operation returns its explicit "no result" value
/// (`Ok(false)`, `Ok(None)`, an empty [`ColorSet`](crate::ColorSet)).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransformError {
    /// The operation was canceled through its stop token.
    Canceled,
    /// The requested region does not intersect the bitmap.
    EmptyRegion,
    /// Width or height is zero or exceeds `i32::MAX`.
    InvalidSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// A palette has no entries.
    EmptyPalette,
    /// A palette has more entries than the indexed format can address.
    PaletteTooLarge {
        /// Number of palette entries.
        entries: usize,
        /// Maximum for the pixel format.
        max: usize,
    },
    /// Data slice is too small for the given dimensions and stride.
    InsufficientData,
    /// Stride is smaller than the packed row size.
    StrideTooSmall,
    /// The pixel format does not support the requested operation.
    FormatMismatch,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => write!(f, "operation was canceled"),
            Self::EmptyRegion => write!(f, "region does not intersect the bitmap"),
            Self::InvalidSize { width, height } => {
                write!(f, "invalid bitmap size {width}x{height}")
            }
            Self::EmptyPalette => write!(f, "palette has no entries"),
            Self::PaletteTooLarge { entries, max } => {
                write!(f, "palette has {entries} entries, format allows at most {max}")
            }
            Self::InsufficientData => {
                write!(f, "data slice is too small for the given dimensions")
            }
            Self::StrideTooSmall => write!(f, "stride is smaller than the packed row size"),
            Self::FormatMismatch => write!(f, "pixel format does not support this operation"),
        }
    }
}

impl core::error::Error for TransformError {}

impl From<enough::StopReason> for TransformError {
    fn from(_: enough::StopReason) -> Self {
        Self::Canceled
    }
}
