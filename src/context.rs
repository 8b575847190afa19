//! Cooperative execution context.
//!
//! Every operation runs under a [`Context`]: a polled [`Stop`] token, an
//! optional [`Progress`] sink and the policy for reporting cancellation.
//! The engine checks the token before every row and before initializing
//! a quantizer or ditherer; nothing is checked mid-row.
//!
//! Paths that only read raw bytes may spread row batches over up to
//! [`Context::max_degree_of_parallelism`] rayon workers when the
//! `parallel` feature is enabled. The token is then polled on the calling
//! thread between batches.

use core::fmt;

use enough::{Stop, Unstoppable};

use crate::error::TransformError;

/// Named phase of an operation, reported to [`Progress`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Stage {
    /// Cloning a region into a new bitmap.
    Clone,
    /// Copying pixels without blending.
    Copy,
    /// Blending pixels onto a target.
    Draw,
    /// Combining two sources.
    Combine,
    /// Resampling into a differently sized region.
    Resize,
    /// Initializing a quantizing session.
    InitializingQuantizer,
    /// Initializing a dithering session.
    InitializingDitherer,
    /// Enumerating or counting colors.
    GetColors,
}

/// Receives progress notifications.
///
/// Implementations use interior mutability; the engine only holds a
/// shared reference.
pub trait Progress {
    /// A new phase starts with `maximum` steps.
    fn new_phase(&self, stage: Stage, maximum: usize);

    /// One step of the current phase is done.
    fn increment(&self);
}

/// Execution context of one operation.
///
/// ```
/// use zenblit::{Context, Unstoppable};
///
/// let ctx = Context::new().with_stop(&Unstoppable).with_cancel_as_error(true);
/// assert!(ctx.cancel_as_error());
/// ```
#[derive(Clone, Copy)]
pub struct Context<'a> {
    stop: &'a dyn Stop,
    progress: Option<&'a dyn Progress>,
    cancel_as_error: bool,
    max_degree_of_parallelism: usize,
}

impl Default for Context<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Context<'a> {
    /// A context that never stops and reports no progress.
    pub fn new() -> Self {
        Self {
            stop: &Unstoppable,
            progress: None,
            cancel_as_error: false,
            max_degree_of_parallelism: 1,
        }
    }

    /// Set the cancellation token.
    pub fn with_stop(mut self, stop: &'a dyn Stop) -> Self {
        self.stop = stop;
        self
    }

    /// Set the progress sink.
    pub fn with_progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Report cancellation as [`TransformError::Canceled`] instead of the
    /// operation's "no result" value.
    pub fn with_cancel_as_error(mut self, enabled: bool) -> Self {
        self.cancel_as_error = enabled;
        self
    }

    /// Allow up to `workers` threads per operation. 0 and 1 keep every row
    /// on the calling thread.
    pub fn with_max_degree_of_parallelism(mut self, workers: usize) -> Self {
        self.max_degree_of_parallelism = workers.max(1);
        self
    }

    /// The cancellation token.
    pub fn stop(&self) -> &'a dyn Stop {
        self.stop
    }

    /// Whether cancellation is reported as an error.
    pub fn cancel_as_error(&self) -> bool {
        self.cancel_as_error
    }

    /// Most worker threads an operation may use, at least 1.
    pub fn max_degree_of_parallelism(&self) -> usize {
        self.max_degree_of_parallelism
    }

    /// Poll the stop token.
    #[inline]
    pub(crate) fn check(&self) -> Result<(), TransformError> {
        self.stop.check().map_err(TransformError::from)
    }

    pub(crate) fn new_phase(&self, stage: Stage, maximum: usize) {
        if let Some(progress) = self.progress {
            progress.new_phase(stage, maximum);
        }
    }

    #[inline]
    pub(crate) fn increment(&self) {
        if let Some(progress) = self.progress {
            progress.increment();
        }
    }

    /// Convert an internal cancellation into the caller-visible outcome.
    pub(crate) fn finish<T>(
        &self,
        result: Result<T, TransformError>,
        canceled: impl FnOnce() -> T,
    ) -> Result<T, TransformError> {
        match result {
            Err(TransformError::Canceled) if !self.cancel_as_error => {
                log::debug!("operation canceled");
                Ok(canceled())
            }
            other => other,
        }
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("progress", &self.progress.is_some())
            .field("cancel_as_error", &self.cancel_as_error)
            .field("max_degree_of_parallelism", &self.max_degree_of_parallelism)
            .finish_non_exhaustive()
    }
}
