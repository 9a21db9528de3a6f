//! Analysis configuration.
//!
//! [`AnalyzeOptions`] is a builder that threads percentile requests, color
//! signaling overrides, progress callbacks, and cancellation tokens through
//! [`HdrAnalyzer`](crate::HdrAnalyzer) without polluting every function
//! signature.
//!
//! # Example
//!
//! ```no_run
//! use hdrmeter::{AnalyzeOptions, CancellationToken, TransferFunction};
//!
//! let token = CancellationToken::new();
//! let options = AnalyzeOptions::new()
//!     .with_percentiles(vec![99.98, 99.0])
//!     .with_assumed_transfer(TransferFunction::Pq)
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::frame::{MatrixCoefficients, TransferFunction};
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::unpack::UnpackPolicy;

/// The percentile reported by default, matching the common HDR
/// content-light-level convention.
pub const DEFAULT_PERCENTILE: f64 = 99.98;

/// Configuration for an analysis run.
#[derive(Clone)]
pub struct AnalyzeOptions {
    /// Percentiles to report, in `(0, 100]`.
    pub(crate) percentiles: Vec<f64>,
    /// Transfer function to assume for streams that declare none.
    pub(crate) assume_transfer: Option<TransferFunction>,
    /// Matrix coefficients to assume for streams that declare none.
    pub(crate) assume_matrix: Option<MatrixCoefficients>,
    /// When `true`, frames that fail to unpack are counted and skipped
    /// instead of aborting the run.
    pub(crate) skip_malformed: bool,
    /// Frames pulled per parallel unpack batch. `None` sizes the batch to
    /// the rayon thread pool.
    pub(crate) batch_size: Option<usize>,
    /// When `true`, per-frame statistics are retained on the report (for
    /// timeline rendering); memory then grows with stream length.
    pub(crate) keep_frame_stats: bool,
    /// Progress observer.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cooperative cancellation token.
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            percentiles: vec![DEFAULT_PERCENTILE],
            assume_transfer: None,
            assume_matrix: None,
            skip_malformed: false,
            batch_size: None,
            keep_frame_stats: false,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }
}

impl Debug for AnalyzeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalyzeOptions")
            .field("percentiles", &self.percentiles)
            .field("assume_transfer", &self.assume_transfer)
            .field("assume_matrix", &self.assume_matrix)
            .field("skip_malformed", &self.skip_malformed)
            .field("batch_size", &self.batch_size)
            .field("keep_frame_stats", &self.keep_frame_stats)
            .field("cancellation", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}

impl AnalyzeOptions {
    /// Create options with defaults: the 99.98th percentile, no overrides,
    /// malformed frames fatal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the percentiles to report. Order is preserved in the report.
    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = percentiles;
        self
    }

    /// Assume this transfer function when the stream declares none.
    ///
    /// Without an override, undeclared transfer signaling aborts the run —
    /// see [`HdrMeterError::UnknownColorMetadata`](crate::HdrMeterError).
    pub fn with_assumed_transfer(mut self, transfer: TransferFunction) -> Self {
        self.assume_transfer = Some(transfer);
        self
    }

    /// Assume these matrix coefficients when the stream declares none.
    pub fn with_assumed_matrix(mut self, matrix: MatrixCoefficients) -> Self {
        self.assume_matrix = Some(matrix);
        self
    }

    /// Count and skip frames that fail to unpack instead of aborting.
    ///
    /// Skipped frames are reported as `FailedFrames`, never as
    /// zero-luminance samples.
    pub fn with_skip_malformed(mut self, skip: bool) -> Self {
        self.skip_malformed = skip;
        self
    }

    /// Set how many frames each parallel unpack batch pulls.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    /// Retain per-frame statistics on the report.
    ///
    /// Required by [`render_timeline`](crate::timeline::render_timeline) and
    /// the per-frame JSON output. Memory grows linearly with stream length
    /// while set, so it is off by default.
    pub fn with_frame_stats(mut self, keep: bool) -> Self {
        self.keep_frame_stats = keep;
        self
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Whether cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// The unpacking policy implied by these options.
    pub(crate) fn unpack_policy(&self) -> UnpackPolicy {
        UnpackPolicy {
            assume_transfer: self.assume_transfer,
            assume_matrix: self.assume_matrix,
        }
    }
}
