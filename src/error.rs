//! Error types for the `hdrmeter` crate.
//!
//! This module defines [`HdrMeterError`], the unified error type returned by
//! all fallible operations in the crate. Variants carry enough context to name
//! the failing file or frame without additional logging at the call site.

use std::path::PathBuf;

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `hdrmeter` operations.
///
/// Every public method that can fail returns `Result<T, HdrMeterError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HdrMeterError {
    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The decoder failed to produce a frame. Fatal; aborts the run.
    #[error("Failed to decode video frame: {0}")]
    DecodeError(String),

    /// The frame's color signaling is absent and no override was supplied.
    ///
    /// The pipeline never guesses a transfer function or matrix: assuming the
    /// wrong one would silently corrupt every downstream statistic. Callers
    /// that know the stream's encoding can set
    /// [`with_assumed_transfer`](crate::AnalyzeOptions::with_assumed_transfer)
    /// or [`with_assumed_matrix`](crate::AnalyzeOptions::with_assumed_matrix).
    #[error("Frame {frame_index} declares no {missing}; pass an explicit override to analyze it")]
    UnknownColorMetadata {
        /// Index of the frame that lacked the metadata.
        frame_index: u64,
        /// Which piece of signaling was missing (`"transfer function"`,
        /// `"matrix coefficients"`).
        missing: &'static str,
    },

    /// The declared transfer characteristic is not one the analyzer handles.
    #[error("Unsupported transfer function: {0}")]
    UnsupportedTransferFunction(String),

    /// The decoded pixel format cannot be unpacked.
    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// A single frame failed to unpack into linear samples.
    ///
    /// Fatal unless skip-malformed mode is enabled, in which case the failure
    /// is counted and surfaced in the final report.
    #[error("Failed to unpack frame {frame_index}: {reason}")]
    FrameUnpack {
        /// Index of the frame that failed.
        frame_index: u64,
        /// Underlying reason.
        reason: String,
    },

    /// `ingest` was called after `finalize`. A driver bug, never expected in
    /// correct operation.
    #[error("Aggregator is closed: ingest called after finalize")]
    AggregatorClosed,

    /// A requested percentile was outside `(0, 100]`.
    #[error("Invalid percentile: {0} (must be in (0, 100])")]
    InvalidPercentile(f64),

    /// The per-frame timeline chart could not be rendered.
    #[error("Failed to render timeline to {path}: {reason}")]
    TimelineRender {
        /// Output image path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

impl From<FfmpegError> for HdrMeterError {
    fn from(error: FfmpegError) -> Self {
        HdrMeterError::FfmpegError(error.to_string())
    }
}
