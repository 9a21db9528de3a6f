//! # hdrmeter
//!
//! Measure HDR light levels of video streams — MaxCLL, MaxFALL, and
//! percentile luminance — by decoding through FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate and analyzing
//! frames in their native HDR representation (PQ or HLG transfer, wide
//! gamut).
//!
//! ## Quick Start
//!
//! ```no_run
//! use hdrmeter::HdrAnalyzer;
//!
//! let report = HdrAnalyzer::new().analyze("input.mkv").unwrap();
//! print!("{report}");
//! // Frames: 1440
//! // FailedFrames: 0
//! // MaxCLL: 998.12
//! // MaxFALL: 402.31
//! // Percentile99.98: 950.00
//! ```
//!
//! ### Override absent signaling
//!
//! Streams without declared color metadata are never guessed at; pass
//! explicit assumptions instead:
//!
//! ```no_run
//! use hdrmeter::{AnalyzeOptions, HdrAnalyzer, MatrixCoefficients, TransferFunction};
//!
//! let options = AnalyzeOptions::new()
//!     .with_assumed_transfer(TransferFunction::Pq)
//!     .with_assumed_matrix(MatrixCoefficients::Bt2020Ncl);
//! let report = HdrAnalyzer::with_options(options).analyze("untagged.mp4").unwrap();
//! ```
//!
//! ### Inspect signaling before a full pass
//!
//! ```no_run
//! use hdrmeter::{MediaSource, check_signaling};
//!
//! let info = MediaSource::probe("input.mkv").unwrap();
//! print!("{}", check_signaling(&info));
//! ```
//!
//! ## How it works
//!
//! A single forward pipeline: the [`MediaSource`] frame iterator pulls
//! decoded frames lazily; batches of frames are unpacked to linear-light
//! luminance across the rayon thread pool; per-frame statistics are
//! re-sequenced and ingested into a [`StreamAggregate`] in strict stream
//! order; the finalized aggregate renders as an [`AnalysisReport`].
//! Memory is bounded regardless of stream length — percentiles come from a
//! fixed-size histogram in the PQ signal domain, never from retained pixels.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod aggregate;
pub mod analyzer;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod options;
pub mod progress;
pub mod report;
pub mod signaling;
pub mod source;
pub mod stats;
pub mod timeline;
pub mod transfer;
pub mod unpack;

pub use aggregate::StreamAggregate;
pub use analyzer::HdrAnalyzer;
pub use error::HdrMeterError;
pub use frame::{
    ColorPrimaries, ColorRange, DecodedFrame, MatrixCoefficients, PixelLayout, Plane,
    TransferFunction,
};
pub use histogram::LuminanceHistogram;
pub use options::{AnalyzeOptions, DEFAULT_PERCENTILE};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use report::AnalysisReport;
pub use signaling::{SignalingReport, check_signaling};
pub use source::{FrameIterator, MediaSource, StreamInfo};
pub use stats::{FrameRecord, FrameStats};
pub use timeline::render_timeline;
pub use unpack::{UnpackPolicy, unpack_frame};
