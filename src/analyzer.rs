//! Analysis pipeline driver.
//!
//! [`HdrAnalyzer`] wires the stages together: pull decoded frames from a
//! [`MediaSource`], fan the unpack + per-frame statistics work out across the
//! rayon thread pool in fixed-size batches, then re-sequence and ingest the
//! results into the [`StreamAggregate`] in strict stream order. The ordering
//! guarantee lives on ingestion, not unpacking — workers may finish out of
//! order, but `collect` on an indexed parallel iterator restores batch order
//! before the aggregator sees anything, so parallelism can never change the
//! report.
//!
//! Cancellation is cooperative: the driver checks the token between batches
//! and, when tripped, finalizes a best-effort report marked as partial. With
//! skip-malformed mode enabled, a mid-stream decode failure likewise ends the
//! run with a partial report instead of an error.

use std::path::Path;

use rayon::prelude::*;

use crate::aggregate::StreamAggregate;
use crate::error::HdrMeterError;
use crate::frame::DecodedFrame;
use crate::options::AnalyzeOptions;
use crate::progress::ProgressTracker;
use crate::report::AnalysisReport;
use crate::source::MediaSource;
use crate::stats::{FrameRecord, FrameStats};
use crate::unpack::unpack_frame;

/// The analysis pipeline.
///
/// # Example
///
/// ```no_run
/// use hdrmeter::{AnalyzeOptions, HdrAnalyzer};
///
/// let analyzer = HdrAnalyzer::with_options(
///     AnalyzeOptions::new().with_percentiles(vec![99.98]),
/// );
/// let report = analyzer.analyze("input.mkv")?;
/// print!("{report}");
/// # Ok::<(), hdrmeter::HdrMeterError>(())
/// ```
#[derive(Debug, Default)]
pub struct HdrAnalyzer {
    options: AnalyzeOptions,
}

impl HdrAnalyzer {
    /// Create an analyzer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an analyzer with the given options.
    pub fn with_options(options: AnalyzeOptions) -> Self {
        Self { options }
    }

    /// Open `path` and analyze its best video stream end to end.
    ///
    /// # Errors
    ///
    /// Propagates open/decode/unpack errors per the configured policy; see
    /// [`analyze_source`](Self::analyze_source).
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport, HdrMeterError> {
        let mut source = MediaSource::open(path)?;
        self.analyze_source(&mut source)
    }

    /// Analyze an already-opened source.
    ///
    /// Consumes the source's read position; a fresh [`MediaSource`] is
    /// required to re-scan the same file.
    pub fn analyze_source(
        &self,
        source: &mut MediaSource,
    ) -> Result<AnalysisReport, HdrMeterError> {
        let total_hint = source.info().frame_count;
        let frames = source.frames()?;
        self.analyze_frames(frames, total_hint)
    }

    /// Run the unpack → statistics → aggregate pipeline over any frame
    /// sequence.
    ///
    /// This is the sequencing core behind [`analyze`](Self::analyze); it is
    /// public so synthetic streams can be analyzed without a media file.
    /// `total_hint` feeds progress percentage estimates and does not bound
    /// the stream.
    pub fn analyze_frames<I>(
        &self,
        frames: I,
        total_hint: Option<u64>,
    ) -> Result<AnalysisReport, HdrMeterError>
    where
        I: IntoIterator<Item = Result<DecodedFrame, HdrMeterError>>,
    {
        for &p in &self.options.percentiles {
            if !(p > 0.0 && p <= 100.0) {
                return Err(HdrMeterError::InvalidPercentile(p));
            }
        }

        let policy = self.options.unpack_policy();
        let batch_size = self
            .options
            .batch_size
            .unwrap_or_else(|| rayon::current_num_threads().max(1));

        let mut aggregate = StreamAggregate::new();
        let mut tracker = ProgressTracker::new(self.options.progress.clone(), total_hint);
        let mut frames = frames.into_iter();
        let mut frame_stats = Vec::new();
        let mut partial = false;

        log::debug!("Starting analysis (batch_size={batch_size}, total_hint={total_hint:?})");

        'stream: loop {
            if self.options.is_cancelled() {
                log::info!(
                    "Analysis cancelled after {} frames; reporting partial results",
                    aggregate.frame_count()
                );
                partial = true;
                break;
            }

            // Pull the next batch of decoded frames.
            let mut batch: Vec<DecodedFrame> = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match frames.next() {
                    Some(Ok(frame)) => batch.push(frame),
                    Some(Err(error)) => {
                        // Frames already pulled into this batch count toward
                        // "something to report"; otherwise the outcome would
                        // depend on the batch size.
                        if self.options.skip_malformed
                            && (!batch.is_empty() || aggregate.frame_count() > 0)
                        {
                            // Best-effort mode: keep what we have.
                            log::error!("Decode failed mid-stream: {error}; reporting partial results");
                            partial = true;
                            self.ingest_batch(&mut aggregate, &mut frame_stats, &batch, &policy)?;
                            tracker.advance(batch.len() as u64);
                            break 'stream;
                        }
                        return Err(error);
                    }
                    None => break,
                }
            }

            if batch.is_empty() {
                break;
            }

            let batch_len = batch.len();
            self.ingest_batch(&mut aggregate, &mut frame_stats, &batch, &policy)?;
            tracker.advance(batch_len as u64);

            if batch_len < batch_size {
                // Short batch means the iterator is exhausted.
                break;
            }
        }

        tracker.finish();

        let mut report = if partial {
            aggregate.partial_report(&self.options.percentiles)?
        } else {
            aggregate.finalize(&self.options.percentiles)?
        };
        report.frame_stats = frame_stats;

        log::info!(
            "Analysis {}: {} frames ({} failed), MaxCLL={:.2}, MaxFALL={:.2}",
            if report.partial { "aborted" } else { "complete" },
            report.frames,
            report.failed_frames,
            report.max_cll,
            report.max_fall,
        );

        Ok(report)
    }

    /// Unpack a batch in parallel, then ingest in stream order.
    fn ingest_batch(
        &self,
        aggregate: &mut StreamAggregate,
        frame_stats: &mut Vec<FrameStats>,
        batch: &[DecodedFrame],
        policy: &crate::unpack::UnpackPolicy,
    ) -> Result<(), HdrMeterError> {
        // Indexed parallel collect preserves batch order, which is the
        // sequencing barrier between the worker pool and the aggregator.
        let records: Vec<Result<FrameRecord, HdrMeterError>> = batch
            .par_iter()
            .map(|frame| {
                let luminance = unpack_frame(frame, policy)?;
                Ok(FrameRecord::compute(
                    frame.frame_index,
                    frame.pts_seconds,
                    &luminance,
                ))
            })
            .collect();

        for (frame, result) in batch.iter().zip(records) {
            match result {
                Ok(record) => {
                    aggregate.ingest(&record)?;
                    if self.options.keep_frame_stats {
                        frame_stats.push(record.stats);
                    }
                }
                Err(error) if self.options.skip_malformed => {
                    log::warn!("Skipping frame {}: {error}", frame.frame_index);
                    aggregate.record_failure(frame.frame_index);
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{
        ColorPrimaries, ColorRange, MatrixCoefficients, PixelLayout, Plane, TransferFunction,
    };
    use crate::transfer::pq_eotf;

    /// Full-range 10-bit grayscale PQ frame at a uniform code value.
    fn uniform_frame(frame_index: u64, code: u16) -> DecodedFrame {
        let (width, height) = (16u32, 9u32);
        let samples = vec![code; (width * height) as usize];
        DecodedFrame {
            frame_index,
            width,
            height,
            layout: PixelLayout::Gray,
            bit_depth: 10,
            range: ColorRange::Full,
            transfer: Some(TransferFunction::Pq),
            matrix: Some(MatrixCoefficients::Bt2020Ncl),
            primaries: Some(ColorPrimaries::Bt2020),
            pts_seconds: Some(frame_index as f64 / 24.0),
            planes: vec![Plane::from_u16(&samples, width as usize)],
        }
    }

    #[test]
    fn uniform_pq_ramp_reports_expected_maxima() {
        // Frame i carries normalized code i/10; MaxCLL and MaxFALL both land
        // on the brightest frame (9/10) through the PQ EOTF.
        let frames: Vec<_> = (0..10)
            .map(|index| Ok(uniform_frame(index, (index as f32 / 10.0 * 1023.0) as u16)))
            .collect();

        let analyzer = HdrAnalyzer::new();
        let report = analyzer.analyze_frames(frames, Some(10)).unwrap();

        let brightest_code = (9.0f32 / 10.0 * 1023.0) as u16;
        let expected = pq_eotf(brightest_code as f32 / 1023.0) as f64;
        assert_eq!(report.frames, 10);
        assert!((report.max_cll - expected).abs() < expected * 1e-5);
        assert!((report.max_fall - expected).abs() < expected * 1e-5);
        assert!(!report.partial);
    }

    #[test]
    fn constant_stream_is_exact() {
        let frames: Vec<_> = (0..25).map(|index| Ok(uniform_frame(index, 600))).collect();
        let report = HdrAnalyzer::new().analyze_frames(frames, None).unwrap();
        let expected = pq_eotf(600.0 / 1023.0) as f64;
        assert!((report.max_cll - expected).abs() < 1e-6 * expected.max(1.0));
        assert!((report.max_fall - expected).abs() < 1e-6 * expected.max(1.0));
    }

    #[test]
    fn batch_size_does_not_change_the_report() {
        let make_frames = || -> Vec<Result<DecodedFrame, HdrMeterError>> {
            (0..17)
                .map(|index| Ok(uniform_frame(index, 100 + index as u16 * 40)))
                .collect()
        };

        let reference = HdrAnalyzer::with_options(AnalyzeOptions::new().with_batch_size(1))
            .analyze_frames(make_frames(), None)
            .unwrap();
        for batch_size in [2, 5, 16, 64] {
            let report =
                HdrAnalyzer::with_options(AnalyzeOptions::new().with_batch_size(batch_size))
                    .analyze_frames(make_frames(), None)
                    .unwrap();
            assert_eq!(report, reference, "batch_size={batch_size}");
        }
    }

    #[test]
    fn undeclared_transfer_aborts_without_override() {
        let mut frame = uniform_frame(0, 512);
        frame.transfer = None;
        let result = HdrAnalyzer::new().analyze_frames(vec![Ok(frame)], None);
        assert!(matches!(
            result,
            Err(HdrMeterError::UnknownColorMetadata { .. })
        ));
    }

    #[test]
    fn skip_malformed_counts_failures() {
        let mut bad = uniform_frame(1, 512);
        bad.planes[0].data.truncate(4);
        let frames = vec![Ok(uniform_frame(0, 512)), Ok(bad), Ok(uniform_frame(2, 512))];

        let options = AnalyzeOptions::new().with_skip_malformed(true);
        let report = HdrAnalyzer::with_options(options)
            .analyze_frames(frames, None)
            .unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.failed_frames, 1);
    }

    #[test]
    fn malformed_frame_is_fatal_by_default() {
        let mut bad = uniform_frame(1, 512);
        bad.planes[0].data.truncate(4);
        let frames = vec![Ok(uniform_frame(0, 512)), Ok(bad)];
        let result = HdrAnalyzer::new().analyze_frames(frames, None);
        assert!(matches!(
            result,
            Err(HdrMeterError::FrameUnpack { frame_index: 1, .. })
        ));
    }

    #[test]
    fn cancellation_yields_partial_report() {
        let token = crate::CancellationToken::new();
        token.cancel();
        let frames: Vec<_> = (0..8).map(|index| Ok(uniform_frame(index, 512))).collect();
        let options = AnalyzeOptions::new().with_cancellation(token);
        let report = HdrAnalyzer::with_options(options)
            .analyze_frames(frames, None)
            .unwrap();
        assert!(report.partial);
        assert_eq!(report.frames, 0);
    }

    #[test]
    fn mid_stream_decode_error_is_fatal_without_skip() {
        let frames = vec![
            Ok(uniform_frame(0, 512)),
            Err(HdrMeterError::DecodeError("corrupt packet".into())),
        ];
        let result = HdrAnalyzer::new().analyze_frames(frames, None);
        assert!(matches!(result, Err(HdrMeterError::DecodeError(_))));
    }

    #[test]
    fn mid_stream_decode_error_with_skip_reports_partial() {
        let frames = vec![
            Ok(uniform_frame(0, 512)),
            Err(HdrMeterError::DecodeError("corrupt packet".into())),
        ];
        let options = AnalyzeOptions::new()
            .with_batch_size(1)
            .with_skip_malformed(true);
        let report = HdrAnalyzer::with_options(options)
            .analyze_frames(frames, None)
            .unwrap();
        assert!(report.partial);
        assert_eq!(report.frames, 1);
    }

    #[test]
    fn decode_error_with_skip_is_batch_size_independent() {
        // The good frame sits in the same batch as the failure; it must be
        // kept whether the batch holds one frame or the whole stream.
        let make_frames = || {
            vec![
                Ok(uniform_frame(0, 512)),
                Err(HdrMeterError::DecodeError("corrupt packet".into())),
            ]
        };

        let default_batch = HdrAnalyzer::with_options(AnalyzeOptions::new().with_skip_malformed(true))
            .analyze_frames(make_frames(), None)
            .unwrap();
        assert!(default_batch.partial);
        assert_eq!(default_batch.frames, 1);

        for batch_size in [1, 2, 64] {
            let report = HdrAnalyzer::with_options(
                AnalyzeOptions::new()
                    .with_skip_malformed(true)
                    .with_batch_size(batch_size),
            )
            .analyze_frames(make_frames(), None)
            .unwrap();
            assert_eq!(report, default_batch, "batch_size={batch_size}");
        }
    }

    #[test]
    fn decode_error_on_first_frame_is_fatal_even_with_skip() {
        let frames = vec![Err(HdrMeterError::DecodeError("corrupt header".into()))];
        let options = AnalyzeOptions::new().with_skip_malformed(true);
        let result = HdrAnalyzer::with_options(options).analyze_frames(frames, None);
        assert!(matches!(result, Err(HdrMeterError::DecodeError(_))));
    }

    #[test]
    fn frame_stats_are_retained_only_on_request() {
        let frames: Vec<_> = (0..6)
            .map(|index| Ok(uniform_frame(index, 200 + index as u16 * 50)))
            .collect();
        let report = HdrAnalyzer::new().analyze_frames(frames, None).unwrap();
        assert!(report.frame_stats.is_empty());

        let frames: Vec<_> = (0..6)
            .map(|index| Ok(uniform_frame(index, 200 + index as u16 * 50)))
            .collect();
        let options = AnalyzeOptions::new().with_frame_stats(true).with_batch_size(2);
        let report = HdrAnalyzer::with_options(options)
            .analyze_frames(frames, None)
            .unwrap();
        assert_eq!(report.frame_stats.len(), 6);
        // Stream order survives the parallel fan-out.
        for (position, stats) in report.frame_stats.iter().enumerate() {
            assert_eq!(stats.frame_index, position as u64);
            assert!(stats.min_nits <= stats.avg_nits);
            assert!(stats.avg_nits <= stats.max_nits);
        }
        // Uniform brightening ramp: per-frame maxima strictly increase.
        for pair in report.frame_stats.windows(2) {
            assert!(pair[0].max_nits < pair[1].max_nits);
        }
    }

    #[test]
    fn invalid_percentile_is_rejected_up_front() {
        let options = AnalyzeOptions::new().with_percentiles(vec![0.0]);
        let result = HdrAnalyzer::with_options(options).analyze_frames(Vec::new(), None);
        assert!(matches!(result, Err(HdrMeterError::InvalidPercentile(_))));
    }
}
