//! Stream-wide statistics aggregation.
//!
//! [`StreamAggregate`] is the single mutable accumulator of the pipeline. The
//! driver owns it and feeds it one [`FrameRecord`] per frame, strictly in
//! stream order. All updates are monotone (max, count, histogram-count
//! addition), so the aggregate never needs to look back at earlier frames and
//! memory stays constant for any stream length.
//!
//! `finalize` closes the aggregate; a later `ingest` is a driver bug and
//! fails with [`HdrMeterError::AggregatorClosed`]. For cancelled or aborted
//! runs, [`partial_report`](StreamAggregate::partial_report) snapshots a
//! best-effort report without closing.

use crate::error::HdrMeterError;
use crate::histogram::LuminanceHistogram;
use crate::report::AnalysisReport;
use crate::stats::FrameRecord;

/// Running aggregate over all frames ingested so far.
#[derive(Debug, Clone, Default)]
pub struct StreamAggregate {
    max_cll: f32,
    max_fall: f32,
    frame_count: u64,
    failed_count: u64,
    histogram: LuminanceHistogram,
    closed: bool,
}

impl StreamAggregate {
    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one frame's record, in stream order.
    ///
    /// # Errors
    ///
    /// Returns [`HdrMeterError::AggregatorClosed`] if called after
    /// [`finalize`](Self::finalize).
    pub fn ingest(&mut self, record: &FrameRecord) -> Result<(), HdrMeterError> {
        if self.closed {
            return Err(HdrMeterError::AggregatorClosed);
        }

        self.max_cll = self.max_cll.max(record.stats.max_nits);
        self.max_fall = self.max_fall.max(record.stats.avg_nits);
        self.histogram.merge(&record.histogram);
        self.frame_count += 1;

        log::trace!(
            "frame {}: max={:.2} avg={:.2} (running MaxCLL={:.2} MaxFALL={:.2})",
            record.stats.frame_index,
            record.stats.max_nits,
            record.stats.avg_nits,
            self.max_cll,
            self.max_fall,
        );

        Ok(())
    }

    /// Count a frame that failed to unpack (skip-malformed mode).
    ///
    /// Failed frames never contribute zero-luminance samples; they are
    /// surfaced as an explicit count in the report instead.
    pub fn record_failure(&mut self, frame_index: u64) {
        log::warn!("frame {frame_index} failed to unpack; recorded as error");
        self.failed_count += 1;
    }

    /// Number of successfully ingested frames.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Number of frames recorded as failures.
    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    /// Close the aggregate and produce the final report.
    ///
    /// Callable at most once; the aggregate rejects further ingestion
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HdrMeterError::AggregatorClosed`] on a second call, and
    /// [`HdrMeterError::InvalidPercentile`] if a requested percentile is
    /// outside `(0, 100]`.
    pub fn finalize(&mut self, percentiles: &[f64]) -> Result<AnalysisReport, HdrMeterError> {
        if self.closed {
            return Err(HdrMeterError::AggregatorClosed);
        }
        self.closed = true;
        self.build_report(percentiles, false)
    }

    /// Snapshot a best-effort report over the frames ingested so far,
    /// marked as partial. Does not close the aggregate.
    pub fn partial_report(&self, percentiles: &[f64]) -> Result<AnalysisReport, HdrMeterError> {
        self.build_report(percentiles, true)
    }

    fn build_report(
        &self,
        percentiles: &[f64],
        partial: bool,
    ) -> Result<AnalysisReport, HdrMeterError> {
        let mut percentile_values = Vec::with_capacity(percentiles.len());
        for &p in percentiles {
            percentile_values.push((p, self.histogram.percentile(p)? as f64));
        }

        Ok(AnalysisReport {
            frames: self.frame_count,
            failed_frames: self.failed_count,
            max_cll: self.max_cll as f64,
            max_fall: self.max_fall as f64,
            percentiles: percentile_values,
            frame_stats: Vec::new(),
            partial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::FrameRecord;

    fn record_for(frame_index: u64, samples: &[f32]) -> FrameRecord {
        FrameRecord::compute(frame_index, None, samples)
    }

    #[test]
    fn constant_stream_pins_both_maxima() {
        let mut aggregate = StreamAggregate::new();
        for frame in 0..20 {
            aggregate
                .ingest(&record_for(frame, &[412.5; 64]))
                .unwrap();
        }
        let report = aggregate.finalize(&[]).unwrap();
        assert!((report.max_cll - 412.5).abs() < 1e-3);
        assert!((report.max_fall - 412.5).abs() < 1e-3);
        assert_eq!(report.frames, 20);
        assert!(!report.partial);
    }

    #[test]
    fn running_max_is_non_decreasing() {
        let mut aggregate = StreamAggregate::new();
        let mut previous = 0.0;
        for (frame, peak) in [100.0f32, 900.0, 50.0, 700.0].iter().enumerate() {
            aggregate
                .ingest(&record_for(frame as u64, &[*peak, 0.0, 0.0, 0.0]))
                .unwrap();
            let snapshot = aggregate.partial_report(&[]).unwrap();
            assert!(snapshot.max_cll >= previous);
            previous = snapshot.max_cll;
        }
        let report = aggregate.finalize(&[]).unwrap();
        assert_eq!(report.max_cll, 900.0);
    }

    #[test]
    fn max_fall_tracks_frame_averages_not_pixels() {
        let mut aggregate = StreamAggregate::new();
        // One bright pixel in a dark frame: MaxCLL high, MaxFALL low.
        let mut samples = vec![0.0f32; 100];
        samples[0] = 4000.0;
        aggregate.ingest(&record_for(0, &samples)).unwrap();
        let report = aggregate.finalize(&[]).unwrap();
        assert_eq!(report.max_cll, 4000.0);
        assert!((report.max_fall - 40.0).abs() < 1e-2);
    }

    #[test]
    fn ingest_after_finalize_fails() {
        let mut aggregate = StreamAggregate::new();
        aggregate.ingest(&record_for(0, &[1.0])).unwrap();
        aggregate.finalize(&[]).unwrap();
        assert!(matches!(
            aggregate.ingest(&record_for(1, &[1.0])),
            Err(HdrMeterError::AggregatorClosed)
        ));
        assert!(matches!(
            aggregate.finalize(&[]),
            Err(HdrMeterError::AggregatorClosed)
        ));
    }

    #[test]
    fn failures_are_counted_not_zeroed() {
        let mut aggregate = StreamAggregate::new();
        aggregate.ingest(&record_for(0, &[500.0; 16])).unwrap();
        aggregate.record_failure(1);
        aggregate.ingest(&record_for(2, &[500.0; 16])).unwrap();
        let report = aggregate.finalize(&[]).unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.failed_frames, 1);
        // The failed frame must not have dragged the average toward zero.
        assert!((report.max_fall - 500.0).abs() < 1e-3);
    }

    #[test]
    fn partial_report_is_marked_and_does_not_close() {
        let mut aggregate = StreamAggregate::new();
        aggregate.ingest(&record_for(0, &[10.0])).unwrap();
        let partial = aggregate.partial_report(&[99.0]).unwrap();
        assert!(partial.partial);
        // Still ingestable afterwards.
        aggregate.ingest(&record_for(1, &[20.0])).unwrap();
        let report = aggregate.finalize(&[99.0]).unwrap();
        assert_eq!(report.frames, 2);
    }
}
