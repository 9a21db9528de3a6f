//! Per-frame statistics computation.
//!
//! Consumes the linear-light luminance samples produced by
//! [`unpack_frame`](crate::unpack::unpack_frame) and reduces them to a
//! [`FrameRecord`]: scalar max/min/average plus the frame's contribution to
//! the stream-wide percentile histogram. The reduction is a single parallel
//! pass — samples are chunked across rayon workers, each chunk folds to
//! `(max, min, sum, histogram)`, and the partials combine with
//! `max`/`min`/`+`/merge.

use rayon::prelude::*;

use crate::histogram::LuminanceHistogram;

/// Scalar summary of one frame, in nits.
///
/// Immutable once computed; consumed exactly once by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Zero-based index of the frame in decode order.
    pub frame_index: u64,
    /// Brightest pixel in the frame.
    pub max_nits: f32,
    /// Darkest pixel in the frame.
    pub min_nits: f32,
    /// Arithmetic mean over all pixels.
    pub avg_nits: f32,
    /// Presentation timestamp in seconds, if the stream declared one.
    pub pts_seconds: Option<f64>,
}

/// One frame's full contribution to the stream aggregate: scalar stats plus
/// its slice of the percentile histogram.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Scalar summary.
    pub stats: FrameStats,
    /// Histogram of this frame's pixel luminances.
    pub histogram: LuminanceHistogram,
}

impl FrameRecord {
    /// Reduce a frame's luminance samples (nits, scan order) to a record.
    ///
    /// Order of the samples does not affect the result; max, sum, and
    /// histogram counts are all order-invariant.
    pub fn compute(frame_index: u64, pts_seconds: Option<f64>, luminance: &[f32]) -> Self {
        if luminance.is_empty() {
            return FrameRecord {
                stats: FrameStats {
                    frame_index,
                    max_nits: 0.0,
                    min_nits: 0.0,
                    avg_nits: 0.0,
                    pts_seconds,
                },
                histogram: LuminanceHistogram::new(),
            };
        }

        let workers = rayon::current_num_threads().max(1);
        let chunk_size = luminance.len().div_ceil(workers);

        let (max_nits, min_nits, sum, histogram) = luminance
            .par_chunks(chunk_size)
            .map(|chunk| {
                let mut chunk_max = 0.0f32;
                let mut chunk_min = f32::INFINITY;
                let mut chunk_sum = 0.0f64;
                let mut chunk_histogram = LuminanceHistogram::new();
                for &nits in chunk {
                    if nits > chunk_max {
                        chunk_max = nits;
                    }
                    if nits < chunk_min {
                        chunk_min = nits;
                    }
                    chunk_sum += nits as f64;
                }
                chunk_histogram.record_all(chunk);
                (chunk_max, chunk_min, chunk_sum, chunk_histogram)
            })
            .reduce(
                || (0.0f32, f32::INFINITY, 0.0f64, LuminanceHistogram::new()),
                |(max_a, min_a, sum_a, mut hist_a), (max_b, min_b, sum_b, hist_b)| {
                    hist_a.merge(&hist_b);
                    (max_a.max(max_b), min_a.min(min_b), sum_a + sum_b, hist_a)
                },
            );

        let avg_nits = (sum / luminance.len() as f64) as f32;
        // The identity element is infinite; samples always bound it.
        let min_nits = if min_nits.is_finite() { min_nits } else { 0.0 };

        FrameRecord {
            stats: FrameStats {
                frame_index,
                max_nits,
                min_nits,
                avg_nits,
                pts_seconds,
            },
            histogram,
        }
    }
}
