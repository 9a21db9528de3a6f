//! Bounded-memory luminance distribution sketch.
//!
//! [`LuminanceHistogram`] is the stream-wide percentile estimator: a fixed
//! array of buckets spanning the PQ signal range `[0, 1]`. Bucketing in the
//! PQ (perceptually uniform) domain gives fine resolution near black and
//! coarse resolution near peak, matching how HDR luminance is distributed.
//!
//! The sketch is mergeable — merging is plain element-wise count addition, so
//! it is associative and commutative and the final report cannot depend on
//! the order frames were unpacked in. Memory is `BUCKETS * 8` bytes
//! regardless of stream length.
//!
//! Percentiles use the nearest-rank convention over cumulative bucket counts;
//! the reported value is the matching bucket's midpoint (in the PQ domain)
//! converted back to nits. The estimation error is therefore bounded by one
//! bucket width, `1 / 4096` of the PQ signal range.

use crate::error::HdrMeterError;
use crate::transfer::{pq_eotf, pq_inverse_eotf};

/// Number of histogram buckets over the PQ signal range.
pub const BUCKETS: usize = 4096;

/// A fixed-bucket luminance histogram in the PQ signal domain.
#[derive(Debug, Clone)]
pub struct LuminanceHistogram {
    counts: Box<[u64; BUCKETS]>,
    total: u64,
}

impl Default for LuminanceHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LuminanceHistogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        LuminanceHistogram {
            counts: Box::new([0u64; BUCKETS]),
            total: 0,
        }
    }

    /// Bucket index for a luminance in nits.
    #[inline]
    fn bucket_of(nits: f32) -> usize {
        let signal = pq_inverse_eotf(nits);
        ((signal * BUCKETS as f32) as usize).min(BUCKETS - 1)
    }

    /// Record one pixel's luminance (nits).
    #[inline]
    pub fn record(&mut self, nits: f32) {
        self.counts[Self::bucket_of(nits)] += 1;
        self.total += 1;
    }

    /// Record a slice of pixel luminances (nits).
    pub fn record_all(&mut self, samples: &[f32]) {
        for &nits in samples {
            self.counts[Self::bucket_of(nits)] += 1;
        }
        self.total += samples.len() as u64;
    }

    /// Merge another histogram's counts into this one.
    ///
    /// Element-wise addition: associative, commutative, and loss-free.
    pub fn merge(&mut self, other: &LuminanceHistogram) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
        self.total += other.total;
    }

    /// Total number of recorded samples.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whether any samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Estimate the `p`-th percentile luminance in nits (nearest rank).
    ///
    /// Returns `0.0` for an empty histogram.
    ///
    /// # Errors
    ///
    /// Returns [`HdrMeterError::InvalidPercentile`] if `p` is not in
    /// `(0, 100]`.
    pub fn percentile(&self, p: f64) -> Result<f32, HdrMeterError> {
        if !(p > 0.0 && p <= 100.0) {
            return Err(HdrMeterError::InvalidPercentile(p));
        }
        if self.total == 0 {
            return Ok(0.0);
        }

        // Nearest rank: the smallest rank r with r >= ceil(p/100 * total).
        let rank = ((p / 100.0) * self.total as f64).ceil() as u64;
        let rank = rank.max(1);

        let mut cumulative = 0u64;
        for (index, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= rank {
                let midpoint_signal = (index as f32 + 0.5) / BUCKETS as f32;
                return Ok(pq_eotf(midpoint_signal));
            }
        }

        // Unreachable while total equals the sum of counts; fall back to peak.
        Ok(pq_eotf(1.0))
    }
}
