//! Progress reporting and cancellation support.
//!
//! [`ProgressCallback`] lets callers observe a running analysis;
//! [`CancellationToken`] requests a cooperative abort. Cancelling mid-stream
//! is not an error path: the analyzer stops pulling frames and returns a
//! best-effort report marked as partial.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// A snapshot of analysis progress.
///
/// Delivered to [`ProgressCallback::on_progress`] once per ingested batch of
/// frames.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames ingested so far.
    pub frames_done: u64,
    /// Estimated total frame count, if the container declared one.
    pub total_frames: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total_frames` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the analysis started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
}

/// Trait for receiving progress updates during analysis.
///
/// Implementations must be [`Send`] and [`Sync`] — the analyzer may invoke
/// the callback from its driver thread while workers are unpacking.
///
/// Progress callbacks are infallible; they observe but cannot halt the run.
/// Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called once per ingested batch of frames.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation. The analyzer checks
/// [`is_cancelled`](CancellationToken::is_cancelled) between batches and
/// finishes with a partial report.
///
/// # Example
///
/// ```
/// use hdrmeter::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones of this token observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that tracks timing and emits progress callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total_frames: Option<u64>,
    frames_done: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total_frames: Option<u64>) -> Self {
        Self {
            callback,
            total_frames,
            frames_done: 0,
            start_time: Instant::now(),
        }
    }

    /// Record `count` completed frames and emit a progress report.
    pub(crate) fn advance(&mut self, count: u64) {
        self.frames_done += count;
        self.report();
    }

    /// Unconditionally emit a final progress report.
    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        let elapsed = self.start_time.elapsed();

        let percentage = self
            .total_frames
            .filter(|&total| total > 0)
            .map(|total| ((self.frames_done as f32 / total as f32) * 100.0).min(100.0));

        let estimated_remaining = if self.frames_done > 0 {
            self.total_frames.map(|total| {
                let remaining = total.saturating_sub(self.frames_done);
                let per_frame = elapsed / self.frames_done as u32;
                per_frame * remaining as u32
            })
        } else {
            None
        };

        self.callback.on_progress(&ProgressInfo {
            frames_done: self.frames_done,
            total_frames: self.total_frames,
            percentage,
            elapsed,
            estimated_remaining,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<(u64, Option<f32>)>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push((info.frames_done, info.percentage));
        }
    }

    #[test]
    fn cancellation_propagates_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn tracker_accumulates_and_caps_percentage() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut tracker = ProgressTracker::new(recorder.clone(), Some(10));
        tracker.advance(4);
        tracker.advance(8);
        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen[0], (4, Some(40.0)));
        // Overshooting the estimate never reports more than 100%.
        assert_eq!(seen[1], (12, Some(100.0)));
    }
}
