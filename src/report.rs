//! Final report rendering.
//!
//! [`AnalysisReport`] is a read-only view over a finalized
//! [`StreamAggregate`](crate::StreamAggregate). Its `Display` impl emits one
//! metric per line as `Key: value` with fixed two-decimal precision, so two
//! runs over the same input produce byte-identical output and downstream
//! scripts can parse it with a line split.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde_json::{Value, json};

use crate::stats::FrameStats;

/// Aggregate HDR light-level statistics for one analyzed stream.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct AnalysisReport {
    /// Number of frames successfully unpacked and aggregated.
    pub frames: u64,
    /// Number of frames that failed to unpack (skip-malformed mode).
    pub failed_frames: u64,
    /// Maximum Content Light Level: brightest single pixel, in nits.
    pub max_cll: f64,
    /// Maximum Frame-Average Light Level: highest per-frame mean, in nits.
    pub max_fall: f64,
    /// Requested percentiles as `(percentile, nits)` pairs, in request order.
    pub percentiles: Vec<(f64, f64)>,
    /// Per-frame statistics in stream order; empty unless the analysis ran
    /// with [`with_frame_stats`](crate::AnalyzeOptions::with_frame_stats).
    pub frame_stats: Vec<FrameStats>,
    /// `true` when the run was aborted and this covers only the frames
    /// ingested before the abort.
    pub partial: bool,
}

/// Render a percentile for use in a report key: two decimals with trailing
/// zeros (and a bare trailing dot) trimmed, so `99.98` stays `99.98` and
/// `99.00` becomes `99`.
fn percentile_key(p: f64) -> String {
    let mut rendered = format!("{p:.2}");
    while rendered.ends_with('0') {
        rendered.pop();
    }
    if rendered.ends_with('.') {
        rendered.pop();
    }
    rendered
}

impl AnalysisReport {
    /// Render as a JSON value with the same keys as the text format.
    pub fn to_json(&self) -> Value {
        let percentiles: Vec<Value> = self
            .percentiles
            .iter()
            .map(|&(p, nits)| {
                json!({
                    "percentile": p,
                    "nits": (nits * 100.0).round() / 100.0,
                })
            })
            .collect();

        let mut payload = json!({
            "frames": self.frames,
            "failed_frames": self.failed_frames,
            "max_cll": (self.max_cll * 100.0).round() / 100.0,
            "max_fall": (self.max_fall * 100.0).round() / 100.0,
            "percentiles": percentiles,
            "partial": self.partial,
        });

        if !self.frame_stats.is_empty() {
            let timeline: Vec<Value> = self
                .frame_stats
                .iter()
                .map(|stats| {
                    json!({
                        "frame": stats.frame_index,
                        "max_nits": stats.max_nits,
                        "min_nits": stats.min_nits,
                        "avg_nits": stats.avg_nits,
                        "pts_seconds": stats.pts_seconds,
                    })
                })
                .collect();
            payload["frame_timeline"] = Value::Array(timeline);
        }

        payload
    }
}

impl Display for AnalysisReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "Frames: {}", self.frames)?;
        writeln!(f, "FailedFrames: {}", self.failed_frames)?;
        writeln!(f, "MaxCLL: {:.2}", self.max_cll)?;
        writeln!(f, "MaxFALL: {:.2}", self.max_fall)?;
        for &(p, nits) in &self.percentiles {
            writeln!(f, "Percentile{}: {nits:.2}", percentile_key(p))?;
        }
        if self.partial {
            writeln!(f, "Partial: true")?;
        }
        Ok(())
    }
}
