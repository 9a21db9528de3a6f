//! Per-frame luminance timeline chart.
//!
//! [`render_timeline`] draws the per-frame maximum, average, and minimum
//! luminance as stacked area series over frame index — a quick visual answer
//! to "where are the bright scenes". Frame statistics are only retained when
//! [`AnalyzeOptions::with_frame_stats`](crate::AnalyzeOptions::with_frame_stats)
//! is set; without it the pipeline keeps its bounded-memory behavior and
//! there is nothing to render.
//!
//! Charts deliberately carry no text (no captions, no axis labels) so
//! rendering never depends on system fonts.

use std::path::Path;

use plotters::prelude::*;

use crate::error::HdrMeterError;
use crate::stats::FrameStats;

const CHART_WIDTH: u32 = 1920;
const CHART_HEIGHT: u32 = 1080;

fn render_error(path: &Path, reason: impl ToString) -> HdrMeterError {
    HdrMeterError::TimelineRender {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Render per-frame luminance statistics as a PNG chart.
///
/// Series: max (red), average (blue), min (green), in nits over frame index.
///
/// # Errors
///
/// Returns [`HdrMeterError::TimelineRender`] when `frame_stats` is empty or
/// the image cannot be drawn or written.
pub fn render_timeline<P: AsRef<Path>>(
    frame_stats: &[FrameStats],
    path: P,
) -> Result<(), HdrMeterError> {
    let path = path.as_ref();

    if frame_stats.is_empty() {
        return Err(render_error(path, "no frame statistics were collected"));
    }

    let peak = frame_stats
        .iter()
        .map(|stats| stats.max_nits)
        .fold(0.0f32, f32::max);
    let ceiling = (peak as f64 * 1.1).max(1.0);

    let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|error| render_error(path, error))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(16)
        .build_cartesian_2d(0..frame_stats.len(), 0.0..ceiling)
        .map_err(|error| render_error(path, error))?;

    let series: [(RGBColor, fn(&FrameStats) -> f64); 3] = [
        (RED, |stats| stats.max_nits as f64),
        (BLUE, |stats| stats.avg_nits as f64),
        (GREEN, |stats| stats.min_nits as f64),
    ];
    for (color, value) in series {
        chart
            .draw_series(
                AreaSeries::new(
                    (0..).zip(frame_stats.iter().map(value)),
                    0.0,
                    color.mix(0.2),
                )
                .border_style(color),
            )
            .map_err(|error| render_error(path, error))?;
    }

    root.present().map_err(|error| render_error(path, error))?;
    log::info!("Wrote timeline chart for {} frames to {}", frame_stats.len(), path.display());
    Ok(())
}
