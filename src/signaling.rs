//! HDR signaling pre-flight checks.
//!
//! [`check_signaling`] inspects a stream's cached metadata and reports
//! whether a full analysis pass is likely to succeed and be meaningful —
//! before any frame is decoded. Errors name conditions that will make
//! [`HdrAnalyzer::analyze`](crate::HdrAnalyzer::analyze) fail without
//! overrides; warnings flag signaling that is legal but suspicious for HDR
//! content.
//!
//! # Example
//!
//! ```no_run
//! use hdrmeter::{MediaSource, check_signaling};
//!
//! let info = MediaSource::probe("input.mkv")?;
//! let report = check_signaling(&info);
//! if !report.is_analyzable() {
//!     for error in &report.errors {
//!         eprintln!("error: {error}");
//!     }
//! }
//! # Ok::<(), hdrmeter::HdrMeterError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::frame::TransferFunction;
use crate::source::StreamInfo;

/// Summary of a stream's HDR color signaling.
///
/// Produced by [`check_signaling`]. Errors predict analysis failure;
/// warnings do not.
#[derive(Debug, Clone, Default)]
pub struct SignalingReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Suspicious-but-analyzable signaling.
    pub warnings: Vec<String>,
    /// Conditions that will abort analysis without explicit overrides.
    pub errors: Vec<String>,
}

impl SignalingReport {
    /// Returns `true` if analysis should succeed without overrides.
    pub fn is_analyzable(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of findings (info + warnings + errors).
    pub fn finding_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for SignalingReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.finding_count() == 0 {
            writeln!(f, "No findings.")?;
        }
        Ok(())
    }
}

/// Run signaling checks on cached stream metadata. Does not decode frames.
pub fn check_signaling(info: &StreamInfo) -> SignalingReport {
    let mut report = SignalingReport::default();

    if info.width == 0 || info.height == 0 {
        report.errors.push(format!(
            "Invalid video dimensions: {}x{}",
            info.width, info.height,
        ));
    }

    report.info.push(format!(
        "Video: {} {}x{} {} @ {:.2} fps",
        info.codec, info.width, info.height, info.pixel_format, info.frames_per_second,
    ));

    // ── Pixel format ───────────────────────────────────────────────
    match (info.layout, info.bit_depth) {
        (Some(layout), Some(bit_depth)) => {
            if bit_depth < 10 {
                report.warnings.push(format!(
                    "Bit depth is {bit_depth}; HDR content is normally 10-bit or deeper",
                ));
            }
            report
                .info
                .push(format!("Layout: {layout:?}, {bit_depth}-bit"));
        }
        _ => {
            report.errors.push(format!(
                "Pixel format {} is not supported by the unpacker",
                info.pixel_format,
            ));
        }
    }

    // ── Transfer characteristic ────────────────────────────────────
    match (info.transfer, &info.transfer_name) {
        (Some(transfer), _) => {
            report
                .info
                .push(format!("Transfer: {} (peak {:.0} nits)", transfer.name(), transfer.peak_nits()));
            if transfer == TransferFunction::Hlg {
                report.info.push(
                    "HLG luminance is display-referred to a 1000-nit nominal peak".to_string(),
                );
            }
        }
        (None, Some(name)) => {
            report.errors.push(format!(
                "Declared transfer characteristic {name} is not an HDR transfer the analyzer handles",
            ));
        }
        (None, None) => {
            report.errors.push(
                "No transfer characteristic declared; analysis requires --assume-transfer"
                    .to_string(),
            );
        }
    }

    // ── Matrix coefficients ────────────────────────────────────────
    match (info.matrix, &info.matrix_name) {
        (Some(matrix), _) => {
            report.info.push(format!("Matrix: {}", matrix.name()));
        }
        (None, Some(name)) => {
            report.errors.push(format!(
                "Declared matrix coefficients {name} are not supported; analysis requires --assume-matrix",
            ));
        }
        (None, None) => {
            // Gray/RGB layouts may not need a matrix at all.
            report.warnings.push(
                "No matrix coefficients declared; Y'CbCr analysis requires --assume-matrix"
                    .to_string(),
            );
        }
    }

    // ── Primaries and range ────────────────────────────────────────
    match &info.primaries_name {
        Some(name) => {
            report.info.push(format!("Primaries: {name}"));
            if info.primaries.is_none() {
                report
                    .warnings
                    .push(format!("Primaries {name} are unusual for HDR content"));
            }
        }
        None => {
            report
                .warnings
                .push("No color primaries declared".to_string());
        }
    }

    if !info.range_declared {
        report.warnings.push(
            "No quantization range declared; assuming limited (video) range".to_string(),
        );
    }

    if info.frame_count.is_none() {
        report
            .info
            .push("Frame count unknown; progress percentages unavailable".to_string());
    }

    report
}
