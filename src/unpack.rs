//! Sample unpacking: decoded planes to linear-light luminance.
//!
//! [`unpack_frame`] converts one [`DecodedFrame`] into a dense `Vec<f32>` of
//! per-pixel luminance values in nits, in scan order (row-major, top-to-bottom,
//! left-to-right). The steps:
//!
//! 1. Normalize integer codes to `[0, 1]` per the frame's bit depth, honoring
//!    limited-range vs full-range signaling.
//! 2. For Y'CbCr, upsample chroma to luma resolution (nearest neighbor) and
//!    convert to R'G'B' with the frame's declared matrix coefficients.
//! 3. Apply the inverse transfer function per channel, weight with the
//!    matrix's luma coefficients, and scale to display nits.
//! 4. Clamp to `[0, peak]`; NaN collapses to 0 so nothing poisons the
//!    aggregate.
//!
//! Missing transfer or matrix signaling is an error, never a guessed
//! default. The caller may supply explicit overrides through
//! [`UnpackPolicy`].

use crate::error::HdrMeterError;
use crate::frame::{
    ColorPrimaries, ColorRange, DecodedFrame, MatrixCoefficients, PixelLayout, TransferFunction,
};

/// Overrides and policy knobs for unpacking.
///
/// The chroma upsampling policy is fixed at nearest neighbor; it is part of
/// this type's contract rather than a runtime switch so results stay
/// reproducible across runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpackPolicy {
    /// Transfer function to assume when the stream declares none.
    pub assume_transfer: Option<TransferFunction>,
    /// Matrix coefficients to assume when the stream declares none.
    pub assume_matrix: Option<MatrixCoefficients>,
}

/// Normalize a luma (or R'G'B') code to `[0, 1]`.
#[inline]
fn normalize_luma(code: u16, bit_depth: u32, range: ColorRange) -> f32 {
    match range {
        ColorRange::Limited => {
            let scale = (1u32 << (bit_depth - 8)) as f32;
            ((code as f32 - 16.0 * scale) / (219.0 * scale)).clamp(0.0, 1.0)
        }
        ColorRange::Full => {
            let max_code = ((1u32 << bit_depth) - 1) as f32;
            (code as f32 / max_code).clamp(0.0, 1.0)
        }
    }
}

/// Normalize a chroma code to a centered `[-0.5, 0.5]`.
#[inline]
fn normalize_chroma(code: u16, bit_depth: u32, range: ColorRange) -> f32 {
    match range {
        ColorRange::Limited => {
            let scale = (1u32 << (bit_depth - 8)) as f32;
            ((code as f32 - 128.0 * scale) / (224.0 * scale)).clamp(-0.5, 0.5)
        }
        ColorRange::Full => {
            let max_code = ((1u32 << bit_depth) - 1) as f32;
            let center = (1u32 << (bit_depth - 1)) as f32;
            ((code as f32 - center) / max_code).clamp(-0.5, 0.5)
        }
    }
}

/// Resolve the matrix used for Y'CbCr conversion and luma weighting.
///
/// Declared matrix wins; otherwise the caller's override; for RGB layouts the
/// declared primaries can stand in (the matrix is only used for weighting
/// there, and BT.2020 primaries pin the BT.2020 weights).
fn resolve_matrix(
    frame: &DecodedFrame,
    policy: &UnpackPolicy,
) -> Result<MatrixCoefficients, HdrMeterError> {
    if let Some(matrix) = frame.matrix.or(policy.assume_matrix) {
        return Ok(matrix);
    }
    if !frame.layout.is_yuv() {
        match frame.primaries {
            Some(ColorPrimaries::Bt2020) => return Ok(MatrixCoefficients::Bt2020Ncl),
            Some(ColorPrimaries::Bt709) => return Ok(MatrixCoefficients::Bt709),
            _ => {}
        }
    }
    Err(HdrMeterError::UnknownColorMetadata {
        frame_index: frame.frame_index,
        missing: "matrix coefficients",
    })
}

/// Check that every plane holds at least the bytes its dimensions require.
fn check_plane_sizes(frame: &DecodedFrame) -> Result<(), HdrMeterError> {
    let bytes_per_sample = frame.bytes_per_sample();
    let (shift_x, shift_y) = frame.layout.chroma_shift();

    // Zero dimensions must fail here, before the row arithmetic below
    // underflows on `height - 1`.
    if frame.width == 0 || frame.height == 0 {
        return Err(HdrMeterError::FrameUnpack {
            frame_index: frame.frame_index,
            reason: format!("invalid frame dimensions {}x{}", frame.width, frame.height),
        });
    }

    if frame.planes.len() < frame.layout.plane_count() {
        return Err(HdrMeterError::FrameUnpack {
            frame_index: frame.frame_index,
            reason: format!(
                "expected {} planes, got {}",
                frame.layout.plane_count(),
                frame.planes.len()
            ),
        });
    }

    for (index, plane) in frame.planes[..frame.layout.plane_count()].iter().enumerate() {
        let subsampled = frame.layout.is_yuv() && index > 0;
        let width = if subsampled {
            (frame.width as usize).div_ceil(1 << shift_x)
        } else {
            frame.width as usize
        };
        let height = if subsampled {
            (frame.height as usize).div_ceil(1 << shift_y)
        } else {
            frame.height as usize
        };
        let required = (height - 1) * plane.stride + width * bytes_per_sample;
        if plane.data.len() < required {
            return Err(HdrMeterError::FrameUnpack {
                frame_index: frame.frame_index,
                reason: format!(
                    "plane {index} holds {} bytes, needs {required} for {width}x{height}",
                    plane.data.len()
                ),
            });
        }
    }

    Ok(())
}

/// Unpack one frame into per-pixel luminance in nits, scan order.
///
/// # Errors
///
/// - [`HdrMeterError::UnknownColorMetadata`] when transfer or matrix
///   signaling is absent and no override is set.
/// - [`HdrMeterError::FrameUnpack`] when plane data is truncated or
///   inconsistent with the declared geometry.
pub fn unpack_frame(
    frame: &DecodedFrame,
    policy: &UnpackPolicy,
) -> Result<Vec<f32>, HdrMeterError> {
    let transfer = frame.transfer.or(policy.assume_transfer).ok_or(
        HdrMeterError::UnknownColorMetadata {
            frame_index: frame.frame_index,
            missing: "transfer function",
        },
    )?;
    let peak = transfer.peak_nits();

    check_plane_sizes(frame)?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    let depth = frame.bit_depth;
    let range = frame.range;
    let bytes = frame.bytes_per_sample();
    let mut luminance = Vec::with_capacity(width * height);

    match frame.layout {
        PixelLayout::Gray => {
            let plane = &frame.planes[0];
            for y in 0..height {
                for x in 0..width {
                    let signal = normalize_luma(plane.sample(x, y, bytes), depth, range);
                    let linear = transfer.linearize(signal);
                    luminance.push(sanitize(transfer.luminance_nits(linear), peak));
                }
            }
        }
        PixelLayout::Gbr => {
            let weights = resolve_matrix(frame, policy)?.luma_weights();
            let (g_plane, b_plane, r_plane) =
                (&frame.planes[0], &frame.planes[1], &frame.planes[2]);
            for y in 0..height {
                for x in 0..width {
                    let red = transfer
                        .linearize(normalize_luma(r_plane.sample(x, y, bytes), depth, range));
                    let green = transfer
                        .linearize(normalize_luma(g_plane.sample(x, y, bytes), depth, range));
                    let blue = transfer
                        .linearize(normalize_luma(b_plane.sample(x, y, bytes), depth, range));
                    let weighted = weights[0] * red + weights[1] * green + weights[2] * blue;
                    luminance.push(sanitize(transfer.luminance_nits(weighted), peak));
                }
            }
        }
        PixelLayout::Yuv420 | PixelLayout::Yuv422 | PixelLayout::Yuv444 => {
            let matrix = resolve_matrix(frame, policy)?;
            let (kr, kb) = matrix.kr_kb();
            let kg = 1.0 - kr - kb;
            let weights = matrix.luma_weights();
            let (shift_x, shift_y) = frame.layout.chroma_shift();
            let (y_plane, cb_plane, cr_plane) =
                (&frame.planes[0], &frame.planes[1], &frame.planes[2]);

            for y in 0..height {
                let chroma_y = y >> shift_y;
                for x in 0..width {
                    // Nearest-neighbor chroma upsampling: integer coordinate
                    // halving, no filtering.
                    let chroma_x = x >> shift_x;

                    let luma = normalize_luma(y_plane.sample(x, y, bytes), depth, range);
                    let cb = normalize_chroma(cb_plane.sample(chroma_x, chroma_y, bytes), depth, range);
                    let cr = normalize_chroma(cr_plane.sample(chroma_x, chroma_y, bytes), depth, range);

                    let red_signal = (luma + 2.0 * (1.0 - kr) * cr).clamp(0.0, 1.0);
                    let blue_signal = (luma + 2.0 * (1.0 - kb) * cb).clamp(0.0, 1.0);
                    let green_signal =
                        ((luma - kr * red_signal - kb * blue_signal) / kg).clamp(0.0, 1.0);

                    let red = transfer.linearize(red_signal);
                    let green = transfer.linearize(green_signal);
                    let blue = transfer.linearize(blue_signal);

                    let weighted = weights[0] * red + weights[1] * green + weights[2] * blue;
                    luminance.push(sanitize(transfer.luminance_nits(weighted), peak));
                }
            }
        }
    }

    Ok(luminance)
}

/// Clamp to `[0, peak]` and collapse NaN to 0.
///
/// Absorbs floating-point overshoot at the transfer function's boundary;
/// letting NaN or negatives reach the aggregate would silently corrupt it.
#[inline]
fn sanitize(nits: f32, peak: f32) -> f32 {
    if nits.is_nan() { 0.0 } else { nits.clamp(0.0, peak) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Plane;
    use crate::transfer::pq_eotf;

    /// Full-range 10-bit grayscale PQ frame, every pixel at `code`.
    fn gray_pq_frame(width: u32, height: u32, code: u16) -> DecodedFrame {
        let samples = vec![code; (width * height) as usize];
        DecodedFrame {
            frame_index: 0,
            width,
            height,
            layout: PixelLayout::Gray,
            bit_depth: 10,
            range: ColorRange::Full,
            transfer: Some(TransferFunction::Pq),
            matrix: None,
            primaries: Some(ColorPrimaries::Bt2020),
            pts_seconds: None,
            planes: vec![Plane::from_u16(&samples, width as usize)],
        }
    }

    /// Limited-range 10-bit YUV frame with uniform luma and neutral chroma.
    fn uniform_yuv_frame(layout: PixelLayout, luma_code: u16) -> DecodedFrame {
        let (width, height) = (8u32, 8u32);
        let (shift_x, shift_y) = layout.chroma_shift();
        let chroma_width = (width >> shift_x) as usize;
        let chroma_height = (height >> shift_y) as usize;

        let luma = vec![luma_code; (width * height) as usize];
        let chroma = vec![512u16; chroma_width * chroma_height];

        DecodedFrame {
            frame_index: 0,
            width,
            height,
            layout,
            bit_depth: 10,
            range: ColorRange::Limited,
            transfer: Some(TransferFunction::Pq),
            matrix: Some(MatrixCoefficients::Bt2020Ncl),
            primaries: Some(ColorPrimaries::Bt2020),
            pts_seconds: None,
            planes: vec![
                Plane::from_u16(&luma, width as usize),
                Plane::from_u16(&chroma, chroma_width),
                Plane::from_u16(&chroma, chroma_width),
            ],
        }
    }

    #[test]
    fn full_range_peak_code_reaches_pq_peak() {
        let frame = gray_pq_frame(4, 4, 1023);
        let luminance = unpack_frame(&frame, &UnpackPolicy::default()).unwrap();
        assert_eq!(luminance.len(), 16);
        for nits in luminance {
            assert!((nits - 10_000.0).abs() < 1.0, "got {nits}");
        }
    }

    #[test]
    fn limited_range_black_is_zero() {
        let mut frame = gray_pq_frame(4, 4, 64); // 16 << 2 = limited black
        frame.range = ColorRange::Limited;
        let luminance = unpack_frame(&frame, &UnpackPolicy::default()).unwrap();
        for nits in luminance {
            assert_eq!(nits, 0.0);
        }
    }

    #[test]
    fn neutral_chroma_yuv_matches_gray_path() {
        // With chroma at center, R' = G' = B' = Y', so the weighted sum
        // equals the plain luma linearization for any matrix.
        for layout in [PixelLayout::Yuv420, PixelLayout::Yuv422, PixelLayout::Yuv444] {
            let frame = uniform_yuv_frame(layout, 760);
            let luminance = unpack_frame(&frame, &UnpackPolicy::default()).unwrap();
            let expected = pq_eotf(normalize_luma(760, 10, ColorRange::Limited));
            for nits in luminance {
                assert!((nits - expected).abs() < expected * 1e-4, "{layout:?}: {nits} vs {expected}");
            }
        }
    }

    #[test]
    fn missing_transfer_is_an_error_without_override() {
        let mut frame = gray_pq_frame(2, 2, 512);
        frame.transfer = None;
        let result = unpack_frame(&frame, &UnpackPolicy::default());
        assert!(matches!(
            result,
            Err(HdrMeterError::UnknownColorMetadata {
                missing: "transfer function",
                ..
            })
        ));

        let policy = UnpackPolicy {
            assume_transfer: Some(TransferFunction::Pq),
            assume_matrix: None,
        };
        assert!(unpack_frame(&frame, &policy).is_ok());
    }

    #[test]
    fn missing_matrix_is_an_error_for_yuv() {
        let mut frame = uniform_yuv_frame(PixelLayout::Yuv444, 512);
        frame.matrix = None;
        frame.primaries = None;
        let result = unpack_frame(&frame, &UnpackPolicy::default());
        assert!(matches!(
            result,
            Err(HdrMeterError::UnknownColorMetadata {
                missing: "matrix coefficients",
                ..
            })
        ));
    }

    #[test]
    fn truncated_plane_is_reported_not_panicked() {
        let mut frame = gray_pq_frame(8, 8, 512);
        frame.planes[0].data.truncate(10);
        let result = unpack_frame(&frame, &UnpackPolicy::default());
        assert!(matches!(result, Err(HdrMeterError::FrameUnpack { .. })));
    }

    #[test]
    fn zero_dimension_frame_is_reported_not_panicked() {
        // A zero-height frame must come back as a normal unpack error; the
        // row-size arithmetic must never underflow on it.
        let mut frame = gray_pq_frame(4, 4, 512);
        frame.height = 0;
        assert!(matches!(
            unpack_frame(&frame, &UnpackPolicy::default()),
            Err(HdrMeterError::FrameUnpack { .. })
        ));

        let mut frame = gray_pq_frame(4, 4, 512);
        frame.width = 0;
        assert!(matches!(
            unpack_frame(&frame, &UnpackPolicy::default()),
            Err(HdrMeterError::FrameUnpack { .. })
        ));
    }

    #[test]
    fn chroma_upsampling_is_nearest_neighbor() {
        // 4x2 yuv422: chroma plane is 2x2. Left chroma sample strongly red,
        // right neutral. Pixels 0,1 share chroma sample 0; pixels 2,3 share
        // sample 1.
        let luma = vec![502u16; 8]; // mid grey
        let cb = vec![512u16, 512];
        let cr = vec![940u16, 512];
        let frame = DecodedFrame {
            frame_index: 0,
            width: 4,
            height: 2,
            layout: PixelLayout::Yuv422,
            bit_depth: 10,
            range: ColorRange::Limited,
            transfer: Some(TransferFunction::Pq),
            matrix: Some(MatrixCoefficients::Bt2020Ncl),
            primaries: Some(ColorPrimaries::Bt2020),
            pts_seconds: None,
            planes: vec![
                Plane::from_u16(&luma, 4),
                Plane::from_u16(&[cb[0], cb[1], cb[0], cb[1]], 2),
                Plane::from_u16(&[cr[0], cr[1], cr[0], cr[1]], 2),
            ],
        };
        let luminance = unpack_frame(&frame, &UnpackPolicy::default()).unwrap();
        assert_eq!(luminance.len(), 8);
        // Shared-chroma pairs are identical; across pairs they differ.
        assert_eq!(luminance[0], luminance[1]);
        assert_eq!(luminance[2], luminance[3]);
        assert_ne!(luminance[0], luminance[2]);
    }

    #[test]
    fn hlg_peak_maps_to_nominal_display_peak() {
        let mut frame = gray_pq_frame(2, 2, 1023);
        frame.transfer = Some(TransferFunction::Hlg);
        let luminance = unpack_frame(&frame, &UnpackPolicy::default()).unwrap();
        for nits in luminance {
            assert!((nits - 1000.0).abs() < 2.0, "got {nits}");
        }
    }

    #[test]
    fn output_is_scan_order() {
        // Two rows with different luma; row-major output keeps them grouped.
        let samples = [vec![64u16; 4], vec![940u16; 4]].concat();
        let mut frame = gray_pq_frame(4, 2, 0);
        frame.range = ColorRange::Limited;
        frame.planes = vec![Plane::from_u16(&samples, 4)];
        let luminance = unpack_frame(&frame, &UnpackPolicy::default()).unwrap();
        assert!(luminance[..4].iter().all(|&nits| nits == 0.0));
        assert!(luminance[4..].iter().all(|&nits| nits > 0.0));
    }
}
