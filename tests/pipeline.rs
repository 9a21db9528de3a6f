//! End-to-end pipeline tests over synthetic frame streams.
//!
//! These exercise the public unpack → statistics → aggregate path without any
//! media fixtures by feeding hand-built [`DecodedFrame`]s straight into
//! [`HdrAnalyzer::analyze_frames`].

use hdrmeter::{
    AnalyzeOptions, ColorPrimaries, ColorRange, DecodedFrame, HdrAnalyzer, HdrMeterError,
    MatrixCoefficients, PixelLayout, Plane, TransferFunction,
    transfer::{hlg_ootf_luminance, pq_eotf},
};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 18;

/// Limited-range 10-bit BT.2020 PQ YUV420 frame with uniform luma and
/// neutral chroma, i.e. the shape of real HDR10 video.
fn hdr10_frame(frame_index: u64, luma_code: u16) -> DecodedFrame {
    let luma = vec![luma_code; (WIDTH * HEIGHT) as usize];
    let chroma = vec![512u16; ((WIDTH / 2) * (HEIGHT / 2)) as usize];
    DecodedFrame {
        frame_index,
        width: WIDTH,
        height: HEIGHT,
        layout: PixelLayout::Yuv420,
        bit_depth: 10,
        range: ColorRange::Limited,
        transfer: Some(TransferFunction::Pq),
        matrix: Some(MatrixCoefficients::Bt2020Ncl),
        primaries: Some(ColorPrimaries::Bt2020),
        pts_seconds: Some(frame_index as f64 / 24.0),
        planes: vec![
            Plane::from_u16(&luma, WIDTH as usize),
            Plane::from_u16(&chroma, (WIDTH / 2) as usize),
            Plane::from_u16(&chroma, (WIDTH / 2) as usize),
        ],
    }
}

fn ramp(count: u64) -> Vec<Result<DecodedFrame, HdrMeterError>> {
    // Limited-range luma ramp from black (64) up toward reference white (940).
    (0..count)
        .map(|index| {
            let code = 64 + (index * (940 - 64) / count.max(1)) as u16;
            Ok(hdr10_frame(index, code))
        })
        .collect()
}

#[test]
fn hdr10_stream_end_to_end() {
    let frames = ramp(24);
    let report = HdrAnalyzer::new().analyze_frames(frames, Some(24)).unwrap();

    // Brightest frame carries code 64 + 23 * 876 / 24; neutral chroma means
    // its luminance is exactly the PQ EOTF of the normalized luma.
    let code = 64 + (23u64 * 876 / 24) as u16;
    let expected = pq_eotf((code as f32 - 64.0) / 876.0) as f64;

    assert_eq!(report.frames, 24);
    assert_eq!(report.failed_frames, 0);
    assert!(!report.partial);
    assert!((report.max_cll - expected).abs() < expected * 1e-4);
    // Uniform frames: the frame average equals the pixel maximum.
    assert!((report.max_fall - report.max_cll).abs() < report.max_cll * 1e-6);
}

#[test]
fn reports_are_byte_identical_across_runs() {
    let run = || {
        HdrAnalyzer::new()
            .analyze_frames(ramp(24), None)
            .unwrap()
            .to_string()
    };
    assert_eq!(run(), run());
}

#[test]
fn parallelism_never_changes_the_report() {
    let reference = HdrAnalyzer::with_options(AnalyzeOptions::new().with_batch_size(1))
        .analyze_frames(ramp(31), None)
        .unwrap();

    for batch_size in [3, 7, 31, 128] {
        let report = HdrAnalyzer::with_options(AnalyzeOptions::new().with_batch_size(batch_size))
            .analyze_frames(ramp(31), None)
            .unwrap();
        assert_eq!(
            report.to_string(),
            reference.to_string(),
            "batch_size={batch_size}"
        );
    }

    // Default (thread-pool-sized) batches as well.
    let report = HdrAnalyzer::new().analyze_frames(ramp(31), None).unwrap();
    assert_eq!(report.to_string(), reference.to_string());
}

#[test]
fn hlg_stream_peaks_at_nominal_display_luminance() {
    let mut frame = hdr10_frame(0, 940);
    frame.transfer = Some(TransferFunction::Hlg);
    let report = HdrAnalyzer::new()
        .analyze_frames(vec![Ok(frame)], None)
        .unwrap();

    // The HLG constants make the inverse OETF land a hair under 1.0 at full
    // signal, so allow sub-nit slack around the 1000-nit nominal peak.
    let expected = hlg_ootf_luminance(1.0) as f64;
    assert!((report.max_cll - expected).abs() < 0.5);
    assert!(report.max_cll <= 1000.0 + 1e-3);
}

#[test]
fn percentile_lines_preserve_request_order() {
    let options = AnalyzeOptions::new().with_percentiles(vec![50.0, 99.98]);
    let report = HdrAnalyzer::with_options(options)
        .analyze_frames(ramp(24), None)
        .unwrap();

    let text = report.to_string();
    let p50 = text.find("Percentile50:").expect("Percentile50 line");
    let p9998 = text.find("Percentile99.98:").expect("Percentile99.98 line");
    assert!(p50 < p9998, "request order must be preserved:\n{text}");

    // Percentiles are luminances, so they can never exceed the pixel maximum.
    for &(_, nits) in &report.percentiles {
        assert!(nits <= report.max_cll + 1e-6);
    }
}

#[test]
fn untagged_stream_is_rescued_by_overrides() {
    let strip = |mut frame: DecodedFrame| {
        frame.transfer = None;
        frame.matrix = None;
        frame.primaries = None;
        frame
    };

    let untagged: Vec<_> = ramp(8)
        .into_iter()
        .map(|frame| frame.map(strip))
        .collect();
    let failure = HdrAnalyzer::new().analyze_frames(untagged, None);
    assert!(matches!(
        failure,
        Err(HdrMeterError::UnknownColorMetadata { .. })
    ));

    let untagged: Vec<_> = ramp(8)
        .into_iter()
        .map(|frame| frame.map(strip))
        .collect();
    let options = AnalyzeOptions::new()
        .with_assumed_transfer(TransferFunction::Pq)
        .with_assumed_matrix(MatrixCoefficients::Bt2020Ncl);
    let rescued = HdrAnalyzer::with_options(options)
        .analyze_frames(untagged, None)
        .unwrap();

    let declared = HdrAnalyzer::new().analyze_frames(ramp(8), None).unwrap();
    assert_eq!(rescued.to_string(), declared.to_string());
}

#[test]
fn failed_frames_do_not_dilute_statistics() {
    let mut frames = ramp(10);
    // Truncate one frame's luma plane so it fails to unpack.
    if let Ok(frame) = frames[4].as_mut() {
        frame.planes[0].data.truncate(10);
    }

    let options = AnalyzeOptions::new().with_skip_malformed(true);
    let report = HdrAnalyzer::with_options(options)
        .analyze_frames(frames, None)
        .unwrap();

    assert_eq!(report.frames, 9);
    assert_eq!(report.failed_frames, 1);

    // A skipped frame must not register as black: the darkest surviving
    // frame is code 64 (true black here), but MaxFALL still reflects the
    // brightest frame, unchanged by the skip.
    let clean = HdrAnalyzer::new().analyze_frames(ramp(10), None).unwrap();
    assert!((report.max_fall - clean.max_fall).abs() < 1e-9);
}
