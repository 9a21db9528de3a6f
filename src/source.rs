//! Frame source adapter over FFmpeg.
//!
//! [`MediaSource`] opens a media file, locates the best video stream, and
//! caches its [`StreamInfo`]. [`MediaSource::frames`] returns a lazy,
//! pull-based [`FrameIterator`]: each `next()` reads and decodes just enough
//! packets to produce one [`DecodedFrame`], so memory stays bounded for
//! arbitrarily long streams. The sequence is forward-only and not
//! restartable — open a fresh source to re-scan.
//!
//! Color signaling is surfaced exactly as the codec declared it. An
//! undeclared transfer function or matrix stays `None` on the frame (the
//! caller decides, via overrides, whether to proceed); a *declared but
//! unsupported* transfer characteristic (e.g. an SDR gamma curve) fails
//! immediately with [`HdrMeterError::UnsupportedTransferFunction`].

use std::{path::Path, path::PathBuf, time::Duration};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    color::{Primaries, Range, Space, TransferCharacteristic},
    decoder::Video as VideoDecoder,
    format::Pixel,
    format::context::Input,
    frame::Video as VideoFrame,
    media::Type,
};

use crate::error::HdrMeterError;
use crate::frame::{
    ColorPrimaries, ColorRange, DecodedFrame, MatrixCoefficients, PixelLayout, Plane,
    TransferFunction,
};

/// Cached metadata for the analyzed video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct StreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total frame count; `None` when the container declares
    /// neither a frame count nor a usable duration.
    pub frame_count: Option<u64>,
    /// Container-level duration.
    pub duration: Duration,
    /// Codec name (e.g. `"hevc"`, `"av1"`).
    pub codec: String,
    /// FFmpeg pixel format name (e.g. `"YUV420P10LE"`).
    pub pixel_format: String,
    /// Parsed planar layout, if the pixel format is one the unpacker handles.
    pub layout: Option<PixelLayout>,
    /// Bits per sample, if the pixel format is handled.
    pub bit_depth: Option<u32>,
    /// Quantization range (defaults to limited when undeclared).
    pub range: ColorRange,
    /// Whether the range was actually declared rather than defaulted.
    pub range_declared: bool,
    /// Parsed transfer function (PQ/HLG), if declared and supported.
    pub transfer: Option<TransferFunction>,
    /// Raw declared transfer characteristic name, if any.
    pub transfer_name: Option<String>,
    /// Parsed matrix coefficients, if declared and supported.
    pub matrix: Option<MatrixCoefficients>,
    /// Raw declared matrix name, if any.
    pub matrix_name: Option<String>,
    /// Parsed color primaries, if declared and recognized.
    pub primaries: Option<ColorPrimaries>,
    /// Raw declared primaries name, if any.
    pub primaries_name: Option<String>,
}

/// Map an FFmpeg pixel format to a planar layout and bit depth.
pub(crate) fn map_pixel_format(pixel: Pixel) -> Option<(PixelLayout, u32)> {
    match pixel {
        Pixel::YUV420P => Some((PixelLayout::Yuv420, 8)),
        Pixel::YUV422P => Some((PixelLayout::Yuv422, 8)),
        Pixel::YUV444P => Some((PixelLayout::Yuv444, 8)),
        Pixel::YUV420P10LE => Some((PixelLayout::Yuv420, 10)),
        Pixel::YUV422P10LE => Some((PixelLayout::Yuv422, 10)),
        Pixel::YUV444P10LE => Some((PixelLayout::Yuv444, 10)),
        Pixel::YUV420P12LE => Some((PixelLayout::Yuv420, 12)),
        Pixel::YUV422P12LE => Some((PixelLayout::Yuv422, 12)),
        Pixel::YUV444P12LE => Some((PixelLayout::Yuv444, 12)),
        Pixel::GRAY8 => Some((PixelLayout::Gray, 8)),
        Pixel::GRAY10LE => Some((PixelLayout::Gray, 10)),
        Pixel::GRAY12LE => Some((PixelLayout::Gray, 12)),
        Pixel::GBRP => Some((PixelLayout::Gbr, 8)),
        Pixel::GBRP10LE => Some((PixelLayout::Gbr, 10)),
        Pixel::GBRP12LE => Some((PixelLayout::Gbr, 12)),
        _ => None,
    }
}

fn map_transfer(characteristic: TransferCharacteristic) -> (Option<TransferFunction>, Option<String>) {
    match characteristic {
        TransferCharacteristic::SMPTE2084 => (Some(TransferFunction::Pq), Some("SMPTE2084".into())),
        TransferCharacteristic::ARIB_STD_B67 => {
            (Some(TransferFunction::Hlg), Some("ARIB_STD_B67".into()))
        }
        TransferCharacteristic::Unspecified => (None, None),
        other => (None, Some(format!("{other:?}"))),
    }
}

fn map_matrix(space: Space) -> (Option<MatrixCoefficients>, Option<String>) {
    match space {
        Space::BT709 => (Some(MatrixCoefficients::Bt709), Some("BT709".into())),
        Space::BT2020NCL => (Some(MatrixCoefficients::Bt2020Ncl), Some("BT2020NCL".into())),
        Space::BT470BG | Space::SMPTE170M => {
            (Some(MatrixCoefficients::Bt601), Some(format!("{space:?}")))
        }
        Space::Unspecified => (None, None),
        other => (None, Some(format!("{other:?}"))),
    }
}

fn map_primaries(primaries: Primaries) -> (Option<ColorPrimaries>, Option<String>) {
    match primaries {
        Primaries::BT709 => (Some(ColorPrimaries::Bt709), Some("BT709".into())),
        Primaries::BT2020 => (Some(ColorPrimaries::Bt2020), Some("BT2020".into())),
        Primaries::SMPTE431 | Primaries::SMPTE432 => {
            (Some(ColorPrimaries::DciP3), Some(format!("{primaries:?}")))
        }
        Primaries::Unspecified => (None, None),
        other => (None, Some(format!("{other:?}"))),
    }
}

fn map_range(range: Range) -> (ColorRange, bool) {
    match range {
        Range::MPEG => (ColorRange::Limited, true),
        Range::JPEG => (ColorRange::Full, true),
        _ => (ColorRange::Limited, false),
    }
}

/// An opened media file positioned at its first video frame.
///
/// Created via [`MediaSource::open`]. Holds the demuxer context and the
/// cached [`StreamInfo`]; use [`frames`](MediaSource::frames) to start the
/// decode pass.
pub struct MediaSource {
    pub(crate) input_context: Input,
    pub(crate) stream_info: StreamInfo,
    pub(crate) video_stream_index: usize,
    #[allow(dead_code)]
    pub(crate) file_path: PathBuf,
}

impl MediaSource {
    /// Open a media file for analysis.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, locates the best
    /// video stream, and caches its metadata including color signaling.
    ///
    /// # Errors
    ///
    /// Returns [`HdrMeterError::FileOpen`] if the file cannot be opened and
    /// [`HdrMeterError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HdrMeterError> {
        let path = path.as_ref();
        let canonical_path = path.to_path_buf();

        log::debug!("Opening media file: {}", canonical_path.display());

        ffmpeg_next::init().map_err(|error| HdrMeterError::FileOpen {
            path: canonical_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| HdrMeterError::FileOpen {
                path: canonical_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(HdrMeterError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                HdrMeterError::FileOpen {
                    path: canonical_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| HdrMeterError::FileOpen {
                path: canonical_path.clone(),
                reason: format!("Failed to create video decoder: {error}"),
            })?;

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        // Prefer an explicit container tag (Matroska writes NUMBER_OF_FRAMES),
        // fall back to duration * fps.
        let frame_count = input_context
            .metadata()
            .get("NUMBER_OF_FRAMES")
            .and_then(|tag| tag.parse::<u64>().ok())
            .or_else(|| {
                (frames_per_second > 0.0 && duration > Duration::ZERO)
                    .then(|| (duration.as_secs_f64() * frames_per_second) as u64)
            });

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let pixel = decoder.format();
        let (layout, bit_depth) = match map_pixel_format(pixel) {
            Some((layout, depth)) => (Some(layout), Some(depth)),
            None => (None, None),
        };

        let (transfer, transfer_name) = map_transfer(decoder.color_transfer_characteristic());
        let (matrix, matrix_name) = map_matrix(decoder.color_space());
        let (primaries, primaries_name) = map_primaries(decoder.color_primaries());
        let (range, range_declared) = map_range(decoder.color_range());

        let stream_info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            duration,
            codec,
            pixel_format: format!("{pixel:?}"),
            layout,
            bit_depth,
            range,
            range_declared,
            transfer,
            transfer_name,
            matrix,
            matrix_name,
            primaries,
            primaries_name,
        };

        log::info!(
            "Opened {}: {} {}x{} {} @ {:.2} fps, ~{} frames, transfer={} matrix={}",
            canonical_path.display(),
            stream_info.codec,
            stream_info.width,
            stream_info.height,
            stream_info.pixel_format,
            stream_info.frames_per_second,
            stream_info
                .frame_count
                .map_or_else(|| "?".to_string(), |count| count.to_string()),
            stream_info.transfer_name.as_deref().unwrap_or("undeclared"),
            stream_info.matrix_name.as_deref().unwrap_or("undeclared"),
        );

        Ok(Self {
            input_context,
            stream_info,
            video_stream_index,
            file_path: canonical_path,
        })
    }

    /// Probe a media file and return its stream metadata without keeping the
    /// demuxer open.
    ///
    /// Useful for quickly inspecting many files; for analysis use
    /// [`open`](MediaSource::open) and keep the source.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<StreamInfo, HdrMeterError> {
        Ok(Self::open(path)?.stream_info)
    }

    /// Cached metadata for the video stream.
    pub fn info(&self) -> &StreamInfo {
        &self.stream_info
    }

    /// Create the lazy frame iterator for this source's video stream.
    ///
    /// Consumes the source's read position: the iterator decodes forward
    /// only, and the source cannot be rewound afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the video decoder cannot be created.
    pub fn frames(&mut self) -> Result<FrameIterator<'_>, HdrMeterError> {
        FrameIterator::new(self)
    }
}

/// A lazy iterator over decoded frames.
///
/// Each call to [`next()`](Iterator::next) reads and decodes just enough
/// packets to produce one frame; the decoder is drained after end of stream
/// so trailing frames are not lost. Yields
/// `Result<DecodedFrame, HdrMeterError>` — a decode error ends the stream.
pub struct FrameIterator<'a> {
    source: &'a mut MediaSource,
    decoder: VideoDecoder,
    time_base: Rational,
    decoded_frame: VideoFrame,
    frame_index: u64,
    eof_sent: bool,
    done: bool,
}

impl<'a> FrameIterator<'a> {
    fn new(source: &'a mut MediaSource) -> Result<Self, HdrMeterError> {
        let stream = source
            .input_context
            .stream(source.video_stream_index)
            .ok_or(HdrMeterError::NoVideoStream)?;
        let time_base = stream.time_base();
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;

        Ok(Self {
            source,
            decoder,
            time_base,
            decoded_frame: VideoFrame::empty(),
            frame_index: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Copy the current decoded frame into an owned [`DecodedFrame`].
    fn convert_current_frame(&mut self) -> Result<DecodedFrame, HdrMeterError> {
        let pixel = self.decoded_frame.format();
        let (layout, bit_depth) = map_pixel_format(pixel)
            .ok_or_else(|| HdrMeterError::UnsupportedPixelFormat(format!("{pixel:?}")))?;

        let info = &self.source.stream_info;

        // Declared-but-unsupported transfer characteristics abort here;
        // silently analyzing an SDR gamma stream as HDR would corrupt every
        // statistic.
        if info.transfer.is_none()
            && let Some(name) = &info.transfer_name
        {
            return Err(HdrMeterError::UnsupportedTransferFunction(name.clone()));
        }

        let pts_seconds = self.decoded_frame.pts().map(|pts| {
            pts as f64 * self.time_base.numerator() as f64 / self.time_base.denominator() as f64
        });

        let planes = (0..layout.plane_count())
            .map(|index| Plane {
                data: self.decoded_frame.data(index).to_vec(),
                stride: self.decoded_frame.stride(index),
            })
            .collect();

        let frame = DecodedFrame {
            frame_index: self.frame_index,
            width: self.decoded_frame.width(),
            height: self.decoded_frame.height(),
            layout,
            bit_depth,
            range: info.range,
            transfer: info.transfer,
            matrix: info.matrix,
            primaries: info.primaries,
            pts_seconds,
            planes,
        };
        self.frame_index += 1;
        Ok(frame)
    }
}

impl Iterator for FrameIterator<'_> {
    type Item = Result<DecodedFrame, HdrMeterError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            // Try to receive a frame the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                match self.convert_current_frame() {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(error) => {
                        self.done = true;
                        return Some(Err(error));
                    }
                }
            }

            // Decoder has no buffered frames. Feed it more packets.
            if self.eof_sent {
                // Already sent EOF and decoder is drained.
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.source.input_context) {
                Ok(()) => {
                    if packet.stream() == self.source.video_stream_index
                        && let Err(error) = self.decoder.send_packet(&packet)
                    {
                        self.done = true;
                        return Some(Err(HdrMeterError::DecodeError(error.to_string())));
                    }
                    // Non-video packets are silently skipped.
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        self.done = true;
                        return Some(Err(HdrMeterError::DecodeError(error.to_string())));
                    }
                    self.eof_sent = true;
                }
                Err(_) => {
                    // Transient read error — retry with the next packet.
                }
            }
        }
    }
}
