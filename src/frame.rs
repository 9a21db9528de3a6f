//! Frame data model and color-signaling types.
//!
//! [`DecodedFrame`] is the unit of work flowing through the analysis pipeline:
//! raw decoded planes plus the color metadata the codec declared. It owns its
//! plane buffers and carries no FFmpeg handles, so it can cross thread
//! boundaries for parallel unpacking and be constructed synthetically in
//! tests.
//!
//! Color signaling is modelled as closed enums: a transfer function or matrix
//! the analyzer does not handle maps to `None` at the decoder boundary and
//! produces an explicit error during unpacking, never a silent default.

/// HDR transfer characteristic of a stream.
///
/// Only transfer functions with well-defined absolute (or conventionally
/// display-referred) light levels are representable; everything else is
/// rejected at the source boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferFunction {
    /// Perceptual Quantizer (SMPTE ST 2084 / BT.2100). Absolute, 10 000-nit
    /// peak.
    Pq,
    /// Hybrid Log-Gamma (ARIB STD-B67 / BT.2100). Scene-referred; converted
    /// to display light via the BT.2100 OOTF with γ = 1.2 against a
    /// 1000-nit nominal peak display.
    Hlg,
}

impl TransferFunction {
    /// Peak display luminance in nits for this transfer function.
    pub fn peak_nits(self) -> f32 {
        match self {
            TransferFunction::Pq => 10_000.0,
            TransferFunction::Hlg => 1_000.0,
        }
    }

    /// Canonical lowercase name, as accepted by the CLI `--assume-transfer`
    /// flag.
    pub fn name(self) -> &'static str {
        match self {
            TransferFunction::Pq => "pq",
            TransferFunction::Hlg => "hlg",
        }
    }
}

/// Matrix coefficients describing how Y'CbCr relates to R'G'B'.
///
/// The luma weighting differs per matrix; applying BT.709 weights to BT.2020
/// content is a correctness bug, not a rounding error, so dispatch is always
/// on the declared matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixCoefficients {
    /// ITU-R BT.601 (SD).
    Bt601,
    /// ITU-R BT.709 (HD).
    Bt709,
    /// ITU-R BT.2020 non-constant luminance (UHD/HDR).
    Bt2020Ncl,
}

impl MatrixCoefficients {
    /// The `(Kr, Kb)` constants for this matrix.
    pub fn kr_kb(self) -> (f32, f32) {
        match self {
            MatrixCoefficients::Bt601 => (0.299, 0.114),
            MatrixCoefficients::Bt709 => (0.2126, 0.0722),
            MatrixCoefficients::Bt2020Ncl => (0.2627, 0.0593),
        }
    }

    /// Luminance weights `[wr, wg, wb]` applied to linear RGB.
    pub fn luma_weights(self) -> [f32; 3] {
        let (kr, kb) = self.kr_kb();
        [kr, 1.0 - kr - kb, kb]
    }

    /// Canonical lowercase name, as accepted by the CLI `--assume-matrix`
    /// flag.
    pub fn name(self) -> &'static str {
        match self {
            MatrixCoefficients::Bt601 => "bt601",
            MatrixCoefficients::Bt709 => "bt709",
            MatrixCoefficients::Bt2020Ncl => "bt2020ncl",
        }
    }
}

/// Color primaries declared by the stream.
///
/// Carried through to the report for diagnostics; luminance weighting is
/// driven by [`MatrixCoefficients`], not primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorPrimaries {
    /// ITU-R BT.709.
    Bt709,
    /// ITU-R BT.2020 (wide gamut, typical for HDR).
    Bt2020,
    /// SMPTE RP 431-2 (DCI-P3).
    DciP3,
}

/// Quantization range of the coded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorRange {
    /// Narrow/video range: luma 16–235 (scaled by bit depth). The default
    /// when a stream declares nothing, per convention for broadcast video.
    #[default]
    Limited,
    /// Full/PC range: codes span `0..=2^depth - 1`.
    Full,
}

/// Planar sample layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// Planar Y'CbCr with chroma subsampled 2× horizontally and vertically.
    Yuv420,
    /// Planar Y'CbCr with chroma subsampled 2× horizontally.
    Yuv422,
    /// Planar Y'CbCr at full chroma resolution.
    Yuv444,
    /// Planar R'G'B' (FFmpeg GBR plane order: plane 0 = G, 1 = B, 2 = R).
    Gbr,
    /// Single luma plane.
    Gray,
}

impl PixelLayout {
    /// Number of planes this layout carries.
    pub fn plane_count(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Yuv420 | PixelLayout::Yuv422 | PixelLayout::Yuv444 | PixelLayout::Gbr => {
                3
            }
        }
    }

    /// Chroma subsampling shifts `(horizontal, vertical)` in log2.
    pub fn chroma_shift(self) -> (u32, u32) {
        match self {
            PixelLayout::Yuv420 => (1, 1),
            PixelLayout::Yuv422 => (1, 0),
            PixelLayout::Yuv444 | PixelLayout::Gbr | PixelLayout::Gray => (0, 0),
        }
    }

    /// Whether the layout is Y'CbCr (needs matrix coefficients to unpack).
    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            PixelLayout::Yuv420 | PixelLayout::Yuv422 | PixelLayout::Yuv444
        )
    }
}

/// One owned image plane.
///
/// Samples wider than 8 bits are stored little-endian, two bytes per sample,
/// matching FFmpeg's `*10le`/`*12le` formats. `stride` is in bytes and may
/// exceed the row's payload for alignment.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Raw plane bytes.
    pub data: Vec<u8>,
    /// Bytes per row.
    pub stride: usize,
}

impl Plane {
    /// Build a tightly-packed plane from 8-bit samples.
    pub fn from_u8(samples: Vec<u8>, width: usize) -> Self {
        Plane {
            data: samples,
            stride: width,
        }
    }

    /// Build a tightly-packed plane from 16-bit samples (stored LE).
    pub fn from_u16(samples: &[u16], width: usize) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Plane {
            data,
            stride: width * 2,
        }
    }

    /// Read the sample at `(x, y)`.
    ///
    /// `bytes_per_sample` is 1 for 8-bit content and 2 for 10/12-bit.
    #[inline]
    pub fn sample(&self, x: usize, y: usize, bytes_per_sample: usize) -> u16 {
        let offset = y * self.stride + x * bytes_per_sample;
        if bytes_per_sample == 1 {
            self.data[offset] as u16
        } else {
            u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
        }
    }
}

/// One decoded video frame with its declared color metadata.
///
/// Exclusively owned by whichever pipeline stage is processing it and dropped
/// as soon as its statistics are computed, so memory stays bounded regardless
/// of stream length.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Zero-based index in decode order.
    pub frame_index: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Planar sample layout.
    pub layout: PixelLayout,
    /// Bits per sample (8, 10, or 12).
    pub bit_depth: u32,
    /// Quantization range.
    pub range: ColorRange,
    /// Declared transfer characteristic, if any.
    pub transfer: Option<TransferFunction>,
    /// Declared matrix coefficients, if any.
    pub matrix: Option<MatrixCoefficients>,
    /// Declared color primaries, if any.
    pub primaries: Option<ColorPrimaries>,
    /// Presentation timestamp in seconds, if the stream provided one.
    pub pts_seconds: Option<f64>,
    /// Owned plane data, in layout order.
    pub planes: Vec<Plane>,
}

impl DecodedFrame {
    /// Total number of pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes per stored sample (1 for 8-bit, 2 otherwise).
    pub fn bytes_per_sample(&self) -> usize {
        if self.bit_depth > 8 { 2 } else { 1 }
    }

    /// Maximum code value for this bit depth (`2^depth - 1`).
    pub fn max_code(&self) -> f32 {
        ((1u32 << self.bit_depth) - 1) as f32
    }
}
