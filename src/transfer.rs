//! HDR transfer-function math.
//!
//! Implements the PQ EOTF (SMPTE ST 2084 / BT.2100) and the HLG inverse OETF
//! plus OOTF (ARIB STD-B67 / BT.2100). Dispatch happens through
//! [`TransferFunction`]: the enum is closed, so an undeclared or unhandled
//! transfer characteristic fails loudly at the source boundary instead of
//! falling through a default case here.
#![allow(clippy::excessive_precision)]

use crate::frame::TransferFunction;

// SMPTE ST 2084 constants.
const PQ_M1: f32 = 0.1593017578125; // 2610 / 4096 / 4
const PQ_M2: f32 = 78.84375; // 2523 / 4096 * 128
const PQ_C1: f32 = 0.8359375; // 3424 / 4096
const PQ_C2: f32 = 18.8515625; // 2413 / 4096 * 32
const PQ_C3: f32 = 18.6875; // 2392 / 4096 * 32

/// Peak luminance representable by PQ, in nits.
pub const PQ_PEAK_NITS: f32 = 10_000.0;

// ARIB STD-B67 constants.
const HLG_A: f32 = 0.17883277;
const HLG_B: f32 = 0.28466892;
const HLG_C: f32 = 0.55991073;

/// Nominal peak display luminance for HLG content, in nits.
pub const HLG_PEAK_NITS: f32 = 1_000.0;

/// System gamma of the BT.2100 HLG OOTF at the nominal 1000-nit display.
const HLG_SYSTEM_GAMMA: f32 = 1.2;

/// PQ EOTF: non-linear signal in `[0, 1]` to display luminance in nits.
pub fn pq_eotf(signal: f32) -> f32 {
    let signal = signal.clamp(0.0, 1.0);
    let p = signal.powf(1.0 / PQ_M2);
    let numerator = (p - PQ_C1).max(0.0);
    let denominator = PQ_C2 - PQ_C3 * p;
    if denominator.abs() < 1e-10 {
        return 0.0;
    }
    (numerator / denominator).powf(1.0 / PQ_M1) * PQ_PEAK_NITS
}

/// PQ inverse EOTF: display luminance in nits to a non-linear signal in
/// `[0, 1]`.
pub fn pq_inverse_eotf(nits: f32) -> f32 {
    let y = (nits / PQ_PEAK_NITS).clamp(0.0, 1.0);
    let ym1 = y.powf(PQ_M1);
    ((PQ_C1 + PQ_C2 * ym1) / (1.0 + PQ_C3 * ym1)).powf(PQ_M2)
}

/// HLG inverse OETF: non-linear signal in `[0, 1]` to scene-referred linear
/// light in `[0, 1]`.
pub fn hlg_inverse_oetf(signal: f32) -> f32 {
    let e = signal.max(0.0);
    if e <= 0.5 {
        e * e / 3.0
    } else {
        (((e - HLG_C) / HLG_A).exp() + HLG_B) / 12.0
    }
}

/// HLG OOTF applied to normalized scene luminance, yielding display
/// luminance in nits at the nominal 1000-nit peak.
pub fn hlg_ootf_luminance(scene_luminance: f32) -> f32 {
    HLG_PEAK_NITS * scene_luminance.max(0.0).powf(HLG_SYSTEM_GAMMA)
}

impl TransferFunction {
    /// Linearize one non-linear channel value.
    ///
    /// For PQ the result is absolute display light in nits; for HLG it is
    /// scene-referred linear light in `[0, 1]` (display referencing happens on
    /// the weighted luminance, see [`luminance_nits`](Self::luminance_nits)).
    #[inline]
    pub fn linearize(self, signal: f32) -> f32 {
        match self {
            TransferFunction::Pq => pq_eotf(signal),
            TransferFunction::Hlg => hlg_inverse_oetf(signal),
        }
    }

    /// Convert a matrix-weighted linear luminance into display nits.
    ///
    /// PQ channel values are already nits, so the weighted sum passes
    /// through. HLG applies the BT.2100 OOTF to the scene luminance.
    #[inline]
    pub fn luminance_nits(self, weighted_linear: f32) -> f32 {
        match self {
            TransferFunction::Pq => weighted_linear,
            TransferFunction::Hlg => hlg_ootf_luminance(weighted_linear),
        }
    }
}
