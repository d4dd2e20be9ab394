//! Offline signal metrics.
//!
//! Every function here is pure and infallible. Empty, silent or degenerate
//! input degrades to the floor/zero values of [`cadenza_core::safe_math`]
//! instead of an error, and no function ever returns `NaN` or `±Infinity`.
//!
//! The loudness measure is a windowed mean-square approximation without
//! K-weighting. Treat it as a relative loudness figure, not a compliance
//! measurement.

use crate::stereo::{stereo_image, StereoImage};
use cadenza_core::safe_math::{
    amplitude_to_db, finite_or, round_to, safe_div, DB_PRECISION, LINEAR_PRECISION,
    PERCENT_PRECISION, SILENCE_FLOOR_DB,
};
use cadenza_core::SampleBuffer;
use serde::{Deserialize, Serialize};

/// Loudness analysis block length.
pub const LOUDNESS_BLOCK_SECONDS: f64 = 0.4;

/// Fraction of each block shared with the next one.
pub const LOUDNESS_BLOCK_OVERLAP: f64 = 0.5;

/// Offset applied to `10·log10(mean power)`.
pub const LOUDNESS_OFFSET_DB: f64 = -0.691;

pub const DEFAULT_CLIPPING_THRESHOLD: f32 = 0.99;

/// Peak-to-RMS relationship of a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicRange {
    /// `20·log10(peak / rms)`.
    pub range_db: f64,
    /// `peak / rms`.
    pub crest_factor: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClippingReport {
    pub has_clipping: bool,
    pub clipped_sample_count: usize,
    pub clipping_percentage: f64,
}

/// Summary of a buffer's level, dynamics and stereo properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub lufs: f64,
    pub peak_db: f64,
    pub rms: f64,
    pub rms_db: f64,
    pub dynamic_range: f64,
    pub crest_factor: f64,
    pub clipping: ClippingReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stereo_image: Option<StereoImage>,
}

/// Loudness of a mono signal.
pub fn loudness(samples: &[f32], sample_rate: f64) -> f64 {
    loudness_channels(&[samples], sample_rate)
}

/// Loudness of one or more channels, summing per-channel block power.
///
/// Returns [`SILENCE_FLOOR_DB`] for silence, for input shorter than one
/// block and for an invalid sample rate.
pub fn loudness_channels(channels: &[&[f32]], sample_rate: f64) -> f64 {
    let Some(power) = mean_block_power(channels, sample_rate) else {
        return SILENCE_FLOOR_DB;
    };
    if power <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    let lufs = LOUDNESS_OFFSET_DB + 10.0 * power.log10();
    if !lufs.is_finite() {
        tracing::warn!(power, "non-finite loudness clamped to floor");
    }
    round_to(finite_or(lufs, SILENCE_FLOOR_DB).max(SILENCE_FLOOR_DB), DB_PRECISION)
}

fn mean_block_power(channels: &[&[f32]], sample_rate: f64) -> Option<f64> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return None;
    }
    let len = channels.iter().map(|c| c.len()).min()?;
    let block = (LOUDNESS_BLOCK_SECONDS * sample_rate).round() as usize;
    if block == 0 || len < block {
        return None;
    }
    let step = ((block as f64 * (1.0 - LOUDNESS_BLOCK_OVERLAP)).round() as usize).max(1);

    let mut total = 0.0f64;
    let mut blocks = 0usize;
    for start in (0..=len - block).step_by(step) {
        total += channels
            .iter()
            .map(|c| mean_square(&c[start..start + block]))
            .sum::<f64>();
        blocks += 1;
    }
    Some(safe_div(total, blocks as f64, 0.0))
}

#[inline]
fn mean_square(samples: &[f32]) -> f64 {
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    safe_div(sum, samples.len() as f64, 0.0)
}

fn raw_peak(samples: &[f32]) -> f64 {
    samples
        .iter()
        .map(|s| s.abs() as f64)
        .filter(|s| s.is_finite())
        .fold(0.0, f64::max)
}

fn raw_rms(samples: &[f32]) -> f64 {
    finite_or(mean_square(samples).sqrt(), 0.0)
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f64 {
    round_to(raw_peak(samples), LINEAR_PRECISION)
}

/// `20·log10(peak)`, floored.
pub fn peak_db(samples: &[f32]) -> f64 {
    round_to(amplitude_to_db(raw_peak(samples)), DB_PRECISION)
}

pub fn rms(samples: &[f32]) -> f64 {
    round_to(raw_rms(samples), LINEAR_PRECISION)
}

pub fn rms_db(samples: &[f32]) -> f64 {
    round_to(amplitude_to_db(raw_rms(samples)), DB_PRECISION)
}

/// Peak-to-RMS ratio. Zeros for empty or silent input.
pub fn dynamic_range(samples: &[f32]) -> DynamicRange {
    let rms = raw_rms(samples);
    if rms <= 0.0 {
        return DynamicRange::default();
    }
    let crest = safe_div(raw_peak(samples), rms, 0.0);
    let range_db = if crest > 0.0 {
        finite_or(20.0 * crest.log10(), 0.0)
    } else {
        0.0
    };
    DynamicRange {
        range_db: round_to(range_db, DB_PRECISION),
        crest_factor: round_to(crest, LINEAR_PRECISION),
    }
}

/// Count samples whose magnitude meets or exceeds `threshold`.
pub fn detect_clipping(samples: &[f32], threshold: f32) -> ClippingReport {
    let count = samples.iter().filter(|s| s.abs() >= threshold).count();
    let percentage = safe_div(count as f64 * 100.0, samples.len() as f64, 0.0);
    ClippingReport {
        has_clipping: count > 0,
        clipped_sample_count: count,
        clipping_percentage: round_to(percentage, PERCENT_PRECISION),
    }
}

/// Full analysis of a buffer. Level metrics pool all channels; loudness sums
/// channel power; the stereo image is present only for two-channel buffers.
pub fn analyze(buffer: &SampleBuffer, clipping_threshold: f32) -> AnalysisResult {
    let channels: Vec<&[f32]> = buffer.channels().collect();
    let pooled: Vec<f32>;
    let all: &[f32] = if channels.len() == 1 {
        channels[0]
    } else {
        pooled = channels.concat();
        &pooled
    };

    let range = dynamic_range(all);
    let stereo = match channels.as_slice() {
        [left, right] => Some(stereo_image(left, right)),
        _ => None,
    };

    AnalysisResult {
        lufs: loudness_channels(&channels, buffer.sample_rate()),
        peak_db: peak_db(all),
        rms: rms(all),
        rms_db: rms_db(all),
        dynamic_range: range.range_db,
        crest_factor: range.crest_factor,
        clipping: detect_clipping(all, clipping_threshold),
        stereo_image: stereo,
    }
}
