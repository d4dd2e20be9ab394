//! Beat quantization: pull detected onsets toward a tempo grid.
//!
//! Each onset becomes a [`MarkerType::Tempo`](cadenza_core::MarkerType)
//! marker whose target is `source + strength × (grid − source)`. Onsets that
//! would tie or invert in target time are resolved by dropping the weaker
//! onset, and the clip origin `(0, 0)` always wins.

use crate::transient::{Transient, TransientDetector};
use cadenza_core::{ensure_in_range, Error, Result, SampleBuffer, WarpMap, WarpMarker};
use serde::{Deserialize, Serialize};

pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 999.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeParams {
    pub target_bpm: f64,
    /// 0 leaves timing untouched, 1 snaps fully to the grid.
    pub strength: f64,
    /// Transient detector sensitivity.
    pub sensitivity: f64,
    /// Grid lines per beat.
    pub subdivision: u32,
    /// Position of the first grid line.
    pub grid_offset_seconds: f64,
    pub min_gap_seconds: f64,
}

impl Default for QuantizeParams {
    fn default() -> Self {
        Self {
            target_bpm: 120.0,
            strength: 1.0,
            sensitivity: 0.5,
            subdivision: 1,
            grid_offset_seconds: 0.0,
            min_gap_seconds: 0.05,
        }
    }
}

impl QuantizeParams {
    pub fn new(target_bpm: f64, strength: f64, sensitivity: f64) -> Self {
        Self {
            target_bpm,
            strength,
            sensitivity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_in_range("target_bpm", self.target_bpm, MIN_BPM, MAX_BPM)?;
        ensure_in_range("strength", self.strength, 0.0, 1.0)?;
        ensure_in_range("sensitivity", self.sensitivity, 0.0, 1.0)?;
        if self.subdivision == 0 {
            return Err(Error::invalid("subdivision", "must be at least 1"));
        }
        if !self.grid_offset_seconds.is_finite() {
            return Err(Error::invalid("grid_offset_seconds", "must be finite"));
        }
        if !self.min_gap_seconds.is_finite() || self.min_gap_seconds < 0.0 {
            return Err(Error::invalid(
                "min_gap_seconds",
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }

    /// Seconds between grid lines.
    pub fn grid_spacing(&self) -> f64 {
        60.0 / self.target_bpm / self.subdivision as f64
    }

    /// Nearest grid line to `time`.
    pub fn grid_time(&self, time: f64) -> f64 {
        let spacing = self.grid_spacing();
        let offset = self.grid_offset_seconds;
        offset + ((time - offset) / spacing).round() * spacing
    }
}

/// Detects onsets and turns them into grid-aligned warp markers.
#[derive(Debug)]
pub struct BeatQuantizer {
    detector: TransientDetector,
}

impl BeatQuantizer {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_detector(TransientDetector::new(sample_rate))
    }

    pub fn with_detector(detector: TransientDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &TransientDetector {
        &self.detector
    }

    /// Detect onsets in `buffer` and quantize them.
    pub fn quantize(&self, buffer: &SampleBuffer, params: &QuantizeParams) -> Result<Vec<WarpMarker>> {
        params.validate()?;
        let transients =
            self.detector
                .detect_buffer(buffer, params.sensitivity, params.min_gap_seconds)?;
        quantize_onsets(&transients, params, buffer.duration_seconds())
    }
}

/// Quantize pre-detected onsets of a clip lasting `clip_duration` seconds.
///
/// The returned markers are sorted, strictly monotonic and accepted by
/// [`WarpMap::build`].
pub fn quantize_onsets(
    transients: &[Transient],
    params: &QuantizeParams,
    clip_duration: f64,
) -> Result<Vec<WarpMarker>> {
    params.validate()?;

    let mut onsets: Vec<&Transient> = transients
        .iter()
        .filter(|t| t.time.is_finite() && t.time <= clip_duration)
        .collect();
    onsets.sort_by(|a, b| a.time.total_cmp(&b.time));

    let strength = params.strength;
    let mut accepted: Vec<(f64, f64, f32)> = Vec::with_capacity(onsets.len());
    let mut dropped = 0usize;

    'onsets: for onset in onsets {
        let source = onset.time;
        let grid = params.grid_time(source);
        let target = (1.0 - strength) * source + strength * grid;

        // origin anchor
        if source <= 0.0 || target <= 0.0 {
            dropped += 1;
            continue;
        }

        while let Some(&(last_source, last_target, last_strength)) = accepted.last() {
            if last_source < source && last_target < target {
                break;
            }
            if onset.strength > last_strength {
                accepted.pop();
                dropped += 1;
            } else {
                dropped += 1;
                continue 'onsets;
            }
        }
        accepted.push((source, target, onset.strength));
    }

    if dropped > 0 {
        tracing::warn!(dropped, kept = accepted.len(), "quantizer dropped conflicting onsets");
    }

    let markers: Vec<WarpMarker> = accepted
        .into_iter()
        .enumerate()
        .map(|(n, (source, target, _))| WarpMarker::tempo(format!("q{n}"), source, target))
        .collect();

    WarpMap::build(&markers, clip_duration)?;
    Ok(markers)
}
