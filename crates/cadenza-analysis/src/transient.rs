//! Transient (onset) detection.
//!
//! Builds a novelty curve over overlapping Hann-windowed frames (spectral
//! flux by default), picks local maxima above an adaptive threshold and
//! enforces a minimum gap between accepted onsets.
//!
//! The threshold is a moving median of the novelty curve plus a multiple of
//! its standard deviation. Both that multiple and the required prominence
//! relative to the strongest frame shrink as `sensitivity` rises.

use cadenza_core::{ensure_in_range, Error, Result, SampleBuffer};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default FFT size for analysis
pub const DEFAULT_FFT_SIZE: usize = 1024;

/// Default hop size (samples between analysis frames)
pub const DEFAULT_HOP_SIZE: usize = 512;

/// Frames on each side of the moving median.
const MEDIAN_RADIUS: usize = 8;

/// Threshold multiple of the standard deviation at sensitivity 0 and 1.
const STD_MULTIPLE_MAX: f32 = 3.0;
const STD_MULTIPLE_MIN: f32 = 0.1;

/// Required fraction of the strongest frame at sensitivity 0 and 1.
const PROMINENCE_MAX: f32 = 0.5;
const PROMINENCE_MIN: f32 = 0.02;

/// Novelty curves whose maximum stays below this are treated as silence.
const SILENCE_NOVELTY: f32 = 1e-9;

/// A detected transient/onset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transient {
    /// Sample position of the transient
    pub sample_position: usize,
    /// Time position in seconds
    pub time: f64,
    /// Strength relative to the strongest onset in the buffer, in (0, 1]
    pub strength: f32,
}

/// Novelty function used to build the detection curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Spectral flux (default, good for most audio)
    #[default]
    SpectralFlux,
    /// High-frequency content (good for percussive material)
    HighFrequencyContent,
    /// Rise in frame energy (simple, fast)
    Energy,
}

/// Offline transient detector. Holds no per-signal state, so one detector can
/// serve many buffers concurrently.
pub struct TransientDetector {
    sample_rate: f64,
    fft_size: usize,
    hop_size: usize,
    method: DetectionMethod,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for TransientDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientDetector")
            .field("sample_rate", &self.sample_rate)
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .field("method", &self.method)
            .finish()
    }
}

impl TransientDetector {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, DEFAULT_FFT_SIZE, DEFAULT_HOP_SIZE)
    }

    /// Create with custom FFT and hop size. The FFT size is rounded up to a
    /// power of two and the hop clamped to `1..=fft_size`.
    pub fn with_params(sample_rate: f64, fft_size: usize, hop_size: usize) -> Self {
        let fft_size = fft_size.max(2).next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            sample_rate,
            fft_size,
            hop_size: hop_size.clamp(1, fft_size),
            method: DetectionMethod::SpectralFlux,
            window: create_hann_window(fft_size),
            fft,
        }
    }

    pub fn set_method(&mut self, method: DetectionMethod) {
        self.method = method;
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Detect onsets in mono `samples`.
    ///
    /// Returns transients sorted by time. Silence and input shorter than one
    /// analysis window yield an empty list. Fails only for a sensitivity
    /// outside `[0, 1]` or a negative/non-finite gap.
    pub fn detect(
        &self,
        samples: &[f32],
        sensitivity: f64,
        min_gap_seconds: f64,
    ) -> Result<Vec<Transient>> {
        self.detect_at_rate(samples, self.sample_rate, sensitivity, min_gap_seconds)
    }

    /// Detect onsets in the mono mixdown of `buffer`, timed at the buffer's rate.
    pub fn detect_buffer(
        &self,
        buffer: &SampleBuffer,
        sensitivity: f64,
        min_gap_seconds: f64,
    ) -> Result<Vec<Transient>> {
        let mono = buffer.mixdown();
        self.detect_at_rate(&mono, buffer.sample_rate(), sensitivity, min_gap_seconds)
    }

    fn detect_at_rate(
        &self,
        samples: &[f32],
        sample_rate: f64,
        sensitivity: f64,
        min_gap_seconds: f64,
    ) -> Result<Vec<Transient>> {
        ensure_in_range("sensitivity", sensitivity, 0.0, 1.0)?;
        if !min_gap_seconds.is_finite() || min_gap_seconds < 0.0 {
            return Err(Error::invalid(
                "min_gap_seconds",
                format!("{min_gap_seconds} must be finite and non-negative"),
            ));
        }
        if samples.len() < self.fft_size {
            return Ok(Vec::new());
        }

        let novelty = self.novelty_curve(samples);
        let candidates = pick_peaks(&novelty, sensitivity as f32);
        let min_gap = (min_gap_seconds * sample_rate).round() as usize;

        let centre = self.fft_size / 2;
        let transients: Vec<Transient> = suppress_close(candidates, min_gap, self.hop_size)
            .into_iter()
            .map(|(frame, strength)| {
                let sample_position = frame * self.hop_size + centre;
                Transient {
                    sample_position,
                    time: sample_position as f64 / sample_rate,
                    strength,
                }
            })
            .collect();

        tracing::debug!(
            method = ?self.method,
            frames = novelty.len(),
            onsets = transients.len(),
            "transient detection"
        );
        Ok(transients)
    }

    fn novelty_curve(&self, samples: &[f32]) -> Vec<f32> {
        let bins = self.fft_size / 2;
        let num_frames = (samples.len() - self.fft_size) / self.hop_size + 1;
        let mut curve = Vec::with_capacity(num_frames);
        let mut prev_magnitudes = vec![0.0f32; bins];
        let mut prev_energy = 0.0f32;
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop_size;
            let frame = &samples[start..start + self.fft_size];

            let value = match self.method {
                DetectionMethod::SpectralFlux => {
                    self.spectrum(frame, &mut buffer);
                    let mut flux = 0.0;
                    for (prev, c) in prev_magnitudes.iter_mut().zip(&buffer[..bins]) {
                        let mag = c.norm();
                        flux += (mag - *prev).max(0.0);
                        *prev = mag;
                    }
                    flux
                }
                DetectionMethod::HighFrequencyContent => {
                    self.spectrum(frame, &mut buffer);
                    let hfc: f32 = buffer[..bins]
                        .iter()
                        .enumerate()
                        .map(|(i, c)| (i + 1) as f32 * c.norm_sqr())
                        .sum();
                    hfc.sqrt()
                }
                DetectionMethod::Energy => {
                    let energy = frame
                        .iter()
                        .zip(&self.window)
                        .map(|(s, w)| (s * w) * (s * w))
                        .sum::<f32>()
                        .sqrt();
                    let rise = (energy - prev_energy).max(0.0);
                    prev_energy = energy;
                    rise
                }
            };
            curve.push(if value.is_finite() { value } else { 0.0 });
        }
        curve
    }

    fn spectrum(&self, frame: &[f32], buffer: &mut [Complex<f32>]) {
        for ((out, &s), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
            *out = Complex::new(s * w, 0.0);
        }
        self.fft.process(buffer);
    }
}

pub(crate) fn create_hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let angle = 2.0 * core::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - angle.cos())
        })
        .collect()
}

/// Local maxima above the adaptive threshold, as `(frame, strength)`.
fn pick_peaks(novelty: &[f32], sensitivity: f32) -> Vec<(usize, f32)> {
    let max_val = novelty.iter().copied().fold(0.0f32, f32::max);
    if novelty.is_empty() || max_val <= SILENCE_NOVELTY {
        return Vec::new();
    }

    let len = novelty.len() as f32;
    let (sum, sum_sq) = novelty
        .iter()
        .fold((0.0f32, 0.0f32), |(s, sq), &v| (s + v, sq + v * v));
    let mean = sum / len;
    let std_dev = (sum_sq / len - mean * mean).max(0.0).sqrt();

    let k = STD_MULTIPLE_MAX - (STD_MULTIPLE_MAX - STD_MULTIPLE_MIN) * sensitivity;
    let prominence = (PROMINENCE_MAX - (PROMINENCE_MAX - PROMINENCE_MIN) * sensitivity) * max_val;

    let mut peaks = Vec::new();
    let mut scratch = Vec::with_capacity(2 * MEDIAN_RADIUS + 1);
    for i in 0..novelty.len() {
        let val = novelty[i];
        let prev_val = if i > 0 { novelty[i - 1] } else { 0.0 };
        let next_val = novelty.get(i + 1).copied().unwrap_or(0.0);
        if !(val > prev_val && val >= next_val) || val < prominence {
            continue;
        }

        let lo = i.saturating_sub(MEDIAN_RADIUS);
        let hi = (i + MEDIAN_RADIUS + 1).min(novelty.len());
        scratch.clear();
        scratch.extend_from_slice(&novelty[lo..hi]);
        let threshold = median(&mut scratch) + k * std_dev;

        if val > threshold {
            peaks.push((i, (val / max_val).min(1.0)));
        }
    }
    peaks
}

fn median(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    *m
}

/// Accept candidates strongest-first, dropping any closer than `min_gap`
/// samples to an accepted one. Returns accepted candidates in time order.
fn suppress_close(mut candidates: Vec<(usize, f32)>, min_gap: usize, hop: usize) -> Vec<(usize, f32)> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut accepted: Vec<(usize, f32)> = Vec::with_capacity(candidates.len());
    for (frame, strength) in candidates {
        let position = frame * hop;
        let too_close = accepted
            .iter()
            .any(|&(other, _)| position.abs_diff(other * hop) < min_gap);
        if !too_close {
            accepted.push((frame, strength));
        }
    }
    accepted.sort_by_key(|&(frame, _)| frame);
    accepted
}

/// Onset times in seconds, for turning detections into markers.
pub fn onset_times(transients: &[Transient]) -> Vec<f64> {
    transients.iter().map(|t| t.time).collect()
}
