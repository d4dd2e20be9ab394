//! Test helpers and fixtures for Cadenza integration tests
//!
//! Deterministic signal generators, buffer constructors and comparison
//! utilities shared by the integration test files.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (copies, unity gain)
//! - `DSP_EPSILON` (1e-4): Overlap-add reconstruction
//! - `LEVEL_TOLERANCE` (0.1): RMS after time-stretching
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use cadenza::prelude::*;

/// Default test sample rate
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Create an engine with the default configuration.
pub fn test_engine() -> CadenzaEngine {
    CadenzaEngine::builder()
        .build()
        .expect("Failed to create test engine")
}

/// Engine without telemetry or caching, for tests that count work.
pub fn bare_engine() -> CadenzaEngine {
    CadenzaEngine::builder()
        .cache_capacity(0)
        .telemetry(false)
        .build()
        .expect("Failed to create test engine")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate white noise (random samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 4.0 - 1.0
        })
        .collect()
}

/// Decaying noise bursts at the given times, silence elsewhere.
pub fn generate_clicks(times: &[f64], sample_rate: f64, num_samples: usize) -> Vec<f32> {
    let burst_len = (0.03 * sample_rate) as usize;
    let noise = generate_noise(burst_len, 7);
    let mut out = vec![0.0f32; num_samples];
    for &t in times {
        let start = (t * sample_rate) as usize;
        for (i, n) in noise.iter().enumerate() {
            if let Some(s) = out.get_mut(start + i) {
                let decay = (-(i as f32) / (burst_len as f32 / 5.0)).exp();
                *s += 0.8 * n * decay;
            }
        }
    }
    out
}

/// Generate a linear ramp from start to end value.
pub fn generate_ramp(start: f32, end: f32, num_samples: usize) -> Vec<f32> {
    if num_samples <= 1 {
        return vec![start; num_samples];
    }
    (0..num_samples)
        .map(|i| start + (end - start) * i as f32 / (num_samples - 1) as f32)
        .collect()
}

pub fn mono_buffer(samples: Vec<f32>) -> SampleBuffer {
    SampleBuffer::mono(samples, TEST_SAMPLE_RATE).expect("valid mono buffer")
}

pub fn stereo_buffer(left: Vec<f32>, right: Vec<f32>) -> SampleBuffer {
    SampleBuffer::stereo(left, right, TEST_SAMPLE_RATE).expect("valid stereo buffer")
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Rough frequency estimate from positive-going zero crossings.
pub fn zero_crossing_frequency(samples: &[f32], sample_rate: f64) -> f64 {
    let crossings = samples
        .windows(2)
        .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
        .count();
    crossings as f64 * sample_rate / samples.len() as f64
}

// =============================================================================
// Audio Comparison Utilities
// =============================================================================

/// Result of comparing two audio buffers.
#[derive(Debug, Clone)]
pub struct AudioComparisonResult {
    /// Whether all samples are within tolerance.
    pub equal: bool,
    /// Maximum absolute difference between any two samples.
    pub max_diff: f32,
    /// Index of first sample that exceeds tolerance (if any).
    pub first_diff_sample: Option<usize>,
    /// Number of samples that exceed tolerance.
    pub num_diffs: usize,
}

/// Compare two audio buffers with epsilon tolerance.
pub fn compare_audio(a: &[f32], b: &[f32], epsilon: f32) -> AudioComparisonResult {
    if a.len() != b.len() {
        return AudioComparisonResult {
            equal: false,
            max_diff: f32::MAX,
            first_diff_sample: Some(0),
            num_diffs: std::cmp::max(a.len(), b.len()),
        };
    }

    let mut max_diff: f32 = 0.0;
    let mut first_diff: Option<usize> = None;
    let mut num_diffs = 0;

    for (i, (&x, &y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        max_diff = max_diff.max(diff);
        if diff > epsilon {
            num_diffs += 1;
            if first_diff.is_none() {
                first_diff = Some(i);
            }
        }
    }

    AudioComparisonResult {
        equal: num_diffs == 0,
        max_diff,
        first_diff_sample: first_diff,
        num_diffs,
    }
}

/// Check if audio is silent (all samples below threshold).
pub fn is_silent(samples: &[f32], threshold: f32) -> bool {
    samples.iter().all(|&s| s.abs() <= threshold)
}

// =============================================================================
// Assertion Functions
// =============================================================================

/// Assert that two buffers match within `epsilon`, reporting the first mismatch.
pub fn assert_audio_equal(actual: &[f32], expected: &[f32], epsilon: f32) {
    let result = compare_audio(actual, expected, epsilon);
    assert!(
        result.equal,
        "Audio mismatch: {} samples differ, max diff {} (first at {:?})",
        result.num_diffs,
        result.max_diff,
        result.first_diff_sample
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f32], min_rms: f32) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}

/// Assert that every sample is finite.
pub fn assert_finite(samples: &[f32]) {
    if let Some(i) = samples.iter().position(|s| !s.is_finite()) {
        panic!("Non-finite sample {} at index {}", samples[i], i);
    }
}
