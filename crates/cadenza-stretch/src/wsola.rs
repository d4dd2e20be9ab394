//! Waveform-similarity overlap-add (WSOLA)
//!
//! Time-stretches by cutting the input into overlapping segments and placing
//! them at a fixed synthesis hop. Each segment's read position may move up
//! to a quarter window away from where the map puts it, to the offset whose
//! waveform best continues the previous segment. Better for drums and
//! percussive material than the phase vocoder.
//!
//! ## Algorithm Overview
//!
//! 1. **Scheduling**: output segment `j` is centred at `j × Hs`, nominal
//!    source position from the map
//! 2. **Similarity search**: normalised cross-correlation between the
//!    candidate's leading half and the natural continuation of the previous
//!    segment; smallest offset wins ties
//! 3. **Crossfade**: Hann-windowed overlap-add, normalised by window sum

use cadenza_core::{CancellationToken, Error, Result};

use crate::map::TimeMap;
use crate::phase_vocoder::DEFAULT_CHECK_INTERVAL;
use crate::types::WsolaWindow;
use crate::window::{create_hann_window, normalize, read_padded};

/// Correlation gain a later candidate needs to displace an earlier one.
const SIMILARITY_EPSILON: f64 = 1e-9;

/// Correlation is evaluated on every second sample.
const CORRELATION_STRIDE: usize = 2;

/// WSOLA time-stretcher
#[derive(Debug, Clone)]
pub struct Wsola {
    window_len: usize,
    window: Vec<f32>,
    check_interval: usize,
}

impl Wsola {
    pub fn new(window: WsolaWindow, sample_rate: f64) -> Self {
        let len = window.samples(sample_rate);
        Self {
            window_len: len,
            window: create_hann_window(len),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, frames: usize) -> Self {
        self.check_interval = frames.max(1);
        self
    }

    /// Segment length in samples
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Output hop (50% overlap)
    pub fn synthesis_hop(&self) -> usize {
        self.window_len / 2
    }

    /// Maximum read offset explored by the similarity search.
    pub fn tolerance(&self) -> usize {
        self.window_len / 4
    }

    /// Render `output_len` samples of `input` warped through `map`.
    pub fn stretch(
        &self,
        input: &[f32],
        map: &dyn TimeMap,
        output_len: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let len = self.window_len;
        let half = (len / 2) as i64;
        let hop = self.synthesis_hop();
        let tolerance = self.tolerance() as i64;

        let mut output = vec![0.0f32; output_len];
        let mut weight = vec![0.0f32; output_len];

        let mut segment = vec![0.0f32; len];
        let mut natural = vec![0.0f32; len / 2];
        let mut candidate = vec![0.0f32; len / 2];

        let mut prev_centre: Option<i64> = None;
        let mut segments = 0usize;

        for j in 0.. {
            let out_centre = (j * hop) as i64;
            if out_centre - half >= output_len as i64 {
                break;
            }
            if j % self.check_interval == 0 {
                cancel.check()?;
            }

            let nominal_pos = map.to_source(out_centre as f64).round();
            if !nominal_pos.is_finite() {
                return Err(Error::Algorithm("time map produced a non-finite source position".into()));
            }
            let nominal = nominal_pos as i64;
            if nominal - half >= input.len() as i64 {
                break;
            }

            let centre = match prev_centre {
                None => nominal,
                Some(prev) => {
                    // leading half of the segment that would follow `prev` seamlessly
                    read_padded(input, prev + hop as i64 - half, &mut natural);
                    let mut best = (nominal, f64::NEG_INFINITY);
                    for delta in search_order(tolerance) {
                        read_padded(input, nominal + delta - half, &mut candidate);
                        let score = similarity(&natural, &candidate);
                        if score > best.1 + SIMILARITY_EPSILON {
                            best = (nominal + delta, score);
                        }
                    }
                    best.0
                }
            };

            read_padded(input, centre - half, &mut segment);
            let start = out_centre - half;
            for (i, (&s, &w)) in segment.iter().zip(&self.window).enumerate() {
                let idx = start + i as i64;
                if idx < 0 || idx >= output_len as i64 {
                    continue;
                }
                output[idx as usize] += s * w;
                weight[idx as usize] += w;
            }

            prev_centre = Some(centre);
            segments += 1;
        }

        normalize(&mut output, &weight);
        tracing::trace!(segments, window = len, "wsola pass");
        Ok(output)
    }
}

/// Offsets `0, -1, 1, -2, 2, …` up to `±tolerance`.
fn search_order(tolerance: i64) -> impl Iterator<Item = i64> {
    std::iter::once(0).chain((1..=tolerance).flat_map(|d| [-d, d]))
}

/// Normalised cross-correlation; 0 when either side is silent.
fn similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut energy_a = 0.0f64;
    let mut energy_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b).step_by(CORRELATION_STRIDE) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        energy_a += x * x;
        energy_b += y * y;
    }
    let denom = (energy_a * energy_b).sqrt();
    if denom > 1e-12 {
        dot / denom
    } else {
        0.0
    }
}
