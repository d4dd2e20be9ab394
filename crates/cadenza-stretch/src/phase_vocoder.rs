//! Offline phase vocoder driven by a time map.
//!
//! ## Algorithm Overview
//!
//! 1. **Analysis**: Hann-windowed frames every `Ha` input samples, FFT
//! 2. **Placement**: each frame's synthesis position is the map's output
//!    position for the frame centre, rounded to a sample, so anchor points
//!    land exactly where the map puts them
//! 3. **Phase propagation**: instantaneous frequency from the analysis phase
//!    difference, advanced by the actual synthesis hop of that frame
//! 4. **Phase locking** (high-quality variant): bins follow the phase of their
//!    nearest spectral peak, which keeps partials coherent
//! 5. **Synthesis**: IFFT, synthesis window, overlap-add, normalised by the
//!    accumulated squared window
//!
//! Phase state runs through the whole range, so segment boundaries in a
//! piecewise map introduce no discontinuity.

use cadenza_core::{CancellationToken, Error, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::map::TimeMap;
use crate::types::FftSize;
use crate::window::{create_hann_window, normalize, read_padded};

/// Frames between cancellation checks unless configured otherwise.
pub const DEFAULT_CHECK_INTERVAL: usize = 64;

/// Phase vocoder time-stretcher.
///
/// Holds only immutable configuration and FFT plans; every call to
/// [`stretch`](Self::stretch) allocates its own working buffers, so one
/// instance can process several channels in parallel.
#[derive(Clone)]
pub struct PhaseVocoder {
    fft_size: usize,
    phase_locked: bool,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    check_interval: usize,
}

impl std::fmt::Debug for PhaseVocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseVocoder")
            .field("fft_size", &self.fft_size)
            .field("phase_locked", &self.phase_locked)
            .field("check_interval", &self.check_interval)
            .finish()
    }
}

impl PhaseVocoder {
    /// Create a vocoder. `phase_locked` enables identity phase locking.
    pub fn new(fft_size: FftSize, phase_locked: bool) -> Self {
        let size = fft_size.size();
        let mut planner = FftPlanner::new();
        Self {
            fft_size: size,
            phase_locked,
            window: create_hann_window(size),
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_check_interval(mut self, frames: usize) -> Self {
        self.check_interval = frames.max(1);
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn is_phase_locked(&self) -> bool {
        self.phase_locked
    }

    /// Analysis hop for a map whose steepest slope is `max_ratio`.
    ///
    /// Keeps the largest synthesis hop at or below half a frame so the
    /// overlap-add never leaves gaps.
    pub fn analysis_hop(&self, max_ratio: f64) -> usize {
        let n = self.fft_size as f64;
        let ratio = if max_ratio.is_finite() && max_ratio > 0.0 {
            max_ratio
        } else {
            1.0
        };
        let hop = (n / 4.0).min(n / (2.0 * ratio));
        (hop.floor() as usize).max(1)
    }

    /// Render `output_len` samples of `input` warped through `map`.
    pub fn stretch(
        &self,
        input: &[f32],
        map: &dyn TimeMap,
        output_len: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let n = self.fft_size;
        let half = n / 2;
        let bins = half + 1;
        let hop = self.analysis_hop(map.max_ratio());

        let mut output = vec![0.0f32; output_len];
        let mut weight = vec![0.0f32; output_len];
        if output_len == 0 {
            return Ok(output);
        }

        let first_centre = map.to_source(0.0);
        if !first_centre.is_finite() {
            return Err(Error::Algorithm("time map produced a non-finite source position".into()));
        }

        let mut frame = vec![0.0f32; n];
        let mut spectrum = vec![Complex::new(0.0f32, 0.0); n];
        let mut magnitudes = vec![0.0f32; bins];
        let mut analysis_phase = vec![0.0f64; bins];
        let mut prev_analysis_phase = vec![0.0f64; bins];
        let mut synthesis_phase = vec![0.0f64; bins];
        let mut peaks: Vec<usize> = Vec::with_capacity(bins / 2);

        let bin_omega: Vec<f64> = (0..bins).map(|k| 2.0 * PI * k as f64 / n as f64).collect();

        let mut prev_output: Option<i64> = None;
        let mut frame_idx = 0usize;

        loop {
            let centre = first_centre + (frame_idx * hop) as f64;
            let out_pos = map.to_output(centre).round();
            if !out_pos.is_finite() {
                return Err(Error::Algorithm("time map produced a non-finite output position".into()));
            }
            let out_centre = out_pos as i64;
            if out_centre - half as i64 >= output_len as i64
                || centre - half as f64 >= input.len() as f64
            {
                break;
            }
            if frame_idx % self.check_interval == 0 {
                cancel.check()?;
            }

            // 1. Analysis
            read_padded(input, centre.round() as i64 - half as i64, &mut frame);
            for ((c, &s), &w) in spectrum.iter_mut().zip(&frame).zip(&self.window) {
                *c = Complex::new(s * w, 0.0);
            }
            self.forward.process(&mut spectrum);
            for k in 0..bins {
                magnitudes[k] = spectrum[k].norm();
                analysis_phase[k] = spectrum[k].arg() as f64;
            }

            // 2. Phase propagation
            match prev_output {
                None => synthesis_phase.copy_from_slice(&analysis_phase),
                Some(prev) => {
                    let synthesis_hop = (out_centre - prev) as f64;
                    let advance = |k: usize| {
                        let expected = bin_omega[k] * hop as f64;
                        let deviation =
                            wrap_phase(analysis_phase[k] - prev_analysis_phase[k] - expected);
                        (bin_omega[k] + deviation / hop as f64) * synthesis_hop
                    };

                    if self.phase_locked {
                        find_peaks(&magnitudes, &mut peaks);
                    }
                    if self.phase_locked && !peaks.is_empty() {
                        for &p in &peaks {
                            synthesis_phase[p] = wrap_phase(synthesis_phase[p] + advance(p));
                        }
                        lock_to_peaks(&peaks, &analysis_phase, &mut synthesis_phase);
                    } else {
                        for k in 0..bins {
                            synthesis_phase[k] = wrap_phase(synthesis_phase[k] + advance(k));
                        }
                    }
                }
            }
            prev_analysis_phase.copy_from_slice(&analysis_phase);

            // 3. Resynthesis with conjugate symmetry
            for k in 0..bins {
                spectrum[k] = Complex::from_polar(magnitudes[k], synthesis_phase[k] as f32);
            }
            for k in 1..half {
                spectrum[n - k] = spectrum[k].conj();
            }
            self.inverse.process(&mut spectrum);

            // 4. Overlap-add
            let scale = 1.0 / n as f32;
            let start = out_centre - half as i64;
            for (i, (c, &w)) in spectrum.iter().zip(&self.window).enumerate() {
                let idx = start + i as i64;
                if idx < 0 || idx >= output_len as i64 {
                    continue;
                }
                let idx = idx as usize;
                output[idx] += c.re * scale * w;
                weight[idx] += w * w;
            }

            prev_output = Some(out_centre);
            frame_idx += 1;
        }

        normalize(&mut output, &weight);
        tracing::trace!(frames = frame_idx, hop, locked = self.phase_locked, "phase vocoder pass");
        Ok(output)
    }
}

/// Wrap phase to [-PI, PI]
#[inline]
pub(crate) fn wrap_phase(phase: f64) -> f64 {
    phase - 2.0 * PI * (phase / (2.0 * PI)).round()
}

/// Bins that are local maxima over two neighbours on each side.
fn find_peaks(magnitudes: &[f32], peaks: &mut Vec<usize>) {
    peaks.clear();
    let len = magnitudes.len();
    for k in 0..len {
        let m = magnitudes[k];
        if m <= 0.0 {
            continue;
        }
        let lo = k.saturating_sub(2);
        let hi = (k + 2).min(len - 1);
        let is_peak = (lo..k).all(|j| magnitudes[j] < m) && (k + 1..=hi).all(|j| magnitudes[j] <= m);
        if is_peak {
            peaks.push(k);
        }
    }
}

/// Identity phase locking: each bin keeps its analysis phase offset from the
/// peak whose region it falls in. Region boundaries sit halfway between peaks.
fn lock_to_peaks(peaks: &[usize], analysis_phase: &[f64], synthesis_phase: &mut [f64]) {
    let mut region = 0usize;
    for k in 0..synthesis_phase.len() {
        while region + 1 < peaks.len() && k > (peaks[region] + peaks[region + 1]) / 2 {
            region += 1;
        }
        let p = peaks[region];
        if k != p {
            synthesis_phase[k] =
                wrap_phase(synthesis_phase[p] + analysis_phase[k] - analysis_phase[p]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::UniformMap;
    use std::f32::consts::PI as PI32;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI32 * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_wrap_phase() {
        assert!((wrap_phase(0.0) - 0.0).abs() < 0.001);
        assert!((wrap_phase(3.0 * PI).abs() - PI).abs() < 0.001);
        assert!((wrap_phase(2.0 * PI + 0.5) - 0.5).abs() < 1e-9);
        assert!((wrap_phase(-2.0 * PI - 0.5) + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_analysis_hop() {
        let pv = PhaseVocoder::new(FftSize::Medium, false);
        assert_eq!(pv.analysis_hop(1.0), 512);
        assert_eq!(pv.analysis_hop(0.5), 512);
        assert_eq!(pv.analysis_hop(4.0), 256);
    }

    #[test]
    fn test_unit_ratio_reconstructs_input() {
        let input = sine(440.0, 44100.0, 16384);
        let pv = PhaseVocoder::new(FftSize::Small, false);
        let out = pv
            .stretch(&input, &UniformMap::new(1.0), input.len(), &CancellationToken::new())
            .unwrap();

        assert_eq!(out.len(), input.len());
        for i in 2048..14000 {
            assert!(
                (out[i] - input[i]).abs() < 1e-3,
                "sample {i}: {} vs {}",
                out[i],
                input[i]
            );
        }
    }

    #[test]
    fn test_stretch_preserves_level() {
        let input = sine(440.0, 44100.0, 22050);
        for locked in [false, true] {
            let pv = PhaseVocoder::new(FftSize::Medium, locked);
            let out_len = input.len() * 2;
            let out = pv
                .stretch(&input, &UniformMap::new(2.0), out_len, &CancellationToken::new())
                .unwrap();

            assert_eq!(out.len(), out_len);
            assert!(out.iter().all(|s| s.is_finite()));
            let inner = &out[4096..out_len - 4096];
            let level = rms(inner);
            assert!(
                (level - rms(&input)).abs() < 0.05,
                "locked={locked} rms {level}"
            );
        }
    }

    #[test]
    fn test_compress_output_length() {
        let input = sine(220.0, 44100.0, 44100);
        let pv = PhaseVocoder::new(FftSize::Small, false);
        let out = pv
            .stretch(&input, &UniformMap::new(0.5), 22050, &CancellationToken::new())
            .unwrap();
        assert_eq!(out.len(), 22050);
        assert!(rms(&out[2048..20000]) > 0.3);
    }

    #[test]
    fn test_cancelled() {
        let input = sine(440.0, 44100.0, 8192);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pv = PhaseVocoder::new(FftSize::Small, false);
        let result = pv.stretch(&input, &UniformMap::new(1.5), 12288, &cancel);
        assert_eq!(result, Err(Error::Cancelled));
    }

    #[test]
    fn test_find_peaks() {
        let mags = [0.0, 1.0, 5.0, 1.0, 0.0, 0.5, 3.0, 0.5, 0.0];
        let mut peaks = Vec::new();
        find_peaks(&mags, &mut peaks);
        assert_eq!(peaks, vec![2, 6]);
    }
}
