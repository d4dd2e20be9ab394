//! Cepstral formant correction for pitch-shifted audio.
//!
//! Pitch shifting by stretch-then-resample moves the spectral envelope along
//! with the harmonics, which makes voices sound chipmunked or hollow. The
//! corrector estimates the envelope of the unshifted reference and of the
//! shifted signal frame by frame (low-quefrency cepstrum) and re-weights the
//! shifted spectrum by their ratio. Phases of the shifted signal are kept.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::types::FftSize;
use crate::window::{create_hann_window, normalize, read_padded};

const MAGNITUDE_FLOOR: f32 = 1e-9;
const MIN_CORRECTION: f32 = 0.1;
const MAX_CORRECTION: f32 = 10.0;

/// Cepstral coefficients kept when smoothing the log spectrum.
pub const DEFAULT_LIFTER_ORDER: usize = 40;

#[derive(Clone)]
pub struct FormantCorrector {
    fft_size: usize,
    hop: usize,
    order: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for FormantCorrector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormantCorrector")
            .field("fft_size", &self.fft_size)
            .field("order", &self.order)
            .finish()
    }
}

impl FormantCorrector {
    pub fn new(fft_size: FftSize) -> Self {
        let size = fft_size.size();
        let mut planner = FftPlanner::new();
        Self {
            fft_size: size,
            hop: fft_size.hop_size(),
            order: DEFAULT_LIFTER_ORDER,
            window: create_hann_window(size),
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        }
    }

    /// Lifter order; lower values give a smoother envelope.
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order.clamp(1, self.fft_size / 2);
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Impose the spectral envelope of `reference` onto `shifted`.
    ///
    /// Both signals are read with the same frame grid; the result has the
    /// length of `shifted`.
    pub fn correct(&self, reference: &[f32], shifted: &[f32]) -> Vec<f32> {
        let n = self.fft_size;
        let half = n / 2;
        let bins = half + 1;
        let len = shifted.len();

        let mut output = vec![0.0f32; len];
        let mut weight = vec![0.0f32; len];
        if len == 0 {
            return output;
        }

        let mut frame = vec![0.0f32; n];
        let mut ref_spectrum = vec![Complex::new(0.0f32, 0.0); n];
        let mut spectrum = vec![Complex::new(0.0f32, 0.0); n];
        let mut ref_mags = vec![0.0f32; bins];
        let mut mags = vec![0.0f32; bins];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); n];

        let mut centre = 0i64;
        while centre - (half as i64) < len as i64 {
            let start = centre - half as i64;

            read_padded(reference, start, &mut frame);
            self.windowed_fft(&frame, &mut ref_spectrum);
            read_padded(shifted, start, &mut frame);
            self.windowed_fft(&frame, &mut spectrum);

            for k in 0..bins {
                ref_mags[k] = ref_spectrum[k].norm();
                mags[k] = spectrum[k].norm();
            }
            let ref_env = self.envelope_into(&ref_mags, &mut scratch);
            let env = self.envelope_into(&mags, &mut scratch);

            for k in 0..bins {
                let gain = (ref_env[k] / env[k]).clamp(MIN_CORRECTION, MAX_CORRECTION);
                spectrum[k] *= gain;
            }
            for k in 1..half {
                spectrum[n - k] = spectrum[k].conj();
            }
            self.inverse.process(&mut spectrum);

            let scale = 1.0 / n as f32;
            for (i, (c, &w)) in spectrum.iter().zip(&self.window).enumerate() {
                let idx = start + i as i64;
                if idx < 0 || idx >= len as i64 {
                    continue;
                }
                output[idx as usize] += c.re * scale * w;
                weight[idx as usize] += w * w;
            }

            centre += self.hop as i64;
        }

        normalize(&mut output, &weight);
        output
    }

    /// Smoothed magnitude envelope of a half spectrum (`fft_size / 2 + 1` bins).
    pub fn spectral_envelope(&self, magnitudes: &[f32]) -> Vec<f32> {
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        self.envelope_into(magnitudes, &mut scratch)
    }

    fn windowed_fft(&self, frame: &[f32], spectrum: &mut [Complex<f32>]) {
        for ((c, &s), &w) in spectrum.iter_mut().zip(frame).zip(&self.window) {
            *c = Complex::new(s * w, 0.0);
        }
        self.forward.process(spectrum);
    }

    fn envelope_into(&self, magnitudes: &[f32], scratch: &mut [Complex<f32>]) -> Vec<f32> {
        let n = self.fft_size;
        let half = n / 2;

        // symmetric log spectrum
        for (k, c) in scratch.iter_mut().enumerate() {
            let bin = if k <= half { k } else { n - k };
            let mag = magnitudes.get(bin).copied().unwrap_or(0.0);
            *c = Complex::new(mag.max(MAGNITUDE_FLOOR).ln(), 0.0);
        }
        self.inverse.process(scratch);

        // lifter: keep low quefrencies on both ends
        let scale = 1.0 / n as f32;
        for (q, c) in scratch.iter_mut().enumerate() {
            let keep = q < self.order || q > n - self.order;
            *c = if keep {
                Complex::new(c.re * scale, 0.0)
            } else {
                Complex::new(0.0, 0.0)
            };
        }
        self.forward.process(scratch);

        scratch[..=half].iter().map(|c| c.re.exp()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_flat_spectrum_has_flat_envelope() {
        let corrector = FormantCorrector::new(FftSize::Small);
        let env = corrector.spectral_envelope(&vec![2.0; 513]);
        assert_eq!(env.len(), 513);
        for e in env {
            assert!((e - 2.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_envelope_is_smooth() {
        let corrector = FormantCorrector::new(FftSize::Small).with_order(20);
        // alternating comb: the envelope sits between the extremes
        let mags: Vec<f32> = (0..513).map(|k| if k % 2 == 0 { 1.0 } else { 0.25 }).collect();
        let env = corrector.spectral_envelope(&mags);
        for e in &env[10..500] {
            assert!(*e > 0.3 && *e < 0.9, "{e}");
        }
    }

    #[test]
    fn test_same_signal_is_unchanged() {
        let signal: Vec<f32> = (0..8192)
            .map(|i| 0.4 * (2.0 * PI * 300.0 * i as f32 / 44100.0).sin())
            .collect();
        let corrector = FormantCorrector::new(FftSize::Medium);
        let out = corrector.correct(&signal, &signal);
        assert_eq!(out.len(), signal.len());
        for i in 100..8000 {
            assert!((out[i] - signal[i]).abs() < 1e-3, "sample {i}");
        }
    }

    #[test]
    fn test_silence() {
        let corrector = FormantCorrector::new(FftSize::Medium);
        let out = corrector.correct(&[0.0; 4096], &[0.0; 4096]);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
