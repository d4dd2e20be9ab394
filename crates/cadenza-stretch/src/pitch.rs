//! Duration-preserving pitch shift.
//!
//! A shift of `s` semitones is rendered as a time stretch by `p = 2^(s/12)`
//! followed by resampling the stretched signal back to the original length.
//! The stretch uses the same algorithm as the render, so transient behaviour
//! matches the time-warp stage.

use cadenza_core::{ensure_in_range, CancellationToken, Result};

use crate::formant::FormantCorrector;
use crate::map::UniformMap;
use crate::processor::Stretcher;
use crate::resample::resample;
use crate::types::FftSize;

pub const MAX_SEMITONES: f64 = 24.0;

/// Frequency ratio for a shift in semitones.
#[inline]
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    2.0f64.powf(semitones / 12.0)
}

#[derive(Debug, Clone)]
pub struct PitchShifter {
    stretcher: Stretcher,
    formant: FormantCorrector,
}

impl PitchShifter {
    pub fn new(stretcher: Stretcher) -> Self {
        Self {
            stretcher,
            formant: FormantCorrector::new(FftSize::Medium),
        }
    }

    pub fn with_formant_corrector(mut self, formant: FormantCorrector) -> Self {
        self.formant = formant;
        self
    }

    /// Shift one channel by `semitones`, keeping its length.
    pub fn shift(
        &self,
        input: &[f32],
        semitones: f64,
        preserve_formants: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        ensure_in_range("pitch_shift_semitones", semitones, -MAX_SEMITONES, MAX_SEMITONES)?;
        if semitones == 0.0 || input.is_empty() {
            return Ok(input.to_vec());
        }

        let ratio = semitones_to_ratio(semitones);
        let stretched_len = ((input.len() as f64 * ratio).round() as usize).max(1);
        let stretched =
            self.stretcher
                .stretch(input, &UniformMap::new(ratio), stretched_len, cancel)?;

        cancel.check()?;
        let shifted = resample(&stretched, input.len() as f64 / stretched_len as f64, input.len())?;

        if preserve_formants {
            cancel.check()?;
            Ok(self.formant.correct(input, &shifted))
        } else {
            Ok(shifted)
        }
    }
}
