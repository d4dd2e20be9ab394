//! Stereo-linked feed-forward compressor

use super::utils::{ensure_finite, time_to_coeff};
use cadenza_core::safe_math::{amplitude_to_db, db_to_amplitude, SILENCE_FLOOR_DB};
use cadenza_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Compressor parameters as carried in a render request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    /// Must be >= 1.0
    pub ratio: f32,
    pub attack_seconds: f32,
    pub release_seconds: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_seconds: 0.005,
            release_seconds: 0.1,
        }
    }
}

impl CompressorSettings {
    pub fn new(threshold_db: f32, ratio: f32, attack_seconds: f32, release_seconds: f32) -> Self {
        Self {
            threshold_db,
            ratio,
            attack_seconds,
            release_seconds,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_finite("threshold_db", self.threshold_db as f64)?;
        if (self.threshold_db as f64) < SILENCE_FLOOR_DB {
            return Err(Error::invalid(
                "threshold_db",
                format!("{} is below the {SILENCE_FLOOR_DB} dB floor", self.threshold_db),
            ));
        }
        ensure_finite("ratio", self.ratio as f64)?;
        if self.ratio < 1.0 {
            return Err(Error::invalid("ratio", format!("{} must be >= 1.0", self.ratio)));
        }
        for (name, value) in [
            ("attack_seconds", self.attack_seconds),
            ("release_seconds", self.release_seconds),
        ] {
            ensure_finite(name, value as f64)?;
            if value < 0.0 {
                return Err(Error::invalid(name, format!("{value} must not be negative")));
            }
        }
        Ok(())
    }
}

/// Compressor with one envelope shared by all channels.
///
/// The envelope follows `max(|x|)` across channels with separate attack and
/// release coefficients. Above the threshold, gain is reduced by
/// `over_db × (1 − 1/ratio)`.
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    threshold: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    gain_reduction: f32,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: f64) -> Result<Self> {
        settings.validate()?;
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::invalid("sample_rate", format!("{sample_rate} must be positive")));
        }
        Ok(Self {
            settings,
            threshold: db_to_amplitude(settings.threshold_db as f64) as f32,
            attack_coeff: time_to_coeff(settings.attack_seconds as f64, sample_rate),
            release_coeff: time_to_coeff(settings.release_seconds as f64, sample_rate),
            envelope: 0.0,
            gain_reduction: 0.0,
        })
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Gain reduction applied to the most recent frame.
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.gain_reduction = 0.0;
    }

    #[inline]
    fn compute_gain_reduction(&self, envelope: f32) -> f32 {
        if envelope <= self.threshold {
            return 0.0;
        }
        let over_db = amplitude_to_db(envelope as f64) as f32 - self.settings.threshold_db;
        over_db.max(0.0) * (1.0 - 1.0 / self.settings.ratio)
    }

    /// Compress planar channels in place.
    pub fn process(&mut self, channels: &mut [Vec<f32>]) {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);

        for i in 0..frames {
            let level = channels.iter().fold(0.0f32, |m, c| m.max(c[i].abs()));

            let coeff = if level > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

            self.gain_reduction = self.compute_gain_reduction(self.envelope);
            if self.gain_reduction > 0.0 {
                let gain = db_to_amplitude(-self.gain_reduction as f64) as f32;
                for channel in channels.iter_mut() {
                    channel[i] *= gain;
                }
            }
        }
    }
}
