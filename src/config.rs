//! Engine configuration.

use cadenza_analysis::transient::{DEFAULT_FFT_SIZE, DEFAULT_HOP_SIZE};
use cadenza_analysis::{DetectionMethod, DEFAULT_CLIPPING_THRESHOLD};
use cadenza_core::{ensure_in_range, Error};
use cadenza_stretch::{Quality, StretchAlgorithm};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Request defaults for one render flavour (preview or commit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDefaults {
    pub algorithm: StretchAlgorithm,
    pub quality: Quality,
    pub replace_original: bool,
}

impl RenderDefaults {
    /// Fast, non-destructive.
    pub fn preview() -> Self {
        Self {
            algorithm: StretchAlgorithm::PhaseVocoder,
            quality: Quality::Normal,
            replace_original: false,
        }
    }

    /// Best quality, replaces the stored clip.
    pub fn commit() -> Self {
        Self {
            algorithm: StretchAlgorithm::HighQuality,
            quality: Quality::High,
            replace_original: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientConfig {
    pub fft_size: usize,
    pub hop_size: usize,
    pub sensitivity: f64,
    pub min_gap_seconds: f64,
    pub method: DetectionMethod,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
            sensitivity: 0.5,
            min_gap_seconds: 0.05,
            method: DetectionMethod::SpectralFlux,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    pub subdivision: u32,
    pub grid_offset_seconds: f64,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            subdivision: 1,
            grid_offset_seconds: 0.0,
        }
    }
}

/// Configuration for a [`CadenzaEngine`](crate::CadenzaEngine).
///
/// Deserializes with defaults for any missing field:
///
/// ```
/// use cadenza::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "cache_capacity": 8 }"#).unwrap();
/// assert_eq!(config.cache_capacity, 8);
/// assert!(config.telemetry);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entries per result cache; 0 disables caching.
    pub cache_capacity: usize,
    /// Attach signal metrics to every render result.
    pub telemetry: bool,
    pub clipping_threshold: f32,
    pub preview: RenderDefaults,
    pub commit: RenderDefaults,
    pub transient: TransientConfig,
    pub quantize: QuantizeConfig,
    /// Analysis frames between cancellation checks.
    pub cancel_check_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            telemetry: true,
            clipping_threshold: DEFAULT_CLIPPING_THRESHOLD,
            preview: RenderDefaults::preview(),
            commit: RenderDefaults::commit(),
            transient: TransientConfig::default(),
            quantize: QuantizeConfig::default(),
            cancel_check_interval: 64,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.clipping_threshold;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(Error::invalid(
                "clipping_threshold",
                format!("{threshold} must be in (0, 1]"),
            )
            .into());
        }

        let transient = &self.transient;
        if transient.fft_size < 64 || !transient.fft_size.is_power_of_two() {
            return Err(Error::invalid(
                "transient.fft_size",
                format!("{} must be a power of two >= 64", transient.fft_size),
            )
            .into());
        }
        if transient.hop_size == 0 || transient.hop_size > transient.fft_size {
            return Err(Error::invalid(
                "transient.hop_size",
                format!("{} must be in [1, fft_size]", transient.hop_size),
            )
            .into());
        }
        ensure_in_range("transient.sensitivity", transient.sensitivity, 0.0, 1.0)?;
        if !transient.min_gap_seconds.is_finite() || transient.min_gap_seconds < 0.0 {
            return Err(Error::invalid("transient.min_gap_seconds", "must be finite and non-negative").into());
        }

        if self.quantize.subdivision == 0 {
            return Err(Error::invalid("quantize.subdivision", "must be at least 1").into());
        }
        if !self.quantize.grid_offset_seconds.is_finite() {
            return Err(Error::invalid("quantize.grid_offset_seconds", "must be finite").into());
        }

        if self.cancel_check_interval == 0 {
            return Err(Error::invalid("cancel_check_interval", "must be at least 1").into());
        }
        Ok(())
    }
}
