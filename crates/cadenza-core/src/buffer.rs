//! Planar PCM sample buffer.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bytes per sample in the PCM interchange format (`f32`, little endian, interleaved).
pub const PCM_BYTES_PER_SAMPLE: usize = 4;

/// Immutable planar audio buffer with one or two channels.
///
/// Pipeline stages take a buffer by value and hand back a new one, so a
/// buffer is never aliased between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBuffer")]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
}

#[derive(Deserialize)]
struct RawBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
}

impl TryFrom<RawBuffer> for SampleBuffer {
    type Error = Error;

    fn try_from(raw: RawBuffer) -> Result<Self> {
        Self::new(raw.channels, raw.sample_rate)
    }
}

impl SampleBuffer {
    /// Maximum supported channel count.
    pub const MAX_CHANNELS: usize = 2;

    /// Create a buffer from planar channel data.
    ///
    /// Fails if the channel count is not 1 or 2, channel lengths differ, or
    /// the sample rate is not a positive finite number.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: f64) -> Result<Self> {
        if channels.is_empty() || channels.len() > Self::MAX_CHANNELS {
            return Err(Error::invalid(
                "channels",
                format!("expected 1 or 2 channels, got {}", channels.len()),
            ));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::invalid(
                "sample_rate",
                format!("{sample_rate} must be finite and positive"),
            ));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(Error::invalid(
                "channels",
                "all channels must have the same length",
            ));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::new(vec![samples], sample_rate)
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::new(vec![left, right], sample_rate)
    }

    /// All-zero buffer of `frames` frames.
    pub fn silence(num_channels: usize, frames: usize, sample_rate: f64) -> Result<Self> {
        Self::new(vec![vec![0.0; frames]; num_channels], sample_rate)
    }

    /// De-interleave `[L0, R0, L1, R1, ...]` into a planar buffer.
    pub fn from_interleaved(samples: &[f32], num_channels: usize, sample_rate: f64) -> Result<Self> {
        if num_channels == 0 || num_channels > Self::MAX_CHANNELS {
            return Err(Error::invalid(
                "channels",
                format!("expected 1 or 2 channels, got {num_channels}"),
            ));
        }
        if samples.len() % num_channels != 0 {
            return Err(Error::invalid(
                "samples",
                format!(
                    "{} interleaved samples do not divide into {num_channels} channels",
                    samples.len()
                ),
            ));
        }
        let channels = (0..num_channels)
            .map(|ch| {
                samples
                    .iter()
                    .skip(ch)
                    .step_by(num_channels)
                    .copied()
                    .collect()
            })
            .collect();
        Self::new(channels, sample_rate)
    }

    /// Decode interleaved little-endian `f32` PCM as delivered by the storage layer.
    pub fn from_pcm_bytes(bytes: &[u8], num_channels: usize, sample_rate: f64) -> Result<Self> {
        if bytes.len() % PCM_BYTES_PER_SAMPLE != 0 {
            return Err(Error::invalid(
                "bytes",
                format!("{} bytes is not a whole number of f32 samples", bytes.len()),
            ));
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(PCM_BYTES_PER_SAMPLE)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Self::from_interleaved(&samples, num_channels, sample_rate)
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub fn is_stereo(&self) -> bool {
        self.channels.len() == 2
    }

    /// Mono average of all channels.
    pub fn mixdown(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let scale = 1.0 / self.channels.len() as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect()
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let n = self.channels.len();
        let mut out = Vec::with_capacity(self.len() * n);
        for i in 0..self.len() {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    /// Encode as interleaved little-endian `f32` PCM for the storage layer.
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        let interleaved = self.to_interleaved();
        let mut bytes = Vec::with_capacity(interleaved.len() * PCM_BYTES_PER_SAMPLE);
        for sample in interleaved {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Take ownership of the planar channel data.
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}
