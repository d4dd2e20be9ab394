//! Algorithm, quality and window-size selection.

use cadenza_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Time-stretching algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StretchAlgorithm {
    /// STFT phase vocoder
    /// Good default for pitched/harmonic content
    #[default]
    PhaseVocoder,

    /// Waveform-similarity overlap-add
    /// Better transient preservation for percussive material
    Wsola,

    /// Phase vocoder with identity phase locking and a larger FFT
    HighQuality,
}

/// Quality tier; trades window size (and render time) for fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Fast,
    #[default]
    Normal,
    High,
}

/// FFT size presets for the vocoders
///
/// - **Small (1024)**: fast previews, smeared bass
/// - **Medium (2048)**: balanced
/// - **Large (4096)**: better frequency resolution for dense mixes
/// - **XLarge (8192)**: extreme stretching, slow transients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FftSize {
    Small = 1024,
    #[default]
    Medium = 2048,
    Large = 4096,
    XLarge = 8192,
}

impl FftSize {
    /// Get the FFT size as usize
    pub fn size(&self) -> usize {
        *self as usize
    }

    /// Nominal analysis hop (FFT size / 4 = 75% overlap)
    pub fn hop_size(&self) -> usize {
        self.size() / 4
    }
}

/// WSOLA segment length presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WsolaWindow {
    /// 20ms segments - tighter transients, rougher sustained tones
    Short,
    /// 30ms segments - balanced (default)
    #[default]
    Medium,
    /// 40ms segments - smoother sustained tones, softer transients
    Long,
}

impl WsolaWindow {
    pub fn milliseconds(&self) -> f64 {
        match self {
            WsolaWindow::Short => 20.0,
            WsolaWindow::Medium => 30.0,
            WsolaWindow::Long => 40.0,
        }
    }

    /// Segment length in samples, rounded to an even count of at least 8.
    pub fn samples(&self, sample_rate: f64) -> usize {
        let n = (sample_rate * self.milliseconds() / 1000.0) as usize;
        (n.max(8) + 1) & !1
    }
}

/// Concrete processing configuration for an algorithm/quality pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingWindow {
    Vocoder { fft_size: FftSize, phase_locked: bool },
    Wsola(WsolaWindow),
}

impl ProcessingWindow {
    /// Resolve the window for `algorithm` at `quality`.
    ///
    /// The high-quality vocoder has no fast tier.
    pub fn resolve(algorithm: StretchAlgorithm, quality: Quality) -> Result<Self> {
        use {FftSize::*, Quality::*, StretchAlgorithm::*};
        Ok(match (algorithm, quality) {
            (PhaseVocoder, Fast) => Self::vocoder(Small, false),
            (PhaseVocoder, Normal) => Self::vocoder(Medium, false),
            (PhaseVocoder, High) => Self::vocoder(Large, false),
            (Wsola, Fast) => Self::Wsola(WsolaWindow::Short),
            (Wsola, Normal) => Self::Wsola(WsolaWindow::Medium),
            (Wsola, High) => Self::Wsola(WsolaWindow::Long),
            (HighQuality, Fast) => {
                return Err(Error::UnsupportedConfiguration(
                    "high_quality algorithm has no fast tier".into(),
                ))
            }
            (HighQuality, Normal) => Self::vocoder(Large, true),
            (HighQuality, High) => Self::vocoder(XLarge, true),
        })
    }

    fn vocoder(fft_size: FftSize, phase_locked: bool) -> Self {
        Self::Vocoder {
            fft_size,
            phase_locked,
        }
    }

    /// Window length in samples.
    pub fn samples(&self, sample_rate: f64) -> usize {
        match self {
            Self::Vocoder { fft_size, .. } => fft_size.size(),
            Self::Wsola(window) => window.samples(sample_rate),
        }
    }
}
