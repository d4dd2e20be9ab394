//! Algorithm dispatch.

use cadenza_core::{CancellationToken, Error, Result};

use crate::map::TimeMap;
use crate::phase_vocoder::PhaseVocoder;
use crate::types::{ProcessingWindow, Quality, StretchAlgorithm};
use crate::wsola::Wsola;

/// A configured time-stretcher for one algorithm/quality pair.
///
/// Stateless between calls, so a single instance is shared by every channel
/// of a render.
#[derive(Debug, Clone)]
pub enum Stretcher {
    PhaseVocoder(PhaseVocoder),
    Wsola(Wsola),
}

impl Stretcher {
    /// Build the stretcher for `algorithm` at `quality`.
    ///
    /// Fails with [`Error::UnsupportedConfiguration`] for pairs that have no
    /// processing window, such as the high-quality vocoder at the fast tier.
    pub fn new(algorithm: StretchAlgorithm, quality: Quality, sample_rate: f64) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::invalid("sample_rate", format!("{sample_rate} must be positive")));
        }
        Ok(match ProcessingWindow::resolve(algorithm, quality)? {
            ProcessingWindow::Vocoder {
                fft_size,
                phase_locked,
            } => Self::PhaseVocoder(PhaseVocoder::new(fft_size, phase_locked)),
            ProcessingWindow::Wsola(window) => Self::Wsola(Wsola::new(window, sample_rate)),
        })
    }

    /// Poll the cancellation token every `frames` analysis frames.
    pub fn with_check_interval(self, frames: usize) -> Self {
        match self {
            Self::PhaseVocoder(p) => Self::PhaseVocoder(p.with_check_interval(frames)),
            Self::Wsola(w) => Self::Wsola(w.with_check_interval(frames)),
        }
    }

    /// Analysis window length in samples.
    pub fn window_size(&self) -> usize {
        match self {
            Self::PhaseVocoder(p) => p.fft_size(),
            Self::Wsola(w) => w.window_len(),
        }
    }

    /// Render `output_len` samples of one channel through `map`.
    pub fn stretch(
        &self,
        input: &[f32],
        map: &dyn TimeMap,
        output_len: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        match self {
            Self::PhaseVocoder(p) => p.stretch(input, map, output_len, cancel),
            Self::Wsola(w) => w.stretch(input, map, output_len, cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::UniformMap;

    #[test]
    fn test_dispatch() {
        let pv = Stretcher::new(StretchAlgorithm::PhaseVocoder, Quality::Fast, 44100.0).unwrap();
        assert!(matches!(pv, Stretcher::PhaseVocoder(_)));
        assert_eq!(pv.window_size(), 1024);

        let hq = Stretcher::new(StretchAlgorithm::HighQuality, Quality::High, 44100.0).unwrap();
        assert_eq!(hq.window_size(), 8192);

        let wsola = Stretcher::new(StretchAlgorithm::Wsola, Quality::Normal, 44100.0).unwrap();
        assert!(matches!(wsola, Stretcher::Wsola(_)));
        assert_eq!(wsola.window_size(), 1324);
    }

    #[test]
    fn test_unsupported_pair() {
        let err = Stretcher::new(StretchAlgorithm::HighQuality, Quality::Fast, 44100.0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration(_)));
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(Stretcher::new(StretchAlgorithm::Wsola, Quality::Normal, 0.0).is_err());
    }

    #[test]
    fn test_every_algorithm_fills_output() {
        let input: Vec<f32> = (0..8192).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        for algorithm in [
            StretchAlgorithm::PhaseVocoder,
            StretchAlgorithm::Wsola,
            StretchAlgorithm::HighQuality,
        ] {
            let stretcher = Stretcher::new(algorithm, Quality::Normal, 44100.0)
                .unwrap()
                .with_check_interval(8);
            let out = stretcher
                .stretch(&input, &UniformMap::new(1.25), 10240, &CancellationToken::new())
                .unwrap();
            assert_eq!(out.len(), 10240);
            assert!(out.iter().all(|s| s.is_finite()), "{algorithm:?}");
        }
    }
}
