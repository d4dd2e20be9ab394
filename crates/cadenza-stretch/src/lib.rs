//! Offline time-stretching and pitch-shifting.
//!
//! # Features
//!
//! - **Phase vocoder**: STFT stretch driven by an arbitrary monotonic time map,
//!   with optional identity phase locking for the high-quality tier
//! - **WSOLA**: similarity-aligned overlap-add for percussive material
//! - **Pitch shift**: stretch followed by band-limited resampling, optionally
//!   with cepstral formant correction
//!
//! Every stretcher renders a whole channel in one call and polls a
//! [`CancellationToken`](cadenza_core::CancellationToken) between frames.
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::CancellationToken;
//! use cadenza_stretch::{Quality, StretchAlgorithm, Stretcher, UniformMap};
//!
//! let input = vec![0.0f32; 8192];
//! let stretcher = Stretcher::new(StretchAlgorithm::Wsola, Quality::Normal, 44100.0).unwrap();
//! let out = stretcher
//!     .stretch(&input, &UniformMap::new(2.0), 16384, &CancellationToken::new())
//!     .unwrap();
//! assert_eq!(out.len(), 16384);
//! ```

pub mod error;
pub mod formant;
pub mod map;
pub mod phase_vocoder;
pub mod pitch;
pub mod processor;
pub mod resample;
pub mod types;
mod window;
pub mod wsola;

pub use error::StretchError;
pub use formant::FormantCorrector;
pub use map::{TimeMap, UniformMap};
pub use phase_vocoder::PhaseVocoder;
pub use pitch::{semitones_to_ratio, PitchShifter, MAX_SEMITONES};
pub use processor::Stretcher;
pub use resample::resample;
pub use types::{FftSize, ProcessingWindow, Quality, StretchAlgorithm, WsolaWindow};
pub use wsola::Wsola;
