//! Dynamics processing for rendered buffers.
//!
//! - [`apply_gain`] - static gain with hard clamp to full scale
//! - [`Compressor`] - stereo-linked compressor
//! - [`apply_limiter`] - hard ceiling
//! - [`DynamicsChain`] - ordered list of the above
//!
//! ## Example
//!
//! ```
//! use cadenza_core::SampleBuffer;
//! use cadenza_dsp::{CompressorSettings, DynamicsChain, DynamicsStage};
//!
//! let chain = DynamicsChain::new(vec![
//!     DynamicsStage::Compressor(CompressorSettings::new(-24.0, 4.0, 0.003, 0.1)),
//!     DynamicsStage::Limiter { ceiling_db: -0.3 },
//! ])
//! .unwrap();
//!
//! let silence = SampleBuffer::silence(2, 44100, 44100.0).unwrap();
//! let out = chain.process(silence).unwrap();
//! assert!(out.channels().all(|c| c.iter().all(|&s| s == 0.0)));
//! ```

mod utils;

mod chain;
mod compressor;
mod gain;

pub use chain::{DynamicsChain, DynamicsStage};
pub use compressor::{Compressor, CompressorSettings};
pub use gain::{apply_gain, apply_limiter};
