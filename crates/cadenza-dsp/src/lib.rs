//! Offline dynamics processing for Cadenza render output.

pub mod dynamics;

pub use dynamics::{
    apply_gain, apply_limiter, Compressor, CompressorSettings, DynamicsChain, DynamicsStage,
};
