//! Error types for cadenza-stretch

use thiserror::Error;

/// Failures inside the resampling backend.
#[derive(Error, Debug)]
pub enum StretchError {
    #[error("Resampler construction failed: {0}")]
    ResamplerConstruction(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),
}

impl From<StretchError> for cadenza_core::Error {
    fn from(e: StretchError) -> Self {
        cadenza_core::Error::Algorithm(e.to_string())
    }
}
