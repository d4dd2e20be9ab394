//! Centralized error type for the cadenza umbrella crate.
//!
//! Wraps the shared subsystem error so `?` propagates naturally across crate boundaries.

use crate::job::JobStatus;
use cadenza_core::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] cadenza_core::Error),

    /// The sample source could not resolve a clip.
    #[error("Sample source: {0}")]
    Source(String),

    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl Error {
    /// Failure class for job bookkeeping.
    ///
    /// Source failures count as validation errors: the request named a clip
    /// that cannot be served.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(e) => e.kind(),
            Error::Source(_) | Error::InvalidTransition { .. } => ErrorKind::Validation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Core(cadenza_core::Error::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
