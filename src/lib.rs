//! # Cadenza - Offline Audio Warp Engine
//!
//! Time-warping, pitch-shifting and analysis of recorded clips, built from
//! modular subsystems.
//!
//! ## Architecture
//!
//! Cadenza is an umbrella crate that coordinates:
//! - **cadenza-core** - Sample buffers, warp markers, the warp map, errors, cancellation
//! - **cadenza-analysis** - Signal metrics, stereo image, transient detection, beat quantization
//! - **cadenza-dsp** - Gain, compressor and limiter stages for post-processing
//! - **cadenza-stretch** - Phase vocoder, WSOLA, pitch shifting, formant correction
//!
//! The umbrella crate adds the render pipeline, a content-addressed result
//! cache and the job payload types a worker dispatches on.
//!
//! ## Quick Start
//!
//! ```
//! use cadenza::prelude::*;
//!
//! let engine = CadenzaEngine::builder().build().unwrap();
//! let buffer = SampleBuffer::mono(vec![0.0; 88200], 44100.0).unwrap();
//!
//! // Pull the second beat half a second later
//! let markers = vec![WarpMarker::new("beat-2", 1.0, 1.5)];
//! let preview = engine.preview(&buffer, "clip-1", markers, 0.0, 1.0).unwrap();
//! assert_eq!(preview.buffer.len(), 44100);
//!
//! let metrics = engine.analyze(&buffer);
//! assert_eq!(metrics.lufs, -70.0);
//! ```

/// Re-export of cadenza-core for direct access
pub use cadenza_core as core;

/// Analysis tools
pub use cadenza_analysis as analysis;

/// Dynamics processing
pub use cadenza_dsp as dsp;

/// Time-stretch and pitch-shift algorithms
pub use cadenza_stretch as stretch;

pub use cadenza_core::{
    CancellationToken, ErrorKind, MarkerError, MarkerType, SampleBuffer, WarpMap, WarpMarker,
    WarpPoint,
};

pub use cadenza_analysis::{
    AnalysisResult, BeatQuantizer, DetectionMethod, QuantizeParams, StereoImage, Transient,
    TransientDetector,
};

pub use cadenza_dsp::{CompressorSettings, DynamicsChain, DynamicsStage};

pub use cadenza_stretch::{Quality, StretchAlgorithm};

pub mod cache;
pub mod config;
pub mod error;
pub mod job;
pub mod render;

mod builder;
mod engine;

pub use builder::CadenzaEngineBuilder;
pub use config::{EngineConfig, QuantizeConfig, RenderDefaults, TransientConfig};
pub use engine::{CacheStats, CadenzaEngine};
pub use error::{Error, Result};
pub use job::{
    AnalyzeJob, ClipRef, CommitJob, Job, JobError, JobOutput, JobRequest, JobStatus, PreviewJob,
    QuantizeJob, SampleSource, TransientJob,
};
pub use render::{Disposition, RenderMetadata, RenderRange, RenderRequest, RenderResult};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{CadenzaEngine, CadenzaEngineBuilder, EngineConfig, RenderDefaults};

    // Requests and results
    pub use crate::{Disposition, RenderRange, RenderRequest, RenderResult};
    pub use crate::{ClipRef, JobOutput, JobRequest, JobStatus, SampleSource};

    // Core types
    pub use crate::{CancellationToken, SampleBuffer, WarpMap, WarpMarker};
    pub use crate::{DynamicsStage, Quality, StretchAlgorithm};

    pub use crate::{Error, Result};
}
