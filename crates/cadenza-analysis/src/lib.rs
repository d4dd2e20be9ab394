//! # Cadenza Analysis
//!
//! Offline analysis of sample buffers:
//! - **Signal metrics**: loudness, peak, RMS, dynamic range, clipping
//! - **Stereo image**: correlation, balance, width and mid/side levels
//! - **Transient detection**: spectral-flux onsets with adaptive thresholding
//! - **Beat quantization**: onsets pulled toward a tempo grid as warp markers
//!
//! Metrics never fail; detection and quantization return typed errors only
//! for invalid parameters.
//!
//! ## Example
//!
//! ```rust
//! use cadenza_analysis::{metrics, transient::TransientDetector};
//!
//! let samples: Vec<f32> = vec![0.0; 44100];
//! assert_eq!(metrics::loudness(&samples, 44100.0), -70.0);
//!
//! let detector = TransientDetector::new(44100.0);
//! let onsets = detector.detect(&samples, 0.5, 0.05).unwrap();
//! assert!(onsets.is_empty());
//! ```

pub mod metrics;
pub mod quantize;
pub mod stereo;
pub mod transient;

pub use metrics::{
    analyze, detect_clipping, dynamic_range, loudness, loudness_channels, peak, peak_db, rms,
    rms_db, AnalysisResult, ClippingReport, DynamicRange, DEFAULT_CLIPPING_THRESHOLD,
};
pub use quantize::{quantize_onsets, BeatQuantizer, QuantizeParams};
pub use stereo::{stereo_image, stereo_levels, StereoImage, StereoLevels};
pub use transient::{onset_times, DetectionMethod, Transient, TransientDetector};
