//! Core types for the Cadenza warp engine.
//!
//! - [`SampleBuffer`]: planar PCM buffer passed by value between stages
//! - [`WarpMarker`] / [`WarpMap`]: monotonic source ↔ target time mapping
//! - [`safe_math`]: the floor/clamp policy shared by every metric
//! - [`CancellationToken`]: cooperative cancellation between sub-ranges

pub mod buffer;
pub mod cancel;
pub mod error;
pub mod marker;
pub mod safe_math;
pub mod warp;

pub use buffer::{SampleBuffer, PCM_BYTES_PER_SAMPLE};
pub use cancel::CancellationToken;
pub use error::{ensure_in_range, Error, ErrorKind, MarkerError, Result};
pub use marker::{MarkerType, WarpMarker};
pub use warp::{validate_markers, WarpMap, WarpPoint, WarpSegment};
