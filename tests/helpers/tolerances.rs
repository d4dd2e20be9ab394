//! Tolerance constants for audio testing.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (copies, exact gain).
/// Use for operations that should be mathematically exact.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Overlap-add reconstruction tolerance.
/// Accounts for FFT round-off through analysis and resynthesis.
pub const DSP_EPSILON: f32 = 1e-4;

/// Relative RMS deviation accepted after time-stretching.
pub const LEVEL_TOLERANCE: f32 = 0.1;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Timing tolerance for marker placement checks, in seconds.
pub const TIMING_TOLERANCE: f64 = 0.03;
