//! Stereo image analysis.
//!
//! - **Correlation**: `ΣLR / sqrt(ΣL²·ΣR²)`, from -1 (inverted) to +1 (mono)
//! - **Balance**: `(ΣR² − ΣL²) / (ΣL² + ΣR²)`, -1 full left to +1 full right
//! - **Width**: `1 − |correlation|`
//!
//! All values are zero when either channel is empty. When one channel is
//! silent, correlation and width are zero and balance is ±1: the signal is a
//! single source panned hard to one side, which has no spread, so width is
//! not taken from the zero-correlation fallback.

use cadenza_core::safe_math::{round_to, safe_div, LINEAR_PRECISION};
use serde::{Deserialize, Serialize};

/// Stereo image summary reported in an analysis result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoImage {
    pub correlation: f64,
    pub balance: f64,
    pub width: f64,
}

impl StereoImage {
    /// Significantly negative correlation collapses badly when summed to mono.
    pub fn has_phase_issues(&self) -> bool {
        self.correlation < -0.3
    }

    pub fn is_mono(&self) -> bool {
        self.correlation > 0.95
    }
}

/// Per-channel and mid/side RMS levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoLevels {
    pub left: f64,
    pub right: f64,
    /// (L+R)/2
    pub mid: f64,
    /// (L-R)/2
    pub side: f64,
}

#[derive(Default)]
struct Sums {
    l_sq: f64,
    r_sq: f64,
    lr: f64,
    mid_sq: f64,
    side_sq: f64,
    len: usize,
}

fn accumulate(left: &[f32], right: &[f32]) -> Sums {
    let mut sums = Sums {
        len: left.len().min(right.len()),
        ..Sums::default()
    };
    for (&l, &r) in left.iter().zip(right) {
        let (l, r) = (l as f64, r as f64);
        sums.l_sq += l * l;
        sums.r_sq += r * r;
        sums.lr += l * r;

        let mid = (l + r) * 0.5;
        let side = (l - r) * 0.5;
        sums.mid_sq += mid * mid;
        sums.side_sq += side * side;
    }
    sums
}

/// Correlation, balance and width of a stereo pair.
pub fn stereo_image(left: &[f32], right: &[f32]) -> StereoImage {
    if left.is_empty() || right.is_empty() {
        return StereoImage::default();
    }
    let sums = accumulate(left, right);

    let correlation = if sums.l_sq > 0.0 && sums.r_sq > 0.0 {
        safe_div(sums.lr, (sums.l_sq * sums.r_sq).sqrt(), 0.0).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let balance = safe_div(sums.r_sq - sums.l_sq, sums.l_sq + sums.r_sq, 0.0);
    let width = if sums.l_sq > 0.0 && sums.r_sq > 0.0 {
        1.0 - correlation.abs()
    } else {
        0.0
    };

    StereoImage {
        correlation: round_to(correlation, LINEAR_PRECISION),
        balance: round_to(balance, LINEAR_PRECISION),
        width: round_to(width, LINEAR_PRECISION),
    }
}

/// RMS levels of the left, right, mid and side signals.
pub fn stereo_levels(left: &[f32], right: &[f32]) -> StereoLevels {
    let sums = accumulate(left, right);
    if sums.len == 0 {
        return StereoLevels::default();
    }
    let n = sums.len as f64;
    let level = |sum_sq: f64| round_to((sum_sq / n).sqrt(), LINEAR_PRECISION);

    StereoLevels {
        left: level(sums.l_sq),
        right: level(sums.r_sq),
        mid: level(sums.mid_sq),
        side: level(sums.side_sq),
    }
}
