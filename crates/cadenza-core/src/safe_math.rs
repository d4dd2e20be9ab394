//! Numeric floor/clamp policy shared by every metric.
//!
//! Level conversions never produce `NaN` or `±Infinity`: anything non-finite
//! or quieter than [`SILENCE_FLOOR_DB`] comes back as the floor. Rounding
//! precisions for reported values are defined here as well so tests compare
//! against stable numbers.

/// Level reported for silence, empty buffers and non-finite intermediates.
pub const SILENCE_FLOOR_DB: f64 = -70.0;

/// Decimal places for decibel values (loudness, peak, RMS dB, dynamic range).
pub const DB_PRECISION: u32 = 2;

/// Decimal places for linear values (RMS, crest factor, correlation, balance, width).
pub const LINEAR_PRECISION: u32 = 4;

/// Decimal places for percentages.
pub const PERCENT_PRECISION: u32 = 2;

/// Return `value` if finite, otherwise `fallback`.
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Divide, returning `fallback` when the denominator is zero or the quotient is non-finite.
#[inline]
pub fn safe_div(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator == 0.0 {
        return fallback;
    }
    finite_or(numerator / denominator, fallback)
}

/// Convert linear amplitude to decibels, clamped to the floor.
#[inline]
pub fn amplitude_to_db(amp: f64) -> f64 {
    if amp <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    finite_or(20.0 * amp.log10(), SILENCE_FLOOR_DB).max(SILENCE_FLOOR_DB)
}

/// Convert a mean-square power to decibels, clamped to the floor.
#[inline]
pub fn power_to_db(power: f64) -> f64 {
    if power <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    finite_or(10.0 * power.log10(), SILENCE_FLOOR_DB).max(SILENCE_FLOOR_DB)
}

/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Round to a fixed number of decimal places. Non-finite input rounds to 0.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scale = 10.0_f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    // avoid reporting -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Hard-clamp a sample to full scale.
#[inline]
pub fn clamp_sample(sample: f32) -> f32 {
    sample.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplitude_db_conversion() {
        assert!((amplitude_to_db(1.0) - 0.0).abs() < 1e-9);
        assert!((amplitude_to_db(0.5) - (-6.0206)).abs() < 1e-3);
        assert!((db_to_amplitude(0.0) - 1.0).abs() < 1e-9);
        assert!((db_to_amplitude(-6.0) - 0.501).abs() < 0.01);
    }

    #[test]
    fn test_floor_policy() {
        assert_eq!(amplitude_to_db(0.0), SILENCE_FLOOR_DB);
        assert_eq!(amplitude_to_db(-1.0), SILENCE_FLOOR_DB);
        assert_eq!(amplitude_to_db(1e-12), SILENCE_FLOOR_DB);
        assert_eq!(amplitude_to_db(f64::NAN), SILENCE_FLOOR_DB);
        assert_eq!(power_to_db(0.0), SILENCE_FLOOR_DB);
        assert_eq!(power_to_db(f64::INFINITY), SILENCE_FLOOR_DB);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(1.0, 0.0, 0.0), 0.0);
        assert_eq!(safe_div(1.0, 2.0, 0.0), 0.5);
        assert_eq!(safe_div(f64::INFINITY, 1.0, -1.0), -1.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-0.00001, 2), 0.0);
        assert!(round_to(-0.00001, 2).is_sign_positive());
        assert_eq!(round_to(f64::NAN, 2), 0.0);
    }
}
