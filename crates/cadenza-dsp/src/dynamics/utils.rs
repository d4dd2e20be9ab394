//! Shared utilities for dynamics processors
//!
//! Level conversions come from [`cadenza_core::safe_math`].

/// One-pole smoothing coefficient for a time constant, never shorter than one sample.
#[inline]
pub(crate) fn time_to_coeff(time_seconds: f64, sample_rate: f64) -> f32 {
    let samples = (time_seconds * sample_rate).max(1.0);
    (-1.0 / samples).exp() as f32
}

/// Reject non-finite stage parameters.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> cadenza_core::Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(cadenza_core::Error::invalid(name, format!("{value} is not finite")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_time_clamps_to_one_sample() {
        let coeff = time_to_coeff(0.0, 44100.0);
        assert!((coeff - (-1.0f32).exp()).abs() < 1e-6);
        assert!(coeff.is_finite());

        let slow = time_to_coeff(0.1, 44100.0);
        assert!(slow > coeff && slow < 1.0);
    }
}
