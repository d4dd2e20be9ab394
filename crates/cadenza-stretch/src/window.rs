//! Analysis/synthesis windows.

use std::f32::consts::PI;

/// Periodic Hann window; overlapping copies at hop N/2 or N/4 sum to a constant.
pub(crate) fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Read `out.len()` samples of `input` starting at `start`, zero outside the input.
#[inline]
pub(crate) fn read_padded(input: &[f32], start: i64, out: &mut [f32]) {
    for (i, o) in out.iter_mut().enumerate() {
        let idx = start + i as i64;
        *o = if idx >= 0 && (idx as usize) < input.len() {
            input[idx as usize]
        } else {
            0.0
        };
    }
}

/// Divide overlap-added output by the accumulated window weight.
pub(crate) fn normalize(output: &mut [f32], weight: &[f32]) {
    for (o, &w) in output.iter_mut().zip(weight) {
        *o = if w > 1e-6 { *o / w } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = create_hann_window(1024);
        assert_eq!(window.len(), 1024);
        assert!(window[0] < 0.001);
        assert!((window[512] - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_read_padded() {
        let input = [1.0, 2.0, 3.0];
        let mut out = [9.0; 5];
        read_padded(&input, -1, &mut out);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 0.0]);
    }
}
