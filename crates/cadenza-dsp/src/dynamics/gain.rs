//! Static gain and hard limiting.

use cadenza_core::safe_math::db_to_amplitude;

/// Multiply every sample by `10^(gain_db/20)`, then clamp to full scale.
pub fn apply_gain(channels: &mut [Vec<f32>], gain_db: f32) {
    let gain = db_to_amplitude(gain_db as f64) as f32;
    for sample in channels.iter_mut().flat_map(|c| c.iter_mut()) {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

/// Clamp every sample to `±10^(ceiling_db/20)`, preserving sign.
pub fn apply_limiter(channels: &mut [Vec<f32>], ceiling_db: f32) {
    let ceiling = db_to_amplitude(ceiling_db as f64) as f32;
    for sample in channels.iter_mut().flat_map(|c| c.iter_mut()) {
        if sample.abs() > ceiling {
            *sample = ceiling.copysign(*sample);
        }
    }
}
