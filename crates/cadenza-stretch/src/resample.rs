//! Band-limited resampling using rubato

use cadenza_core::{Error, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::StretchError;

const CHUNK_SIZE: usize = 1024;

/// Resample one channel by `ratio` (output rate / input rate) to exactly
/// `output_len` samples.
///
/// The resampler's filter delay is removed, so output sample `i` lines up
/// with input position `i / ratio`. Missing tail samples are zero.
pub fn resample(input: &[f32], ratio: f64, output_len: usize) -> Result<Vec<f32>> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(Error::invalid("ratio", format!("{ratio} must be positive")));
    }
    Ok(resample_sinc(input, ratio, output_len)?)
}

fn resample_sinc(
    input: &[f32],
    ratio: f64,
    output_len: usize,
) -> std::result::Result<Vec<f32>, StretchError> {
    if output_len == 0 {
        return Ok(Vec::new());
    }
    if (ratio - 1.0).abs() < 1e-12 {
        let mut out = input.to_vec();
        out.resize(output_len, 0.0);
        return Ok(out);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)?;

    let delay = resampler.output_delay();
    let needed = delay + output_len;
    let mut collected: Vec<f32> = Vec::with_capacity(needed + (CHUNK_SIZE as f64 * ratio) as usize + 1);

    // every chunk yields about CHUNK_SIZE × ratio frames
    let max_chunks = needed / ((CHUNK_SIZE as f64 * ratio).floor() as usize).max(1) + 4;

    let mut pos = 0usize;
    let mut chunk = vec![0.0f32; CHUNK_SIZE];
    for _ in 0..max_chunks {
        if collected.len() >= needed {
            break;
        }
        let frames = resampler.input_frames_next();
        chunk.clear();
        chunk.resize(frames, 0.0);
        if pos < input.len() {
            let end = (pos + frames).min(input.len());
            chunk[..end - pos].copy_from_slice(&input[pos..end]);
        }
        pos += frames;

        let out = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = out.first() {
            collected.extend_from_slice(channel);
        }
    }

    let mut result: Vec<f32> = collected.into_iter().skip(delay).take(output_len).collect();
    result.resize(output_len, 0.0);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_unit_ratio_copies() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 1.0, 5).unwrap(), vec![0.1, 0.2, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn test_exact_length() {
        let input: Vec<f32> = (0..10000).map(|i| (i as f32 * 0.01).sin()).collect();
        for (ratio, len) in [(0.5, 5000), (2.0, 20000), (0.25, 2500)] {
            let out = resample(&input, ratio, len).unwrap();
            assert_eq!(out.len(), len);
            assert!(out.iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_downsample_keeps_alignment() {
        // 100 Hz at 44.1k, halved: the sine keeps its phase at half the index
        let input: Vec<f32> = (0..44100)
            .map(|i| (2.0 * PI * 100.0 * i as f32 / 44100.0).sin())
            .collect();
        let out = resample(&input, 0.5, 22050).unwrap();
        for i in (1000..20000).step_by(997) {
            let expected = input[i * 2];
            assert!((out[i] - expected).abs() < 0.05, "{i}: {} vs {expected}", out[i]);
        }
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(resample(&[0.0; 8], 0.0, 8).is_err());
        assert!(resample(&[0.0; 8], f64::NAN, 8).is_err());
    }
}
