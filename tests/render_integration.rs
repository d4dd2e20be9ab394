//! Render pipeline integration tests.
//!
//! Drives previews and commits through the public engine API on
//! deterministic signals and checks lengths, levels and pitch.

#[path = "helpers/mod.rs"]
mod helpers;

use cadenza::prelude::*;
use cadenza::{CompressorSettings, ErrorKind};
use helpers::tolerances::*;
use helpers::*;

const SR: f64 = TEST_SAMPLE_RATE;

fn sine_clip(frequency: f64, seconds: f64) -> SampleBuffer {
    mono_buffer(generate_sine(frequency, SR, (seconds * SR) as usize))
}

/// Whole-clip render with the preview algorithm, kept as a preview.
fn stretch_request(markers: Vec<WarpMarker>) -> RenderRequest {
    RenderRequest::commit("clip", markers, &RenderDefaults::preview())
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_identity_commit_is_bit_exact() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let result = engine.commit(&clip, "clip", vec![]).unwrap();

    assert!(result.metadata.identity_path);
    assert_eq!(result.buffer, clip);
    assert_eq!(result.metadata.output_frames, clip.len());
}

#[test]
fn test_identity_markers_are_bit_exact() {
    let engine = test_engine();
    let clip = stereo_buffer(generate_sine(220.0, SR, 44100), generate_noise(44100, 3));

    let markers = vec![
        WarpMarker::anchor("start", 0.0, 0.0),
        WarpMarker::new("mid", 0.5, 0.5),
    ];
    let result = engine.commit(&clip, "clip", markers).unwrap();

    assert!(result.metadata.identity_path);
    assert_eq!(result.buffer, clip);
}

#[test]
fn test_unit_slope_span_copies_source() {
    let engine = test_engine();
    let samples = generate_sine(330.0, SR, 3 * 44100);
    let clip = mono_buffer(samples.clone());

    // First second is stretched, the second is shifted by half a second
    let markers = vec![
        WarpMarker::new("a", 1.0, 1.5),
        WarpMarker::new("b", 2.0, 2.5),
    ];
    let preview = engine.preview(&clip, "clip", markers, 1.5, 2.5).unwrap();

    assert!(preview.metadata.identity_path);
    assert!((preview.metadata.source_start - 1.0).abs() < 1e-9);
    assert!((preview.metadata.source_end - 2.0).abs() < 1e-9);
    assert_audio_equal(
        preview.buffer.channel(0).unwrap(),
        &samples[44100..88200],
        FLOAT_EPSILON,
    );
}

// =============================================================================
// Time stretching
// =============================================================================

#[test]
fn test_stretch_doubles_length_and_keeps_level() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let result = engine
        .render_uncancellable(&clip, stretch_request(vec![WarpMarker::new("end", 1.0, 2.0)]))
        .unwrap();

    assert!(!result.metadata.identity_path);
    assert_eq!(result.buffer.len(), 88200);
    let out = result.buffer.channel(0).unwrap();
    assert_finite(out);

    // Ignore the edges, where the first and last frames fade in and out
    let body = &out[4096..out.len() - 4096];
    let ratio = rms(body) / rms(clip.channel(0).unwrap());
    assert!(
        (ratio - 1.0).abs() < 2.0 * LEVEL_TOLERANCE,
        "level ratio after stretch was {ratio}"
    );
}

#[test]
fn test_stretch_keeps_pitch() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let result = engine
        .render_uncancellable(&clip, stretch_request(vec![WarpMarker::new("end", 1.0, 1.5)]))
        .unwrap();

    let out = result.buffer.channel(0).unwrap();
    assert_eq!(out.len(), 66150);
    let freq = zero_crossing_frequency(&out[4096..out.len() - 4096], SR);
    assert!((freq - 440.0).abs() < 15.0, "estimated {freq} Hz");
}

#[test]
fn test_compression_shortens_clip() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 2.0);

    let result = engine
        .render_uncancellable(&clip, stretch_request(vec![WarpMarker::new("end", 2.0, 1.0)]))
        .unwrap();

    assert_eq!(result.buffer.len(), 44100);
    assert_has_audio(result.buffer.channel(0).unwrap(), 0.3);
}

#[test]
fn test_every_supported_algorithm_renders() {
    let engine = bare_engine();
    let clip = sine_clip(440.0, 1.0);
    let markers = vec![WarpMarker::new("beat", 0.5, 0.75)];

    let combinations = [
        (StretchAlgorithm::PhaseVocoder, Quality::Fast),
        (StretchAlgorithm::PhaseVocoder, Quality::Normal),
        (StretchAlgorithm::PhaseVocoder, Quality::High),
        (StretchAlgorithm::Wsola, Quality::Fast),
        (StretchAlgorithm::Wsola, Quality::Normal),
        (StretchAlgorithm::Wsola, Quality::High),
        (StretchAlgorithm::HighQuality, Quality::Normal),
        (StretchAlgorithm::HighQuality, Quality::High),
    ];

    for (algorithm, quality) in combinations {
        let request = stretch_request(markers.clone()).with_algorithm(algorithm, quality);
        let result = engine.render_uncancellable(&clip, request).unwrap();

        // 0.5s at 1.5x, then the last segment's slope carries on
        assert_eq!(result.buffer.len(), 66150, "{algorithm:?}/{quality:?}");
        let out = result.buffer.channel(0).unwrap();
        assert_finite(out);
        assert_has_audio(out, 0.3);
        assert_eq!(result.metadata.algorithm, algorithm);
        assert_eq!(result.metadata.quality, quality);
    }
}

#[test]
fn test_high_quality_fast_is_unsupported() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);
    let request =
        stretch_request(vec![]).with_algorithm(StretchAlgorithm::HighQuality, Quality::Fast);

    let err = engine.render_uncancellable(&clip, request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
}

#[test]
fn test_stereo_channels_stay_independent() {
    let engine = test_engine();
    let clip = stereo_buffer(generate_sine(440.0, SR, 44100), vec![0.0; 44100]);

    let result = engine
        .render_uncancellable(&clip, stretch_request(vec![WarpMarker::new("end", 1.0, 1.25)]))
        .unwrap();

    assert_eq!(result.buffer.num_channels(), 2);
    assert_has_audio(result.buffer.channel(0).unwrap(), 0.3);
    assert!(is_silent(result.buffer.channel(1).unwrap(), SILENCE_THRESHOLD));
}

// =============================================================================
// Preview vs commit
// =============================================================================

#[test]
fn test_preview_and_commit_dispositions() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);
    let markers = vec![WarpMarker::new("beat", 0.5, 0.6)];

    let preview = engine.preview(&clip, "clip", markers.clone(), 0.0, 0.5).unwrap();
    assert_eq!(preview.metadata.disposition, Disposition::Preview);
    assert!(!preview.replaces_original());
    assert_eq!(preview.buffer.len(), 22050);

    let commit = engine.commit(&clip, "clip", markers).unwrap();
    assert_eq!(commit.metadata.disposition, Disposition::ReplaceOriginal);
    assert!(commit.replaces_original());
    assert_eq!(commit.metadata.algorithm, StretchAlgorithm::HighQuality);
}

#[test]
fn test_preview_span_is_clamped_to_clip() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let preview = engine.preview(&clip, "clip", vec![], 0.5, 5.0).unwrap();
    assert!((preview.metadata.target_end - 1.0).abs() < 1e-9);
    assert_eq!(preview.buffer.len(), 22050);
}

#[test]
fn test_empty_preview_span_is_rejected() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let err = engine.preview(&clip, "clip", vec![], 2.0, 3.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_render_leaves_input_untouched() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);
    let before = clip.clone();

    engine
        .render_uncancellable(&clip, stretch_request(vec![WarpMarker::new("end", 1.0, 1.3)]))
        .unwrap();
    assert_eq!(clip, before);
}

#[test]
fn test_preview_is_excerpt_of_commit() {
    let engine = bare_engine();
    let clip = sine_clip(440.0, 2.0);
    let markers = vec![WarpMarker::new("m", 1.0, 1.5)];

    for (algorithm, quality) in [
        (StretchAlgorithm::PhaseVocoder, Quality::Normal),
        (StretchAlgorithm::Wsola, Quality::Normal),
        (StretchAlgorithm::HighQuality, Quality::Normal),
    ] {
        let defaults = RenderDefaults::preview();
        let commit = RenderRequest::commit("clip", markers.clone(), &defaults)
            .with_algorithm(algorithm, quality)
            .with_dynamics(vec![DynamicsStage::Compressor(CompressorSettings::default())]);
        let preview = RenderRequest::preview("clip", markers.clone(), 1.0, 2.0, &defaults)
            .with_algorithm(algorithm, quality)
            .with_dynamics(vec![DynamicsStage::Compressor(CompressorSettings::default())]);

        let whole = engine.render_uncancellable(&clip, commit).unwrap();
        let span = engine.render_uncancellable(&clip, preview).unwrap();

        assert_eq!(span.buffer.len(), 44100);
        assert_audio_equal(
            span.buffer.channel(0).unwrap(),
            &whole.buffer.channel(0).unwrap()[44100..88200],
            FLOAT_EPSILON,
        );
    }
}

// =============================================================================
// Pitch and dynamics
// =============================================================================

#[test]
fn test_octave_up_doubles_frequency() {
    let engine = test_engine();
    let clip = sine_clip(220.0, 1.0);

    let request = stretch_request(vec![]).with_pitch_shift(12.0, false);
    let result = engine.render_uncancellable(&clip, request).unwrap();

    let out = result.buffer.channel(0).unwrap();
    assert_eq!(out.len(), clip.len());
    let freq = zero_crossing_frequency(&out[4096..out.len() - 4096], SR);
    assert!((freq - 440.0).abs() < 20.0, "estimated {freq} Hz");
}

#[test]
fn test_formant_preserving_shift_stays_finite() {
    let engine = test_engine();
    let clip = mono_buffer(generate_noise(44100, 11));

    let request = stretch_request(vec![]).with_pitch_shift(-5.0, true);
    let result = engine.render_uncancellable(&clip, request).unwrap();

    assert!(result.metadata.preserve_formants);
    assert_eq!(result.buffer.len(), clip.len());
    assert_finite(result.buffer.channel(0).unwrap());
}

#[test]
fn test_pitch_out_of_range_is_rejected() {
    let engine = test_engine();
    let clip = sine_clip(220.0, 1.0);

    let request = stretch_request(vec![]).with_pitch_shift(30.0, false);
    let err = engine.render_uncancellable(&clip, request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_gain_stage_scales_identity_render() {
    let engine = test_engine();
    let samples: Vec<f32> = generate_sine(440.0, SR, 44100)
        .into_iter()
        .map(|s| s * 0.5)
        .collect();
    let clip = mono_buffer(samples.clone());

    let request = stretch_request(vec![]).with_dynamics(vec![DynamicsStage::Gain { gain_db: -6.0 }]);
    let result = engine.render_uncancellable(&clip, request).unwrap();

    let gain = 10f32.powf(-6.0 / 20.0);
    let expected: Vec<f32> = samples.iter().map(|s| s * gain).collect();
    assert_audio_equal(result.buffer.channel(0).unwrap(), &expected, DSP_EPSILON);
}

#[test]
fn test_limiter_caps_peak() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let request = stretch_request(vec![WarpMarker::new("end", 1.0, 1.2)]).with_dynamics(vec![
        DynamicsStage::Compressor(CompressorSettings::new(-12.0, 4.0, 0.005, 0.1)),
        DynamicsStage::Reverb,
        DynamicsStage::Limiter { ceiling_db: -6.0 },
    ]);
    let result = engine.render_uncancellable(&clip, request).unwrap();

    let ceiling = 10f32.powf(-6.0 / 20.0);
    assert!(peak(result.buffer.channel(0).unwrap()) <= ceiling + FLOAT_EPSILON);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_invalid_markers_are_rejected() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);

    let unsorted = vec![WarpMarker::new("b", 0.6, 0.6), WarpMarker::new("a", 0.3, 0.4)];
    let err = engine.commit(&clip, "clip", unsorted).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let outside = vec![WarpMarker::new("late", 4.0, 4.0)];
    let err = engine.commit(&clip, "clip", outside).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_clip_shorter_than_window_is_rejected() {
    let engine = test_engine();
    let clip = mono_buffer(generate_sine(440.0, SR, 1000));

    let err = engine
        .render_uncancellable(&clip, stretch_request(vec![]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientData);
}

#[test]
fn test_cancelled_render_returns_cancelled() {
    let engine = bare_engine();
    let clip = sine_clip(440.0, 1.0);

    let token = CancellationToken::new();
    token.cancel();
    let err = engine
        .render(&clip, stretch_request(vec![WarpMarker::new("end", 1.0, 2.0)]), &token)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(engine.cache_stats().render_entries, 0);
}

// =============================================================================
// Telemetry, caching and concurrency
// =============================================================================

#[test]
fn test_telemetry_attached_when_enabled() {
    let clip = sine_clip(440.0, 1.0);

    let with = test_engine().commit(&clip, "clip", vec![]).unwrap();
    let analysis = with.metadata.analysis.expect("telemetry enabled by default");
    assert!(analysis.rms > 0.6 && analysis.rms < 0.8);

    let without = bare_engine().commit(&clip, "clip", vec![]).unwrap();
    assert!(without.metadata.analysis.is_none());
}

#[test]
fn test_identical_requests_hit_cache() {
    let engine = test_engine();
    let clip = sine_clip(440.0, 1.0);
    let markers = vec![WarpMarker::new("end", 1.0, 1.1)];

    let first = engine
        .render_uncancellable(&clip, stretch_request(markers.clone()))
        .unwrap();
    let second = engine
        .render_uncancellable(&clip, stretch_request(markers.clone()))
        .unwrap();
    assert!(second.metadata.cache_hit);
    assert_eq!(first.buffer, second.buffer);

    // Different markers miss
    let third = engine
        .render_uncancellable(&clip, stretch_request(vec![WarpMarker::new("end", 1.0, 1.2)]))
        .unwrap();
    assert!(!third.metadata.cache_hit);
}

#[test]
fn test_concurrent_renders_agree() {
    let engine = bare_engine();
    let clip = sine_clip(440.0, 1.0);
    let markers = vec![WarpMarker::new("end", 1.0, 1.4)];

    let reference = engine
        .render_uncancellable(&clip, stretch_request(markers.clone()))
        .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    engine
                        .render_uncancellable(&clip, stretch_request(markers.clone()))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result.buffer, reference.buffer);
        }
    });
}
