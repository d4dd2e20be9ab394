//! Render pipeline: warp map → time stretch → pitch → dynamics.
//!
//! Preview and commit renders are the same [`RenderRequest`] with different
//! defaults and run through one code path. A stretched span is rendered from
//! the start of the edited timeline and then cut, so frame placement and
//! phase state match a whole-clip render at the same quality and the preview
//! is an excerpt of the commit.

use cadenza_analysis::AnalysisResult;
use cadenza_core::{ensure_in_range, CancellationToken, Error, SampleBuffer, WarpMap, WarpMarker};
use cadenza_dsp::{DynamicsChain, DynamicsStage};
use cadenza_stretch::{
    PitchShifter, ProcessingWindow, Quality, StretchAlgorithm, Stretcher, TimeMap, MAX_SEMITONES,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cache::{ContentHash, ContentHasher};
use crate::config::{EngineConfig, RenderDefaults};
use crate::Result;

/// Fractional source offsets closer than this to a whole sample are copied
/// without interpolation.
const WHOLE_SAMPLE_EPSILON: f64 = 1e-6;

/// Portion of the edited timeline to render.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderRange {
    #[default]
    WholeClip,
    /// Target-time span in seconds, clamped to the warped clip length.
    Span { start: f64, end: f64 },
}

/// What the caller should do with the rendered audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Disposable; the stored clip is untouched.
    Preview,
    /// Persist as the clip's new source audio.
    ReplaceOriginal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub clip_id: String,
    #[serde(default)]
    pub markers: Vec<WarpMarker>,
    #[serde(default)]
    pub range: RenderRange,
    #[serde(default)]
    pub pitch_shift_semitones: f64,
    #[serde(default)]
    pub preserve_formants: bool,
    #[serde(default)]
    pub algorithm: StretchAlgorithm,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub replace_original: bool,
    #[serde(default)]
    pub dynamics: Vec<DynamicsStage>,
}

impl RenderRequest {
    /// Bounded, disposable render of `[start, end]` on the edited timeline.
    pub fn preview(
        clip_id: impl Into<String>,
        markers: Vec<WarpMarker>,
        start: f64,
        end: f64,
        defaults: &RenderDefaults,
    ) -> Self {
        Self::with_defaults(clip_id, markers, RenderRange::Span { start, end }, defaults)
    }

    /// Whole-clip render, by default replacing the stored clip.
    pub fn commit(
        clip_id: impl Into<String>,
        markers: Vec<WarpMarker>,
        defaults: &RenderDefaults,
    ) -> Self {
        Self::with_defaults(clip_id, markers, RenderRange::WholeClip, defaults)
    }

    fn with_defaults(
        clip_id: impl Into<String>,
        markers: Vec<WarpMarker>,
        range: RenderRange,
        defaults: &RenderDefaults,
    ) -> Self {
        Self {
            clip_id: clip_id.into(),
            markers,
            range,
            pitch_shift_semitones: 0.0,
            preserve_formants: false,
            algorithm: defaults.algorithm,
            quality: defaults.quality,
            replace_original: defaults.replace_original,
            dynamics: Vec::new(),
        }
    }

    pub fn with_pitch_shift(mut self, semitones: f64, preserve_formants: bool) -> Self {
        self.pitch_shift_semitones = semitones;
        self.preserve_formants = preserve_formants;
        self
    }

    pub fn with_algorithm(mut self, algorithm: StretchAlgorithm, quality: Quality) -> Self {
        self.algorithm = algorithm;
        self.quality = quality;
        self
    }

    pub fn with_dynamics(mut self, stages: Vec<DynamicsStage>) -> Self {
        self.dynamics = stages;
        self
    }

    pub fn disposition(&self) -> Disposition {
        if self.replace_original {
            Disposition::ReplaceOriginal
        } else {
            Disposition::Preview
        }
    }

    /// Cache key over the input audio and every field that shapes the result.
    pub(crate) fn content_hash(&self, buffer: &SampleBuffer) -> ContentHash {
        let mut hasher = ContentHasher::new("render");
        hasher.write_buffer(buffer).write_str(&self.clip_id);
        hasher.write_u64(self.markers.len() as u64);
        for marker in &self.markers {
            hasher.write_f64(marker.source_time).write_f64(marker.target_time);
        }
        match self.range {
            RenderRange::WholeClip => {
                hasher.write_str("whole");
            }
            RenderRange::Span { start, end } => {
                hasher.write_str("span").write_f64(start).write_f64(end);
            }
        }
        hasher
            .write_f64(self.pitch_shift_semitones)
            .write_bool(self.preserve_formants)
            .write_str(&format!("{:?}/{:?}", self.algorithm, self.quality))
            .write_bool(self.replace_original);
        hasher.write_u64(self.dynamics.len() as u64);
        for stage in &self.dynamics {
            hasher.write_str(&format!("{stage:?}"));
        }
        hasher.finish()
    }
}

/// Everything recorded about a render besides the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub clip_id: String,
    /// Rendered span on the edited timeline, seconds.
    pub target_start: f64,
    pub target_end: f64,
    /// The same span in source time.
    pub source_start: f64,
    pub source_end: f64,
    pub output_frames: usize,
    pub algorithm: StretchAlgorithm,
    pub quality: Quality,
    pub window_size: usize,
    pub pitch_shift_semitones: f64,
    pub preserve_formants: bool,
    pub disposition: Disposition,
    /// The time stage copied samples instead of stretching.
    pub identity_path: bool,
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub buffer: SampleBuffer,
    pub metadata: RenderMetadata,
}

impl RenderResult {
    /// Interleaved little-endian `f32` bytes for the storage sink.
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.buffer.to_pcm_bytes()
    }

    /// True when the caller must persist the audio as the clip's new source.
    pub fn replaces_original(&self) -> bool {
        self.metadata.disposition == Disposition::ReplaceOriginal
    }
}

/// [`TimeMap`] over a [`WarpMap`] in sample units, with output position 0 at
/// the start of the edited timeline.
struct WarpMapping<'a> {
    map: &'a WarpMap,
    sample_rate: f64,
    max_ratio: f64,
}

impl TimeMap for WarpMapping<'_> {
    fn to_output(&self, source_pos: f64) -> f64 {
        self.map.to_target(source_pos / self.sample_rate) * self.sample_rate
    }

    fn to_source(&self, output_pos: f64) -> f64 {
        self.map.to_source(output_pos / self.sample_rate) * self.sample_rate
    }

    fn max_ratio(&self) -> f64 {
        self.max_ratio
    }
}

/// Validated request with its ranges resolved against the clip.
struct RenderPlan {
    map: WarpMap,
    target_start: f64,
    target_end: f64,
    source_start: f64,
    source_end: f64,
    /// First output frame of the span on the edited timeline.
    start_frame: usize,
    output_frames: usize,
}

fn validate_request(request: &RenderRequest) -> Result<DynamicsChain> {
    ensure_in_range(
        "pitch_shift_semitones",
        request.pitch_shift_semitones,
        -MAX_SEMITONES,
        MAX_SEMITONES,
    )?;
    ProcessingWindow::resolve(request.algorithm, request.quality)?;
    Ok(DynamicsChain::new(request.dynamics.clone())?)
}

fn plan(buffer: &SampleBuffer, request: &RenderRequest) -> Result<RenderPlan> {
    let map = WarpMap::build(&request.markers, buffer.duration_seconds())?;
    let duration = map.target_duration();

    let (target_start, target_end) = match request.range {
        RenderRange::WholeClip => (0.0, duration),
        RenderRange::Span { start, end } => {
            if !start.is_finite() || !end.is_finite() {
                return Err(Error::invalid("range", "span bounds must be finite").into());
            }
            (start.clamp(0.0, duration), end.clamp(0.0, duration))
        }
    };
    if target_end <= target_start {
        return Err(Error::invalid(
            "range",
            format!("empty span [{target_start}, {target_end}] within clip of {duration}s"),
        )
        .into());
    }

    let start_frame = (target_start * buffer.sample_rate()).round() as usize;
    let end_frame = (target_end * buffer.sample_rate()).round() as usize;
    let output_frames = end_frame.saturating_sub(start_frame);
    if output_frames == 0 {
        return Err(Error::invalid("range", "span is shorter than one sample").into());
    }

    Ok(RenderPlan {
        source_start: map.to_source(target_start),
        source_end: map.to_source(target_end),
        map,
        target_start,
        target_end,
        start_frame,
        output_frames,
    })
}

/// Copy a unit-slope span starting at fractional sample `start`.
fn copy_unit_slope(input: &[f32], start: f64, frames: usize) -> Vec<f32> {
    let sample = |i: i64| {
        if i >= 0 && (i as usize) < input.len() {
            input[i as usize]
        } else {
            0.0
        }
    };

    let whole = start.round();
    if (start - whole).abs() < WHOLE_SAMPLE_EPSILON {
        let base = whole as i64;
        return (0..frames as i64).map(|i| sample(base + i)).collect();
    }

    let base = start.floor();
    let frac = (start - base) as f32;
    let base = base as i64;
    (0..frames as i64)
        .map(|i| {
            let a = sample(base + i);
            let b = sample(base + i + 1);
            a + (b - a) * frac
        })
        .collect()
}

/// Run the full pipeline without touching any cache.
pub(crate) fn execute(
    buffer: &SampleBuffer,
    request: &RenderRequest,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> Result<RenderResult> {
    let dynamics = validate_request(request)?;
    let plan = plan(buffer, request)?;
    let sample_rate = buffer.sample_rate();

    let stretcher = Stretcher::new(request.algorithm, request.quality, sample_rate)?
        .with_check_interval(config.cancel_check_interval);
    let window_size = stretcher.window_size();
    if buffer.len() < window_size {
        return Err(Error::InsufficientData {
            operation: "render",
            required: window_size,
            available: buffer.len(),
        }
        .into());
    }

    let identity_path = plan
        .map
        .is_unit_slope_between(plan.source_start, plan.source_end);
    tracing::debug!(
        algorithm = ?request.algorithm,
        quality = ?request.quality,
        window_size,
        source_start = plan.source_start,
        source_end = plan.source_end,
        frames = plan.output_frames,
        identity_path,
        "render plan"
    );

    let inputs: Vec<&[f32]> = buffer.channels().collect();

    // Stretched audio carries the timeline before the span until it is cut.
    let lead_frames = if identity_path { 0 } else { plan.start_frame };

    // 1. Time warp
    let mut channels: Vec<Vec<f32>> = if identity_path {
        cancel.check()?;
        let start = plan.source_start * sample_rate;
        inputs
            .iter()
            .map(|ch| copy_unit_slope(ch, start, plan.output_frames))
            .collect()
    } else {
        let mapping = WarpMapping {
            map: &plan.map,
            sample_rate,
            max_ratio: plan
                .map
                .max_stretch_ratio_between(0.0, plan.map.clip_duration()),
        };
        inputs
            .par_iter()
            .map(|ch| {
                cancel.check()?;
                stretcher.stretch(ch, &mapping, lead_frames + plan.output_frames, cancel)
            })
            .collect::<cadenza_core::Result<Vec<_>>>()?
    };

    // 2. Pitch
    if request.pitch_shift_semitones != 0.0 {
        let shifter = PitchShifter::new(stretcher.clone());
        channels = channels
            .par_iter()
            .map(|ch| {
                cancel.check()?;
                shifter.shift(ch, request.pitch_shift_semitones, request.preserve_formants, cancel)
            })
            .collect::<cadenza_core::Result<Vec<_>>>()?;
    }

    // 3. Dynamics
    cancel.check()?;
    let processed = dynamics.process(SampleBuffer::new(channels, sample_rate)?)?;
    let rendered = if lead_frames == 0 {
        processed
    } else {
        let span = processed
            .into_channels()
            .into_iter()
            .map(|mut ch| ch.split_off(lead_frames.min(ch.len())))
            .collect();
        SampleBuffer::new(span, sample_rate)?
    };

    if rendered.channels().flatten().any(|s| !s.is_finite()) {
        return Err(Error::Algorithm("render produced non-finite samples".into()).into());
    }

    let analysis = config
        .telemetry
        .then(|| cadenza_analysis::analyze(&rendered, config.clipping_threshold));

    Ok(RenderResult {
        metadata: RenderMetadata {
            clip_id: request.clip_id.clone(),
            target_start: plan.target_start,
            target_end: plan.target_end,
            source_start: plan.source_start,
            source_end: plan.source_end,
            output_frames: rendered.len(),
            algorithm: request.algorithm,
            quality: request.quality,
            window_size,
            pitch_shift_semitones: request.pitch_shift_semitones,
            preserve_formants: request.preserve_formants,
            disposition: request.disposition(),
            identity_path,
            cache_hit: false,
            analysis,
        },
        buffer: rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error as CadenzaError;

    fn ramp(frames: usize) -> SampleBuffer {
        let samples = (0..frames).map(|i| (i % 100) as f32 / 100.0 - 0.5).collect();
        SampleBuffer::mono(samples, 1000.0).unwrap()
    }

    fn run(buffer: &SampleBuffer, request: &RenderRequest) -> Result<RenderResult> {
        execute(buffer, request, &EngineConfig::default(), &CancellationToken::new())
    }

    #[test]
    fn test_copy_unit_slope() {
        let input = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(copy_unit_slope(&input, 1.0, 4), vec![2.0, 3.0, 4.0, 0.0]);
        assert_eq!(copy_unit_slope(&input, 0.5, 2), vec![1.5, 2.5]);
        assert_eq!(copy_unit_slope(&input, -1.0, 2), vec![0.0, 1.0]);
    }

    #[test]
    fn test_identity_render_is_bit_exact() {
        let buffer = ramp(4000);
        let request = RenderRequest::commit("clip", vec![], &RenderDefaults::preview());
        let result = run(&buffer, &request).unwrap();

        assert!(result.metadata.identity_path);
        assert_eq!(result.buffer, buffer);
        assert_eq!(result.metadata.output_frames, 4000);
    }

    #[test]
    fn test_span_on_shifted_clip_copies_samples() {
        // every point shifted 0.5s later: slope 1 everywhere
        let buffer = ramp(4000);
        let markers = vec![WarpMarker::new("a", 1.0, 1.5), WarpMarker::new("b", 2.0, 2.5)];
        let request =
            RenderRequest::preview("clip", markers, 2.0, 3.0, &RenderDefaults::preview());
        let result = run(&buffer, &request).unwrap();

        assert!(result.metadata.identity_path);
        assert!((result.metadata.source_start - 1.5).abs() < 1e-12);
        let expected = &buffer.channel(0).unwrap()[1500..2500];
        assert_eq!(result.buffer.channel(0).unwrap(), expected);
    }

    #[test]
    fn test_span_is_clamped() {
        let buffer = ramp(3000);
        let request =
            RenderRequest::preview("clip", vec![], 2.5, 10.0, &RenderDefaults::preview());
        let result = run(&buffer, &request).unwrap();
        assert_eq!(result.metadata.target_end, 3.0);
        assert_eq!(result.buffer.len(), 500);
    }

    #[test]
    fn test_empty_and_inverted_spans_rejected() {
        let buffer = ramp(2000);
        for (start, end) in [(1.0, 1.0), (1.5, 0.5), (5.0, 6.0)] {
            let request =
                RenderRequest::preview("clip", vec![], start, end, &RenderDefaults::preview());
            let err = run(&buffer, &request).unwrap_err();
            assert!(matches!(
                err,
                CadenzaError::Core(Error::InvalidParameter { name: "range", .. })
            ));
        }
    }

    #[test]
    fn test_stretched_render_length() {
        let buffer = ramp(4000);
        let markers = vec![WarpMarker::new("m", 2.0, 3.0)];
        let request = RenderRequest::commit("clip", markers, &RenderDefaults::preview());
        let result = run(&buffer, &request).unwrap();

        // first segment slope 1.5, tail extrapolated at 1.5
        assert!(!result.metadata.identity_path);
        assert_eq!(result.buffer.len(), 6000);
        assert!(result.metadata.analysis.is_some());
    }

    #[test]
    fn test_short_buffer_rejected() {
        let buffer = ramp(500);
        let request = RenderRequest::commit("clip", vec![], &RenderDefaults::commit());
        let err = run(&buffer, &request).unwrap_err();
        assert!(matches!(
            err,
            CadenzaError::Core(Error::InsufficientData { required: 8192, .. })
        ));
    }

    #[test]
    fn test_unsupported_quality_rejected() {
        let buffer = ramp(20000);
        let request = RenderRequest::commit("clip", vec![], &RenderDefaults::commit())
            .with_algorithm(StretchAlgorithm::HighQuality, Quality::Fast);
        let err = run(&buffer, &request).unwrap_err();
        assert!(matches!(err, CadenzaError::Core(Error::UnsupportedConfiguration(_))));
    }

    #[test]
    fn test_pitch_out_of_range() {
        let buffer = ramp(20000);
        let request = RenderRequest::commit("clip", vec![], &RenderDefaults::preview())
            .with_pitch_shift(25.0, false);
        assert!(run(&buffer, &request).is_err());
    }

    #[test]
    fn test_cancelled_render() {
        let buffer = ramp(4000);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = RenderRequest::commit("clip", vec![], &RenderDefaults::preview());
        let err = execute(&buffer, &request, &EngineConfig::default(), &cancel).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_hash_tracks_request_fields() {
        let buffer = ramp(100);
        let base = RenderRequest::commit("clip", vec![], &RenderDefaults::preview());
        let pitched = base.clone().with_pitch_shift(2.0, false);
        let compressed = base
            .clone()
            .with_dynamics(vec![DynamicsStage::Gain { gain_db: -3.0 }]);

        assert_eq!(base.content_hash(&buffer), base.clone().content_hash(&buffer));
        assert_ne!(base.content_hash(&buffer), pitched.content_hash(&buffer));
        assert_ne!(base.content_hash(&buffer), compressed.content_hash(&buffer));
    }
}
