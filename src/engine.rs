//! Engine: configuration, result caches and the operation entry points.

use std::sync::Arc;

use cadenza_analysis::{AnalysisResult, BeatQuantizer, QuantizeParams, Transient, TransientDetector};
use cadenza_core::{CancellationToken, SampleBuffer, WarpMarker};

use crate::cache::{ContentHasher, ResultCache};
use crate::config::EngineConfig;
use crate::job::{JobOutput, JobRequest, SampleSource};
use crate::render::{self, RenderRequest, RenderResult};
use crate::Result;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub render_entries: usize,
    pub render_hits: u64,
    pub render_misses: u64,
    pub analysis_entries: usize,
    pub analysis_hits: u64,
    pub analysis_misses: u64,
}

/// Offline warp/analysis engine.
///
/// Every operation takes immutable inputs and returns a new result; the only
/// shared state is a pair of content-addressed caches, so one engine can
/// serve many worker threads at once.
///
/// # Example
///
/// ```
/// use cadenza::prelude::*;
///
/// let engine = CadenzaEngine::builder().cache_capacity(16).build().unwrap();
/// let buffer = SampleBuffer::mono(vec![0.0; 44100], 44100.0).unwrap();
///
/// let markers = vec![WarpMarker::new("downbeat", 0.5, 0.75)];
/// let result = engine.commit(&buffer, "clip-1", markers).unwrap();
/// assert!(result.buffer.len() > buffer.len());
/// ```
#[derive(Debug)]
pub struct CadenzaEngine {
    config: EngineConfig,
    renders: ResultCache<RenderResult>,
    analyses: ResultCache<AnalysisResult>,
}

impl CadenzaEngine {
    /// Create a new engine builder
    pub fn builder() -> crate::CadenzaEngineBuilder {
        crate::CadenzaEngineBuilder::default()
    }

    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            renders: ResultCache::new(config.cache_capacity),
            analyses: ResultCache::new(config.cache_capacity),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render `buffer` through `request`.
    ///
    /// Returns [`Error::Cancelled`](cadenza_core::Error::Cancelled) if `cancel`
    /// fires before the render completes; the input buffer is never modified.
    pub fn render(
        &self,
        buffer: &SampleBuffer,
        request: RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RenderResult> {
        let span = tracing::debug_span!("render", clip_id = %request.clip_id);
        let _guard = span.enter();

        let key = request.content_hash(buffer);
        if let Some(cached) = self.renders.get(&key) {
            tracing::debug!("render cache hit");
            let mut result = RenderResult::clone(&cached);
            result.metadata.cache_hit = true;
            return Ok(result);
        }

        let result = render::execute(buffer, &request, &self.config, cancel)?;
        self.renders.insert(key, Arc::new(result.clone()));
        Ok(result)
    }

    pub fn render_uncancellable(
        &self,
        buffer: &SampleBuffer,
        request: RenderRequest,
    ) -> Result<RenderResult> {
        self.render(buffer, request, &CancellationToken::new())
    }

    /// Disposable render of `[start, end]` with the configured preview defaults.
    pub fn preview(
        &self,
        buffer: &SampleBuffer,
        clip_id: &str,
        markers: Vec<WarpMarker>,
        start: f64,
        end: f64,
    ) -> Result<RenderResult> {
        let request = RenderRequest::preview(clip_id, markers, start, end, &self.config.preview);
        self.render_uncancellable(buffer, request)
    }

    /// Whole-clip render with the configured commit defaults.
    pub fn commit(
        &self,
        buffer: &SampleBuffer,
        clip_id: &str,
        markers: Vec<WarpMarker>,
    ) -> Result<RenderResult> {
        let request = RenderRequest::commit(clip_id, markers, &self.config.commit);
        self.render_uncancellable(buffer, request)
    }

    /// Signal metrics of `buffer`. Never fails.
    pub fn analyze(&self, buffer: &SampleBuffer) -> AnalysisResult {
        let mut hasher = ContentHasher::new("analyze");
        hasher
            .write_buffer(buffer)
            .write_f32(self.config.clipping_threshold);
        let key = hasher.finish();

        if let Some(cached) = self.analyses.get(&key) {
            return AnalysisResult::clone(&cached);
        }
        let result = cadenza_analysis::analyze(buffer, self.config.clipping_threshold);
        self.analyses.insert(key, Arc::new(result.clone()));
        result
    }

    fn detector(&self, sample_rate: f64) -> TransientDetector {
        let settings = &self.config.transient;
        let mut detector =
            TransientDetector::with_params(sample_rate, settings.fft_size, settings.hop_size);
        detector.set_method(settings.method);
        detector
    }

    /// Onsets in `buffer`; unset arguments use the configured defaults.
    pub fn detect_transients(
        &self,
        buffer: &SampleBuffer,
        sensitivity: Option<f64>,
        min_gap_seconds: Option<f64>,
    ) -> Result<Vec<Transient>> {
        let settings = &self.config.transient;
        Ok(self.detector(buffer.sample_rate()).detect_buffer(
            buffer,
            sensitivity.unwrap_or(settings.sensitivity),
            min_gap_seconds.unwrap_or(settings.min_gap_seconds),
        )?)
    }

    /// Tempo markers pulling the onsets of `buffer` toward a `target_bpm` grid.
    pub fn quantize(
        &self,
        buffer: &SampleBuffer,
        target_bpm: f64,
        strength: f64,
        sensitivity: Option<f64>,
    ) -> Result<Vec<WarpMarker>> {
        let params = QuantizeParams {
            target_bpm,
            strength,
            sensitivity: sensitivity.unwrap_or(self.config.transient.sensitivity),
            subdivision: self.config.quantize.subdivision,
            grid_offset_seconds: self.config.quantize.grid_offset_seconds,
            min_gap_seconds: self.config.transient.min_gap_seconds,
        };
        let quantizer = BeatQuantizer::with_detector(self.detector(buffer.sample_rate()));
        Ok(quantizer.quantize(buffer, &params)?)
    }

    /// Load the job's clip from `source` and run the requested operation.
    pub fn run_job(
        &self,
        request: &JobRequest,
        source: &dyn SampleSource,
        cancel: &CancellationToken,
    ) -> Result<JobOutput> {
        let clip = request.clip();
        let span = tracing::info_span!("job", kind = request.name(), clip_id = %clip.clip_id);
        let _guard = span.enter();

        let buffer = source.load(clip)?;
        cancel.check()?;

        let output = match request {
            JobRequest::Preview(job) => {
                let defaults = &self.config.preview;
                let render_request = RenderRequest {
                    pitch_shift_semitones: job.pitch_shift_semitones,
                    preserve_formants: job.preserve_formants,
                    algorithm: job.algorithm.unwrap_or(defaults.algorithm),
                    quality: job.quality.unwrap_or(defaults.quality),
                    dynamics: job.dynamics.clone(),
                    ..RenderRequest::preview(
                        clip.clip_id.clone(),
                        job.markers.clone(),
                        job.start_time,
                        job.end_time,
                        defaults,
                    )
                };
                JobOutput::Render(self.render(&buffer, render_request, cancel)?)
            }
            JobRequest::Commit(job) => {
                let defaults = &self.config.commit;
                let render_request = RenderRequest {
                    pitch_shift_semitones: job.pitch_shift_semitones,
                    preserve_formants: job.preserve_formants,
                    algorithm: job.algorithm.unwrap_or(defaults.algorithm),
                    quality: job.quality.unwrap_or(defaults.quality),
                    replace_original: job.replace_original.unwrap_or(defaults.replace_original),
                    dynamics: job.dynamics.clone(),
                    ..RenderRequest::commit(clip.clip_id.clone(), job.markers.clone(), defaults)
                };
                JobOutput::Render(self.render(&buffer, render_request, cancel)?)
            }
            JobRequest::Quantize(job) => JobOutput::Markers(self.quantize(
                &buffer,
                job.target_bpm,
                job.strength,
                job.sensitivity,
            )?),
            JobRequest::DetectTransients(job) => JobOutput::Transients(self.detect_transients(
                &buffer,
                job.sensitivity,
                job.min_gap_seconds,
            )?),
            JobRequest::Analyze(_) => JobOutput::Analysis(self.analyze(&buffer)),
        };

        tracing::info!(kind = request.name(), "job completed");
        Ok(output)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            render_entries: self.renders.len(),
            render_hits: self.renders.hits(),
            render_misses: self.renders.misses(),
            analysis_entries: self.analyses.len(),
            analysis_hits: self.analyses.hits(),
            analysis_misses: self.analyses.misses(),
        }
    }

    pub fn clear_cache(&self) {
        self.renders.clear();
        self.analyses.clear();
    }
}
