//! Builder for configuring and constructing a `CadenzaEngine`.

use cadenza_analysis::DetectionMethod;

use crate::config::{EngineConfig, RenderDefaults};
use crate::{CadenzaEngine, Result};

/// Starts from [`EngineConfig::default`]; `build()` validates the result.
///
/// # Example
///
/// ```
/// use cadenza::prelude::*;
///
/// let engine = CadenzaEngine::builder()
///     .cache_capacity(0)
///     .telemetry(false)
///     .preview_defaults(RenderDefaults {
///         algorithm: StretchAlgorithm::Wsola,
///         quality: Quality::Fast,
///         replace_original: false,
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(engine.config().preview.algorithm, StretchAlgorithm::Wsola);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CadenzaEngineBuilder {
    config: EngineConfig,
}

impl CadenzaEngineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 64. 0 disables caching.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Default: true
    pub fn telemetry(mut self, enabled: bool) -> Self {
        self.config.telemetry = enabled;
        self
    }

    /// Default: 0.99
    pub fn clipping_threshold(mut self, threshold: f32) -> Self {
        self.config.clipping_threshold = threshold;
        self
    }

    pub fn preview_defaults(mut self, defaults: RenderDefaults) -> Self {
        self.config.preview = defaults;
        self
    }

    pub fn commit_defaults(mut self, defaults: RenderDefaults) -> Self {
        self.config.commit = defaults;
        self
    }

    pub fn transient_window(mut self, fft_size: usize, hop_size: usize) -> Self {
        self.config.transient.fft_size = fft_size;
        self.config.transient.hop_size = hop_size;
        self
    }

    pub fn transient_sensitivity(mut self, sensitivity: f64) -> Self {
        self.config.transient.sensitivity = sensitivity;
        self
    }

    pub fn detection_method(mut self, method: DetectionMethod) -> Self {
        self.config.transient.method = method;
        self
    }

    /// Grid lines per beat for quantization. Default: 1
    pub fn quantize_subdivision(mut self, subdivision: u32) -> Self {
        self.config.quantize.subdivision = subdivision;
        self
    }

    /// Default: 64
    pub fn cancel_check_interval(mut self, frames: usize) -> Self {
        self.config.cancel_check_interval = frames;
        self
    }

    pub fn build(self) -> Result<CadenzaEngine> {
        CadenzaEngine::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validates() {
        assert!(CadenzaEngineBuilder::default().build().is_ok());
        assert!(CadenzaEngineBuilder::default()
            .clipping_threshold(2.0)
            .build()
            .is_err());
        assert!(CadenzaEngineBuilder::default()
            .transient_window(1024, 0)
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_sets_fields() {
        let engine = CadenzaEngineBuilder::default()
            .quantize_subdivision(4)
            .detection_method(DetectionMethod::Energy)
            .build()
            .unwrap();
        assert_eq!(engine.config().quantize.subdivision, 4);
        assert_eq!(engine.config().transient.method, DetectionMethod::Energy);
    }
}
