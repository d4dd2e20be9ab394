//! Ordered chain of dynamics stages.

use super::compressor::{Compressor, CompressorSettings};
use super::gain::{apply_gain, apply_limiter};
use super::utils::ensure_finite;
use cadenza_core::{Result, SampleBuffer};
use serde::{Deserialize, Serialize};

/// One post-processing stage. `Eq`, `Reverb` and unrecognised stage types
/// pass audio through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DynamicsStage {
    Gain { gain_db: f32 },
    Compressor(CompressorSettings),
    Limiter { ceiling_db: f32 },
    Eq,
    Reverb,
    #[serde(other)]
    Unknown,
}

impl DynamicsStage {
    pub fn validate(&self) -> Result<()> {
        match self {
            DynamicsStage::Gain { gain_db } => ensure_finite("gain_db", *gain_db as f64),
            DynamicsStage::Compressor(settings) => settings.validate(),
            DynamicsStage::Limiter { ceiling_db } => ensure_finite("ceiling_db", *ceiling_db as f64),
            DynamicsStage::Eq | DynamicsStage::Reverb | DynamicsStage::Unknown => Ok(()),
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(
            self,
            DynamicsStage::Eq | DynamicsStage::Reverb | DynamicsStage::Unknown
        )
    }
}

/// Stages applied in the order given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicsChain {
    stages: Vec<DynamicsStage>,
}

impl DynamicsChain {
    /// Build a chain, validating every stage's parameters.
    pub fn new(stages: Vec<DynamicsStage>) -> Result<Self> {
        for stage in &stages {
            stage.validate()?;
        }
        Ok(Self { stages })
    }

    pub fn push(&mut self, stage: DynamicsStage) -> Result<()> {
        stage.validate()?;
        self.stages.push(stage);
        Ok(())
    }

    pub fn stages(&self) -> &[DynamicsStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over `buffer` and return the processed buffer.
    pub fn process(&self, buffer: SampleBuffer) -> Result<SampleBuffer> {
        if self.stages.is_empty() {
            return Ok(buffer);
        }
        let sample_rate = buffer.sample_rate();
        let mut channels = buffer.into_channels();

        for stage in &self.stages {
            match stage {
                DynamicsStage::Gain { gain_db } => apply_gain(&mut channels, *gain_db),
                DynamicsStage::Compressor(settings) => {
                    Compressor::new(*settings, sample_rate)?.process(&mut channels)
                }
                DynamicsStage::Limiter { ceiling_db } => apply_limiter(&mut channels, *ceiling_db),
                DynamicsStage::Eq | DynamicsStage::Reverb | DynamicsStage::Unknown => {
                    tracing::warn!(?stage, "dynamics stage not implemented, passing through");
                }
            }
        }

        SampleBuffer::new(channels, sample_rate)
    }
}
