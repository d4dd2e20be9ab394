//! Job payloads, outputs and the worker-side status machine.
//!
//! The engine never owns [`Job`] values: a worker receives a [`JobRequest`],
//! hands it to [`CadenzaEngine::run_job`](crate::CadenzaEngine::run_job) and
//! records the outcome on its own `Job`.

use cadenza_analysis::{AnalysisResult, Transient};
use cadenza_core::{ErrorKind, SampleBuffer, WarpMarker};
use cadenza_dsp::DynamicsStage;
use cadenza_stretch::{Quality, StretchAlgorithm};
use serde::{Deserialize, Serialize};

use crate::render::RenderResult;
use crate::{Error, Result};

/// Which stored clip a job operates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipRef {
    pub clip_id: String,
    /// Key the storage collaborator resolves to PCM samples.
    pub storage_key: String,
}

impl ClipRef {
    pub fn new(clip_id: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            clip_id: clip_id.into(),
            storage_key: storage_key.into(),
        }
    }
}

/// Resolves a [`ClipRef`] to audio. Implemented by the storage layer.
///
/// Any `Fn(&ClipRef) -> Result<SampleBuffer>` closure is a source.
pub trait SampleSource: Send + Sync {
    fn load(&self, clip: &ClipRef) -> Result<SampleBuffer>;
}

impl<F> SampleSource for F
where
    F: Fn(&ClipRef) -> Result<SampleBuffer> + Send + Sync,
{
    fn load(&self, clip: &ClipRef) -> Result<SampleBuffer> {
        self(clip)
    }
}

/// Unset algorithm/quality fields fall back to the engine's preview defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewJob {
    pub clip: ClipRef,
    #[serde(default)]
    pub markers: Vec<WarpMarker>,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub pitch_shift_semitones: f64,
    #[serde(default)]
    pub preserve_formants: bool,
    #[serde(default)]
    pub algorithm: Option<StretchAlgorithm>,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub dynamics: Vec<DynamicsStage>,
}

/// Unset fields fall back to the engine's commit defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitJob {
    pub clip: ClipRef,
    #[serde(default)]
    pub markers: Vec<WarpMarker>,
    #[serde(default)]
    pub pitch_shift_semitones: f64,
    #[serde(default)]
    pub preserve_formants: bool,
    #[serde(default)]
    pub algorithm: Option<StretchAlgorithm>,
    #[serde(default)]
    pub quality: Option<Quality>,
    #[serde(default)]
    pub replace_original: Option<bool>,
    #[serde(default)]
    pub dynamics: Vec<DynamicsStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizeJob {
    pub clip: ClipRef,
    pub target_bpm: f64,
    pub strength: f64,
    #[serde(default)]
    pub sensitivity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransientJob {
    pub clip: ClipRef,
    #[serde(default)]
    pub sensitivity: Option<f64>,
    #[serde(default)]
    pub min_gap_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeJob {
    pub clip: ClipRef,
}

/// Plain-data job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobRequest {
    Preview(PreviewJob),
    Commit(CommitJob),
    Quantize(QuantizeJob),
    DetectTransients(TransientJob),
    Analyze(AnalyzeJob),
}

impl JobRequest {
    pub fn clip(&self) -> &ClipRef {
        match self {
            JobRequest::Preview(job) => &job.clip,
            JobRequest::Commit(job) => &job.clip,
            JobRequest::Quantize(job) => &job.clip,
            JobRequest::DetectTransients(job) => &job.clip,
            JobRequest::Analyze(job) => &job.clip,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobRequest::Preview(_) => "preview",
            JobRequest::Commit(_) => "commit",
            JobRequest::Quantize(_) => "quantize",
            JobRequest::DetectTransients(_) => "detect_transients",
            JobRequest::Analyze(_) => "analyze",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum JobOutput {
    Render(RenderResult),
    Markers(Vec<WarpMarker>),
    Transients(Vec<Transient>),
    Analysis(AnalysisResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// `queued → processing → {completed | failed}`; terminal states are final.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// Failure recorded on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for JobError {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Worker-side job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub payload: JobRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl Job {
    pub fn new(id: impl Into<String>, payload: JobRequest) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            payload,
            result: None,
            error: None,
        }
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Processing)
    }

    pub fn complete(&mut self, output: JobOutput) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.result = Some(output);
        Ok(())
    }

    pub fn fail(&mut self, error: &Error) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Record the outcome of a run.
    pub fn finish(&mut self, outcome: Result<JobOutput>) -> Result<()> {
        match outcome {
            Ok(output) => self.complete(output),
            Err(error) => self.fail(&error),
        }
    }
}
