//! Job identifiers, state machines and terminal dispositions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::NormalizedArtifact;

/// Unique identifier for one file selection's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of an encode job inside the encoder session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Loading,
    WritingInput,
    CountingFrames,
    Transcoding,
    ReadingOutput,
    Complete,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Loading => "loading",
            JobState::WritingInput => "writing_input",
            JobState::CountingFrames => "counting_frames",
            JobState::Transcoding => "transcoding",
            JobState::ReadingOutput => "reading_output",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of the normalization pipeline for one file selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Probing,
    AwaitingConsent,
    Preparing,
    Transcoding,
    ReadingOutput,
    /// Terminal: the original bytes are used as-is
    PassThrough,
    /// Terminal: a reformatted artifact is ready
    NormalizedReady,
    /// Terminal: the user declined the reformat
    Aborted,
    /// Terminal: a probe or engine step failed
    Failed,
    /// Terminal: superseded by a newer file selection
    Cancelled,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Probing => "probing",
            PipelineState::AwaitingConsent => "awaiting_consent",
            PipelineState::Preparing => "preparing",
            PipelineState::Transcoding => "transcoding",
            PipelineState::ReadingOutput => "reading_output",
            PipelineState::PassThrough => "pass_through",
            PipelineState::NormalizedReady => "normalized_ready",
            PipelineState::Aborted => "aborted",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::PassThrough
                | PipelineState::NormalizedReady
                | PipelineState::Aborted
                | PipelineState::Failed
                | PipelineState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        if next == Cancelled {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Idle, Probing)
                | (Probing, PassThrough)
                | (Probing, AwaitingConsent)
                | (Probing, Failed)
                | (AwaitingConsent, Aborted)
                | (AwaitingConsent, Preparing)
                | (Preparing, Transcoding)
                | (Preparing, Failed)
                | (Transcoding, ReadingOutput)
                | (Transcoding, Failed)
                | (ReadingOutput, NormalizedReady)
                | (ReadingOutput, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of one file selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Source already satisfies the shape; original bytes are returned untouched.
    PassThrough(Bytes),
    /// Source was reformatted.
    NormalizedReady(NormalizedArtifact),
    /// User declined the reformat.
    Aborted,
    /// A step failed; the reason is human-readable.
    Failed(String),
    /// A newer file selection superseded this job.
    Cancelled,
}

impl Disposition {
    /// Pipeline state matching this outcome.
    pub fn state(&self) -> PipelineState {
        match self {
            Disposition::PassThrough(_) => PipelineState::PassThrough,
            Disposition::NormalizedReady(_) => PipelineState::NormalizedReady,
            Disposition::Aborted => PipelineState::Aborted,
            Disposition::Failed(_) => PipelineState::Failed,
            Disposition::Cancelled => PipelineState::Cancelled,
        }
    }
}
