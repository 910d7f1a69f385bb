//! Shared data models for the vertical video normalizer.
//!
//! This crate provides Serde-serializable types for:
//! - Video sources, probed geometry and normalized artifacts
//! - Aspect ratio and duration policy decisions
//! - Pipeline and encode job states
//! - Encoder settings
//! - Progress notifications
//! - Scheduling metadata handed to the upload backend

pub mod aspect;
pub mod encoding;
pub mod job;
pub mod policy;
pub mod progress;
pub mod schedule;
pub mod video;

// Re-export common types
pub use aspect::AspectRatio;
pub use encoding::EncoderSettings;
pub use job::{Disposition, JobId, JobState, PipelineState};
pub use policy::{PolicyDecision, MAX_DURATION_MS};
pub use progress::{PipelineSnapshot, ProgressEvent};
pub use schedule::{PrivacyStatus, ScheduleRequest, VideoCategory, VIDEO_CATEGORIES};
pub use video::{Geometry, NormalizedArtifact, VideoSource, NORMALIZED_MIME_TYPE};
