//! Vertical video normalizer.
//!
//! This crate provides:
//! - The normalization pipeline state machine
//! - Consent providers for the reformat prompt
//! - The scheduling backend upload client
//! - Environment configuration and structured job logging

pub mod config;
pub mod consent;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod upload;

pub use config::NormalizerConfig;
pub use consent::{ConsentProvider, FixedConsent, PromptConsent};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::NormalizationPipeline;
pub use upload::{ArtifactUploader, ScheduleClient};
