#![deny(unreachable_patterns)]
//! FFmpeg-backed media layer for video normalization.
//!
//! This crate provides:
//! - Geometry probing via ffprobe
//! - The vertical/duration format policy
//! - A single-owner encoder session with frame counting and letterbox encode
//! - Frame-based progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio

pub mod command;
pub mod engine;
pub mod error;
pub mod filters;
pub mod policy;
pub mod probe;
pub mod progress;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use engine::{ExecStatus, FfmpegEngine, LogSink, TranscodeEngine};
pub use error::{MediaError, MediaResult};
pub use filters::{filter_letterbox, FilterSpec};
pub use policy::FormatPolicy;
pub use probe::{parse_ffprobe_output, FfprobeProbe, MetadataProbe};
pub use progress::{FrameTick, ProgressReceiver, ProgressSender, ProgressTracker};
pub use session::{EncodeJob, EncoderSession, InputHandle, OutputHandle, INPUT_NAME, OUTPUT_NAME};
