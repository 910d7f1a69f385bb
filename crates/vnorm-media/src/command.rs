//! FFmpeg command builder.
//!
//! Inputs and outputs are names inside the engine's working area, not host
//! paths; the engine runs FFmpeg with that area as its working directory.

use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Output target that discards everything (`-f null -`).
pub const NULL_OUTPUT: &str = "-";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input name
    input: String,
    /// Output name
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Create a decode-only command whose output is discarded.
    pub fn null_sink(input: impl Into<String>) -> Self {
        Self::new(input, NULL_OUTPUT).output_arg("-f").output_arg("null")
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit output duration.
    pub fn output_duration_ms(self, duration_ms: u64) -> Self {
        self.output_arg("-t").output_arg(format_seconds(duration_ms))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Select only the first video stream.
    pub fn first_video_stream(self) -> Self {
        self.output_arg("-map").output_arg("0:v:0")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Errors only; progress comes from -progress
        args.push("-v".to_string());
        args.push("error".to_string());

        // Newline-terminated key=value progress on stderr instead of the \r stats line
        args.push("-nostats".to_string());
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        // Input args
        args.extend(self.input_args.clone());

        // Input file
        args.push("-i".to_string());
        args.push(self.input.clone());

        // Output args
        args.extend(self.output_args.clone());

        // Output file
        args.push(self.output.clone());

        args
    }
}

/// Milliseconds as FFmpeg seconds with millisecond precision.
pub fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
