//! FFprobe video geometry.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use vnorm_models::{Geometry, VideoSource};

use crate::error::{MediaError, MediaResult};

/// Extracts displayed width, height and duration from a video source.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, source: &VideoSource) -> MediaResult<Geometry>;
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Display rotation in degrees, normalized to 0..360.
    fn rotation(&self) -> i64 {
        let from_side_data = self
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .map(|r| r.round() as i64);
        let from_tag = self
            .tags
            .as_ref()
            .and_then(|t| t.rotate.as_ref())
            .and_then(|r| r.trim().parse::<i64>().ok());

        from_side_data.or(from_tag).unwrap_or(0).rem_euclid(360)
    }
}

/// Probe implementation backed by the `ffprobe` binary.
///
/// The source bytes are written to a temporary file for the duration of the
/// probe; the file is removed on every exit path.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self {
            binary: "ffprobe".to_string(),
        }
    }
}

#[async_trait]
impl MetadataProbe for FfprobeProbe {
    async fn probe(&self, source: &VideoSource) -> MediaResult<Geometry> {
        if source.is_empty() {
            return Err(MediaError::probe("source is empty"));
        }

        // Check FFprobe exists
        which::which(&self.binary).map_err(|_| MediaError::FfprobeNotFound)?;

        let suffix = source
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let staged = tempfile::Builder::new()
            .prefix("vnorm-probe-")
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(staged.path(), source.bytes()).await?;

        debug!(name = source.name(), bytes = source.len(), "Probing video");

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(staged.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::probe(format!(
                "ffprobe could not read {}: {}",
                source.name(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_ffprobe_output(&output.stdout)
    }
}

/// Parse ffprobe JSON into displayed geometry.
///
/// Quarter-turn rotations swap width and height so the result matches what
/// a player shows. Zero dimensions, zero duration and a missing video stream
/// are probe errors.
pub fn parse_ffprobe_output(stdout: &[u8]) -> MediaResult<Geometry> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::probe(format!("unreadable ffprobe output: {e}")))?;

    // Find video stream
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::probe("no video stream found"))?;

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MediaError::probe("video has no duration"))?;

    let mut width = video_stream.width.unwrap_or(0);
    let mut height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::probe(format!(
            "video has zero dimensions ({width}x{height})"
        )));
    }

    if matches!(video_stream.rotation(), 90 | 270) {
        std::mem::swap(&mut width, &mut height);
    }

    let geometry = Geometry::new(width, height, (duration_secs * 1000.0).round() as u64);
    if !geometry.is_valid() {
        return Err(MediaError::probe(format!("invalid geometry {geometry}")));
    }
    Ok(geometry)
}
