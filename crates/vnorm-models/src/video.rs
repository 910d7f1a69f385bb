//! Video source, geometry and artifact models.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// MIME type of every normalized artifact.
pub const NORMALIZED_MIME_TYPE: &str = "video/mp4";

/// A user-selected video: raw bytes plus the display name and declared
/// content type reported by the file picker.
///
/// Immutable once captured; clones share the underlying buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoSource {
    bytes: Bytes,
    name: String,
    content_type: String,
}

impl VideoSource {
    /// Capture a new source.
    pub fn new(bytes: impl Into<Bytes>, name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            name: name.into(),
            content_type: content_type.into(),
        }
    }

    /// Raw bytes of the source.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Display name (usually the original file name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared MIME type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Byte length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension of the display name, lowercased.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

impl fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSource")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Displayed geometry and duration of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl Geometry {
    pub const fn new(width: u32, height: u32, duration_ms: u64) -> Self {
        Self {
            width,
            height,
            duration_ms,
        }
    }

    /// True when every dimension and the duration are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.duration_ms > 0
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}ms", self.width, self.height, self.duration_ms)
    }
}

/// Output of a successful reformat. Ownership passes to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedArtifact {
    pub bytes: Bytes,
    pub mime_type: String,
    pub original_name: String,
}

impl NormalizedArtifact {
    /// Wrap encoded bytes as an MP4 artifact named after the source.
    pub fn mp4(bytes: impl Into<Bytes>, original_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: NORMALIZED_MIME_TYPE.to_string(),
            original_name: original_name.into(),
        }
    }
}

impl fmt::Debug for NormalizedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedArtifact")
            .field("mime_type", &self.mime_type)
            .field("original_name", &self.original_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
