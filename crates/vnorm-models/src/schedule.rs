//! Publication metadata sent alongside the normalized video.
//!
//! These fields are opaque to the normalization pipeline; they are collected
//! by the caller and forwarded to the scheduling backend unchanged.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Format produced by an HTML `datetime-local` input.
pub const SCHEDULE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// A platform video category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCategory {
    pub name: &'static str,
    pub id: &'static str,
}

/// Categories accepted by the backend.
pub const VIDEO_CATEGORIES: &[VideoCategory] = &[
    VideoCategory { name: "Film & Animation", id: "1" },
    VideoCategory { name: "Autos & Vehicles", id: "2" },
    VideoCategory { name: "Music", id: "10" },
    VideoCategory { name: "Pets & Animals", id: "15" },
    VideoCategory { name: "Sports", id: "17" },
    VideoCategory { name: "Short Movies", id: "18" },
    VideoCategory { name: "Travel & Events", id: "19" },
    VideoCategory { name: "Gaming", id: "20" },
    VideoCategory { name: "Videoblogging", id: "21" },
    VideoCategory { name: "People & Blogs", id: "22" },
    VideoCategory { name: "Comedy", id: "23" },
    VideoCategory { name: "Entertainment", id: "24" },
    VideoCategory { name: "News & Politics", id: "25" },
    VideoCategory { name: "Howto & Style", id: "26" },
    VideoCategory { name: "Education", id: "27" },
    VideoCategory { name: "Science & Technology", id: "28" },
    VideoCategory { name: "Nonprofits & Activism", id: "29" },
    VideoCategory { name: "Movies", id: "30" },
    VideoCategory { name: "Anime/Animation", id: "31" },
    VideoCategory { name: "Action/Adventure", id: "32" },
    VideoCategory { name: "Classics", id: "33" },
    VideoCategory { name: "Documentary", id: "35" },
    VideoCategory { name: "Drama", id: "36" },
    VideoCategory { name: "Family", id: "37" },
    VideoCategory { name: "Foreign", id: "38" },
    VideoCategory { name: "Horror", id: "39" },
    VideoCategory { name: "Sci-Fi/Fantasy", id: "40" },
    VideoCategory { name: "Thriller", id: "41" },
    VideoCategory { name: "Shorts", id: "42" },
    VideoCategory { name: "Shows", id: "43" },
    VideoCategory { name: "Trailers", id: "44" },
];

impl VideoCategory {
    /// Look up a category by id.
    pub fn find(id: &str) -> Option<&'static VideoCategory> {
        VIDEO_CATEGORIES.iter().find(|c| c.id == id)
    }
}

/// Publication visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyStatus {
    /// Let the backend decide; the field is omitted from the request
    Default,
    #[default]
    Public,
    Private,
}

impl PrivacyStatus {
    /// Form value, or `None` when the field must be omitted.
    pub fn form_value(&self) -> Option<&'static str> {
        match self {
            PrivacyStatus::Default => None,
            PrivacyStatus::Public => Some("public"),
            PrivacyStatus::Private => Some("private"),
        }
    }
}

impl FromStr for PrivacyStatus {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(PrivacyStatus::Default),
            "public" => Ok(PrivacyStatus::Public),
            "private" => Ok(PrivacyStatus::Private),
            _ => Err(ScheduleParseError::InvalidPrivacy(s.to_string())),
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.form_value().unwrap_or("default"))
    }
}

#[derive(Debug, Error)]
pub enum ScheduleParseError {
    #[error("Invalid privacy status: {0}, expected default, public or private")]
    InvalidPrivacy(String),

    #[error("Invalid schedule time: {0}, expected YYYY-MM-DDTHH:MM")]
    InvalidScheduleTime(String),
}

/// Parse a `datetime-local` value, with or without seconds.
pub fn parse_scheduled_at(value: &str) -> Result<NaiveDateTime, ScheduleParseError> {
    NaiveDateTime::parse_from_str(value, SCHEDULE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ScheduleParseError::InvalidScheduleTime(value.to_string()))
}

/// Metadata for scheduling one video's publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ScheduleRequest {
    #[validate(length(max = 100))]
    pub title: String,

    #[validate(length(max = 5000))]
    pub description: String,

    /// Comma-separated tags
    #[serde(default)]
    pub tags: String,

    #[serde(default)]
    pub privacy: PrivacyStatus,

    #[validate(custom(function = "validate_category"))]
    pub category_id: String,

    /// Playback position picked as thumbnail, in milliseconds
    #[serde(default)]
    pub thumbnail_offset_ms: u64,

    /// Local publication time
    pub scheduled_at: NaiveDateTime,
}

fn validate_category(id: &str) -> Result<(), ValidationError> {
    if VideoCategory::find(id).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_category"))
    }
}

impl ScheduleRequest {
    /// Create a request with defaults for everything but the time.
    pub fn new(title: impl Into<String>, scheduled_at: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            tags: String::new(),
            privacy: PrivacyStatus::default(),
            category_id: "1".to_string(),
            thumbnail_offset_ms: 0,
            scheduled_at,
        }
    }

    /// Scheduled time in `datetime-local` form.
    pub fn scheduled_at_value(&self) -> String {
        self.scheduled_at.format(SCHEDULE_FORMAT).to_string()
    }
}
