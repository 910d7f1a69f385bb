//! Progress notifications for a presentation layer.

use serde::{Deserialize, Serialize};

use crate::{JobId, PipelineState};

/// Encode progress, 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent: u8,
}

impl ProgressEvent {
    /// Create an event, clamping to 100.
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

/// Latest pipeline status, published for polling UIs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Job the snapshot belongs to; `None` before the first selection
    pub job_id: Option<JobId>,
    pub state: PipelineState,
    /// Last emitted encode progress
    pub percent: u8,
    /// Failure reason when `state` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_clamped() {
        assert_eq!(ProgressEvent::new(150).percent, 100);
        assert!(ProgressEvent::new(100).is_complete());
        assert!(!ProgressEvent::new(99).is_complete());
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = PipelineSnapshot {
            job_id: Some(JobId::from_string("job-1")),
            state: PipelineState::Transcoding,
            percent: 42,
            error: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "transcoding");
        assert_eq!(json["job_id"], "job-1");
        assert!(json.get("error").is_none());
    }
}
