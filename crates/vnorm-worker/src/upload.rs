//! Scheduling backend client.
//!
//! Hands a finished artifact to the backend as a multipart `POST /cronjobs`
//! together with the publication metadata.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use vnorm_models::ScheduleRequest;

use crate::error::{WorkerError, WorkerResult};

/// Receives upload-ready bytes with their scheduling metadata.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Schedule `bytes` for publication. Returns the backend's confirmation.
    async fn schedule(
        &self,
        bytes: Bytes,
        file_name: &str,
        mime_type: &str,
        request: &ScheduleRequest,
    ) -> WorkerResult<String>;
}

#[derive(Debug, Default, Deserialize)]
struct BackendReply {
    message: Option<String>,
    error: Option<String>,
}

/// HTTP client for the scheduling backend.
#[derive(Debug, Clone)]
pub struct ScheduleClient {
    base_url: String,
    client: Client,
}

impl ScheduleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn form(bytes: Bytes, file_name: &str, mime_type: &str, request: &ScheduleRequest) -> WorkerResult<Form> {
        let len = bytes.len() as u64;
        let file = Part::stream_with_length(bytes, len)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| WorkerError::upload(format!("invalid mime type {mime_type}: {e}")))?;

        let mut form = Form::new()
            .part("videoFile", file)
            .text("title", request.title.clone())
            .text("description", request.description.clone())
            .text("tags", request.tags.clone());
        if let Some(privacy) = request.privacy.form_value() {
            form = form.text("privacyStatus", privacy);
        }
        Ok(form
            .text("categoryId", request.category_id.clone())
            .text("thumbnailOffset", request.thumbnail_offset_ms.to_string())
            .text("scheduledAt", request.scheduled_at_value()))
    }
}

#[async_trait]
impl ArtifactUploader for ScheduleClient {
    async fn schedule(
        &self,
        bytes: Bytes,
        file_name: &str,
        mime_type: &str,
        request: &ScheduleRequest,
    ) -> WorkerResult<String> {
        request.validate()?;

        let url = format!("{}/cronjobs", self.base_url);
        debug!(url = %url, bytes = bytes.len(), file_name, "Scheduling upload");

        let form = Self::form(bytes, file_name, mime_type, request)?;
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        let reply: BackendReply = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            let reason = reply
                .error
                .unwrap_or_else(|| format!("backend returned {status}"));
            return Err(WorkerError::upload(reason));
        }

        let message = reply
            .message
            .unwrap_or_else(|| "Cron job created successfully!".to_string());
        info!(scheduled_at = %request.scheduled_at_value(), "{}", message);
        Ok(message)
    }
}
