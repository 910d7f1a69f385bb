//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for normalization jobs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vnorm_models::{Disposition, JobId, VideoSource};

/// Install the global tracing subscriber.
///
/// Colored output for interactive use, JSON when `json` is set. `RUST_LOG`
/// directives are honored on top of the `vnorm` crates logging at info.
pub fn init_tracing(json: bool) {
    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["vnorm_worker=info", "vnorm_media=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Job-scoped log lines for one normalization.
///
/// Every line carries the job id. Engine and session events nest under
/// [`JobLogger::span`], which adds the source name.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.clone(),
        }
    }

    pub fn span(&self, source: &VideoSource) -> Span {
        tracing::info_span!("normalize", job_id = %self.job_id, source = source.name())
    }

    pub fn started(&self, source: &VideoSource) {
        info!(
            job_id = %self.job_id,
            bytes = source.len(),
            content_type = source.content_type(),
            "Normalization started"
        );
    }

    pub fn frames_counted(&self, total_frames: u64) {
        info!(job_id = %self.job_id, frames = total_frames, "Frames to encode");
    }

    /// Log the outcome at a level matching its severity.
    pub fn finished(&self, disposition: &Disposition) {
        match disposition {
            Disposition::PassThrough(bytes) => {
                info!(job_id = %self.job_id, bytes = bytes.len(), "Already conforms, passing through")
            }
            Disposition::NormalizedReady(artifact) => {
                info!(job_id = %self.job_id, bytes = artifact.bytes.len(), "Normalized")
            }
            Disposition::Aborted => warn!(job_id = %self.job_id, "Reformat declined"),
            Disposition::Failed(reason) => {
                error!(job_id = %self.job_id, reason = %reason, "Normalization failed")
            }
            Disposition::Cancelled => warn!(job_id = %self.job_id, "Superseded by a newer selection"),
        }
    }
}
