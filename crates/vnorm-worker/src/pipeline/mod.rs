//! Normalization pipeline: one file selection from probe to artifact.
//!
//! ```text
//! Idle -> Probing -> PassThrough
//!                 -> AwaitingConsent -> Aborted
//!                                    -> Preparing -> Transcoding -> ReadingOutput -> NormalizedReady
//! (Probing | Preparing | Transcoding | ReadingOutput) -> Failed
//! any non-terminal state -> Cancelled
//! ```
//!
//! A newer [`NormalizationPipeline::process`] call cancels the one in
//! flight. The superseded call returns [`Disposition::Cancelled`] and stops
//! publishing progress; only the active job is visible to subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use vnorm_media::{
    EncodeJob, EncoderSession, FfmpegEngine, FfprobeProbe, FilterSpec, FormatPolicy, MediaError,
    MediaResult, MetadataProbe, ProgressReceiver, ProgressSender,
};
use vnorm_models::{
    Disposition, JobId, NormalizedArtifact, PipelineSnapshot, PipelineState, ProgressEvent,
    VideoSource,
};

use crate::config::NormalizerConfig;
use crate::consent::ConsentProvider;
use crate::logging::JobLogger;

#[cfg(test)]
mod tests;

struct ActiveJob {
    id: JobId,
    cancel: watch::Sender<bool>,
}

/// State visible across concurrent `process` calls.
struct Shared {
    progress: ProgressSender,
    snapshot: watch::Sender<PipelineSnapshot>,
    active: Mutex<Option<ActiveJob>>,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `job` the active one and return the job it replaced.
    fn activate(&self, job: ActiveJob) -> Option<ActiveJob> {
        let mut active = self.active();
        self.progress.reset();
        self.snapshot.send_replace(PipelineSnapshot {
            job_id: Some(job.id.clone()),
            ..PipelineSnapshot::default()
        });
        active.replace(job)
    }

    fn release(&self, id: &JobId) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|job| &job.id == id) {
            *active = None;
        }
    }

    fn publish(&self, id: &JobId, update: impl FnOnce(&mut PipelineSnapshot)) {
        let active = self.active();
        if active.as_ref().is_some_and(|job| &job.id == id) {
            self.snapshot.send_modify(update);
        }
    }

    fn publish_progress(&self, id: &JobId, event: ProgressEvent) {
        let active = self.active();
        if active.as_ref().is_some_and(|job| &job.id == id) {
            self.progress.send(event);
            self.snapshot.send_modify(|s| s.percent = event.percent);
        }
    }
}

/// Per-call job record.
struct Run {
    id: JobId,
    state: PipelineState,
    cancel: watch::Receiver<bool>,
    logger: JobLogger,
    shared: Arc<Shared>,
}

impl Run {
    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn transition(&mut self, next: PipelineState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                job_id = %self.id,
                from = %self.state,
                to = %next,
                "Ignoring illegal pipeline transition"
            );
            return false;
        }

        debug!(job_id = %self.id, from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        self.shared.publish(&self.id, |s| s.state = next);
        true
    }

    fn progress_callback(&self) -> impl Fn(ProgressEvent) + Send + 'static {
        let shared = self.shared.clone();
        let id = self.id.clone();
        move |event| {
            debug!(job_id = %id, percent = event.percent, "Encode progress");
            shared.publish_progress(&id, event);
        }
    }

    fn fail(self, error: MediaError) -> Disposition {
        if error.is_cancellation() {
            self.conclude(Disposition::Cancelled)
        } else {
            self.conclude(Disposition::Failed(error.to_string()))
        }
    }

    /// Settle on a terminal outcome. A cancelled job reports `Cancelled`
    /// whatever it produced.
    fn conclude(mut self, disposition: Disposition) -> Disposition {
        let disposition = if self.is_cancelled() {
            Disposition::Cancelled
        } else {
            disposition
        };

        self.transition(disposition.state());
        self.logger.finished(&disposition);
        if let Disposition::Failed(reason) = &disposition {
            let reason = reason.clone();
            self.shared.publish(&self.id, |s| s.error = Some(reason));
        }

        self.shared.release(&self.id);
        disposition
    }
}

/// Drives probe, policy, consent and the encoder session for each file.
pub struct NormalizationPipeline {
    session: Arc<EncoderSession>,
    probe: Arc<dyn MetadataProbe>,
    consent: Arc<dyn ConsentProvider>,
    policy: FormatPolicy,
    shared: Arc<Shared>,
}

impl NormalizationPipeline {
    pub fn new(
        session: Arc<EncoderSession>,
        probe: Arc<dyn MetadataProbe>,
        consent: Arc<dyn ConsentProvider>,
    ) -> Self {
        let (progress, _) = vnorm_media::progress::channel();
        let (snapshot, _) = watch::channel(PipelineSnapshot::default());
        Self {
            session,
            probe,
            consent,
            policy: FormatPolicy::default(),
            shared: Arc::new(Shared {
                progress,
                snapshot,
                active: Mutex::new(None),
            }),
        }
    }

    /// Pipeline over the ffmpeg/ffprobe binaries, configured from `config`.
    pub fn with_ffmpeg(config: &NormalizerConfig, consent: Arc<dyn ConsentProvider>) -> Self {
        let settings = config.encoder_settings();
        let engine = FfmpegEngine::new()
            .with_timeout(settings.exec_timeout_secs.map(Duration::from_secs));
        let session = EncoderSession::new(Arc::new(engine), settings);
        Self::new(Arc::new(session), Arc::new(FfprobeProbe::new()), consent)
            .with_policy(FormatPolicy::new(config.max_duration_ms))
    }

    pub fn with_policy(mut self, policy: FormatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &FormatPolicy {
        &self.policy
    }

    pub fn session(&self) -> &Arc<EncoderSession> {
        &self.session
    }

    /// Progress of the active job, latest value wins.
    pub fn subscribe_progress(&self) -> ProgressReceiver {
        self.shared.progress.subscribe()
    }

    /// Snapshots of the active job.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Cancel the job in flight, if any.
    pub fn cancel_active(&self) -> bool {
        match self.shared.active().as_ref() {
            Some(job) => {
                job.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Normalize one file selection.
    pub async fn process(&self, source: VideoSource) -> Disposition {
        let run = self.start();
        let span = run.logger.span(&source);
        self.run(run, source).instrument(span).await
    }

    fn start(&self) -> Run {
        let id = JobId::new();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let previous = self.shared.activate(ActiveJob {
            id: id.clone(),
            cancel: cancel_tx,
        });
        if let Some(previous) = previous {
            info!(job_id = %previous.id, superseded_by = %id, "Cancelling in-flight job");
            previous.cancel.send_replace(true);
        }

        Run {
            logger: JobLogger::new(&id),
            id,
            state: PipelineState::Idle,
            cancel: cancel_rx,
            shared: self.shared.clone(),
        }
    }

    async fn run(&self, mut run: Run, source: VideoSource) -> Disposition {
        run.logger.started(&source);

        run.transition(PipelineState::Probing);
        let geometry = match self.probe.probe(&source).await {
            Ok(geometry) => geometry,
            Err(e) => return run.fail(e),
        };
        if run.is_cancelled() {
            return run.conclude(Disposition::Cancelled);
        }

        let decision = self.policy.decide(&geometry);
        info!(
            job_id = %run.id,
            geometry = %geometry,
            vertical = decision.is_vertical(),
            exceeds_max_duration = decision.exceeds_max_duration(),
            "Format decision"
        );
        if !decision.needs_reformat() {
            return run.conclude(Disposition::PassThrough(source.bytes().clone()));
        }

        run.transition(PipelineState::AwaitingConsent);
        let granted = self.consent.confirm(&source, &decision).await;
        if run.is_cancelled() {
            return run.conclude(Disposition::Cancelled);
        }
        if !granted {
            return run.conclude(Disposition::Aborted);
        }

        run.transition(PipelineState::Preparing);
        let filter = FilterSpec::from_settings(self.session.settings());
        let mut job = match self
            .session
            .begin_job(filter, self.policy.max_duration_ms, run.cancel.clone())
            .await
        {
            Ok(job) => job,
            Err(e) => return run.fail(e),
        };

        let outcome = Self::encode(&mut run, &mut job, &source).await;
        job.close().await;

        match outcome {
            Ok(bytes) => run.conclude(Disposition::NormalizedReady(NormalizedArtifact::mp4(
                bytes,
                source.name(),
            ))),
            Err(e) => run.fail(e),
        }
    }

    async fn encode(run: &mut Run, job: &mut EncodeJob, source: &VideoSource) -> MediaResult<Bytes> {
        let input = job.stage_input(source.bytes().clone()).await?;
        let total_frames = job.count_frames(&input).await?;
        run.logger.frames_counted(total_frames);

        run.transition(PipelineState::Transcoding);
        let output = job.transcode(&input, run.progress_callback()).await?;

        run.transition(PipelineState::ReadingOutput);
        job.read_output(&output).await
    }
}
