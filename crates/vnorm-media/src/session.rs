//! Encoder session: the single owner of the transcoding engine.
//!
//! The session initializes the engine at most once and hands out one
//! [`EncodeJob`] at a time. A job stages the input, counts frames with a
//! discard-output dry run, runs the letterbox encode while reporting
//! progress, and reads the result back.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info, warn};

use vnorm_models::{EncoderSettings, JobState, ProgressEvent};

use crate::command::FfmpegCommand;
use crate::engine::{ExecStatus, TranscodeEngine};
use crate::error::{MediaError, MediaResult};
use crate::filters::FilterSpec;
use crate::progress::{last_frame, FrameTick, ProgressTracker};

/// Fixed working-area name of the staged input.
pub const INPUT_NAME: &str = "input.mp4";
/// Fixed working-area name of the encoded output.
pub const OUTPUT_NAME: &str = "output.mp4";

/// A staged input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputHandle {
    name: String,
}

impl InputHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A produced output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHandle {
    name: String,
}

impl OutputHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owner of the engine capability.
pub struct EncoderSession {
    engine: Arc<dyn TranscodeEngine>,
    settings: EncoderSettings,
    loaded: OnceCell<()>,
    exclusive: Arc<Mutex<()>>,
}

impl EncoderSession {
    pub fn new(engine: Arc<dyn TranscodeEngine>, settings: EncoderSettings) -> Self {
        Self {
            engine,
            settings,
            loaded: OnceCell::new(),
            exclusive: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    /// Whether the engine has been initialized.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Initialize the engine once. A failed attempt leaves the session
    /// unloaded so the next job retries.
    pub async fn ensure_loaded(&self) -> MediaResult<()> {
        self.loaded
            .get_or_try_init(|| async {
                info!("Loading transcoding engine");
                self.engine.load().await.map_err(|e| match e {
                    MediaError::EngineInit(_) => e,
                    other => MediaError::engine_init(other.to_string()),
                })
            })
            .await
            .map(|_| ())
    }

    /// Start a job. Waits until any previous job has been dropped, then
    /// makes sure the engine is loaded.
    pub async fn begin_job(
        &self,
        filter: FilterSpec,
        target_duration_ms: u64,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<EncodeJob> {
        let permit = self.exclusive.clone().lock_owned().await;

        let mut job = EncodeJob {
            engine: self.engine.clone(),
            settings: self.settings.clone(),
            _permit: permit,
            filter,
            target_duration_ms,
            total_frames: None,
            current_frame: 0,
            state: JobState::Loading,
            cancel,
        };

        job.checkpoint()?;
        let loaded = self.ensure_loaded().await;
        job.settle(loaded)?;
        job.checkpoint()?;
        Ok(job)
    }
}

/// One normalization job on the engine. Holds the session's exclusivity
/// until dropped.
pub struct EncodeJob {
    engine: Arc<dyn TranscodeEngine>,
    settings: EncoderSettings,
    _permit: OwnedMutexGuard<()>,
    filter: FilterSpec,
    target_duration_ms: u64,
    total_frames: Option<u64>,
    current_frame: u64,
    state: JobState,
    cancel: watch::Receiver<bool>,
}

impl EncodeJob {
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Highest frame the encode reported.
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Natural checkpoint between engine calls.
    fn checkpoint(&mut self) -> MediaResult<()> {
        if self.is_cancelled() {
            debug!(state = %self.state, "Encode job cancelled at checkpoint");
            self.state = JobState::Failed;
            return Err(MediaError::Cancelled);
        }
        Ok(())
    }

    fn settle<T>(&mut self, result: MediaResult<T>) -> MediaResult<T> {
        if result.is_err() {
            self.state = JobState::Failed;
        }
        result
    }

    /// Write the source bytes under the fixed input name and verify they
    /// are present.
    pub async fn stage_input(&mut self, bytes: Bytes) -> MediaResult<InputHandle> {
        self.state = JobState::WritingInput;
        let result = self.stage_input_inner(bytes).await;
        self.settle(result)
    }

    async fn stage_input_inner(&mut self, bytes: Bytes) -> MediaResult<InputHandle> {
        self.checkpoint()?;

        // A cancelled predecessor may have left its output behind
        self.engine
            .delete_file(OUTPUT_NAME)
            .await
            .map_err(|e| MediaError::stage(format!("cannot clear stale output: {e}")))?;

        let len = bytes.len();
        self.engine
            .write_file(INPUT_NAME, bytes)
            .await
            .map_err(|e| MediaError::stage(e.to_string()))?;
        self.checkpoint()?;

        if !self.engine.file_exists(INPUT_NAME).await {
            return Err(MediaError::stage(format!(
                "{INPUT_NAME} missing after a successful write"
            )));
        }
        self.checkpoint()?;

        debug!(bytes = len, "Staged input");
        Ok(InputHandle {
            name: INPUT_NAME.to_string(),
        })
    }

    /// Run a discard-output pass and take the last `frame=` report as the
    /// total frame count.
    pub async fn count_frames(&mut self, input: &InputHandle) -> MediaResult<u64> {
        self.state = JobState::CountingFrames;
        let result = self.count_frames_inner(input).await;
        self.settle(result)
    }

    async fn count_frames_inner(&mut self, input: &InputHandle) -> MediaResult<u64> {
        self.checkpoint()?;

        // Count only what the encode will keep
        let args = FfmpegCommand::null_sink(input.name())
            .first_video_stream()
            .output_duration_ms(self.target_duration_ms)
            .build_args();

        // Listener scoped to the dry run only
        let (tx, mut rx) = mpsc::unbounded_channel();
        let status = self
            .engine
            .exec(args, tx, self.cancel.clone())
            .await
            .map_err(|e| match e {
                MediaError::Cancelled => MediaError::Cancelled,
                other => MediaError::frame_count(other.to_string()),
            })?;
        self.checkpoint()?;

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }

        if !status.is_success() {
            return Err(MediaError::frame_count(exec_failure(&status)));
        }

        let total = last_frame(lines.iter().map(String::as_str))
            .ok_or_else(|| MediaError::frame_count("no frame count in engine log"))?;
        if total == 0 {
            return Err(MediaError::frame_count("input has no video frames"));
        }

        info!(frames = total, "Counted input frames");
        self.total_frames = Some(total);
        Ok(total)
    }

    /// Run the letterbox encode, truncated to the target duration with audio
    /// copied. `on_progress` receives monotonic percentages.
    pub async fn transcode<F>(&mut self, input: &InputHandle, on_progress: F) -> MediaResult<OutputHandle>
    where
        F: Fn(ProgressEvent) + Send + 'static,
    {
        self.state = JobState::Transcoding;
        let result = self.transcode_inner(input, on_progress).await;
        self.settle(result)
    }

    async fn transcode_inner<F>(&mut self, input: &InputHandle, on_progress: F) -> MediaResult<OutputHandle>
    where
        F: Fn(ProgressEvent) + Send + 'static,
    {
        self.checkpoint()?;

        let total_frames = self
            .total_frames
            .ok_or_else(|| MediaError::frame_count("frames were not counted before encoding"))?;

        let args = FfmpegCommand::new(input.name(), OUTPUT_NAME)
            .video_filter(self.filter.to_filter())
            .output_duration_ms(self.target_duration_ms)
            .output_args(self.settings.to_ffmpeg_args())
            .output_args(["-movflags", "+faststart"])
            .build_args();

        // Listener scoped to this encode only
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let tracking = tokio::spawn(async move {
            let mut tracker = ProgressTracker::new(total_frames);
            while let Some(line) = rx.recv().await {
                if let Some(tick) = FrameTick::parse(&line) {
                    on_progress(tracker.observe(tick));
                }
            }
            (tracker, on_progress)
        });

        let outcome = self.engine.exec(args, tx, self.cancel.clone()).await;

        let (mut tracker, on_progress) = tracking
            .await
            .map_err(|e| MediaError::transcode(format!("progress tracking failed: {e}"), None, None))?;
        self.current_frame = tracker.current_frame();

        let status = outcome.map_err(|e| match e {
            MediaError::Cancelled => MediaError::Cancelled,
            MediaError::Timeout(secs) => {
                MediaError::transcode(format!("engine timed out after {secs} seconds"), None, None)
            }
            other => MediaError::transcode(other.to_string(), None, None),
        })?;
        self.checkpoint()?;

        if !status.is_success() {
            return Err(MediaError::transcode(
                exec_failure(&status),
                status.diagnostics.clone(),
                status.code,
            ));
        }

        if let Some(event) = tracker.finish() {
            on_progress(event);
        }

        info!(
            frames = self.current_frame,
            total_frames,
            duration_ms = self.target_duration_ms,
            "Encode finished"
        );
        Ok(OutputHandle {
            name: OUTPUT_NAME.to_string(),
        })
    }

    /// Retrieve the encoded bytes.
    pub async fn read_output(&mut self, output: &OutputHandle) -> MediaResult<Bytes> {
        self.state = JobState::ReadingOutput;
        let result = self.read_output_inner(output).await;
        let result = self.settle(result);
        if result.is_ok() {
            self.state = JobState::Complete;
        }
        result
    }

    async fn read_output_inner(&mut self, output: &OutputHandle) -> MediaResult<Bytes> {
        self.checkpoint()?;

        if !self.engine.file_exists(output.name()).await {
            return Err(MediaError::read(format!("{} was not produced", output.name())));
        }
        self.checkpoint()?;

        let bytes = self
            .engine
            .read_file(output.name())
            .await
            .map_err(|e| MediaError::read(e.to_string()))?;
        self.checkpoint()?;

        if bytes.is_empty() {
            return Err(MediaError::read(format!("{} is empty", output.name())));
        }
        Ok(bytes)
    }

    /// End the job and clear the working area, including any partial output
    /// of a failed encode. A cancelled job makes no further engine calls; its
    /// leftovers are replaced by the next job.
    pub async fn close(self) {
        if self.is_cancelled() {
            debug!("Closing cancelled encode job without cleanup");
            return;
        }

        for name in [INPUT_NAME, OUTPUT_NAME] {
            if let Err(e) = self.engine.delete_file(name).await {
                warn!(name, error = %e, "Failed to clear working-area file");
            }
        }
    }
}

fn exec_failure(status: &ExecStatus) -> String {
    let code = status
        .code
        .map(|c| format!("engine exited with status {c}"))
        .unwrap_or_else(|| "engine terminated by signal".to_string());
    match &status.diagnostics {
        Some(diag) => format!("{code}: {diag}"),
        None => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{EngineCall, ExecKind, ScriptedEngine};

    fn session(engine: Arc<ScriptedEngine>) -> EncoderSession {
        EncoderSession::new(engine, EncoderSettings::default())
    }

    fn live() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test]
    async fn test_engine_loads_once_across_jobs() {
        let engine = Arc::new(ScriptedEngine::new());
        let session = session(engine.clone());

        session.ensure_loaded().await.unwrap();
        let job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();
        job.close().await;
        let job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();
        job.close().await;

        assert_eq!(engine.load_count(), 1);
        assert!(session.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let engine = Arc::new(ScriptedEngine::new().failing_loads(1));
        let session = session(engine.clone());

        let err = session.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, MediaError::EngineInit(_)));
        assert!(!session.is_loaded());

        session.ensure_loaded().await.unwrap();
        assert_eq!(engine.load_count(), 2);
    }

    #[tokio::test]
    async fn test_full_job() {
        let engine = Arc::new(ScriptedEngine::new().with_frames(300));
        let session = session(engine.clone());
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"landscape")).await.unwrap();
        assert_eq!(job.count_frames(&input).await.unwrap(), 300);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let output = job
            .transcode(&input, move |event| sink.lock().unwrap().push(event.percent))
            .await
            .unwrap();
        let bytes = job.read_output(&output).await.unwrap();
        assert_eq!(job.state(), JobState::Complete);
        assert_eq!(job.current_frame(), 300);
        assert!(!bytes.is_empty());

        let percents = seen.lock().unwrap().clone();
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));

        let args = engine.last_transcode_args().unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("pad=720:1280:(ow-iw)/2:(oh-ih)/2:black"));
        assert!(joined.contains("-t 139.999"));
        assert!(joined.contains("-c:a copy"));

        job.close().await;
        assert!(!engine.has_file(INPUT_NAME));
        assert!(!engine.has_file(OUTPUT_NAME));
    }

    #[tokio::test]
    async fn test_unverified_write_is_stage_error() {
        let engine = Arc::new(ScriptedEngine::new().dropping_writes());
        let session = session(engine);
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let err = job.stage_input(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(matches!(err, MediaError::Stage(_)));
        assert_eq!(job.state(), JobState::Failed);
    }

    #[tokio::test]
    async fn test_missing_frame_report_is_frame_count_error() {
        let engine = Arc::new(ScriptedEngine::new().without_frame_log());
        let session = session(engine);
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"x")).await.unwrap();
        let err = job.count_frames(&input).await.unwrap_err();
        assert!(matches!(err, MediaError::FrameCount(_)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_transcode_error() {
        let engine = Arc::new(ScriptedEngine::new().failing_encode(1));
        let session = session(engine);
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"x")).await.unwrap();
        job.count_frames(&input).await.unwrap();
        let err = job.transcode(&input, |_| {}).await.unwrap_err();
        assert!(matches!(err, MediaError::Transcode { exit_code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_failed_encode_leaves_no_partial_output() {
        let engine = Arc::new(ScriptedEngine::new().failing_encode(1));
        let session = session(engine.clone());
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"x")).await.unwrap();
        job.count_frames(&input).await.unwrap();
        job.transcode(&input, |_| {}).await.unwrap_err();
        assert!(engine.has_file(OUTPUT_NAME));

        job.close().await;
        assert!(!engine.has_file(INPUT_NAME));
        assert!(!engine.has_file(OUTPUT_NAME));
    }

    #[tokio::test]
    async fn test_dry_run_is_truncated_like_the_encode() {
        let engine = Arc::new(ScriptedEngine::new());
        let session = session(engine.clone());
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"x")).await.unwrap();
        job.count_frames(&input).await.unwrap();

        let args = engine.last_count_args().unwrap();
        let limit = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[limit + 1], "139.999");
    }

    #[tokio::test]
    async fn test_missing_output_is_read_error() {
        let engine = Arc::new(ScriptedEngine::new().without_output());
        let session = session(engine);
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"x")).await.unwrap();
        job.count_frames(&input).await.unwrap();
        let output = job.transcode(&input, |_| {}).await.unwrap();
        let err = job.read_output(&output).await.unwrap_err();
        assert!(matches!(err, MediaError::Read(_)));
    }

    #[tokio::test]
    async fn test_dry_run_and_encode_logs_are_isolated() {
        let engine = Arc::new(ScriptedEngine::new().with_frames(100));
        let session = session(engine.clone());
        let mut job = session.begin_job(FilterSpec::default(), 139_999, live()).await.unwrap();

        let input = job.stage_input(Bytes::from_static(b"x")).await.unwrap();
        job.count_frames(&input).await.unwrap();

        // The dry run reported frame=100; the encode listener must start fresh
        let first = Arc::new(std::sync::Mutex::new(None));
        let sink = first.clone();
        job.transcode(&input, move |event| {
            sink.lock().unwrap().get_or_insert(event.percent);
        })
        .await
        .unwrap();
        assert_eq!(*first.lock().unwrap(), Some(25));

        let execs: Vec<_> = engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Exec(kind) => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(execs, vec![ExecKind::CountFrames, ExecKind::Transcode]);
    }

    #[tokio::test]
    async fn test_cancelled_before_write() {
        let engine = Arc::new(ScriptedEngine::new());
        let session = session(engine.clone());
        let (tx, rx) = watch::channel(false);
        let mut job = session.begin_job(FilterSpec::default(), 139_999, rx).await.unwrap();

        tx.send(true).unwrap();
        let err = job.stage_input(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::Write(_))));
    }
}
