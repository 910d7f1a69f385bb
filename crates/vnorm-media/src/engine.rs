//! Transcoding engine abstraction and its FFmpeg CLI implementation.
//!
//! An engine owns a private working area holding named files, and runs
//! FFmpeg-style argument lists against it. Every execution streams its log
//! lines into a sink that belongs to that execution only.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};

/// Per-execution log stream.
pub type LogSink = mpsc::UnboundedSender<String>;

/// Number of diagnostic stderr lines kept for error reports.
const DIAGNOSTIC_TAIL: usize = 8;

/// Result of one engine execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecStatus {
    /// Process exit code; `None` if terminated by a signal
    pub code: Option<i32>,
    /// Last non-progress log lines, if any
    pub diagnostics: Option<String>,
}

impl ExecStatus {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            diagnostics: None,
        }
    }

    pub fn failed(code: i32, diagnostics: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            diagnostics: Some(diagnostics.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The external transcoding capability.
///
/// Implementations are shared by a single [`crate::EncoderSession`]; nothing
/// else should call them.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Initialize the engine. Called at most once per session.
    async fn load(&self) -> MediaResult<()>;

    /// Write a file into the working area.
    async fn write_file(&self, name: &str, data: Bytes) -> MediaResult<()>;

    /// Whether a file is present in the working area.
    async fn file_exists(&self, name: &str) -> bool;

    /// Read a file from the working area.
    async fn read_file(&self, name: &str) -> MediaResult<Bytes>;

    /// Remove a file from the working area. Missing files are not an error.
    async fn delete_file(&self, name: &str) -> MediaResult<()>;

    /// Run one command. Log lines go to `logs`; when `cancel` flips to true
    /// the engine should stop as soon as it can and return `Cancelled`.
    async fn exec(
        &self,
        args: Vec<String>,
        logs: LogSink,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<ExecStatus>;
}

/// Engine that runs the `ffmpeg` binary inside a private temp directory.
#[derive(Debug)]
pub struct FfmpegEngine {
    binary: String,
    timeout: Option<Duration>,
    workspace: OnceLock<TempDir>,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            timeout: None,
            workspace: OnceLock::new(),
        }
    }

    /// Kill executions that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Working area directory, once loaded.
    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.get().map(TempDir::path)
    }

    fn resolve(&self, name: &str) -> MediaResult<PathBuf> {
        let dir = self
            .workspace()
            .ok_or_else(|| MediaError::engine_init("engine is not loaded"))?;

        // Only plain file names live in the working area
        let candidate = Path::new(name);
        if name.is_empty() || candidate.components().count() != 1 || candidate.is_absolute() {
            return Err(MediaError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid working-area name: {name}"),
            )));
        }
        Ok(dir.join(name))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn load(&self) -> MediaResult<()> {
        if self.workspace.get().is_some() {
            return Ok(());
        }

        let path = which::which(&self.binary)
            .map_err(|_| MediaError::engine_init(format!("{} not found in PATH", self.binary)))?;

        let dir = tempfile::Builder::new()
            .prefix("vnorm-engine-")
            .tempdir()
            .map_err(|e| MediaError::engine_init(format!("cannot create working area: {e}")))?;

        info!(
            binary = %path.display(),
            workspace = %dir.path().display(),
            "FFmpeg engine loaded"
        );
        // A concurrent loser's directory is dropped and removed
        let _ = self.workspace.set(dir);
        Ok(())
    }

    async fn write_file(&self, name: &str, data: Bytes) -> MediaResult<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, &data).await?;
        debug!(name, bytes = data.len(), "Wrote working-area file");
        Ok(())
    }

    async fn file_exists(&self, name: &str) -> bool {
        match self.resolve(name) {
            Ok(path) => tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn read_file(&self, name: &str) -> MediaResult<Bytes> {
        let path = self.resolve(name)?;
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete_file(&self, name: &str) -> MediaResult<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exec(
        &self,
        args: Vec<String>,
        logs: LogSink,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<ExecStatus> {
        let dir = self
            .workspace()
            .ok_or_else(|| MediaError::engine_init("engine is not loaded"))?;

        debug!("Running FFmpeg: {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::transcode("stderr not captured", None, None))?;

        // Forward log lines; keep the tail of non-progress output for diagnostics
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: Vec<String> = Vec::new();

            while let Ok(Some(line)) = lines.next_line().await {
                for piece in line.split('\r').map(str::trim).filter(|p| !p.is_empty()) {
                    if !piece.contains('=') {
                        if tail.len() == DIAGNOSTIC_TAIL {
                            tail.remove(0);
                        }
                        tail.push(piece.to_string());
                    }
                    let _ = logs.send(piece.to_string());
                }
            }
            tail
        });

        let outcome = tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancelled(cancel) => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = deadline(self.timeout) => {
                let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        };

        // Wait for the log forwarder so the sink is closed when we return
        let tail = reader.await.unwrap_or_default();
        let status = outcome?;

        Ok(ExecStatus {
            code: status.code(),
            diagnostics: (!tail.is_empty()).then(|| tail.join("\n")),
        })
    }
}

/// Resolves once the cancel flag is set; never if the sender is dropped first.
pub(crate) async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_status() {
        assert!(ExecStatus::success().is_success());
        let failed = ExecStatus::failed(1, "Invalid data found when processing input");
        assert!(!failed.is_success());
        assert!(failed.diagnostics.unwrap().contains("Invalid data"));
    }

    #[test]
    fn test_names_require_loaded_engine() {
        let engine = FfmpegEngine::new();
        assert!(matches!(engine.resolve("input.mp4"), Err(MediaError::EngineInit(_))));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_flag() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(cancelled(rx));
        tx.send(true).unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_working_area_round_trip() {
        let engine = FfmpegEngine::new();
        engine.load().await.unwrap();

        engine.write_file("input.mp4", Bytes::from_static(b"data")).await.unwrap();
        assert!(engine.file_exists("input.mp4").await);
        assert_eq!(engine.read_file("input.mp4").await.unwrap(), Bytes::from_static(b"data"));
        assert!(engine.write_file("../escape.mp4", Bytes::new()).await.is_err());

        engine.delete_file("input.mp4").await.unwrap();
        engine.delete_file("input.mp4").await.unwrap();
        assert!(!engine.file_exists("input.mp4").await);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_exec_streams_progress() {
        let engine = FfmpegEngine::new();
        engine.load().await.unwrap();

        let args = crate::command::FfmpegCommand::new("color=c=black:s=64x64:d=1", "output.mp4")
            .input_arg("-f")
            .input_arg("lavfi")
            .build_args();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let status = engine.exec(args, tx, cancel_rx).await.unwrap();
        assert!(status.is_success());

        let mut saw_frame = false;
        while let Ok(line) = rx.try_recv() {
            saw_frame |= line.starts_with("frame=");
        }
        assert!(saw_frame);
        assert!(engine.file_exists("output.mp4").await);
    }
}
