//! Scripted in-memory engine and probe for tests.
//!
//! The engine keeps its working area in a map, answers the dry run with a
//! configurable frame count, and writes a fixed output on encode. Every call
//! is recorded so tests can assert on the exact sequence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{watch, Notify};

use vnorm_models::{Geometry, VideoSource};

use crate::engine::{cancelled, ExecStatus, LogSink, TranscodeEngine};
use crate::error::{MediaError, MediaResult};
use crate::probe::MetadataProbe;
use crate::session::OUTPUT_NAME;

/// Which pass an execution was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecKind {
    CountFrames,
    Transcode,
}

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load,
    Write(String),
    Exists(String),
    Read(String),
    Delete(String),
    Exec(ExecKind),
}

#[derive(Default)]
struct Inner {
    files: HashMap<String, Bytes>,
    calls: Vec<EngineCall>,
    last_transcode_args: Option<Vec<String>>,
    last_count_args: Option<Vec<String>>,
}

/// In-memory [`TranscodeEngine`] driven by a script.
pub struct ScriptedEngine {
    inner: Mutex<Inner>,
    loads: AtomicUsize,
    failing_loads: usize,
    frames: u64,
    frame_log: bool,
    drop_writes: bool,
    encode_exit_code: i32,
    produce_output: bool,
    output: Bytes,
    hold_encode: bool,
    encode_started: Notify,
    encode_release: Notify,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            loads: AtomicUsize::new(0),
            failing_loads: 0,
            frames: 120,
            frame_log: true,
            drop_writes: false,
            encode_exit_code: 0,
            produce_output: true,
            output: Bytes::from_static(b"normalized-mp4"),
            hold_encode: false,
            encode_started: Notify::new(),
            encode_release: Notify::new(),
        }
    }

    /// Frame count reported by the dry run.
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    /// Bytes written as the encode output.
    pub fn with_output(mut self, output: impl Into<Bytes>) -> Self {
        self.output = output.into();
        self
    }

    /// Fail the first `n` loads.
    pub fn failing_loads(mut self, n: usize) -> Self {
        self.failing_loads = n;
        self
    }

    /// Report writes as successful without storing anything.
    pub fn dropping_writes(mut self) -> Self {
        self.drop_writes = true;
        self
    }

    /// Dry run logs no `frame=` lines.
    pub fn without_frame_log(mut self) -> Self {
        self.frame_log = false;
        self
    }

    /// Encode writes half its output, then exits with `code`.
    pub fn failing_encode(mut self, code: i32) -> Self {
        self.encode_exit_code = code;
        self
    }

    /// Encode succeeds but writes nothing.
    pub fn without_output(mut self) -> Self {
        self.produce_output = false;
        self
    }

    /// Encode pauses halfway until [`Self::release_encode`] or cancellation.
    pub fn holding_encode(mut self) -> Self {
        self.hold_encode = true;
        self
    }

    /// Wait until an encode has reached its halfway pause.
    pub async fn encode_started(&self) {
        self.encode_started.notified().await;
    }

    /// Let a paused encode finish.
    pub fn release_encode(&self) {
        self.encode_release.notify_one();
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.state().files.contains_key(name)
    }

    pub fn last_transcode_args(&self) -> Option<Vec<String>> {
        self.state().last_transcode_args.clone()
    }

    pub fn last_count_args(&self) -> Option<Vec<String>> {
        self.state().last_count_args.clone()
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: EngineCall) {
        self.state().calls.push(call);
    }

    fn emit(logs: &LogSink, frames: impl IntoIterator<Item = u64>) {
        for frame in frames {
            let _ = logs.send(format!("frame={frame}"));
            let _ = logs.send("progress=continue".to_string());
        }
    }
}

#[async_trait]
impl TranscodeEngine for ScriptedEngine {
    async fn load(&self) -> MediaResult<()> {
        self.record(EngineCall::Load);
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failing_loads {
            return Err(MediaError::engine_init("scripted load failure"));
        }
        Ok(())
    }

    async fn write_file(&self, name: &str, data: Bytes) -> MediaResult<()> {
        self.record(EngineCall::Write(name.to_string()));
        if !self.drop_writes {
            self.state().files.insert(name.to_string(), data);
        }
        Ok(())
    }

    async fn file_exists(&self, name: &str) -> bool {
        self.record(EngineCall::Exists(name.to_string()));
        self.has_file(name)
    }

    async fn read_file(&self, name: &str) -> MediaResult<Bytes> {
        self.record(EngineCall::Read(name.to_string()));
        self.state()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| MediaError::read(format!("{name} not found")))
    }

    async fn delete_file(&self, name: &str) -> MediaResult<()> {
        self.record(EngineCall::Delete(name.to_string()));
        self.state().files.remove(name);
        Ok(())
    }

    async fn exec(
        &self,
        args: Vec<String>,
        logs: LogSink,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<ExecStatus> {
        let kind = if args.iter().any(|a| a == "null") {
            ExecKind::CountFrames
        } else {
            ExecKind::Transcode
        };
        self.record(EngineCall::Exec(kind));

        let n = self.frames;
        match kind {
            ExecKind::CountFrames => {
                self.state().last_count_args = Some(args);
                if self.frame_log {
                    Self::emit(&logs, [n / 2, n]);
                }
                let _ = logs.send("progress=end".to_string());
                Ok(ExecStatus::success())
            }
            ExecKind::Transcode => {
                self.state().last_transcode_args = Some(args);

                Self::emit(&logs, [n / 4, n / 2]);
                if self.hold_encode {
                    self.encode_started.notify_one();
                    tokio::select! {
                        _ = self.encode_release.notified() => {}
                        _ = cancelled(cancel) => return Err(MediaError::Cancelled),
                    }
                }

                if self.encode_exit_code != 0 {
                    // A failed encode still leaves a truncated file behind
                    let partial = self.output.slice(..self.output.len() / 2);
                    self.state().files.insert(OUTPUT_NAME.to_string(), partial);
                    let _ = logs.send("Conversion failed!".to_string());
                    return Ok(ExecStatus::failed(self.encode_exit_code, "Conversion failed!"));
                }

                Self::emit(&logs, [3 * n / 4, n]);
                let _ = logs.send("progress=end".to_string());
                if self.produce_output {
                    self.state()
                        .files
                        .insert(OUTPUT_NAME.to_string(), self.output.clone());
                }
                Ok(ExecStatus::success())
            }
        }
    }
}

/// In-memory [`MetadataProbe`] returning scripted geometry per file name.
#[derive(Default)]
pub struct ScriptedProbe {
    by_name: HashMap<String, Geometry>,
    fallback: Option<Geometry>,
    probes: AtomicUsize,
}

impl ScriptedProbe {
    /// Every source probes as `geometry`.
    pub fn returning(geometry: Geometry) -> Self {
        Self {
            fallback: Some(geometry),
            ..Self::default()
        }
    }

    /// Every source is unreadable.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Override the geometry for one display name.
    pub fn with_file(mut self, name: impl Into<String>, geometry: Geometry) -> Self {
        self.by_name.insert(name.into(), geometry);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProbe for ScriptedProbe {
    async fn probe(&self, source: &VideoSource) -> MediaResult<Geometry> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.by_name
            .get(source.name())
            .copied()
            .or(self.fallback)
            .ok_or_else(|| MediaError::probe(format!("{} is not a readable video", source.name())))
    }
}
