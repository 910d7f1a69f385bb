//! Frame-log parsing and encode progress tracking.
//!
//! FFmpeg log lines are turned into [`FrameTick`]s once, at the engine
//! boundary. Everything downstream works with ticks.

use std::sync::OnceLock;

use regex::Regex;
use tokio::sync::watch;

use vnorm_models::ProgressEvent;

static FRAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn frame_pattern() -> &'static Regex {
    FRAME_PATTERN.get_or_init(|| Regex::new(r"frame=\s*(\d+)").expect("frame pattern is valid"))
}

/// A "current frame" report from the engine log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTick {
    pub frame: u64,
}

impl FrameTick {
    /// Parse a log line. Returns `None` for lines without a frame report.
    pub fn parse(line: &str) -> Option<Self> {
        frame_pattern()
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .map(|frame| FrameTick { frame })
    }
}

/// Last frame report in a log, used as the total by the dry run.
pub fn last_frame<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<u64> {
    lines
        .into_iter()
        .filter_map(FrameTick::parse)
        .last()
        .map(|tick| tick.frame)
}

/// `round(100 * frame / total)`, clamped to 0..=100.
pub fn percent_of(frame: u64, total_frames: u64) -> u8 {
    if total_frames == 0 {
        return 0;
    }
    let frame = u128::from(frame);
    let total = u128::from(total_frames);
    let rounded = (200 * frame + total) / (2 * total);
    rounded.min(100) as u8
}

/// Converts frame ticks into monotonic percentages for one encode.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_frames: u64,
    last_percent: Option<u8>,
    last_frame: u64,
}

impl ProgressTracker {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            last_percent: None,
            last_frame: 0,
        }
    }

    /// Record a tick and return the event to publish.
    ///
    /// The emitted percent never drops below the previous one; an
    /// out-of-order frame repeats the previous value.
    pub fn observe(&mut self, tick: FrameTick) -> ProgressEvent {
        self.last_frame = self.last_frame.max(tick.frame);
        let computed = percent_of(tick.frame, self.total_frames);
        let percent = self.last_percent.map_or(computed, |last| last.max(computed));
        self.last_percent = Some(percent);
        ProgressEvent::new(percent)
    }

    /// Close the encode. Emits 100 unless it was already reached.
    pub fn finish(&mut self) -> Option<ProgressEvent> {
        if self.last_percent == Some(100) {
            return None;
        }
        self.last_percent = Some(100);
        Some(ProgressEvent::new(100))
    }

    /// Highest frame seen so far.
    pub fn current_frame(&self) -> u64 {
        self.last_frame
    }
}

/// Publishing half of a latest-value-wins progress channel.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: watch::Sender<ProgressEvent>,
}

impl ProgressSender {
    /// Publish an event. Never blocks; with no receiver the value is dropped.
    pub fn send(&self, event: ProgressEvent) {
        self.tx.send_replace(event);
    }

    /// Reset to zero for a new job.
    pub fn reset(&self) {
        self.tx.send_replace(ProgressEvent::default());
    }

    /// New receiver observing this channel.
    pub fn subscribe(&self) -> ProgressReceiver {
        ProgressReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Consuming half of a progress channel.
#[derive(Debug, Clone)]
pub struct ProgressReceiver {
    rx: watch::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Wait for the next update. Returns `None` once the sender is gone.
    pub async fn changed(&mut self) -> Option<ProgressEvent> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Latest published value.
    pub fn latest(&self) -> ProgressEvent {
        *self.rx.borrow()
    }
}

/// Create a progress channel pair.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = watch::channel(ProgressEvent::default());
    (ProgressSender { tx }, ProgressReceiver { rx })
}
