//! Progress notices emitted while fetching and extracting.
//!
//! A [`ProgressSink`] is an observer owned by the front-end. Notices are
//! informational; the pipeline never depends on them being displayed.
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The fetcher is waiting for an anti-automation challenge.
    ChallengeWait,
    /// The backend reported a challenge status.
    ChallengeStatus(String),
    /// A segment finished; `index` is 1-based.
    SegmentParsed { index: usize, total: usize },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChallengeWait => f.write_str("waiting for challenge to resolve"),
            Self::ChallengeStatus(status) => write!(f, "challenge status: {status}"),
            Self::SegmentParsed { index, total } => {
                write!(f, "parsed segment {index} of {total}")
            }
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Forwards notices to `tracing` at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: ProgressEvent) {
        tracing::info!(target: "gleaner.progress", "{event}");
    }
}

/// Keeps every notice in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
