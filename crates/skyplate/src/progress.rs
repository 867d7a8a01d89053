use std::sync::Mutex;

use log::{info, warn};

use crate::client::poller::PollState;

/// Events emitted while an image moves through solving and result retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    State(PollState),
    ArtifactFetched {
        artifact: &'static str,
        available: bool,
    },
    OverlayCompiled {
        edges: usize,
        unresolved: usize,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and library callers that do not care.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to the log, prefixed with the image they belong to.
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::State(state) => info!("[{}] {}", self.label, state),
            ProgressEvent::ArtifactFetched {
                artifact,
                available,
            } => {
                if available {
                    info!("[{}] fetched {}", self.label, artifact);
                } else {
                    warn!("[{}] {} unavailable", self.label, artifact);
                }
            }
            ProgressEvent::OverlayCompiled { edges, unresolved } => info!(
                "[{}] overlay compiled: {} constellation line(s), {} unresolved star(s)",
                self.label, edges, unresolved
            ),
            ProgressEvent::Failed { error } => warn!("[{}] failed: {}", self.label, error),
        }
    }
}

/// Keeps every event in order. Used by tests to assert on transitions.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Only the poll-state transitions, in order.
    pub fn states(&self) -> Vec<PollState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
