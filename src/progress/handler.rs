//! Progress handler trait and events

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::orchestrator::BuildOutcome;

/// Events emitted while a build run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// Run started
    Started { target: String, candidates: usize },

    /// Engine answered the availability check
    EngineReady { engine: String },

    /// Engine availability check failed
    EngineUnavailable { engine: String, reason: String },

    /// Base image pre-pull started
    WarmupStarted { image: String },

    /// Base image pre-pull finished
    WarmupComplete { image: String, elapsed: Duration },

    /// Base image pre-pull failed; the run continues
    WarmupFailed { image: String, error: String },

    /// Fallback build file does not exist
    CandidateSkipped { candidate: PathBuf },

    /// Build attempt started
    AttemptStarted {
        candidate: PathBuf,
        attempt: u32,
        max_attempts: u32,
    },

    /// Build attempt produced the artifact
    AttemptSucceeded {
        candidate: PathBuf,
        attempt: u32,
        elapsed: Duration,
    },

    /// Build attempt failed
    AttemptFailed {
        candidate: PathBuf,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// Waiting before the next attempt on the same candidate
    RetryScheduled {
        candidate: PathBuf,
        next_attempt: u32,
        delay: Duration,
    },

    /// Every attempt on this candidate failed
    CandidateExhausted { candidate: PathBuf, attempts: u32 },

    /// Run finished
    Finished {
        target: String,
        outcome: BuildOutcome,
        total_time: Duration,
    },
}

/// Trait for handling progress events during a build run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &BuildEvent);
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<BuildEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of inter-attempt delays that were scheduled
    pub fn delays(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BuildEvent::RetryScheduled { .. }))
            .count()
    }

    pub fn attempts(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BuildEvent::AttemptStarted { .. }))
            .count()
    }
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &BuildEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
