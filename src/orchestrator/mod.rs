//! Build orchestration: retry each candidate build file, then fall back
//!
//! A run checks the engine once, pre-pulls the base image on a best-effort
//! basis, then walks the candidate build files in order. Each candidate gets
//! up to `max_attempts` builds with a fixed pause between failures. The first
//! success ends the run. Missing fallback files are skipped without using
//! an attempt.
//!
//! # Example
//!
//! ```no_run
//! use build_retry::engine::{self, EngineKind};
//! use build_retry::orchestrator::{BuildOrchestrator, BuildTarget, CandidateConfig, RetryPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handles = engine::connect(EngineKind::Api, Path::new("."))?;
//! let orchestrator = BuildOrchestrator::new(handles.builder, RetryPolicy::default())
//!     .with_warmup(handles.cache, "python:3.11-slim");
//!
//! let target = BuildTarget::new("my-service")?;
//! let candidates = CandidateConfig::new(["Dockerfile", "Dockerfile.simple"])?;
//! let outcome = orchestrator.run_build(&target, &candidates).await;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

mod error;
mod types;

pub use error::OrchestratorError;
pub use types::{
    BuildOutcome, BuildTarget, CandidateConfig, PreconditionFailure, RetryPolicy,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TARGET,
};

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::engine::{BuildEngine, EngineError, ImageCache};
use crate::progress::{BuildEvent, ProgressHandler};

/// Result of working through one candidate build file
enum CandidateResult {
    Built { attempt: u32 },
    Exhausted { last_error: String },
    Cancelled,
}

pub struct BuildOrchestrator {
    engine: Arc<dyn BuildEngine>,
    warmup: Option<(Arc<dyn ImageCache>, String)>,
    policy: RetryPolicy,
    handlers: Vec<Arc<dyn ProgressHandler>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl BuildOrchestrator {
    pub fn new(engine: Arc<dyn BuildEngine>, policy: RetryPolicy) -> Self {
        Self {
            engine,
            warmup: None,
            policy,
            handlers: Vec::new(),
            cancel: None,
        }
    }

    /// Pre-pull `base_image` through `cache` before the first attempt.
    pub fn with_warmup(mut self, cache: Arc<dyn ImageCache>, base_image: impl Into<String>) -> Self {
        self.warmup = Some((cache, base_image.into()));
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Stop the run once `cancel` turns true. Checked before each attempt and
    /// during the pause between attempts, never in the middle of a build.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn run_build(&self, target: &BuildTarget, candidates: &CandidateConfig) -> BuildOutcome {
        let started = Instant::now();
        self.emit(BuildEvent::Started {
            target: target.to_string(),
            candidates: candidates.len(),
        });

        let outcome = self.drive(target, candidates).await;

        self.emit(BuildEvent::Finished {
            target: target.to_string(),
            outcome: outcome.clone(),
            total_time: started.elapsed(),
        });
        outcome
    }

    async fn drive(&self, target: &BuildTarget, candidates: &CandidateConfig) -> BuildOutcome {
        if let Err(e) = self.engine.check_available().await {
            let reason = match e {
                EngineError::Unavailable(reason) => reason,
                other => other.to_string(),
            };
            self.emit(BuildEvent::EngineUnavailable {
                engine: self.engine.name().to_string(),
                reason: reason.clone(),
            });
            return BuildOutcome::PreconditionFailed(PreconditionFailure::EngineUnavailable(
                reason,
            ));
        }
        self.emit(BuildEvent::EngineReady {
            engine: self.engine.name().to_string(),
        });

        let primary = candidates.primary();
        if !primary.exists() {
            return BuildOutcome::PreconditionFailed(PreconditionFailure::PrimaryConfigMissing(
                primary.to_path_buf(),
            ));
        }

        self.warm_up().await;

        let mut last_error = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 && !candidate.exists() {
                self.emit(BuildEvent::CandidateSkipped {
                    candidate: candidate.to_path_buf(),
                });
                continue;
            }

            match self.try_candidate(target, candidate).await {
                CandidateResult::Built { attempt } => {
                    return BuildOutcome::Success {
                        candidate: candidate.to_path_buf(),
                        attempt,
                    };
                }
                CandidateResult::Exhausted { last_error: error } => {
                    self.emit(BuildEvent::CandidateExhausted {
                        candidate: candidate.to_path_buf(),
                        attempts: self.policy.max_attempts(),
                    });
                    last_error = Some(error);
                }
                CandidateResult::Cancelled => return BuildOutcome::Cancelled,
            }
        }

        BuildOutcome::Failure {
            hints: exhaustion_hints(candidates, last_error.as_deref()),
        }
    }

    // Never fails the run
    async fn warm_up(&self) {
        let Some((cache, image)) = &self.warmup else {
            return;
        };

        self.emit(BuildEvent::WarmupStarted {
            image: image.clone(),
        });
        let started = Instant::now();
        match cache.prefetch_base(image).await {
            Ok(()) => self.emit(BuildEvent::WarmupComplete {
                image: image.clone(),
                elapsed: started.elapsed(),
            }),
            Err(e) => self.emit(BuildEvent::WarmupFailed {
                image: image.clone(),
                error: e.to_string(),
            }),
        }
    }

    async fn try_candidate(&self, target: &BuildTarget, candidate: &Path) -> CandidateResult {
        let max_attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if self.is_cancelled() {
                return CandidateResult::Cancelled;
            }

            self.emit(BuildEvent::AttemptStarted {
                candidate: candidate.to_path_buf(),
                attempt,
                max_attempts,
            });
            let started = Instant::now();

            match self.engine.build(candidate, target).await {
                Ok(()) => {
                    self.emit(BuildEvent::AttemptSucceeded {
                        candidate: candidate.to_path_buf(),
                        attempt,
                        elapsed: started.elapsed(),
                    });
                    return CandidateResult::Built { attempt };
                }
                Err(e) => {
                    last_error = e.to_string();
                    self.emit(BuildEvent::AttemptFailed {
                        candidate: candidate.to_path_buf(),
                        attempt,
                        max_attempts,
                        error: last_error.clone(),
                    });
                }
            }

            if attempt < max_attempts {
                self.emit(BuildEvent::RetryScheduled {
                    candidate: candidate.to_path_buf(),
                    next_attempt: attempt + 1,
                    delay: self.policy.delay(),
                });
                if !self.pause(self.policy.delay()).await {
                    return CandidateResult::Cancelled;
                }
            }
        }

        CandidateResult::Exhausted { last_error }
    }

    /// Sleeps for `delay`. Returns false if cancellation arrived first.
    async fn pause(&self, delay: Duration) -> bool {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(delay).await;
            return true;
        };

        let mut cancel = cancel.clone();
        if *cancel.borrow() {
            return false;
        }

        let deadline = tokio::time::Instant::now() + delay;
        let cancelled = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return true,
            result = cancel.wait_for(|cancelled| *cancelled) => result.is_ok(),
        };
        if cancelled {
            info!("Cancellation requested, abandoning remaining attempts");
            return false;
        }

        // Sender dropped: nobody can cancel any more
        tokio::time::sleep_until(deadline).await;
        true
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| *c.borrow()).unwrap_or(false)
    }

    fn emit(&self, event: BuildEvent) {
        for handler in &self.handlers {
            handler.on_progress(&event);
        }
    }
}

/// Troubleshooting suggestions shown when every candidate has failed
fn exhaustion_hints(candidates: &CandidateConfig, last_error: Option<&str>) -> Vec<String> {
    let mut hints = Vec::new();
    if let Some(error) = last_error {
        hints.push(format!("Last error: {}", error));
    }

    let files: Vec<String> = candidates
        .iter()
        .map(|c| c.display().to_string())
        .collect();
    hints.push(format!("Check the syntax of the build files: {}", files.join(", ")));
    hints.push("Check network connectivity to the image registry".to_string());
    hints.push("Check free disk space, or reclaim it with: docker system prune".to_string());
    hints.push("Re-run with --verbose to see the build output".to_string());
    debug!(hints = hints.len(), "Prepared troubleshooting hints");
    hints
}
