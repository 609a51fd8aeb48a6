//! Logging-based progress handler

use super::{BuildEvent, ProgressHandler};
use crate::orchestrator::BuildOutcome;
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &BuildEvent) {
        match event {
            BuildEvent::Started { target, candidates } => {
                info!(image = %target, candidates, "Starting build");
            }
            BuildEvent::EngineReady { engine } => {
                debug!(engine = %engine, "Build engine available");
            }
            BuildEvent::EngineUnavailable { engine, reason } => {
                error!(engine = %engine, reason = %reason, "Build engine unavailable");
            }
            BuildEvent::WarmupStarted { image } => {
                debug!(image = %image, "Pre-pulling base image");
            }
            BuildEvent::WarmupComplete { image, elapsed } => {
                debug!(
                    image = %image,
                    elapsed_ms = elapsed.as_millis(),
                    "Base image ready"
                );
            }
            BuildEvent::WarmupFailed { image, error } => {
                warn!(image = %image, error = %error, "Base image pre-pull failed, continuing");
            }
            BuildEvent::CandidateSkipped { candidate } => {
                info!(candidate = %candidate.display(), "Build file not found, skipping");
            }
            BuildEvent::AttemptStarted {
                candidate,
                attempt,
                max_attempts,
            } => {
                debug!(
                    candidate = %candidate.display(),
                    attempt,
                    max_attempts,
                    "Build attempt started"
                );
            }
            BuildEvent::AttemptSucceeded {
                candidate,
                attempt,
                elapsed,
            } => {
                info!(
                    candidate = %candidate.display(),
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    "Build attempt succeeded"
                );
            }
            BuildEvent::AttemptFailed {
                candidate,
                attempt,
                max_attempts,
                error,
            } => {
                warn!(
                    candidate = %candidate.display(),
                    attempt,
                    max_attempts,
                    error = %error,
                    "Build attempt failed"
                );
            }
            BuildEvent::RetryScheduled {
                next_attempt,
                delay,
                ..
            } => {
                debug!(next_attempt, delay_secs = delay.as_secs(), "Retrying after delay");
            }
            BuildEvent::CandidateExhausted {
                candidate,
                attempts,
            } => {
                warn!(
                    candidate = %candidate.display(),
                    attempts,
                    "All attempts failed for build file"
                );
            }
            BuildEvent::Finished {
                target,
                outcome,
                total_time,
            } => {
                let total_ms = total_time.as_millis();
                match outcome {
                    BuildOutcome::Success { candidate, attempt } => info!(
                        image = %target,
                        candidate = %candidate.display(),
                        attempt,
                        total_ms,
                        "Build succeeded"
                    ),
                    BuildOutcome::Failure { .. } => {
                        error!(image = %target, total_ms, "All build attempts exhausted")
                    }
                    BuildOutcome::PreconditionFailed(reason) => {
                        error!(image = %target, reason = %reason, "Build not attempted")
                    }
                    BuildOutcome::Cancelled => warn!(image = %target, total_ms, "Build cancelled"),
                }
            }
        }
    }
}
