use thiserror::Error;

/// Errors raised while assembling a build run, before anything executes
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("At least one candidate build file is required")]
    EmptyCandidates,

    #[error("Invalid build target: '{0}'")]
    InvalidTarget(String),

    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),
}
