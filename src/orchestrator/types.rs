//! Data model for a build run: target, candidate build files, retry policy
//! and the terminal outcome.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::OrchestratorError;

/// Image tag used when no target is given on the command line
pub const DEFAULT_TARGET: &str = "default-rate-backend";

/// Default number of attempts per candidate build file
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between failed attempts on the same candidate
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Name of the artifact (image tag) to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget(String);

impl BuildTarget {
    pub fn new(name: impl Into<String>) -> Result<Self, OrchestratorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OrchestratorError::InvalidTarget(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BuildTarget {
    fn default() -> Self {
        Self(DEFAULT_TARGET.to_string())
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered build files to try. The first entry is the primary, the rest are
/// fallbacks. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateConfig {
    files: Vec<PathBuf>,
}

impl CandidateConfig {
    pub fn new<I, P>(files: I) -> Result<Self, OrchestratorError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let files: Vec<PathBuf> = files.into_iter().map(Into::into).collect();
        if files.is_empty() {
            return Err(OrchestratorError::EmptyCandidates);
        }
        Ok(Self { files })
    }

    /// Resolves relative entries against `base` (the build context).
    pub fn resolved_against(self, base: &Path) -> Self {
        let files = self
            .files
            .into_iter()
            .map(|f| if f.is_relative() { base.join(f) } else { f })
            .collect();
        Self { files }
    }

    pub fn primary(&self) -> &Path {
        &self.files[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Attempts per candidate and the fixed pause between them (no backoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, OrchestratorError> {
        if max_attempts == 0 {
            return Err(OrchestratorError::InvalidPolicy(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Why a run stopped before its first build attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// The build engine could not be reached
    EngineUnavailable(String),
    /// The primary build file does not exist
    PrimaryConfigMissing(PathBuf),
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionFailure::EngineUnavailable(reason) => {
                write!(f, "build engine unavailable: {}", reason)
            }
            PreconditionFailure::PrimaryConfigMissing(path) => {
                write!(f, "primary build file not found: {}", path.display())
            }
        }
    }
}

/// Terminal result of a build run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The artifact was produced by `candidate` on `attempt`
    Success { candidate: PathBuf, attempt: u32 },
    /// Every attempt on every candidate failed
    Failure { hints: Vec<String> },
    /// The run stopped before any build attempt
    PreconditionFailed(PreconditionFailure),
    /// Cancellation was requested between attempts
    Cancelled,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success { .. })
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildOutcome::Success { .. } => 0,
            BuildOutcome::Failure { .. } | BuildOutcome::PreconditionFailed(_) => 1,
            BuildOutcome::Cancelled => 130,
        }
    }

    /// Short machine-friendly name, used by the structured status formats
    pub fn label(&self) -> &'static str {
        match self {
            BuildOutcome::Success { .. } => "success",
            BuildOutcome::Failure { .. } => "failure",
            BuildOutcome::PreconditionFailed(_) => "precondition_failed",
            BuildOutcome::Cancelled => "cancelled",
        }
    }
}
