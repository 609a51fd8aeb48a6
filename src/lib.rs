//! build-retry - resilient container image builds
//!
//! Builds a container image from an ordered list of build files. Each file is
//! retried a fixed number of times with a fixed pause between failures; when
//! all attempts on one file fail, the next file is tried. The base image is
//! pre-pulled first so registry hiccups surface before the build starts.
//!
//! # Example Usage
//!
//! ```no_run
//! use build_retry::engine::{self, EngineKind};
//! use build_retry::{BuildOrchestrator, BuildTarget, CandidateConfig, RetryPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handles = engine::connect(EngineKind::Cli, Path::new("."))?;
//! let outcome = BuildOrchestrator::new(handles.builder, RetryPolicy::default())
//!     .with_warmup(handles.cache, "python:3.11-slim")
//!     .run_build(
//!         &BuildTarget::new("my-service")?,
//!         &CandidateConfig::new(["Dockerfile", "Dockerfile.simple"])?,
//!     )
//!     .await;
//! println!("{}", outcome.label());
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`orchestrator`]: retry and fallback control flow
//! - [`engine`]: Docker API, Docker CLI and scripted mock engines
//! - [`progress`]: build events and their handlers
//! - [`cli`]: argument parsing, status output and the command handler

pub mod cli;
pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod progress;
pub mod util;

pub use config::{BuildRetryConfig, ConfigError};
pub use engine::{BuildEngine, EngineError, EngineKind, ImageCache};
pub use orchestrator::{
    BuildOrchestrator, BuildOutcome, BuildTarget, CandidateConfig, OrchestratorError,
    PreconditionFailure, RetryPolicy,
};
pub use progress::{BuildEvent, ProgressHandler};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
