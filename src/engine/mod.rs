//! Build engine collaborators
//!
//! The orchestrator talks to two capabilities: a [`BuildEngine`] that checks
//! availability and runs one build, and an [`ImageCache`] that pre-pulls a
//! base image on a best-effort basis. Two real implementations exist:
//!
//! - [`DockerApiEngine`]: Docker Engine API over the local socket (bollard)
//! - [`DockerCliEngine`]: spawns the `docker` binary per operation
//!
//! [`MockEngine`] is a scripted stand-in for tests.

pub mod archive;
pub mod cli;
pub mod docker;
pub mod error;
pub mod mock;

pub use cli::DockerCliEngine;
pub use docker::DockerApiEngine;
pub use error::EngineError;
pub use mock::{BuildCall, MockBuild, MockEngine};

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::orchestrator::BuildTarget;

/// Log target for raw build output. It is emitted at DEBUG so `--verbose`
/// shows it.
pub const BUILD_OUTPUT_TARGET: &str = "build_retry::build_output";

pub(crate) fn log_build_output(output: &str) {
    for line in output.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
        debug!(target: BUILD_OUTPUT_TARGET, "{}", line);
    }
}

#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Verifies the engine is reachable. Not retried by callers.
    async fn check_available(&self) -> Result<(), EngineError>;

    /// Runs one build of `target` from `config_file`. Must not return until
    /// every resource of the attempt has been released.
    async fn build(&self, config_file: &Path, target: &BuildTarget) -> Result<(), EngineError>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait ImageCache: Send + Sync {
    async fn prefetch_base(&self, image_ref: &str) -> Result<(), EngineError>;
}

/// Which engine implementation to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    #[default]
    Api,
    Cli,
}

impl EngineKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "api" => Some(EngineKind::Api),
            "cli" => Some(EngineKind::Cli),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Api => "api",
            EngineKind::Cli => "cli",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The same engine seen through both collaborator interfaces
pub struct EngineHandles {
    pub builder: Arc<dyn BuildEngine>,
    pub cache: Arc<dyn ImageCache>,
}

/// Creates the engine for `kind`, building from `context`.
pub fn connect(kind: EngineKind, context: &Path) -> Result<EngineHandles, EngineError> {
    match kind {
        EngineKind::Api => {
            let engine = Arc::new(DockerApiEngine::connect(context)?);
            Ok(EngineHandles {
                builder: engine.clone(),
                cache: engine,
            })
        }
        EngineKind::Cli => {
            let engine = Arc::new(DockerCliEngine::new(context));
            Ok(EngineHandles {
                builder: engine.clone(),
                cache: engine,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tracing::Level;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_build_output(level: Level, output: &str) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || log_build_output(output));
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_build_output_visible_with_verbose() {
        let logs = capture_build_output(Level::DEBUG, "Step 1/2 : FROM scratch\n\nStep 2/2 : COPY . .\n");
        assert!(logs.contains(BUILD_OUTPUT_TARGET));
        assert!(logs.contains("Step 1/2 : FROM scratch"));
        assert!(logs.contains("Step 2/2 : COPY . ."));
        assert_eq!(logs.lines().count(), 2);
    }

    #[test]
    fn test_build_output_hidden_at_info() {
        let logs = capture_build_output(Level::INFO, "Step 1/2 : FROM scratch\n");
        assert!(logs.is_empty());
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!(EngineKind::parse("api"), Some(EngineKind::Api));
        assert_eq!(EngineKind::parse("CLI"), Some(EngineKind::Cli));
        assert_eq!(EngineKind::parse("podman"), None);
    }

    #[test]
    fn test_engine_kind_default_is_api() {
        assert_eq!(EngineKind::default(), EngineKind::Api);
        assert_eq!(EngineKind::Cli.to_string(), "cli");
    }

    #[test]
    fn test_connect_cli_engine_is_lazy() {
        // The CLI engine does not touch docker until it is used
        let handles = connect(EngineKind::Cli, Path::new(".")).unwrap();
        assert_eq!(handles.builder.name(), "docker-cli");
    }
}
