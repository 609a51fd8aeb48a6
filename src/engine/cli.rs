use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info};

use super::{log_build_output, BuildEngine, EngineError, ImageCache};
use crate::orchestrator::BuildTarget;

const DOCKER_PROGRAM: &str = "docker";

/// How many trailing stderr lines are kept in a build failure message
const ERROR_TAIL_LINES: usize = 5;

/// Engine that shells out to the `docker` binary. Each operation is one child
/// process, awaited to completion and killed if the future is dropped.
pub struct DockerCliEngine {
    program: OsString,
    leading_args: Vec<OsString>,
    context: PathBuf,
}

impl DockerCliEngine {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            program: OsString::from(DOCKER_PROGRAM),
            leading_args: Vec::new(),
            context: context.into(),
        }
    }

    /// Uses a different binary, e.g. `podman`.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self.leading_args.clear();
        self
    }

    /// Uses `program` with fixed leading arguments, e.g. `sudo docker`.
    pub fn with_command<I, S>(mut self, program: impl Into<OsString>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program = program.into();
        self.leading_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    async fn run<I, S>(&self, args: I) -> io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("Running {:?}", command.as_std());
        command.output().await
    }
}

#[async_trait]
impl BuildEngine for DockerCliEngine {
    async fn check_available(&self) -> Result<(), EngineError> {
        let output = self
            .run(["info"])
            .await
            .map_err(|e| EngineError::Unavailable(format!("cannot run docker: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EngineError::Unavailable(stderr_tail(&output)))
        }
    }

    async fn build(&self, config_file: &Path, target: &BuildTarget) -> Result<(), EngineError> {
        let args: Vec<&OsStr> = vec![
            OsStr::new("build"),
            OsStr::new("-f"),
            config_file.as_os_str(),
            OsStr::new("-t"),
            OsStr::new(target.as_str()),
            self.context.as_os_str(),
        ];
        let output = self.run(args).await?;

        log_build_output(&String::from_utf8_lossy(&output.stdout));

        if output.status.success() {
            info!(image = %target, dockerfile = %config_file.display(), "Image built");
            Ok(())
        } else {
            Err(EngineError::BuildFailed {
                file: config_file.display().to_string(),
                message: stderr_tail(&output),
            })
        }
    }

    fn name(&self) -> &str {
        "docker-cli"
    }
}

#[async_trait]
impl ImageCache for DockerCliEngine {
    async fn prefetch_base(&self, image_ref: &str) -> Result<(), EngineError> {
        let output = self.run(["pull", image_ref]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(EngineError::PrefetchFailed {
                image: image_ref.to_string(),
                message: stderr_tail(&output),
            })
        }
    }
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        format!("exited with {}", output.status)
    } else {
        tail
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Engine whose `docker` is a shell script run through `sh`
    fn fake_docker(dir: &TempDir, body: &str) -> DockerCliEngine {
        let script = dir.path().join("fake-docker.sh");
        fs::write(&script, body).unwrap();
        DockerCliEngine::new(dir.path()).with_command("sh", [script])
    }

    #[tokio::test]
    async fn test_available_when_info_succeeds() {
        let dir = TempDir::new().unwrap();
        let engine = fake_docker(&dir, "exit 0");
        assert!(engine.check_available().await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_when_info_fails() {
        let dir = TempDir::new().unwrap();
        let engine = fake_docker(&dir, "echo 'Cannot connect to the Docker daemon' >&2\nexit 1");

        match engine.check_available().await {
            Err(EngineError::Unavailable(reason)) => {
                assert!(reason.contains("Cannot connect"));
            }
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unavailable_when_binary_missing() {
        let engine =
            DockerCliEngine::new(".").with_program("/nonexistent/bin/docker-12345");
        assert!(matches!(
            engine.check_available().await,
            Err(EngineError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_build_passes_file_tag_and_context() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("args.log");
        let engine = fake_docker(&dir, &format!("echo \"$@\" > {}", log.display()));
        let target = BuildTarget::new("api:dev").unwrap();
        let dockerfile = dir.path().join("Dockerfile");

        engine.build(&dockerfile, &target).await.unwrap();

        let recorded = fs::read_to_string(&log).unwrap();
        assert_eq!(
            recorded.trim(),
            format!(
                "build -f {} -t api:dev {}",
                dockerfile.display(),
                dir.path().display()
            )
        );
    }

    #[tokio::test]
    async fn test_build_failure_keeps_stderr_tail() {
        let dir = TempDir::new().unwrap();
        let engine = fake_docker(
            &dir,
            "for i in 1 2 3 4 5 6 7; do echo \"step $i\" >&2; done\nexit 1",
        );
        let target = BuildTarget::new("api").unwrap();

        match engine.build(Path::new("Dockerfile"), &target).await {
            Err(EngineError::BuildFailed { file, message }) => {
                assert_eq!(file, "Dockerfile");
                assert!(!message.contains("step 2"));
                assert!(message.contains("step 3"));
                assert!(message.ends_with("step 7"));
            }
            other => panic!("Expected BuildFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_prefetch_failure() {
        let dir = TempDir::new().unwrap();
        let engine = fake_docker(&dir, "exit 1");

        match engine.prefetch_base("python:3.11-slim").await {
            Err(EngineError::PrefetchFailed { image, message }) => {
                assert_eq!(image, "python:3.11-slim");
                assert!(message.contains("exit"));
            }
            other => panic!("Expected PrefetchFailed, got {:?}", other),
        }
    }
}
