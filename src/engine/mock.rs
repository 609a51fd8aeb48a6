use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{BuildEngine, EngineError, ImageCache};
use crate::orchestrator::BuildTarget;

/// Scripted result of one build call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBuild {
    Succeed,
    Fail(String),
}

impl MockBuild {
    pub fn fail(message: impl Into<String>) -> Self {
        MockBuild::Fail(message.into())
    }
}

/// One recorded call to [`BuildEngine::build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCall {
    pub config_file: PathBuf,
    pub target: String,
}

/// In-memory engine with queued per-file build results.
///
/// A build file with nothing left in its queue fails.
pub struct MockEngine {
    unavailable: Option<String>,
    prefetch_error: Option<String>,
    scripts: Mutex<HashMap<PathBuf, VecDeque<MockBuild>>>,
    calls: Mutex<Vec<BuildCall>>,
    prefetches: Mutex<Vec<String>>,
    availability_checks: Mutex<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            unavailable: None,
            prefetch_error: None,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            prefetches: Mutex::new(Vec::new()),
            availability_checks: Mutex::new(0),
        }
    }

    /// Makes `check_available` fail with `reason`.
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    /// Makes `prefetch_base` fail with `reason`.
    pub fn with_prefetch_failure(mut self, reason: impl Into<String>) -> Self {
        self.prefetch_error = Some(reason.into());
        self
    }

    /// Queues results for builds of `config_file`, consumed in order.
    pub fn script(
        self,
        config_file: impl Into<PathBuf>,
        results: impl IntoIterator<Item = MockBuild>,
    ) -> Self {
        lock(&self.scripts)
            .entry(config_file.into())
            .or_default()
            .extend(results);
        self
    }

    pub fn build_calls(&self) -> Vec<BuildCall> {
        lock(&self.calls).clone()
    }

    pub fn attempts_for(&self, config_file: &Path) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.config_file == config_file)
            .count()
    }

    pub fn prefetch_calls(&self) -> Vec<String> {
        lock(&self.prefetches).clone()
    }

    pub fn availability_checks(&self) -> usize {
        *lock(&self.availability_checks)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildEngine for MockEngine {
    async fn check_available(&self) -> Result<(), EngineError> {
        *lock(&self.availability_checks) += 1;
        match &self.unavailable {
            Some(reason) => Err(EngineError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    async fn build(&self, config_file: &Path, target: &BuildTarget) -> Result<(), EngineError> {
        lock(&self.calls).push(BuildCall {
            config_file: config_file.to_path_buf(),
            target: target.to_string(),
        });

        let next = lock(&self.scripts)
            .get_mut(config_file)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| MockBuild::fail("no scripted result"));

        match next {
            MockBuild::Succeed => Ok(()),
            MockBuild::Fail(message) => Err(EngineError::BuildFailed {
                file: config_file.display().to_string(),
                message,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl ImageCache for MockEngine {
    async fn prefetch_base(&self, image_ref: &str) -> Result<(), EngineError> {
        lock(&self.prefetches).push(image_ref.to_string());
        match &self.prefetch_error {
            Some(message) => Err(EngineError::PrefetchFailed {
                image: image_ref.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}
