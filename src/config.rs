//! Configuration management for build-retry
//!
//! Settings come from environment variables with defaults, and command-line
//! flags override them (see [`crate::cli`]).
//!
//! # Environment Variables
//!
//! - `BUILD_RETRY_MAX_ATTEMPTS`: Attempts per build file - default: "3"
//! - `BUILD_RETRY_DELAY_SECS`: Pause between failed attempts - default: "10"
//! - `BUILD_RETRY_BASE_IMAGE`: Image to pre-pull - default: "python:3.11-slim"
//! - `BUILD_RETRY_WARMUP`: Pre-pull the base image (true|false) - default: "true"
//! - `BUILD_RETRY_ENGINE`: Engine implementation (api|cli) - default: "api"
//! - `BUILD_RETRY_CONTEXT`: Build context directory - default: "."
//! - `BUILD_RETRY_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use build_retry::BuildRetryConfig;
//!
//! let config = BuildRetryConfig::from_env().expect("Invalid environment");
//! config.validate().expect("Invalid configuration");
//! let policy = config.retry_policy().expect("Invalid retry policy");
//! assert!(policy.max_attempts() >= 1);
//! ```

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineKind;
use crate::orchestrator::{OrchestratorError, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

const DEFAULT_BASE_IMAGE: &str = "python:3.11-slim";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CONTEXT: &str = ".";
const MAX_ATTEMPTS_LIMIT: u32 = 20;
const MAX_DELAY_SECS: u64 = 3600;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRetryConfig {
    /// Attempts per candidate build file
    pub max_attempts: u32,

    /// Pause between failed attempts on one build file, in seconds
    pub delay_secs: u64,

    /// Image pre-pulled before the first attempt
    pub base_image: String,

    /// Whether to pre-pull `base_image` at all
    pub warmup: bool,

    pub engine: EngineKind,

    /// Build context directory; relative build files resolve against it
    pub context_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for BuildRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            base_image: DEFAULT_BASE_IMAGE.to_string(),
            warmup: true,
            engine: EngineKind::default(),
            context_dir: PathBuf::from(DEFAULT_CONTEXT),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                field: name.to_string(),
                error: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl BuildRetryConfig {
    /// Loads `BUILD_RETRY_*` variables over the defaults. A variable that is
    /// set but unparsable is an error rather than silently ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let engine = match env::var("BUILD_RETRY_ENGINE") {
            Ok(raw) => EngineKind::parse(raw.trim()).ok_or_else(|| ConfigError::ParseError {
                field: "BUILD_RETRY_ENGINE".to_string(),
                error: format!("unknown engine '{}', expected api or cli", raw),
            })?,
            Err(_) => defaults.engine,
        };

        Ok(Self {
            max_attempts: parse_var("BUILD_RETRY_MAX_ATTEMPTS")?.unwrap_or(defaults.max_attempts),
            delay_secs: parse_var("BUILD_RETRY_DELAY_SECS")?.unwrap_or(defaults.delay_secs),
            base_image: env::var("BUILD_RETRY_BASE_IMAGE").unwrap_or(defaults.base_image),
            warmup: parse_var("BUILD_RETRY_WARMUP")?.unwrap_or(defaults.warmup),
            engine,
            context_dir: env::var("BUILD_RETRY_CONTEXT")
                .map(PathBuf::from)
                .unwrap_or(defaults.context_dir),
            log_level: env::var("BUILD_RETRY_LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
        })
    }

    /// Validates the configuration
    ///
    /// Checks that:
    /// - `max_attempts` is between 1 and 20
    /// - `delay_secs` is at most one hour
    /// - a base image is named when warm-up is on
    /// - the log level is valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max attempts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::ValidationFailed(format!(
                "Max attempts cannot exceed {}",
                MAX_ATTEMPTS_LIMIT
            )));
        }
        if self.delay_secs > MAX_DELAY_SECS {
            return Err(ConfigError::ValidationFailed(
                "Retry delay cannot exceed 1 hour".to_string(),
            ));
        }
        if self.warmup && self.base_image.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Base image must be set when warm-up is enabled".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, OrchestratorError> {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.delay_secs))
    }

    /// Converts configuration to a display map for output formatting
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("max_attempts".to_string(), self.max_attempts.to_string());
        map.insert("delay_secs".to_string(), self.delay_secs.to_string());
        map.insert("base_image".to_string(), self.base_image.clone());
        map.insert("warmup".to_string(), self.warmup.to_string());
        map.insert("engine".to_string(), self.engine.to_string());
        map.insert(
            "context_dir".to_string(),
            self.context_dir.display().to_string(),
        );
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for BuildRetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build Retry Configuration:")?;
        writeln!(f, "  Max Attempts: {}", self.max_attempts)?;
        writeln!(f, "  Retry Delay: {}s", self.delay_secs)?;
        writeln!(f, "  Base Image: {}", self.base_image)?;
        writeln!(f, "  Warm-up: {}", self.warmup)?;
        writeln!(f, "  Engine: {}", self.engine)?;
        writeln!(f, "  Context: {}", self.context_dir.display())?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
