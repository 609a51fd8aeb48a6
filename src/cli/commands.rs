use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::BuildRetryConfig;
use crate::engine::EngineKind;
use crate::orchestrator::DEFAULT_TARGET;

/// Build files tried when none are given with `--file`
pub const DEFAULT_BUILD_FILES: &[&str] = &["Dockerfile", "Dockerfile.simple"];

/// Build a container image, retrying transient failures and falling back to
/// alternate build files
#[derive(Parser, Debug)]
#[command(
    name = "build-retry",
    about = "Build a container image with retries and fallback build files",
    version,
    long_about = "build-retry builds a container image from the first build file, retrying \
                  failed attempts after a fixed delay. When every attempt on a build file \
                  fails it moves on to the next one.\n\n\
                  Examples:\n  \
                  build-retry\n  \
                  build-retry my-service:1.4\n  \
                  build-retry api -f docker/Dockerfile -f docker/Dockerfile.slim\n  \
                  build-retry api --max-attempts 5 --delay 30 --format json"
)]
pub struct CliArgs {
    #[arg(
        value_name = "TARGET",
        default_value = DEFAULT_TARGET,
        help = "Image tag to build"
    )]
    pub target: String,

    #[arg(
        short = 'f',
        long = "file",
        value_name = "PATH",
        help = "Build file to try, in order (repeatable; default: Dockerfile, Dockerfile.simple)"
    )]
    pub files: Vec<PathBuf>,

    #[arg(
        short = 'C',
        long,
        value_name = "DIR",
        help = "Build context directory (default: current directory)"
    )]
    pub context: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Attempts per build file (default: 3)")]
    pub max_attempts: Option<u32>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Delay between failed attempts (default: 10)"
    )]
    pub delay: Option<u64>,

    #[arg(
        long,
        value_name = "IMAGE",
        help = "Base image to pre-pull before building (default: python:3.11-slim)"
    )]
    pub base_image: Option<String>,

    #[arg(long, help = "Skip pre-pulling the base image")]
    pub no_warmup: bool,

    #[arg(long, value_enum, help = "Build engine (default: api)")]
    pub engine: Option<EngineArg>,

    #[arg(
        long,
        value_enum,
        default_value = "human",
        help = "Status output format on stdout"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Print the resolved configuration and exit")]
    pub print_config: bool,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

impl CliArgs {
    /// Layers command-line flags over `config`.
    pub fn apply_to(&self, mut config: BuildRetryConfig) -> BuildRetryConfig {
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(delay) = self.delay {
            config.delay_secs = delay;
        }
        if let Some(base_image) = &self.base_image {
            config.base_image = base_image.clone();
        }
        if self.no_warmup {
            config.warmup = false;
        }
        if let Some(engine) = self.engine {
            config.engine = engine.into();
        }
        if let Some(context) = &self.context {
            config.context_dir = context.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.to_lowercase();
        }
        config
    }

    /// Build files in the order they should be tried
    pub fn build_files(&self) -> Vec<PathBuf> {
        if self.files.is_empty() {
            DEFAULT_BUILD_FILES.iter().map(PathBuf::from).collect()
        } else {
            self.files.clone()
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineArg {
    /// Docker Engine API over the local socket
    Api,
    /// The docker command-line client
    Cli,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Api => EngineKind::Api,
            EngineArg::Cli => EngineKind::Cli,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    /// Progress messages and banners
    Human,
    /// One JSON object per line
    Json,
    /// One line of key=value pairs per event
    Kv,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => super::output::OutputFormat::Human,
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Kv => super::output::OutputFormat::KeyValue,
        }
    }
}
