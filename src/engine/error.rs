use thiserror::Error;

/// Errors reported by build engines and image caches
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Build engine unavailable: {0}")]
    Unavailable(String),

    #[error("Build with {file} failed: {message}")]
    BuildFailed { file: String, message: String },

    #[error("Failed to pull {image}: {message}")]
    PrefetchFailed { image: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),
}
