//! Utility modules for build-retry

pub mod logging;

pub use logging::{init_logging, LoggingConfig};
