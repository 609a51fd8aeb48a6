//! Progress reporting for build runs

mod handler;
mod logging;

pub use handler::{BuildEvent, ProgressHandler, RecordingHandler};
pub use logging::LoggingHandler;
