pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, EngineArg, OutputFormatArg};
pub use handlers::handle_build;
pub use output::{OutputFormat, OutputFormatter, StatusPrinter};
