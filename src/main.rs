use build_retry::cli::{handle_build, CliArgs};
use build_retry::util::{init_logging, LoggingConfig};
use build_retry::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::from_cli(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("build-retry v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = handle_build(&args).await;

    std::process::exit(exit_code);
}
