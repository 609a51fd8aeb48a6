use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::commands::CliArgs;
use super::output::{OutputFormat, OutputFormatter, StatusPrinter};
use crate::config::BuildRetryConfig;
use crate::engine;
use crate::orchestrator::{
    BuildOrchestrator, BuildOutcome, BuildTarget, CandidateConfig, PreconditionFailure,
};
use crate::progress::{BuildEvent, LoggingHandler, ProgressHandler};

/// Exit status for invalid arguments or configuration
pub const EXIT_USAGE: i32 = 2;

/// Runs one build from parsed arguments and returns the process exit status.
pub async fn handle_build(args: &CliArgs) -> i32 {
    let format: OutputFormat = args.format.into();
    let formatter = OutputFormatter::new(format);

    let config = match BuildRetryConfig::from_env() {
        Ok(config) => args.apply_to(config),
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("\nPlease check your BUILD_RETRY_* environment variables.");
            return EXIT_USAGE;
        }
    };
    debug!("Resolved configuration: {:?}", config);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your environment variables and command-line arguments.");
        return EXIT_USAGE;
    }

    if args.print_config {
        return match formatter.format_config(&config) {
            Ok(output) => {
                println!("{}", output);
                0
            }
            Err(e) => {
                error!("Failed to format configuration: {}", e);
                1
            }
        };
    }

    let target = match BuildTarget::new(args.target.clone()) {
        Ok(target) => target,
        Err(e) => {
            error!("Invalid target: {}", e);
            return EXIT_USAGE;
        }
    };
    let policy = match config.retry_policy() {
        Ok(policy) => policy,
        Err(e) => {
            error!("Invalid retry policy: {}", e);
            return EXIT_USAGE;
        }
    };
    let candidates = match CandidateConfig::new(args.build_files()) {
        Ok(candidates) => candidates.resolved_against(&config.context_dir),
        Err(e) => {
            error!("Invalid build files: {}", e);
            return EXIT_USAGE;
        }
    };

    let printer = Arc::new(StatusPrinter::stdout(formatter));

    let handles = match engine::connect(config.engine, &config.context_dir) {
        Ok(handles) => handles,
        Err(e) => {
            error!("Failed to connect to the {} engine: {}", config.engine, e);
            let outcome =
                BuildOutcome::PreconditionFailed(PreconditionFailure::EngineUnavailable(e.to_string()));
            printer.on_progress(&BuildEvent::Finished {
                target: target.to_string(),
                outcome: outcome.clone(),
                total_time: Duration::ZERO,
            });
            return outcome.exit_code();
        }
    };
    info!(
        engine = %config.engine,
        context = %config.context_dir.display(),
        "Build engine connected"
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping before the next attempt");
            let _ = cancel_tx.send(true);
        }
    });

    let mut orchestrator = BuildOrchestrator::new(handles.builder, policy)
        .with_progress(Arc::new(LoggingHandler))
        .with_progress(printer)
        .with_cancellation(cancel_rx);
    if config.warmup {
        orchestrator = orchestrator.with_warmup(handles.cache, config.base_image.clone());
    } else {
        debug!("Base image warm-up disabled");
    }

    let outcome = orchestrator.run_build(&target, &candidates).await;
    outcome.exit_code()
}
