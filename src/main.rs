//! e2e-testing CLI
//!
//! Deploys an image locally and runs the end-to-end suite against it.

use clap::Parser;

use e2e_testing::{Cli, CommandSuite, DockerRuntime, Error, Session, SessionConfig, Validate};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Usage errors exit here, before any container is touched
    let cli = Cli::parse();

    let config = match SessionConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };

    match config.validate().into_result() {
        Ok(warnings) => {
            for warning in warnings {
                tracing::warn!("{}", warning);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }

    if let Ok(json) = serde_json::to_string(&config) {
        tracing::debug!(config = %json, "session configuration");
    }

    let runtime = match DockerRuntime::connect() {
        Ok(runtime) => runtime,
        Err(e) => abort(e),
    };

    tracing::info!(image = %config.image, port = %config.port, "starting e2e session");
    let session = Session::new(config, runtime, Box::new(CommandSuite::new()));

    match session.run().await {
        Ok(outcome) => {
            tracing::info!(
                container_id = %outcome.container_id,
                duration = ?outcome.elapsed,
                passed = outcome.suite.success(),
                "e2e session complete"
            );
            std::process::exit(outcome.suite.process_exit_code());
        }
        Err(e) if e.is_fatal() => abort(e),
        Err(e) => {
            tracing::error!(error = %e, "e2e session failed");
            std::process::exit(1);
        }
    }
}

/// Container lifecycle failures are unrecoverable.
fn abort(err: Error) -> ! {
    if err.is_teardown() {
        tracing::error!(error = %err, "container teardown failed, aborting");
    } else {
        tracing::error!(error = %err, "unrecoverable error, aborting");
    }
    std::process::abort()
}
