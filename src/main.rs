//! emmstats - throughput and statistics reports for EMM mediation clusters.
//!
//! One report per invocation: resolve the target entity from the YAML
//! configuration, open (or reuse) a database session, run the rendered
//! report query, aggregate, and print or export the result.

mod cli;
mod config;
mod db;
mod error;
mod query;
mod report;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ERROR_EXIT_CODE: u8 = 10;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();
    init_tracing(args.verbose);

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("emmstats: {err}");
            ExitCode::from(ERROR_EXIT_CODE)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "emmstats=debug"
    } else {
        "emmstats=warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .init();
}
