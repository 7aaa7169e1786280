#![deny(rust_2018_idioms)]

use clap::Parser;
use snafu::{ResultExt, Snafu};
use std::io;
use tracing::{info, Level};

pub use config::Config;

mod config;
mod domain;
mod flow;
mod probe;
mod report;
mod staralign;

const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

fn main() {
    let args = config::Args::parse();

    if let Err(e) = core(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn core(args: config::Args) -> Result<()> {
    dotenv::dotenv().ok();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    info!(git_sha = GIT_SHA, "Starting friend request sweep");

    let Config {
        access_token,
        sweep,
    } = Config::from_environment(args).context(UnableToConfigureSnafu)?;

    if sweep.dry_run {
        info!("Dry run, no delete requests will be sent");
    }

    let client = staralign::Config::default().into_client(access_token);
    let reporter = report::Reporter::new(io::stdout());
    let mut sweep_flow = flow::SweepFlow::new(client, reporter, sweep);

    let summary = sweep_flow.sweep().await.context(SweepFailedSnafu)?;
    info!(
        fetched = summary.fetched,
        matched = summary.matched,
        deleted = summary.deleted,
        failed = summary.failed,
        "Sweep finished"
    );

    Ok(())
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("{}", source))]
    UnableToConfigure { source: config::Error },

    #[snafu(display("The sweep failed: {}", source))]
    SweepFailed { source: flow::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;
