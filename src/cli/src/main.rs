//! `azpush`: push images to Azure Container Registry with a token obtained
//! from the Azure CLI running in a container.
//!
//! Logs go to stderr (`RUST_LOG`, default `warn`); stdout carries only the
//! command's result, such as login JSON or the pushed reference.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use azpush_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
