//! `azpush acr-push` command — Push an image to ACR.

use std::path::PathBuf;

use clap::Args;

use azpush_runtime::{Azure, Container};

use super::GlobalArgs;

#[derive(Args)]
pub struct AcrPushArgs {
    /// Local Azure credential directory (e.g., "~/.azure/")
    #[arg(long)]
    pub azure_credentials: PathBuf,

    /// Registry name (e.g., "daggertest")
    #[arg(long)]
    pub acr_name: String,

    /// Repository within the registry (e.g., "test")
    #[arg(long)]
    pub repo: String,

    /// Image to push (e.g., "ubuntu:latest")
    #[arg(long)]
    pub image: String,
}

pub async fn execute(global: &GlobalArgs, args: AcrPushArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = super::open_client(global)?;
    let credentials = super::open_credentials(&args.azure_credentials)?;

    let container = Container::from_image(args.image);
    let reference = Azure::new(&client)
        .acr_push(&credentials, &args.acr_name, &args.repo, &container)
        .await?;
    println!("{reference}");
    Ok(())
}
