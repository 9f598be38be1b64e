//! `azpush acr-push-example` command — Push the example image to ACR.
//!
//! The target repository must exist before pushing.

use std::path::PathBuf;

use clap::Args;

use azpush_runtime::Azure;

use super::GlobalArgs;

#[derive(Args)]
pub struct AcrPushExampleArgs {
    /// Local Azure credential directory (e.g., "~/.azure/")
    #[arg(long)]
    pub azure_credentials: PathBuf,

    /// Registry name (e.g., "daggertest")
    #[arg(long)]
    pub acr_name: String,

    /// Repository within the registry (e.g., "test")
    #[arg(long)]
    pub repo: String,
}

pub async fn execute(
    global: &GlobalArgs,
    args: AcrPushExampleArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = super::open_client(global)?;
    let credentials = super::open_credentials(&args.azure_credentials)?;

    let reference = Azure::new(&client)
        .acr_push_example(&credentials, &args.acr_name, &args.repo)
        .await?;
    println!("{reference}");
    Ok(())
}
