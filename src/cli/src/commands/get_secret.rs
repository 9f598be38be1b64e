//! `azpush get-secret` command — Dump the Azure token cache as base64.
//!
//! Debug export: prints raw credential material from
//! `<credentials>/msal_token_cache.json`.

use std::path::PathBuf;

use clap::Args;

use azpush_runtime::Azure;

use super::GlobalArgs;

#[derive(Args)]
pub struct GetSecretArgs {
    /// Local Azure credential directory (e.g., "~/.azure/")
    #[arg(long)]
    pub azure_credentials: PathBuf,
}

pub async fn execute(global: &GlobalArgs, args: GetSecretArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = super::open_client(global)?;
    let credentials = super::open_credentials(&args.azure_credentials)?;

    let output = Azure::new(&client).get_secret(&credentials).await?;
    print!("{output}");
    Ok(())
}
