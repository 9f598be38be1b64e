//! `azpush acr-get-login-password` command.

use std::path::PathBuf;

use clap::Args;

use azpush_runtime::Azure;

use super::GlobalArgs;

#[derive(Args)]
pub struct AcrGetLoginPasswordArgs {
    /// Local Azure credential directory (e.g., "~/.azure/")
    #[arg(long)]
    pub azure_credentials: PathBuf,

    /// Registry name (e.g., "daggertest" for daggertest.azurecr.io)
    #[arg(long)]
    pub acr_name: String,
}

pub async fn execute(
    global: &GlobalArgs,
    args: AcrGetLoginPasswordArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = super::open_client(global)?;
    let credentials = super::open_credentials(&args.azure_credentials)?;

    let output = Azure::new(&client)
        .acr_get_login_password(&credentials, &args.acr_name)
        .await?;
    print!("{output}");
    Ok(())
}
