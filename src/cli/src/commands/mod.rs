//! CLI command definitions and dispatch.

mod acr_get_login_password;
mod acr_push;
mod acr_push_example;
mod get_secret;
mod version;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use azpush_core::EngineConfig;
use azpush_runtime::{Client, CredentialDirectory};

/// azpush — push container images to Azure Container Registry.
#[derive(Parser)]
#[command(name = "azpush", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command.
#[derive(Args)]
pub struct GlobalArgs {
    /// Container runtime CLI to drive (docker, podman)
    #[arg(long, global = true)]
    pub runtime: Option<String>,

    /// Config file (default: ~/.azpush/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Print the Azure token cache as base64 (debug export of raw credentials)
    GetSecret(get_secret::GetSecretArgs),
    /// Print the `az acr login --expose-token` JSON for a registry
    AcrGetLoginPassword(acr_get_login_password::AcrGetLoginPasswordArgs),
    /// Push the example image to <acr-name>.azurecr.io/<repo>
    AcrPushExample(acr_push_example::AcrPushExampleArgs),
    /// Push an image to <acr-name>.azurecr.io/<repo>
    AcrPush(acr_push::AcrPushArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Resolve configuration: file, then `AZPUSH_RUNTIME`, then `--runtime`.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(EngineConfig::default_path);
    let mut config = EngineConfig::load(&path)?.with_env_overrides();
    if let Some(runtime) = &global.runtime {
        config.runtime = runtime.clone();
    }
    tracing::debug!(runtime = %config.runtime, "Loaded configuration");
    Ok(config)
}

/// Build a client from the global options.
pub(crate) fn open_client(global: &GlobalArgs) -> Result<Client, Box<dyn std::error::Error>> {
    Ok(Client::new(load_config(global)?))
}

/// Open the credential directory given on the command line.
pub(crate) fn open_credentials(path: &Path) -> Result<CredentialDirectory, Box<dyn std::error::Error>> {
    Ok(CredentialDirectory::open(path)?)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::GetSecret(args) => get_secret::execute(&cli.global, args).await,
        Command::AcrGetLoginPassword(args) => acr_get_login_password::execute(&cli.global, args).await,
        Command::AcrPushExample(args) => acr_push_example::execute(&cli.global, args).await,
        Command::AcrPush(args) => acr_push::execute(&cli.global, args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
