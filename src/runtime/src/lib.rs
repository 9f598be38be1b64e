//! azpush Runtime - container execution and ACR publishing.
//!
//! Containers are described as immutable [`Container`] values and realized
//! by a [`ContainerEngine`] (the container runtime CLI in production). The
//! [`Client`] ties an engine to a [`SecretStore`], and the [`azure`] module
//! builds the ACR login and push flows on top of it.

pub mod azure;
pub mod client;
pub mod container;
pub mod engine;
pub mod secret;

// Re-export common types
pub use azure::{Azure, RegistryTarget, ACR_TOKEN_USERNAME, REGISTRY_SECRET_NAME};
pub use client::Client;
pub use container::{Container, CredentialDirectory, Mount, RegistryAuth};
pub use engine::{CliEngine, ContainerEngine, RegistryCredential};
pub use secret::{SecretHandle, SecretStore};

/// azpush Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
