//! Container execution engines.
//!
//! An engine realizes a [`Container`] definition: it runs the exec steps and
//! returns their output, or materializes the image and publishes it.

mod cli;

pub use cli::CliEngine;

use std::fmt;

use async_trait::async_trait;
use secrecy::SecretString;

use azpush_core::error::Result;

use crate::container::Container;

/// Resolved registry credentials handed to an engine at publish time.
#[derive(Clone)]
pub struct RegistryCredential {
    pub host: String,
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Realizes container definitions.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Run the exec steps of `container` and return the last step's stdout.
    ///
    /// A container without exec steps yields an empty string.
    async fn stdout(&self, container: &Container) -> Result<String>;

    /// Materialize `container` and push it to `address`, logging in with
    /// `credentials` first. Returns the published reference.
    async fn publish(
        &self,
        container: &Container,
        address: &str,
        credentials: &[RegistryCredential],
    ) -> Result<String>;
}
