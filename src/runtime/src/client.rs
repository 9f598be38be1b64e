//! Entry point tying an engine, a secret store and configuration together.

use std::sync::Arc;

use secrecy::SecretString;

use azpush_core::error::Result;
use azpush_core::EngineConfig;

use crate::container::Container;
use crate::engine::{CliEngine, ContainerEngine, RegistryCredential};
use crate::secret::{SecretHandle, SecretStore};

/// Connection to the container execution and secret facilities.
pub struct Client {
    engine: Arc<dyn ContainerEngine>,
    secrets: SecretStore,
    config: EngineConfig,
}

impl Client {
    /// Create a client driving the runtime CLI named in `config`.
    pub fn new(config: EngineConfig) -> Self {
        let engine = Arc::new(CliEngine::from_config(&config));
        Self::with_engine(config, engine)
    }

    /// Create a client over a custom engine.
    pub fn with_engine(config: EngineConfig, engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            secrets: SecretStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Register a secret value and return its handle.
    pub fn set_secret(&self, name: &str, value: SecretString) -> SecretHandle {
        self.secrets.set_secret(name, value)
    }

    /// Run `container` and return the stdout of its last exec step.
    pub async fn stdout(&self, container: &Container) -> Result<String> {
        self.engine.stdout(container).await
    }

    /// Publish `container` to `address` using its attached registry auth.
    pub async fn publish(&self, container: &Container, address: &str) -> Result<String> {
        let credentials = container
            .registry_auths()
            .iter()
            .map(|auth| -> Result<RegistryCredential> {
                Ok(RegistryCredential {
                    host: auth.host.clone(),
                    username: auth.username.clone(),
                    password: self.secrets.resolve(&auth.secret)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.engine.publish(container, address, &credentials).await
    }
}
