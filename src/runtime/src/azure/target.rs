//! ACR host and repository reference derivation.

use std::fmt;

/// DNS suffix of Azure Container Registry login servers.
pub const ACR_DOMAIN: &str = "azurecr.io";

/// Push destination inside an Azure Container Registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    /// Registry name (e.g., "daggertest")
    pub registry: String,
    /// Repository within the registry (e.g., "test")
    pub repository: String,
}

impl RegistryTarget {
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
        }
    }

    /// Login server host, `<registry>.azurecr.io`.
    pub fn host(&self) -> String {
        acr_host(&self.registry)
    }

    /// Full repository reference, `<host>/<repository>`.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.host(), self.repository)
    }
}

impl fmt::Display for RegistryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

/// Login server host for a registry name.
pub fn acr_host(registry: &str) -> String {
    format!("{}.{}", registry, ACR_DOMAIN)
}
