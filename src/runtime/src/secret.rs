//! In-process secret store.
//!
//! Secret values are held as [`SecretString`] and handed out only as opaque
//! [`SecretHandle`]s. Resolution back to the value is crate-private and
//! happens where the value is fed to the container runtime.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use secrecy::SecretString;

use azpush_core::error::{AzError, Result};

/// Opaque reference to a named secret.
///
/// Only the name is carried; `Debug` and `Display` never show a value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SecretHandle {
    name: String,
}

impl SecretHandle {
    /// Logical name of the secret.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretHandle")
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for SecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secret:{}", self.name)
    }
}

/// Named secret values.
#[derive(Default)]
pub struct SecretStore {
    secrets: RwLock<HashMap<String, SecretString>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name`, replacing any previous value.
    pub fn set_secret(&self, name: impl Into<String>, value: SecretString) -> SecretHandle {
        let name = name.into();
        tracing::debug!(secret = %name, "Registered secret");
        self.secrets.write().insert(name.clone(), value);
        SecretHandle { name }
    }

    /// Look up a handle by name.
    pub fn get(&self, name: &str) -> Option<SecretHandle> {
        self.secrets.read().contains_key(name).then(|| SecretHandle {
            name: name.to_string(),
        })
    }

    /// Number of registered secrets.
    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.read().is_empty()
    }

    pub(crate) fn resolve(&self, handle: &SecretHandle) -> Result<SecretString> {
        self.secrets
            .read()
            .get(&handle.name)
            .cloned()
            .ok_or_else(|| AzError::ConstructionError(format!("Unknown secret '{}'", handle.name)))
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.secrets.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("SecretStore").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_set_and_resolve() {
        let store = SecretStore::new();
        let handle = store.set_secret("azure-reg-cred", SecretString::from("tok-123".to_string()));

        assert_eq!(handle.name(), "azure-reg-cred");
        assert_eq!(store.resolve(&handle).unwrap().expose_secret(), "tok-123");
    }

    #[test]
    fn test_set_replaces_value() {
        let store = SecretStore::new();
        store.set_secret("azure-reg-cred", SecretString::from("old".to_string()));
        let handle = store.set_secret("azure-reg-cred", SecretString::from("new".to_string()));

        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve(&handle).unwrap().expose_secret(), "new");
    }

    #[test]
    fn test_get_by_name() {
        let store = SecretStore::new();
        assert!(store.get("azure-reg-cred").is_none());

        let handle = store.set_secret("azure-reg-cred", SecretString::from("v".to_string()));
        assert_eq!(store.get("azure-reg-cred"), Some(handle));
    }

    #[test]
    fn test_resolve_unknown_handle() {
        let other = SecretStore::new();
        let handle = other.set_secret("elsewhere", SecretString::from("v".to_string()));

        let store = SecretStore::new();
        assert!(store.is_empty());
        let err = store.resolve(&handle).unwrap_err();
        assert!(matches!(err, AzError::ConstructionError(_)));
    }

    #[test]
    fn test_formatting_never_shows_value() {
        let store = SecretStore::new();
        let handle = store.set_secret("azure-reg-cred", SecretString::from("hunter2".to_string()));

        let rendered = format!("{handle} {handle:?} {store:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("azure-reg-cred"));
    }
}
