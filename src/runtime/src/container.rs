//! Declarative container definitions.
//!
//! A [`Container`] is an immutable description: a base image, directory
//! mounts, exec steps and registry auth attachments. Every `with_*` call
//! returns a new value; nothing runs until an engine realizes it.

use std::path::{Path, PathBuf};

use azpush_core::error::{AzError, Result};

use crate::secret::SecretHandle;

/// A caller-owned local directory holding Azure credential state.
///
/// Never written to: engines mount a private copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDirectory {
    path: PathBuf,
}

impl CredentialDirectory {
    /// Open a credential directory, failing if it is not a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(AzError::ConstructionError(format!(
                "Credential directory {} does not exist or is not a directory",
                path.display()
            )));
        }
        let path = path.canonicalize().map_err(|e| {
            AzError::ConstructionError(format!(
                "Failed to resolve credential directory {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A host directory bound into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Host directory (staged as a copy at realization time)
    pub source: PathBuf,
    /// Absolute path inside the container
    pub target: String,
}

/// Registry credentials attached to a container for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub host: String,
    pub username: String,
    pub secret: SecretHandle,
}

/// Immutable container definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    base_image: String,
    mounts: Vec<Mount>,
    execs: Vec<Vec<String>>,
    registry_auths: Vec<RegistryAuth>,
}

impl Container {
    /// Start a definition from a base image reference.
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            base_image: image.into(),
            mounts: Vec::new(),
            execs: Vec::new(),
            registry_auths: Vec::new(),
        }
    }

    /// Mount `directory` at `target`, replacing an existing mount at the same path.
    pub fn with_mounted_directory(
        &self,
        target: impl Into<String>,
        directory: &CredentialDirectory,
    ) -> Result<Self> {
        let target = target.into();
        if !target.starts_with('/') {
            return Err(AzError::ConstructionError(format!(
                "Mount target '{}' must be an absolute path",
                target
            )));
        }
        let mut next = self.clone();
        next.mounts.retain(|m| m.target != target);
        next.mounts.push(Mount {
            source: directory.path().to_path_buf(),
            target,
        });
        Ok(next)
    }

    /// Append an exec step. The first element is the program.
    pub fn with_exec<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.execs.push(args.into_iter().map(Into::into).collect());
        next
    }

    /// Attach credentials used when publishing to `host`.
    pub fn with_registry_auth(
        &self,
        host: impl Into<String>,
        username: impl Into<String>,
        secret: &SecretHandle,
    ) -> Self {
        let host = host.into();
        let mut next = self.clone();
        next.registry_auths.retain(|a| a.host != host);
        next.registry_auths.push(RegistryAuth {
            host,
            username: username.into(),
            secret: secret.clone(),
        });
        next
    }

    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn execs(&self) -> &[Vec<String>] {
        &self.execs
    }

    pub fn registry_auths(&self) -> &[RegistryAuth] {
        &self.registry_auths
    }
}
