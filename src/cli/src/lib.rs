//! azpush CLI - push container images to Azure Container Registry.

pub mod commands;
