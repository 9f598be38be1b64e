//! azpush Core - Foundational Types
//!
//! Error types and configuration shared by the azpush runtime and CLI.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{AzError, Result};

/// azpush version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
