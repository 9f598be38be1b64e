use thiserror::Error;

/// azpush error types
#[derive(Error, Debug)]
pub enum AzError {
    /// Execution environment or mount setup failed
    #[error("Construction error: {0}")]
    ConstructionError(String),

    /// A command inside an execution environment failed
    #[error("Execution error: `{command}` exited with {exit_code:?}: {stderr}")]
    ExecutionError {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Unexpected output shape from a tool
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Authenticated push failed
    #[error("Publish error: {address} - {message}")]
    PublishError { address: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AzError {
    fn from(err: serde_json::Error) -> Self {
        AzError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for AzError {
    fn from(err: serde_yaml::Error) -> Self {
        AzError::SerializationError(err.to_string())
    }
}

/// Result type alias for azpush operations
pub type Result<T> = std::result::Result<T, AzError>;
