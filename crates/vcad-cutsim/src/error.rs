//! Error types for the simulation engine.

use thiserror::Error;

/// Errors from mesh handling, configuration and simulation runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// A mesh Boolean, conversion or simplification did not produce a
    /// usable solid.
    #[error("geometry operation failed: {0}")]
    GeometryOperationFailure(String),

    /// Mesh buffers are malformed (bad indices, non-finite coordinates).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// A motion command cannot be executed.
    #[error("line {line}: {reason}")]
    InvalidCommand {
        /// 1-based G-code line.
        line: usize,
        /// What is wrong with the command.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(String),

    /// Writing results failed.
    #[error("export failed: {0}")]
    Export(String),

    /// A background run could not be started or panicked.
    #[error("simulation worker failed: {0}")]
    Worker(String),
}

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        SimError::ConfigParse(err.to_string())
    }
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
