//! Library error types
//!
//! Script failures are never Rust errors; they are reported inside a
//! `ValidationResult`. These types cover the surrounding plumbing: loading
//! configuration and workflow definition files.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::workflow::SchemaError;

/// Errors produced while loading or checking workflow definitions
#[derive(Debug, Error)]
pub enum FlowOpsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workflow definition file could not be deserialized
    #[error("invalid workflow definition '{}': {message}", .path.display())]
    Definition { path: PathBuf, message: String },

    #[error("unsupported definition format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, FlowOpsError>;
