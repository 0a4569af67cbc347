//! Error types shared by the organization and duplicate-cleaning engines.
//!
//! Per-file failures inside a batch are never returned as errors; they are
//! recorded in the [`OperationLog`](crate::operation_log::OperationLog) and the
//! batch moves on. What remains here are the conditions that stop an operation
//! before it starts, or that prevent the log itself from being written.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by tidydown's engines.
#[derive(Error, Debug)]
pub enum Error {
    /// The directory an engine was asked to operate on does not exist.
    #[error("Source directory does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Configuration could not be loaded or compiled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persisted operation log exists but cannot be replayed.
    #[error("Invalid log file format: {0}")]
    InvalidHistoryFormat(String),
}

/// Result type for tidydown operations.
pub type Result<T> = std::result::Result<T, Error>;
