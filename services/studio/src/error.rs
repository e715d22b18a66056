//! services/studio/src/error.rs
//!
//! Defines the primary error type for the studio service.

use crate::config::ConfigError;
use crate::sync::WorkspaceError;
use arunika_core::ports::{PortError, StorageError};

/// The primary error type for the `studio` service.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error that propagated up from one of the core ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    /// The local cache could not be opened.
    #[error("Local storage error: {0}")]
    Storage(#[from] StorageError),

    /// A standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
