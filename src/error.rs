//! Fatal errors
//!
//! Only conditions that abort a run live here. Everything else is an
//! [`ErrorRecord`](crate::diagnostics::ErrorRecord) in the collector.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for operations that can abort a run
pub type Result<T> = std::result::Result<T, FatalError>;

/// Errors that stop validation before any diagnostics are produced
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("Component {0} is required for a firmware configuration")]
    MissingRequiredDomain(String),

    #[error("Could not read configuration file at {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not decode configuration file at {}: {message}", path.display())]
    Undecodable { path: PathBuf, message: String },
}

impl FatalError {
    /// Whether the failure came from the configuration source rather than its content
    pub fn is_source_error(&self) -> bool {
        matches!(self, Self::Unreadable { .. } | Self::Undecodable { .. })
    }
}
