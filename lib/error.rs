//! Error types for shoutem-cli.

use crate::pack::PackError;
use std::path::PathBuf;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Result type for shoutem-cli operations.
pub type CliResult<T> = Result<T, CliError>;

/// Error type for shoutem-cli operations.
#[derive(Debug, Error)]
pub enum CliError {
    /// Extension code failed the syntax check.
    #[error("{0}")]
    Validation(String),

    /// Extension depends on extensions that do not exist remotely.
    #[error("Missing extension dependencies: {}", .missing.join(", "))]
    Dependency { missing: Vec<String> },

    /// Packing the extension failed.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Transport-level failure talking to a remote service.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote service answered with a non-success status.
    #[error("{operation} failed (HTTP {status}){}", detail(.message))]
    Remote {
        /// The operation that failed (e.g., "Upload", "Publish").
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body or error detail.
        message: String,
    },

    /// No credentials are available.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The directory is not an extension directory.
    #[error("extension.json not found in {0}")]
    NotExtensionDir(PathBuf),

    /// No platform (mobile app) directory contains the given path.
    #[error("Not a platform directory: {0}")]
    NotPlatformDir(PathBuf),

    /// Some extensions in a batch failed.
    #[error("{failed} of {total} extensions failed")]
    BatchIncomplete { failed: usize, total: usize },

    /// User declined or aborted an interactive step.
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn detail(message: impl AsRef<str>) -> String {
    let message = message.as_ref();
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_shows_status_and_message() {
        let err = CliError::Remote {
            operation: "Upload".into(),
            status: 409,
            message: "version 1.0.0 already exists".into(),
        };
        assert_eq!(
            err.to_string(),
            "Upload failed (HTTP 409): version 1.0.0 already exists"
        );

        let err = CliError::Remote {
            operation: "Publish".into(),
            status: 500,
            message: String::new(),
        };
        assert_eq!(err.to_string(), "Publish failed (HTTP 500)");
    }
}
