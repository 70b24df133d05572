//! Store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the reference store.
///
/// Not-found conditions are ordinary return values on the store API and
/// never surface here.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The backing file does not contain well-formed JSON.
    #[error("malformed JSON: {0}")]
    Parse(String),

    /// Well-formed JSON with the wrong shape. `path` points at the
    /// offending field, e.g. `[3].id`.
    #[error("invalid record at {path}: {message}")]
    Validation { path: String, message: String },

    /// Serializing records back to JSON failed.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// Underlying read/write failure. "File does not exist" at load time
    /// is a normal case handled by the store, not an error.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LibraryError {
    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_includes_path() {
        let err = LibraryError::validation("[2].id", "missing required field");
        assert!(err.to_string().contains("[2].id"));
        assert!(err.to_string().contains("missing required field"));
    }

    #[test]
    fn test_io_display_includes_path() {
        let err = LibraryError::io(
            "/tmp/library.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("library.json"));
    }
}
