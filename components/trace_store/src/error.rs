//! Error types for trace bundle access

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a `.trace` bundle
#[derive(Error, Debug)]
pub enum StoreError {
    /// An expected directory or file is absent
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// No store schema under `dir` contains the marker
    #[error("No store schema under {} contains {marker}", dir.display())]
    NoMatchingSchema { dir: PathBuf, marker: String },

    /// A binary store ended before a complete value could be read
    #[error("Truncated read of {len} bytes at offset {offset} in {name}")]
    Truncated {
        name: &'static str,
        offset: u64,
        len: u64,
    },

    /// A binary store holds values that cannot be decoded
    #[error("Invalid {name}: {reason}")]
    InvalidFormat { name: &'static str, reason: String },

    /// A text file is not valid UTF-8
    #[error("File {} is not valid UTF-8", path.display())]
    InvalidText { path: PathBuf },

    /// Underlying filesystem failure
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Convert an IO error for `path`, mapping missing entries to `NotFound`
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound { path }
        } else {
            StoreError::Io { path, source }
        }
    }

    /// True for errors describing a missing entry
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::NoMatchingSchema { .. }
        )
    }
}

/// Result type for trace store operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_not_found() {
        let err = StoreError::from_io(
            "corespace/run1",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: corespace/run1");

        let err = StoreError::from_io(
            "form.template",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_not_found());
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_truncated_display() {
        let err = StoreError::Truncated {
            name: "bulkstore",
            offset: 64,
            len: 4,
        };
        assert_eq!(err.to_string(), "Truncated read of 4 bytes at offset 64 in bulkstore");
    }
}
