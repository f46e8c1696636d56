//! Error types for the import pipeline

use keyed_archive::ArchiveError;
use thiserror::Error;
use trace_store::StoreError;

/// Coarse classification of an [`ImportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bytes or archived objects do not have the expected shape
    Format,
    /// An expected file, directory, store or template key is absent
    NotFound,
    /// The bundle was recorded with an instrument other than the CPU sampler
    UnsupportedInstrument,
    /// The filesystem failed underneath the import
    Io,
    /// The import configuration is invalid
    Config,
}

/// Errors that can occur while importing a `.trace` bundle
#[derive(Error, Debug)]
pub enum ImportError {
    /// `form.template` is not a valid keyed archive
    #[error("Invalid form.template: {0}")]
    Archive(#[from] ArchiveError),

    /// The bundle's directories or binary stores could not be read
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The recording used an instrument this importer cannot convert
    #[error("Unsupported instrument: {found}")]
    UnsupportedInstrument { found: String },

    /// A required key is absent from `form.template`
    #[error("form.template has no {0}")]
    MissingTemplateField(&'static str),

    /// The requested run is not listed in `form.template`
    #[error("Run {run} not found (available runs: {available:?})")]
    RunNotFound { run: u32, available: Vec<u32> },

    /// A backtrace cannot be expanded into a stack
    #[error("Invalid backtrace {id}: {reason}")]
    InvalidBacktrace { id: u64, reason: String },

    /// The configuration could not be parsed or holds invalid values
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Archive(_) => ErrorKind::Format,
            ImportError::Store(err) => match err {
                StoreError::NotFound { .. } | StoreError::NoMatchingSchema { .. } => ErrorKind::NotFound,
                StoreError::Io { .. } => ErrorKind::Io,
                StoreError::Truncated { .. }
                | StoreError::InvalidFormat { .. }
                | StoreError::InvalidText { .. } => ErrorKind::Format,
            },
            ImportError::UnsupportedInstrument { .. } => ErrorKind::UnsupportedInstrument,
            ImportError::MissingTemplateField(_) | ImportError::RunNotFound { .. } => {
                ErrorKind::NotFound
            }
            ImportError::InvalidBacktrace { .. } => ErrorKind::Format,
            ImportError::InvalidConfiguration(_) => ErrorKind::Config,
        }
    }
}

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_classification() {
        let err = ImportError::from(StoreError::NotFound {
            path: PathBuf::from("b.trace/corespace/run1"),
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: b.trace/corespace/run1");

        let err = ImportError::from(StoreError::Truncated {
            name: "bulkstore",
            offset: 8,
            len: 4,
        });
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = ImportError::from(ArchiveError::MissingField("$top"));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_unsupported_instrument_display() {
        let err = ImportError::UnsupportedInstrument {
            found: "com.apple.xray.instrument-type.activity".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedInstrument);
        assert_eq!(
            err.to_string(),
            "Unsupported instrument: com.apple.xray.instrument-type.activity"
        );
    }
}
