//! Error types for keyed-archive expansion

use plist_reader::PlistError;
use thiserror::Error;

/// Errors that can occur while expanding a keyed archive
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArchiveError {
    /// The underlying binary plist could not be decoded
    #[error("Binary plist error: {0}")]
    Plist(#[from] PlistError),

    /// The plist root is not a dictionary
    #[error("Keyed archive root is a {0}, expected a dictionary")]
    NotAnArchive(&'static str),

    /// `$version` is absent or not 100000
    #[error("Unsupported keyed archive version: {0}")]
    InvalidVersion(String),

    /// `$archiver` is absent or not NSKeyedArchiver
    #[error("Unsupported archiver: {0}")]
    InvalidArchiver(String),

    /// `$top` or `$objects` is absent or has the wrong type
    #[error("Keyed archive field {0} is missing or malformed")]
    MissingField(&'static str),

    /// A UID points past the end of `$objects`
    #[error("UID {index} is out of range ({count} objects)")]
    UidOutOfRange { index: u64, count: usize },

    /// `$class` does not point at a class descriptor with a `$classname`
    #[error("Object {index} has an invalid class reference")]
    InvalidClass { index: usize },

    /// A recognized class is missing fields or holds unexpected types
    #[error("Malformed {class} object: {reason}")]
    MalformedObject { class: String, reason: String },
}

impl ArchiveError {
    pub fn malformed(class: impl Into<String>, reason: impl Into<String>) -> Self {
        ArchiveError::MalformedObject {
            class: class.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for keyed-archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;
