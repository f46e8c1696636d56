// Binary plist error types
// Every variant that originates in the byte stream carries the offending offset

use thiserror::Error;

/// Errors raised while decoding a binary property list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlistError {
    /// The buffer does not start with `bplist00`
    #[error("Missing bplist00 magic header")]
    BadMagic,

    /// The buffer is too short to carry the 32-byte trailer
    #[error("Buffer of {0} bytes is too small to hold a binary plist trailer")]
    MissingTrailer(usize),

    /// Trailer fields or offset table are inconsistent with the buffer
    #[error("Invalid trailer: {0}")]
    InvalidTrailer(String),

    /// A read ran past the end of the buffer
    #[error("Truncated read of {len} bytes at offset {offset}")]
    Truncated { offset: usize, len: usize },

    /// The type marker byte is not part of the bplist00 format
    #[error("Unknown type marker 0x{marker:02x} at offset {offset}")]
    UnknownMarker { marker: u8, offset: usize },

    /// An object reference points past the object table
    #[error("Object reference {index} out of range ({count} objects) at offset {offset}")]
    InvalidObjectRef { index: u64, count: u64, offset: usize },

    /// A dictionary key did not decode to a string
    #[error("Dictionary key at offset {offset} is not a string")]
    NonStringKey { offset: usize },

    /// String payload is not valid for its declared encoding
    #[error("Invalid string data at offset {offset}")]
    InvalidString { offset: usize },

    /// An object transitively contains itself
    #[error("Object at offset {offset} contains itself")]
    RecursiveObject { offset: usize },

    /// Containers are nested deeper than the reader accepts
    #[error("Object at offset {offset} is nested more than {limit} levels deep")]
    NestingTooDeep { limit: usize, offset: usize },

    /// Shared containers expand to more values than the buffer size allows
    #[error("Decoding exceeds {budget} values at offset {offset}")]
    TooManyNodes { budget: usize, offset: usize },
}

impl PlistError {
    /// Byte offset associated with this error, if any
    pub fn offset(&self) -> Option<usize> {
        match self {
            PlistError::Truncated { offset, .. }
            | PlistError::UnknownMarker { offset, .. }
            | PlistError::InvalidObjectRef { offset, .. }
            | PlistError::NonStringKey { offset }
            | PlistError::InvalidString { offset }
            | PlistError::RecursiveObject { offset }
            | PlistError::NestingTooDeep { offset, .. }
            | PlistError::TooManyNodes { offset, .. } => Some(*offset),
            PlistError::BadMagic => Some(0),
            PlistError::MissingTrailer(_) | PlistError::InvalidTrailer(_) => None,
        }
    }
}

/// Result type for plist decoding
pub type Result<T> = std::result::Result<T, PlistError>;
