//! Binary property list reader
//!
//! Decodes Apple's `bplist00` byte format into a tree of [`PlistValue`]s.
//! Keyed-archive back-references survive as [`PlistValue::Uid`] so the next
//! stage can resolve them.
//!
//! # Example
//!
//! ```
//! use plist_reader::{parse_binary_plist, PlistError};
//!
//! assert_eq!(parse_binary_plist(b"not a plist"), Err(PlistError::BadMagic));
//! ```

pub mod error;
pub mod reader;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{PlistError, Result};
pub use reader::{
    is_binary_plist, parse_binary_plist, BinaryPlistReader, Trailer, MAGIC, MAX_NESTING_DEPTH, NODES_PER_BYTE,
};
pub use value::{PlistValue, APPLE_EPOCH_OFFSET_SECS};
