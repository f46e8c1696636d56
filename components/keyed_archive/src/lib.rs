//! NSKeyedArchiver object graph expansion
//!
//! Turns the flat `$objects` table of a keyed archive into an
//! [`ObjectGraph`]: Foundation containers become native values, other
//! classes are offered to a caller-supplied [`ClassInterpreter`], and UIDs
//! become validated arena references.
//!
//! # Example
//!
//! ```no_run
//! use keyed_archive::{read_keyed_archive, PassThrough};
//!
//! # fn main() -> Result<(), keyed_archive::ArchiveError> {
//! let bytes = std::fs::read("form.template").expect("readable file");
//! let graph = read_keyed_archive(&bytes, &PassThrough)?;
//! println!("{} archived objects", graph.objects().len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod expander;
pub mod foundation;
pub mod graph;
pub mod interpreter;
pub mod value;

pub use error::{ArchiveError, Result};
pub use expander::{expand_keyed_archive, read_keyed_archive, ARCHIVER_NAME, ARCHIVE_VERSION};
pub use foundation::decode_decimal;
pub use graph::{MapKey, ObjectGraph};
pub use interpreter::{ClassContext, ClassInterpreter, Interpretation, ObjectFields, PassThrough};
pub use value::{ArchiveValue, ObjectRef, Record};
