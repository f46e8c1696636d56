//! Trace bundle access
//!
//! Walks a `.trace` bundle through an injected [`FileAccess`] capability and
//! decodes its two binary stores: the sample bulkstore and the backtrace
//! integer uniquer.

pub mod bin_reader;
pub mod bulkstore;
pub mod error;
pub mod file_access;
pub mod stores;
pub mod tree;
pub mod uniquer;

pub use bulkstore::{
    parse_bulkstore, BulkstoreHeader, RawSample, DEFAULT_PREAMBLE_WORDS, MAX_PREAMBLE_WORDS,
    MIN_RECORD_STRIDE,
};
pub use error::{Result, StoreError};
pub use file_access::{DirEntry, EntryKind, FileAccess, FileHandle, FsFileAccess, MemoryFileAccess};
pub use stores::{read_backtrace_arrays, read_run_stores, read_samples, RunStores};
pub use tree::{find_store_with_schema, read_directory_tree, TraceDirectoryTree};
pub use uniquer::{parse_integer_uniquer, BacktraceArrays, INDEX_HEADER_SIZE};
