//! Instruments `.trace` import
//!
//! Facade over the component crates. Most callers only need
//! [`import_instruments_trace`] with a [`FsFileAccess`].

pub use instruments_import::{
    import_from_tree, import_instruments_trace, is_instruments_profile, ErrorKind, ImportConfig,
    ImportConfigBuilder, ImportError,
};
pub use profile_tables::{Profile, ProfileMeta, Thread};
pub use trace_store::{FileAccess, FsFileAccess, MemoryFileAccess};

pub use instruments_import as import;
pub use profile_tables as tables;
pub use trace_store as store;
