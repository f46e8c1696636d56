//! Columnar profile tables
//!
//! Struct-of-arrays representation of a processed profile: per-thread
//! function, frame, stack and sample tables, plus one string table shared by
//! all threads. Serializes to the processed profile JSON format.

pub mod profile;
pub mod string_table;
pub mod tables;

pub use profile::{
    Category, Profile, ProfileMeta, SharedTables, Thread, GECKO_PROFILE_VERSION,
    PREPROCESSED_PROFILE_VERSION,
};
pub use string_table::StringTable;
pub use tables::{FrameTable, FuncTable, SamplesTable, StackTable};
