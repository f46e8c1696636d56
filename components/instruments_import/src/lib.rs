//! Instruments `.trace` import
//!
//! Converts a CPU core-sampler recording into a processed [`Profile`]:
//!
//! 1. `form.template` is expanded as a keyed archive with
//!    [`InstrumentsInterpreter`] and read into a [`FormTemplate`].
//! 2. One run is selected and its sample bulkstore and backtrace uniquer are
//!    decoded.
//! 3. Backtraces are expanded and deduplicated into per-thread tables.
//!
//! # Example
//!
//! ```no_run
//! use instruments_import::{import_instruments_trace, ImportConfig};
//! use std::path::Path;
//! use trace_store::FsFileAccess;
//!
//! # async fn run() -> Result<(), instruments_import::ImportError> {
//! let profile = import_instruments_trace(
//!     &FsFileAccess::new(),
//!     Path::new("Recording.trace"),
//!     &ImportConfig::default(),
//! )
//! .await?;
//! println!("{} threads", profile.threads.len());
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod config;
pub mod error;
pub mod form_template;
pub mod importer;
pub mod interpreter;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use assembler::{assemble_profile, profile_meta, BacktraceResolver, Sample, ROOT_KEY, ROOT_NAME};
pub use config::{ImportConfig, ImportConfigBuilder, DEFAULT_TIMESTAMP_DIVISOR, TIME_PROFILE_SCHEMA_MARKER};
pub use error::{ErrorKind, ImportError, Result};
pub use form_template::{format_address, FormTemplate, FrameInfo, RunInfo, CORE_SAMPLER2};
pub use importer::{import_from_tree, import_instruments_trace, is_instruments_profile, select_run, FORM_TEMPLATE};
pub use interpreter::InstrumentsInterpreter;
pub use profile_tables::Profile;
