//! Loading the binary stores of one run

use tracing::{debug, info};

use crate::bulkstore::{parse_bulkstore, RawSample};
use crate::error::Result;
use crate::file_access::FileAccess;
use crate::tree::{find_store_with_schema, TraceDirectoryTree};
use crate::uniquer::{parse_integer_uniquer, BacktraceArrays};

/// Decoded stores of a run's `core` directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStores {
    pub samples: Vec<RawSample>,
    pub backtraces: BacktraceArrays,
}

/// Locate the store matching `schema_marker` and decode its bulkstore
pub async fn read_samples(
    access: &dyn FileAccess,
    core: &TraceDirectoryTree,
    schema_marker: &str,
    preamble_words: usize,
) -> Result<Vec<RawSample>> {
    let store = find_store_with_schema(access, core, schema_marker).await?;
    let bytes = access.read_bytes(store.file("bulkstore")?).await?;
    debug!("Read {} bulkstore bytes from {}", bytes.len(), store.path.display());
    parse_bulkstore(&bytes, preamble_words)
}

/// Decode `uniquing/arrayUniquer/integeruniquer.{index,data}`
pub async fn read_backtrace_arrays(
    access: &dyn FileAccess,
    core: &TraceDirectoryTree,
) -> Result<BacktraceArrays> {
    let uniquer = core.descend(&["uniquing", "arrayUniquer"])?;
    let index = access.read_bytes(uniquer.file("integeruniquer.index")?).await?;
    let data = access.read_bytes(uniquer.file("integeruniquer.data")?).await?;
    parse_integer_uniquer(&index, &data)
}

/// Read both stores of a run
pub async fn read_run_stores(
    access: &dyn FileAccess,
    core: &TraceDirectoryTree,
    schema_marker: &str,
    preamble_words: usize,
) -> Result<RunStores> {
    let samples = read_samples(access, core, schema_marker, preamble_words).await?;
    let backtraces = read_backtrace_arrays(access, core).await?;
    info!(
        "Loaded {} samples and {} backtrace arrays from {}",
        samples.len(),
        backtraces.len(),
        core.path.display()
    );
    Ok(RunStores {
        samples,
        backtraces,
    })
}
