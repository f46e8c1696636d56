//! Trace directory tree
//!
//! A `.trace` bundle is walked once into a [`TraceDirectoryTree`]; later
//! lookups are pure and report the first missing path segment.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::file_access::{EntryKind, FileAccess, FileHandle};

/// Materialized directory of a `.trace` bundle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceDirectoryTree {
    pub name: String,
    pub path: PathBuf,
    pub files: BTreeMap<String, FileHandle>,
    pub subdirectories: BTreeMap<String, TraceDirectoryTree>,
}

impl TraceDirectoryTree {
    /// Child directory by name
    pub fn subdirectory(&self, name: &str) -> Result<&TraceDirectoryTree> {
        self.subdirectories
            .get(name)
            .ok_or_else(|| StoreError::NotFound {
                path: self.path.join(name),
            })
    }

    /// File in this directory by name
    pub fn file(&self, name: &str) -> Result<&FileHandle> {
        self.files.get(name).ok_or_else(|| StoreError::NotFound {
            path: self.path.join(name),
        })
    }

    /// Walk a relative path of directory names
    pub fn descend(&self, segments: &[&str]) -> Result<&TraceDirectoryTree> {
        segments
            .iter()
            .try_fold(self, |dir, segment| dir.subdirectory(segment))
    }

    /// `corespace/run{N}/core` for a run
    pub fn core_dir_for_run(&self, run_number: u32) -> Result<&TraceDirectoryTree> {
        let run_dir = format!("run{}", run_number);
        self.descend(&["corespace", run_dir.as_str(), "core"])
    }

    /// Run numbers that have a `corespace/run{N}` directory, ascending
    pub fn run_numbers(&self) -> Vec<u32> {
        let Some(corespace) = self.subdirectories.get("corespace") else {
            return Vec::new();
        };
        let mut runs: Vec<u32> = corespace
            .subdirectories
            .keys()
            .filter_map(|name| name.strip_prefix("run")?.parse().ok())
            .collect();
        runs.sort_unstable();
        runs
    }

    /// Number of files in this directory and below
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .subdirectories
                .values()
                .map(TraceDirectoryTree::file_count)
                .sum::<usize>()
    }
}

/// Recursively enumerate a directory through `access`
///
/// Sibling subdirectories are read concurrently; the resulting tree does not
/// depend on completion order.
pub fn read_directory_tree<'a>(
    access: &'a dyn FileAccess,
    path: &'a Path,
) -> BoxFuture<'a, Result<TraceDirectoryTree>> {
    read_subtree(access, path.to_path_buf())
}

fn read_subtree(access: &dyn FileAccess, path: PathBuf) -> BoxFuture<'_, Result<TraceDirectoryTree>> {
    async move {
        let entries = access.read_dir(&path).await?;

        let mut files = BTreeMap::new();
        let mut child_paths = Vec::new();
        for entry in entries {
            let child = path.join(&entry.name);
            match entry.kind {
                EntryKind::File => {
                    files.insert(entry.name, FileHandle::new(child));
                }
                EntryKind::Directory => child_paths.push(child),
            }
        }

        let children =
            try_join_all(child_paths.into_iter().map(|child| read_subtree(access, child))).await?;
        let subdirectories = children
            .into_iter()
            .map(|child| (child.name.clone(), child))
            .collect();

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(TraceDirectoryTree {
            name,
            path,
            files,
            subdirectories,
        })
    }
    .boxed()
}

/// Find the store directory whose `schema.xml` contains `marker`
///
/// Candidates under `core/stores` are scanned in name order and the first
/// match wins.
pub async fn find_store_with_schema<'t>(
    access: &dyn FileAccess,
    core: &'t TraceDirectoryTree,
    marker: &str,
) -> Result<&'t TraceDirectoryTree> {
    let stores = core.subdirectory("stores")?;

    for store in stores.subdirectories.values() {
        let Some(schema) = store.files.get("schema.xml") else {
            continue;
        };
        let text = access.read_text(schema).await?;
        if text.contains(marker) {
            debug!("Store {} matches schema marker {}", store.path.display(), marker);
            return Ok(store);
        }
    }

    Err(StoreError::NoMatchingSchema {
        dir: stores.path.clone(),
        marker: marker.to_string(),
    })
}
