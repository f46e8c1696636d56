//! File access capability
//!
//! The import pipeline never touches the filesystem directly. Every read goes
//! through a [`FileAccess`] passed in by the caller, so the same code runs
//! against a real `.trace` bundle or an in-memory fixture.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, StoreError};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// Opaque handle to a file discovered while walking a bundle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Capability for reading a `.trace` bundle
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// List the immediate children of a directory
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read a whole file as bytes
    async fn read_bytes(&self, file: &FileHandle) -> Result<Vec<u8>>;

    /// Read a whole file as UTF-8 text
    async fn read_text(&self, file: &FileHandle) -> Result<String> {
        let bytes = self.read_bytes(file).await?;
        String::from_utf8(bytes).map_err(|_| StoreError::InvalidText {
            path: file.path().to_path_buf(),
        })
    }
}

/// [`FileAccess`] backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsFileAccess;

impl FsFileAccess {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileAccess for FsFileAccess {
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|e| StoreError::from_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StoreError::from_io(path, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::from_io(entry.path(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(if file_type.is_dir() {
                DirEntry::directory(name)
            } else {
                DirEntry::file(name)
            });
        }

        entries.sort();
        debug!("Listed {} entries in {}", entries.len(), path.display());
        Ok(entries)
    }

    async fn read_bytes(&self, file: &FileHandle) -> Result<Vec<u8>> {
        tokio::fs::read(file.path())
            .await
            .map_err(|e| StoreError::from_io(file.path(), e))
    }
}

/// [`FileAccess`] over files held in memory
///
/// Directories are implied by file paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileAccess {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous contents
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Builder-style [`MemoryFileAccess::insert`]
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FileAccess for MemoryFileAccess {
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = BTreeSet::new();
        for file in self.files.keys() {
            let Ok(relative) = file.strip_prefix(path) else {
                continue;
            };
            let mut components = relative.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            entries.insert(if components.next().is_some() {
                DirEntry::directory(name)
            } else {
                DirEntry::file(name)
            });
        }

        if entries.is_empty() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(entries.into_iter().collect())
    }

    async fn read_bytes(&self, file: &FileHandle) -> Result<Vec<u8>> {
        self.files
            .get(file.path())
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: file.path().to_path_buf(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> MemoryFileAccess {
        MemoryFileAccess::new()
            .with_file("x.trace/form.template", vec![1, 2, 3])
            .with_file("x.trace/corespace/run1/core/stores/a/schema.xml", "<schema/>")
    }

    #[tokio::test]
    async fn test_memory_read_dir_lists_immediate_children() {
        let access = bundle();
        let entries = access.read_dir(Path::new("x.trace")).await.unwrap();
        assert_eq!(
            entries,
            vec![DirEntry::directory("corespace"), DirEntry::file("form.template")]
        );
    }

    #[tokio::test]
    async fn test_memory_missing_directory() {
        let access = bundle();
        let err = access.read_dir(Path::new("x.trace/nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_memory_read_text() {
        let access = bundle();
        let handle = FileHandle::new("x.trace/corespace/run1/core/stores/a/schema.xml");
        assert_eq!(handle.name(), "schema.xml");
        assert_eq!(access.read_text(&handle).await.unwrap(), "<schema/>");

        let binary = FileHandle::new("x.trace/form.template");
        assert_eq!(access.read_bytes(&binary).await.unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_utf8_text() {
        let access = MemoryFileAccess::new().with_file("bad.txt", vec![0xff, 0xfe]);
        let result = tokio_test::block_on(access.read_text(&FileHandle::new("bad.txt")));
        assert!(matches!(result, Err(StoreError::InvalidText { .. })));
    }
}
