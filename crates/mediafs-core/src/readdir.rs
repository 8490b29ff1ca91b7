//! Raw directory enumeration from the underlying media store.
//!
//! The FUSE readdir path is called repeatedly for one open directory stream,
//! each call filling a bounded reply buffer. [`read_directory`] produces the
//! full entry list once; the directory handle in `mediafs-fuse` memoizes it
//! so every round-trip of the same stream pages over a consistent snapshot
//! even if the underlying directory mutates mid-listing.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

/// The kind of a raw directory entry.
///
/// Only regular files and directories are surfaced by the bridge; sockets,
/// fifos and device nodes in the lower store are skipped at enumeration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// One row of a raw directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name, a single path segment.
    pub name: String,
    /// File or directory.
    pub kind: EntryKind,
}

impl DirectoryEntry {
    /// Creates a new directory entry.
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self { name: name.into(), kind }
    }

    /// True if this entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Enumerates the entries of `path` in the lower filesystem.
///
/// `.` and `..` are not returned. Entries that are neither regular files nor
/// directories are skipped. Names that are not valid UTF-8 are converted
/// lossily; the media store only produces UTF-8 names in practice.
pub fn read_directory(path: impl AsRef<Path>) -> io::Result<Vec<Arc<DirectoryEntry>>> {
    let path = path.as_ref();
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(Arc::new(DirectoryEntry::new(name, kind)));
    }
    trace!(path = %path.display(), count = entries.len(), "enumerated directory");
    Ok(entries)
}
