//! Open-file and open-directory sessions.
//!
//! A [`FileHandle`] pairs an open descriptor with the redaction descriptor
//! computed for the caller that opened it; a [`DirHandle`] pairs an open
//! directory stream with its read cursor and the memoized entry list that
//! keeps a paginated listing consistent. Both are owned by exactly one node
//! and dropped (closing their descriptors) when detached or when the node
//! is destroyed.
//!
//! Handles are identified by a [`HandleId`] allocated by the owning tree;
//! the id is what the dispatch layer stows in `fuse_file_info.fh`.

use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::Arc;

use mediafs_core::readdir::DirectoryEntry;
use mediafs_core::redaction::RedactionInfo;

use crate::error::{FsError, FsResult};

/// Identifier of a handle within its owning tree.
///
/// Ids start at 1; 0 is reserved for "no handle".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub(crate) u64);

impl HandleId {
    /// The raw value, as stored in `fuse_file_info.fh`.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Reconstructs a handle id from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// An open-file session bound to a node.
///
/// The descriptor, the redaction descriptor and the cached flag are fixed
/// at construction. The descriptor closes when the handle is dropped.
#[derive(Debug)]
pub struct FileHandle {
    fd: OwnedFd,
    redaction: RedactionInfo,
    cached: bool,
}

impl FileHandle {
    /// Wraps an already-open descriptor.
    ///
    /// `cached` records whether the kernel was told to cache pages for this
    /// open; [`NodeTree::has_cached_handle`](crate::NodeTree::has_cached_handle)
    /// reports it so the surrounding layer can pick a write-back policy.
    pub fn new(fd: OwnedFd, redaction: RedactionInfo, cached: bool) -> Self {
        Self { fd, redaction, cached }
    }

    /// Opens `path` read-only and wraps the descriptor.
    pub fn open(
        path: impl AsRef<Path>,
        redaction: RedactionInfo,
        cached: bool,
    ) -> FsResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file.into(), redaction, cached))
    }

    /// The redaction descriptor computed for this open.
    pub fn redaction(&self) -> &RedactionInfo {
        &self.redaction
    }

    /// Whether kernel page caching is enabled for this open.
    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

impl AsFd for FileHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for FileHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// An open-directory-listing session bound to a node.
///
/// FUSE calls readdir repeatedly for one stream, sized by the reply buffer.
/// The first call populates `entries` via the readdir collaborator and the
/// memoized list is reused for every later call on the same stream, so a
/// listing that spans multiple round-trips stays consistent even if the
/// underlying directory mutates mid-listing.
#[derive(Debug)]
pub struct DirHandle {
    dir: OwnedFd,
    next_offset: i64,
    entries: Vec<Arc<DirectoryEntry>>,
}

impl DirHandle {
    /// Wraps an already-open directory descriptor. The cursor starts at 0
    /// and the entry list starts empty.
    pub fn new(dir: OwnedFd) -> Self {
        Self { dir, next_offset: 0, entries: Vec::new() }
    }

    /// Opens the directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if !file.metadata()?.is_dir() {
            return Err(FsError::NotADirectory(path.display().to_string()));
        }
        Ok(Self::new(file.into()))
    }

    /// The offset the next readdir call should resume from.
    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }

    /// Advances the read cursor.
    pub fn set_next_offset(&mut self, offset: i64) {
        self.next_offset = offset;
    }

    /// True once the entry list has been populated.
    pub fn is_populated(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Memoizes the entry list for this stream. Called once, on the first
    /// readdir of the stream.
    pub fn set_entries(&mut self, entries: Vec<Arc<DirectoryEntry>>) {
        self.entries = entries;
    }

    /// The memoized entry list.
    pub fn entries(&self) -> &[Arc<DirectoryEntry>] {
        &self.entries
    }
}

impl AsFd for DirHandle {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.dir.as_fd()
    }
}

impl AsRawFd for DirHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.dir.as_raw_fd()
    }
}
