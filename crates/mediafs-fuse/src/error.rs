//! Error handling for the tree core.
//!
//! Ordinary "not found" lookups are `Option`s, never errors, and invariant
//! violations (double registration, unbalanced linkage, resolving a dead
//! inode) are fatal assertions rather than recoverable values. What remains
//! as [`FsError`] is the genuinely fallible surface: opening descriptors at
//! handle construction and the collaborator I/O behind it.

use mediafs_core::io_error_to_errno;
use std::io;
use thiserror::Error;

/// Errors from the fallible edges of the tree core.
#[derive(Debug, Error)]
pub enum FsError {
    /// IO error from opening or inspecting an underlying path.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A directory handle was requested for a non-directory path.
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

impl FsError {
    /// Converts this error to a libc error code for the FUSE reply.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::Io(err) => io_error_to_errno(err),
            FsError::NotADirectory(_) => libc::ENOTDIR,
        }
    }
}

/// Result type for tree core operations.
pub type FsResult<T> = Result<T, FsError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        FsError::to_errno(self)
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}
