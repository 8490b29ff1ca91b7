//! Shared collaborators for mediafs mount backends.
//!
//! This crate provides the pieces of the media bridge that sit next to the
//! node tree rather than inside it:
//!
//! - [`RedactionInfo`] - byte ranges of a media file that must be hidden
//!   from a reader, carried by every open file handle
//! - [`DirectoryEntry`] / [`read_directory`] - raw directory enumeration
//!   from the underlying store, memoized by directory handles
//! - [`io_error_to_errno`] - POSIX errno mapping for I/O failures
//!
//! The node tree in `mediafs-fuse` consumes these types opaquely; the policy
//! that decides *which* ranges are redacted for a given caller lives in the
//! provider layer above both crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod errno;
pub mod readdir;
pub mod redaction;

pub use errno::io_error_to_errno;
pub use readdir::{DirectoryEntry, EntryKind, read_directory};
pub use redaction::{RedactionInfo, RedactionRange, sanitize_segment};
