//! Node lifetime and directory tree core for the mediafs FUSE bridge.
//!
//! The bridge exposes a curated view of the device media store through the
//! kernel's low-level FUSE protocol. That protocol requires the daemon to
//! hand out a stable numeric identifier ("inode") for every path component
//! it has ever revealed, to honor a per-identifier lookup count, and to
//! never reinterpret an identifier as a different entry while a reference
//! to it is outstanding.
//!
//! This crate is the in-memory side of that contract:
//!
//! - [`NodeTree`] - the directory tree itself: creation, name lookup,
//!   rename, logical deletion, path construction, and the lookup-count
//!   lifecycle per node
//! - [`NodeId`] - a generation-counted handle that packs into the external
//!   u64 inode, so a stale inode can never alias a recycled slot
//! - [`NodeTracker`] - the per-instance registry of live nodes consulted
//!   before any externally supplied inode is trusted
//! - [`FileHandle`] / [`DirHandle`] - open-file and open-directory sessions
//!   owned by their node and dropped with it
//!
//! The FUSE dispatch loop, the redaction policy engine, and the data path
//! live above this crate and drive it through the operations listed here.
//!
//! # Concurrency
//!
//! One [`parking_lot::Mutex`] per tree instance guards every node field,
//! the tracker, and the handle collections. Compound operations (rename,
//! destroy cascades, tree deletion) run under a single acquisition, so all
//! cross-node invariants hold atomically; no finer-grained locking is used.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handles;
pub mod node;
pub mod tracker;

pub use config::FsOptions;
pub use error::{FsError, FsResult, ToErrno};
pub use handles::{DirHandle, FileHandle, HandleId};
pub use node::{NodeId, NodeTree};
pub use tracker::NodeTracker;
