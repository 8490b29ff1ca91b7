//! POSIX errno mapping for I/O failures.

use std::io;

/// Converts an [`io::Error`] to the errno the FUSE reply should carry.
///
/// Errors that did not originate from a raw OS error map to `EIO`.
pub fn io_error_to_errno(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(libc::EIO)
}
