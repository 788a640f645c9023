//! Error kinds surfaced by the log, resolver and engine.

use std::fmt;
use std::io;

/// An error produced by a core operation.
///
/// Each variant corresponds to one of the POSIX error kinds from the
/// callback interface; the `mount` binary maps these to `-errno` values at
/// the FUSE boundary, while `mkfs` and `fsck` print them and exit non-zero.
#[derive(Debug)]
pub enum WfsError {
    /// Path resolution failed at some step.
    NotFound,
    /// Creation would collide with an existing directory entry.
    AlreadyExists,
    /// Appending the operation's entries would push `head` past the image's capacity.
    NoSpace,
    /// A `mknod`/`mkdir` filename failed validation.
    InvalidName,
    /// The superblock's magic number did not match; the image is not a WFS image.
    InvalidImage,
    /// The resolved entry is a directory where a regular file was expected, or vice versa.
    NotADirectory,
    /// Underlying I/O failure (opening the image, mapping it, flushing it).
    Io(io::Error),
}

impl fmt::Display for WfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file or directory"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::InvalidName => write!(f, "invalid file name"),
            Self::InvalidImage => write!(f, "invalid image: bad magic number"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for WfsError {}

impl From<io::Error> for WfsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl WfsError {
    /// Translates the error to a negative `errno` value, as returned by a FUSE callback.
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::NotFound => -libc::ENOENT,
            Self::AlreadyExists => -libc::EEXIST,
            Self::NoSpace => -libc::ENOSPC,
            Self::InvalidName => -libc::EINVAL,
            Self::NotADirectory => -libc::ENOTDIR,
            Self::InvalidImage => -libc::EIO,
            Self::Io(e) => -e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, WfsError>;
