//! Core of WFS: a log-structured, single-writer filesystem backed by a
//! single memory-mapped image.
//!
//! Every namespace or data mutation is realized by appending a new log
//! entry; prior entries are tombstoned rather than overwritten. Reading
//! filesystem state means scanning the log and taking the latest
//! non-tombstoned entry per inode. See the five modules below, leaves
//! first: [`superblock`] and [`image`] are the physical layout, [`entry`]
//! and [`dentry`] are the wire format, [`resolver`] walks paths through the
//! log, [`engine`] implements the mutators, and [`compact`] is the offline
//! garbage collector (`fsck`).

pub mod compact;
pub mod dentry;
pub mod engine;
pub mod entry;
pub mod error;
pub mod image;
pub mod inode;
pub mod name;
pub mod resolver;
pub mod superblock;
mod util;

pub use engine::Mount;
pub use engine::Stat;
pub use error::Result;
pub use error::WfsError;
pub use image::Image;
pub use image::MAX_SIZE;

/// Maximum length of a directory-entry name (§6).
pub const MAX_FILE_NAME_LEN: usize = dentry::MAX_FILE_NAME_LEN;
/// Maximum length of a path accepted by the callback interface (§6).
pub const MAX_PATH_LENGTH: usize = 128;
