//! The fixed-size inode header prefixing every log entry.

use crate::error::Result;
use crate::error::WfsError;

/// On-disk size of an inode header, in bytes.
pub const HEADER_SIZE: usize = 56;

/// Type bits of [`InodeHeader::mode`], POSIX `S_IFMT`-style.
pub const S_IFMT: u32 = 0o170_000;
/// Regular file type bit.
pub const S_IFREG: u32 = 0o100_000;
/// Directory type bit.
pub const S_IFDIR: u32 = 0o040_000;

/// The inode number reserved for the root directory. Its entry is written by `mkfs`.
pub const ROOT_INODE: u32 = 0;

/// Fixed-size record carried at the start of every log entry.
///
/// `size` is load-bearing in two ways: it is the conventional file size
/// *and* the on-disk span of the enclosing entry (header + payload), which
/// the log iterator uses to advance its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeHeader {
    pub inode_number: u32,
    pub deleted: bool,
    /// Full POSIX `mode_t`: type bits (`S_IFDIR`/`S_IFREG`) plus permission bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub flags: u32,
    /// Total length of the enclosing log entry, header included.
    pub size: u32,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub links: u32,
}

impl InodeHeader {
    /// Whether this header's mode designates a directory.
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Whether this header's mode designates a regular file.
    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// Length of the payload that follows this header in its entry.
    pub fn payload_len(&self) -> usize {
        self.size as usize - HEADER_SIZE
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.inode_number.to_le_bytes());
        buf[4] = self.deleted as u8;
        buf[5..9].copy_from_slice(&self.mode.to_le_bytes());
        buf[9..13].copy_from_slice(&self.uid.to_le_bytes());
        buf[13..17].copy_from_slice(&self.gid.to_le_bytes());
        buf[17..21].copy_from_slice(&self.flags.to_le_bytes());
        buf[21..25].copy_from_slice(&self.size.to_le_bytes());
        buf[25..33].copy_from_slice(&self.atime.to_le_bytes());
        buf[33..41].copy_from_slice(&self.mtime.to_le_bytes());
        buf[41..49].copy_from_slice(&self.ctime.to_le_bytes());
        buf[49..53].copy_from_slice(&self.links.to_le_bytes());
        // buf[53..56] left as reserved padding.
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(WfsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated inode header",
            )));
        }
        Ok(Self {
            inode_number: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            deleted: bytes[4] != 0,
            mode: u32::from_le_bytes(bytes[5..9].try_into().unwrap()),
            uid: u32::from_le_bytes(bytes[9..13].try_into().unwrap()),
            gid: u32::from_le_bytes(bytes[13..17].try_into().unwrap()),
            flags: u32::from_le_bytes(bytes[17..21].try_into().unwrap()),
            size: u32::from_le_bytes(bytes[21..25].try_into().unwrap()),
            atime: u64::from_le_bytes(bytes[25..33].try_into().unwrap()),
            mtime: u64::from_le_bytes(bytes[33..41].try_into().unwrap()),
            ctime: u64::from_le_bytes(bytes[41..49].try_into().unwrap()),
            links: u32::from_le_bytes(bytes[49..53].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InodeHeader {
        InodeHeader {
            inode_number: 7,
            deleted: false,
            mode: S_IFREG | 0o644,
            uid: 1000,
            gid: 1000,
            flags: 0,
            size: (HEADER_SIZE + 5) as u32,
            atime: 100,
            mtime: 200,
            ctime: 300,
            links: 1,
        }
    }

    #[test]
    fn round_trip() {
        let h = sample();
        assert_eq!(InodeHeader::decode(&h.encode()).unwrap(), h);
    }

    #[test]
    fn mode_classification() {
        let mut h = sample();
        assert!(h.is_regular());
        assert!(!h.is_dir());
        h.mode = S_IFDIR | 0o755;
        assert!(h.is_dir());
        assert!(!h.is_regular());
    }

    #[test]
    fn payload_len_excludes_header() {
        let h = sample();
        assert_eq!(h.payload_len(), 5);
    }
}
