//! Directory entries: the packed payload format of directory log entries.

/// Maximum length of a file name, including the room for a terminator.
pub const MAX_FILE_NAME_LEN: usize = 32;

/// On-disk size of a single directory entry (name field + inode number).
pub const DENTRY_SIZE: usize = MAX_FILE_NAME_LEN + 8;

/// A single (name, inode number) pair inside a directory's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dentry {
    name: [u8; MAX_FILE_NAME_LEN],
    pub inode_number: u32,
}

impl Dentry {
    /// Builds a dentry for `name`, which must already have passed filename
    /// validation (see [`crate::name::validate_filename`]).
    pub fn new(name: &str, inode_number: u32) -> Self {
        assert!(name.len() < MAX_FILE_NAME_LEN, "name too long for a dentry");
        let mut buf = [0u8; MAX_FILE_NAME_LEN];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Self {
            name: buf,
            inode_number,
        }
    }

    /// The entry's name, up to the first NUL byte.
    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn encode(&self) -> [u8; DENTRY_SIZE] {
        let mut buf = [0u8; DENTRY_SIZE];
        buf[..MAX_FILE_NAME_LEN].copy_from_slice(&self.name);
        buf[MAX_FILE_NAME_LEN..].copy_from_slice(&(self.inode_number as u64).to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let mut name = [0u8; MAX_FILE_NAME_LEN];
        name.copy_from_slice(&bytes[..MAX_FILE_NAME_LEN]);
        let inode_number =
            u64::from_le_bytes(bytes[MAX_FILE_NAME_LEN..DENTRY_SIZE].try_into().unwrap()) as u32;
        Self { name, inode_number }
    }
}

/// Parses a directory payload into its ordered sequence of dentries.
///
/// The payload length is assumed to already be a multiple of [`DENTRY_SIZE`]
/// (invariant 2 of the format); entries are never split across the
/// assertion, since every writer in this crate only ever appends or removes
/// whole dentries.
pub fn parse_dentries(payload: &[u8]) -> Vec<Dentry> {
    payload
        .chunks_exact(DENTRY_SIZE)
        .map(Dentry::decode)
        .collect()
}

/// Serializes an ordered sequence of dentries back into a payload.
pub fn encode_dentries(dentries: &[Dentry]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(dentries.len() * DENTRY_SIZE);
    for d in dentries {
        buf.extend_from_slice(&d.encode());
    }
    buf
}
