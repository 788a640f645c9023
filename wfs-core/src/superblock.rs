//! The fixed-size superblock at the start of the image.

use crate::error::WfsError;

/// The magic number every valid WFS image begins with.
pub const MAGIC: u32 = 0xDEAD_BEEF;

/// On-disk size of the superblock, in bytes.
pub const SUPERBLOCK_SIZE: usize = 8;

/// The superblock: a magic number and the head-of-log offset.
///
/// Encoded little-endian, field by field, rather than laid over the mapping
/// with a `#[repr(C, packed)]` cast: the image is carried as a byte slice
/// with explicit offsets throughout this crate, never as a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    /// Absolute byte offset of the first free byte in the log region.
    pub head: u32,
}

impl Superblock {
    pub fn fresh() -> Self {
        Self {
            magic: MAGIC,
            head: SUPERBLOCK_SIZE as u32,
        }
    }

    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut buf = [0u8; SUPERBLOCK_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.head.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        if bytes.len() < SUPERBLOCK_SIZE {
            return Err(WfsError::InvalidImage);
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let head = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if magic != MAGIC {
            return Err(WfsError::InvalidImage);
        }
        Ok(Self { magic, head })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let sb = Superblock {
            magic: MAGIC,
            head: 4096,
        };
        let bytes = sb.encode();
        assert_eq!(Superblock::decode(&bytes).unwrap(), sb);
    }

    #[test]
    fn bad_magic_is_invalid_image() {
        let bytes = [0u8; SUPERBLOCK_SIZE];
        assert!(matches!(
            Superblock::decode(&bytes),
            Err(WfsError::InvalidImage)
        ));
    }
}
