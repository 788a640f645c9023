//! The memory-mapped backing image: physical layout, head pointer, append/tombstone.

use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;

use crate::entry::LogIter;
use crate::error::Result;
use crate::error::WfsError;
use crate::inode::InodeHeader;
use crate::inode::ROOT_INODE;
use crate::superblock::Superblock;
use crate::superblock::SUPERBLOCK_SIZE;

/// Maximum size of a backing image, in bytes.
pub const MAX_SIZE: u64 = 1_000_000;

/// A mounted image: the memory mapping plus the cached head/capacity it exposes.
///
/// There is exactly one mutable resource in the whole core: this mapping.
/// All appends go through `head`; tombstoning touches one already-written
/// byte. Neither operation calls `fsync`/`flush` itself — durability is
/// whatever the OS provides for the shared mapping until [`Image::close`]
/// or `Drop` flushes it, which is an explicit non-goal of this format.
pub struct Image {
    mmap: MmapMut,
    capacity: u32,
}

impl Image {
    /// Initializes a fresh superblock and root-directory entry in `path`,
    /// which must already exist (this is the `mkfs` boundary collaborator:
    /// creating/truncating the file itself is out of scope here).
    pub fn format(path: &Path) -> Result<()> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 || len > MAX_SIZE {
            return Err(WfsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("image must be sized between 1 and {MAX_SIZE} bytes"),
            )));
        }
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };

        let root = InodeHeader {
            inode_number: ROOT_INODE,
            deleted: false,
            mode: crate::inode::S_IFDIR | 0o755,
            uid: 0,
            gid: 0,
            flags: 0,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            links: 1,
        };
        let root_entry = crate::entry::encode_entry(&root, &[]);
        let sb = Superblock {
            magic: crate::superblock::MAGIC,
            head: (SUPERBLOCK_SIZE + root_entry.len()) as u32,
        };

        mmap[0..SUPERBLOCK_SIZE].copy_from_slice(&sb.encode());
        mmap[SUPERBLOCK_SIZE..SUPERBLOCK_SIZE + root_entry.len()].copy_from_slice(&root_entry);
        mmap.flush()?;
        Ok(())
    }

    /// Maps an existing, already-formatted image read/write.
    pub fn open(path: &Path) -> Result<Self> {
        let file: File = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        // Validates the magic; fatal if it does not match (§3 invariant, §7 invalid-image).
        Superblock::decode(&mmap[..SUPERBLOCK_SIZE])?;
        Ok(Self {
            mmap,
            capacity: len as u32,
        })
    }

    fn superblock(&self) -> Superblock {
        // SUPERBLOCK_SIZE bytes were validated as decodable at open time.
        Superblock::decode(&self.mmap[..SUPERBLOCK_SIZE]).expect("superblock validated at open")
    }

    /// Offset of the first free byte of the log region.
    pub fn head(&self) -> u32 {
        self.superblock().head
    }

    /// Total capacity of the backing image, in bytes.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn set_head(&mut self, head: u32) {
        let sb = Superblock {
            magic: crate::superblock::MAGIC,
            head,
        };
        self.mmap[..SUPERBLOCK_SIZE].copy_from_slice(&sb.encode());
    }

    /// Appends `bytes` at the current head, advancing it. Returns the offset
    /// the entry was written at. Fails with [`WfsError::NoSpace`] without
    /// mutating anything if the image would overflow.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u32> {
        let head = self.head();
        let new_head = head
            .checked_add(bytes.len() as u32)
            .filter(|&h| h <= self.capacity)
            .ok_or(WfsError::NoSpace)?;
        let start = head as usize;
        self.mmap[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_head(new_head);
        Ok(head)
    }

    /// Returns whether appending `len` additional bytes at the current head
    /// would still fit, without mutating anything.
    pub fn fits(&self, len: usize) -> bool {
        self.head()
            .checked_add(len as u32)
            .is_some_and(|h| h <= self.capacity)
    }

    /// Sets the `deleted` byte of the header at `offset` to 1. The only
    /// mutation this crate ever applies to an already-written entry's header.
    pub fn tombstone(&mut self, offset: u32) {
        const DELETED_BYTE_OFFSET: usize = 4;
        self.mmap[offset as usize + DELETED_BYTE_OFFSET] = 1;
    }

    /// In-place update of a live entry's `atime`. A pragmatic, documented
    /// exception to the append-only discipline: `atime` is therefore not
    /// preserved across compaction.
    pub fn set_atime(&mut self, offset: u32, atime: u64) {
        const ATIME_BYTE_OFFSET: usize = 25;
        let start = offset as usize + ATIME_BYTE_OFFSET;
        self.mmap[start..start + 8].copy_from_slice(&atime.to_le_bytes());
    }

    /// Returns the payload bytes of the entry at `offset`, given its already-decoded header.
    pub fn payload_at(&self, offset: u32, header: &InodeHeader) -> &[u8] {
        let start = offset as usize + crate::inode::HEADER_SIZE;
        &self.mmap[start..start + header.payload_len()]
    }

    /// A forward iterator over every entry in the log, from the oldest to the head.
    pub fn iter(&self) -> LogIter<'_> {
        LogIter::new(&self.mmap, self.head() as usize)
    }

    /// Flushes the mapping to the backing file. Called automatically on drop.
    pub fn flush(&mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        let _ = self.mmap.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fresh_image(size: u64) -> (NamedTempFile, Image) {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(size).unwrap();
        Image::format(file.path()).unwrap();
        let image = Image::open(file.path()).unwrap();
        (file, image)
    }

    #[test]
    fn format_writes_root_entry_and_head() {
        let (_file, image) = fresh_image(4096);
        let entries: Vec<_> = image.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].header.inode_number, ROOT_INODE);
        assert!(entries[0].header.is_dir());
        assert_eq!(image.head(), (SUPERBLOCK_SIZE + crate::inode::HEADER_SIZE) as u32);
    }

    #[test]
    fn append_advances_head_and_persists_bytes() {
        let (_file, mut image) = fresh_image(4096);
        let before = image.head();
        let payload = b"some bytes";
        let off = image.append(payload).unwrap();
        assert_eq!(off, before);
        assert_eq!(image.head(), before + payload.len() as u32);
    }

    #[test]
    fn append_past_capacity_fails_without_mutating_head() {
        let (_file, mut image) = fresh_image(128);
        let before = image.head();
        let huge = vec![0u8; 200];
        assert!(matches!(image.append(&huge), Err(WfsError::NoSpace)));
        assert_eq!(image.head(), before);
    }

    #[test]
    fn tombstone_flips_only_the_deleted_byte() {
        let (_file, mut image) = fresh_image(4096);
        let root_offset = image.iter().next().unwrap().offset;
        image.tombstone(root_offset);
        let entries: Vec<_> = image.iter().collect();
        assert!(entries[0].header.deleted);
    }

    #[test]
    fn open_rejects_bad_magic() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(4096).unwrap();
        assert!(matches!(Image::open(file.path()), Err(WfsError::InvalidImage)));
    }
}
