//! Offline log compaction (`fsck`): retains only the latest live entry per
//! inode and rewrites the log contiguously.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use log::warn;
use tempfile::NamedTempFile;

use crate::entry::encode_entry;
use crate::entry::LogIter;
use crate::error::Result;
use crate::inode::InodeHeader;
use crate::superblock::Superblock;
use crate::superblock::SUPERBLOCK_SIZE;

/// Soft bound on the number of distinct inodes the compactor tracks (§6).
/// A fixed-size table of this length was once the hard limit; here it is
/// just a capacity hint, and exceeding it only produces a warning rather
/// than failing compaction.
pub const MAX_INODES: usize = 1000;

/// Summary of a completed compaction, for the `fsck` binary to report.
pub struct CompactionReport {
    pub entries_seen: usize,
    pub entries_retained: usize,
    pub head_before: u32,
    pub head_after: u32,
}

/// Compacts the log in the image at `path`, which must not be mounted.
///
/// Builds the compacted image entirely in memory, stages it into a sibling
/// temporary file, and only replaces the original via an atomic rename once
/// the staged copy is fully written — a failure at any point before the
/// rename leaves the original image untouched.
pub fn compact(path: &Path) -> Result<CompactionReport> {
    let mut file = File::open(path)?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;
    drop(file);

    let sb = Superblock::decode(&raw[..SUPERBLOCK_SIZE])?;

    // Retains the latest live entry per inode; a later tombstone for an
    // inode number removes any entry already recorded for it, since that
    // inode no longer has a live successor.
    let mut latest: HashMap<u32, (InodeHeader, Vec<u8>)> = HashMap::new();
    let mut entries_seen = 0usize;
    for entry in LogIter::new(&raw, sb.head as usize) {
        entries_seen += 1;
        if entry.header.deleted {
            latest.remove(&entry.header.inode_number);
        } else {
            latest.insert(
                entry.header.inode_number,
                (entry.header, entry.payload.to_vec()),
            );
        }
    }
    if latest.len() > MAX_INODES {
        warn!(
            "fsck: {} live inodes exceeds the {MAX_INODES}-entry bookkeeping table the format assumes",
            latest.len()
        );
    }

    // Retention order is implementation-defined (§4.5); ordering by inode
    // number keeps compaction output deterministic across runs, which
    // directory entries don't care about since they reference inode
    // numbers, not offsets.
    let mut retained: Vec<_> = latest.into_iter().collect();
    retained.sort_by_key(|(inode_number, _)| *inode_number);

    let mut staged_log = Vec::new();
    for (_inode_number, (header, payload)) in &retained {
        staged_log.extend_from_slice(&encode_entry(header, payload));
    }

    let new_head = (SUPERBLOCK_SIZE + staged_log.len()) as u32;
    let new_sb = Superblock {
        magic: sb.magic,
        head: new_head,
    };

    let mut new_image = Vec::with_capacity(raw.len());
    new_image.extend_from_slice(&new_sb.encode());
    new_image.extend_from_slice(&staged_log);
    new_image.resize(raw.len(), 0);

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(&new_image)?;
    staging.flush()?;
    staging.persist(path).map_err(|e| e.error)?;

    Ok(CompactionReport {
        entries_seen,
        entries_retained: retained.len(),
        head_before: sb.head,
        head_after: new_head,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dentry::encode_dentries;
    use crate::dentry::Dentry;
    use crate::image::Image;
    use crate::inode::S_IFDIR;
    use crate::inode::S_IFREG;
    use crate::resolver::latest_live_entry;
    use tempfile::NamedTempFile;

    fn header(inode_number: u32, mode: u32) -> InodeHeader {
        InodeHeader {
            inode_number,
            deleted: false,
            mode,
            uid: 0,
            gid: 0,
            flags: 0,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            links: 1,
        }
    }

    #[test]
    fn drops_superseded_and_unlinked_inodes() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(8192).unwrap();
        Image::format(file.path()).unwrap();
        let mut image = Image::open(file.path()).unwrap();

        // Three supersedes of inode 1.
        for gen in 0..3u64 {
            let h = InodeHeader {
                mtime: gen,
                ..header(1, S_IFREG | 0o644)
            };
            let bytes = encode_entry(&h, b"v");
            image.append(&bytes).unwrap();
        }
        // Two supersedes of inode 2.
        for gen in 0..2u64 {
            let h = InodeHeader {
                mtime: gen,
                ..header(2, S_IFREG | 0o644)
            };
            let bytes = encode_entry(&h, b"w");
            image.append(&bytes).unwrap();
        }
        // Inode 3: created, then unlinked (tombstoned, no live successor).
        let h3 = header(3, S_IFREG | 0o600);
        let off3 = image.append(&encode_entry(&h3, &[])).unwrap();
        image.tombstone(off3);
        drop(image);

        let report = compact(file.path()).unwrap();
        // The root directory entry (inode 0) is still live and is retained
        // alongside the latest entries for inodes 1 and 2.
        assert_eq!(report.entries_retained, 3);

        let image = Image::open(file.path()).unwrap();
        assert_eq!(image.iter().count(), 3);
        assert!(latest_live_entry(&image, 1).is_some());
        assert!(latest_live_entry(&image, 2).is_some());
        assert!(latest_live_entry(&image, 3).is_none());
        assert_eq!(
            image.head(),
            SUPERBLOCK_SIZE as u32 + 3 * crate::inode::HEADER_SIZE as u32 + 1 + 1
        );
    }

    #[test]
    fn directory_entries_keep_resolving_after_compaction() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(8192).unwrap();
        Image::format(file.path()).unwrap();
        let mut image = Image::open(file.path()).unwrap();

        let child = header(1, S_IFREG | 0o644);
        image.append(&encode_entry(&child, b"data")).unwrap();

        let root = latest_live_entry(&image, 0).unwrap();
        let payload = encode_dentries(&[Dentry::new("f", 1)]);
        let root_mode = root.header.mode;
        let new_root = InodeHeader {
            mode: root_mode | S_IFDIR,
            ..root.header
        };
        image.append(&encode_entry(&new_root, &payload)).unwrap();
        image.tombstone(root.offset);
        drop(image);

        compact(file.path()).unwrap();

        let image = Image::open(file.path()).unwrap();
        let root = latest_live_entry(&image, 0).unwrap();
        let dentries =
            crate::dentry::parse_dentries(image.payload_at(root.offset, &root.header));
        assert_eq!(dentries.len(), 1);
        assert_eq!(dentries[0].name(), "f");
        assert!(latest_live_entry(&image, dentries[0].inode_number).is_some());
    }
}
