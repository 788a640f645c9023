//! The namespace and data engine: `mknod`, `mkdir`, `read`, `write`, `readdir`,
//! `unlink` and `getattr`, each implemented as an append-only copy-on-write
//! rewrite per §4.4.

use std::ops::ControlFlow;
use std::path::Path;

use crate::dentry::encode_dentries;
use crate::dentry::parse_dentries;
use crate::dentry::Dentry;
use crate::entry::encode_entry;
use crate::error::Result;
use crate::error::WfsError;
use crate::image::Image;
use crate::inode::InodeHeader;
use crate::inode::HEADER_SIZE;
use crate::inode::S_IFDIR;
use crate::inode::S_IFMT;
use crate::inode::S_IFREG;
use crate::name::validate_filename;
use crate::resolver::latest_live_entry;
use crate::resolver::resolve;
use crate::resolver::split_parent;
use crate::resolver::strip_mount_prefix;
use crate::util::now_unix;

/// POSIX-stat-shaped view of an inode, returned by `getattr` and used to
/// populate each entry yielded by `readdir`.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub inode_number: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub links: u32,
}

impl Stat {
    fn from_header(header: &InodeHeader) -> Self {
        Self {
            inode_number: header.inode_number,
            mode: header.mode,
            uid: header.uid,
            gid: header.gid,
            size: header.payload_len() as u64,
            atime: header.atime,
            mtime: header.mtime,
            ctime: header.ctime,
            links: header.links,
        }
    }
}

/// A mounted filesystem: the image plus the inode allocator and mount path,
/// threaded explicitly through every operation rather than kept in globals.
pub struct Mount {
    image: Image,
    next_inode: u32,
    mount_point: String,
}

impl Mount {
    /// Opens an already-`mkfs`'d image and reloads the inode allocator from
    /// the log: the counter is never persisted, so it is recomputed as
    /// `max(inode_number) + 1` on every open, including after a remount.
    pub fn open(image_path: &Path, mount_point: &str) -> Result<Self> {
        let image = Image::open(image_path)?;
        let next_inode = image
            .iter()
            .map(|e| e.header.inode_number)
            .max()
            .map_or(0, |max| max + 1)
            .max(1);
        Ok(Self {
            image,
            next_inode,
            mount_point: mount_point.to_owned(),
        })
    }

    fn relative<'a>(&self, path: &'a str) -> &'a str {
        strip_mount_prefix(path, &self.mount_point)
    }

    fn alloc_inode(&mut self) -> u32 {
        let n = self.next_inode;
        self.next_inode += 1;
        n
    }

    pub fn getattr(&self, path: &str) -> Result<Stat> {
        let path = self.relative(path);
        let resolved = resolve(&self.image, path)?;
        Ok(Stat::from_header(&resolved.header))
    }

    fn create(&mut self, path: &str, mode: u32, uid: u32, gid: u32, is_dir: bool) -> Result<Stat> {
        let path = self.relative(path);
        let (parent_path, filename) = split_parent(path);
        validate_filename(filename)?;

        let parent = resolve(&self.image, parent_path)?;
        if !parent.header.is_dir() {
            return Err(WfsError::NotFound);
        }
        let parent_payload = self.image.payload_at(parent.offset, &parent.header);
        let existing_dentries = parse_dentries(parent_payload);
        if existing_dentries.iter().any(|d| d.name() == filename) {
            return Err(WfsError::AlreadyExists);
        }

        let inode_number = self.alloc_inode();
        let now = now_unix();
        let type_bit = if is_dir { S_IFDIR } else { S_IFREG };
        let new_header = InodeHeader {
            inode_number,
            deleted: false,
            mode: type_bit | (mode & !S_IFMT),
            uid,
            gid,
            flags: 0,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
            links: 1,
        };

        let mut new_dentries = existing_dentries;
        new_dentries.push(Dentry::new(filename, inode_number));
        let new_parent_payload = encode_dentries(&new_dentries);
        let new_parent_entry = encode_entry(&parent.header, &new_parent_payload);
        let new_child_entry = encode_entry(&new_header, &[]);

        if !self.image.fits(new_parent_entry.len() + new_child_entry.len()) {
            return Err(WfsError::NoSpace);
        }

        // Parent goes first: a crash before the child's entry lands leaves a
        // dangling dentry, which the resolver treats as not-found (safe).
        // Writing the child first would briefly expose a live orphan entry.
        self.image.append(&new_parent_entry)?;
        self.image.tombstone(parent.offset);
        self.image.append(&new_child_entry)?;

        Ok(Stat::from_header(&new_header))
    }

    pub fn mknod(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> Result<Stat> {
        self.create(path, mode, uid, gid, false)
    }

    pub fn mkdir(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> Result<Stat> {
        self.create(path, mode, uid, gid, true)
    }

    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let path = self.relative(path);
        let entry = resolve(&self.image, path)?;
        if entry.header.is_dir() {
            return Err(WfsError::NotADirectory);
        }
        let data_size = entry.header.payload_len() as u64;
        if offset >= data_size {
            return Ok(0);
        }
        let n = (data_size - offset).min(buf.len() as u64) as usize;
        let payload = self.image.payload_at(entry.offset, &entry.header);
        buf[..n].copy_from_slice(&payload[offset as usize..offset as usize + n]);
        self.image.set_atime(entry.offset, now_unix());
        Ok(n)
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: u64) -> Result<usize> {
        let path = self.relative(path);
        let old = resolve(&self.image, path)?;
        if old.header.is_dir() {
            return Err(WfsError::NotADirectory);
        }
        let old_payload = self.image.payload_at(old.offset, &old.header).to_vec();
        let new_size = (offset + buf.len() as u64).max(old_payload.len() as u64) as usize;

        let new_header = InodeHeader {
            mtime: now_unix(),
            ctime: now_unix(),
            ..old.header
        };
        if !self.image.fits(HEADER_SIZE + new_size) {
            return Err(WfsError::NoSpace);
        }

        let mut new_payload = vec![0u8; new_size];
        new_payload[..old_payload.len()].copy_from_slice(&old_payload);
        new_payload[offset as usize..offset as usize + buf.len()].copy_from_slice(buf);

        let new_entry = encode_entry(&new_header, &new_payload);
        self.image.append(&new_entry)?;
        self.image.tombstone(old.offset);
        Ok(buf.len())
    }

    /// Walks `path`'s dentry payload starting `offset` entries in, invoking
    /// `filler(name, stat, next_offset)` for each. Stops early if `filler`
    /// returns [`ControlFlow::Break`] ("buffer full").
    pub fn readdir(
        &self,
        path: &str,
        offset: u64,
        mut filler: impl FnMut(&str, &Stat, u64) -> ControlFlow<()>,
    ) -> Result<()> {
        let path = self.relative(path);
        let dir = resolve(&self.image, path)?;
        if !dir.header.is_dir() {
            return Err(WfsError::NotADirectory);
        }
        let payload = self.image.payload_at(dir.offset, &dir.header);
        let dentries = parse_dentries(payload);

        for (i, dentry) in dentries.iter().enumerate().skip(offset as usize) {
            // A stale dentry pointing at an unlinked inode (§3 invariant 5)
            // is silently skipped: its current entry resolves to not-found.
            let Some(child) = latest_live_entry(&self.image, dentry.inode_number) else {
                continue;
            };
            let stat = Stat::from_header(&child.header);
            if filler(dentry.name(), &stat, (i + 1) as u64).is_break() {
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let path = self.relative(path);
        let (parent_path, filename) = split_parent(path);
        let target = resolve(&self.image, path)?;
        let parent = resolve(&self.image, parent_path)?;

        let parent_payload = self.image.payload_at(parent.offset, &parent.header);
        let remaining: Vec<Dentry> = parse_dentries(parent_payload)
            .into_iter()
            .filter(|d| d.name() != filename)
            .collect();
        let new_parent_payload = encode_dentries(&remaining);
        let new_parent_entry = encode_entry(&parent.header, &new_parent_payload);

        let now = now_unix();
        let new_target_header = InodeHeader {
            deleted: true,
            links: target.header.links.saturating_sub(1),
            ctime: now,
            ..target.header
        };
        let target_payload = self.image.payload_at(target.offset, &target.header).to_vec();
        let new_target_entry = encode_entry(&new_target_header, &target_payload);

        if !self.image.fits(new_target_entry.len() + new_parent_entry.len()) {
            return Err(WfsError::NoSpace);
        }

        self.image.append(&new_target_entry)?;
        self.image.tombstone(target.offset);
        self.image.append(&new_parent_entry)?;
        self.image.tombstone(parent.offset);
        Ok(())
    }
}
