//! Path resolution: walking the log from a starting inode down to a target.

use crate::dentry::parse_dentries;
use crate::error::Result;
use crate::error::WfsError;
use crate::image::Image;
use crate::inode::InodeHeader;
use crate::inode::ROOT_INODE;

/// A resolved log entry: where it lives and its decoded header.
#[derive(Debug, Clone, Copy)]
pub struct Resolved {
    pub offset: u32,
    pub header: InodeHeader,
}

/// Strips a leading mount-point prefix from a path, as FUSE would deliver it
/// already rooted at the mount point. Paths handed to `mount`'s FUSE
/// callbacks are already mount-relative (the kernel does this stripping for
/// real sessions), so in that binary `mount_point` is always `""`; this
/// function exists so the resolver's own contract from the callback
/// interface can be exercised directly against host-style paths in tests.
pub fn strip_mount_prefix<'a>(path: &'a str, mount_point: &str) -> &'a str {
    if mount_point.is_empty() {
        return path;
    }
    path.strip_prefix(mount_point).unwrap_or(path)
}

/// Scans the log and returns the latest live entry for `inode_number`, or
/// `None` if it has none (never created, or unlinked with no live
/// successor). "Latest" means highest offset; since the log iterator visits
/// entries in increasing offset order, simply keeping the last match found
/// implements the tie-break rule for free.
pub fn latest_live_entry(image: &Image, inode_number: u32) -> Option<Resolved> {
    let mut found = None;
    for entry in image.iter() {
        if entry.header.inode_number == inode_number && !entry.header.deleted {
            found = Some(Resolved {
                offset: entry.offset,
                header: entry.header,
            });
        }
    }
    found
}

/// Splits `path` into its first non-empty component and the remainder.
/// Returns `None` once the path is exhausted (empty, or just `/`).
fn next_component(path: &str) -> Option<(&str, &str)> {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return None;
    }
    match path.find('/') {
        Some(i) => Some((&path[..i], &path[i + 1..])),
        None => Some((path, "")),
    }
}

/// Resolves `path` (already mount-relative) to its latest live entry,
/// starting from the root inode.
///
/// Walks the directory graph one component at a time: at each step the
/// current target must resolve to a live directory, whose dentries are
/// searched for the next component. The empty path (or `"/"`) resolves to
/// the root directory's own entry.
///
/// Rejects paths longer than `MAX_PATH_LENGTH` up front: the original fixed
/// a `char[MAX_PATH_LENGTH]` stack buffer for path manipulation, so a longer
/// path was never a safe input to begin with.
pub fn resolve(image: &Image, path: &str) -> Result<Resolved> {
    if path.len() >= crate::MAX_PATH_LENGTH {
        return Err(WfsError::InvalidName);
    }
    resolve_from(image, path, ROOT_INODE)
}

fn resolve_from(image: &Image, path: &str, target_inode: u32) -> Result<Resolved> {
    let Some((name, rest)) = next_component(path) else {
        return latest_live_entry(image, target_inode).ok_or(WfsError::NotFound);
    };

    let dir = latest_live_entry(image, target_inode).ok_or(WfsError::NotFound)?;
    if !dir.header.is_dir() {
        return Err(WfsError::NotFound);
    }
    let payload = image.payload_at(dir.offset, &dir.header);
    let dentry = parse_dentries(payload)
        .into_iter()
        .find(|d| d.name() == name)
        .ok_or(WfsError::NotFound)?;

    resolve_from(image, rest, dentry.inode_number)
}

/// Splits a path into its parent directory path and final component, e.g.
/// `/a/b/c` into (`/a/b`, `c`). A path with no intermediate directory, e.g.
/// `/c`, splits into (`/`, `c`).
pub fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => ("/", trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dentry::encode_dentries;
    use crate::dentry::Dentry;
    use crate::entry::encode_entry;
    use crate::image::Image;
    use crate::inode::S_IFDIR;
    use crate::inode::S_IFREG;
    use tempfile::NamedTempFile;

    fn dir_header(inode_number: u32) -> InodeHeader {
        InodeHeader {
            inode_number,
            deleted: false,
            mode: S_IFDIR | 0o755,
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

    fn file_header(inode_number: u32) -> InodeHeader {
        InodeHeader {
            mode: S_IFREG | 0o644,
            ..dir_header(inode_number)
        }
    }

    fn fresh(size: u64) -> (NamedTempFile, Image) {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(size).unwrap();
        Image::format(file.path()).unwrap();
        let image = Image::open(file.path()).unwrap();
        (file, image)
    }

    #[test]
    fn root_resolves_with_empty_or_slash_path() {
        let (_f, image) = fresh(4096);
        assert_eq!(resolve(&image, "").unwrap().header.inode_number, ROOT_INODE);
        assert_eq!(resolve(&image, "/").unwrap().header.inode_number, ROOT_INODE);
    }

    #[test]
    fn resolves_nested_path_through_dentries() {
        let (_f, mut image) = fresh(4096);

        // Append a subdirectory and a file inside it, then rewrite root to link the subdir.
        let sub_entry = encode_entry(&dir_header(1), &[]);
        let sub_off = image.append(&sub_entry).unwrap();

        let file_entry = encode_entry(&file_header(2), b"hi");
        image.append(&file_entry).unwrap();

        let root = latest_live_entry(&image, ROOT_INODE).unwrap();
        let new_root_payload = encode_dentries(&[Dentry::new("sub", 1)]);
        let new_root = encode_entry(&root.header, &new_root_payload);
        image.append(&new_root).unwrap();
        image.tombstone(root.offset);

        let sub = latest_live_entry(&image, 1).unwrap();
        assert_eq!(sub.offset, sub_off);
        let new_sub_payload = encode_dentries(&[Dentry::new("f", 2)]);
        let new_sub = encode_entry(&sub.header, &new_sub_payload);
        image.append(&new_sub).unwrap();
        image.tombstone(sub.offset);

        let resolved = resolve(&image, "/sub/f").unwrap();
        assert_eq!(resolved.header.inode_number, 2);
    }

    #[test]
    fn missing_component_is_not_found() {
        let (_f, image) = fresh(4096);
        assert!(matches!(resolve(&image, "/nope"), Err(WfsError::NotFound)));
    }

    #[test]
    fn path_over_the_length_limit_is_invalid() {
        let (_f, image) = fresh(4096);
        let long_path = format!("/{}", "a".repeat(crate::MAX_PATH_LENGTH));
        assert!(matches!(
            resolve(&image, &long_path),
            Err(WfsError::InvalidName)
        ));
    }

    #[test]
    fn split_parent_handles_top_level_and_nested_paths() {
        assert_eq!(split_parent("/a"), ("/", "a"));
        assert_eq!(split_parent("/a/b/c"), ("/a/b", "c"));
    }
}
