//! The `mount` command attaches a WFS image to a directory through the
//! FUSE kernel module, using `fuser`'s low-level session loop.
//!
//! WFS's own engine (`wfs_core::engine::Mount`) speaks paths, not inode
//! numbers, so this binary's only job is the FUSE adapter: translate
//! between the kernel's `(parent_ino, name)`/`ino` vocabulary and the
//! engine's paths, and translate [`wfs_core::WfsError`] into the `errno`
//! FUSE expects. WFS inode numbers are stable and already unique, so they
//! double as FUSE inode numbers (offset by one, since FUSE reserves ino 1
//! for the mount root and WFS's root inode number is 0).

use std::collections::HashMap;
use std::env;
use std::ffi::OsStr;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fuser::FileAttr;
use fuser::FileHandle;
use fuser::FileType;
use fuser::Filesystem;
use fuser::INodeNo;
use fuser::KernelConfig;
use fuser::MountOption;
use fuser::ReadFlags;
use fuser::Request;
use fuser::Errno;

use wfs_core::engine::Mount;
use wfs_core::engine::Stat;
use wfs_core::error::WfsError;
use wfs_core::inode::S_IFDIR;

const TTL: Duration = Duration::new(1, 0);
const ROOT_FUSE_INO: u64 = 1;

fn print_usage(bin: &str) {
    eprintln!("Usage:");
    eprintln!(" {bin} [-h]");
    eprintln!(" {bin} image_path mount_point");
}

fn to_errno(err: &WfsError) -> Errno {
    match err {
        WfsError::NotFound => Errno::ENOENT,
        WfsError::AlreadyExists => Errno::EEXIST,
        WfsError::NoSpace => Errno::ENOSPC,
        WfsError::InvalidName => Errno::EINVAL,
        WfsError::InvalidImage => Errno::EIO,
        WfsError::NotADirectory => Errno::ENOTDIR,
        WfsError::Io(_) => Errno::EIO,
    }
}

fn unix_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn file_attr(stat: &Stat, fuse_ino: u64) -> FileAttr {
    let kind = if stat.mode & S_IFDIR == S_IFDIR {
        FileType::Directory
    } else {
        FileType::RegularFile
    };
    FileAttr {
        ino: INodeNo::from(fuse_ino),
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: unix_time(stat.atime),
        mtime: unix_time(stat.mtime),
        ctime: unix_time(stat.ctime),
        crtime: unix_time(stat.ctime),
        kind,
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.links,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

/// Joins a cached parent path with a child name, as the FUSE kernel gives
/// us one path component at a time.
fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Adapts `wfs_core::engine::Mount`'s path-based callback interface to
/// `fuser`'s inode-based one. The path cache maps each FUSE inode number
/// handed out so far back to the WFS path it names; entries accumulate as
/// the kernel looks things up and are never evicted, since `forget` is not
/// load-bearing for a filesystem this small.
struct WfsFilesystem {
    mount: Mutex<Mount>,
    paths: Mutex<HashMap<u64, String>>,
}

impl WfsFilesystem {
    fn new(mount: Mount) -> Self {
        let mut paths = HashMap::new();
        paths.insert(ROOT_FUSE_INO, "/".to_owned());
        Self {
            mount: Mutex::new(mount),
            paths: Mutex::new(paths),
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.lock().unwrap().get(&ino).cloned()
    }

    fn remember(&self, fuse_ino: u64, path: String) {
        self.paths.lock().unwrap().insert(fuse_ino, path);
    }
}

fn fuse_ino_of(inode_number: u32) -> u64 {
    inode_number as u64 + 1
}

impl Filesystem for WfsFilesystem {
    fn lookup(&self, _req: &Request, parent: INodeNo, name: &OsStr, reply: fuser::ReplyEntry) {
        let Some(parent_path) = self.path_of(u64::from(parent)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(Errno::EINVAL);
            return;
        };
        let path = join(&parent_path, name);

        let result = self.mount.lock().unwrap().getattr(&path);
        match result {
            Ok(stat) => {
                let fuse_ino = fuse_ino_of(stat.inode_number);
                self.remember(fuse_ino, path);
                reply.entry(&TTL, &file_attr(&stat, fuse_ino), 0);
            }
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn getattr(&self, _req: &Request, ino: INodeNo, _fh: Option<FileHandle>, reply: fuser::ReplyAttr) {
        let fuse_ino = u64::from(ino);
        let Some(path) = self.path_of(fuse_ino) else {
            reply.error(Errno::ENOENT);
            return;
        };
        match self.mount.lock().unwrap().getattr(&path) {
            Ok(stat) => reply.attr(&TTL, &file_attr(&stat, fuse_ino)),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn mknod(
        &self,
        req: &Request,
        parent: INodeNo,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: fuser::ReplyEntry,
    ) {
        let Some(parent_path) = self.path_of(u64::from(parent)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(Errno::EINVAL);
            return;
        };
        let path = join(&parent_path, name);

        let result = self
            .mount
            .lock()
            .unwrap()
            .mknod(&path, mode, req.uid(), req.gid());
        match result {
            Ok(stat) => {
                let fuse_ino = fuse_ino_of(stat.inode_number);
                self.remember(fuse_ino, path);
                reply.entry(&TTL, &file_attr(&stat, fuse_ino), 0);
            }
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn mkdir(
        &self,
        req: &Request,
        parent: INodeNo,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: fuser::ReplyEntry,
    ) {
        let Some(parent_path) = self.path_of(u64::from(parent)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(Errno::EINVAL);
            return;
        };
        let path = join(&parent_path, name);

        let result = self
            .mount
            .lock()
            .unwrap()
            .mkdir(&path, mode, req.uid(), req.gid());
        match result {
            Ok(stat) => {
                let fuse_ino = fuse_ino_of(stat.inode_number);
                self.remember(fuse_ino, path);
                reply.entry(&TTL, &file_attr(&stat, fuse_ino), 0);
            }
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn read(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: u64,
        size: u32,
        _read_flags: ReadFlags,
        _flags: u32,
        _lock_owner: Option<fuser::LockOwner>,
        reply: fuser::ReplyData,
    ) {
        let Some(path) = self.path_of(u64::from(ino)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match self.mount.lock().unwrap().read(&path, &mut buf, offset) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn write(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: i64,
        data: &[u8],
        _write_flags: fuser::WriteFlags,
        _flags: fuser::OpenFlags,
        _lock_owner: Option<fuser::LockOwner>,
        reply: fuser::ReplyWrite,
    ) {
        let Some(path) = self.path_of(u64::from(ino)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let offset = offset.max(0) as u64;
        match self.mount.lock().unwrap().write(&path, data, offset) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn readdir(
        &self,
        _req: &Request,
        ino: INodeNo,
        _fh: FileHandle,
        offset: u64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let Some(path) = self.path_of(u64::from(ino)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let paths = &self.paths;
        let result = self.mount.lock().unwrap().readdir(&path, offset, |name, stat, next_offset| {
            let child_fuse_ino = fuse_ino_of(stat.inode_number);
            paths
                .lock()
                .unwrap()
                .insert(child_fuse_ino, join(&path, name));
            let kind = if stat.mode & S_IFDIR == S_IFDIR {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            let full = reply.add(INodeNo::from(child_fuse_ino), next_offset as i64, kind, name);
            if full {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn unlink(&self, _req: &Request, parent: INodeNo, name: &OsStr, reply: fuser::ReplyEmpty) {
        let Some(parent_path) = self.path_of(u64::from(parent)) else {
            reply.error(Errno::ENOENT);
            return;
        };
        let Some(name) = name.to_str() else {
            reply.error(Errno::EINVAL);
            return;
        };
        let path = join(&parent_path, name);

        match self.mount.lock().unwrap().unlink(&path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(to_errno(&e)),
        }
    }

    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> std::io::Result<()> {
        log::info!("wfs mounted");
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let bin = args.first().map(String::as_str).unwrap_or("mount");

    let positional: Vec<&str> = args[1..].iter().map(String::as_str).collect();
    match positional[..] {
        ["-h"] | ["--help"] => {
            print_usage(bin);
            exit(0);
        }
        [image_path, mount_point] => {
            let image_path = PathBuf::from(image_path);
            let engine = Mount::open(&image_path, "").unwrap_or_else(|e| {
                eprintln!("{bin}: {}: {}", image_path.display(), e);
                exit(1);
            });

            let options = [
                MountOption::FSName("wfs".to_owned()),
                MountOption::AutoUnmount,
            ];
            log::info!("mounting {} at {mount_point}", image_path.display());
            fuser::mount2(WfsFilesystem::new(engine), mount_point, &options).unwrap_or_else(|e| {
                eprintln!("{bin}: failed to mount: {e}");
                exit(1);
            });
        }
        _ => {
            print_usage(bin);
            exit(1);
        }
    }
}
