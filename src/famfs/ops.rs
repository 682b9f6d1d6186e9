/*
 * Copyright 2025 the famfs authors
 *
 * This file is part of famfs.
 *
 * famfs is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * famfs is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * famfs. If not, see <https://www.gnu.org/licenses/>.
 */

//! High-level famfs operations: format, meta files, file and directory
//! creation, copy, and check.
//!
//! Every operation follows the same failure policy: compensate and unwind.
//! A step failure unlinks what the operation half-built, releases mappings
//! and descriptors, and returns the error. Durability comes from the log
//! alone: a file exists after remount iff its entry was appended.

use crate::alloc;
use crate::dev;
use crate::err::{Error, Result};
use crate::ioctl;
use crate::ioctl::FileType;
use crate::ioctl::IocExtent;
use crate::log;
use crate::log::Extent;
use crate::log::LogEntry;
use crate::log::LogStats;
use crate::mmap::Mapping;
use crate::mount;
use crate::mount::META_DIR;
use crate::mount::META_LOG;
use crate::mount::META_SUPERBLOCK;
use crate::replay;
use crate::replay::ReplayOptions;
use crate::replay::ReplayStats;
use crate::sb::FAMFS_ALLOC_UNIT;
use crate::sb::FAMFS_LOG_OFFSET;
use crate::sb::Superblock;
use crate::util::Pattern;
use crate::util::ceil_div;
use crate::util::fchown;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::path::PathBuf;

/// Creates a famfs filesystem on the DAX device at `path`.
///
/// Refuses a mounted device, and refuses to overwrite an existing
/// filesystem unless `force` is set. Returns the new superblock.
pub fn mkfs(path: &Path, force: bool) -> Result<Superblock> {
    let dev_size = dev::device_size(path)?;
    if mount::device_is_mounted(path)? {
        return Err(Error::Busy);
    }
    let mut map = Mapping::device_prefix(path, true)?;
    let bytes = map.bytes_mut();
    if !force && Superblock::is_present(bytes) {
        return Err(Error::InvalidArg(
            "device already contains a filesystem, use --force to overwrite",
        ));
    }
    let path_str = path
        .to_str()
        .ok_or(Error::InvalidArg("device path is not valid UTF-8"))?;
    let sb = Superblock::new(path_str, dev_size)?;
    // the superblock lands last: an interrupted format stays invisible
    log::format(&mut bytes[FAMFS_LOG_OFFSET as usize..])?;
    sb.write_to(bytes)?;
    Ok(sb)
}

/// Creates `.meta/` on the mount backed by `device` and binds the
/// `.superblock` and `.log` meta files to their fixed device regions.
///
/// Returns the mount point. Already-present meta files are left alone, so
/// calling this on every mount is harmless.
pub fn mkmeta(device: &Path) -> Result<PathBuf> {
    let mount_point = mount::mount_of_device(device)?;
    // geometry comes from the raw device: the meta files do not exist yet
    let (log_offset, log_len) = {
        let map = Mapping::device_prefix(device, false)?;
        let sb = Superblock::read_from(map.bytes())?;
        (sb.log_offset, sb.log_len)
    };
    let meta_dir = mount_point.join(META_DIR);
    if !meta_dir.is_dir() {
        fs::DirBuilder::new().mode(0o755).create(&meta_dir)?;
    }
    create_meta_file(
        &meta_dir.join(META_SUPERBLOCK),
        FileType::Superblock,
        log_offset,
        &[IocExtent {
            offset: 0,
            len: log_offset,
        }],
    )?;
    create_meta_file(
        &meta_dir.join(META_LOG),
        FileType::Log,
        log_len,
        &[IocExtent {
            offset: log_offset,
            len: log_len,
        }],
    )?;
    Ok(mount_point)
}

fn create_meta_file(
    path: &Path,
    file_type: FileType,
    size: u64,
    extents: &[IocExtent],
) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o600)
        .open(path)?;
    let res = ioctl::check_famfs(&file)
        .and_then(|_| ioctl::map_create(&file, file_type, size, extents));
    if let Err(e) = res {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// Creates a famfs file of `size` bytes at `path`.
///
/// Phase one creates an empty inode; phase two allocates extents, binds
/// them, and appends the log entry that makes the file durable. On any
/// failure the half-built file is unlinked and nothing reaches the log.
///
/// A zero `uid`/`gid` keeps the caller's ownership. Returns the open file.
pub fn mkfile(path: &Path, size: u64, mode: u32, uid: u32, gid: u32) -> Result<File> {
    if size == 0 {
        return Err(Error::InvalidArg("size must be non-zero"));
    }
    let file = file_create(path, mode, uid, gid)?;
    if let Err(e) = file_alloc(path, &file, size) {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(file)
}

/// Phase one: an empty inode on the kernel filesystem.
fn file_create(path: &Path, mode: u32, uid: u32, gid: u32) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)?;
    let res = ioctl::check_famfs(&file).and_then(|_| {
        if uid != 0 || gid != 0 {
            fchown(&file, uid, gid)
        } else {
            Ok(())
        }
    });
    if let Err(e) = res {
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(file)
}

/// Phase two: allocate extents for `file`, bind them, and log the file.
fn file_alloc(path: &Path, file: &File, size: u64) -> Result<()> {
    let canon = fs::canonicalize(path)?;
    let meta_log = mount::find_meta(&canon, META_LOG, true)?;
    let relpath = relative_to_mount(&canon, &meta_log.mount_point)?;

    let (dev_size, log_offset) = {
        let meta_sb = mount::find_meta(&canon, META_SUPERBLOCK, false)?;
        let sb_map = Mapping::of_file(&meta_sb.file, meta_sb.size as usize, false)?;
        let sb = Superblock::read_from(sb_map.bytes())?;
        (sb.primary_size(), sb.log_offset)
    };

    let mut log_map = Mapping::of_file(&meta_log.file, meta_log.size as usize, true)?;
    let log_bytes = log_map.bytes_mut();

    let (mut bitmap, stats) = alloc::build_bitmap(log_bytes, log_offset, dev_size)?;
    if stats.alloc_errors > 0 {
        // never allocate over a damaged map
        return Err(Error::AllocCollision(stats.alloc_errors));
    }
    let offset = alloc::alloc(&mut bitmap, size).ok_or(Error::OutOfSpace)?;
    let len = ceil_div(size, FAMFS_ALLOC_UNIT) * FAMFS_ALLOC_UNIT;

    let md = file.metadata()?;
    let entry = LogEntry::file_create(
        &relpath,
        size,
        md.mode() & 0o7777,
        md.uid(),
        md.gid(),
        &[Extent { offset, len }],
    )?;
    // binding precedes logging: a crash in between leaves only a ghost
    ioctl::map_create(file, FileType::Reg, size, &[IocExtent { offset, len }])?;
    log::append(log_bytes, &entry)?;
    Ok(())
}

fn relative_to_mount(path: &Path, mount_point: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(mount_point)
        .map_err(|_| Error::PathNotInMount)?;
    let rel = rel
        .to_str()
        .ok_or(Error::InvalidArg("path is not valid UTF-8"))?;
    if rel.is_empty() {
        return Err(Error::PathNotInMount);
    }
    Ok(rel.to_string())
}

/// Creates a directory at `path` and logs it.
///
/// A zero `uid`/`gid` keeps the caller's ownership.
pub fn mkdir(path: &Path, mode: u32, uid: u32, gid: u32) -> Result<()> {
    let parent = path.parent().ok_or(Error::InvalidArg("path has no parent"))?;
    let parent = if parent.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        parent.to_path_buf()
    };
    let name = path
        .file_name()
        .ok_or(Error::InvalidArg("path has no final component"))?;
    let parent = fs::canonicalize(&parent)
        .map_err(|_| Error::InvalidArg("parent directory does not exist"))?;
    if !parent.is_dir() {
        return Err(Error::InvalidArg("parent is not a directory"));
    }
    let meta_log = mount::find_meta(&parent, META_LOG, true)?;
    let full = parent.join(name);
    let relpath = relative_to_mount(&full, &meta_log.mount_point)?;
    let entry = LogEntry::mkdir(&relpath, mode, uid, gid)?;

    fs::DirBuilder::new().mode(mode).create(&full)?;
    let res = (|| {
        if uid != 0 && gid != 0 {
            crate::util::chown(&full, uid, gid)?;
        }
        let mut log_map = Mapping::of_file(&meta_log.file, meta_log.size as usize, true)?;
        log::append(log_map.bytes_mut(), &entry)?;
        Ok(())
    })();
    if let Err(e) = res {
        let _ = fs::remove_dir(&full);
        return Err(e);
    }
    Ok(())
}

/// Copies the regular file at `src` into a new famfs file at `dst`,
/// preserving size, mode, and ownership.
pub fn cp(src: &Path, dst: &Path) -> Result<()> {
    let md = fs::metadata(src)?;
    if !md.is_file() {
        return Err(Error::InvalidArg("source is not a regular file"));
    }
    let size = md.len();
    if size == 0 {
        return Err(Error::InvalidArg("source is empty"));
    }
    let file = mkfile(dst, size, md.mode() & 0o7777, md.uid(), md.gid())?;
    if let Err(e) = copy_into(src, &file, size) {
        let _ = fs::remove_file(dst);
        return Err(e);
    }
    Ok(())
}

/// Streams `size` bytes of `src` into a writable mapping of `dst`.
fn copy_into(src: &Path, dst: &File, size: u64) -> Result<()> {
    const CHUNK: usize = 1 << 20;
    let mut map = Mapping::of_file(dst, size as usize, true)?;
    let bytes = map.bytes_mut();
    let mut src = File::open(src)?;
    let mut done = 0;
    while done < bytes.len() {
        let end = (done + CHUNK).min(bytes.len());
        src.read_exact(&mut bytes[done..end])?;
        done = end;
    }
    Ok(())
}

/// Fills the first `size` bytes of `file` with the pattern for `seed`.
pub fn fill_seeded(file: &File, size: u64, seed: u64) -> Result<()> {
    let mut map = Mapping::of_file(file, size as usize, true)?;
    Pattern::new(seed).fill(map.bytes_mut());
    Ok(())
}

/// Checks the file at `path` against the pattern for `seed`.
///
/// Returns the number of mismatching bytes.
pub fn verify(path: &Path, seed: u64) -> Result<u64> {
    const CHUNK: usize = 1 << 20;
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut pattern = Pattern::new(seed);
    let mut expected = vec![0u8; CHUNK];
    let mut actual = vec![0u8; CHUNK];
    let mut remaining = size as usize;
    let mut mismatches = 0u64;
    while remaining > 0 {
        let n = remaining.min(CHUNK);
        file.read_exact(&mut actual[..n])?;
        pattern.fill(&mut expected[..n]);
        mismatches += expected[..n]
            .iter()
            .zip(&actual[..n])
            .filter(|(e, a)| e != a)
            .count() as u64;
        remaining -= n;
    }
    Ok(mismatches)
}

/// Result of a filesystem check.
pub struct FsckReport {
    /// The validated superblock.
    pub sb: Superblock,
    /// Log usage.
    pub log_stats: LogStats,
    /// Bitmap scan counters. `alloc_errors > 0` means corrupted allocation.
    pub stats: alloc::AllocStats,
}

/// Checks the filesystem reachable from `path`.
///
/// `path` is either an unmounted device (the raw prefix is mapped) or any
/// path inside a mount (the meta files are mapped). A mounted device is
/// refused with [`Error::Busy`].
pub fn fsck(path: &Path) -> Result<FsckReport> {
    let md = fs::metadata(path)?;
    let file_type = md.file_type();
    if file_type.is_block_device() || file_type.is_char_device() {
        if mount::device_is_mounted(path)? {
            return Err(Error::Busy);
        }
        let map = Mapping::device_prefix(path, false)?;
        let bytes = map.bytes();
        let sb = Superblock::read_from(bytes)?;
        let log_offset = sb.log_offset;
        let log_len = sb.log_len;
        let end = log_offset
            .checked_add(log_len)
            .ok_or(Error::BadSuperblock("log region overflows"))?;
        if end > bytes.len() as u64 {
            return Err(Error::BadSuperblock("log region outside the mapped prefix"));
        }
        fsck_image(sb, &bytes[log_offset as usize..end as usize])
    } else {
        let sb = {
            let meta_sb = mount::find_meta(path, META_SUPERBLOCK, false)?;
            let sb_map = Mapping::of_file(&meta_sb.file, meta_sb.size as usize, false)?;
            Superblock::read_from(sb_map.bytes())?
        };
        let meta_log = mount::find_meta(path, META_LOG, false)?;
        let log_map = Mapping::of_file(&meta_log.file, meta_log.size as usize, false)?;
        fsck_image(sb, log_map.bytes())
    }
}

fn fsck_image(sb: Superblock, log_bytes: &[u8]) -> Result<FsckReport> {
    let log_stats = log::stats(log_bytes)?;
    let log_offset = sb.log_offset;
    let (_, stats) = alloc::build_bitmap(log_bytes, log_offset, sb.primary_size())?;
    Ok(FsckReport {
        sb,
        log_stats,
        stats,
    })
}

/// Replays the log of the mount containing `path` into its namespace, or
/// into `shadow` when given.
pub fn logplay(path: &Path, dry_run: bool, shadow: Option<&Path>) -> Result<ReplayStats> {
    let dev_size = {
        let meta_sb = mount::find_meta(path, META_SUPERBLOCK, false)?;
        let sb_map = Mapping::of_file(&meta_sb.file, meta_sb.size as usize, false)?;
        Superblock::read_from(sb_map.bytes())?.primary_size()
    };
    let meta_log = mount::find_meta(path, META_LOG, false)?;
    let log_map = Mapping::of_file(&meta_log.file, meta_log.size as usize, false)?;
    let opts = ReplayOptions {
        dry_run,
        shadow: shadow.is_some(),
    };
    let root = match shadow {
        Some(dir) => {
            if !dry_run {
                fs::create_dir_all(dir)?;
            }
            dir.to_path_buf()
        }
        None => meta_log.mount_point.clone(),
    };
    replay::replay(log_map.bytes(), dev_size, &root, &opts)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::log::LOG_ENTRY_SIZE;
    use crate::log::LOG_HEADER_SIZE;
    use crate::log::LOG_TYPE_MKDIR;
    use crate::sb::FAMFS_ALLOC_UNIT as AU;
    use std::env;
    use std::process;

    // Builds a fake mount: a directory whose .meta files are ordinary files
    // carrying a valid superblock and log image. The resolver and the codecs
    // cannot tell the difference.
    fn fake_mount(tag: &str) -> (PathBuf, Vec<u8>) {
        let root = env::temp_dir().join(format!("famfs-ops-test-{tag}-{}", process::id()));
        let meta = root.join(META_DIR);
        fs::create_dir_all(&meta).unwrap();

        let sb = Superblock::new("/dev/dax0.0", 64 * AU).unwrap();
        let mut sb_bytes = vec![0u8; 4096];
        sb.write_to(&mut sb_bytes).unwrap();
        fs::write(meta.join(META_SUPERBLOCK), &sb_bytes).unwrap();

        let mut log_bytes = vec![0u8; LOG_HEADER_SIZE + 8 * LOG_ENTRY_SIZE];
        log::format(&mut log_bytes).unwrap();
        log::append(&mut log_bytes, &LogEntry::mkdir("sub", 0o755, 0, 0).unwrap()).unwrap();
        let file = LogEntry::file_create(
            "sub/data",
            4096,
            0o644,
            0,
            0,
            &[Extent {
                offset: 6 * AU,
                len: AU,
            }],
        )
        .unwrap();
        log::append(&mut log_bytes, &file).unwrap();
        fs::write(meta.join(META_LOG), &log_bytes).unwrap();

        (root, log_bytes)
    }

    #[test]
    fn logplay_shadow_materializes_the_namespace() {
        let (root, _) = fake_mount("logplay");
        let shadow = root.join("shadow");

        let stats = logplay(&root, false, Some(&shadow)).unwrap();
        assert_eq!(stats.dirs_created, 1);
        assert_eq!(stats.files_created, 1);
        assert!(shadow.join("sub").is_dir());
        assert_eq!(fs::metadata(shadow.join("sub/data")).unwrap().len(), 4096);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn logplay_dry_run_touches_nothing() {
        let (root, _) = fake_mount("dryrun");
        let shadow = root.join("shadow");

        let stats = logplay(&root, true, Some(&shadow)).unwrap();
        assert_eq!(stats.dirs_created, 1);
        assert_eq!(stats.files_created, 1);
        assert!(!shadow.exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn fsck_reports_through_meta_files() {
        let (root, _) = fake_mount("fsck");

        let report = fsck(&root).unwrap();
        assert_eq!(report.log_stats.used, 2);
        assert_eq!(report.stats.alloc_errors, 0);
        assert_eq!(report.stats.size_total, 4096);
        assert_eq!(report.stats.alloc_total, AU);
        assert_eq!(report.sb.primary_size(), 64 * AU);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn mkdir_creates_and_logs() {
        let (root, _) = fake_mount("mkdir");

        mkdir(&root.join("newdir"), 0o755, 0, 0).unwrap();
        assert!(root.join("newdir").is_dir());

        let log_bytes = fs::read(root.join(META_DIR).join(META_LOG)).unwrap();
        let all: Vec<LogEntry> = log::entries(&log_bytes).unwrap().collect();
        assert_eq!(all.len(), 3);
        let kind = all[2].kind;
        assert_eq!(kind, LOG_TYPE_MKDIR);
        assert_eq!(all[2].relpath(), "newdir");
        let seqnum = all[2].seqnum;
        assert_eq!(seqnum, 2);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn seeded_fill_and_verify_roundtrip() {
        let path = env::temp_dir().join(format!("famfs-ops-test-seed-{}", process::id()));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        let size = 2 * AU + 4096;
        file.set_len(size).unwrap();
        fill_seeded(&file, size, 1).unwrap();

        assert_eq!(verify(&path, 1).unwrap(), 0);
        assert!(verify(&path, 2).unwrap() > 0);

        fs::remove_file(&path).unwrap();
    }
}
