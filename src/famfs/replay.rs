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

//! Replays the log to reconstruct the namespace under a mount point.
//!
//! Anything present on the kernel filesystem that the log does not name is a
//! leftover of an interrupted operation; remounting and replaying erases it.
//! Conversely every logged entry is re-created here, so replaying twice
//! leaves the namespace exactly as replaying once.

use crate::err::{Error, Result};
use crate::ioctl;
use crate::ioctl::FileType;
use crate::ioctl::IocExtent;
use crate::log;
use crate::log::LOG_TYPE_FILE_CREATE;
use crate::log::LOG_TYPE_MKDIR;
use crate::log::LogEntry;
use crate::util::chown;
use crate::util::fchown;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// How a replay pass touches the kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplayOptions {
    /// Validate every entry but mutate nothing.
    pub dry_run: bool,
    /// Materialize the namespace as ordinary files instead of binding
    /// extents. The root is then any directory, not a famfs mount.
    pub shadow: bool,
}

/// Counters reported after a replay pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Files created and bound.
    pub files_created: u64,
    /// Directories created.
    pub dirs_created: u64,
    /// Entries skipped because their path already exists.
    pub existed: u64,
    /// Entries skipped because they are damaged or of a reserved kind.
    pub invalid: u64,
}

/// Replays every appended log entry under `root`.
///
/// Damaged entries and entries whose path already exists are reported on
/// stderr and skipped; processing always continues with the next entry, and
/// the pass is idempotent.
pub fn replay(
    log_bytes: &[u8],
    dev_size: u64,
    root: &Path,
    opts: &ReplayOptions,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    for (index, entry) in log::entries(log_bytes)?.enumerate() {
        let kind = entry.kind;
        let res = match kind {
            LOG_TYPE_FILE_CREATE => replay_file(&entry, dev_size, root, opts, &mut stats),
            LOG_TYPE_MKDIR => replay_mkdir(&entry, root, opts, &mut stats),
            _ => {
                eprintln!("famfs logplay: invalid log entry at index {index}");
                stats.invalid += 1;
                Ok(())
            }
        };
        if let Err(e) = res {
            eprintln!("famfs logplay: entry {index} `{}`: {e}", entry.relpath());
            stats.invalid += 1;
        }
    }
    Ok(stats)
}

fn replay_file(
    entry: &LogEntry,
    dev_size: u64,
    root: &Path,
    opts: &ReplayOptions,
    stats: &mut ReplayStats,
) -> Result<()> {
    entry.check_file_create(dev_size)?;
    let path = root.join(entry.relpath());
    if path.exists() {
        eprintln!("famfs logplay: `{}` already exists, skipping", path.display());
        stats.existed += 1;
        return Ok(());
    }
    if opts.dry_run {
        stats.files_created += 1;
        return Ok(());
    }
    let mode = entry.mode;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(mode)
        .open(&path)?;
    if let Err(e) = bind_file(entry, &file, opts) {
        // a half-built file would only survive until the next replay
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    stats.files_created += 1;
    Ok(())
}

fn bind_file(entry: &LogEntry, file: &File, opts: &ReplayOptions) -> Result<()> {
    if opts.shadow {
        let fsize = entry.fsize;
        file.set_len(fsize)?;
        return Ok(());
    }
    ioctl::check_famfs(file)?;
    let (uid, gid) = (entry.uid, entry.gid);
    if uid != 0 || gid != 0 {
        fchown(file, uid, gid)?;
    }
    let extents: Vec<IocExtent> = entry.extents().iter().map(|e| (*e).into()).collect();
    let fsize = entry.fsize;
    ioctl::map_create(file, FileType::Reg, fsize, &extents)
}

fn replay_mkdir(
    entry: &LogEntry,
    root: &Path,
    opts: &ReplayOptions,
    stats: &mut ReplayStats,
) -> Result<()> {
    let relpath = entry.relpath();
    if relpath.starts_with('/') {
        return Err(Error::PathNotRelative);
    }
    if relpath.is_empty() {
        return Err(Error::LogCorrupt("empty path"));
    }
    let path = root.join(relpath);
    if path.is_dir() {
        eprintln!(
            "famfs logplay: directory `{}` already exists, skipping",
            path.display()
        );
        stats.existed += 1;
        return Ok(());
    }
    if path.exists() {
        eprintln!(
            "famfs logplay: `{}` exists and is not a directory, skipping",
            path.display()
        );
        stats.existed += 1;
        return Ok(());
    }
    if opts.dry_run {
        stats.dirs_created += 1;
        return Ok(());
    }
    let mode = entry.mode;
    fs::DirBuilder::new().mode(mode).create(&path)?;
    let (uid, gid) = (entry.uid, entry.gid);
    if !opts.shadow && uid != 0 && gid != 0 {
        chown(&path, uid, gid)?;
    }
    stats.dirs_created += 1;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::log::Extent;
    use crate::log::LOG_ENTRY_SIZE;
    use crate::log::LOG_HEADER_SIZE;
    use crate::log::LOG_TYPE_ACCESS;
    use crate::sb::FAMFS_ALLOC_UNIT as AU;
    use std::env;
    use std::process;

    const DEV_SIZE: u64 = 16 * AU;

    fn test_log() -> Vec<u8> {
        let mut bytes = vec![0u8; LOG_HEADER_SIZE + 8 * LOG_ENTRY_SIZE];
        log::format(&mut bytes).unwrap();
        log::append(&mut bytes, &LogEntry::mkdir("d1", 0o755, 0, 0).unwrap()).unwrap();
        let file = LogEntry::file_create(
            "d1/f1",
            4096,
            0o644,
            0,
            0,
            &[Extent {
                offset: 5 * AU,
                len: AU,
            }],
        )
        .unwrap();
        log::append(&mut bytes, &file).unwrap();
        bytes
    }

    #[test]
    fn shadow_replay_is_idempotent() {
        let root = env::temp_dir().join(format!("famfs-replay-test-{}", process::id()));
        fs::create_dir_all(&root).unwrap();
        let opts = ReplayOptions {
            dry_run: false,
            shadow: true,
        };
        let bytes = test_log();

        let stats = replay(&bytes, DEV_SIZE, &root, &opts).unwrap();
        assert_eq!(stats.dirs_created, 1);
        assert_eq!(stats.files_created, 1);
        assert_eq!(stats.invalid, 0);
        assert!(root.join("d1").is_dir());
        let md = fs::metadata(root.join("d1/f1")).unwrap();
        assert!(md.is_file());
        assert_eq!(md.len(), 4096);

        // replaying again changes nothing
        let again = replay(&bytes, DEV_SIZE, &root, &opts).unwrap();
        assert_eq!(again.dirs_created, 0);
        assert_eq!(again.files_created, 0);
        assert_eq!(again.existed, 2);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn damaged_entries_are_skipped() {
        let root = env::temp_dir().join(format!("famfs-replay-bad-test-{}", process::id()));
        fs::create_dir_all(&root).unwrap();
        let opts = ReplayOptions {
            dry_run: false,
            shadow: true,
        };

        let mut bytes = vec![0u8; LOG_HEADER_SIZE + 8 * LOG_ENTRY_SIZE];
        log::format(&mut bytes).unwrap();
        // a reserved kind
        let mut access = LogEntry::mkdir("x", 0o755, 0, 0).unwrap();
        access.kind = LOG_TYPE_ACCESS;
        log::append(&mut bytes, &access).unwrap();
        // an absolute path smuggled into the record
        let mut absolute = LogEntry::mkdir("yy", 0o755, 0, 0).unwrap();
        absolute.relpath[0] = b'/';
        log::append(&mut bytes, &absolute).unwrap();
        // an extent pointing at the superblock
        let mut zero_extent = LogEntry::file_create(
            "f",
            1,
            0o644,
            0,
            0,
            &[Extent {
                offset: 5 * AU,
                len: AU,
            }],
        )
        .unwrap();
        zero_extent.extents[0].offset = 0;
        log::append(&mut bytes, &zero_extent).unwrap();
        // a valid entry after the damaged ones is still processed
        log::append(&mut bytes, &LogEntry::mkdir("ok", 0o755, 0, 0).unwrap()).unwrap();

        let stats = replay(&bytes, DEV_SIZE, &root, &opts).unwrap();
        assert_eq!(stats.invalid, 3);
        assert_eq!(stats.dirs_created, 1);
        assert!(root.join("ok").is_dir());
        assert!(!root.join("x").exists());
        assert!(!root.join("f").exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn dry_run_mutates_nothing() {
        let root = env::temp_dir().join(format!("famfs-replay-dry-test-{}", process::id()));
        fs::create_dir_all(&root).unwrap();
        let opts = ReplayOptions {
            dry_run: true,
            shadow: true,
        };
        let bytes = test_log();

        let stats = replay(&bytes, DEV_SIZE, &root, &opts).unwrap();
        assert_eq!(stats.dirs_created, 1);
        assert_eq!(stats.files_created, 1);
        assert!(!root.join("d1").exists());

        fs::remove_dir_all(&root).unwrap();
    }
}
