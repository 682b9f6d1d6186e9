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

//! Discovery of famfs mounts, from interior paths and from devices.

use crate::err::{Error, Result};
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

/// Name of the metadata directory at the root of every mount.
pub const META_DIR: &str = ".meta";
/// Name of the superblock meta file.
pub const META_SUPERBLOCK: &str = ".superblock";
/// Name of the log meta file.
pub const META_LOG: &str = ".log";

/// A meta file resolved from a path inside a mount.
pub struct MetaFile {
    /// Root of the mount owning the meta file.
    pub mount_point: PathBuf,
    /// The opened meta file.
    pub file: File,
    /// Its size in bytes.
    pub size: u64,
}

/// Walks upward from `path` until a directory holding `.meta/<name>` as a
/// regular file is found, then opens that file.
///
/// This is the only mechanism by which the library discovers which famfs
/// instance a path belongs to.
pub fn find_meta(path: &Path, name: &str, writable: bool) -> Result<MetaFile> {
    let start = fs::canonicalize(path).map_err(|_| Error::NotFamfs)?;
    let mut cur = start.as_path();
    if !cur.is_dir() {
        cur = cur.parent().ok_or(Error::NotFamfs)?;
    }
    loop {
        let candidate = cur.join(META_DIR).join(name);
        if candidate.is_file() {
            let file = OpenOptions::new()
                .read(true)
                .write(writable)
                .open(&candidate)?;
            let size = file.metadata()?.len();
            return Ok(MetaFile {
                mount_point: cur.to_path_buf(),
                file,
                size,
            });
        }
        cur = cur.parent().ok_or(Error::NotFamfs)?;
    }
}

/// A famfs line of the mount table.
#[derive(Debug, PartialEq, Eq)]
pub struct MountEntry {
    /// Device column.
    pub device: String,
    /// Mount point column.
    pub mount_point: PathBuf,
}

/// Lists the famfs entries of `/proc/mounts`.
pub fn famfs_mounts() -> Result<Vec<MountEntry>> {
    let content = fs::read_to_string("/proc/mounts")?;
    Ok(parse_mounts(&content))
}

fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let device = columns.next()?;
            let mount_point = columns.next()?;
            let fstype = columns.next()?;
            (fstype == "famfs").then(|| MountEntry {
                device: device.to_string(),
                mount_point: PathBuf::from(mount_point),
            })
        })
        .collect()
}

/// Returns the mount point of the famfs instance backed by `device`.
pub fn mount_of_device(device: &Path) -> Result<PathBuf> {
    let device = fs::canonicalize(device).unwrap_or_else(|_| device.to_path_buf());
    famfs_mounts()?
        .into_iter()
        .find(|entry| Path::new(&entry.device) == device)
        .map(|entry| entry.mount_point)
        .ok_or(Error::NotMounted)
}

/// Tells whether `device` currently backs a famfs mount.
pub fn device_is_mounted(device: &Path) -> Result<bool> {
    match mount_of_device(device) {
        Ok(_) => Ok(true),
        Err(Error::NotMounted) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env;
    use std::process;

    #[test]
    fn mount_table_parsing() {
        let content = "\
/dev/sda1 / ext4 rw,relatime 0 0
/dev/dax0.0 /mnt/famfs famfs rw 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/dax1.0 /mnt/other famfs rw 0 0
garbage-line
";
        let entries = parse_mounts(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].device, "/dev/dax0.0");
        assert_eq!(entries[0].mount_point, PathBuf::from("/mnt/famfs"));
        assert_eq!(entries[1].device, "/dev/dax1.0");
    }

    #[test]
    fn meta_resolution() {
        let root = env::temp_dir().join(format!("famfs-mount-test-{}", process::id()));
        let deep = root.join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        fs::create_dir_all(root.join(META_DIR)).unwrap();
        fs::write(root.join(META_DIR).join(META_LOG), [0u8; 64]).unwrap();

        let meta = find_meta(&deep, META_LOG, false).unwrap();
        assert_eq!(meta.mount_point, fs::canonicalize(&root).unwrap());
        assert_eq!(meta.size, 64);

        // the superblock meta file does not exist
        assert!(matches!(
            find_meta(&deep, META_SUPERBLOCK, false),
            Err(Error::NotFamfs)
        ));

        fs::remove_dir_all(&root).unwrap();
    }
}
