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

//! Codec for the append-only metadata log.
//!
//! The log is the sole source of truth for the namespace: a fixed-stride
//! array of records preceded by a small header, living in a fixed region of
//! the device. Appending is a single record copy followed by a header
//! update; replaying the records in order rebuilds the filesystem.

use crate::err::{Error, Result};
use crate::sb::FAMFS_ALLOC_UNIT;
use crate::util::fixed_str;
use crate::util::read_struct;
use crate::util::reinterpret;
use std::mem::size_of;

/// The log header's magic number.
pub const FAMFS_LOG_MAGIC: u64 = 0x0bad_cafe_f00d_1095;
/// Maximum length of a logged relative path, NUL included.
pub const FAMFS_RELPATH_MAX: usize = 80;
/// Maximum number of extents on a single file.
pub const FAMFS_MAX_EXTENTS: usize = 8;
/// Byte size of the log header.
pub const LOG_HEADER_SIZE: usize = 32;
/// Byte stride of a log entry slot.
pub const LOG_ENTRY_SIZE: usize = 256;

/// Log entry kind: file creation.
pub const LOG_TYPE_FILE_CREATE: u32 = 1;
/// Log entry kind: directory creation.
pub const LOG_TYPE_MKDIR: u32 = 2;
/// Log entry kind: reserved, never emitted.
pub const LOG_TYPE_ACCESS: u32 = 3;

/// A contiguous byte range on the primary device.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    /// Byte offset on the device.
    pub offset: u64,
    /// Byte length.
    pub len: u64,
}

/// The log region header.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct LogHeader {
    /// Magic number.
    pub magic: u64,
    /// Highest valid slot index.
    pub last_index: u64,
    /// Index of the next free slot. Monotonic, never decreases.
    pub next_index: u64,
    /// Sequence number stamped on the next appended entry. Monotonic.
    pub next_seqnum: u64,
}

/// A log entry slot.
///
/// One flat record serves every kind; `MKDIR` leaves the file-only fields
/// zero. `ACCESS` is reserved and carries no defined payload.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct LogEntry {
    /// Sequence number, stamped at append time.
    pub seqnum: u64,
    /// Entry kind.
    pub kind: u32,
    _pad: u32,
    /// Path relative to the mount point, NUL-terminated.
    pub relpath: [u8; FAMFS_RELPATH_MAX],
    /// Declared file size in bytes.
    pub fsize: u64,
    /// Permission bits.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Reserved flag bits.
    pub flags: u32,
    /// Number of valid entries in `extents`.
    pub nextents: u32,
    _pad2: u32,
    /// Device ranges backing the file.
    pub extents: [Extent; FAMFS_MAX_EXTENTS],
}

const _: () = assert!(size_of::<LogHeader>() == LOG_HEADER_SIZE);
const _: () = assert!(size_of::<LogEntry>() == LOG_ENTRY_SIZE);

/// Returns the number of entry slots in a log region of `log_len` bytes.
pub const fn log_capacity(log_len: u64) -> u64 {
    (log_len - LOG_HEADER_SIZE as u64) / LOG_ENTRY_SIZE as u64
}

impl LogEntry {
    fn with_relpath(kind: u32, relpath: &str, mode: u32, uid: u32, gid: u32) -> Result<Self> {
        if relpath.starts_with('/') {
            return Err(Error::PathNotRelative);
        }
        if relpath.is_empty() || relpath.len() >= FAMFS_RELPATH_MAX {
            return Err(Error::InvalidArg("bad path length"));
        }
        let mut entry = Self {
            seqnum: 0,
            kind,
            _pad: 0,
            relpath: [0; FAMFS_RELPATH_MAX],
            fsize: 0,
            mode,
            uid,
            gid,
            flags: 0,
            nextents: 0,
            _pad2: 0,
            extents: [Extent { offset: 0, len: 0 }; FAMFS_MAX_EXTENTS],
        };
        entry.relpath[..relpath.len()].copy_from_slice(relpath.as_bytes());
        Ok(entry)
    }

    /// Builds a `FILE_CREATE` entry. The sequence number is stamped on
    /// append.
    pub fn file_create(
        relpath: &str,
        fsize: u64,
        mode: u32,
        uid: u32,
        gid: u32,
        extents: &[Extent],
    ) -> Result<Self> {
        if extents.is_empty() || extents.len() > FAMFS_MAX_EXTENTS {
            return Err(Error::InvalidArg("bad extent count"));
        }
        let mut entry = Self::with_relpath(LOG_TYPE_FILE_CREATE, relpath, mode, uid, gid)?;
        entry.fsize = fsize;
        entry.nextents = extents.len() as u32;
        entry.extents[..extents.len()].copy_from_slice(extents);
        Ok(entry)
    }

    /// Builds a `MKDIR` entry.
    pub fn mkdir(relpath: &str, mode: u32, uid: u32, gid: u32) -> Result<Self> {
        Self::with_relpath(LOG_TYPE_MKDIR, relpath, mode, uid, gid)
    }

    /// Returns the logged relative path.
    pub fn relpath(&self) -> &str {
        fixed_str(&self.relpath)
    }

    /// Returns the valid extents.
    pub fn extents(&self) -> &[Extent] {
        let count = (self.nextents as usize).min(FAMFS_MAX_EXTENTS);
        &self.extents[..count]
    }

    /// Checks the invariants of a `FILE_CREATE` entry against the primary
    /// device size.
    pub fn check_file_create(&self, dev_size: u64) -> Result<()> {
        let kind = self.kind;
        if kind != LOG_TYPE_FILE_CREATE {
            return Err(Error::InvalidArg("not a FILE_CREATE entry"));
        }
        let relpath = self.relpath();
        if relpath.starts_with('/') {
            return Err(Error::PathNotRelative);
        }
        if relpath.is_empty() {
            return Err(Error::LogCorrupt("empty path"));
        }
        let nextents = self.nextents;
        if nextents == 0 || nextents as usize > FAMFS_MAX_EXTENTS {
            return Err(Error::LogCorrupt("bad extent count"));
        }
        let mut backing = 0u64;
        for extent in self.extents() {
            let offset = extent.offset;
            let len = extent.len;
            // offset 0 is the superblock, never user-visible
            if offset == 0 || offset % FAMFS_ALLOC_UNIT != 0 {
                return Err(Error::LogCorrupt("misaligned extent"));
            }
            if len == 0 || offset.checked_add(len).is_none_or(|end| end > dev_size) {
                return Err(Error::LogCorrupt("extent exceeds the device"));
            }
            backing += len;
        }
        let fsize = self.fsize;
        if fsize > backing {
            return Err(Error::LogCorrupt("file size exceeds its extents"));
        }
        Ok(())
    }
}

/// Reads and validates the log header at the beginning of `log`.
pub fn read_header(log: &[u8]) -> Result<LogHeader> {
    let header: LogHeader = read_struct(log).ok_or(Error::LogCorrupt("short region"))?;
    let magic = header.magic;
    if magic != FAMFS_LOG_MAGIC {
        return Err(Error::LogCorrupt("bad magic"));
    }
    let last_index = header.last_index;
    let next_index = header.next_index;
    // all arithmetic on header fields is checked: the region may hold garbage
    let capacity = last_index
        .checked_add(1)
        .ok_or(Error::LogCorrupt("last index out of range"))?;
    if next_index > capacity {
        return Err(Error::LogCorrupt("next index out of range"));
    }
    let slots_end = capacity
        .checked_mul(LOG_ENTRY_SIZE as u64)
        .and_then(|len| len.checked_add(LOG_HEADER_SIZE as u64))
        .ok_or(Error::LogCorrupt("slot array exceeds the region"))?;
    if slots_end > log.len() as u64 {
        return Err(Error::LogCorrupt("slot array exceeds the region"));
    }
    Ok(header)
}

fn write_header(log: &mut [u8], header: &LogHeader) {
    log[..LOG_HEADER_SIZE].copy_from_slice(reinterpret(header));
}

/// Initializes an empty log over the whole of `log`.
pub fn format(log: &mut [u8]) -> Result<()> {
    if log.len() < LOG_HEADER_SIZE + LOG_ENTRY_SIZE {
        return Err(Error::InvalidArg("log region too small"));
    }
    log.fill(0);
    let header = LogHeader {
        magic: FAMFS_LOG_MAGIC,
        last_index: log_capacity(log.len() as u64) - 1,
        next_index: 0,
        next_seqnum: 0,
    };
    write_header(log, &header);
    Ok(())
}

/// Appends `entry` to the log, stamping it with the next sequence number.
///
/// The copy into the slot completes before the header counters move, so a
/// torn append never exposes a partial record. Not re-entrant: the caller is
/// the single write authority for the filesystem and serializes externally.
///
/// Returns the index of the written slot.
pub fn append(log: &mut [u8], entry: &LogEntry) -> Result<u64> {
    let mut header = read_header(log)?;
    let index = header.next_index;
    if index > header.last_index {
        return Err(Error::LogFull);
    }
    let mut entry = *entry;
    entry.seqnum = header.next_seqnum;
    let off = LOG_HEADER_SIZE + index as usize * LOG_ENTRY_SIZE;
    log[off..off + LOG_ENTRY_SIZE].copy_from_slice(reinterpret(&entry));
    header.next_index += 1;
    header.next_seqnum += 1;
    write_header(log, &header);
    Ok(index)
}

/// Returns an iterator over the entries appended to `log`, in append order.
///
/// The sequence is finite and a fresh call restarts it from the first entry.
pub fn entries(log: &[u8]) -> Result<Entries<'_>> {
    let header = read_header(log)?;
    Ok(Entries {
        log,
        index: 0,
        end: header.next_index,
    })
}

/// Usage summary of a log region.
#[derive(Clone, Copy, Debug)]
pub struct LogStats {
    /// Number of appended entries.
    pub used: u64,
    /// Total number of slots.
    pub capacity: u64,
    /// Sequence number of the next append.
    pub next_seqnum: u64,
}

/// Returns the usage summary of `log`.
pub fn stats(log: &[u8]) -> Result<LogStats> {
    let header = read_header(log)?;
    Ok(LogStats {
        used: header.next_index,
        capacity: header.last_index + 1,
        next_seqnum: header.next_seqnum,
    })
}

/// Iterator over appended log entries.
pub struct Entries<'a> {
    log: &'a [u8],
    index: u64,
    end: u64,
}

impl Iterator for Entries<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        if self.index >= self.end {
            return None;
        }
        let off = LOG_HEADER_SIZE + self.index as usize * LOG_ENTRY_SIZE;
        self.index += 1;
        read_struct(&self.log[off..])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // a log region with four entry slots
    fn small_log() -> Vec<u8> {
        let mut log = vec![0xffu8; LOG_HEADER_SIZE + 4 * LOG_ENTRY_SIZE];
        format(&mut log).unwrap();
        log
    }

    #[test]
    fn format_and_stats() {
        let log = small_log();
        let stats = stats(&log).unwrap();
        assert_eq!(stats.used, 0);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.next_seqnum, 0);
        assert_eq!(entries(&log).unwrap().count(), 0);
    }

    #[test]
    fn append_stamps_seqnums() {
        let mut log = small_log();
        let ext = [Extent {
            offset: 5 * FAMFS_ALLOC_UNIT,
            len: FAMFS_ALLOC_UNIT,
        }];
        let file = LogEntry::file_create("a/f", 4096, 0o644, 0, 0, &ext).unwrap();
        let dir = LogEntry::mkdir("a", 0o755, 0, 0).unwrap();
        assert_eq!(append(&mut log, &dir).unwrap(), 0);
        assert_eq!(append(&mut log, &file).unwrap(), 1);

        let all: Vec<LogEntry> = entries(&log).unwrap().collect();
        assert_eq!(all.len(), 2);
        for (i, entry) in all.iter().enumerate() {
            let seqnum = entry.seqnum;
            assert_eq!(seqnum, i as u64);
        }
        let kind = all[0].kind;
        assert_eq!(kind, LOG_TYPE_MKDIR);
        assert_eq!(all[0].relpath(), "a");
        let kind = all[1].kind;
        assert_eq!(kind, LOG_TYPE_FILE_CREATE);
        assert_eq!(all[1].relpath(), "a/f");
        let fsize = all[1].fsize;
        assert_eq!(fsize, 4096);
        assert_eq!(all[1].extents(), &ext);

        // restartable
        assert_eq!(entries(&log).unwrap().count(), 2);
    }

    #[test]
    fn append_on_full_log_is_a_noop() {
        let mut log = small_log();
        let dir = LogEntry::mkdir("d", 0o755, 0, 0).unwrap();
        for _ in 0..4 {
            append(&mut log, &dir).unwrap();
        }
        let before = log.clone();
        assert!(matches!(append(&mut log, &dir), Err(Error::LogFull)));
        assert_eq!(log, before);
        let stats = stats(&log).unwrap();
        assert_eq!(stats.used, 4);
        assert_eq!(stats.next_seqnum, 4);
    }

    #[test]
    fn rejects_bad_header() {
        let mut log = small_log();
        log[0] ^= 0xff;
        assert!(matches!(read_header(&log), Err(Error::LogCorrupt(_))));
        assert!(matches!(
            append(&mut log, &LogEntry::mkdir("d", 0o755, 0, 0).unwrap()),
            Err(Error::LogCorrupt(_))
        ));
    }

    #[test]
    fn entry_path_validation() {
        assert!(matches!(
            LogEntry::mkdir("/abs", 0o755, 0, 0),
            Err(Error::PathNotRelative)
        ));
        assert!(LogEntry::mkdir("", 0o755, 0, 0).is_err());
        let long = "x".repeat(FAMFS_RELPATH_MAX);
        assert!(LogEntry::mkdir(&long, 0o755, 0, 0).is_err());
        let ext = [Extent {
            offset: FAMFS_ALLOC_UNIT,
            len: FAMFS_ALLOC_UNIT,
        }];
        assert!(LogEntry::file_create("f", 1, 0o644, 0, 0, &[]).is_err());
        assert!(LogEntry::file_create("f", 1, 0o644, 0, 0, &ext).is_ok());
    }

    #[test]
    fn file_create_invariants() {
        let dev_size = 16 * FAMFS_ALLOC_UNIT;
        let ok = LogEntry::file_create(
            "f",
            4096,
            0o644,
            0,
            0,
            &[Extent {
                offset: 5 * FAMFS_ALLOC_UNIT,
                len: FAMFS_ALLOC_UNIT,
            }],
        )
        .unwrap();
        assert!(ok.check_file_create(dev_size).is_ok());

        // offset 0 is the superblock
        let zero = LogEntry::file_create(
            "f",
            4096,
            0o644,
            0,
            0,
            &[Extent {
                offset: 0,
                len: FAMFS_ALLOC_UNIT,
            }],
        )
        .unwrap();
        assert!(zero.check_file_create(dev_size).is_err());

        let misaligned = LogEntry::file_create(
            "f",
            4096,
            0o644,
            0,
            0,
            &[Extent {
                offset: FAMFS_ALLOC_UNIT + 1,
                len: FAMFS_ALLOC_UNIT,
            }],
        )
        .unwrap();
        assert!(misaligned.check_file_create(dev_size).is_err());

        let beyond = LogEntry::file_create(
            "f",
            4096,
            0o644,
            0,
            0,
            &[Extent {
                offset: 15 * FAMFS_ALLOC_UNIT,
                len: 2 * FAMFS_ALLOC_UNIT,
            }],
        )
        .unwrap();
        assert!(beyond.check_file_create(dev_size).is_err());

        let oversized = LogEntry::file_create(
            "f",
            3 * FAMFS_ALLOC_UNIT,
            0o644,
            0,
            0,
            &[Extent {
                offset: 5 * FAMFS_ALLOC_UNIT,
                len: FAMFS_ALLOC_UNIT,
            }],
        )
        .unwrap();
        assert!(oversized.check_file_create(dev_size).is_err());
    }
}
