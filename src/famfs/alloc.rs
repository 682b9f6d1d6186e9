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

//! Allocation bitmap derived from the log, and the first-fit allocator.
//!
//! There is no persistent free list: the bitmap is rebuilt by scanning the
//! log whenever an allocation is needed, and thrown away afterwards.

use crate::bitmap::Bitmap;
use crate::err::Result;
use crate::log;
use crate::log::LOG_TYPE_FILE_CREATE;
use crate::log::LOG_TYPE_MKDIR;
use crate::sb::FAMFS_ALLOC_UNIT;
use crate::util::ceil_div;

/// Counters produced while scanning the log into a bitmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Number of allocation units claimed by more than one extent.
    pub alloc_errors: u64,
    /// Sum of the declared file sizes.
    pub size_total: u64,
    /// Bytes claimed on the device, each allocation unit counted once.
    pub alloc_total: u64,
    /// Number of allocation units covered by the bitmap.
    pub bitmap_size: u64,
    /// Number of entries with a reserved or unknown kind.
    pub invalid_entries: u64,
}

impl AllocStats {
    /// Ratio of allocated bytes to declared bytes.
    pub fn space_amplification(&self) -> f64 {
        if self.size_total == 0 {
            0.0
        } else {
            self.alloc_total as f64 / self.size_total as f64
        }
    }
}

/// Scans the log and produces the allocation bitmap of the device.
///
/// Bit `i` covers the allocation unit at byte offset `i * FAMFS_ALLOC_UNIT`.
/// The metadata prefix (superblock region plus log region) never appears in
/// the log and is marked allocated up front, so bit 0 is always set. Only
/// whole allocation units inside the device are covered: a trailing partial
/// unit is not allocatable.
///
/// The result is a pure function of the log contents and the device size.
pub fn build_bitmap(log_bytes: &[u8], log_offset: u64, dev_size: u64) -> Result<(Bitmap, AllocStats)> {
    let nbits = dev_size / FAMFS_ALLOC_UNIT;
    let mut bitmap = Bitmap::new(nbits);
    let mut stats = AllocStats {
        bitmap_size: nbits,
        ..Default::default()
    };
    let reserved = ceil_div(log_offset + log_bytes.len() as u64, FAMFS_ALLOC_UNIT);
    for au in 0..reserved.min(nbits) {
        bitmap.set(au);
    }
    for entry in log::entries(log_bytes)? {
        let kind = entry.kind;
        match kind {
            // directories consume no space
            LOG_TYPE_MKDIR => {}
            LOG_TYPE_FILE_CREATE => {
                let fsize = entry.fsize;
                stats.size_total += fsize;
                for extent in entry.extents() {
                    let offset = extent.offset;
                    let len = extent.len;
                    let first_au = offset / FAMFS_ALLOC_UNIT;
                    let n_au = ceil_div(len, FAMFS_ALLOC_UNIT);
                    for i in 0..n_au {
                        let au = first_au.saturating_add(i);
                        if au >= nbits {
                            // everything past the device is damage
                            stats.alloc_errors += n_au - i;
                            break;
                        }
                        if bitmap.test_and_set(au) {
                            stats.alloc_errors += 1;
                        } else {
                            stats.alloc_total += FAMFS_ALLOC_UNIT;
                        }
                    }
                }
            }
            _ => stats.invalid_entries += 1,
        }
    }
    Ok((bitmap, stats))
}

/// First-fit contiguous allocation of `size` bytes over `bitmap`.
///
/// Rounds `size` up to whole allocation units and scans for the lowest run
/// of clear bits able to hold it. On success the run is marked allocated and
/// its device byte offset is returned; the offset is never 0, since the
/// metadata prefix is always marked. Returns `None` when no run is large
/// enough, leaving the bitmap untouched.
pub fn alloc(bitmap: &mut Bitmap, size: u64) -> Option<u64> {
    if size == 0 {
        return None;
    }
    let n_au = ceil_div(size, FAMFS_ALLOC_UNIT);
    let nbits = bitmap.len();
    let mut i = 0;
    while i + n_au <= nbits {
        match (i..i + n_au).find(|au| bitmap.test(*au)) {
            // resume past the allocated unit that broke the run
            Some(taken) => i = taken + 1,
            None => {
                for au in i..i + n_au {
                    bitmap.set(au);
                }
                return Some(i * FAMFS_ALLOC_UNIT);
            }
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::log::Extent;
    use crate::log::LOG_ENTRY_SIZE;
    use crate::log::LOG_HEADER_SIZE;
    use crate::log::LOG_TYPE_ACCESS;
    use crate::log::LogEntry;
    use crate::sb::FAMFS_ALLOC_UNIT as AU;

    // an empty log with 16 slots, standing at device offset AU
    fn empty_log() -> Vec<u8> {
        let mut bytes = vec![0u8; LOG_HEADER_SIZE + 16 * LOG_ENTRY_SIZE];
        log::format(&mut bytes).unwrap();
        bytes
    }

    const LOG_OFFSET: u64 = AU;

    fn file_entry(relpath: &str, fsize: u64, extents: &[Extent]) -> LogEntry {
        LogEntry::file_create(relpath, fsize, 0o644, 0, 0, extents).unwrap()
    }

    #[test]
    fn reserved_prefix_is_marked() {
        let bytes = empty_log();
        // header + 16 slots is under one AU, so the prefix spans two AUs
        let (bitmap, stats) = build_bitmap(&bytes, LOG_OFFSET, 16 * AU).unwrap();
        assert_eq!(stats.bitmap_size, 16);
        assert!(bitmap.test(0));
        assert!(bitmap.test(1));
        assert!(!bitmap.test(2));
        assert_eq!(stats.alloc_errors, 0);
        assert_eq!(stats.alloc_total, 0);
        assert_eq!(stats.size_total, 0);
    }

    #[test]
    fn counters_and_amplification() {
        let mut bytes = empty_log();
        let e1 = file_entry(
            "f1",
            4096,
            &[Extent {
                offset: 3 * AU,
                len: AU,
            }],
        );
        let e2 = file_entry(
            "f2",
            2 * AU,
            &[Extent {
                offset: 5 * AU,
                len: 2 * AU,
            }],
        );
        log::append(&mut bytes, &e1).unwrap();
        log::append(&mut bytes, &e2).unwrap();

        let (bitmap, stats) = build_bitmap(&bytes, LOG_OFFSET, 16 * AU).unwrap();
        assert!(bitmap.test(3));
        assert!(!bitmap.test(4));
        assert!(bitmap.test(5));
        assert!(bitmap.test(6));
        assert_eq!(stats.alloc_errors, 0);
        assert_eq!(stats.size_total, 4096 + 2 * AU);
        assert_eq!(stats.alloc_total, 3 * AU);
        let amp = stats.space_amplification();
        assert!(amp > 1.0);
    }

    #[test]
    fn detects_collisions() {
        let mut bytes = empty_log();
        let e1 = file_entry(
            "f1",
            AU,
            &[Extent {
                offset: 3 * AU,
                len: 2 * AU,
            }],
        );
        // overlaps the previous file by exactly one AU
        let e2 = file_entry(
            "f2",
            AU,
            &[Extent {
                offset: 4 * AU,
                len: AU,
            }],
        );
        log::append(&mut bytes, &e1).unwrap();
        log::append(&mut bytes, &e2).unwrap();

        let (_, stats) = build_bitmap(&bytes, LOG_OFFSET, 16 * AU).unwrap();
        assert_eq!(stats.alloc_errors, 1);
        assert_eq!(stats.alloc_total, 2 * AU);
    }

    #[test]
    fn skips_directories_and_counts_invalid_kinds() {
        let mut bytes = empty_log();
        log::append(&mut bytes, &LogEntry::mkdir("d", 0o755, 0, 0).unwrap()).unwrap();
        let mut access = LogEntry::mkdir("d2", 0o755, 0, 0).unwrap();
        access.kind = LOG_TYPE_ACCESS;
        log::append(&mut bytes, &access).unwrap();

        let (_, stats) = build_bitmap(&bytes, LOG_OFFSET, 16 * AU).unwrap();
        assert_eq!(stats.alloc_total, 0);
        assert_eq!(stats.invalid_entries, 1);
        assert_eq!(stats.alloc_errors, 0);
    }

    #[test]
    fn build_is_deterministic() {
        let mut bytes = empty_log();
        let entry = file_entry(
            "f",
            AU,
            &[Extent {
                offset: 7 * AU,
                len: AU,
            }],
        );
        log::append(&mut bytes, &entry).unwrap();
        let (bitmap_a, stats_a) = build_bitmap(&bytes, LOG_OFFSET, 16 * AU).unwrap();
        let (bitmap_b, stats_b) = build_bitmap(&bytes, LOG_OFFSET, 16 * AU).unwrap();
        assert_eq!(bitmap_a, bitmap_b);
        assert_eq!(stats_a, stats_b);
    }

    #[test]
    fn first_fit() {
        let mut bitmap = Bitmap::new(10);
        for au in 0..3 {
            bitmap.set(au);
        }
        assert_eq!(alloc(&mut bitmap, AU), Some(3 * AU));
        assert_eq!(alloc(&mut bitmap, 2 * AU), Some(4 * AU));
        // sub-unit requests round up to one AU
        assert_eq!(alloc(&mut bitmap, 1), Some(6 * AU));
    }

    #[test]
    fn first_fit_skips_holes_too_small() {
        let mut bitmap = Bitmap::new(10);
        for au in [0, 2, 5] {
            bitmap.set(au);
        }
        // the hole at bit 1 cannot hold two AUs
        assert_eq!(alloc(&mut bitmap, 2 * AU), Some(3 * AU));
    }

    #[test]
    fn exhaustion_leaves_bitmap_unchanged() {
        let mut bitmap = Bitmap::new(4);
        bitmap.set(1);
        let before = bitmap.clone();
        assert_eq!(alloc(&mut bitmap, 3 * AU), None);
        assert_eq!(bitmap, before);
    }
}
