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

//! Shared memory mappings over the on-media metadata.

use crate::err::{Error, Result};
use crate::sb::{FAMFS_LOG_LEN, FAMFS_LOG_OFFSET};
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr::null_mut;
use std::slice;

/// A shared mapping of a metadata region.
///
/// The mapping is `MAP_SHARED`: several readers may hold one concurrently,
/// and stores made through a writable mapping reach the device directly. It
/// is released when the value is dropped.
pub struct Mapping {
    addr: *mut libc::c_void,
    len: usize,
    writable: bool,
}

impl Mapping {
    /// Maps `len` bytes of `file` at offset 0.
    pub fn of_file(file: &File, len: usize, writable: bool) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidArg("cannot map an empty region"));
        }
        let prot = if writable {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ
        };
        let addr = unsafe {
            libc::mmap(
                null_mut(),
                len,
                prot,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(Self {
            addr,
            len,
            writable,
        })
    }

    /// Maps the fixed superblock+log prefix of the raw device at `path`.
    ///
    /// Only valid while no famfs mount uses the device: mounted filesystems
    /// are reached through their meta files instead.
    pub fn device_prefix(path: &Path, writable: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)?;
        Self::of_file(&file, (FAMFS_LOG_OFFSET + FAMFS_LOG_LEN) as usize, writable)
    }

    /// Returns the mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Tells whether the mapping is empty. It never is.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the mapped bytes.
    pub fn bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.addr as *const u8, self.len) }
    }

    /// Returns the mapped bytes, mutable.
    ///
    /// Panics if the mapping was created read-only: that is a programming
    /// error, not a user error.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        assert!(self.writable, "write access to a read-only mapping");
        unsafe { slice::from_raw_parts_mut(self.addr as *mut u8, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.addr, self.len);
        }
    }
}
