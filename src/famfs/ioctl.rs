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

//! The kernel ioctl surface binding files to device extents.

use crate::err::{Error, Result};
use crate::log::Extent;
use std::ffi::c_long;
use std::io;
use std::mem::size_of;
use std::os::fd::AsRawFd;

/// ioctl macro: Command.
macro_rules! ioc {
    ($a:expr, $b:expr, $c:expr, $d:expr) => {
        (($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
    };
}

/// ioctl macro: Write command.
macro_rules! iow {
    ($a:expr, $b:expr, $c:ty) => {
        ioc!(1, $a, $b, size_of::<$c>() as c_long)
    };
}

/// The famfs ioctl magic.
const FAMFS_IOC_MAGIC: c_long = 0xfa;

/// ioctl command: no-op, succeeds only on a famfs file.
const FAMFSIOC_NOP: c_long = ioc!(0, FAMFS_IOC_MAGIC, 1, 0);
/// ioctl command: bind a list of extents to a file.
const FAMFSIOC_MAP_CREATE: c_long = iow!(FAMFS_IOC_MAGIC, 2, IocMap);

/// Extent kind understood by the kernel. Only DAX extents exist in this
/// version.
const FAMFS_EXTENT_FSDAX: u32 = 1;

/// The kind of file being bound.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    /// A user file.
    Reg = 0,
    /// The `.meta/.superblock` file.
    Superblock = 1,
    /// The `.meta/.log` file.
    Log = 2,
}

/// An extent handed to the kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct IocExtent {
    /// Byte offset on the device.
    pub offset: u64,
    /// Byte length.
    pub len: u64,
}

impl From<Extent> for IocExtent {
    fn from(extent: Extent) -> Self {
        Self {
            offset: extent.offset,
            len: extent.len,
        }
    }
}

/// Payload of `FAMFSIOC_MAP_CREATE`.
#[repr(C)]
struct IocMap {
    extent_type: u32,
    file_type: u32,
    file_size: u64,
    ext_list_count: u64,
    ext_list: *const IocExtent,
}

/// Tells whether `file` lives on a famfs mount.
pub fn is_famfs<F: AsRawFd>(file: &F) -> bool {
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), FAMFSIOC_NOP as _, 0) };
    ret == 0
}

/// Fails with [`Error::NotFamfs`] unless `file` lives on a famfs mount.
///
/// Guards every mutating operation against being pointed at an ordinary
/// filesystem.
pub fn check_famfs<F: AsRawFd>(file: &F) -> Result<()> {
    if is_famfs(file) { Ok(()) } else { Err(Error::NotFamfs) }
}

/// Binds `extents` to `file` and freezes its size to `file_size`.
///
/// Irreversible: this is the only way a famfs file becomes readable, and a
/// bound file can never be re-bound.
pub fn map_create<F: AsRawFd>(
    file: &F,
    file_type: FileType,
    file_size: u64,
    extents: &[IocExtent],
) -> Result<()> {
    if extents.is_empty() {
        return Err(Error::InvalidArg("empty extent list"));
    }
    let arg = IocMap {
        extent_type: FAMFS_EXTENT_FSDAX,
        file_type: file_type as u32,
        file_size,
        ext_list_count: extents.len() as u64,
        ext_list: extents.as_ptr(),
    };
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), FAMFSIOC_MAP_CREATE as _, &arg) };
    if ret < 0 {
        return Err(Error::Ioctl(io::Error::last_os_error()));
    }
    Ok(())
}
