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

//! Errors returned by the control plane.

use std::fmt;
use std::io;
use std::result;

/// An error raised by a famfs operation.
#[derive(Debug)]
pub enum Error {
    /// The superblock is missing, damaged, or geometrically impossible.
    BadSuperblock(&'static str),
    /// The log has no free slot left.
    LogFull,
    /// The log header or an entry is damaged.
    LogCorrupt(&'static str),
    /// Several files claim the same allocation units.
    AllocCollision(u64),
    /// No contiguous free range is large enough.
    OutOfSpace,
    /// The file or path is not backed by a famfs mount.
    NotFamfs,
    /// No famfs mount exists for the device.
    NotMounted,
    /// The device backs an active mount and cannot be accessed raw.
    Busy,
    /// A logged path must be relative to the mount point.
    PathNotRelative,
    /// The path does not resolve to a location inside the mount.
    PathNotInMount,
    /// The path is not a DAX character or block device.
    NotDax,
    /// sysfs does not expose the size of the device.
    Sysfs,
    /// The kernel rejected an ioctl.
    Ioctl(io::Error),
    Io(io::Error),
    InvalidArg(&'static str),
}

pub type Result<T> = result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSuperblock(msg) => write!(fmt, "bad superblock: {msg}"),
            Self::LogFull => write!(fmt, "log is full"),
            Self::LogCorrupt(msg) => write!(fmt, "corrupt log: {msg}"),
            Self::AllocCollision(n) => write!(fmt, "allocation bitmap has {n} collision(s)"),
            Self::OutOfSpace => write!(fmt, "out of space"),
            Self::NotFamfs => write!(fmt, "not a famfs file"),
            Self::NotMounted => write!(fmt, "filesystem is not mounted"),
            Self::Busy => write!(fmt, "device is busy"),
            Self::PathNotRelative => write!(fmt, "path is not relative"),
            Self::PathNotInMount => write!(fmt, "path is outside the mount point"),
            Self::NotDax => write!(fmt, "not a DAX device"),
            Self::Sysfs => write!(fmt, "device size not available through sysfs"),
            Self::Ioctl(e) => write!(fmt, "ioctl failed: {e}"),
            Self::Io(e) => write!(fmt, "{e}"),
            Self::InvalidArg(msg) => write!(fmt, "{msg}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
