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

//! Control plane of the famfs shared-memory filesystem.
//!
//! famfs exposes files on a DAX device that several hosts map at once. The
//! kernel driver provides the VFS surface; this library owns the on-media
//! metadata: the superblock, the append-only log the namespace is replayed
//! from, the allocation bitmap derived from that log, and the ioctls that
//! bind kernel files to device extents.
//!
//! The library keeps no global state. Every operation starts from a path or
//! device argument, resolves the mount and its metadata mappings, and
//! releases them before returning.

use std::fmt;
use std::process::exit;

pub mod alloc;
pub mod bitmap;
pub mod dev;
pub mod err;
pub mod ioctl;
pub mod log;
pub mod mmap;
pub mod mount;
pub mod ops;
pub mod replay;
pub mod sb;
pub mod util;

pub use err::Error;
pub use err::Result;

/// Writes an error to stderr, then exits.
pub fn error<M: fmt::Display>(cmd: &str, msg: M) -> ! {
    eprintln!("famfs {cmd}: error: {msg}");
    exit(1);
}
