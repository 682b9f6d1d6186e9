//! This module implements utility functions.

use crate::err::{Error, Result};
use std::ffi::CString;
use std::fmt;
use std::fs::File;
use std::io;
use std::mem::size_of;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::slice;
use std::str;

/// Integer division, rounding up.
pub const fn ceil_div(a: u64, b: u64) -> u64 {
    a.div_ceil(b)
}

/// Performs the log2 operation on the given integer.
///
/// If the result is undefined, the function returns None.
pub fn log2(n: u64) -> Option<u64> {
    let num_bits = (size_of::<u64>() * 8) as u64;

    let n = num_bits - n.leading_zeros() as u64;
    if n > 0 { Some(n - 1) } else { None }
}

/// Reinterprets the given reference as a byte slice.
pub fn reinterpret<T>(val: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(val as *const _ as *const u8, size_of::<T>()) }
}

/// Reads a `T` from the beginning of `bytes`.
///
/// Returns `None` if the slice is too short.
pub fn read_struct<T: Copy>(bytes: &[u8]) -> Option<T> {
    if bytes.len() < size_of::<T>() {
        return None;
    }
    Some(unsafe { ptr::read_unaligned(bytes.as_ptr() as *const T) })
}

/// Returns the string stored in a NUL-terminated fixed-size buffer.
pub fn fixed_str(buf: &[u8]) -> &str {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    str::from_utf8(&buf[..end]).unwrap_or("?")
}

/// Changes the owner of the file at `path`.
pub fn chown(path: &Path, uid: u32, gid: u32) -> Result<()> {
    let path_c = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Error::InvalidArg("path contains a NUL byte"))?;
    let ret = unsafe { libc::chown(path_c.as_ptr(), uid, gid) };
    if ret < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(())
}

/// Changes the owner of the open file `file`.
pub fn fchown(file: &File, uid: u32, gid: u32) -> Result<()> {
    let ret = unsafe { libc::fchown(file.as_raw_fd(), uid, gid) };
    if ret < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(())
}

/// Deterministic stream of pseudo-random words, used to fill and verify file
/// payloads from a seed.
pub struct Pattern(u64);

impl Pattern {
    /// Creates a generator for the given seed.
    pub fn new(seed: u64) -> Self {
        // xorshift must not start from zero
        Self(if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed })
    }

    /// Returns the next word of the stream.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Fills `buf` with the stream.
    pub fn fill(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(8) {
            let word = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}

/// Structure representing a number of bytes.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut order = log2(self.0).unwrap_or(0) / log2(1024).unwrap();

        let suffix = match order {
            0 => "bytes",
            1 => "KiB",
            2 => "MiB",
            3 => "GiB",
            4 => "TiB",
            5 => "PiB",
            6 => "EiB",
            7 => "ZiB",
            8 => "YiB",

            _ => {
                order = 0;
                "bytes"
            }
        };

        let unit = 1024usize.pow(order as u32);
        let nbr = self.0 / unit as u64;

        write!(fmt, "{} {}", nbr, suffix)
    }
}
