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

//! The on-media superblock.

use crate::err::{Error, Result};
use crate::util::ByteSize;
use crate::util::fixed_str;
use crate::util::read_struct;
use crate::util::reinterpret;
use std::fmt;
use std::mem::size_of;
use uuid::Uuid;

/// Allocation unit: the granularity of every extent offset and length.
pub const FAMFS_ALLOC_UNIT: u64 = 0x20_0000;
/// The superblock's magic number.
pub const FAMFS_SUPER_MAGIC: u64 = 0x87b2_82ff_2f5a_a5f2;
/// The on-media format version.
pub const FAMFS_VERSION: u32 = 1;
/// Byte offset of the log region. The superblock owns everything before it.
pub const FAMFS_LOG_OFFSET: u64 = 0x20_0000;
/// Byte length of the log region.
pub const FAMFS_LOG_LEN: u64 = 0x80_0000;
/// Maximum number of backing devices in the superblock table.
pub const FAMFS_MAX_DEVICES: usize = 8;
/// Maximum length of a device path in the superblock table, NUL included.
pub const FAMFS_DEVNAME_MAX: usize = 64;

/// A backing device entry of the superblock table.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DeviceDesc {
    /// The device path, NUL-terminated.
    pub path: [u8; FAMFS_DEVNAME_MAX],
    /// The size of the device in bytes.
    pub size: u64,
}

impl DeviceDesc {
    /// Returns the device path.
    pub fn path_str(&self) -> &str {
        fixed_str(&self.path)
    }
}

/// The on-media superblock, stored at offset 0 of the primary device.
///
/// The structure is written to device memory as-is: fixed layout, no
/// compiler padding, little-endian host assumed.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Superblock {
    /// Magic number.
    pub magic: u64,
    /// Format version.
    pub version: u32,
    /// CRC over the superblock. Reserved, always zero.
    pub crc: u32,
    /// Filesystem identity.
    pub uuid: [u8; 16],
    /// Byte offset of the log region.
    pub log_offset: u64,
    /// Byte length of the log region.
    pub log_len: u64,
    /// Number of valid entries in `devices`.
    pub num_devices: u32,
    _pad: u32,
    _reserved: [u8; 8],
    /// Backing devices. Only the first `num_devices` entries are valid.
    pub devices: [DeviceDesc; FAMFS_MAX_DEVICES],
}

const _: () = assert!(size_of::<DeviceDesc>() == 72);
const _: () = assert!(size_of::<Superblock>() == 640);
const _: () = assert!(size_of::<Superblock>() as u64 <= FAMFS_LOG_OFFSET);

impl Superblock {
    /// Builds a fresh superblock for a single device of `dev_size` bytes.
    pub fn new(dev_path: &str, dev_size: u64) -> Result<Self> {
        if dev_path.is_empty() || dev_path.len() >= FAMFS_DEVNAME_MAX {
            return Err(Error::InvalidArg("bad device path length"));
        }
        if dev_size < FAMFS_LOG_OFFSET + FAMFS_LOG_LEN + FAMFS_ALLOC_UNIT {
            return Err(Error::InvalidArg("device too small"));
        }
        let mut devices = [DeviceDesc {
            path: [0; FAMFS_DEVNAME_MAX],
            size: 0,
        }; FAMFS_MAX_DEVICES];
        devices[0].path[..dev_path.len()].copy_from_slice(dev_path.as_bytes());
        devices[0].size = dev_size;
        Ok(Self {
            magic: FAMFS_SUPER_MAGIC,
            version: FAMFS_VERSION,
            crc: 0,
            uuid: *Uuid::new_v4().as_bytes(),
            log_offset: FAMFS_LOG_OFFSET,
            log_len: FAMFS_LOG_LEN,
            num_devices: 1,
            _pad: 0,
            _reserved: [0; 8],
            devices,
        })
    }

    /// Reads and validates the superblock at the beginning of `bytes`.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        let sb: Self = read_struct(bytes).ok_or(Error::BadSuperblock("short region"))?;
        sb.validate()?;
        Ok(sb)
    }

    /// Probes `bytes` for a superblock without failing on garbage.
    pub fn is_present(bytes: &[u8]) -> bool {
        read_struct::<Self>(bytes).is_some_and(|sb| {
            let magic = sb.magic;
            magic == FAMFS_SUPER_MAGIC
        })
    }

    /// Checks the magic and the structural sanity of the superblock.
    pub fn validate(&self) -> Result<()> {
        let magic = self.magic;
        if magic != FAMFS_SUPER_MAGIC {
            return Err(Error::BadSuperblock("bad magic"));
        }
        let log_offset = self.log_offset;
        let log_len = self.log_len;
        if log_offset == 0
            || log_offset % FAMFS_ALLOC_UNIT != 0
            || log_len == 0
            || log_len % FAMFS_ALLOC_UNIT != 0
        {
            return Err(Error::BadSuperblock("misaligned log region"));
        }
        let num_devices = self.num_devices;
        if num_devices == 0 || num_devices as usize > FAMFS_MAX_DEVICES {
            return Err(Error::BadSuperblock("bad device count"));
        }
        if self.primary_size() < log_offset + log_len {
            return Err(Error::BadSuperblock("log region exceeds the device"));
        }
        Ok(())
    }

    /// Writes the superblock to the beginning of `bytes`.
    pub fn write_to(&self, bytes: &mut [u8]) -> Result<()> {
        let raw = reinterpret(self);
        if bytes.len() < raw.len() {
            return Err(Error::BadSuperblock("region too small"));
        }
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(())
    }

    /// Returns the size in bytes of the primary device.
    pub fn primary_size(&self) -> u64 {
        self.devices[0].size
    }
}

impl fmt::Display for Superblock {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magic = self.magic;
        let version = self.version;
        let log_offset = self.log_offset;
        let log_len = self.log_len;
        let num_devices = self.num_devices;
        writeln!(fmt, "superblock:")?;
        writeln!(fmt, "  magic:      {magic:#x}")?;
        writeln!(fmt, "  version:    {version}")?;
        writeln!(fmt, "  uuid:       {}", Uuid::from_bytes(self.uuid))?;
        writeln!(fmt, "  log offset: {log_offset:#x}")?;
        writeln!(fmt, "  log length: {log_len:#x} ({})", ByteSize(log_len))?;
        writeln!(fmt, "  devices:    {num_devices}")?;
        for dev in &self.devices[..num_devices as usize] {
            let size = dev.size;
            writeln!(
                fmt,
                "    {}: {size} bytes ({})",
                dev.path_str(),
                ByteSize(size)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let sb = Superblock::new("/dev/dax0.0", 64 * FAMFS_ALLOC_UNIT).unwrap();
        let mut region = vec![0u8; 4096];
        sb.write_to(&mut region).unwrap();
        assert!(Superblock::is_present(&region));
        let back = Superblock::read_from(&region).unwrap();
        let (magic, version) = (back.magic, back.version);
        assert_eq!(magic, FAMFS_SUPER_MAGIC);
        assert_eq!(version, FAMFS_VERSION);
        let (log_offset, log_len) = (back.log_offset, back.log_len);
        assert_eq!(log_offset, FAMFS_LOG_OFFSET);
        assert_eq!(log_len, FAMFS_LOG_LEN);
        assert_eq!(back.primary_size(), 64 * FAMFS_ALLOC_UNIT);
        assert_eq!(back.devices[0].path_str(), "/dev/dax0.0");
        let (a, b) = (sb.uuid, back.uuid);
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_garbage() {
        let region = vec![0u8; 4096];
        assert!(!Superblock::is_present(&region));
        assert!(matches!(
            Superblock::read_from(&region),
            Err(Error::BadSuperblock(_))
        ));
        assert!(matches!(
            Superblock::read_from(&region[..10]),
            Err(Error::BadSuperblock(_))
        ));
    }

    #[test]
    fn rejects_bad_geometry() {
        // too small to hold the metadata prefix plus one allocation unit
        assert!(Superblock::new("/dev/dax0.0", FAMFS_LOG_OFFSET + FAMFS_LOG_LEN).is_err());

        let mut sb = Superblock::new("/dev/dax0.0", 64 * FAMFS_ALLOC_UNIT).unwrap();
        sb.devices[0].size = FAMFS_ALLOC_UNIT;
        assert!(matches!(sb.validate(), Err(Error::BadSuperblock(_))));
    }
}
