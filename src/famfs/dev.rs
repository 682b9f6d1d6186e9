//! Resolves a DAX device file to its byte capacity through sysfs.

use crate::err::{Error, Result};
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Returns the size in bytes of the character or block device at `path`.
///
/// Block devices export their size in 512-byte sectors under
/// `/sys/class/block/<name>/size`; character devices export it in bytes under
/// `/sys/dev/char/<major>:<minor>/size`. Nothing else about the file is
/// inspected.
pub fn device_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path)?;
    let file_type = metadata.file_type();
    if file_type.is_block_device() {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(Error::NotDax)?;
        let sectors = read_sysfs_size(&format!("/sys/class/block/{name}/size"))?;
        Ok(sectors * 512)
    } else if file_type.is_char_device() {
        let rdev = metadata.rdev();
        let major = libc::major(rdev);
        let minor = libc::minor(rdev);
        read_sysfs_size(&format!("/sys/dev/char/{major}:{minor}/size"))
    } else {
        Err(Error::NotDax)
    }
}

fn read_sysfs_size(path: &str) -> Result<u64> {
    let content = fs::read_to_string(path).map_err(|_| Error::Sysfs)?;
    content.trim().parse::<u64>().map_err(|_| Error::Sysfs)
}
