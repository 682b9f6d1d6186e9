//! The `mount` command mounts a famfs filesystem, then brings its namespace
//! up: meta files first, then a log replay.

use famfs::error;
use std::env::ArgsOs;
use std::ffi::CString;
use std::ffi::{OsStr, c_ulong};
use std::io;
use std::io::Error;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::exit;
use std::ptr::null;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs mount <device> <dir>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" device:\tthe DAX device holding the filesystem");
    eprintln!(" dir:\t\tthe directory on which the filesystem is to be mounted");
}

/// Mounts the famfs filesystem on `source` at `target`.
pub fn mount_fs(source: &OsStr, target: &OsStr, mountflags: c_ulong) -> io::Result<()> {
    let source_c = CString::new(source.as_bytes()).unwrap();
    let target_c = CString::new(target.as_bytes()).unwrap();
    let fs_type_c = CString::new("famfs").unwrap();
    let ret = unsafe {
        libc::mount(
            source_c.as_ptr(),
            target_c.as_ptr(),
            fs_type_c.as_ptr(),
            mountflags,
            null(),
        )
    };
    if ret < 0 {
        return Err(Error::last_os_error());
    }
    Ok(())
}

pub fn main(args: ArgsOs) {
    let args: Vec<_> = args.collect();
    match &args[..] {
        [opt] if opt == "-h" || opt == "--help" => {
            print_usage();
            exit(0);
        }
        [device, dir] => {
            mount_fs(device, dir, 0).unwrap_or_else(|e| {
                error(
                    "mount",
                    format_args!("cannot mount `{}`: {e}", PathBuf::from(device).display()),
                );
            });
            let device = PathBuf::from(device);
            famfs::ops::mkmeta(&device).unwrap_or_else(|e| {
                error(
                    "mount",
                    format_args!("cannot create meta files: {e}"),
                );
            });
            let dir = PathBuf::from(dir);
            let stats = famfs::ops::logplay(&dir, false, None).unwrap_or_else(|e| {
                error("mount", format_args!("cannot replay the log: {e}"));
            });
            println!(
                "famfs mount: {} files, {} directories",
                stats.files_created, stats.dirs_created
            );
        }
        _ => {
            print_usage();
            exit(1);
        }
    }
}
