//! The `mkfs` command creates a famfs filesystem on a DAX device.

use famfs::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, overwrite an existing filesystem.
    force: bool,
    /// If true, print command line help.
    help: bool,
    /// The path to the device file on which the filesystem will be created.
    device_path: Option<PathBuf>,
}

fn parse_args(args: ArgsOs) -> Args {
    let mut res: Args = Default::default();
    for arg in args {
        match arg.to_str() {
            Some("-h" | "--help") => res.help = true,
            Some("-f" | "--force") => res.force = true,
            _ => res.device_path = Some(PathBuf::from(arg)),
        }
    }
    res
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs mkfs [-f] <device>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -f, --force:\toverwrites an existing filesystem");
    eprintln!(" device:\tthe DAX device to format");
}

pub fn main(args: ArgsOs) {
    let args = parse_args(args);
    if args.help {
        print_usage();
        exit(0);
    }
    let device_path = args.device_path.unwrap_or_else(|| {
        error("mkfs", "specify path to a device");
    });
    let sb = famfs::ops::mkfs(&device_path, args.force).unwrap_or_else(|e| {
        error("mkfs", format_args!("{}: {e}", device_path.display()));
    });
    print!("{sb}");
}
