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

//! The `mkmeta` command exposes the superblock and log of a mounted
//! filesystem as files under `.meta/`.

use famfs::error;
use famfs::mount::META_DIR;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs mkmeta <device>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" device:\tthe DAX device backing the mounted filesystem");
}

pub fn main(args: ArgsOs) {
    let args: Vec<_> = args.collect();
    match &args[..] {
        [opt] if opt == "-h" || opt == "--help" => {
            print_usage();
            exit(0);
        }
        [device] => {
            let device = PathBuf::from(device);
            let mount_point = famfs::ops::mkmeta(&device).unwrap_or_else(|e| {
                error("mkmeta", format_args!("{}: {e}", device.display()));
            });
            println!(
                "famfs mkmeta: meta files ready under {}",
                mount_point.join(META_DIR).display()
            );
        }
        _ => {
            print_usage();
            exit(1);
        }
    }
}
