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

//! The `mkdir` command creates a directory and logs it.

use famfs::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs mkdir [-m <mode>] <path>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -m, --mode <mode>:\tthe directory mode, octal (default 755)");
    eprintln!(" path:\t\t\tthe directory to create");
}

pub fn main(args: ArgsOs) {
    let mut mode: u32 = 0o755;
    let mut path: Option<PathBuf> = None;
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => {
                print_usage();
                exit(0);
            }
            Some("-m" | "--mode") => {
                let value = args
                    .next()
                    .and_then(|s| s.into_string().ok())
                    .unwrap_or_else(|| {
                        error("mkdir", "missing value for mode");
                    });
                mode = u32::from_str_radix(&value, 8).unwrap_or_else(|_| {
                    error("mkdir", format_args!("invalid mode `{value}`"));
                });
            }
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    let Some(path) = path else {
        print_usage();
        exit(1);
    };
    famfs::ops::mkdir(&path, mode, 0, 0).unwrap_or_else(|e| {
        error("mkdir", format_args!("{}: {e}", path.display()));
    });
}
