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

//! The `cp` command copies a file into the filesystem.

use famfs::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs cp <src> <dst>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" src:\tthe file to copy");
    eprintln!(" dst:\tthe famfs file to create; must not exist");
}

pub fn main(args: ArgsOs) {
    let args: Vec<_> = args.collect();
    match &args[..] {
        [opt] if opt == "-h" || opt == "--help" => {
            print_usage();
            exit(0);
        }
        [src, dst] => {
            let src = PathBuf::from(src);
            let dst = PathBuf::from(dst);
            famfs::ops::cp(&src, &dst).unwrap_or_else(|e| {
                error(
                    "cp",
                    format_args!("cannot copy `{}` to `{}`: {e}", src.display(), dst.display()),
                );
            });
        }
        _ => {
            print_usage();
            exit(1);
        }
    }
}
