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

//! The `creat` command creates and allocates a famfs file.

use famfs::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs creat -s <size> [-S <seed>] [-m <mode>] <path>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -s, --size <size>:\tthe file size in bytes");
    eprintln!(" -S, --seed <seed>:\tfills the file with a seeded pattern");
    eprintln!(" -m, --mode <mode>:\tthe file mode, octal (default 644)");
    eprintln!(" path:\t\t\tthe file to create");
}

fn arg_value(args: &mut ArgsOs, what: &str) -> String {
    args.next()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| {
            error("creat", format_args!("missing value for {what}"));
        })
}

pub fn main(args: ArgsOs) {
    let mut size: Option<u64> = None;
    let mut seed: Option<u64> = None;
    let mut mode: u32 = 0o644;
    let mut path: Option<PathBuf> = None;
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => {
                print_usage();
                exit(0);
            }
            Some("-s" | "--size") => {
                let value = arg_value(&mut args, "size");
                size = Some(value.parse().unwrap_or_else(|_| {
                    error("creat", format_args!("invalid size `{value}`"));
                }));
            }
            Some("-S" | "--seed") => {
                let value = arg_value(&mut args, "seed");
                seed = Some(value.parse().unwrap_or_else(|_| {
                    error("creat", format_args!("invalid seed `{value}`"));
                }));
            }
            Some("-m" | "--mode") => {
                let value = arg_value(&mut args, "mode");
                mode = u32::from_str_radix(&value, 8).unwrap_or_else(|_| {
                    error("creat", format_args!("invalid mode `{value}`"));
                });
            }
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    let Some(path) = path else {
        print_usage();
        exit(1);
    };
    let Some(size) = size else {
        error("creat", "specify the file size with -s");
    };
    let file = famfs::ops::mkfile(&path, size, mode, 0, 0).unwrap_or_else(|e| {
        error("creat", format_args!("{}: {e}", path.display()));
    });
    if let Some(seed) = seed {
        famfs::ops::fill_seeded(&file, size, seed).unwrap_or_else(|e| {
            error("creat", format_args!("{}: {e}", path.display()));
        });
    }
}
