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

//! The `verify` command checks a file against a seeded pattern.

use famfs::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs verify -S <seed> <path>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -S, --seed <seed>:\tthe seed the file was written with");
    eprintln!(" path:\t\t\tthe file to check");
}

pub fn main(args: ArgsOs) {
    let mut seed: Option<u64> = None;
    let mut path: Option<PathBuf> = None;
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => {
                print_usage();
                exit(0);
            }
            Some("-S" | "--seed") => {
                let value = args
                    .next()
                    .and_then(|s| s.into_string().ok())
                    .unwrap_or_else(|| {
                        error("verify", "missing value for seed");
                    });
                seed = Some(value.parse().unwrap_or_else(|_| {
                    error("verify", format_args!("invalid seed `{value}`"));
                }));
            }
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    let (Some(path), Some(seed)) = (path, seed) else {
        print_usage();
        exit(1);
    };
    let mismatches = famfs::ops::verify(&path, seed).unwrap_or_else(|e| {
        error("verify", format_args!("{}: {e}", path.display()));
    });
    if mismatches > 0 {
        error(
            "verify",
            format_args!("{}: {mismatches} byte(s) differ", path.display()),
        );
    }
    println!("famfs verify: {}: ok", path.display());
}
