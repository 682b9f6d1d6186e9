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

//! The `logplay` command replays the log into the namespace.

use famfs::error;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs logplay [--dry-run] [--shadow <dir>] <path>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -n, --dry-run:\tvalidates the log without touching the namespace");
    eprintln!(" --shadow <dir>:\tmaterializes the namespace under an ordinary directory");
    eprintln!(" path:\t\tany path inside the mount");
}

pub fn main(args: ArgsOs) {
    let mut dry_run = false;
    let mut shadow: Option<PathBuf> = None;
    let mut target: Option<PathBuf> = None;
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => {
                print_usage();
                exit(0);
            }
            Some("-n" | "--dry-run") => dry_run = true,
            Some("--shadow") => {
                let Some(dir) = args.next() else {
                    print_usage();
                    exit(1);
                };
                shadow = Some(PathBuf::from(dir));
            }
            _ => target = Some(PathBuf::from(arg)),
        }
    }
    let Some(target) = target else {
        print_usage();
        exit(1);
    };
    let stats = famfs::ops::logplay(&target, dry_run, shadow.as_deref()).unwrap_or_else(|e| {
        error("logplay", format_args!("{}: {e}", target.display()));
    });
    println!(
        "famfs logplay: {} files and {} directories created, {} already present, {} invalid entries",
        stats.files_created, stats.dirs_created, stats.existed, stats.invalid
    );
    if stats.invalid > 0 {
        exit(1);
    }
}
