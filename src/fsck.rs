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

//! The `fsck` command checks a filesystem and reports allocation damage.

use famfs::error;
use famfs::util::ByteSize;
use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs fsck [-v] <device-or-path>");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -v, --verbose:\tprints bitmap details");
    eprintln!(" device-or-path:\tan unmounted device, or any path inside a mount");
}

pub fn main(args: ArgsOs) {
    let mut verbose = false;
    let mut target: Option<PathBuf> = None;
    for arg in args {
        match arg.to_str() {
            Some("-h" | "--help") => {
                print_usage();
                exit(0);
            }
            Some("-v" | "--verbose") => verbose = true,
            _ => target = Some(PathBuf::from(arg)),
        }
    }
    let Some(target) = target else {
        print_usage();
        exit(1);
    };
    let report = famfs::ops::fsck(&target).unwrap_or_else(|e| {
        error("fsck", format_args!("{}: {e}", target.display()));
    });
    print!("{}", report.sb);
    println!("log:");
    println!(
        "  entries:    {}/{}",
        report.log_stats.used, report.log_stats.capacity
    );
    println!("  next seqnum: {}", report.log_stats.next_seqnum);
    println!("allocation:");
    println!(
        "  allocated:  {} bytes ({})",
        report.stats.alloc_total,
        ByteSize(report.stats.alloc_total)
    );
    println!("  declared:   {} bytes", report.stats.size_total);
    println!("  amplification: {:.2}", report.stats.space_amplification());
    if verbose {
        println!("  bitmap:     {} allocation units", report.stats.bitmap_size);
        println!("  invalid log entries: {}", report.stats.invalid_entries);
    }
    let errors = report.stats.alloc_errors;
    if errors > 0 {
        eprintln!("famfs fsck: {errors} allocation collision(s) detected");
        exit(errors as i32);
    }
    println!("famfs fsck: clean");
}
