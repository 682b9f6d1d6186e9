//! Entry point of the `famfs` command.

mod cp;
mod creat;
mod fsck;
mod logplay;
mod mkdir;
mod mkfs;
mod mkmeta;
mod mount;
mod verify;

use famfs::error;
use std::env;
use std::process::exit;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" famfs <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!(" mkfs\t\tcreates a filesystem on a DAX device");
    eprintln!(" mount\t\tmounts a filesystem and replays its log");
    eprintln!(" mkmeta\tcreates the meta files of a mounted filesystem");
    eprintln!(" logplay\treplays the log into the namespace");
    eprintln!(" fsck\t\tchecks a filesystem");
    eprintln!(" creat\t\tcreates and allocates a file");
    eprintln!(" cp\t\tcopies a file into the filesystem");
    eprintln!(" verify\tchecks a file against a seeded pattern");
    eprintln!(" mkdir\t\tcreates a directory");
}

fn main() {
    let mut args = env::args_os();
    // skip the binary name
    args.next();
    let Some(cmd) = args.next().and_then(|s| s.into_string().ok()) else {
        print_usage();
        exit(1);
    };
    match cmd.as_str() {
        "mkfs" => mkfs::main(args),
        "mount" => mount::main(args),
        "mkmeta" => mkmeta::main(args),
        "logplay" => logplay::main(args),
        "fsck" => fsck::main(args),
        "creat" => creat::main(args),
        "cp" => cp::main(args),
        "verify" => verify::main(args),
        "mkdir" => mkdir::main(args),
        "-h" | "--help" => print_usage(),
        _ => error(&cmd, "invalid command"),
    }
}
