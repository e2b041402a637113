use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use minixfs::{canonicalize, MinixFs};

#[derive(Parser, Debug)]
#[command(
    name = "minls",
    about = "List a path inside a MINIX v3 filesystem image"
)]
struct Args {
    /// Select primary partition for filesystem (default: none)
    #[arg(short = 'p', long = "partition", value_name = "NUM")]
    partition: Option<u32>,

    /// Select subpartition for filesystem (default: none)
    #[arg(
        short = 's',
        long = "subpartition",
        value_name = "NUM",
        requires = "partition"
    )]
    subpartition: Option<u32>,

    /// Verbose. Print partition location, superblock, and source inode to stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Filesystem image to read
    image: PathBuf,

    /// Path inside the image
    #[arg(default_value = "/")]
    path: String,
}

/// Print one `<mode> <size> <name>` line for an inode.
fn list_single_entry(fs: &MinixFs, ino: u32, name: &str) -> Result<()> {
    let inode = fs.read_inode(ino)?;
    println!("{} {:9} {}", inode.mode_string(), inode.size, name);
    Ok(())
}

fn list(args: &Args) -> Result<()> {
    let fs = MinixFs::open(&args.image, args.partition, args.subpartition)?;

    let canonical = canonicalize(&args.path);
    let ino = fs.resolve_path(&canonical)?;
    let inode = fs.read_inode(ino)?;
    inode.debug_dump(ino);

    if inode.is_dir() {
        println!("{canonical}:");
        for entry in fs.read_dir(&inode) {
            let entry = entry?;
            list_single_entry(&fs, entry.ino, &entry.name_lossy())?;
        }
    } else {
        // A non-directory target lists as a single line under its last
        // path component.
        let name = if canonical == "/" {
            "."
        } else {
            canonical.rsplit('/').next().unwrap_or(".")
        };
        list_single_entry(&fs, ino, name)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    if let Err(e) = list(&args) {
        eprintln!("minls: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
