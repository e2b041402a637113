use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use minixfs::{canonicalize, FsError, MinixFs};

#[derive(Parser, Debug)]
#[command(
    name = "minget",
    about = "Copy a regular file out of a MINIX v3 filesystem image"
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

    /// Source path inside the image
    srcpath: String,

    /// Destination file (default: standard output)
    dstpath: Option<PathBuf>,
}

fn extract(args: &Args) -> Result<()> {
    let fs = MinixFs::open(&args.image, args.partition, args.subpartition)?;

    let canonical = canonicalize(&args.srcpath);
    let ino = fs.resolve_path(&canonical)?;
    let inode = fs.read_inode(ino)?;
    inode.debug_dump(ino);

    if !inode.is_regular() {
        return Err(FsError::NotARegularFile(canonical).into());
    }

    match &args.dstpath {
        Some(dst) => {
            let mut out = File::create(dst)
                .with_context(|| format!("can't create destination {}", dst.display()))?;
            fs.copy_file_data(&inode, &mut out)?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            fs.copy_file_data(&inode, &mut out)?;
            out.flush()?;
        }
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

    if let Err(e) = extract(&args) {
        eprintln!("minget: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
