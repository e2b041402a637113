//! Read-only decoding of MINIX version-3 filesystem images.
//!
//! The pipeline: locate the filesystem inside a (possibly partitioned)
//! disk image, decode the superblock, then resolve paths to inodes and
//! stream file contents with sparse-hole semantics. The `minls` and
//! `minget` binaries are thin front-ends over [`MinixFs`].

pub use error::{FsError, Result};
pub use fs::{BlockRef, DirEntry, DirIter, MinixFs, DIR_ENTRY_SIZE, ROOT_INODE};
pub use inode::{Inode, DIRECT_ZONES, INODE_SIZE};
pub use partition::{PartitionEntry, SECTOR_SIZE};
pub use path::canonicalize;
pub use superblock::{Geometry, Superblock, MINIX_MAGIC, SUPERBLOCK_OFFSET};

mod error;
mod fs;
mod image;
mod inode;
mod partition;
mod path;
mod superblock;
