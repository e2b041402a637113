//! Error types for the MINIX filesystem decoder.
//!
//! One enum covers every way an image can fail to decode; the binaries
//! print its `Display` form prefixed with the tool name.

use thiserror::Error;

/// Unified error type for all decode operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The 0x55AA signature was missing from a partition table sector.
    /// `b510`/`b511` are the bytes found at sector offsets 510 and 511.
    #[error("Partition table with bad magic: 0x{b511:02x}{b510:02x}")]
    BadPartitionMagic { b510: u8, b511: u8 },

    #[error("Partition number {0} is out of range (0-3)")]
    BadPartitionNumber(u32),

    #[error("Partition {index} is type 0x{ptype:02x}, not a MINIX partition (0x81)")]
    NotMinixPartition { index: u32, ptype: u8 },

    #[error("bad magic number (0x{0:04x}); this doesn't look like a MINIX filesystem")]
    BadFilesystemMagic(u16),

    /// The superblock magic was right but the geometry it describes is not
    /// usable (zero or misaligned block size, negative bitmap counts, ...).
    #[error("bad superblock: {0}")]
    BadSuperblock(&'static str),

    #[error("inode {ino} out of range (1-{ninodes})")]
    BadInode { ino: u32, ninodes: u32 },

    #[error("Can't find {0}")]
    NotFound(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} is not a regular file")]
    NotARegularFile(String),
}

/// Result alias using [`FsError`].
pub type Result<T> = std::result::Result<T, FsError>;
