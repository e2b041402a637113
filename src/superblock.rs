//! MINIX v3 superblock decoding and derived geometry.

use crate::error::{FsError, Result};
use crate::image::{read_le_u16, read_le_u32};

/// Byte offset of the superblock from the filesystem start.
pub const SUPERBLOCK_OFFSET: u64 = 1024;
/// Bytes read for the packed superblock record (31 bytes of fields plus
/// trailing padding).
pub const SUPERBLOCK_SIZE: usize = 32;
/// MINIX v3 superblock magic.
pub const MINIX_MAGIC: u16 = 0x4D5A;

/// Decoded superblock. Field names follow the on-disk record.
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
    /// Count of inodes; inode numbering is 1-based.
    pub ninodes: u32,
    /// Blocks used by the inode bitmap.
    pub i_blocks: i16,
    /// Blocks used by the zone bitmap.
    pub z_blocks: i16,
    /// First data zone number.
    pub firstdata: u16,
    /// log2 of blocks per zone.
    pub log_zone_size: i16,
    /// Advisory maximum file size.
    pub max_file: u32,
    /// Total zones on disk.
    pub zones: u32,
    pub magic: u16,
    /// Block size in bytes.
    pub blocksize: u16,
    pub subversion: u8,
}

/// Geometry derived from the superblock once at session start; read-only
/// afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub blocksize: u32,
    pub blocks_per_zone: u32,
    /// Zone size in bytes: `blocksize << log_zone_size`.
    pub zone_size: u64,
    /// Zone numbers held by one indirect block: `blocksize / 4`.
    pub pointers_per_block: u32,
}

impl Superblock {
    /// Decode the packed superblock record.
    ///
    /// The magic is checked first; after that the geometry is validated so
    /// the rest of the decoder can rely on it. Directory entries are 64
    /// bytes and zone pointers 4, so the block size must be a positive
    /// multiple of 64.
    pub fn parse(raw: &[u8]) -> Result<Superblock> {
        if raw.len() < SUPERBLOCK_SIZE {
            return Err(FsError::BadSuperblock("truncated superblock record"));
        }

        let magic = read_le_u16(raw, 24);
        if magic != MINIX_MAGIC {
            return Err(FsError::BadFilesystemMagic(magic));
        }

        let sb = Superblock {
            ninodes: read_le_u32(raw, 0),
            i_blocks: read_le_u16(raw, 6) as i16,
            z_blocks: read_le_u16(raw, 8) as i16,
            firstdata: read_le_u16(raw, 10),
            log_zone_size: read_le_u16(raw, 12) as i16,
            max_file: read_le_u32(raw, 16),
            zones: read_le_u32(raw, 20),
            magic,
            blocksize: read_le_u16(raw, 28),
            subversion: raw[30],
        };

        if sb.blocksize == 0 || sb.blocksize % 64 != 0 {
            return Err(FsError::BadSuperblock(
                "block size is not a positive multiple of 64",
            ));
        }
        if !(0..=16).contains(&sb.log_zone_size) {
            return Err(FsError::BadSuperblock("zone size exponent out of range"));
        }
        if sb.i_blocks < 0 || sb.z_blocks < 0 {
            return Err(FsError::BadSuperblock("negative bitmap block count"));
        }

        Ok(sb)
    }

    pub fn geometry(&self) -> Geometry {
        let blocks_per_zone = 1u32 << self.log_zone_size;
        Geometry {
            blocksize: u32::from(self.blocksize),
            blocks_per_zone,
            zone_size: u64::from(self.blocksize) * u64::from(blocks_per_zone),
            pointers_per_block: u32::from(self.blocksize) / 4,
        }
    }

    /// Dump the decoded fields at debug level, as `-v` reports them.
    pub fn debug_dump(&self) {
        log::debug!("superblock contents:");
        log::debug!("  ninodes:       {}", self.ninodes);
        log::debug!("  i_blocks:      {}", self.i_blocks);
        log::debug!("  z_blocks:      {}", self.z_blocks);
        log::debug!("  firstdata:     {}", self.firstdata);
        log::debug!(
            "  log_zone_size: {} (zone size: {})",
            self.log_zone_size,
            self.geometry().zone_size
        );
        log::debug!("  max_file:      {}", self.max_file);
        log::debug!("  zones:         {}", self.zones);
        log::debug!("  magic:         0x{:x}", self.magic);
        log::debug!("  blocksize:     {}", self.blocksize);
        log::debug!("  subversion:    {}", self.subversion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_superblock(blocksize: u16, log_zone_size: u16) -> [u8; SUPERBLOCK_SIZE] {
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        raw[0..4].copy_from_slice(&64u32.to_le_bytes()); // ninodes
        raw[6..8].copy_from_slice(&1u16.to_le_bytes()); // i_blocks
        raw[8..10].copy_from_slice(&1u16.to_le_bytes()); // z_blocks
        raw[10..12].copy_from_slice(&8u16.to_le_bytes()); // firstdata
        raw[12..14].copy_from_slice(&log_zone_size.to_le_bytes());
        raw[16..20].copy_from_slice(&0x1000_0000u32.to_le_bytes()); // max_file
        raw[20..24].copy_from_slice(&1024u32.to_le_bytes()); // zones
        raw[24..26].copy_from_slice(&MINIX_MAGIC.to_le_bytes());
        raw[28..30].copy_from_slice(&blocksize.to_le_bytes());
        raw[30] = 3; // subversion
        raw
    }

    #[test]
    fn test_parse_smoke() {
        let sb = Superblock::parse(&raw_superblock(1024, 0)).expect("parse");
        assert_eq!(sb.ninodes, 64);
        assert_eq!(sb.i_blocks, 1);
        assert_eq!(sb.z_blocks, 1);
        assert_eq!(sb.firstdata, 8);
        assert_eq!(sb.blocksize, 1024);
        assert_eq!(sb.subversion, 3);
    }

    #[test]
    fn test_geometry_with_multiblock_zones() {
        let sb = Superblock::parse(&raw_superblock(1024, 2)).expect("parse");
        let geo = sb.geometry();
        assert_eq!(geo.blocks_per_zone, 4);
        assert_eq!(geo.zone_size, 4096);
        assert_eq!(geo.pointers_per_block, 256);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut raw = raw_superblock(1024, 0);
        raw[24..26].copy_from_slice(&0xEF53u16.to_le_bytes());
        let err = Superblock::parse(&raw).expect_err("wrong magic");
        assert!(matches!(err, FsError::BadFilesystemMagic(0xEF53)));
    }

    #[test]
    fn test_misaligned_blocksize_rejected() {
        // 96 is a multiple of 4 but not of the 64-byte directory entry;
        // the two directory-scan forms would disagree on such a block.
        let err = Superblock::parse(&raw_superblock(96, 0)).expect_err("blocksize 96");
        assert!(matches!(err, FsError::BadSuperblock(_)));

        let err = Superblock::parse(&raw_superblock(0, 0)).expect_err("blocksize 0");
        assert!(matches!(err, FsError::BadSuperblock(_)));
    }

    #[test]
    fn test_negative_zone_exponent_rejected() {
        let raw = raw_superblock(1024, (-1i16) as u16);
        let err = Superblock::parse(&raw).expect_err("negative exponent");
        assert!(matches!(err, FsError::BadSuperblock(_)));
    }
}
