//! DOS partition table decoding.
//!
//! Locates the MINIX filesystem inside a (possibly sub-partitioned) disk
//! image. Sub-partition tables use disk-absolute LBA addressing, so a
//! nested lookup still yields an absolute byte offset.

use crate::error::{FsError, Result};
use crate::image::{read_le_u32, ImageReader};

/// Disk sector size; LBA values count these.
pub const SECTOR_SIZE: u64 = 512;

const TABLE_OFFSET: usize = 0x1BE;
const ENTRY_SIZE: usize = 16;
const MINIX_PART_TYPE: u8 = 0x81;

/// One 16-byte partition table entry. The CHS fields are ignored; only
/// LBA addressing is used to locate filesystems.
#[derive(Debug, Clone, Copy)]
pub struct PartitionEntry {
    pub bootind: u8,
    pub ptype: u8,
    /// First sector of the partition, always relative to the disk start.
    pub lba_first: u32,
    pub sectors: u32,
}

impl PartitionEntry {
    fn parse(raw: &[u8]) -> Self {
        PartitionEntry {
            bootind: raw[0],
            ptype: raw[4],
            lba_first: read_le_u32(raw, 8),
            sectors: read_le_u32(raw, 12),
        }
    }
}

/// Validate a 512-byte table sector and return its MINIX entry `index`.
fn select_entry(sector: &[u8], index: u32) -> Result<PartitionEntry> {
    if sector[510] != 0x55 || sector[511] != 0xAA {
        return Err(FsError::BadPartitionMagic {
            b510: sector[510],
            b511: sector[511],
        });
    }
    if index > 3 {
        return Err(FsError::BadPartitionNumber(index));
    }

    let off = TABLE_OFFSET + index as usize * ENTRY_SIZE;
    let entry = PartitionEntry::parse(&sector[off..off + ENTRY_SIZE]);
    if entry.ptype != MINIX_PART_TYPE {
        return Err(FsError::NotMinixPartition {
            index,
            ptype: entry.ptype,
        });
    }
    Ok(entry)
}

fn read_table_entry(image: &ImageReader, table_base: u64, index: u32) -> Result<PartitionEntry> {
    let mut sector = [0u8; SECTOR_SIZE as usize];
    image.read_at(table_base, &mut sector)?;
    select_entry(&sector, index)
}

/// Resolve the byte offset of the filesystem within the image.
///
/// With no partition selected the filesystem starts at offset 0. A
/// sub-partition is looked up in the table at the start of the selected
/// primary partition; its LBA is still disk-absolute.
pub fn locate(image: &ImageReader, primary: Option<u32>, sub: Option<u32>) -> Result<u64> {
    let Some(pnum) = primary else {
        return Ok(0);
    };

    let entry = read_table_entry(image, 0, pnum)?;
    let mut fs_base = u64::from(entry.lba_first) * SECTOR_SIZE;
    log::debug!(
        "partition {pnum}: start sector {} (byte offset {fs_base})",
        entry.lba_first
    );

    if let Some(snum) = sub {
        let entry = read_table_entry(image, fs_base, snum)?;
        fs_base = u64::from(entry.lba_first) * SECTOR_SIZE;
        log::debug!(
            "subpartition {snum}: start sector {} (byte offset {fs_base})",
            entry.lba_first
        );
    }

    Ok(fs_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector_with_entry(index: usize, ptype: u8, lba: u32, sectors: u32) -> [u8; 512] {
        let mut sector = [0u8; 512];
        sector[510] = 0x55;
        sector[511] = 0xAA;
        let off = TABLE_OFFSET + index * ENTRY_SIZE;
        sector[off + 4] = ptype;
        sector[off + 8..off + 12].copy_from_slice(&lba.to_le_bytes());
        sector[off + 12..off + 16].copy_from_slice(&sectors.to_le_bytes());
        sector
    }

    #[test]
    fn test_select_minix_entry() {
        let sector = sector_with_entry(0, 0x81, 63, 2048);
        let entry = select_entry(&sector, 0).expect("entry 0");
        assert_eq!(entry.ptype, 0x81);
        assert_eq!(entry.lba_first, 63);
        assert_eq!(entry.sectors, 2048);
    }

    #[test]
    fn test_bad_signature_rejected() {
        let mut sector = sector_with_entry(0, 0x81, 63, 2048);
        sector[510] = 0x00;
        let err = select_entry(&sector, 0).expect_err("no signature");
        assert!(matches!(
            err,
            FsError::BadPartitionMagic {
                b510: 0x00,
                b511: 0xAA
            }
        ));
        // Diagnostic names the observed bytes, high byte first.
        assert_eq!(format!("{err}"), "Partition table with bad magic: 0xaa00");
    }

    #[test]
    fn test_index_out_of_range() {
        let sector = sector_with_entry(0, 0x81, 63, 2048);
        let err = select_entry(&sector, 4).expect_err("index 4");
        assert!(matches!(err, FsError::BadPartitionNumber(4)));
    }

    #[test]
    fn test_non_minix_type_rejected() {
        // Valid signature is not enough; the type byte must be 0x81.
        let sector = sector_with_entry(1, 0x83, 63, 2048);
        let err = select_entry(&sector, 1).expect_err("linux partition");
        assert!(matches!(
            err,
            FsError::NotMinixPartition {
                index: 1,
                ptype: 0x83
            }
        ));
    }

    #[test]
    fn test_empty_slot_is_not_minix() {
        let sector = sector_with_entry(0, 0x81, 63, 2048);
        let err = select_entry(&sector, 2).expect_err("empty slot");
        assert!(matches!(
            err,
            FsError::NotMinixPartition { index: 2, ptype: 0 }
        ));
    }
}
