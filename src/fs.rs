//! The image session and the decode pipeline built on it.
//!
//! [`MinixFs`] bundles the opened image, the located filesystem base, the
//! decoded superblock and the derived geometry. Everything after
//! [`MinixFs::open`] is read-only; each block access issues one positioned
//! read with no caching.

use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{FsError, Result};
use crate::image::{read_le_u32, ImageReader};
use crate::inode::{Inode, DIRECT_ZONES, INODE_SIZE};
use crate::partition;
use crate::path::canonicalize;
use crate::superblock::{Geometry, Superblock, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE};

/// Inode number of the root directory. Inode 0 marks a vacant slot.
pub const ROOT_INODE: u32 = 1;
/// Size of one on-disk directory entry.
pub const DIR_ENTRY_SIZE: usize = 64;
/// Name bytes in a directory entry; shorter names are NUL-delimited.
const DIR_NAME_LEN: usize = 60;

/// Where a logical file block lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    /// No backing storage; the block reads as zeros.
    Hole,
    /// Absolute block number within the filesystem.
    Disk(u32),
}

/// A read-only session over one MINIX v3 filesystem.
#[derive(Debug)]
pub struct MinixFs {
    image: ImageReader,
    superblock: Superblock,
    geometry: Geometry,
}

impl MinixFs {
    /// Open an image and initialize the session: locate the filesystem
    /// (walking the partition tables when selected), decode the superblock
    /// and derive the geometry.
    pub fn open(image_path: &Path, primary: Option<u32>, sub: Option<u32>) -> Result<MinixFs> {
        let file = File::open(image_path)?;
        let mut image = ImageReader::new(file);

        let fs_base = partition::locate(&image, primary, sub)?;
        image.set_base(fs_base);

        let mut raw = [0u8; SUPERBLOCK_SIZE];
        image.read_at(SUPERBLOCK_OFFSET, &mut raw)?;
        let superblock = Superblock::parse(&raw)?;
        let geometry = superblock.geometry();

        log::debug!(
            "filesystem starts at byte {fs_base} (sector {})",
            fs_base / partition::SECTOR_SIZE
        );
        superblock.debug_dump();

        Ok(MinixFs {
            image,
            superblock,
            geometry,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Read inode `ino` (1-based) from the inode table.
    pub fn read_inode(&self, ino: u32) -> Result<Inode> {
        if ino == 0 || ino > self.superblock.ninodes {
            return Err(FsError::BadInode {
                ino,
                ninodes: self.superblock.ninodes,
            });
        }

        // The inode table follows the boot block, superblock and the two
        // bitmap regions.
        let table_block = 2 + self.superblock.i_blocks as u64 + self.superblock.z_blocks as u64;
        let offset = table_block * u64::from(self.geometry.blocksize)
            + u64::from(ino - 1) * INODE_SIZE as u64;

        let mut raw = [0u8; INODE_SIZE];
        self.image.read_at(offset, &mut raw)?;
        Ok(Inode::parse(&raw))
    }

    /// Map a file-relative logical block to its location on disk.
    ///
    /// A zone number of 0 at any level short-circuits to [`BlockRef::Hole`];
    /// callers cannot tell which level produced the hole. A failed read of
    /// an indirect table is an error, not a hole.
    pub fn map_block(&self, inode: &Inode, logical: u32) -> Result<BlockRef> {
        let mut scratch = vec![0u8; self.geometry.blocksize as usize];
        self.map_block_with(inode, logical, &mut scratch)
    }

    /// As [`MinixFs::map_block`], reusing `scratch` (one block) for the
    /// zone-table reads.
    fn map_block_with(&self, inode: &Inode, logical: u32, scratch: &mut [u8]) -> Result<BlockRef> {
        let per_zone = self.geometry.blocks_per_zone;
        let ptrs = self.geometry.pointers_per_block;
        let direct = DIRECT_ZONES as u32;

        let logical_zone = logical / per_zone;
        let block_in_zone = logical % per_zone;

        let zone_num = if logical_zone < direct {
            inode.zone[logical_zone as usize]
        } else if logical_zone < direct + ptrs {
            if inode.indirect == 0 {
                return Ok(BlockRef::Hole);
            }
            self.zone_table_slot(inode.indirect, logical_zone - direct, scratch)?
        } else {
            let beyond = u64::from(logical_zone - direct - ptrs);
            if beyond >= u64::from(ptrs) * u64::from(ptrs) {
                // Past the double-indirect range; nothing can back it.
                return Ok(BlockRef::Hole);
            }
            if inode.two_indirect == 0 {
                return Ok(BlockRef::Hole);
            }
            let first =
                self.zone_table_slot(inode.two_indirect, (beyond / u64::from(ptrs)) as u32, scratch)?;
            if first == 0 {
                return Ok(BlockRef::Hole);
            }
            self.zone_table_slot(first, (beyond % u64::from(ptrs)) as u32, scratch)?
        };

        if zone_num == 0 {
            return Ok(BlockRef::Hole);
        }
        Ok(BlockRef::Disk(zone_num * per_zone + block_in_zone))
    }

    /// Read the zone table stored in `zone` and return slot `index`.
    fn zone_table_slot(&self, zone: u32, index: u32, scratch: &mut [u8]) -> Result<u32> {
        let offset = u64::from(zone) * self.geometry.zone_size;
        self.image.read_at(offset, scratch)?;
        Ok(read_le_u32(scratch, index as usize * 4))
    }

    /// Iterate the live entries of a directory inode in on-disk order.
    ///
    /// Vacant slots (inode 0) are skipped; hole blocks contribute no
    /// entries.
    pub fn read_dir<'a>(&'a self, inode: &'a Inode) -> DirIter<'a> {
        let blocksize = self.geometry.blocksize as usize;
        DirIter {
            fs: self,
            inode,
            block: vec![0u8; blocksize],
            scratch: vec![0u8; blocksize],
            logical: 0,
            entry: 0,
            have_block: false,
        }
    }

    /// First entry in `dir` whose name matches `name` exactly (length and
    /// bytes). On-disk duplicates are malformed but tolerated; the first
    /// one wins.
    fn find_entry(&self, dir: &Inode, name: &[u8]) -> Result<Option<u32>> {
        if name.len() > DIR_NAME_LEN {
            return Ok(None);
        }
        for entry in self.read_dir(dir) {
            let entry = entry?;
            if entry.name == name {
                return Ok(Some(entry.ino));
            }
        }
        Ok(None)
    }

    /// Resolve a path to an inode number, starting at the root.
    ///
    /// The path is canonicalized first; each component is matched
    /// byte-exactly against the NUL-delimited on-disk names. Descending
    /// through anything that is not a directory fails with
    /// [`FsError::NotADirectory`].
    pub fn resolve_path(&self, path: &str) -> Result<u32> {
        let canonical = canonicalize(path);
        let mut current = ROOT_INODE;

        for component in canonical.split('/').filter(|c| !c.is_empty()) {
            let dir_inode = self.read_inode(current)?;
            if !dir_inode.is_dir() {
                return Err(FsError::NotADirectory(canonical.clone()));
            }
            current = self
                .find_entry(&dir_inode, component.as_bytes())?
                .ok_or_else(|| FsError::NotFound(canonical.clone()))?;
        }

        Ok(current)
    }

    /// Stream the bytes of the regular file at `path` into `sink`.
    ///
    /// Exactly `size` bytes are written; holes materialize as zeros
    /// without touching the image.
    pub fn stream_file<W: Write>(&self, path: &str, sink: &mut W) -> Result<()> {
        let canonical = canonicalize(path);
        let ino = self.resolve_path(&canonical)?;
        let inode = self.read_inode(ino)?;
        if !inode.is_regular() {
            return Err(FsError::NotARegularFile(canonical));
        }
        self.copy_file_data(&inode, sink)
    }

    /// Copy `inode.size` bytes block by block, `min(blocksize, remaining)`
    /// at a time.
    pub fn copy_file_data<W: Write>(&self, inode: &Inode, sink: &mut W) -> Result<()> {
        let blocksize = self.geometry.blocksize as usize;
        let mut buf = vec![0u8; blocksize];
        let mut scratch = vec![0u8; blocksize];
        let mut remaining = u64::from(inode.size);
        let mut logical = 0u32;

        log::debug!(
            "copying {} bytes, block size {blocksize}",
            inode.size
        );

        while remaining > 0 {
            let n = remaining.min(blocksize as u64) as usize;
            match self.map_block_with(inode, logical, &mut scratch)? {
                BlockRef::Hole => {
                    log::debug!("logical block {logical}: hole, writing {n} zero bytes");
                    buf[..n].fill(0);
                }
                BlockRef::Disk(block) => {
                    let offset = u64::from(block) * u64::from(self.geometry.blocksize);
                    self.image.read_at(offset, &mut buf)?;
                }
            }
            sink.write_all(&buf[..n])?;
            remaining -= n as u64;
            logical += 1;
        }

        Ok(())
    }
}

/// One live directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u32,
    /// Raw name bytes; on-disk names are not guaranteed to be UTF-8.
    pub name: Vec<u8>,
}

impl DirEntry {
    /// Entry name for display.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// Lazy iterator over a directory's entries, in on-disk order.
pub struct DirIter<'a> {
    fs: &'a MinixFs,
    inode: &'a Inode,
    block: Vec<u8>,
    scratch: Vec<u8>,
    /// Next logical block to load.
    logical: u32,
    /// Next entry slot within the loaded block.
    entry: usize,
    have_block: bool,
}

impl DirIter<'_> {
    /// Load blocks until one with backing storage is found, or the
    /// directory's size is exhausted.
    fn load_next_block(&mut self) -> Result<bool> {
        let blocksize = u64::from(self.fs.geometry.blocksize);
        loop {
            if u64::from(self.logical) * blocksize >= u64::from(self.inode.size) {
                return Ok(false);
            }
            let mapped = self
                .fs
                .map_block_with(self.inode, self.logical, &mut self.scratch)?;
            self.logical += 1;
            match mapped {
                // A hole scans as a block of vacant entries.
                BlockRef::Hole => continue,
                BlockRef::Disk(block) => {
                    let offset = u64::from(block) * blocksize;
                    self.fs.image.read_at(offset, &mut self.block)?;
                    self.entry = 0;
                    return Ok(true);
                }
            }
        }
    }
}

impl Iterator for DirIter<'_> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries_per_block = self.block.len() / DIR_ENTRY_SIZE;
        loop {
            if !self.have_block {
                match self.load_next_block() {
                    Ok(true) => self.have_block = true,
                    Ok(false) => return None,
                    Err(e) => return Some(Err(e)),
                }
            }

            while self.entry < entries_per_block {
                let off = self.entry * DIR_ENTRY_SIZE;
                self.entry += 1;
                let raw = &self.block[off..off + DIR_ENTRY_SIZE];

                let ino = read_le_u32(raw, 0);
                if ino == 0 {
                    continue;
                }
                let name_raw = &raw[4..4 + DIR_NAME_LEN];
                let len = name_raw
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(DIR_NAME_LEN);
                return Some(Ok(DirEntry {
                    ino,
                    name: name_raw[..len].to_vec(),
                }));
            }

            self.have_block = false;
        }
    }
}
