//! On-disk inode records.

use crate::image::{read_le_u16, read_le_u32};

/// Size of one packed inode on disk.
pub const INODE_SIZE: usize = 64;
/// Zone numbers held inline in the inode.
pub const DIRECT_ZONES: usize = 7;

const S_IFMT: u16 = 0o170000;
const S_IFREG: u16 = 0o100000;
const S_IFDIR: u16 = 0o040000;

/// Decoded inode. Zone number 0 anywhere in `zone`, `indirect` or
/// `two_indirect` marks a file hole.
#[derive(Debug, Clone, Copy)]
pub struct Inode {
    /// File type and permission bits.
    pub mode: u16,
    pub links: u16,
    pub uid: u16,
    pub gid: u16,
    /// Logical file length in bytes.
    pub size: u32,
    pub atime: i32,
    pub mtime: i32,
    pub ctime: i32,
    /// Direct zone numbers.
    pub zone: [u32; DIRECT_ZONES],
    /// Single-indirect zone number.
    pub indirect: u32,
    /// Double-indirect zone number.
    pub two_indirect: u32,
}

impl Inode {
    /// Decode a packed 64-byte on-disk inode.
    pub fn parse(raw: &[u8]) -> Inode {
        let mut zone = [0u32; DIRECT_ZONES];
        for (i, z) in zone.iter_mut().enumerate() {
            *z = read_le_u32(raw, 24 + i * 4);
        }
        Inode {
            mode: read_le_u16(raw, 0),
            links: read_le_u16(raw, 2),
            uid: read_le_u16(raw, 4),
            gid: read_le_u16(raw, 6),
            size: read_le_u32(raw, 8),
            atime: read_le_u32(raw, 12) as i32,
            mtime: read_le_u32(raw, 16) as i32,
            ctime: read_le_u32(raw, 20) as i32,
            zone,
            indirect: read_le_u32(raw, 52),
            two_indirect: read_le_u32(raw, 56),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    /// `ls`-style mode string: `d` or `-`, then `rwx` triples for owner,
    /// group and other.
    pub fn mode_string(&self) -> String {
        let mut s = String::with_capacity(10);
        s.push(if self.is_dir() { 'd' } else { '-' });
        for shift in [6, 3, 0] {
            let bits = self.mode >> shift;
            s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
        }
        s
    }

    /// Dump the inode at debug level, as `-v` reports the source inode.
    pub fn debug_dump(&self, ino: u32) {
        log::debug!("file inode #{ino}:");
        log::debug!("  mode:  {:#o} ({})", self.mode, self.mode_string());
        log::debug!(
            "  links: {}  uid: {}  gid: {}",
            self.links,
            self.uid,
            self.gid
        );
        log::debug!("  size:  {}", self.size);
        log::debug!(
            "  atime: {}  mtime: {}  ctime: {}",
            self.atime,
            self.mtime,
            self.ctime
        );
        for (i, z) in self.zone.iter().enumerate() {
            log::debug!("  zone[{i}] = {z}");
        }
        log::debug!("  indirect:     {}", self.indirect);
        log::debug!("  two_indirect: {}", self.two_indirect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inode_record() {
        let mut raw = [0u8; INODE_SIZE];
        raw[0..2].copy_from_slice(&0o100644u16.to_le_bytes());
        raw[2..4].copy_from_slice(&2u16.to_le_bytes());
        raw[4..6].copy_from_slice(&501u16.to_le_bytes());
        raw[6..8].copy_from_slice(&100u16.to_le_bytes());
        raw[8..12].copy_from_slice(&5000u32.to_le_bytes());
        raw[24..28].copy_from_slice(&9u32.to_le_bytes()); // zone[0]
        raw[48..52].copy_from_slice(&15u32.to_le_bytes()); // zone[6]
        raw[52..56].copy_from_slice(&23u32.to_le_bytes()); // indirect
        raw[56..60].copy_from_slice(&42u32.to_le_bytes()); // two_indirect

        let inode = Inode::parse(&raw);
        assert!(inode.is_regular());
        assert!(!inode.is_dir());
        assert_eq!(inode.links, 2);
        assert_eq!(inode.uid, 501);
        assert_eq!(inode.gid, 100);
        assert_eq!(inode.size, 5000);
        assert_eq!(inode.zone, [9, 0, 0, 0, 0, 0, 15]);
        assert_eq!(inode.indirect, 23);
        assert_eq!(inode.two_indirect, 42);
    }

    #[test]
    fn test_mode_string() {
        let mut inode = Inode::parse(&[0u8; INODE_SIZE]);

        inode.mode = 0o100644;
        assert_eq!(inode.mode_string(), "-rw-r--r--");

        inode.mode = 0o040755;
        assert_eq!(inode.mode_string(), "drwxr-xr-x");

        inode.mode = 0o100777;
        assert_eq!(inode.mode_string(), "-rwxrwxrwx");

        inode.mode = 0;
        assert_eq!(inode.mode_string(), "----------");

        // Device nodes and FIFOs report their bits but are not directories.
        inode.mode = 0o020666;
        assert_eq!(inode.mode_string(), "-rw-rw-rw-");
    }
}
