//! Inode codec and the direct-pointer block mapper.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::bitmap::alloc_bit;
use crate::config::*;
use crate::{BlockDevice, Error, FileType, Inode, Result, SuperBlock};

/// Seconds since the epoch, truncated to the 32-bit on-disk field.
pub(crate) fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Maps an inode number to its slot in the inode table:
/// the table block index and the byte offset within that block.
pub fn locate(sb: &SuperBlock, ino: u32) -> Result<(u32, usize)> {
    // The inode bitmap addresses BITMAP_BITS inodes at most.
    if ino as usize >= BITMAP_BITS {
        log::error!("ino {} is too large, expect < {}", ino, BITMAP_BITS);
        return Err(Error::InvalidInode);
    }
    let blkid = ino / INODES_PER_BLOCK as u32;
    if blkid >= sb.inode_table_blocks {
        log::error!("ino {} is beyond the inode table", ino);
        return Err(Error::InvalidInode);
    }
    let offset = (ino as usize % INODES_PER_BLOCK) * INODE_SIZE;
    Ok((ITABLE_BLKID + blkid, offset))
}

impl Inode {
    /// Field-by-field little-endian decode of one 128-byte record.
    /// A record whose mode is neither a regular file nor a directory is
    /// rejected: the slot holds garbage or a stale occupant.
    pub fn decode(ino: u32, raw: &[u8]) -> Result<Self> {
        let le16 = |off: usize| u16::from_le_bytes(raw[off..off + 2].try_into().unwrap());
        let le32 = |off: usize| u32::from_le_bytes(raw[off..off + 4].try_into().unwrap());

        let mode = le16(0);
        if FileType::from_mode(mode).is_none() {
            log::error!("ino {}: wrong mode {:#x}", ino, mode);
            return Err(Error::InvalidInode);
        }

        let mut block = [0u32; NUM_DIRECT_PTRS];
        for (i, ptr) in block.iter_mut().enumerate() {
            *ptr = le32(40 + i * 4);
        }

        Ok(Self {
            ino,
            mode,
            links: le16(2),
            uid: le32(4),
            gid: le32(8),
            size: le32(12),
            atime: le32(16),
            ctime: le32(20),
            mtime: le32(24),
            generation: le32(28),
            flags: le32(32),
            blocks: le32(36),
            block,
            fresh: false,
        })
    }

    /// Field-by-field encode into a 128-byte record, including the cached
    /// direct-pointer table. A freshly allocated inode zero-fills the
    /// whole record first, so bytes of a previously deleted inode in the
    /// same slot are never observed.
    pub fn encode_into(&self, raw: &mut [u8]) {
        if self.fresh {
            raw[..INODE_SIZE].fill(0);
        }
        raw[0..2].copy_from_slice(&self.mode.to_le_bytes());
        raw[2..4].copy_from_slice(&self.links.to_le_bytes());
        raw[4..8].copy_from_slice(&self.uid.to_le_bytes());
        raw[8..12].copy_from_slice(&self.gid.to_le_bytes());
        raw[12..16].copy_from_slice(&self.size.to_le_bytes());
        raw[16..20].copy_from_slice(&self.atime.to_le_bytes());
        raw[20..24].copy_from_slice(&self.ctime.to_le_bytes());
        raw[24..28].copy_from_slice(&self.mtime.to_le_bytes());
        raw[28..32].copy_from_slice(&self.generation.to_le_bytes());
        raw[32..36].copy_from_slice(&self.flags.to_le_bytes());
        raw[36..40].copy_from_slice(&self.blocks.to_le_bytes());
        for (i, ptr) in self.block.iter().enumerate() {
            raw[40 + i * 4..44 + i * 4].copy_from_slice(&ptr.to_le_bytes());
        }
    }
}

/// Reads one inode record from the inode table.
pub fn read_inode(device: &impl BlockDevice, sb: &SuperBlock, ino: u32) -> Result<Inode> {
    let (blkid, offset) = locate(sb, ino)?;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(blkid, buf.as_mut_slice())?;
    Inode::decode(ino, &buf[offset..offset + INODE_SIZE])
}

/// Writes an inode record back to its table slot. Clears the freshly
/// allocated flag once the slot has been populated.
pub fn write_inode(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    inode: &mut Inode,
    sync: bool,
) -> Result<()> {
    let (blkid, offset) = locate(sb, inode.ino)?;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(blkid, buf.as_mut_slice())?;
    inode.encode_into(&mut buf[offset..offset + INODE_SIZE]);
    device.write_block(blkid, buf.as_slice())?;
    if sync {
        device.flush(blkid)?;
    }
    inode.fresh = false;
    Ok(())
}

/// Maps a file-relative block index to a physical block number.
///
/// A zero pointer slot is a hole: `Ok(None)` without `create`, a fresh
/// allocation from the data bitmap with it. Newly allocated blocks are
/// not zeroed here; callers extending a directory or file are expected
/// to initialize the block before exposing it.
pub fn resolve_block(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    inode: &mut Inode,
    iblock: u32,
    create: bool,
    sync: bool,
) -> Result<Option<u32>> {
    if iblock as usize >= NUM_DIRECT_PTRS {
        log::error!("ino {}: file size limitation", inode.ino);
        return Err(Error::OutOfSpace);
    }

    let old = inode.block[iblock as usize];
    if old != 0 {
        if old < sb.data_start || old >= sb.total_blocks {
            log::error!("ino {}: block pointer {} outside data region", inode.ino, old);
            return Err(Error::Io);
        }
        return Ok(Some(old));
    }

    if !create {
        return Ok(None);
    }

    let rel = alloc_bit(device, DBITMAP_BLKID, sb.data_blocks, sync)?;
    let blkid = sb.data_start + rel;
    inode.block[iblock as usize] = blkid;
    inode.blocks += 1;
    write_inode(device, sb, inode, sync)?;
    log::trace!("ino {}: mapped file block {} -> {}", inode.ino, iblock, blkid);
    Ok(Some(blkid))
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(ino: u32) -> Inode {
        Inode {
            ino,
            mode: crate::S_IFREG | 0o644,
            links: 2,
            uid: 1000,
            gid: 100,
            size: 12345,
            atime: 1,
            ctime: 2,
            mtime: 3,
            generation: 0xdead_beef,
            flags: 0,
            blocks: 2,
            block: [7; NUM_DIRECT_PTRS],
            fresh: false,
        }
    }

    #[test]
    fn codec_round_trip() {
        let inode = sample(5);
        let mut raw = [0u8; INODE_SIZE];
        inode.encode_into(&mut raw);
        assert_eq!(Inode::decode(5, &raw).unwrap(), inode);
    }

    #[test]
    fn fresh_encode_clears_stale_slot() {
        let mut raw = [0xffu8; INODE_SIZE];
        let mut inode = sample(5);
        inode.block = [0; NUM_DIRECT_PTRS];
        inode.fresh = true;
        inode.encode_into(&mut raw);
        // Reserved tail bytes of the old occupant must be gone.
        assert!(raw[104..].iter().all(|&b| b == 0));
        assert_eq!(Inode::decode(5, &raw).unwrap().block, [0; NUM_DIRECT_PTRS]);
    }

    #[test]
    fn decode_rejects_unknown_mode() {
        let raw = [0u8; INODE_SIZE];
        assert_eq!(Inode::decode(1, &raw), Err(Error::InvalidInode));
    }

    #[test]
    fn locate_splits_table_offset() {
        let sb = SuperBlock::new(200).unwrap();
        assert_eq!(locate(&sb, 0).unwrap(), (ITABLE_BLKID, 0));
        assert_eq!(locate(&sb, 33).unwrap(), (ITABLE_BLKID + 1, INODE_SIZE));
        assert_eq!(locate(&sb, BITMAP_BITS as u32), Err(Error::InvalidInode));
    }
}
