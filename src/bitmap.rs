//! Single-block bitmap allocator, shared by the inode and data-block
//! spaces. Bit set means the resource is in use. Data bitmap indices are
//! relative to the data region's first block.

use crate::config::*;
use crate::{BlockDevice, Error, Result};

/// Scans for the lowest unset bit, sets it and writes the bitmap block
/// back. The persisted block is the single source of truth; with `sync`
/// the write is flushed before returning.
///
/// `limit` bounds the scan to the actually usable bits of the space
/// (inode count, or data region block count).
pub fn alloc_bit(
    device: &impl BlockDevice,
    bitmap_blkid: u32,
    limit: u32,
    sync: bool,
) -> Result<u32> {
    let limit = (limit as usize).min(BITMAP_BITS);
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(bitmap_blkid, buf.as_mut_slice())?;

    for index in 0..limit {
        let byte = index / 8;
        let bit = index % 8;
        if buf[byte] & (1 << bit) == 0 {
            buf[byte] |= 1 << bit;
            device.write_block(bitmap_blkid, buf.as_slice())?;
            if sync {
                device.flush(bitmap_blkid)?;
            }
            log::trace!("bitmap block {}: allocated bit {}", bitmap_blkid, index);
            return Ok(index as u32);
        }
    }

    log::error!("bitmap block {}: no free bit in {}", bitmap_blkid, limit);
    Err(Error::OutOfSpace)
}

/// Clears a bit unconditionally. Freeing an already-free bit is a silent
/// no-op, so release paths may be replayed safely.
pub fn free_bit(
    device: &impl BlockDevice,
    bitmap_blkid: u32,
    index: u32,
    sync: bool,
) -> Result<()> {
    if index as usize >= BITMAP_BITS {
        return Err(Error::InvalidBlockId);
    }

    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(bitmap_blkid, buf.as_mut_slice())?;
    buf[index as usize / 8] &= !(1 << (index % 8));
    device.write_block(bitmap_blkid, buf.as_slice())?;
    if sync {
        device.flush(bitmap_blkid)?;
    }
    log::trace!("bitmap block {}: freed bit {}", bitmap_blkid, index);
    Ok(())
}

/// Reads the allocation state of one bit.
pub fn test_bit(device: &impl BlockDevice, bitmap_blkid: u32, index: u32) -> Result<bool> {
    if index as usize >= BITMAP_BITS {
        return Err(Error::InvalidBlockId);
    }

    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(bitmap_blkid, buf.as_mut_slice())?;
    Ok(buf[index as usize / 8] & (1 << (index % 8)) != 0)
}
