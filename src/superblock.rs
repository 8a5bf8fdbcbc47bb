//! Superblock codec and layout computation.

use rand::RngCore;

use crate::config::*;
use crate::{BlockDevice, Error, Result, SuperBlock};

impl SuperBlock {
    /// Computes the fixed layout for a device of `total_blocks` blocks.
    /// The metadata region occupies blocks 0..data_start; everything after
    /// belongs to the data region.
    pub fn new(total_blocks: u32) -> Result<Self> {
        let data_start = ITABLE_BLKID + ITABLE_BLOCKS as u32;
        if total_blocks <= data_start {
            log::error!(
                "device too small: {} blocks, need more than {}",
                total_blocks,
                data_start
            );
            return Err(Error::OutOfSpace);
        }

        let mut uuid = [0u8; 16];
        rand::rng().fill_bytes(&mut uuid);

        Ok(Self {
            version: VERSION,
            block_size: BLOCK_SIZE as u32,
            inode_size: INODE_SIZE as u32,
            total_blocks,
            inode_table_blocks: ITABLE_BLOCKS as u32,
            data_start,
            data_blocks: total_blocks - data_start,
            uuid,
            magic: MAGIC,
        })
    }

    pub fn decode(raw: &[u8]) -> Self {
        let le32 = |off: usize| u32::from_le_bytes(raw[off..off + 4].try_into().unwrap());
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&raw[28..44]);
        Self {
            version: le32(0),
            block_size: le32(4),
            inode_size: le32(8),
            total_blocks: le32(12),
            inode_table_blocks: le32(16),
            data_start: le32(20),
            data_blocks: le32(24),
            uuid,
            magic: u16::from_le_bytes(raw[44..46].try_into().unwrap()),
        }
    }

    pub fn encode_into(&self, raw: &mut [u8]) {
        raw[0..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..8].copy_from_slice(&self.block_size.to_le_bytes());
        raw[8..12].copy_from_slice(&self.inode_size.to_le_bytes());
        raw[12..16].copy_from_slice(&self.total_blocks.to_le_bytes());
        raw[16..20].copy_from_slice(&self.inode_table_blocks.to_le_bytes());
        raw[20..24].copy_from_slice(&self.data_start.to_le_bytes());
        raw[24..28].copy_from_slice(&self.data_blocks.to_le_bytes());
        raw[28..44].copy_from_slice(&self.uuid);
        raw[44..46].copy_from_slice(&self.magic.to_le_bytes());
    }
}

pub fn read_superblock<D: BlockDevice>(device: &D) -> Result<SuperBlock> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(SUPERBLOCK_BLKID, buf.as_mut_slice())?;
    let sb = SuperBlock::decode(buf.as_slice());

    if sb.magic != MAGIC {
        log::error!("wrong magic number {:#x} != {:#x}", sb.magic, MAGIC);
        return Err(Error::InvalidSuperBlock);
    }
    if sb.block_size != BLOCK_SIZE as u32 {
        log::error!("wrong block size {}, expect {}", sb.block_size, BLOCK_SIZE);
        return Err(Error::InvalidSuperBlock);
    }
    if sb.inode_size != INODE_SIZE as u32 {
        log::error!("wrong inode size {}, expect {}", sb.inode_size, INODE_SIZE);
        return Err(Error::InvalidSuperBlock);
    }
    // The metadata layout is fixed; a superblock describing a different
    // table geometry would be misaddressed by every table access.
    if sb.inode_table_blocks != ITABLE_BLOCKS as u32 {
        log::error!(
            "wrong inode table size {}, expect {}",
            sb.inode_table_blocks,
            ITABLE_BLOCKS
        );
        return Err(Error::InvalidSuperBlock);
    }
    if sb.data_start != ITABLE_BLKID + ITABLE_BLOCKS as u32 {
        log::error!("wrong data region start {}", sb.data_start);
        return Err(Error::InvalidSuperBlock);
    }
    if sb.data_blocks > sb.total_blocks || sb.data_start != sb.total_blocks - sb.data_blocks {
        return Err(Error::InvalidSuperBlock);
    }

    Ok(sb)
}

pub fn write_superblock<D: BlockDevice>(device: &D, sb: &SuperBlock) -> Result<()> {
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    sb.encode_into(buf.as_mut_slice());
    device.write_block(SUPERBLOCK_BLKID, buf.as_slice())?;
    device.flush(SUPERBLOCK_BLKID)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let sb = SuperBlock::new(200).unwrap();
        let mut raw = [0u8; BLOCK_SIZE];
        sb.encode_into(&mut raw);
        assert_eq!(SuperBlock::decode(&raw), sb);
    }

    #[test]
    fn layout_regions_in_order() {
        let sb = SuperBlock::new(200).unwrap();
        assert_eq!(sb.data_start, 3 + ITABLE_BLOCKS as u32);
        assert_eq!(sb.data_blocks, 200 - sb.data_start);
    }

    #[test]
    fn rejects_tiny_device() {
        assert_eq!(SuperBlock::new(16), Err(Error::OutOfSpace));
    }
}
