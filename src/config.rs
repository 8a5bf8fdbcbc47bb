pub const VERSION: u32 = 0x0001_0000;
pub const MAGIC: u16 = 0x1234;

pub const BLOCK_SIZE: usize = 4096;
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const ROOT_INO: u32 = 0;

// Fixed block indices of the metadata region. The region order is
// immutable: [superblock][inode bitmap][data bitmap][inode table][data].
pub const SUPERBLOCK_BLKID: u32 = 0;
pub const IBITMAP_BLKID: u32 = 1;
pub const DBITMAP_BLKID: u32 = 2;
pub const ITABLE_BLKID: u32 = 3;

/// Each bitmap spans one block and addresses BLOCK_SIZE bits (not
/// BLOCK_SIZE * 8). The narrower bound is part of the on-disk format;
/// it also makes the whole inode table addressable by one bitmap block.
pub const BITMAP_BITS: usize = BLOCK_SIZE;

pub const MAX_INODES: usize = BITMAP_BITS;
pub const ITABLE_BLOCKS: usize = MAX_INODES / INODES_PER_BLOCK; // 128

/// Files are mapped through direct pointers only, which caps the file
/// size at 16 blocks.
pub const NUM_DIRECT_PTRS: usize = 16;
pub const MAX_FILE_SIZE: usize = NUM_DIRECT_PTRS * BLOCK_SIZE;

// Directory entry slots are fixed 64 bytes:
// 4 (inode) + 1 (type) + 1 (name length) + 58 (name bytes).
pub const DIR_ENTRY_SIZE: usize = 64;
pub const MAX_NAME_LEN: usize = 58;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

pub const DOT_NAME: &[u8; 1] = b".";
pub const DOTDOT_NAME: &[u8; 2] = b"..";
