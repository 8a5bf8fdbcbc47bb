//! Quark is a minimal block-device filesystem core: the fixed on-disk
//! layout plus the allocation, codec and directory-table algorithms that
//! maintain it. The hosting layer brings its own caching, buffered I/O
//! and path walking; this crate owns the format.
//!
//! Linear on-disk layout (4096-byte blocks):
//! - Block 0: superblock
//! - Block 1: inode bitmap (bit i <=> inode i)
//! - Block 2: data-block bitmap (bit i <=> data block i, region-relative)
//! - Blocks 3..131: inode table, 128-byte records
//! - Remaining blocks: data region (file payload and directory tables)
//!
//! Layers, from bottom to top:
//! 1. Block device: user-implemented storage abstraction (`BlockDevice`).
//! 2. Bitmaps: allocation state of the inode and data-block spaces.
//! 3. Inode: record codec and direct-pointer block mapping.
//! 4. Directory: fixed 64-byte entry slots in a directory's data blocks.
//! 5. FileSystem: lifecycle glue (create/mkdir/lookup/unlink/rmdir).

#![allow(unused)]

mod bitmap;
mod block_dev;
mod config;
mod directory;
mod error;
mod fs;
mod inode;
mod structs;
mod superblock;

pub use bitmap::{alloc_bit, free_bit, test_bit};
pub use block_dev::BlockDevice;
pub use config::*;
pub use directory::{dir_delete, dir_init_new, dir_insert, dir_is_empty, dir_iterate, dir_lookup};
pub use error::FsError as Error;
pub use error::Result;
pub use fs::FileSystem;
pub use inode::{locate, read_inode, resolve_block, write_inode};
pub use structs::*;
pub use superblock::{read_superblock, write_superblock};
