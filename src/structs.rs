use crate::config::*;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub version: u32,
    pub block_size: u32,         // Fixed to BLOCK_SIZE
    pub inode_size: u32,         // Fixed to INODE_SIZE
    pub total_blocks: u32,       // Total block count, metadata included
    pub inode_table_blocks: u32, // Inode table block count
    pub data_start: u32,         // First block of the data region
    pub data_blocks: u32,        // Data region block count
    pub uuid: [u8; 16],
    pub magic: u16,
}

// File format bits of the 16-bit mode field. Only regular files and
// directories are valid on disk.
pub const S_IFMT: u16 = 0xf000;
pub const S_IFREG: u16 = 0x8000;
pub const S_IFDIR: u16 = 0x4000;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
}

impl FileType {
    pub fn from_mode(mode: u16) -> Option<Self> {
        match mode & S_IFMT {
            S_IFREG => Some(FileType::Regular),
            S_IFDIR => Some(FileType::Directory),
            _ => None,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(FileType::Regular),
            2 => Some(FileType::Directory),
            _ => None,
        }
    }
}

/// In-memory image of one 128-byte inode record, addressed by `ino`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub ino: u32,
    pub mode: u16,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub generation: u32,
    pub flags: u32,
    pub blocks: u32,
    pub block: [u32; NUM_DIRECT_PTRS],
    /// Freshly allocated, not yet flushed. The on-disk slot may still hold
    /// bytes of a previously deleted inode, so the first write-back
    /// zero-fills the whole record.
    pub fresh: bool,
}

impl Inode {
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }
}

/// Fixed 64-byte directory entry slot. A slot with `name_len == 0` is
/// free; the name buffer is not terminated, the length is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u32,
    pub file_type: u8,
    pub name_len: u8,
    pub name: [u8; MAX_NAME_LEN],
}

impl DirEntry {
    pub fn new(ino: u32, file_type: FileType, name: &[u8]) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong);
        }
        let mut buf = [0u8; MAX_NAME_LEN];
        buf[..name.len()].copy_from_slice(name);
        Ok(Self {
            ino,
            file_type: file_type as u8,
            name_len: name.len() as u8,
            name: buf,
        })
    }

    pub fn is_free(&self) -> bool {
        self.name_len == 0
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..self.name_len as usize]
    }
}
