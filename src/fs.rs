//! Inode lifecycle glue: composes the bitmap allocator, inode codec,
//! block mapper and directory table into the integration surface a
//! hosting layer consumes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::bitmap::{alloc_bit, free_bit, test_bit};
use crate::config::*;
use crate::directory::{
    dir_delete, dir_init_new, dir_insert, dir_is_empty, dir_iterate, dir_lookup,
};
use crate::inode::{self, now_secs};
use crate::superblock::{read_superblock, write_superblock};
use crate::{BlockDevice, Error, FileType, Inode, Result, S_IFDIR, S_IFMT, S_IFREG, SuperBlock};

pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: SuperBlock,
    /// Decoded inodes keyed by number. Owns the cached pointer tables;
    /// eviction drops the entry after its resources are released.
    icache: HashMap<u32, Inode>,
    /// Per-filesystem generation counter, randomly seeded at mount.
    generation: AtomicU32,
    /// Synchronous mount: metadata writes are flushed before returning.
    sync: bool,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats the device: superblock, both bitmaps with bit 0 pre-marked
    /// for the root directory, a zeroed inode table, and the root inode.
    /// Tooling-only; a formatted device is then used through `mount`.
    pub fn format(device: Arc<D>) -> Result<Self> {
        let superblock = SuperBlock::new(device.num_blocks() as u32)?;
        write_superblock(&*device, &superblock)?;

        // Bit 0 of each space is reserved for the root directory.
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        buf[0] = 1;
        device.write_block(IBITMAP_BLKID, buf.as_slice())?;
        device.write_block(DBITMAP_BLKID, buf.as_slice())?;

        buf.fill(0);
        for i in 0..superblock.inode_table_blocks {
            device.write_block(ITABLE_BLKID + i, buf.as_slice())?;
        }
        device.write_block(superblock.data_start, buf.as_slice())?;

        let now = now_secs();
        let mut root = Inode {
            ino: ROOT_INO,
            mode: S_IFDIR | 0o755,
            links: 1,
            uid: 0,
            gid: 0,
            size: 0,
            atime: now,
            ctime: now,
            mtime: now,
            generation: 0,
            flags: 0,
            blocks: 0,
            block: [0; NUM_DIRECT_PTRS],
            fresh: true,
        };
        inode::write_inode(&*device, &superblock, &mut root, false)?;

        log::info!(
            "formatted {} blocks, {} in the data region",
            superblock.total_blocks,
            superblock.data_blocks
        );

        Ok(Self::with_superblock(device, superblock, false))
    }

    /// Mounts a formatted device, validating the superblock against the
    /// device and the root inode against its expected shape.
    pub fn mount(device: Arc<D>, sync: bool) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        if superblock.total_blocks as usize > device.num_blocks() {
            log::error!(
                "filesystem size ({}) > disk size ({}), please re-format",
                superblock.total_blocks,
                device.num_blocks()
            );
            return Err(Error::InvalidSuperBlock);
        }

        let root = inode::read_inode(&*device, &superblock, ROOT_INO)?;
        if !root.is_dir() {
            log::error!("read root inode failed");
            return Err(Error::InvalidInode);
        }

        Ok(Self::with_superblock(device, superblock, sync))
    }

    fn with_superblock(device: Arc<D>, superblock: SuperBlock, sync: bool) -> Self {
        Self {
            device,
            superblock,
            icache: HashMap::new(),
            generation: AtomicU32::new(rand::random()),
            sync,
        }
    }

    fn iget(&mut self, ino: u32) -> Result<Inode> {
        if let Some(inode) = self.icache.get(&ino) {
            return Ok(*inode);
        }
        if !test_bit(&*self.device, IBITMAP_BLKID, ino).map_err(|_| Error::InvalidInode)? {
            return Err(Error::NotFound);
        }
        let inode = inode::read_inode(&*self.device, &self.superblock, ino)?;
        self.icache.insert(ino, inode);
        Ok(inode)
    }

    /// Claims an inode number and populates a fresh in-memory inode plus
    /// its (zero-filled) table slot.
    fn new_inode(&mut self, mode: u16) -> Result<Inode> {
        let ino = alloc_bit(&*self.device, IBITMAP_BLKID, MAX_INODES as u32, self.sync)?;
        log::trace!("ino:{}", ino);

        let now = now_secs();
        let mut inode = Inode {
            ino,
            mode,
            links: 1,
            uid: 0,
            gid: 0,
            size: 0,
            atime: now,
            ctime: now,
            mtime: now,
            generation: self.generation.fetch_add(1, Ordering::Relaxed),
            flags: 0,
            blocks: 0,
            block: [0; NUM_DIRECT_PTRS],
            fresh: true,
        };
        inode::write_inode(&*self.device, &self.superblock, &mut inode, self.sync)?;
        Ok(inode)
    }

    /// Creates a regular file named `name` under `parent`.
    pub fn create(&mut self, parent: u32, name: &[u8], mode: u16) -> Result<u32> {
        let mut dir = self.iget(parent)?;
        if !dir.is_dir() {
            return Err(Error::NotDirectory);
        }

        let inode = self.new_inode((mode & !S_IFMT) | S_IFREG)?;
        let ino = inode.ino;
        if let Err(e) = dir_insert(
            &*self.device,
            &self.superblock,
            &mut dir,
            name,
            ino,
            FileType::Regular,
            self.sync,
        ) {
            // The name was refused; release the claimed inode again.
            free_bit(&*self.device, IBITMAP_BLKID, ino, self.sync)?;
            return Err(e);
        }

        self.icache.insert(parent, dir);
        self.icache.insert(ino, inode);
        Ok(ino)
    }

    /// Creates a directory named `name` under `parent`, wiring up the
    /// "." / ".." slots and both link counts.
    pub fn mkdir(&mut self, parent: u32, name: &[u8], mode: u16) -> Result<u32> {
        let mut dir = self.iget(parent)?;
        if !dir.is_dir() {
            return Err(Error::NotDirectory);
        }

        let mut child = self.new_inode((mode & !S_IFMT) | S_IFDIR)?;
        let ino = child.ino;
        if let Err(e) = dir_insert(
            &*self.device,
            &self.superblock,
            &mut dir,
            name,
            ino,
            FileType::Directory,
            self.sync,
        ) {
            free_bit(&*self.device, IBITMAP_BLKID, ino, self.sync)?;
            return Err(e);
        }

        child.links += 1; // its own "."
        dir_init_new(&*self.device, &self.superblock, &mut child, parent, self.sync)?;

        dir.links += 1; // the child's ".."
        inode::write_inode(&*self.device, &self.superblock, &mut dir, self.sync)?;

        self.icache.insert(parent, dir);
        self.icache.insert(ino, child);
        Ok(ino)
    }

    /// Resolves `name` inside the directory `dir_ino`.
    pub fn lookup(&mut self, dir_ino: u32, name: &[u8]) -> Result<u32> {
        let mut dir = self.iget(dir_ino)?;
        dir_lookup(&*self.device, &self.superblock, &mut dir, name)
    }

    /// Removes the name of a regular file; the inode itself is evicted
    /// once its link count reaches zero.
    pub fn unlink(&mut self, dir_ino: u32, name: &[u8]) -> Result<()> {
        let mut dir = self.iget(dir_ino)?;
        let ino = dir_lookup(&*self.device, &self.superblock, &mut dir, name)?;
        let mut target = self.iget(ino)?;
        if target.is_dir() {
            return Err(Error::NotFile);
        }

        dir_delete(&*self.device, &self.superblock, &mut dir, name, self.sync)?;
        self.icache.insert(dir_ino, dir);

        target.links = target.links.saturating_sub(1);
        if target.links == 0 {
            self.evict(&mut target)?;
        } else {
            inode::write_inode(&*self.device, &self.superblock, &mut target, self.sync)?;
            self.icache.insert(ino, target);
        }
        Ok(())
    }

    /// Removes an empty directory. Drops the parent's ".." back-link and
    /// evicts the child.
    pub fn rmdir(&mut self, dir_ino: u32, name: &[u8]) -> Result<()> {
        let mut dir = self.iget(dir_ino)?;
        let ino = dir_lookup(&*self.device, &self.superblock, &mut dir, name)?;
        let mut child = self.iget(ino)?;
        if !child.is_dir() {
            return Err(Error::NotDirectory);
        }
        if !dir_is_empty(&*self.device, &self.superblock, &mut child)? {
            return Err(Error::NotEmpty);
        }

        dir_delete(&*self.device, &self.superblock, &mut dir, name, self.sync)?;
        dir.links = dir.links.saturating_sub(1);
        inode::write_inode(&*self.device, &self.superblock, &mut dir, self.sync)?;
        self.icache.insert(dir_ino, dir);

        child.links = 0;
        self.evict(&mut child)
    }

    /// Releases everything an unreferenced, unlinked inode holds. Data
    /// blocks are freed strictly before the inode bit is cleared: an
    /// interrupted sequence leaks a block rather than leaving a live
    /// pointer to freed space.
    fn evict(&mut self, inode: &mut Inode) -> Result<()> {
        for ptr in inode.block {
            if ptr == 0 {
                continue;
            }
            if ptr < self.superblock.data_start {
                log::warn!("ino {}: block pointer {} outside data region", inode.ino, ptr);
                continue;
            }
            free_bit(
                &*self.device,
                DBITMAP_BLKID,
                ptr - self.superblock.data_start,
                self.sync,
            )?;
        }
        free_bit(&*self.device, IBITMAP_BLKID, inode.ino, self.sync)?;
        self.icache.remove(&inode.ino);
        log::trace!("evicted ino:{}", inode.ino);
        Ok(())
    }

    /// Reads the in-memory image of an inode, decoding it from the table
    /// on a cache miss.
    pub fn read_inode(&mut self, ino: u32) -> Result<Inode> {
        self.iget(ino)
    }

    /// Writes an inode back to its table slot, flushing when the caller
    /// (or the mount) requests synchronous durability.
    pub fn write_inode(&mut self, inode: &Inode, sync: bool) -> Result<()> {
        let mut inode = *inode;
        inode::write_inode(
            &*self.device,
            &self.superblock,
            &mut inode,
            sync || self.sync,
        )?;
        self.icache.insert(inode.ino, inode);
        Ok(())
    }

    /// Maps a file-relative block index for `ino`, optionally extending
    /// the file by one freshly allocated block. `None` is a hole.
    pub fn resolve_block(&mut self, ino: u32, iblock: u32, create: bool) -> Result<Option<u32>> {
        let mut inode = self.iget(ino)?;
        let blkid = inode::resolve_block(
            &*self.device,
            &self.superblock,
            &mut inode,
            iblock,
            create,
            self.sync,
        )?;
        self.icache.insert(ino, inode);
        Ok(blkid)
    }

    /// Walks the live entries of a directory from a slot-aligned offset;
    /// returns the offset to resume from once `emit` runs out of room.
    pub fn iterate_directory(
        &mut self,
        dir_ino: u32,
        start_offset: u32,
        emit: &mut dyn FnMut(&[u8], u32, u8) -> bool,
    ) -> Result<u32> {
        let mut dir = self.iget(dir_ino)?;
        dir_iterate(&*self.device, &self.superblock, &mut dir, start_offset, emit)
    }

    pub fn root_ino(&self) -> u32 {
        ROOT_INO
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}
