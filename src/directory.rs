//! Directory entry tables: fixed 64-byte slots stored in a directory's
//! own data blocks, reached through the same block mapping as regular
//! files. A directory's logical size marks the end of the scanned
//! region; it only ever grows, by appending one slot at a time.

use crate::config::*;
use crate::inode::{now_secs, resolve_block, write_inode};
use crate::{BlockDevice, DirEntry, Error, FileType, Inode, Result, SuperBlock};

impl DirEntry {
    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; MAX_NAME_LEN];
        name.copy_from_slice(&raw[6..DIR_ENTRY_SIZE]);
        Self {
            ino: u32::from_le_bytes(raw[0..4].try_into().unwrap()),
            file_type: raw[4],
            name_len: raw[5],
            name,
        }
    }

    pub fn encode_into(&self, raw: &mut [u8]) {
        raw[0..4].copy_from_slice(&self.ino.to_le_bytes());
        raw[4] = self.file_type;
        raw[5] = self.name_len;
        raw[6..DIR_ENTRY_SIZE].copy_from_slice(&self.name);
    }
}

/// Resolves a directory-relative block index that must already be mapped;
/// a hole below the logical size means the table is corrupt.
fn dir_block(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
    iblock: u32,
) -> Result<u32> {
    match resolve_block(device, sb, dir, iblock, false, false)? {
        Some(blkid) => Ok(blkid),
        None => {
            log::error!("ino {}: directory block {} is a hole", dir.ino, iblock);
            Err(Error::Io)
        }
    }
}

/// Queries the inode number bound to `name`. Slots past the logical size
/// are never examined; free slots before it are skipped.
pub fn dir_lookup(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
    name: &[u8],
) -> Result<u32> {
    if !dir.is_dir() {
        return Err(Error::NotDirectory);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }

    let size = dir.size;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    let mut pos: u32 = 0;
    let mut iblock = 0;
    while pos < size {
        let blkid = dir_block(device, sb, dir, iblock)?;
        device.read_block(blkid, buf.as_mut_slice())?;
        for chunk in buf.chunks_exact(DIR_ENTRY_SIZE) {
            if pos >= size {
                break;
            }
            let entry = DirEntry::decode(chunk);
            if !entry.is_free() && entry.name() == name {
                return Ok(entry.ino);
            }
            pos += DIR_ENTRY_SIZE as u32;
        }
        iblock += 1;
    }

    Err(Error::NotFound)
}

fn commit_slot(
    device: &impl BlockDevice,
    buf: &mut [u8],
    blkid: u32,
    offset: usize,
    entry: &DirEntry,
    sync: bool,
) -> Result<()> {
    entry.encode_into(&mut buf[offset..offset + DIR_ENTRY_SIZE]);
    device.write_block(blkid, buf)?;
    if sync {
        device.flush(blkid)?;
    }
    Ok(())
}

fn touch(dir: &mut Inode) {
    let now = now_secs();
    dir.mtime = now;
    dir.ctime = now;
}

/// Binds `name` to `ino` in `dir`. The scan walks slots in block order:
/// the first free slot before the logical end of the directory is reused;
/// reaching the append point extends the logical size by one slot width.
/// A live slot already carrying `name` fails the insert.
pub fn dir_insert(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
    name: &[u8],
    ino: u32,
    file_type: FileType,
    sync: bool,
) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::NotDirectory);
    }
    let entry = DirEntry::new(ino, file_type, name)?;

    let size = dir.size;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    let mut iblock: u32 = 0;
    loop {
        let base = iblock * ENTRIES_PER_BLOCK as u32;
        if base * DIR_ENTRY_SIZE as u32 == size {
            // Append point at the start of a not-yet-mapped block. The
            // mapper does not zero new blocks, so initialize the whole
            // slot table before publishing the first entry.
            let blkid = match resolve_block(device, sb, dir, iblock, true, sync)? {
                Some(blkid) => blkid,
                None => return Err(Error::Io),
            };
            buf.fill(0);
            commit_slot(device, buf.as_mut_slice(), blkid, 0, &entry, sync)?;
            dir.size = size + DIR_ENTRY_SIZE as u32;
            touch(dir);
            write_inode(device, sb, dir, sync)?;
            return Ok(());
        }

        let blkid = dir_block(device, sb, dir, iblock)?;
        device.read_block(blkid, buf.as_mut_slice())?;
        for slot in 0..ENTRIES_PER_BLOCK {
            let pos = (base + slot as u32) * DIR_ENTRY_SIZE as u32;
            let offset = slot * DIR_ENTRY_SIZE;
            if pos == size {
                // Append point within a mapped block.
                commit_slot(device, buf.as_mut_slice(), blkid, offset, &entry, sync)?;
                dir.size = size + DIR_ENTRY_SIZE as u32;
                touch(dir);
                write_inode(device, sb, dir, sync)?;
                return Ok(());
            }
            let cur = DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE]);
            if cur.is_free() {
                // Reuse a freed slot; the logical size stays put.
                commit_slot(device, buf.as_mut_slice(), blkid, offset, &entry, sync)?;
                touch(dir);
                write_inode(device, sb, dir, sync)?;
                return Ok(());
            }
            if cur.name() == name {
                return Err(Error::AlreadyExists);
            }
        }
        iblock += 1;
    }
}

/// Unbinds `name` from `dir` by zeroing its slot, leaving it free for
/// reuse. The logical size never shrinks. Returns the inode number the
/// slot held; adjusting its link count is the caller's responsibility.
pub fn dir_delete(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
    name: &[u8],
    sync: bool,
) -> Result<u32> {
    if !dir.is_dir() {
        return Err(Error::NotDirectory);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }

    let size = dir.size;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    let mut pos: u32 = 0;
    let mut iblock = 0;
    while pos < size {
        let blkid = dir_block(device, sb, dir, iblock)?;
        device.read_block(blkid, buf.as_mut_slice())?;
        for slot in 0..ENTRIES_PER_BLOCK {
            if pos >= size {
                break;
            }
            let offset = slot * DIR_ENTRY_SIZE;
            let entry = DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE]);
            if !entry.is_free() && entry.name() == name {
                buf[offset..offset + DIR_ENTRY_SIZE].fill(0);
                device.write_block(blkid, buf.as_slice())?;
                if sync {
                    device.flush(blkid)?;
                }
                touch(dir);
                write_inode(device, sb, dir, sync)?;
                return Ok(entry.ino);
            }
            pos += DIR_ENTRY_SIZE as u32;
        }
        iblock += 1;
    }

    Err(Error::NotFound)
}

/// Walks live slots starting from a slot-aligned byte offset, handing
/// each to `emit`. Stops as soon as `emit` reports it is out of capacity
/// and returns the offset of the slot that was not consumed, so a paused
/// listing resumes exactly there. Returns the logical size when the walk
/// completes.
pub fn dir_iterate(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
    start_offset: u32,
    emit: &mut dyn FnMut(&[u8], u32, u8) -> bool,
) -> Result<u32> {
    if !dir.is_dir() {
        return Err(Error::NotDirectory);
    }

    let size = dir.size;
    let mut pos = start_offset - start_offset % DIR_ENTRY_SIZE as u32;
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    let mut loaded = None;
    while pos < size {
        let iblock = pos / BLOCK_SIZE as u32;
        if loaded != Some(iblock) {
            let blkid = dir_block(device, sb, dir, iblock)?;
            device.read_block(blkid, buf.as_mut_slice())?;
            loaded = Some(iblock);
        }
        let offset = pos as usize % BLOCK_SIZE;
        let entry = DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE]);
        if !entry.is_free() && !emit(entry.name(), entry.ino, entry.file_type) {
            return Ok(pos);
        }
        pos += DIR_ENTRY_SIZE as u32;
    }

    Ok(pos)
}

/// A directory is empty when every live slot before its logical size is
/// one of the synthetic "." / ".." entries.
pub fn dir_is_empty(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
) -> Result<bool> {
    let mut empty = true;
    dir_iterate(device, sb, dir, 0, &mut |name, _, _| {
        if name != DOT_NAME && name != DOTDOT_NAME {
            empty = false;
            return false;
        }
        true
    })?;
    Ok(empty)
}

/// Populates a brand-new directory with its "." and ".." slots. These
/// two are written by hand into fixed positions, outside the generic
/// insert path: there is nothing to scan and no duplicate to check.
pub fn dir_init_new(
    device: &impl BlockDevice,
    sb: &SuperBlock,
    dir: &mut Inode,
    parent_ino: u32,
    sync: bool,
) -> Result<()> {
    let blkid = match resolve_block(device, sb, dir, 0, true, sync)? {
        Some(blkid) => blkid,
        None => return Err(Error::Io),
    };

    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    let dot = DirEntry::new(dir.ino, FileType::Directory, DOT_NAME)?;
    let dotdot = DirEntry::new(parent_ino, FileType::Directory, DOTDOT_NAME)?;
    dot.encode_into(&mut buf[..DIR_ENTRY_SIZE]);
    dotdot.encode_into(&mut buf[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE]);
    device.write_block(blkid, buf.as_slice())?;
    if sync {
        device.flush(blkid)?;
    }

    dir.size = 2 * DIR_ENTRY_SIZE as u32;
    touch(dir);
    write_inode(device, sb, dir, sync)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entry_codec_round_trip() {
        let entry = DirEntry::new(42, FileType::Regular, b"hello.txt").unwrap();
        let mut raw = [0xaau8; DIR_ENTRY_SIZE];
        entry.encode_into(&mut raw);
        let back = DirEntry::decode(&raw);
        assert_eq!(back.ino, 42);
        assert_eq!(back.file_type, FileType::Regular as u8);
        assert_eq!(back.name(), b"hello.txt");
    }

    #[test]
    fn entry_name_bounds() {
        assert!(DirEntry::new(1, FileType::Regular, &[b'a'; MAX_NAME_LEN]).is_ok());
        assert_eq!(
            DirEntry::new(1, FileType::Regular, &[b'a'; MAX_NAME_LEN + 1]),
            Err(Error::NameTooLong)
        );
        assert_eq!(DirEntry::new(1, FileType::Regular, b""), Err(Error::NameTooLong));
    }

    #[test]
    fn zeroed_slot_is_free() {
        assert!(DirEntry::decode(&[0u8; DIR_ENTRY_SIZE]).is_free());
    }
}
