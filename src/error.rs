use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("out of space")]
    OutOfSpace,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("entry not found")]
    NotFound,
    #[error("name exceeds the fixed slot capacity")]
    NameTooLong,
    #[error("invalid inode")]
    InvalidInode,
    #[error("not a directory")]
    NotDirectory,
    #[error("not a regular file")]
    NotFile,
    #[error("directory not empty")]
    NotEmpty,
    #[error("invalid superblock")]
    InvalidSuperBlock,
    #[error("block id out of range")]
    InvalidBlockId,
    #[error("i/o failure")]
    Io,
}

pub type Result<T> = core::result::Result<T, FsError>;
