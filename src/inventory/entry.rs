//! Inventory record types: files, links, empty dirs, and parity blocks.

#![allow(missing_docs)]

use crate::platform::pal::{FileStat, NSEC_INVALID};

/// Size in bytes of a stored block hash.
pub const HASH_SIZE: usize = 16;

/// Relationship between a block's content and the parity covering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Parity reflects this block's hash.
    Blk,
    /// Content changed since parity was last updated.
    Chg,
    /// Never included in parity.
    New,
    /// Replaced by another phase; read-only to the scan.
    Rep,
}

/// One element of a file's block vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Index into the disk's block array.
    pub parity_pos: u32,
    pub state: BlockState,
    pub hash: [u8; HASH_SIZE],
}

/// Tombstone occupying a parity position after its file was removed.
/// Carries the last known hash so parity can still be retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedBlock {
    pub parity_pos: u32,
    pub hash: [u8; HASH_SIZE],
}

/// A regular file previously or currently known on a disk.
#[derive(Debug, Clone)]
pub struct File {
    /// Relative sub-path below the disk root, `/`-separated.
    pub sub: String,
    pub size: u64,
    pub mtime_sec: i64,
    /// Sub-second mtime, or [`NSEC_INVALID`] for legacy records.
    pub mtime_nsec: i32,
    pub inode: u64,
    /// Physical ordering key, or `PHY_WITHOUT_OFFSET`.
    pub physical: u64,
    /// Matched during the current scan.
    pub present: bool,
    /// Inode invalidated; the file is findable only by path.
    pub without_inode: bool,
    pub blocks: Vec<Block>,
}

impl File {
    /// Allocate a fresh file record with one block per `block_size` span.
    /// Parity positions are assigned later, when the file is committed.
    #[must_use]
    pub fn new(
        block_size: u32,
        sub: impl Into<String>,
        size: u64,
        mtime_sec: i64,
        mtime_nsec: i32,
        inode: u64,
        physical: u64,
    ) -> Self {
        let blockmax = usize::try_from(size.div_ceil(u64::from(block_size)))
            .expect("block count exceeds the address space");
        Self {
            sub: sub.into(),
            size,
            mtime_sec,
            mtime_nsec,
            inode,
            physical,
            present: false,
            without_inode: false,
            blocks: vec![
                Block {
                    parity_pos: 0,
                    state: BlockState::New,
                    hash: [0; HASH_SIZE],
                };
                blockmax
            ],
        }
    }

    /// Whether the stored metadata matches an observation. A stored
    /// [`NSEC_INVALID`] accepts any observed nanosecond value.
    #[must_use]
    pub fn matches_stat(&self, st: &FileStat) -> bool {
        self.size == st.size
            && self.mtime_sec == st.mtime_sec
            && (self.mtime_nsec == st.mtime_nsec || self.mtime_nsec == NSEC_INVALID)
    }
}

/// Kind of a link record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Symlink,
    Hardlink,
}

/// A symbolic link, or a hardlink record pointing at the first file
/// observed with the shared inode.
#[derive(Debug, Clone)]
pub struct Link {
    pub sub: String,
    pub linkto: String,
    pub kind: LinkKind,
    pub present: bool,
}

impl Link {
    #[must_use]
    pub fn new(sub: impl Into<String>, linkto: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            sub: sub.into(),
            linkto: linkto.into(),
            kind,
            present: false,
        }
    }
}

/// A leaf directory with no protected content, tracked so it can be
/// re-created on restore.
#[derive(Debug, Clone)]
pub struct EmptyDir {
    pub sub: String,
    pub present: bool,
}

impl EmptyDir {
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            present: false,
        }
    }
}
