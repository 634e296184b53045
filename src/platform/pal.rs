//! Platform trait and implementations (Unix, mock).
//!
//! The scan core never touches platform-specific syscalls directly;
//! everything it needs beyond directory reading goes through [`Platform`].

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{PdError, Result};

/// Sentinel for records that never captured sub-second mtime.
/// Treated as matching any observed nanosecond value.
pub const NSEC_INVALID: i32 = -1;

/// Sentinel physical offset for files whose disk geometry is unknown.
pub const PHY_WITHOUT_OFFSET: u64 = u64::MAX;

/// Upper bound accepted for symlink targets.
pub const PATH_MAX: usize = 4096;

/// Entry classification derived from stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Symlink,
    Dir,
    /// Devices, sockets, fifos: skipped with a warning.
    Other,
}

/// Result of an lstat, in the fields the scan cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub mtime_sec: i64,
    pub mtime_nsec: i32,
    pub inode: u64,
    pub nlink: u64,
    pub device: u64,
    pub mode: u32,
    pub kind: EntryKind,
}

/// Filesystem capabilities relevant to identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    /// Whether inode numbers survive unmount/remount cycles.
    pub has_persistent_inode: bool,
}

/// OS abstraction used by the walker and the scan driver.
pub trait Platform {
    /// Stat a path without following symlinks.
    fn lstat(&self, path: &Path) -> Result<FileStat>;

    /// Read a symlink target as text, bounded by [`PATH_MAX`].
    fn read_link(&self, path: &Path) -> Result<String>;

    /// Probe the filesystem holding `dir` for capability flags.
    fn fs_info(&self, dir: &Path) -> Result<FsInfo>;

    /// Physical ordering key for a file, or [`PHY_WITHOUT_OFFSET`].
    fn physical_offset(&self, path: &Path, st: &FileStat) -> Result<u64>;

    /// Short description of a special file, for warnings.
    fn stat_desc(&self, st: &FileStat) -> &'static str {
        stat_desc_from_mode(st.mode)
    }
}

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct UnixPlatform;

impl UnixPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Platform for UnixPlatform {
    fn lstat(&self, path: &Path) -> Result<FileStat> {
        let meta = fs::symlink_metadata(path).map_err(|source| PdError::stat(path, source))?;
        Ok(stat_from_metadata(&meta))
    }

    fn read_link(&self, path: &Path) -> Result<String> {
        let target = fs::read_link(path).map_err(|source| PdError::ReadLink {
            path: path.to_path_buf(),
            details: source.to_string(),
        })?;
        let Some(text) = target.to_str() else {
            return Err(PdError::ReadLink {
                path: path.to_path_buf(),
                details: "symlink target is not valid UTF-8".to_string(),
            });
        };
        if text.len() >= PATH_MAX {
            return Err(PdError::ReadLink {
                path: path.to_path_buf(),
                details: "symlink target too long".to_string(),
            });
        }
        Ok(text.to_string())
    }

    #[cfg(target_os = "linux")]
    fn fs_info(&self, dir: &Path) -> Result<FsInfo> {
        use nix::sys::statfs::{FUSE_SUPER_MAGIC, MSDOS_SUPER_MAGIC, statfs};

        let stat = statfs(dir).map_err(|errno| PdError::FsInfo {
            path: dir.to_path_buf(),
            details: errno.to_string(),
        })?;
        let fs_type = stat.filesystem_type();

        // VFAT, exFAT, and FUSE-backed filesystems reassign inode numbers
        // across mounts; inode-based move detection is unsafe on them.
        let exfat = i128::from(fs_type.0) == 0x2011_BAB0;
        let persistent =
            fs_type != MSDOS_SUPER_MAGIC && fs_type != FUSE_SUPER_MAGIC && !exfat;
        Ok(FsInfo {
            has_persistent_inode: persistent,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn fs_info(&self, _dir: &Path) -> Result<FsInfo> {
        Ok(FsInfo {
            has_persistent_inode: true,
        })
    }

    fn physical_offset(&self, _path: &Path, _st: &FileStat) -> Result<u64> {
        // Geometry probing (FIEMAP and friends) belongs to the platform
        // collaborator; without it every file reports the sentinel and
        // physical ordering degrades to the walker order.
        Ok(PHY_WITHOUT_OFFSET)
    }
}

/// Deterministic wrapper for tests: real stat and readlink, configurable
/// capability answers and physical offsets.
#[derive(Debug, Default)]
pub struct MockPlatform {
    inner: UnixPlatform,
    pub persistent_inodes: bool,
    pub physical_offsets: HashMap<PathBuf, u64>,
}

impl MockPlatform {
    #[must_use]
    pub fn new(persistent_inodes: bool) -> Self {
        Self {
            inner: UnixPlatform::new(),
            persistent_inodes,
            physical_offsets: HashMap::new(),
        }
    }

    /// Assign the physical offset reported for a path.
    pub fn set_physical(&mut self, path: impl Into<PathBuf>, offset: u64) {
        self.physical_offsets.insert(path.into(), offset);
    }
}

impl Platform for MockPlatform {
    fn lstat(&self, path: &Path) -> Result<FileStat> {
        self.inner.lstat(path)
    }

    fn read_link(&self, path: &Path) -> Result<String> {
        self.inner.read_link(path)
    }

    fn fs_info(&self, _dir: &Path) -> Result<FsInfo> {
        Ok(FsInfo {
            has_persistent_inode: self.persistent_inodes,
        })
    }

    fn physical_offset(&self, path: &Path, _st: &FileStat) -> Result<u64> {
        Ok(self
            .physical_offsets
            .get(path)
            .copied()
            .unwrap_or(PHY_WITHOUT_OFFSET))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn stat_from_metadata(meta: &fs::Metadata) -> FileStat {
    let kind = if meta.file_type().is_file() {
        EntryKind::Regular
    } else if meta.file_type().is_symlink() {
        EntryKind::Symlink
    } else if meta.file_type().is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::Other
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        FileStat {
            size: meta.len(),
            mtime_sec: meta.mtime(),
            mtime_nsec: meta.mtime_nsec() as i32,
            inode: meta.ino(),
            nlink: meta.nlink(),
            device: meta.dev(),
            mode: meta.mode(),
            kind,
        }
    }
    #[cfg(not(unix))]
    {
        use std::time::UNIX_EPOCH;
        let (mtime_sec, mtime_nsec) = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or((0, NSEC_INVALID), |d| {
                (d.as_secs() as i64, d.subsec_nanos() as i32)
            });
        FileStat {
            size: meta.len(),
            mtime_sec,
            mtime_nsec,
            inode: 0,
            nlink: 1,
            device: 0,
            mode: 0,
            kind,
        }
    }
}

/// Describe a stat mode for special-file warnings.
#[must_use]
pub fn stat_desc_from_mode(mode: u32) -> &'static str {
    match mode & 0o170_000 {
        0o140_000 => "socket",
        0o120_000 => "symlink",
        0o100_000 => "regular",
        0o060_000 => "block-device",
        0o040_000 => "directory",
        0o020_000 => "char-device",
        0o010_000 => "fifo",
        _ => "unknown",
    }
}
