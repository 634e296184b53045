//! Recursive directory traversal.
//!
//! Each directory is read in full, filtered before any stat where
//! possible, optionally sorted by inode for readdir-vs-stat locality,
//! and then classified entry by entry into regular files, symlinks,
//! directories, and skipped specials. The walk reports whether anything
//! inside was scanned, so leaf directories with no protected content
//! become empty-dir records.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{PdError, Result};
use crate::inventory::entry::LinkKind;
use crate::platform::pal::{EntryKind, FileStat};
use crate::scanner::driver::ScanCtx;
use crate::scanner::resolve;

/// One directory entry captured before processing, so the directory
/// handle is released and the batch can be sorted.
struct WalkEntry {
    path: PathBuf,
    sub: String,
    inode: u64,
    kind_hint: Option<EntryKind>,
}

fn entry_inode(entry: &fs::DirEntry) -> u64 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirEntryExt;
        entry.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = entry;
        0
    }
}

fn kind_of(file_type: fs::FileType) -> EntryKind {
    if file_type.is_file() {
        EntryKind::Regular
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::Other
    }
}

/// Walk one directory of a disk. `sub` is the `/`-terminated sub-path
/// of `dir` below the disk root, empty for the root itself.
///
/// Returns whether at least one file or link inside (recursively) was
/// scanned.
pub(crate) fn scan_dir(ctx: &mut ScanCtx<'_>, dir: &Path, sub: &str) -> Result<bool> {
    let mut processed = false;

    let read = fs::read_dir(dir).map_err(|source| PdError::DirRead {
        path: dir.to_path_buf(),
        sub: sub.to_string(),
        source,
    })?;

    // Materialize the directory so the handle closes early and the
    // batch can be sorted; filters that need no stat run now.
    let mut entries: Vec<WalkEntry> = Vec::new();
    for item in read {
        let item = item.map_err(|source| PdError::DirRead {
            path: dir.to_path_buf(),
            sub: sub.to_string(),
            source,
        })?;

        let name = item.file_name();
        let Some(name) = name.to_str() else {
            return Err(PdError::InvalidName {
                path: dir.to_path_buf(),
            });
        };

        let path = dir.join(name);
        if ctx.filter.filter_hidden(name) {
            ctx.log
                .verbose_note(&format!("Excluding hidden '{}'", path.display()));
            continue;
        }
        if ctx.filter.filter_content(&path) {
            ctx.log
                .verbose_note(&format!("Excluding content '{}'", path.display()));
            continue;
        }

        entries.push(WalkEntry {
            sub: format!("{sub}{name}"),
            inode: entry_inode(&item),
            kind_hint: item.file_type().ok().map(kind_of),
            path,
        });
    }

    // With persistent inodes a stable inode sort improves locality
    // between the directory read and the per-entry stats.
    if !ctx.disk.has_not_persistent_inodes {
        entries.sort_by_key(|entry| entry.inode);
    }

    for entry in entries {
        let mut st: Option<FileStat> = None;
        let kind = match entry.kind_hint {
            Some(kind) => kind,
            None => {
                let stat = ctx.platform.lstat(&entry.path)?;
                let kind = stat.kind;
                st = Some(stat);
                kind
            }
        };

        match kind {
            EntryKind::Regular => {
                if ctx.filter.filter_path(&ctx.disk.name, &entry.sub) {
                    ctx.log
                        .verbose_note(&format!("Excluding file '{}'", entry.path.display()));
                    continue;
                }
                let st = match st {
                    Some(st) => st,
                    None => ctx.platform.lstat(&entry.path)?,
                };
                let physical = if ctx.opts.force_order
                    == crate::core::config::SortOrder::Physical
                {
                    ctx.platform.physical_offset(&entry.path, &st)?
                } else {
                    0
                };
                resolve::scan_file(ctx, &entry.sub, &st, physical)?;
                processed = true;
            }
            EntryKind::Symlink => {
                if ctx.filter.filter_path(&ctx.disk.name, &entry.sub) {
                    ctx.log
                        .verbose_note(&format!("Excluding link '{}'", entry.path.display()));
                    continue;
                }
                let linkto = ctx.platform.read_link(&entry.path)?;
                resolve::scan_link(ctx, &entry.sub, linkto, LinkKind::Symlink)?;
                processed = true;
            }
            EntryKind::Dir => {
                if ctx.filter.filter_dir(&ctx.disk.name, &entry.sub) {
                    ctx.log.verbose_note(&format!(
                        "Excluding directory '{}'",
                        entry.path.display()
                    ));
                    continue;
                }
                let st = match st {
                    Some(st) => st,
                    None => ctx.platform.lstat(&entry.path)?,
                };
                // Never cross a mount boundary inside a disk.
                if st.device != ctx.disk.device {
                    ctx.log.warning(&format!(
                        "WARNING! Ignoring mount point '{}' because it appears to be in a different device",
                        entry.path.display()
                    ));
                    continue;
                }
                let sub_dir = format!("{}/", entry.sub);
                if !scan_dir(ctx, &entry.path, &sub_dir)? {
                    resolve::scan_emptydir(ctx, &entry.sub)?;
                }
                // Either something inside was scanned, or the empty dir
                // itself was.
                processed = true;
            }
            EntryKind::Other => {
                if ctx.filter.filter_path(&ctx.disk.name, &entry.sub) {
                    ctx.log.verbose_note(&format!(
                        "Excluding special file '{}'",
                        entry.path.display()
                    ));
                    continue;
                }
                let st = match st {
                    Some(st) => st,
                    None => ctx.platform.lstat(&entry.path)?,
                };
                ctx.log.warning(&format!(
                    "WARNING! Ignoring special '{}' file '{}'",
                    ctx.platform.stat_desc(&st),
                    entry.path.display()
                ));
            }
        }
    }

    Ok(processed)
}
