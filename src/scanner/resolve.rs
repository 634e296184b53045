//! Identity resolution for observed files, links, and empty dirs.
//!
//! A regular-file observation resolves, in order, against the inode
//! index (equal, move, hardlink), then the path index (restore, equal,
//! change), and finally falls through to insertion. Links and empty
//! dirs resolve by path alone.

use crate::core::errors::{PdError, Result};
use crate::inventory::entry::{EmptyDir, File, Link, LinkKind};
use crate::platform::pal::{FileStat, NSEC_INVALID};
use crate::scanner::driver::ScanCtx;

/// Process one regular-file observation.
pub(crate) fn scan_file(
    ctx: &mut ScanCtx<'_>,
    sub: &str,
    st: &FileStat,
    physical: u64,
) -> Result<()> {
    // Search by inode first, to detect moved files. On disks without
    // persistent inodes the pre-pass erased the index, so this never
    // matches there.
    if let Some(id) = ctx.disk.file_by_inode(st.inode) {
        if ctx.disk.file(id).matches_stat(st) {
            if ctx.disk.file(id).present {
                if st.nlink > 1 {
                    let linkto = ctx.disk.file(id).sub.clone();
                    return scan_link(ctx, sub, linkto, LinkKind::Hardlink);
                }
                return Err(PdError::internal(format!(
                    "inode {} for file '{}' already present",
                    st.inode,
                    ctx.disk.dir.join(sub).display()
                )));
            }

            {
                let file = ctx.disk.file_mut(id);
                file.present = true;
                // Upgrade records predating sub-second mtimes.
                if file.mtime_nsec == NSEC_INVALID && st.mtime_nsec != NSEC_INVALID {
                    file.mtime_nsec = st.mtime_nsec;
                    *ctx.need_write = true;
                }
            }

            let old_sub = ctx.disk.file(id).sub.clone();
            if old_sub == sub {
                ctx.counters.equal += 1;
                ctx.log.event("equal", &ctx.disk.name, sub);
            } else {
                // Same inode under a different path: a moved file.
                ctx.counters.moved += 1;
                ctx.log.event2("move", &ctx.disk.name, &old_sub, sub);
                ctx.log.print(&format!(
                    "Move '{}' '{}'",
                    ctx.disk.dir.join(&old_sub).display(),
                    ctx.disk.dir.join(sub).display()
                ));
                ctx.disk.rename_file(id, sub)?;
                *ctx.need_write = true;
            }
            return Ok(());
        }

        // The inode matches but the metadata does not: a renamed and
        // edited file, or an inode reassigned to an unrelated one.
        if ctx.disk.file(id).present {
            return Err(PdError::internal(format!(
                "inode {} already present while observing '{}'",
                st.inode,
                ctx.disk.dir.join(sub).display()
            )));
        }
        // Assume a reassigned inode, the worst case. A path lookup (not
        // necessarily in this call) restores the binding when warranted;
        // otherwise the record falls to the removal sweep.
        ctx.disk.detach_inode(id);
    }

    // Then search by path.
    if let Some(id) = ctx.disk.file_by_path(sub) {
        if ctx.disk.file(id).without_inode {
            ctx.disk.rebind_inode(id, st.inode)?;
        } else if ctx.disk.file(id).inode == st.inode {
            return Err(PdError::internal(format!(
                "inode {} for file '{}' missing from the inode index",
                st.inode,
                ctx.disk.dir.join(sub).display()
            )));
        }
        if ctx.disk.file(id).present {
            return Err(PdError::internal(format!(
                "path '{}' already present",
                ctx.disk.dir.join(sub).display()
            )));
        }

        if ctx.disk.file(id).matches_stat(st) {
            {
                let file = ctx.disk.file_mut(id);
                file.present = true;
                if file.mtime_nsec == NSEC_INVALID && st.mtime_nsec != NSEC_INVALID {
                    file.mtime_nsec = st.mtime_nsec;
                    *ctx.need_write = true;
                }
            }

            if ctx.disk.has_not_persistent_inodes {
                // Inode numbers carry no meaning here, so a differing
                // one is not evidence of anything.
                ctx.counters.equal += 1;
                ctx.log.event("equal", &ctx.disk.name, sub);
            } else {
                // With persistent inodes the number is known to differ,
                // or the inode search would have found the file: a
                // rewrite with identical content and metadata, e.g. a
                // restored backup.
                ctx.counters.restored += 1;
                ctx.log.event("restore", &ctx.disk.name, sub);
                ctx.log
                    .print(&format!("Restore '{}'", ctx.disk.dir.join(sub).display()));
                ctx.disk.rebind_inode(id, st.inode)?;
                *ctx.need_write = true;
            }
            return Ok(());
        }

        // Same path, different metadata: a change. Guard against the
        // ext4 post-crash truncation to zero propagating into parity.
        let old_size = ctx.disk.file(id).size;
        if old_size != 0 && st.size == 0 && !ctx.opts.force_zero {
            return Err(PdError::ZeroSize {
                path: ctx.disk.dir.join(sub),
                command: ctx.opts.command.clone(),
            });
        }

        ctx.counters.changed += 1;
        ctx.log.event("update", &ctx.disk.name, sub);
        let detail = if old_size == st.size {
            "new modification time"
        } else {
            "new size"
        };
        ctx.log.print(&format!(
            "Update '{}' {detail}",
            ctx.disk.dir.join(sub).display()
        ));
        *ctx.need_write = true;
        ctx.disk.remove_file(id, ctx.clear_undetermined_hash)?;
        // Fall through and reinsert it.
    } else {
        // Unknown path: a new file.
        ctx.counters.inserted += 1;
        ctx.log.event("add", &ctx.disk.name, sub);
        ctx.log
            .print(&format!("Add '{}'", ctx.disk.dir.join(sub).display()));
    }

    // Index the file now, so duplicate hardlinks are found within this
    // walk; parity positions are bound after the removal phase.
    let mut file = File::new(
        ctx.block_size,
        sub,
        st.size,
        st.mtime_sec,
        st.mtime_nsec,
        st.inode,
        physical,
    );
    file.present = true;
    let id = ctx.disk.register_file(file)?;
    ctx.defer.files.push(id);
    Ok(())
}

/// Process a symlink observation, or record a hardlink.
pub(crate) fn scan_link(
    ctx: &mut ScanCtx<'_>,
    sub: &str,
    linkto: String,
    kind: LinkKind,
) -> Result<()> {
    if let Some(link) = ctx.disk.link_by_path(sub) {
        if link.present {
            return Err(PdError::internal(format!(
                "link '{}' already present",
                ctx.disk.dir.join(sub).display()
            )));
        }
        let unchanged = link.linkto == linkto && link.kind == kind;

        let link = ctx
            .disk
            .link_mut(sub)
            .ok_or_else(|| PdError::internal(format!("link '{sub}' vanished from the index")))?;
        link.present = true;
        if unchanged {
            ctx.counters.equal += 1;
            ctx.log.event("equal", &ctx.disk.name, sub);
        } else {
            link.linkto = linkto;
            link.kind = kind;
            ctx.counters.changed += 1;
            ctx.log.event("update", &ctx.disk.name, sub);
            ctx.log
                .print(&format!("Update '{}'", ctx.disk.dir.join(sub).display()));
            *ctx.need_write = true;
        }
        return Ok(());
    }

    ctx.counters.inserted += 1;
    ctx.log.event("add", &ctx.disk.name, sub);
    ctx.log
        .print(&format!("Add '{}'", ctx.disk.dir.join(sub).display()));

    let mut link = Link::new(sub, linkto, kind);
    link.present = true;
    ctx.defer.links.push(link);
    Ok(())
}

/// Process a leaf directory that produced no scanned content.
pub(crate) fn scan_emptydir(ctx: &mut ScanCtx<'_>, sub: &str) -> Result<()> {
    match ctx.disk.dir_by_path(sub).map(|dir| dir.present) {
        Some(true) => Err(PdError::internal(format!(
            "dir '{}' already present",
            ctx.disk.dir.join(sub).display()
        ))),
        Some(false) => {
            if let Some(dir) = ctx.disk.dir_mut(sub) {
                dir.present = true;
            }
            ctx.counters.equal += 1;
            ctx.log.event("equal", &ctx.disk.name, sub);
            Ok(())
        }
        None => {
            ctx.counters.inserted += 1;
            ctx.log.event("add", &ctx.disk.name, sub);
            ctx.log
                .print(&format!("Add '{}'", ctx.disk.dir.join(sub).display()));
            let mut dir = EmptyDir::new(sub);
            dir.present = true;
            ctx.defer.dirs.push(dir);
            Ok(())
        }
    }
}
