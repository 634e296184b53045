//! Per-disk scan orchestration and global post-checks.
//!
//! For every disk: probe capabilities, walk the tree, sweep records not
//! marked present, then commit deferred inserts in the configured order
//! so freshly freed parity slots are reused. Afterwards: the
//! mass-removal guard, capability warnings, and the summary.

use crate::core::config::{ScanConfig, ScanOptions, SortOrder};
use crate::core::errors::{PdError, Result};
use crate::inventory::disk::{Disk, FileId};
use crate::inventory::entry::{EmptyDir, Link};
use crate::logger::scanlog::ScanLog;
use crate::platform::pal::{PHY_WITHOUT_OFFSET, Platform};
use crate::scanner::filter::FilterSet;
use crate::scanner::walker;

/// Per-disk classification counters for one scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounters {
    pub equal: u32,
    pub moved: u32,
    pub restored: u32,
    pub changed: u32,
    pub removed: u32,
    pub inserted: u32,
}

impl ScanCounters {
    /// Sum of all non-equal classifications.
    #[must_use]
    pub fn total_changes(&self) -> u32 {
        self.moved + self.restored + self.changed + self.removed + self.inserted
    }

    fn merge(mut self, other: Self) -> Self {
        self.equal += other.equal;
        self.moved += other.moved;
        self.restored += other.restored;
        self.changed += other.changed;
        self.removed += other.removed;
        self.inserted += other.inserted;
        self
    }
}

/// Records accumulated during a walk and inserted after the removal
/// sweep. Files are already indexed and referenced by id; links and
/// dirs are owned until insertion.
#[derive(Debug, Default)]
pub(crate) struct DeferredInserts {
    pub(crate) files: Vec<FileId>,
    pub(crate) links: Vec<Link>,
    pub(crate) dirs: Vec<EmptyDir>,
}

/// Everything the resolvers and the walker need while scanning one
/// disk. Keeps the global state explicit instead of ambient.
pub(crate) struct ScanCtx<'a> {
    pub(crate) disk: &'a mut Disk,
    pub(crate) counters: &'a mut ScanCounters,
    pub(crate) defer: &'a mut DeferredInserts,
    pub(crate) need_write: &'a mut bool,
    pub(crate) clear_undetermined_hash: bool,
    pub(crate) block_size: u32,
    pub(crate) opts: &'a ScanOptions,
    pub(crate) platform: &'a dyn Platform,
    pub(crate) filter: &'a dyn FilterSet,
    pub(crate) log: &'a mut ScanLog,
}

/// Process-wide scan state, passed explicitly through every operation.
#[derive(Debug)]
pub struct ScanState {
    pub disks: Vec<Disk>,
    pub options: ScanOptions,
    pub block_size: u32,
    /// Any change happened, so the caller must persist the inventory.
    pub need_write: bool,
    /// Set by the caller when parity is known to reflect the recorded
    /// state, so hashes need not be wiped on ambiguous transitions.
    pub clear_undetermined_hash: bool,
}

impl ScanState {
    #[must_use]
    pub fn new(options: ScanOptions, block_size: u32) -> Self {
        Self {
            disks: Vec::new(),
            options,
            block_size,
            need_write: false,
            clear_undetermined_hash: false,
        }
    }

    /// Build a state with one empty disk per configured disk.
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        let mut state = Self::new(config.options.clone(), config.block_size);
        state.disks = config
            .disks
            .iter()
            .map(|disk| Disk::new(disk.name.clone(), disk.dir.clone()))
            .collect();
        state
    }
}

/// Per-disk outcome of a scan.
#[derive(Debug, Clone)]
pub struct DiskReport {
    pub name: String,
    pub counters: ScanCounters,
}

/// Outcome of a whole scan run.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub disks: Vec<DiskReport>,
    pub totals: ScanCounters,
    pub no_difference: bool,
}

/// Reconcile every disk of `state` against the filesystem.
pub fn run_scan(
    state: &mut ScanState,
    platform: &dyn Platform,
    filter: &dyn FilterSet,
    log: &mut ScanLog,
) -> Result<ScanReport> {
    let ScanState {
        disks,
        options,
        block_size,
        need_write,
        clear_undetermined_hash,
    } = state;

    let mut reports: Vec<DiskReport> = Vec::new();

    for disk in disks.iter_mut() {
        log.progress(&format!("Scanning disk {}...", disk.name));

        // A reused in-memory state still carries the previous run's
        // presence marks; bring it back to the freshly-loaded shape.
        disk.reset_scan_marks();

        disk.device = platform.lstat(&disk.dir)?.device;

        // Without persistent inodes every stored inode may have been
        // reassigned, so all inode knowledge is erased up front and
        // identity falls back to the path axis.
        let info = platform.fs_info(&disk.dir)?;
        if !info.has_persistent_inode {
            disk.has_not_persistent_inodes = true;
            disk.erase_inode_knowledge();
        }

        let mut counters = ScanCounters::default();
        let mut defer = DeferredInserts::default();
        let root = disk.dir.clone();
        {
            let mut ctx = ScanCtx {
                disk: &mut *disk,
                counters: &mut counters,
                defer: &mut defer,
                need_write: &mut *need_write,
                clear_undetermined_hash: *clear_undetermined_hash,
                block_size: *block_size,
                opts: &*options,
                platform,
                filter,
                log: &mut *log,
            };
            walker::scan_dir(&mut ctx, &root, "")?;
        }

        // Removal sweep: whatever was not marked present is gone.
        let stale: Vec<FileId> = disk
            .files_in_order()
            .filter(|(_, file)| !file.present)
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            let sub = disk.file(id).sub.clone();
            counters.removed += 1;
            log.event("remove", &disk.name, &sub);
            log.print(&format!("Remove '{}'", disk.dir.join(&sub).display()));
            *need_write = true;
            disk.remove_file(id, *clear_undetermined_hash)?;
        }

        let stale: Vec<String> = disk
            .links_in_order()
            .filter(|link| !link.present)
            .map(|link| link.sub.clone())
            .collect();
        for sub in stale {
            counters.removed += 1;
            log.event("remove", &disk.name, &sub);
            log.print(&format!("Remove '{}'", disk.dir.join(&sub).display()));
            *need_write = true;
            disk.remove_link(&sub)?;
        }

        let stale: Vec<String> = disk
            .dirs_in_order()
            .filter(|dir| !dir.present)
            .map(|dir| dir.sub.clone())
            .collect();
        for sub in stale {
            counters.removed += 1;
            log.event("remove", &disk.name, &sub);
            log.print(&format!("Remove '{}'", disk.dir.join(&sub).display()));
            *need_write = true;
            disk.remove_dir(&sub)?;
        }

        // Order the new files before binding parity positions. The sort
        // is stable: with all-equal keys the walker's order survives.
        match options.force_order {
            SortOrder::Physical => defer.files.sort_by_key(|&id| disk.file(id).physical),
            SortOrder::Inode => defer.files.sort_by_key(|&id| disk.file(id).inode),
            SortOrder::Alpha => {
                defer
                    .files
                    .sort_by(|&a, &b| disk.file(a).sub.cmp(&disk.file(b).sub));
            }
            SortOrder::Dir => {}
        }

        // Insert the new files only now, after the removals, to reuse
        // the freshly freed parity slots.
        let mut phy_count = 0u32;
        let mut phy_dup = 0u32;
        let mut phy_last = PHY_WITHOUT_OFFSET;
        for &id in &defer.files {
            let file = disk.file(id);
            if options.force_order == SortOrder::Physical && file.size != 0 {
                if phy_count > 0 && file.physical == phy_last && phy_last != PHY_WITHOUT_OFFSET {
                    phy_dup += 1;
                }
                phy_last = file.physical;
                phy_count += 1;
            }
            *need_write = true;
            disk.commit_file(id, *clear_undetermined_hash)?;
        }
        // Hardlinks never reach this list, so duplicate offsets mean
        // the platform's answers cannot be trusted for ordering.
        if options.force_order == SortOrder::Physical && phy_dup > 0 {
            disk.has_not_reliable_physical = true;
        }

        for link in defer.links.drain(..) {
            *need_write = true;
            disk.insert_link(link)?;
        }
        for dir in defer.dirs.drain(..) {
            *need_write = true;
            disk.insert_dir(dir)?;
        }

        reports.push(DiskReport {
            name: disk.name.clone(),
            counters,
        });
    }

    // A disk whose previously known content all disappeared is most
    // likely unmounted; refuse to erase it from the inventory.
    if !options.force_empty {
        let affected: Vec<String> = disks
            .iter()
            .zip(&reports)
            .filter(|(_, report)| {
                let c = report.counters;
                c.equal == 0 && c.moved == 0 && c.restored == 0 && (c.removed != 0 || c.changed != 0)
            })
            .map(|(disk, _)| format!("'{}' at dir '{}'", disk.name, disk.dir.display()))
            .collect();
        if !affected.is_empty() {
            return Err(PdError::MassRemoval {
                disks: affected.join(", "),
                command: options.command.clone(),
            });
        }
    }

    if options.force_order == SortOrder::Physical {
        let names: Vec<&str> = disks
            .iter()
            .filter(|disk| disk.has_not_reliable_physical)
            .map(|disk| disk.name.as_str())
            .collect();
        if !names.is_empty() {
            log.warning(&format!(
                "WARNING! Physical offsets not supported for disk(s) {}. Performance won't be optimal.",
                names.join(", ")
            ));
        }
    }

    let names: Vec<&str> = disks
        .iter()
        .filter(|disk| disk.has_not_persistent_inodes)
        .map(|disk| disk.name.as_str())
        .collect();
    if !names.is_empty() {
        log.warning(&format!(
            "WARNING! Inodes are not persistent for disk(s) {}. Move operations won't be optimized.",
            names.join(", ")
        ));
    }

    let totals = reports
        .iter()
        .fold(ScanCounters::default(), |acc, report| acc.merge(report.counters));
    // Equal entries are no difference; everything else is.
    let no_difference = totals.moved == 0
        && totals.restored == 0
        && totals.changed == 0
        && totals.removed == 0
        && totals.inserted == 0;

    if log.verbose() || log.output() {
        if log.verbose() {
            log.progress(&format!("\tequal {}", totals.equal));
            log.progress(&format!("\tmoved {}", totals.moved));
            log.progress(&format!("\trestored {}", totals.restored));
            log.progress(&format!("\tchanged {}", totals.changed));
            log.progress(&format!("\tremoved {}", totals.removed));
            log.progress(&format!("\tadded {}", totals.inserted));
        }

        log.summary_value("equal", totals.equal);
        log.summary_value("moved", totals.moved);
        log.summary_value("restored", totals.restored);
        log.summary_value("changed", totals.changed);
        log.summary_value("removed", totals.removed);
        log.summary_value("added", totals.inserted);

        if log.output() {
            log.progress(if no_difference {
                "No difference"
            } else {
                "There are differences"
            });
        }
        log.summary_exit(no_difference);
    }

    Ok(ScanReport {
        disks: reports,
        totals,
        no_difference,
    })
}
