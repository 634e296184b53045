//! One data disk under protection: record ownership, inode/path/name
//! indices, the parity block array, and the restore API used by the
//! inventory loader.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::path::PathBuf;

use crate::core::errors::{PdError, Result};
use crate::inventory::entry::{DeletedBlock, EmptyDir, File, Link};

/// Opaque handle to a file owned by a [`Disk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u64);

/// One slot of the parity block array.
///
/// A slot is either empty, bound to a block inside a live file's block
/// vector, or held by a deleted-block tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSlot {
    Empty,
    Live { file: FileId, index: u32 },
    Deleted(usize),
}

impl BlockSlot {
    /// Whether the slot is bound to a live file block.
    #[must_use]
    pub fn has_file(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

/// In-memory model of one protected disk.
#[derive(Debug, Default)]
pub struct Disk {
    pub name: String,
    /// Absolute root directory.
    pub dir: PathBuf,
    /// Device id of the root, for the mount-boundary check.
    pub device: u64,
    pub has_not_persistent_inodes: bool,
    pub has_not_reliable_physical: bool,
    /// Lower bound on the first parity position known to be reusable.
    pub first_free_block: u32,

    next_file_id: u64,
    pub(crate) files: HashMap<FileId, File>,
    pub(crate) filelist: Vec<FileId>,
    pub(crate) inodeset: HashMap<u64, FileId>,
    pub(crate) pathset: HashMap<String, FileId>,

    pub(crate) linkset: HashMap<String, Link>,
    pub(crate) linklist: Vec<String>,

    pub(crate) dirset: HashMap<String, EmptyDir>,
    pub(crate) dirlist: Vec<String>,

    pub(crate) blockarr: Vec<BlockSlot>,
    pub(crate) deletedlist: Vec<DeletedBlock>,
}

impl Disk {
    #[must_use]
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            ..Self::default()
        }
    }

    // ──────────────────── read access ────────────────────

    #[must_use]
    pub fn file(&self, id: FileId) -> &File {
        &self.files[&id]
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> &mut File {
        self.files.get_mut(&id).expect("stale file id")
    }

    /// Committed files in insertion order.
    pub fn files_in_order(&self) -> impl Iterator<Item = (FileId, &File)> {
        self.filelist.iter().map(|&id| (id, &self.files[&id]))
    }

    #[must_use]
    pub fn file_by_path(&self, sub: &str) -> Option<FileId> {
        self.pathset.get(sub).copied()
    }

    #[must_use]
    pub fn file_by_inode(&self, inode: u64) -> Option<FileId> {
        self.inodeset.get(&inode).copied()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.filelist.len()
    }

    /// Links in insertion order.
    pub fn links_in_order(&self) -> impl Iterator<Item = &Link> {
        self.linklist.iter().map(|sub| &self.linkset[sub])
    }

    #[must_use]
    pub fn link_by_path(&self, sub: &str) -> Option<&Link> {
        self.linkset.get(sub)
    }

    pub(crate) fn link_mut(&mut self, sub: &str) -> Option<&mut Link> {
        self.linkset.get_mut(sub)
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.linklist.len()
    }

    /// Empty dirs in insertion order.
    pub fn dirs_in_order(&self) -> impl Iterator<Item = &EmptyDir> {
        self.dirlist.iter().map(|sub| &self.dirset[sub])
    }

    #[must_use]
    pub fn dir_by_path(&self, sub: &str) -> Option<&EmptyDir> {
        self.dirset.get(sub)
    }

    pub(crate) fn dir_mut(&mut self, sub: &str) -> Option<&mut EmptyDir> {
        self.dirset.get_mut(sub)
    }

    #[must_use]
    pub fn dir_count(&self) -> usize {
        self.dirlist.len()
    }

    #[must_use]
    pub fn block_slots(&self) -> &[BlockSlot] {
        &self.blockarr
    }

    #[must_use]
    pub fn deleted_blocks(&self) -> &[DeletedBlock] {
        &self.deletedlist
    }

    // ──────────────────── scan mutation primitives ────────────────────

    /// Register a freshly observed file in the inode and path indices.
    /// The file joins `filelist` and gets parity positions only when it
    /// is committed after the removal phase.
    pub fn register_file(&mut self, file: File) -> Result<FileId> {
        let id = FileId(self.next_file_id);
        self.next_file_id += 1;

        match self.pathset.entry(file.sub.clone()) {
            MapEntry::Occupied(_) => {
                return Err(PdError::internal(format!(
                    "duplicate path '{}' on disk '{}'",
                    file.sub, self.name
                )));
            }
            MapEntry::Vacant(slot) => slot.insert(id),
        };
        if !file.without_inode {
            self.inodeset.insert(file.inode, id);
        }
        self.files.insert(id, file);
        Ok(id)
    }

    /// Re-key a file under a new sub-path.
    pub fn rename_file(&mut self, id: FileId, sub: &str) -> Result<()> {
        let old = self.files[&id].sub.clone();
        self.pathset.remove(&old);
        match self.pathset.entry(sub.to_string()) {
            MapEntry::Occupied(_) => {
                return Err(PdError::internal(format!(
                    "rename target '{sub}' already keyed on disk '{}'",
                    self.name
                )));
            }
            MapEntry::Vacant(slot) => slot.insert(id),
        };
        self.file_mut(id).sub = sub.to_string();
        Ok(())
    }

    /// Drop a file from the inode index, leaving it findable only by
    /// path. Used when an inode observation contradicts the record.
    pub fn detach_inode(&mut self, id: FileId) {
        let file = self.files.get_mut(&id).expect("stale file id");
        if !file.without_inode {
            self.inodeset.remove(&file.inode);
        }
        // Zeroing is not needed for correctness; it keeps invalidated
        // records recognizable when debugging.
        file.inode = 0;
        file.without_inode = true;
    }

    /// Bind a file to an inode, replacing any previous binding it held.
    pub fn rebind_inode(&mut self, id: FileId, inode: u64) -> Result<()> {
        let file = self.files.get_mut(&id).expect("stale file id");
        if !file.without_inode {
            self.inodeset.remove(&file.inode);
        }
        file.inode = inode;
        file.without_inode = false;
        match self.inodeset.entry(inode) {
            MapEntry::Occupied(_) => Err(PdError::internal(format!(
                "inode {inode} already keyed on disk '{}'",
                self.name
            ))),
            MapEntry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    /// Insert a link into the link containers.
    pub fn insert_link(&mut self, link: Link) -> Result<()> {
        let sub = link.sub.clone();
        match self.linkset.entry(sub.clone()) {
            MapEntry::Occupied(_) => {
                return Err(PdError::internal(format!(
                    "duplicate link '{sub}' on disk '{}'",
                    self.name
                )));
            }
            MapEntry::Vacant(slot) => slot.insert(link),
        };
        self.linklist.push(sub);
        Ok(())
    }

    /// Remove a link from the link containers.
    pub fn remove_link(&mut self, sub: &str) -> Result<Link> {
        let link = self.linkset.remove(sub).ok_or_else(|| {
            PdError::internal(format!("unknown link '{sub}' on disk '{}'", self.name))
        })?;
        self.linklist.retain(|s| s != sub);
        Ok(link)
    }

    /// Insert an empty-dir record into the dir containers.
    pub fn insert_dir(&mut self, dir: EmptyDir) -> Result<()> {
        let sub = dir.sub.clone();
        match self.dirset.entry(sub.clone()) {
            MapEntry::Occupied(_) => {
                return Err(PdError::internal(format!(
                    "duplicate dir '{sub}' on disk '{}'",
                    self.name
                )));
            }
            MapEntry::Vacant(slot) => slot.insert(dir),
        };
        self.dirlist.push(sub);
        Ok(())
    }

    /// Remove an empty-dir record from the dir containers.
    pub fn remove_dir(&mut self, sub: &str) -> Result<EmptyDir> {
        let dir = self.dirset.remove(sub).ok_or_else(|| {
            PdError::internal(format!("unknown dir '{sub}' on disk '{}'", self.name))
        })?;
        self.dirlist.retain(|s| s != sub);
        Ok(dir)
    }

    /// Clear the per-run presence marks and the physical-offset
    /// finding. A freshly loaded inventory starts this way; a state
    /// kept in memory across runs must be brought back to it before
    /// every scan.
    pub fn reset_scan_marks(&mut self) {
        for file in self.files.values_mut() {
            file.present = false;
        }
        for link in self.linkset.values_mut() {
            link.present = false;
        }
        for dir in self.dirset.values_mut() {
            dir.present = false;
        }
        self.has_not_reliable_physical = false;
    }

    /// Erase all inode knowledge, forcing identity decisions onto the
    /// path axis. Pre-pass for disks without persistent inodes.
    pub fn erase_inode_knowledge(&mut self) {
        self.inodeset.clear();
        for file in self.files.values_mut() {
            file.inode = 0;
            file.without_inode = true;
        }
    }

    // ──────────────────── restore API (inventory loader) ────────────────────

    /// Rebuild a loaded file: indices, `filelist`, and its recorded
    /// parity positions bound into the block array. Does not touch
    /// `need_write`.
    pub fn restore_file(&mut self, file: File) -> Result<FileId> {
        for block in &file.blocks {
            let pos = block.parity_pos as usize;
            if pos >= self.blockarr.len() {
                self.blockarr.resize(pos + 1, BlockSlot::Empty);
            }
            if self.blockarr[pos] != BlockSlot::Empty {
                return Err(PdError::internal(format!(
                    "parity position {pos} on disk '{}' bound twice",
                    self.name
                )));
            }
        }
        let id = self.register_file(file)?;
        for (index, block) in self.files[&id].blocks.iter().enumerate() {
            self.blockarr[block.parity_pos as usize] = BlockSlot::Live {
                file: id,
                index: u32::try_from(index).expect("block vector too large"),
            };
        }
        self.filelist.push(id);
        Ok(id)
    }

    /// Rebuild a loaded link.
    pub fn restore_link(&mut self, link: Link) -> Result<()> {
        self.insert_link(link)
    }

    /// Rebuild a loaded empty-dir record.
    pub fn restore_dir(&mut self, dir: EmptyDir) -> Result<()> {
        self.insert_dir(dir)
    }

    /// Rebuild a loaded deleted-block tombstone.
    pub fn restore_deleted_block(&mut self, deleted: DeletedBlock) -> Result<()> {
        let pos = deleted.parity_pos as usize;
        if pos >= self.blockarr.len() {
            self.blockarr.resize(pos + 1, BlockSlot::Empty);
        }
        if self.blockarr[pos] != BlockSlot::Empty {
            return Err(PdError::internal(format!(
                "parity position {pos} on disk '{}' bound twice",
                self.name
            )));
        }
        self.blockarr[pos] = BlockSlot::Deleted(self.deletedlist.len());
        self.deletedlist.push(deleted);
        Ok(())
    }

    // ──────────────────── invariant checks ────────────────────

    /// Verify the structural invariants of the inventory. Intended for
    /// tests and post-scan assertions.
    pub fn check(&self) -> Result<()> {
        // Files: path index complete and unique, inode index iff indexed.
        if self.filelist.len() != self.files.len() {
            return Err(PdError::internal(format!(
                "filelist holds {} ids but {} files exist",
                self.filelist.len(),
                self.files.len()
            )));
        }
        for (id, file) in self.files_in_order() {
            if self.pathset.get(&file.sub) != Some(&id) {
                return Err(PdError::internal(format!(
                    "file '{}' missing from the path index",
                    file.sub
                )));
            }
            let indexed = self.inodeset.get(&file.inode) == Some(&id);
            if file.without_inode && self.inodeset.values().any(|&v| v == id) {
                return Err(PdError::internal(format!(
                    "file '{}' is inode-less but inode-indexed",
                    file.sub
                )));
            }
            if !file.without_inode && !indexed {
                return Err(PdError::internal(format!(
                    "file '{}' missing from the inode index",
                    file.sub
                )));
            }
            for (index, block) in file.blocks.iter().enumerate() {
                let expected = BlockSlot::Live {
                    file: id,
                    index: u32::try_from(index).expect("block vector too large"),
                };
                let pos = block.parity_pos as usize;
                if self.blockarr.get(pos) != Some(&expected) {
                    return Err(PdError::internal(format!(
                        "block {index} of '{}' not bound at parity position {pos}",
                        file.sub
                    )));
                }
            }
        }

        // Slots: every binding resolves back to its owner.
        for (pos, slot) in self.blockarr.iter().enumerate() {
            match *slot {
                BlockSlot::Empty => {}
                BlockSlot::Live { file, index } => {
                    let owner = self.files.get(&file).ok_or_else(|| {
                        PdError::internal(format!("slot {pos} bound to a freed file"))
                    })?;
                    let block = owner.blocks.get(index as usize).ok_or_else(|| {
                        PdError::internal(format!("slot {pos} bound past a block vector"))
                    })?;
                    if block.parity_pos as usize != pos {
                        return Err(PdError::internal(format!(
                            "slot {pos} bound to a block recording position {}",
                            block.parity_pos
                        )));
                    }
                }
                BlockSlot::Deleted(idx) => {
                    let deleted = self.deletedlist.get(idx).ok_or_else(|| {
                        PdError::internal(format!("slot {pos} holds an unknown tombstone"))
                    })?;
                    if deleted.parity_pos as usize != pos {
                        return Err(PdError::internal(format!(
                            "slot {pos} holds a tombstone recording position {}",
                            deleted.parity_pos
                        )));
                    }
                }
            }
        }

        // Free-position hint: a true lower bound, with one slot of slack.
        let ffb = self.first_free_block as usize;
        if ffb > self.blockarr.len() {
            return Err(PdError::internal(format!(
                "first_free_block {ffb} past the block array ({})",
                self.blockarr.len()
            )));
        }
        for pos in 0..ffb.saturating_sub(1) {
            if self.blockarr[pos] == BlockSlot::Empty {
                return Err(PdError::internal(format!(
                    "empty slot {pos} below first_free_block {ffb}"
                )));
            }
        }

        // Links and dirs: order lists and key sets agree.
        if self.linklist.len() != self.linkset.len() || self.dirlist.len() != self.dirset.len() {
            return Err(PdError::internal(
                "link or dir order list disagrees with its key set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::entry::{BlockState, LinkKind};

    fn file_with_blocks(sub: &str, inode: u64, positions: &[u32]) -> File {
        let mut file = File::new(4, sub, 4 * positions.len() as u64, 100, 0, inode, 0);
        for (block, &pos) in file.blocks.iter_mut().zip(positions) {
            block.parity_pos = pos;
            block.state = BlockState::Blk;
            block.hash = [0xAB; 16];
        }
        file
    }

    #[test]
    fn register_rejects_duplicate_paths() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        disk.register_file(File::new(4, "a", 1, 0, 0, 1, 0)).unwrap();
        let err = disk
            .register_file(File::new(4, "a", 1, 0, 0, 2, 0))
            .unwrap_err();
        assert_eq!(err.code(), "PD-3901");
    }

    #[test]
    fn restore_binds_blocks_and_passes_check() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        let id = disk.restore_file(file_with_blocks("a/b", 17, &[0, 1])).unwrap();
        assert_eq!(disk.file_count(), 1);
        assert_eq!(disk.file_by_path("a/b"), Some(id));
        assert_eq!(disk.file_by_inode(17), Some(id));
        assert!(disk.blockarr[0].has_file());
        disk.check().unwrap();
    }

    #[test]
    fn restore_rejects_slot_conflicts() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        disk.restore_file(file_with_blocks("a", 1, &[3])).unwrap();
        let err = disk
            .restore_file(file_with_blocks("b", 2, &[3]))
            .unwrap_err();
        assert!(err.to_string().contains("bound twice"));
    }

    #[test]
    fn rename_rekeys_path_index() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        let id = disk.restore_file(file_with_blocks("old", 1, &[0])).unwrap();
        disk.rename_file(id, "new").unwrap();
        assert_eq!(disk.file_by_path("new"), Some(id));
        assert_eq!(disk.file_by_path("old"), None);
        assert_eq!(disk.file(id).sub, "new");
        disk.check().unwrap();
    }

    #[test]
    fn detach_and_rebind_inode() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        let id = disk.restore_file(file_with_blocks("a", 17, &[0])).unwrap();

        disk.detach_inode(id);
        assert_eq!(disk.file_by_inode(17), None);
        assert!(disk.file(id).without_inode);
        assert_eq!(disk.file(id).inode, 0);
        disk.check().unwrap();

        disk.rebind_inode(id, 42).unwrap();
        assert_eq!(disk.file_by_inode(42), Some(id));
        assert!(!disk.file(id).without_inode);
        disk.check().unwrap();
    }

    #[test]
    fn rebind_rejects_foreign_binding() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        let a = disk.restore_file(file_with_blocks("a", 17, &[0])).unwrap();
        disk.restore_file(file_with_blocks("b", 18, &[1])).unwrap();
        let err = disk.rebind_inode(a, 18).unwrap_err();
        assert!(err.to_string().contains("already keyed"));
    }

    #[test]
    fn reset_scan_marks_restores_the_freshly_loaded_shape() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        let id = disk.restore_file(file_with_blocks("a", 1, &[0])).unwrap();
        disk.restore_link(Link::new("l", "t", LinkKind::Symlink)).unwrap();
        disk.restore_dir(EmptyDir::new("e")).unwrap();

        disk.file_mut(id).present = true;
        disk.link_mut("l").unwrap().present = true;
        disk.dir_mut("e").unwrap().present = true;
        disk.has_not_reliable_physical = true;

        disk.reset_scan_marks();
        assert!(!disk.file(id).present);
        assert!(!disk.link_by_path("l").unwrap().present);
        assert!(!disk.dir_by_path("e").unwrap().present);
        assert!(!disk.has_not_reliable_physical);
        disk.check().unwrap();
    }

    #[test]
    fn erase_inode_knowledge_clears_the_index() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        disk.restore_file(file_with_blocks("a", 17, &[0])).unwrap();
        disk.restore_file(file_with_blocks("b", 18, &[1])).unwrap();

        disk.erase_inode_knowledge();
        assert_eq!(disk.file_by_inode(17), None);
        assert_eq!(disk.file_by_inode(18), None);
        for (_, file) in disk.files_in_order() {
            assert!(file.without_inode);
            assert_eq!(file.inode, 0);
        }
        disk.check().unwrap();
    }

    #[test]
    fn link_and_dir_containers_keep_order() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        disk.insert_link(Link::new("l1", "t1", LinkKind::Symlink)).unwrap();
        disk.insert_link(Link::new("l2", "t2", LinkKind::Hardlink)).unwrap();
        disk.insert_dir(EmptyDir::new("e1")).unwrap();

        let subs: Vec<&str> = disk.links_in_order().map(|l| l.sub.as_str()).collect();
        assert_eq!(subs, ["l1", "l2"]);

        disk.remove_link("l1").unwrap();
        assert!(disk.link_by_path("l1").is_none());
        assert_eq!(disk.link_count(), 1);

        assert!(disk.dir_by_path("e1").is_some());
        disk.remove_dir("e1").unwrap();
        assert_eq!(disk.dir_count(), 0);
        disk.check().unwrap();
    }

    #[test]
    fn restore_deleted_block_occupies_slot() {
        let mut disk = Disk::new("d1", "/mnt/d1");
        disk.restore_deleted_block(DeletedBlock {
            parity_pos: 2,
            hash: [1; 16],
        })
        .unwrap();
        assert_eq!(disk.blockarr.len(), 3);
        assert_eq!(disk.blockarr[2], BlockSlot::Deleted(0));
        let err = disk
            .restore_deleted_block(DeletedBlock {
                parity_pos: 2,
                hash: [2; 16],
            })
            .unwrap_err();
        assert!(err.to_string().contains("bound twice"));
        disk.check().unwrap();
    }
}
