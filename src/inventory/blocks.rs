//! Parity-slot allocation: releasing the blocks of removed files into
//! deleted-block tombstones and binding parity positions for inserted
//! files, under aborted-sync recovery semantics.
//!
//! After an aborted sync the parity may or may not have been updated for
//! CHG/NEW blocks, so their hashes are wiped on the transitions below
//! unless the caller asserts the parity state is determined
//! (`clear_undetermined_hash`).

use crate::core::errors::{PdError, Result};
use crate::inventory::disk::{BlockSlot, Disk, FileId};
use crate::inventory::entry::{BlockState, DeletedBlock, HASH_SIZE};

impl Disk {
    /// Remove a file from the data set, converting each of its blocks
    /// into a deleted-block tombstone occupying the same parity
    /// position.
    ///
    /// BLK blocks keep their hash (the parity still describes them).
    /// CHG and NEW blocks carry an undetermined parity relationship, so
    /// their hash is zeroed unless `clear_undetermined_hash` is set. Any
    /// other state is an internal inconsistency.
    pub fn remove_file(&mut self, id: FileId, clear_undetermined_hash: bool) -> Result<()> {
        let file = self.files.remove(&id).ok_or_else(|| {
            PdError::internal(format!("removal of an unknown file on disk '{}'", self.name))
        })?;

        for block in &file.blocks {
            let pos = block.parity_pos;

            // The scan removes before it inserts, which keeps this
            // adjustment a no-op there; other call sequences rely on it.
            if self.first_free_block > pos {
                self.first_free_block = pos;
            }

            let hash = match block.state {
                BlockState::Blk => block.hash,
                BlockState::Chg | BlockState::New => {
                    if clear_undetermined_hash {
                        block.hash
                    } else {
                        [0; HASH_SIZE]
                    }
                }
                BlockState::Rep => {
                    return Err(PdError::internal(format!(
                        "block at parity position {pos} of '{}' in state REP during removal",
                        file.sub
                    )));
                }
            };

            let idx = self.deletedlist.len();
            self.deletedlist.push(DeletedBlock {
                parity_pos: pos,
                hash,
            });
            self.blockarr[pos as usize] = BlockSlot::Deleted(idx);
        }

        if !file.without_inode {
            self.inodeset.remove(&file.inode);
        }
        self.pathset.remove(&file.sub);
        self.filelist.retain(|&other| other != id);
        Ok(())
    }

    /// Bind parity positions for a registered file and append it to the
    /// file list. The cursor starts at `first_free_block` and takes the
    /// first slot not held by a live block, growing the array at the
    /// end.
    ///
    /// An empty slot yields a NEW block; a deleted slot yields a CHG
    /// block inheriting the tombstone's hash (wiped first when the
    /// parity state is undetermined). The tombstone itself survives only
    /// in the deleted list.
    pub fn commit_file(&mut self, id: FileId, clear_undetermined_hash: bool) -> Result<()> {
        let file = self.files.get_mut(&id).ok_or_else(|| {
            PdError::internal(format!("commit of an unknown file on disk '{}'", self.name))
        })?;

        let mut cursor = self.first_free_block as usize;
        for (index, block) in file.blocks.iter_mut().enumerate() {
            while cursor < self.blockarr.len() && self.blockarr[cursor].has_file() {
                cursor += 1;
            }
            if cursor == self.blockarr.len() {
                self.blockarr.push(BlockSlot::Empty);
            }

            block.parity_pos = u32::try_from(cursor)
                .map_err(|_| PdError::internal("block array index overflow".to_string()))?;

            match self.blockarr[cursor] {
                BlockSlot::Empty => {
                    block.state = BlockState::New;
                }
                BlockSlot::Deleted(idx) => {
                    let tombstone = &mut self.deletedlist[idx];
                    if !clear_undetermined_hash {
                        tombstone.hash = [0; HASH_SIZE];
                    }
                    block.state = BlockState::Chg;
                    block.hash = tombstone.hash;
                }
                BlockSlot::Live { .. } => {
                    return Err(PdError::internal(format!(
                        "allocation cursor landed on a live slot at {cursor}"
                    )));
                }
            }

            self.blockarr[cursor] = BlockSlot::Live {
                file: id,
                index: u32::try_from(index)
                    .map_err(|_| PdError::internal("block vector index overflow".to_string()))?,
            };
        }

        if !file.blocks.is_empty() {
            self.first_free_block = u32::try_from(cursor + 1)
                .map_err(|_| PdError::internal("block array index overflow".to_string()))?;
        }
        self.filelist.push(id);
        Ok(())
    }
}
