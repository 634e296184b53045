//! Property tests driving random insert/remove sequences through the
//! block allocator and checking the inventory invariants after every
//! step.

use paritydrift::inventory::disk::{Disk, FileId};
use paritydrift::inventory::entry::File;
use proptest::prelude::*;

const BS: u32 = 4;

#[derive(Debug, Clone)]
enum Op {
    Insert { blocks: u8 },
    Remove { pick: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4).prop_map(|blocks| Op::Insert { blocks }),
        any::<u8>().prop_map(|pick| Op::Remove { pick }),
    ]
}

proptest! {
    #[test]
    fn random_insert_remove_sequences_preserve_invariants(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let mut disk = Disk::new("prop", "/mnt/prop");
        let mut live: Vec<FileId> = Vec::new();
        let mut serial = 0u64;

        for op in ops {
            match op {
                Op::Insert { blocks } => {
                    serial += 1;
                    let mut file = File::new(
                        BS,
                        format!("f{serial}"),
                        u64::from(BS) * u64::from(blocks),
                        100,
                        0,
                        serial,
                        0,
                    );
                    file.present = true;
                    let id = disk.register_file(file).unwrap();
                    disk.commit_file(id, false).unwrap();
                    live.push(id);
                }
                Op::Remove { pick } => {
                    if !live.is_empty() {
                        let id = live.remove(usize::from(pick) % live.len());
                        disk.remove_file(id, false).unwrap();
                    }
                }
            }
            disk.check().unwrap();
        }

        let live_blocks: usize = live.iter().map(|&id| disk.file(id).blocks.len()).sum();
        let live_slots = disk.block_slots().iter().filter(|slot| slot.has_file()).count();
        prop_assert_eq!(live_blocks, live_slots);
    }

    #[test]
    fn insert_only_sequences_allocate_densely(
        sizes in proptest::collection::vec(0u8..5, 1..20)
    ) {
        let mut disk = Disk::new("prop", "/mnt/prop");
        let mut expected = 0u64;

        for (serial, blocks) in sizes.into_iter().enumerate() {
            let mut file = File::new(
                BS,
                format!("f{serial}"),
                u64::from(BS) * u64::from(blocks),
                100,
                0,
                serial as u64 + 1,
                0,
            );
            file.present = true;
            let id = disk.register_file(file).unwrap();
            disk.commit_file(id, false).unwrap();
            expected += u64::from(blocks);
        }

        // No holes: the array is exactly as large as the block total.
        prop_assert_eq!(disk.block_slots().len() as u64, expected);
        prop_assert!(disk.block_slots().iter().all(paritydrift::inventory::disk::BlockSlot::has_file));
        disk.check().unwrap();
    }
}
