#![cfg(test)]

// Property tests for BucketTable kept inside the crate so they can reach
// crate-private helpers if needed.

use crate::bucket_table::BucketTable;
use crate::entry::{EntryArena, EntryHandle};
use proptest::prelude::*;

// Pool-indexed operations: indices shrink to earlier entries, hashes are
// drawn from a small range so collisions and shared buckets are common.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, u64),
    PopSelf(usize),
    Free(usize),
    Get(u64),
    Scan(u64),
    Walk,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (u32, usize, Vec<Op>)> {
    (0u32..=3, 1usize..=8).prop_flat_map(|(log2_buckets, pool)| {
        let idx = 0..pool;
        let hash = 0u64..16;
        let op = prop_oneof![
            4 => (idx.clone(), hash.clone()).prop_map(|(i, h)| Op::Set(i, h)),
            1 => idx.clone().prop_map(Op::PopSelf),
            1 => idx.prop_map(Op::Free),
            2 => hash.clone().prop_map(Op::Get),
            2 => hash.prop_map(Op::Scan),
            1 => Just(Op::Walk),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (log2_buckets, pool, ops))
    })
}

// Model: pool slot ids in chain insertion order, with their stored hash.
struct Model {
    chained: Vec<(usize, u64)>,
}

impl Model {
    fn unlink(&mut self, i: usize) {
        self.chained.retain(|&(id, _)| id != i);
    }

    fn hits(&self, hash: u64) -> Vec<usize> {
        self.chained
            .iter()
            .filter(|&&(_, h)| h == hash)
            .map(|&(id, _)| id)
            .collect()
    }
}

fn slot_of(handles: &[EntryHandle], h: EntryHandle) -> usize {
    handles
        .iter()
        .position(|&x| x == h)
        .expect("returned handle belongs to the pool")
}

// Property: state-machine equivalence against a Vec model.
// Invariants exercised across random operation sequences:
// - `get(h)` is the earliest still-chained entry whose stored hash is `h`.
// - `lookup` + `next_match` enumerate every collision oldest first, then
//   yield `None` exactly at exhaustion and stay idle.
// - The insertion walk, `iter` and `to_array` agree and equal the model
//   stably sorted by bucket index.
// - `count` equals the number of chained entries; `clear` empties the table.
// - Freed entries are unlinked and their stale handles never resolve.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_bucket_table_state_machine((log2_buckets, pool, ops) in arb_scenario()) {
        let mut arena: EntryArena<usize> = EntryArena::new();
        let table = BucketTable::new(&mut arena, 1 << log2_buckets);
        let mask = (1u64 << log2_buckets) - 1;
        let mut handles: Vec<EntryHandle> = (0..pool).map(|i| arena.insert(i)).collect();
        let mut stale: Vec<EntryHandle> = Vec::new();
        let mut model = Model { chained: Vec::new() };

        for op in ops {
            match op {
                Op::Set(i, h) => {
                    prop_assert!(table.set(&mut arena, h, handles[i]));
                    model.unlink(i);
                    model.chained.push((i, h));
                }
                Op::PopSelf(i) => {
                    let was = model.chained.iter().any(|&(id, _)| id == i);
                    prop_assert_eq!(arena.pop_self(handles[i]), was);
                    prop_assert!(!arena.pop_self(handles[i]));
                    model.unlink(i);
                }
                Op::Free(i) => {
                    let old = handles[i];
                    prop_assert_eq!(arena.remove(old), Some(i));
                    model.unlink(i);
                    stale.push(old);
                    handles[i] = arena.insert(i);
                }
                Op::Get(h) => {
                    let got = table.get(&arena, h).map(|e| slot_of(&handles, e));
                    prop_assert_eq!(got, model.hits(h).first().copied());
                }
                Op::Scan(h) => {
                    let (first, mut scan) = table.lookup(&arena, h);
                    let mut seen: Vec<usize> = first.into_iter().map(|e| slot_of(&handles, e)).collect();
                    while let Some(e) = scan.next_match(&arena) {
                        seen.push(slot_of(&handles, e));
                    }
                    prop_assert!(scan.state().is_idle());
                    prop_assert_eq!(scan.next_match(&arena), None);
                    prop_assert_eq!(&seen, &model.hits(h));
                    let iterated: Vec<usize> = table.matches(&arena, h).map(|e| slot_of(&handles, e)).collect();
                    prop_assert_eq!(iterated, seen);
                }
                Op::Walk => {
                    let mut expected = model.chained.clone();
                    expected.sort_by_key(|&(_, h)| h & mask);
                    let expected: Vec<usize> = expected.into_iter().map(|(id, _)| id).collect();

                    let (head, mut cursor) = table.head(&arena);
                    let mut walked: Vec<EntryHandle> = head.into_iter().collect();
                    walked.extend(std::iter::from_fn(|| cursor.next_entry(&arena)));
                    let walked_ids: Vec<usize> = walked.iter().map(|&e| slot_of(&handles, e)).collect();
                    prop_assert_eq!(&walked_ids, &expected);

                    let mut array = Vec::new();
                    prop_assert_eq!(table.to_array(&arena, &mut array), expected.len());
                    prop_assert_eq!(&array, &walked);
                    prop_assert_eq!(table.iter(&arena).collect::<Vec<_>>(), walked);
                }
                Op::Clear => {
                    prop_assert_eq!(table.clear(&mut arena), model.chained.len());
                    model.chained.clear();
                }
            }

            // Post-conditions after each op
            prop_assert_eq!(table.count(&arena), model.chained.len());
            prop_assert_eq!(table.is_empty(&arena), model.chained.is_empty());
            for (i, &h) in handles.iter().enumerate() {
                let chained = model.chained.iter().any(|&(id, _)| id == i);
                prop_assert_eq!(arena.has_next(h), chained);
            }
            for &h in &stale {
                prop_assert!(h.value(&arena).is_none());
            }
            prop_assert_eq!(arena.len(), pool);
            prop_assert!(table.check_invariants(&arena).is_ok());
        }
    }
}
