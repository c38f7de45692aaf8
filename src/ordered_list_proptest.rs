#![cfg(test)]

// Property tests for OrderedList, run alongside a BucketTable over the same
// entries to check that the two link pairs never interfere.

use crate::bucket_table::BucketTable;
use crate::entry::{EntryArena, EntryHandle};
use crate::ordered_list::OrderedList;
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
enum Op {
    Add(usize),
    PopOrder(usize),
    RemoveHead,
    Chain(usize),
    Free(usize),
    Walk,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<Op>)> {
    (1usize..=8).prop_flat_map(|pool| {
        let idx = 0..pool;
        let op = prop_oneof![
            4 => idx.clone().prop_map(Op::Add),
            1 => idx.clone().prop_map(Op::PopOrder),
            2 => Just(Op::RemoveHead),
            2 => idx.clone().prop_map(Op::Chain),
            1 => idx.prop_map(Op::Free),
            1 => Just(Op::Walk),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool, ops))
    })
}

fn slot_of(handles: &[EntryHandle], h: EntryHandle) -> usize {
    handles
        .iter()
        .position(|&x| x == h)
        .expect("returned handle belongs to the pool")
}

// Property: OrderedList behaves like a VecDeque (front = oldest).
// - `add` moves an entry to the back; `remove_head` pops the front.
// - `head` + `next_entry`, `iter` and `to_array` all equal the model order.
// - Bucket-chain membership changes (`Chain`, `clear` on the table) never
//   alter order membership, and vice versa.
// - Freeing an entry removes it from both structures.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_ordered_list_state_machine((pool, ops) in arb_scenario()) {
        let mut arena: EntryArena<usize> = EntryArena::new();
        let list = OrderedList::new(&mut arena);
        let table = BucketTable::new(&mut arena, 4);
        let mut handles: Vec<EntryHandle> = (0..pool).map(|i| arena.insert(i)).collect();
        let mut order: VecDeque<usize> = VecDeque::new();
        let mut chained: Vec<usize> = Vec::new();

        for op in ops {
            match op {
                Op::Add(i) => {
                    prop_assert!(list.add(&mut arena, handles[i]));
                    order.retain(|&x| x != i);
                    order.push_back(i);
                }
                Op::PopOrder(i) => {
                    let was = order.contains(&i);
                    prop_assert_eq!(arena.pop_order_entry(handles[i]), was);
                    order.retain(|&x| x != i);
                }
                Op::RemoveHead => {
                    let got = list.remove_head(&mut arena).map(|e| slot_of(&handles, e));
                    prop_assert_eq!(got, order.pop_front());
                }
                Op::Chain(i) => {
                    table.set(&mut arena, i as u64, handles[i]);
                    chained.retain(|&x| x != i);
                    chained.push(i);
                }
                Op::Free(i) => {
                    prop_assert_eq!(arena.remove(handles[i]), Some(i));
                    order.retain(|&x| x != i);
                    chained.retain(|&x| x != i);
                    handles[i] = arena.insert(i);
                }
                Op::Walk => {
                    let expected: Vec<usize> = order.iter().copied().collect();
                    let (head, mut cursor) = list.head(&arena);
                    let mut walked: Vec<EntryHandle> = head.into_iter().collect();
                    walked.extend(std::iter::from_fn(|| cursor.next_entry(&arena)));
                    prop_assert!(cursor.state().is_idle());
                    let walked_ids: Vec<usize> = walked.iter().map(|&e| slot_of(&handles, e)).collect();
                    prop_assert_eq!(&walked_ids, &expected);

                    let mut array = Vec::new();
                    prop_assert_eq!(list.to_array(&arena, &mut array), expected.len());
                    prop_assert_eq!(&array, &walked);
                    prop_assert_eq!(list.iter(&arena).collect::<Vec<_>>(), walked);
                }
                Op::Clear => {
                    prop_assert_eq!(list.clear(&mut arena), order.len());
                    order.clear();
                }
            }

            prop_assert_eq!(list.count(&arena), order.len());
            prop_assert_eq!(table.count(&arena), chained.len());
            prop_assert_eq!(
                list.peek_head(&arena).map(|e| slot_of(&handles, e)),
                order.front().copied()
            );
            prop_assert_eq!(
                list.newest(&arena).map(|e| slot_of(&handles, e)),
                order.back().copied()
            );
            for (i, &h) in handles.iter().enumerate() {
                prop_assert_eq!(arena.has_next_in_order(h), order.contains(&i));
                prop_assert_eq!(arena.has_next(h), chained.contains(&i));
            }
            prop_assert!(list.check_invariants(&arena).is_ok());
            prop_assert!(table.check_invariants(&arena).is_ok());
        }
    }
}
