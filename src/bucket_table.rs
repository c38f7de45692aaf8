//! BucketTable: fixed array of anchored circular bucket chains.
//!
//! Each bucket is a ring hanging off its own anchor in the `EntryArena`.
//! `set` splices an entry in on the anchor's next side, so walking from the
//! anchor towards `prev` visits a bucket oldest-inserted first. Both `get`
//! and the insertion-order walk use that direction.
//!
//! The bucket for a hash code is `hash_code & (bucket_count - 1)`, which
//! only addresses every bucket when `bucket_count` is a power of two. `new`
//! does not check this outside of debug builds; `try_new` does.

use crate::cursor::{InsertionCursor, MatchScan};
use crate::entry::{ArenaId, EntryArena, EntryHandle, Ring};
use crate::error::TableError;
use core::iter::FusedIterator;
use hashbrown::HashSet;

#[derive(Debug)]
pub struct BucketTable {
    arena: ArenaId,
    anchors: Box<[EntryHandle]>,
    mask: usize,
}

impl BucketTable {
    /// Builds a table with `bucket_count` empty buckets.
    ///
    /// `bucket_count` must be a power of two. Only debug builds assert it;
    /// in release builds other counts leave some buckets unreachable.
    /// A count of zero is treated as one.
    pub fn new<T>(arena: &mut EntryArena<T>, bucket_count: usize) -> Self {
        debug_assert!(
            bucket_count.is_power_of_two(),
            "bucket_count must be a power of two, got {bucket_count}"
        );
        let bucket_count = bucket_count.max(1);
        let anchors: Box<[EntryHandle]> = (0..bucket_count)
            .map(|_| arena.new_anchor(Ring::Chain))
            .collect();
        log_debug!("bucket table created with {} buckets", bucket_count);
        Self {
            arena: arena.id(),
            anchors,
            mask: bucket_count - 1,
        }
    }

    /// Like `new`, but rejects bucket counts that are not a power of two.
    pub fn try_new<T>(arena: &mut EntryArena<T>, bucket_count: usize) -> Result<Self, TableError> {
        if !bucket_count.is_power_of_two() {
            log_warn!("rejected bucket count {}", bucket_count);
            return Err(TableError::BucketCountNotPowerOfTwo { bucket_count });
        }
        Ok(Self::new(arena, bucket_count))
    }

    /// Sizes the table to the next power of two at or above
    /// `expected_entries`.
    pub fn for_capacity<T>(arena: &mut EntryArena<T>, expected_entries: usize) -> Self {
        let bucket_count = expected_entries.max(1).next_power_of_two();
        log_trace!(
            "sizing bucket table for {} entries: {} buckets",
            expected_entries,
            bucket_count
        );
        Self::new(arena, bucket_count)
    }

    pub fn bucket_count(&self) -> usize {
        self.anchors.len()
    }

    /// Any bit pattern is accepted; high bits are simply masked off.
    #[inline]
    pub fn bucket_index(&self, hash_code: u64) -> usize {
        (hash_code as usize) & self.mask
    }

    pub(crate) fn anchors(&self) -> &[EntryHandle] {
        &self.anchors
    }

    fn anchor_for(&self, hash_code: u64) -> EntryHandle {
        self.anchors[self.bucket_index(hash_code)]
    }

    #[inline]
    fn debug_check_arena<T>(&self, arena: &EntryArena<T>) {
        debug_assert!(
            arena.id() == self.arena,
            "BucketTable used with an arena it was not built on"
        );
    }

    /// Threads `entry` into the bucket for `hash_code` as its newest member,
    /// first unlinking it from whatever chain it was in. Returns `false` for
    /// a stale handle.
    pub fn set<T>(&self, arena: &mut EntryArena<T>, hash_code: u64, entry: EntryHandle) -> bool {
        self.debug_check_arena(arena);
        if !arena.contains(entry) {
            return false;
        }
        arena.detach(Ring::Chain, entry);
        arena.set_hash(entry, hash_code);
        arena.attach_after(Ring::Chain, self.anchor_for(hash_code), entry);
        true
    }

    /// Oldest entry whose stored hash equals `hash_code`.
    pub fn get<T>(&self, arena: &EntryArena<T>, hash_code: u64) -> Option<EntryHandle> {
        self.lookup(arena, hash_code).0
    }

    /// Oldest entry whose stored hash equals `hash_code`, plus a scan that
    /// yields the newer collisions. On a miss the scan is idle.
    pub fn lookup<T>(&self, arena: &EntryArena<T>, hash_code: u64) -> (Option<EntryHandle>, MatchScan) {
        self.debug_check_arena(arena);
        let anchor = self.anchor_for(hash_code);
        let mut scan = MatchScan::start(hash_code, arena.prev(Ring::Chain, anchor));
        let found = scan.next_match(arena);
        (found, scan)
    }

    /// All entries whose stored hash equals `hash_code`, oldest first.
    pub fn matches<'a, T>(&self, arena: &'a EntryArena<T>, hash_code: u64) -> Matches<'a, T> {
        self.debug_check_arena(arena);
        let anchor = self.anchor_for(hash_code);
        Matches {
            arena,
            scan: MatchScan::start(hash_code, arena.prev(Ring::Chain, anchor)),
        }
    }

    /// Walks every bucket; no counter is cached.
    pub fn count<T>(&self, arena: &EntryArena<T>) -> usize {
        self.debug_check_arena(arena);
        self.anchors
            .iter()
            .map(|&anchor| arena.ring_len(Ring::Chain, anchor))
            .sum()
    }

    pub fn is_empty<T>(&self, arena: &EntryArena<T>) -> bool {
        self.debug_check_arena(arena);
        self.anchors
            .iter()
            .all(|&anchor| arena.ring_is_empty(Ring::Chain, anchor))
    }

    /// Detaches every entry without freeing it. Returns how many were
    /// detached.
    pub fn clear<T>(&self, arena: &mut EntryArena<T>) -> usize {
        self.debug_check_arena(arena);
        let detached = self
            .anchors
            .iter()
            .map(|&anchor| arena.drain_ring(Ring::Chain, anchor))
            .sum();
        log_debug!("bucket table cleared, {} entries detached", detached);
        detached
    }

    /// First entry in insertion-walk order (lowest non-empty bucket, oldest
    /// entry in it), plus a cursor that continues the walk.
    pub fn head<'t, T>(&'t self, arena: &EntryArena<T>) -> (Option<EntryHandle>, InsertionCursor<'t>) {
        self.debug_check_arena(arena);
        let mut cursor = InsertionCursor::new(self);
        let first = cursor.next_entry(arena);
        (first, cursor)
    }

    pub fn head_entry<T>(&self, arena: &EntryArena<T>) -> Option<EntryHandle> {
        self.head(arena).0
    }

    /// Entries ordered by (bucket index, insertion order within bucket).
    /// This is not a table-wide recency order; use `OrderedList` for that.
    pub fn iter<'a, T>(&'a self, arena: &'a EntryArena<T>) -> Iter<'a, T> {
        self.debug_check_arena(arena);
        Iter {
            arena,
            cursor: InsertionCursor::new(self),
        }
    }

    /// Replaces the contents of `destination` with the entries in `iter`
    /// order and returns how many were written.
    pub fn to_array<T>(&self, arena: &EntryArena<T>, destination: &mut Vec<EntryHandle>) -> usize {
        destination.clear();
        destination.extend(self.iter(arena));
        destination.len()
    }

    /// Detaches all entries and returns the anchors to the arena.
    pub fn dispose<T>(self, arena: &mut EntryArena<T>) {
        self.clear(arena);
        for &anchor in self.anchors.iter() {
            arena.release_anchor(anchor);
        }
        log_debug!("bucket table with {} buckets disposed", self.anchors.len());
    }

    /// Verifies ring symmetry, that every entry sits in the bucket its
    /// stored hash selects, and that no entry is linked twice.
    pub fn check_invariants<T>(&self, arena: &EntryArena<T>) -> Result<(), TableError> {
        if arena.id() != self.arena {
            return Err(TableError::invariant("table checked against a foreign arena"));
        }
        let mut seen = HashSet::new();
        for (index, &anchor) in self.anchors.iter().enumerate() {
            arena.check_ring(Ring::Chain, anchor, &mut seen, |_, hash| {
                if self.bucket_index(hash) == index {
                    Ok(())
                } else {
                    Err(TableError::invariant(format!(
                        "entry with hash {hash:#x} found in bucket {index}"
                    )))
                }
            })?;
        }
        Ok(())
    }
}

/// Iterator returned by `BucketTable::iter`.
pub struct Iter<'a, T> {
    arena: &'a EntryArena<T>,
    cursor: InsertionCursor<'a>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = EntryHandle;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_entry(self.arena)
    }
}

impl<'a, T> FusedIterator for Iter<'a, T> {}

/// Iterator returned by `BucketTable::matches`.
pub struct Matches<'a, T> {
    arena: &'a EntryArena<T>,
    scan: MatchScan,
}

impl<'a, T> Iterator for Matches<'a, T> {
    type Item = EntryHandle;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.scan.next_match(self.arena)
    }
}

impl<'a, T> FusedIterator for Matches<'a, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(arena: &'a EntryArena<&'static str>, hs: &[EntryHandle]) -> Vec<&'a str> {
        hs.iter().map(|h| *h.value(arena).unwrap()).collect()
    }

    /// Invariant: with two buckets, odd hashes share bucket 1 and `get`
    /// still resolves each hash to its own entry.
    #[test]
    fn small_bucket_count_resolves_each_hash() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 2);
        for (hash, name) in [(1, "one"), (2, "two"), (3, "three")] {
            let e = arena.insert(name);
            assert!(table.set(&mut arena, hash, e));
        }
        for (hash, name) in [(1, "one"), (2, "two"), (3, "three")] {
            let h = table.get(&arena, hash).unwrap();
            assert_eq!(h.value(&arena), Some(&name));
        }
        assert_eq!(table.matches(&arena, 5).count(), 0);
        table.check_invariants(&arena).unwrap();
    }

    /// Invariant: on collision `get` returns the first insertion; the newer
    /// entry sits on its `prev` side and the anchor on its `next` side.
    #[test]
    fn collision_returns_oldest_with_newer_behind_it() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 16);
        let one = arena.insert("one");
        let two = arena.insert("two");
        table.set(&mut arena, 5, one);
        table.set(&mut arena, 5, two);

        assert_eq!(table.get(&arena, 5), Some(one));
        assert_eq!(arena.chain_prev(one), Some(two));
        assert_eq!(arena.chain_next(one), None);
    }

    /// Invariant: `next_match` yields newer collisions oldest first and
    /// returns `None` once the scan is exhausted, staying idle afterwards.
    #[test]
    fn lookup_then_next_match_walks_collisions() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 8);
        let items = ["one-one", "one-two", "one-three", "one-four"];
        for item in items {
            let e = arena.insert(item);
            table.set(&mut arena, 1, e);
        }
        // Same bucket, different hash: must be skipped.
        let other = arena.insert("nine");
        table.set(&mut arena, 9, other);

        let (first, mut scan) = table.lookup(&arena, 1);
        let mut seen = vec![first.unwrap()];
        while let Some(h) = scan.next_match(&arena) {
            seen.push(h);
        }
        assert_eq!(names(&arena, &seen), items);
        assert!(scan.state().is_idle());
        assert_eq!(scan.next_match(&arena), None);
    }

    #[test]
    fn lookup_miss_returns_idle_scan() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 4);
        let e = arena.insert("x");
        table.set(&mut arena, 4, e);
        let (found, mut scan) = table.lookup(&arena, 8);
        assert_eq!(found, None);
        assert!(scan.state().is_idle());
        assert_eq!(scan.next_match(&arena), None);
    }

    /// Invariant: re-setting an entry moves it; it is never chained twice.
    #[test]
    fn set_relinks_existing_entry() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 4);
        let a = arena.insert("a");
        let b = arena.insert("b");
        table.set(&mut arena, 1, a);
        table.set(&mut arena, 1, b);
        table.set(&mut arena, 1, a);

        assert_eq!(table.count(&arena), 2);
        assert_eq!(table.get(&arena, 1), Some(b));
        table.set(&mut arena, 2, a);
        assert_eq!(table.get(&arena, 1), Some(b));
        assert_eq!(table.get(&arena, 2), Some(a));
        assert_eq!(a.hash_code(&arena), Some(2));
        table.check_invariants(&arena).unwrap();
    }

    /// Invariant: `count` reflects every chained entry and `clear` detaches
    /// them all without freeing them.
    #[test]
    fn count_and_clear() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 8);
        for (hash, name) in [(1, "one"), (2, "two"), (2, "two-one"), (3, "three")] {
            let e = arena.insert(name);
            table.set(&mut arena, hash, e);
        }
        assert_eq!(table.count(&arena), 4);
        assert!(!table.is_empty(&arena));

        assert_eq!(table.clear(&mut arena), 4);
        assert_eq!(table.count(&arena), 0);
        assert!(table.is_empty(&arena));
        assert_eq!(arena.len(), 4);
        assert!(arena.iter().all(|(h, _)| !arena.has_next(h)));
    }

    /// Invariant: the insertion walk goes bucket by bucket and oldest to
    /// newest inside each bucket; `to_array` and `iter` agree with it.
    #[test]
    fn insertion_walk_orders_by_bucket_then_age() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 4);
        for (hash, name) in [(6, "six"), (1, "one"), (2, "two"), (5, "five"), (4, "four")] {
            let e = arena.insert(name);
            table.set(&mut arena, hash, e);
        }

        let (head, mut cursor) = table.head(&arena);
        let mut walked = vec![head.unwrap()];
        while let Some(h) = cursor.next_entry(&arena) {
            walked.push(h);
        }
        assert_eq!(names(&arena, &walked), ["four", "one", "five", "six", "two"]);
        assert_eq!(cursor.next_entry(&arena), None);

        let mut array = vec![walked[0]; 10];
        assert_eq!(table.to_array(&arena, &mut array), 5);
        assert_eq!(array, walked);
        assert_eq!(table.iter(&arena).collect::<Vec<_>>(), walked);
        assert_eq!(table.head_entry(&arena), Some(walked[0]));
    }

    #[test]
    fn empty_table_has_no_head() {
        let mut arena: EntryArena<()> = EntryArena::new();
        let table = BucketTable::new(&mut arena, 4);
        let (head, mut cursor) = table.head(&arena);
        assert_eq!(head, None);
        assert_eq!(cursor.next_entry(&arena), None);
        assert_eq!(table.iter(&arena).next(), None);
    }

    /// Invariant: hashes with high bits set (e.g. reinterpreted negatives)
    /// are masked like any other.
    #[test]
    fn any_bit_pattern_is_masked() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 8);
        let neg = arena.insert("neg");
        let hash = (-3i64) as u64;
        table.set(&mut arena, hash, neg);
        assert_eq!(table.bucket_index(hash), 5);
        assert_eq!(table.get(&arena, hash), Some(neg));
        assert_eq!(table.get(&arena, 5), None);
    }

    #[test]
    fn pop_self_removes_from_lookup() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 2);
        let a = arena.insert("a");
        let b = arena.insert("b");
        table.set(&mut arena, 3, a);
        table.set(&mut arena, 3, b);
        assert!(arena.pop_self(a));
        assert!(!arena.pop_self(a));
        assert_eq!(table.get(&arena, 3), Some(b));
        assert_eq!(table.count(&arena), 1);
    }

    #[test]
    fn set_with_stale_handle_is_rejected() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 2);
        let a = arena.insert("a");
        arena.remove(a);
        assert!(!table.set(&mut arena, 1, a));
        assert!(table.is_empty(&arena));
    }

    #[test]
    fn constructors_validate_and_size() {
        let mut arena: EntryArena<()> = EntryArena::new();
        assert_eq!(
            BucketTable::try_new(&mut arena, 12).unwrap_err(),
            TableError::BucketCountNotPowerOfTwo { bucket_count: 12 }
        );
        assert!(BucketTable::try_new(&mut arena, 0).is_err());
        assert_eq!(BucketTable::try_new(&mut arena, 16).unwrap().bucket_count(), 16);
        assert_eq!(BucketTable::for_capacity(&mut arena, 100).bucket_count(), 128);
        assert_eq!(BucketTable::for_capacity(&mut arena, 0).bucket_count(), 1);
    }

    /// Invariant: disposing a table detaches its entries and frees its
    /// anchors, leaving the entries themselves alive.
    #[test]
    fn dispose_returns_anchors() {
        let mut arena = EntryArena::new();
        let table = BucketTable::new(&mut arena, 4);
        let e = arena.insert(1);
        table.set(&mut arena, 7, e);
        table.dispose(&mut arena);
        assert!(!arena.has_next(e));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.remove(e), Some(1));
    }

    #[test]
    fn check_invariants_rejects_foreign_arena() {
        let mut a: EntryArena<()> = EntryArena::new();
        let b: EntryArena<()> = EntryArena::new();
        let table = BucketTable::new(&mut a, 2);
        assert!(table.check_invariants(&a).is_ok());
        assert!(matches!(
            table.check_invariants(&b),
            Err(TableError::Invariant(_))
        ));
    }

    /// Invariant (debug-only): a non-power-of-two bucket count trips the
    /// debug assertion in `new`.
    #[cfg(debug_assertions)]
    #[test]
    fn new_asserts_power_of_two_in_debug() {
        let res = std::panic::catch_unwind(|| {
            let mut arena: EntryArena<()> = EntryArena::new();
            let _ = BucketTable::new(&mut arena, 6);
        });
        assert!(res.is_err(), "expected debug assertion for bucket_count 6");
    }
}
