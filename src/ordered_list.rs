//! OrderedList: a single anchored ring over the `order` links of entries.
//!
//! Gives a table-wide ordering (insertion or access order, whatever the
//! caller maintains with `add`) over the same entries a `BucketTable`
//! chains by hash. The oldest member sits on the anchor's `prev` side,
//! which makes `remove_head` the O(1) eviction step.

use crate::cursor::OrderCursor;
use crate::entry::{ArenaId, EntryArena, EntryHandle, Ring};
use crate::error::TableError;
use core::iter::FusedIterator;
use hashbrown::HashSet;

#[derive(Debug)]
pub struct OrderedList {
    arena: ArenaId,
    anchor: EntryHandle,
}

impl OrderedList {
    pub fn new<T>(arena: &mut EntryArena<T>) -> Self {
        let anchor = arena.new_anchor(Ring::Order);
        log_debug!("ordered list created");
        Self {
            arena: arena.id(),
            anchor,
        }
    }

    #[inline]
    fn debug_check_arena<T>(&self, arena: &EntryArena<T>) {
        debug_assert!(
            arena.id() == self.arena,
            "OrderedList used with an arena it was not built on"
        );
    }

    /// Makes `entry` the newest member, unlinking it from any order list it
    /// was already in. Returns `false` for a stale handle.
    pub fn add<T>(&self, arena: &mut EntryArena<T>, entry: EntryHandle) -> bool {
        self.debug_check_arena(arena);
        if !arena.contains(entry) {
            return false;
        }
        arena.detach(Ring::Order, entry);
        arena.attach_after(Ring::Order, self.anchor, entry);
        true
    }

    /// Oldest member plus a cursor over the newer ones.
    pub fn head<T>(&self, arena: &EntryArena<T>) -> (Option<EntryHandle>, OrderCursor) {
        self.debug_check_arena(arena);
        let mut cursor = OrderCursor::start(arena.prev(Ring::Order, self.anchor));
        let first = cursor.next_entry(arena);
        (first, cursor)
    }

    pub fn peek_head<T>(&self, arena: &EntryArena<T>) -> Option<EntryHandle> {
        self.debug_check_arena(arena);
        arena.as_entry(arena.prev(Ring::Order, self.anchor)?)
    }

    pub fn newest<T>(&self, arena: &EntryArena<T>) -> Option<EntryHandle> {
        self.debug_check_arena(arena);
        arena.as_entry(arena.next(Ring::Order, self.anchor)?)
    }

    /// Detaches and returns the oldest member.
    pub fn remove_head<T>(&self, arena: &mut EntryArena<T>) -> Option<EntryHandle> {
        let head = self.peek_head(arena)?;
        arena.detach(Ring::Order, head);
        Some(head)
    }

    pub fn count<T>(&self, arena: &EntryArena<T>) -> usize {
        self.debug_check_arena(arena);
        arena.ring_len(Ring::Order, self.anchor)
    }

    pub fn is_empty<T>(&self, arena: &EntryArena<T>) -> bool {
        self.debug_check_arena(arena);
        arena.ring_is_empty(Ring::Order, self.anchor)
    }

    /// Detaches every member without freeing it.
    pub fn clear<T>(&self, arena: &mut EntryArena<T>) -> usize {
        self.debug_check_arena(arena);
        let detached = arena.drain_ring(Ring::Order, self.anchor);
        log_debug!("ordered list cleared, {} entries detached", detached);
        detached
    }

    /// Members oldest to newest.
    pub fn iter<'a, T>(&self, arena: &'a EntryArena<T>) -> Iter<'a, T> {
        self.debug_check_arena(arena);
        Iter {
            arena,
            cursor: OrderCursor::start(arena.prev(Ring::Order, self.anchor)),
        }
    }

    pub fn to_array<T>(&self, arena: &EntryArena<T>, destination: &mut Vec<EntryHandle>) -> usize {
        destination.clear();
        destination.extend(self.iter(arena));
        destination.len()
    }

    /// Detaches all members and returns the anchor to the arena.
    pub fn dispose<T>(self, arena: &mut EntryArena<T>) {
        self.clear(arena);
        arena.release_anchor(self.anchor);
        log_debug!("ordered list disposed");
    }

    pub fn check_invariants<T>(&self, arena: &EntryArena<T>) -> Result<(), TableError> {
        if arena.id() != self.arena {
            return Err(TableError::invariant("list checked against a foreign arena"));
        }
        let mut seen = HashSet::new();
        arena.check_ring(Ring::Order, self.anchor, &mut seen, |_, _| Ok(()))?;
        Ok(())
    }
}

/// Iterator returned by `OrderedList::iter`.
pub struct Iter<'a, T> {
    arena: &'a EntryArena<T>,
    cursor: OrderCursor,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = EntryHandle;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_entry(self.arena)
    }
}

impl<'a, T> FusedIterator for Iter<'a, T> {}
