//! EntryArena: caller-owned node storage with self-unlinking entries.
//!
//! Every node carries two independent link pairs: `chain` threads it into
//! a bucket of a `BucketTable`, `order` threads it into an `OrderedList`.
//! Links are handles into the same arena, so unlinking an entry only needs
//! the arena, never the table or list that owns the ring.
//!
//! Anchors (the sentinels of each ring) are payload-less nodes stored in
//! the same slot map. They are created and freed by the structures that
//! own them and are never reported to callers as entries.

use crate::error::TableError;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashSet;
use slotmap::{DefaultKey, SlotMap};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryHandle(DefaultKey);

impl EntryHandle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        EntryHandle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn value<'a, T>(&self, arena: &'a EntryArena<T>) -> Option<&'a T> {
        arena.get(*self)
    }

    pub fn value_mut<'a, T>(&self, arena: &'a mut EntryArena<T>) -> Option<&'a mut T> {
        arena.get_mut(*self)
    }

    pub fn hash_code<T>(&self, arena: &EntryArena<T>) -> Option<u64> {
        arena.hash_code(*self)
    }
}

/// Neighbor handles within one ring. `next == None` means detached.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Links {
    pub(crate) prev: Option<EntryHandle>,
    pub(crate) next: Option<EntryHandle>,
}

impl Links {
    const DETACHED: Links = Links {
        prev: None,
        next: None,
    };

    fn is_linked(&self) -> bool {
        self.next.is_some()
    }
}

/// Selects which link pair of a node an operation works on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Ring {
    Chain,
    Order,
}

#[derive(Debug)]
pub(crate) struct Node<T> {
    // `None` marks an anchor.
    value: Option<T>,
    hash: u64,
    chain: Links,
    order: Links,
}

impl<T> Node<T> {
    fn links(&self, ring: Ring) -> &Links {
        match ring {
            Ring::Chain => &self.chain,
            Ring::Order => &self.order,
        }
    }

    fn links_mut(&mut self, ring: Ring) -> &mut Links {
        match ring {
            Ring::Chain => &mut self.chain,
            Ring::Order => &mut self.order,
        }
    }

    fn is_anchor(&self) -> bool {
        self.value.is_none()
    }
}

/// Identity of an arena; tables and lists remember the arena they were
/// built on so misuse can be caught in debug builds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct ArenaId(u64);

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct EntryArena<T> {
    id: ArenaId,
    slots: SlotMap<DefaultKey, Node<T>>, // entries and anchors, generational keys
    anchors: usize,
}

impl<T> Default for EntryArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the entries of an `EntryArena` in slot order.
pub struct Iter<'a, T> {
    it: slotmap::basic::Iter<'a, DefaultKey, Node<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (EntryHandle, &'a T);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .by_ref()
            .find_map(|(k, n)| n.value.as_ref().map(|v| (EntryHandle::new(k), v)))
    }
}

/// Mutable iterator over the entries of an `EntryArena` in slot order.
pub struct IterMut<'a, T> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Node<T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (EntryHandle, &'a mut T);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .by_ref()
            .find_map(|(k, n)| n.value.as_mut().map(|v| (EntryHandle::new(k), v)))
    }
}

impl<T> EntryArena<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: ArenaId(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed)),
            slots: SlotMap::with_capacity_and_key(capacity),
            anchors: 0,
        }
    }

    /// Number of entries, not counting anchors.
    pub fn len(&self) -> usize {
        self.slots.len() - self.anchors
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates a detached entry.
    pub fn insert(&mut self, value: T) -> EntryHandle {
        EntryHandle::new(self.slots.insert(Node {
            value: Some(value),
            hash: 0,
            chain: Links::DETACHED,
            order: Links::DETACHED,
        }))
    }

    /// Unlinks the entry from both rings and frees its slot.
    pub fn remove(&mut self, entry: EntryHandle) -> Option<T> {
        if !self.contains(entry) {
            return None;
        }
        self.detach(Ring::Chain, entry);
        self.detach(Ring::Order, entry);
        self.slots.remove(entry.raw_handle()).and_then(|n| n.value)
    }

    pub fn contains(&self, entry: EntryHandle) -> bool {
        self.get(entry).is_some()
    }

    pub fn get(&self, entry: EntryHandle) -> Option<&T> {
        self.slots
            .get(entry.raw_handle())
            .and_then(|n| n.value.as_ref())
    }

    pub fn get_mut(&mut self, entry: EntryHandle) -> Option<&mut T> {
        self.slots
            .get_mut(entry.raw_handle())
            .and_then(|n| n.value.as_mut())
    }

    /// Hash code stored by the last `BucketTable::set`; `0` if never set.
    pub fn hash_code(&self, entry: EntryHandle) -> Option<u64> {
        self.entry_node(entry).map(|n| n.hash)
    }

    /// True iff the entry is currently threaded into a bucket chain.
    pub fn has_next(&self, entry: EntryHandle) -> bool {
        self.entry_node(entry)
            .is_some_and(|n| n.chain.is_linked())
    }

    /// True iff the entry is currently threaded into an order list.
    pub fn has_next_in_order(&self, entry: EntryHandle) -> bool {
        self.entry_node(entry)
            .is_some_and(|n| n.order.is_linked())
    }

    /// Unlinks the entry from its bucket chain. Returns `false` when it was
    /// not chained (or the handle is stale); calling it again is a no-op.
    pub fn pop_self(&mut self, entry: EntryHandle) -> bool {
        self.contains(entry) && self.detach(Ring::Chain, entry)
    }

    /// Unlinks the entry from its order list; same contract as `pop_self`.
    pub fn pop_order_entry(&mut self, entry: EntryHandle) -> bool {
        self.contains(entry) && self.detach(Ring::Order, entry)
    }

    /// Newer neighbor in the bucket chain (the one attached right after
    /// this entry), `None` if detached or if the neighbor is the bucket's
    /// anchor.
    pub fn chain_prev(&self, entry: EntryHandle) -> Option<EntryHandle> {
        self.visible_neighbor(entry, Ring::Chain, |l| l.prev)
    }

    /// Older neighbor in the bucket chain; same `None` cases as `chain_prev`.
    pub fn chain_next(&self, entry: EntryHandle) -> Option<EntryHandle> {
        self.visible_neighbor(entry, Ring::Chain, |l| l.next)
    }

    /// Newer neighbor in the order list, `None` if detached or at the
    /// newest end.
    pub fn order_prev(&self, entry: EntryHandle) -> Option<EntryHandle> {
        self.visible_neighbor(entry, Ring::Order, |l| l.prev)
    }

    /// Older neighbor in the order list, `None` if detached or at the
    /// oldest end.
    pub fn order_next(&self, entry: EntryHandle) -> Option<EntryHandle> {
        self.visible_neighbor(entry, Ring::Order, |l| l.next)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            it: self.slots.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            it: self.slots.iter_mut(),
        }
    }

    fn entry_node(&self, entry: EntryHandle) -> Option<&Node<T>> {
        self.slots
            .get(entry.raw_handle())
            .filter(|n| !n.is_anchor())
    }

    fn visible_neighbor(
        &self,
        entry: EntryHandle,
        ring: Ring,
        pick: impl FnOnce(&Links) -> Option<EntryHandle>,
    ) -> Option<EntryHandle> {
        let neighbor = pick(self.entry_node(entry)?.links(ring))?;
        self.entry_node(neighbor).map(|_| neighbor)
    }

    // Linked neighbors are always live nodes of this arena.
    fn links_mut(&mut self, ring: Ring, at: EntryHandle) -> &mut Links {
        self.slots[at.raw_handle()].links_mut(ring)
    }

    pub(crate) fn id(&self) -> ArenaId {
        self.id
    }

    /// Allocates an anchor that is self-linked on `ring` (an empty ring).
    pub(crate) fn new_anchor(&mut self, ring: Ring) -> EntryHandle {
        let anchor = EntryHandle::new(self.slots.insert(Node {
            value: None,
            hash: 0,
            chain: Links::DETACHED,
            order: Links::DETACHED,
        }));
        *self.links_mut(ring, anchor) = Links {
            prev: Some(anchor),
            next: Some(anchor),
        };
        self.anchors += 1;
        anchor
    }

    /// Frees an anchor. The caller must have drained its ring first.
    pub(crate) fn release_anchor(&mut self, anchor: EntryHandle) {
        if self
            .slots
            .get(anchor.raw_handle())
            .is_some_and(|n| n.is_anchor())
        {
            self.slots.remove(anchor.raw_handle());
            self.anchors -= 1;
        }
    }

    pub(crate) fn set_hash(&mut self, entry: EntryHandle, hash: u64) {
        if let Some(node) = self.slots.get_mut(entry.raw_handle()) {
            node.hash = hash;
        }
    }

    pub(crate) fn prev(&self, ring: Ring, at: EntryHandle) -> Option<EntryHandle> {
        self.slots.get(at.raw_handle())?.links(ring).prev
    }

    pub(crate) fn next(&self, ring: Ring, at: EntryHandle) -> Option<EntryHandle> {
        self.slots.get(at.raw_handle())?.links(ring).next
    }

    /// Filters out anchors: `Some(at)` only when `at` is a live entry.
    pub(crate) fn as_entry(&self, at: EntryHandle) -> Option<EntryHandle> {
        self.entry_node(at).map(|_| at)
    }

    /// One scan step: the stored hash of `at` and its newer neighbor.
    /// `None` when `at` is an anchor, freed, or detached, which ends a scan.
    pub(crate) fn step(&self, ring: Ring, at: EntryHandle) -> Option<(u64, EntryHandle)> {
        let node = self.entry_node(at)?;
        node.links(ring).prev.map(|prev| (node.hash, prev))
    }

    /// Splices `entry` in on the next side of `anchor`. `entry` must be
    /// detached on `ring`.
    pub(crate) fn attach_after(&mut self, ring: Ring, anchor: EntryHandle, entry: EntryHandle) {
        let after = self.next(ring, anchor).unwrap_or(anchor);
        *self.links_mut(ring, entry) = Links {
            prev: Some(anchor),
            next: Some(after),
        };
        self.links_mut(ring, after).prev = Some(entry);
        self.links_mut(ring, anchor).next = Some(entry);
    }

    /// Joins the neighbors of `entry` and clears its links. Returns `false`
    /// if it was not linked on `ring`.
    pub(crate) fn detach(&mut self, ring: Ring, entry: EntryHandle) -> bool {
        let Some(node) = self.slots.get(entry.raw_handle()) else {
            return false;
        };
        let Links {
            prev: Some(prev),
            next: Some(next),
        } = *node.links(ring)
        else {
            return false;
        };
        self.links_mut(ring, next).prev = Some(prev);
        self.links_mut(ring, prev).next = Some(next);
        *self.links_mut(ring, entry) = Links::DETACHED;
        true
    }

    /// Number of entries in the ring anchored at `anchor`.
    pub(crate) fn ring_len(&self, ring: Ring, anchor: EntryHandle) -> usize {
        let mut n = 0;
        let mut at = self.prev(ring, anchor);
        while let Some(h) = at {
            if h == anchor {
                break;
            }
            n += 1;
            at = self.prev(ring, h);
        }
        n
    }

    pub(crate) fn ring_is_empty(&self, ring: Ring, anchor: EntryHandle) -> bool {
        self.prev(ring, anchor) == Some(anchor)
    }

    /// Detaches entries oldest-first until the ring is empty.
    pub(crate) fn drain_ring(&mut self, ring: Ring, anchor: EntryHandle) -> usize {
        let mut n = 0;
        while let Some(oldest) = self.prev(ring, anchor) {
            if oldest == anchor || !self.detach(ring, oldest) {
                break;
            }
            n += 1;
        }
        n
    }

    /// Walks the ring anchored at `anchor` forward, verifying link symmetry
    /// and that each node is a live entry seen for the first time. `check`
    /// receives each entry and its stored hash. Returns the ring length.
    pub(crate) fn check_ring(
        &self,
        ring: Ring,
        anchor: EntryHandle,
        seen: &mut HashSet<EntryHandle>,
        mut check: impl FnMut(EntryHandle, u64) -> Result<(), TableError>,
    ) -> Result<usize, TableError> {
        match self.slots.get(anchor.raw_handle()) {
            Some(n) if n.is_anchor() => {}
            _ => return Err(TableError::invariant("anchor missing from arena")),
        }
        let mut len = 0usize;
        let mut at = anchor;
        loop {
            let next = self
                .next(ring, at)
                .ok_or_else(|| TableError::invariant("linked node without next link"))?;
            if self.prev(ring, next) != Some(at) {
                return Err(TableError::invariant("asymmetric prev/next links"));
            }
            if next == anchor {
                return Ok(len);
            }
            let node = self
                .entry_node(next)
                .ok_or_else(|| TableError::invariant("ring reaches a foreign anchor or freed slot"))?;
            if !seen.insert(next) {
                return Err(TableError::invariant("entry linked more than once"));
            }
            check(next, node.hash)?;
            len += 1;
            if len > self.slots.len() {
                return Err(TableError::invariant("ring does not close"));
            }
            at = next;
        }
    }
}
