//! Explicit scan cursors for the multi-call enumeration protocols.
//!
//! All cursors share one state machine, `ScanState`: a lookup or `head`
//! call produces a cursor that is either `Scanning` (more results may
//! follow) or `Idle`. Each step either stays `Scanning` or goes `Idle`;
//! stepping an idle cursor returns `None` and stays idle.
//!
//! Cursors do not borrow the arena between steps. Mutating the arena
//! while a cursor is live is not supported: the cursor then either keeps
//! walking from wherever its position now lives or, if it lands on a
//! detached or freed entry or on any anchor, simply ends the scan.

use crate::bucket_table::BucketTable;
use crate::entry::{EntryArena, EntryHandle, Ring};

/// `Scanning` is not a promise that more results remain: after the last
/// result the state may rest on a ring anchor, and the next step then
/// goes `Idle` without yielding.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ScanState {
    #[default]
    Idle,
    /// Positioned on the next node to examine, which may be an anchor.
    Scanning(EntryHandle),
}

impl ScanState {
    pub(crate) fn at(position: Option<EntryHandle>) -> Self {
        position.map_or(ScanState::Idle, ScanState::Scanning)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ScanState::Idle)
    }
}

/// Continues a `BucketTable::lookup`, yielding the remaining entries whose
/// stored hash equals the looked-up hash, oldest first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MatchScan {
    hash: u64,
    state: ScanState,
}

impl MatchScan {
    /// A scan with nothing left to yield.
    pub fn idle() -> Self {
        Self::default()
    }

    pub(crate) fn start(hash: u64, position: Option<EntryHandle>) -> Self {
        Self {
            hash,
            state: ScanState::at(position),
        }
    }

    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn next_match<T>(&mut self, arena: &EntryArena<T>) -> Option<EntryHandle> {
        let ScanState::Scanning(mut at) = self.state else {
            return None;
        };
        while let Some((hash, newer)) = arena.step(Ring::Chain, at) {
            if hash == self.hash {
                self.state = ScanState::Scanning(newer);
                return Some(at);
            }
            at = newer;
        }
        self.state = ScanState::Idle;
        None
    }
}

/// Walks a `BucketTable` bucket by bucket (ascending), oldest to newest
/// within each bucket.
#[derive(Clone, Debug)]
pub struct InsertionCursor<'t> {
    table: &'t BucketTable,
    next_bucket: usize,
    state: ScanState,
}

impl<'t> InsertionCursor<'t> {
    pub(crate) fn new(table: &'t BucketTable) -> Self {
        Self {
            table,
            next_bucket: 0,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn next_entry<T>(&mut self, arena: &EntryArena<T>) -> Option<EntryHandle> {
        loop {
            if let ScanState::Scanning(at) = self.state {
                if let Some((_, newer)) = arena.step(Ring::Chain, at) {
                    self.state = ScanState::Scanning(newer);
                    return Some(at);
                }
                self.state = ScanState::Idle;
            }
            let anchor = *self.table.anchors().get(self.next_bucket)?;
            self.next_bucket += 1;
            self.state = ScanState::at(arena.prev(Ring::Chain, anchor));
        }
    }
}

/// Continues an `OrderedList::head`, oldest to newest.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct OrderCursor {
    state: ScanState,
}

impl OrderCursor {
    pub fn idle() -> Self {
        Self::default()
    }

    pub(crate) fn start(position: Option<EntryHandle>) -> Self {
        Self {
            state: ScanState::at(position),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn next_entry<T>(&mut self, arena: &EntryArena<T>) -> Option<EntryHandle> {
        let ScanState::Scanning(at) = self.state else {
            return None;
        };
        match arena.step(Ring::Order, at) {
            Some((_, newer)) => {
                self.state = ScanState::Scanning(newer);
                Some(at)
            }
            None => {
                self.state = ScanState::Idle;
                None
            }
        }
    }
}
