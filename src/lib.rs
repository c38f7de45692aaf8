//! linked-bucket-table: sentinel-anchored circular bucket chains and order
//! lists over a caller-owned handle arena.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: hash chaining with O(1) self-unlinking entries, plus a second,
//!   independent ordering over the same entries for eviction.
//! - Layers:
//!   - EntryArena<T>: slot-map storage of nodes addressed by generational
//!     `EntryHandle`s. Every node has two link pairs (`chain`, `order`).
//!     Anchors (ring sentinels) live in the same arena.
//!   - BucketTable: a fixed, power-of-two array of anchors. Entries are
//!     threaded into the bucket `hash_code & (bucket_count - 1)`.
//!   - OrderedList: one anchor on the `order` links; the oldest member
//!     sits next to the anchor's `prev` side.
//!   - Cursors (`MatchScan`, `InsertionCursor`, `OrderCursor`): explicit
//!     values carrying multi-call scan state.
//!
//! Constraints
//! - Single-threaded; no interior mutability, no locking.
//! - Hash codes are computed by the caller. Keys are never compared; two
//!   entries "match" when their stored hash codes are equal.
//! - No resizing: the bucket count is fixed at construction.
//! - No counters are cached: `count` walks the rings.
//!
//! Ownership
//! - The caller owns the arena and its entries. Tables and lists only
//!   thread and unthread links; `clear` detaches, it never frees.
//! - Unlinking needs only the arena (`EntryArena::pop_self`,
//!   `EntryArena::pop_order_entry`), because each node stores the handles
//!   of both of its neighbors.
//! - Anchors belong to their table/list. `dispose` detaches all entries and
//!   frees the anchors; dropping a table without `dispose` leaves its
//!   anchors (and any entries still linked to them) in the arena.
//!
//! Bucket count contract
//! - `BucketTable::new` keeps the unchecked power-of-two contract in
//!   release builds and asserts it in debug builds. `try_new` validates
//!   and returns `TableError::BucketCountNotPowerOfTwo`.
//!
//! Scans and mutation
//! - Cursors do not borrow the arena between steps. Mutating the arena
//!   mid-scan is unsupported; a cursor that lands on a detached or freed
//!   entry ends its scan. The borrowing iterators (`iter`, `matches`)
//!   rule this out statically.

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub mod bucket_table;
mod bucket_table_proptest;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod ordered_list;
mod ordered_list_proptest;

// Public surface
pub use bucket_table::BucketTable;
pub use cursor::{InsertionCursor, MatchScan, OrderCursor, ScanState};
pub use entry::{EntryArena, EntryHandle};
pub use error::TableError;
pub use ordered_list::OrderedList;
