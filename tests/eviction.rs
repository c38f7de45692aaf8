// Eviction scenario: a small bounded cache assembled from a BucketTable
// (lookup by hash) and an OrderedList (recency), the way a caller is
// expected to combine them.
//
// Invariants asserted:
// - Capacity: the cache never holds more than `capacity` entries.
// - Recency: a hit moves the entry to the newest end of the list, so the
//   evicted entry is always the least recently touched one.
// - Cleanup: evicted entries are unlinked from both structures and freed.
use linked_bucket_table::{BucketTable, EntryArena, EntryHandle, OrderedList};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

struct Slot {
    key: String,
    value: u32,
}

struct LruCache {
    arena: EntryArena<Slot>,
    table: BucketTable,
    recency: OrderedList,
    capacity: usize,
}

fn hash_of(key: &str) -> u64 {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        let mut arena = EntryArena::with_capacity(capacity);
        let table = BucketTable::for_capacity(&mut arena, capacity);
        let recency = OrderedList::new(&mut arena);
        Self {
            arena,
            table,
            recency,
            capacity,
        }
    }

    fn find(&self, key: &str) -> Option<EntryHandle> {
        self.table
            .matches(&self.arena, hash_of(key))
            .find(|h| h.value(&self.arena).is_some_and(|s| s.key == key))
    }

    fn get(&mut self, key: &str) -> Option<u32> {
        let h = self.find(key)?;
        self.recency.add(&mut self.arena, h);
        h.value(&self.arena).map(|s| s.value)
    }

    fn put(&mut self, key: &str, value: u32) -> Option<String> {
        if let Some(h) = self.find(key) {
            if let Some(slot) = h.value_mut(&mut self.arena) {
                slot.value = value;
            }
            self.recency.add(&mut self.arena, h);
            return None;
        }
        let mut evicted = None;
        if self.len() >= self.capacity {
            if let Some(victim) = self.recency.remove_head(&mut self.arena) {
                evicted = self.arena.remove(victim).map(|s| s.key);
            }
        }
        let h = self.arena.insert(Slot {
            key: key.to_string(),
            value,
        });
        self.table.set(&mut self.arena, hash_of(key), h);
        self.recency.add(&mut self.arena, h);
        evicted
    }

    fn len(&self) -> usize {
        self.recency.count(&self.arena)
    }
}

// Test: filling past capacity evicts in insertion order when untouched.
#[test]
fn evicts_oldest_when_full() {
    let mut cache = LruCache::new(2);
    assert_eq!(cache.put("a", 1), None);
    assert_eq!(cache.put("b", 2), None);
    assert_eq!(cache.put("c", 3), Some("a".to_string()));
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(2));
    assert_eq!(cache.get("c"), Some(3));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.arena.len(), 2);
}

// Test: a hit refreshes recency.
// Verifies: the touched entry survives the next eviction.
#[test]
fn hit_refreshes_recency() {
    let mut cache = LruCache::new(2);
    cache.put("a", 1);
    cache.put("b", 2);
    assert_eq!(cache.get("a"), Some(1));
    assert_eq!(cache.put("c", 3), Some("b".to_string()));
    assert_eq!(cache.get("a"), Some(1));
}

// Test: updating an existing key neither grows the cache nor evicts.
#[test]
fn update_in_place() {
    let mut cache = LruCache::new(2);
    cache.put("a", 1);
    cache.put("b", 2);
    assert_eq!(cache.put("a", 10), None);
    assert_eq!(cache.get("a"), Some(10));
    assert_eq!(cache.table.count(&cache.arena), 2);
}

// Test: many keys through a tiny cache.
// Verifies: both structures stay consistent and agree on size.
#[test]
fn churn_keeps_structures_consistent() {
    let mut cache = LruCache::new(8);
    for i in 0..200u32 {
        let key = format!("k{}", i % 23);
        if cache.get(&key).is_none() {
            cache.put(&key, i);
        }
        assert!(cache.len() <= 8);
        assert_eq!(cache.table.count(&cache.arena), cache.len());
    }
    cache.table.check_invariants(&cache.arena).unwrap();
    cache.recency.check_invariants(&cache.arena).unwrap();
}
