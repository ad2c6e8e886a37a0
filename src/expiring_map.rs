//! The expiring half of the store: short id -> (value, kind, expiry),
//! backed by a paste-aware map plus a min-heap over expiry timestamps so
//! sweeping expired entries never requires a full scan.

use crate::error::MapError;
use crate::pastes_map::{HasKind, PasteAwareMap, ValueKind};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringEntry {
    pub value: String,
    pub kind: ValueKind,
    pub expiry: i64,
}

impl HasKind for ExpiringEntry {
    fn kind(&self) -> ValueKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapKey {
    expiry: i64,
    key: String,
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiry.cmp(&other.expiry).then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Wraps `HeapKey` so the natural `Ord` gives a min-heap over `BinaryHeap`
/// (which is otherwise a max-heap).
#[derive(Debug, Clone, PartialEq, Eq)]
struct MinHeapKey(HeapKey);

impl Ord for MinHeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

impl PartialOrd for MinHeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    map: PasteAwareMap<ExpiringEntry>,
    heap: BinaryHeap<MinHeapKey>,
}

pub struct ExpiringMap {
    inner: Mutex<Inner>,
}

/// Accumulates entries for a bulk load (used by recovery) without
/// re-heapifying on every single insert.
pub struct Builder {
    map: PasteAwareMap<ExpiringEntry>,
    heap_items: Vec<MinHeapKey>,
}

impl Builder {
    pub fn insert(&mut self, key: String, entry: ExpiringEntry) {
        self.heap_items.push(MinHeapKey(HeapKey { expiry: entry.expiry, key: key.clone() }));
        self.map.insert_new(key, entry);
    }
}

impl ExpiringMap {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { map: PasteAwareMap::new(), heap: BinaryHeap::new() }) }
    }

    /// Begins a bulk-load session. Call [`Builder::insert`] for every
    /// recovered record, then [`ExpiringMap::finish`] to heapify once.
    pub fn begin() -> Builder {
        Builder { map: PasteAwareMap::new(), heap_items: Vec::new() }
    }

    pub fn finish(builder: Builder) -> Self {
        Self { inner: Mutex::new(Inner { map: builder.map, heap: BinaryHeap::from(builder.heap_items) }) }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    pub fn put_new(&self, key: String, entry: ExpiringEntry) -> Result<(), MapError> {
        let mut inner = self.inner.lock();
        if inner.map.contains_key(&key) {
            return Err(MapError::KeyAlreadyExists);
        }
        inner.heap.push(MinHeapKey(HeapKey { expiry: entry.expiry, key: key.clone() }));
        inner.map.insert_new(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<ExpiringEntry> {
        self.inner.lock().map.get(key).cloned()
    }

    pub fn num_items(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn num_pastes(&self) -> usize {
        self.inner.lock().map.num_pastes()
    }

    /// Removes and returns every entry whose expiry is `+ grace <= now`.
    /// `grace` holds each entry past its logical expiry so `get` has a
    /// window to report `KeyExpired` instead of `NonExistentKey`.
    pub fn remove_all_expired(&self, now: i64, grace: i64) -> Vec<(String, ExpiringEntry)> {
        let mut inner = self.inner.lock();
        let mut expired = Vec::new();
        while let Some(top) = inner.heap.peek() {
            if top.0.expiry + grace > now {
                break;
            }
            let MinHeapKey(HeapKey { key, .. }) = inner.heap.pop().unwrap();
            if let Some(entry) = inner.map.remove(&key) {
                expired.push((key, entry));
            }
        }
        expired
    }
}

impl Default for ExpiringMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str, expiry: i64) -> ExpiringEntry {
        ExpiringEntry { value: value.into(), kind: ValueKind::Url, expiry }
    }

    #[test]
    fn put_new_rejects_duplicate_key() {
        let map = ExpiringMap::new();
        map.put_new("a".into(), entry("x", 100)).unwrap();
        assert_eq!(map.put_new("a".into(), entry("y", 200)), Err(MapError::KeyAlreadyExists));
    }

    #[test]
    fn get_returns_stored_entry() {
        let map = ExpiringMap::new();
        map.put_new("a".into(), entry("x", 100)).unwrap();
        let got = map.get("a").unwrap();
        assert_eq!(got.value, "x");
        assert_eq!(got.expiry, 100);
    }

    #[test]
    fn remove_all_expired_pops_only_due_entries() {
        let map = ExpiringMap::new();
        map.put_new("a".into(), entry("x", 100)).unwrap();
        map.put_new("b".into(), entry("y", 200)).unwrap();
        map.put_new("c".into(), entry("z", 50)).unwrap();

        let expired = map.remove_all_expired(100, 0);
        let mut keys: Vec<_> = expired.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(map.num_items(), 1);
        assert!(map.get("b").is_some());
    }

    #[test]
    fn builder_bulk_load_matches_incremental_put() {
        let mut builder = ExpiringMap::begin();
        builder.insert("a".into(), entry("x", 10));
        builder.insert("b".into(), entry("y", 5));
        let map = ExpiringMap::finish(builder);
        assert_eq!(map.num_items(), 2);
        let expired = map.remove_all_expired(10, 0);
        assert_eq!(expired.len(), 2);
    }

    #[test]
    fn remove_all_expired_honors_grace_window() {
        let map = ExpiringMap::new();
        map.put_new("a".into(), entry("x", 100)).unwrap();
        assert!(map.remove_all_expired(100, 30).is_empty());
        assert_eq!(map.remove_all_expired(130, 30).len(), 1);
    }

    #[test]
    fn num_pastes_reflects_paste_entries() {
        let map = ExpiringMap::new();
        map.put_new("a".into(), ExpiringEntry { value: "x".into(), kind: ValueKind::Paste, expiry: 100 }).unwrap();
        map.put_new("b".into(), entry("y", 100)).unwrap();
        assert_eq!(map.num_pastes(), 1);
    }
}
