//! The permanent half of the store: short id -> (value, kind), no expiry,
//! no heap - entries live until the process is told to delete them, which
//! this crate never does on its own (there is no public delete operation).

use crate::error::MapError;
use crate::pastes_map::{HasKind, PasteAwareMap, ValueKind};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermanentEntry {
    pub value: String,
    pub kind: ValueKind,
}

impl HasKind for PermanentEntry {
    fn kind(&self) -> ValueKind {
        self.kind
    }
}

pub struct PermanentMap {
    inner: Mutex<PasteAwareMap<PermanentEntry>>,
}

/// Accumulates entries for a bulk load (used by recovery).
pub struct Builder {
    map: PasteAwareMap<PermanentEntry>,
}

impl Builder {
    pub fn insert(&mut self, key: String, entry: PermanentEntry) {
        self.map.insert_new(key, entry);
    }
}

impl PermanentMap {
    pub fn new() -> Self {
        Self { inner: Mutex::new(PasteAwareMap::new()) }
    }

    pub fn begin() -> Builder {
        Builder { map: PasteAwareMap::new() }
    }

    pub fn finish(builder: Builder) -> Self {
        Self { inner: Mutex::new(builder.map) }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn put_new(&self, key: String, entry: PermanentEntry) -> Result<(), MapError> {
        let mut inner = self.inner.lock();
        if inner.contains_key(&key) {
            return Err(MapError::KeyAlreadyExists);
        }
        inner.insert_new(key, entry);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<PermanentEntry> {
        self.inner.lock().get(key).cloned()
    }

    pub fn num_items(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn num_pastes(&self) -> usize {
        self.inner.lock().num_pastes()
    }
}

impl Default for PermanentMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_new_rejects_duplicate_key() {
        let map = PermanentMap::new();
        map.put_new("a".into(), PermanentEntry { value: "x".into(), kind: ValueKind::Url }).unwrap();
        assert_eq!(
            map.put_new("a".into(), PermanentEntry { value: "y".into(), kind: ValueKind::Url }),
            Err(MapError::KeyAlreadyExists)
        );
    }

    #[test]
    fn get_returns_stored_entry() {
        let map = PermanentMap::new();
        map.put_new("a".into(), PermanentEntry { value: "x".into(), kind: ValueKind::Paste }).unwrap();
        assert_eq!(map.get("a").unwrap().value, "x");
        assert_eq!(map.num_pastes(), 1);
    }

    #[test]
    fn builder_bulk_load_matches_incremental_put() {
        let mut builder = PermanentMap::begin();
        builder.insert("a".into(), PermanentEntry { value: "x".into(), kind: ValueKind::Url });
        let map = PermanentMap::finish(builder);
        assert_eq!(map.num_items(), 1);
        assert_eq!(map.get("a").unwrap().value, "x");
    }
}
