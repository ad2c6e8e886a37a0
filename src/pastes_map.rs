//! A hash map that additionally tracks how many of its entries are pastes.
//!
//! Both the expiring and permanent maps are built on top of this: each
//! entry is either a `url` (a short link to somewhere else) or a `paste`
//! (a blob stored in the [`crate::paste_store`]), and both maps need a
//! cheap, always-accurate count of "how many pastes are currently live" to
//! report via `num_pastes()` without walking every entry.

use std::collections::HashMap;

/// The two kinds of value an entry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Url,
    Paste,
}

const URL_TAG: u8 = b'u';
const PASTE_TAG: u8 = b'p';

/// The on-disk record format has no field for kind, so it's folded into
/// the value itself as a one-byte tag prefix. This is a storage-layer
/// concern, not a record-codec one: tagging happens before a value is
/// handed to [`crate::record::encode`], and untagging happens right after
/// [`crate::record::decode`].
pub fn tag_value(kind: ValueKind, value: &str) -> String {
    let tag = match kind {
        ValueKind::Url => URL_TAG,
        ValueKind::Paste => PASTE_TAG,
    };
    let mut tagged = String::with_capacity(value.len() + 1);
    tagged.push(tag as char);
    tagged.push_str(value);
    tagged
}

/// Inverse of [`tag_value`]. Panics on an unrecognized tag byte - that can
/// only mean the log itself is corrupt, which recovery treats as fatal.
pub fn untag_value(tagged: &str) -> (ValueKind, &str) {
    let bytes = tagged.as_bytes();
    assert!(!bytes.is_empty(), "tagged value must not be empty");
    let kind = match bytes[0] {
        URL_TAG => ValueKind::Url,
        PASTE_TAG => ValueKind::Paste,
        other => panic!("shortkv: unrecognized value kind tag {:?}; log is corrupt", other as char),
    };
    (kind, &tagged[1..])
}

/// Implemented by whatever an entry type stores, so [`PasteAwareMap`] can
/// keep its paste counter in sync without knowing the entry's shape.
pub trait HasKind {
    fn kind(&self) -> ValueKind;
}

/// A `HashMap<String, V>` with an O(1) running count of paste-kind entries.
#[derive(Debug)]
pub struct PasteAwareMap<V: HasKind> {
    entries: HashMap<String, V>,
    num_pastes: usize,
}

impl<V: HasKind> Default for PasteAwareMap<V> {
    fn default() -> Self {
        Self { entries: HashMap::new(), num_pastes: 0 }
    }
}

impl<V: HasKind> PasteAwareMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Inserts a brand-new entry. Panics if the key already exists -
    /// callers are expected to have checked with `contains_key` first,
    /// since a silent overwrite here would corrupt the paste counter.
    pub fn insert_new(&mut self, key: String, value: V) {
        if self.entries.contains_key(&key) {
            panic!("pastes_map: insert_new called with a key that already exists: {key}");
        }
        if value.kind() == ValueKind::Paste {
            self.num_pastes += 1;
        }
        self.entries.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let removed = self.entries.remove(key);
        if let Some(ref v) = removed {
            if v.kind() == ValueKind::Paste {
                self.num_pastes -= 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn num_pastes(&self) -> usize {
        self.num_pastes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}
