//! Public façade for the permanent store: short id -> (value, kind), with
//! no expiry and therefore no sweeper - entries live until the process
//! that holds this store is told (by some external, out-of-scope tool) to
//! remove them directly from disk.

use crate::base53;
use crate::config::PermanentConfig;
use crate::error::{GetError, PutError};
use crate::log::rotating::PermanentRotatingLog;
use crate::pastes_map::{tag_value, ValueKind};
use crate::paste_store::{BlobTimestampKind, PasteStore};
use crate::permanent_map::{PermanentEntry, PermanentMap};
use crate::random_bag::RandomBag64;
use crate::recovery;
use crate::size_hint::SizeHint;
use parking_lot::Mutex;
use std::collections::HashMap;

const MAX_RANDOM_ALLOCATION_ATTEMPTS: usize = 50;

pub struct PermanentStore {
    map: PermanentMap,
    log: PermanentRotatingLog,
    paste_store: PasteStore,
    size_hint: SizeHint,
    bags: HashMap<usize, RandomBag64>,
    put_lock: Mutex<()>,
}

impl PermanentStore {
    pub fn open(config: PermanentConfig) -> Self {
        let recovered = recovery::recover_permanent(&config);
        Self {
            map: recovered.map,
            log: recovered.log,
            paste_store: recovered.paste_store,
            size_hint: recovered.size_hint,
            bags: recovered.bags,
            put_lock: Mutex::new(()),
        }
    }

    fn allocate_id(&self, length: usize) -> Result<String, PutError> {
        if let Some(bag) = self.bags.get(&length) {
            let packed = bag.pop_random().map_err(|_| PutError::NoShortIdsLeft)?;
            return Ok(base53::unpack_be_u64(packed, length));
        }
        for _ in 0..MAX_RANDOM_ALLOCATION_ATTEMPTS {
            let id = base53::random(length).expect("length >= 2 is checked by the caller");
            let combined = id.as_combined_string();
            if !self.map.contains_key(&combined) {
                return Ok(combined);
            }
        }
        Err(PutError::NoShortIdsLeft)
    }

    /// Stores `value` permanently under a freshly allocated id of
    /// `length` characters. Unlike the expiring store there is no TTL.
    pub fn put(&self, value: String, kind: ValueKind, length: usize) -> Result<String, PutError> {
        if length < 2 {
            return Err(PutError::RequestedLengthTooSmall);
        }

        let _guard = self.put_lock.lock();
        let now = crate::clock::unix_now();

        let id_str = self.allocate_id(length)?;

        let stored_value = match kind {
            ValueKind::Url => value,
            ValueKind::Paste => self.paste_store.put(value.as_bytes(), now, BlobTimestampKind::CreatedAt)?,
        };

        let tagged = tag_value(kind, &stored_value);
        self.log.append(&id_str, &tagged, now)?;

        self.map
            .put_new(id_str.clone(), PermanentEntry { value: stored_value, kind })
            .expect("put_lock serializes allocation; a freshly allocated id cannot already be live");

        self.size_hint.record_observed_size(self.map.num_items() as u64).map_err(PutError::Io)?;

        Ok(id_str)
    }

    pub fn get(&self, key: &str) -> Result<(String, ValueKind), GetError> {
        let entry = self.map.get(key).ok_or(GetError::NonExistentKey)?;
        Ok((entry.value, entry.kind))
    }

    pub fn num_items(&self) -> usize {
        self.map.num_items()
    }

    pub fn num_pastes(&self) -> usize {
        self.map.num_pastes()
    }
}
