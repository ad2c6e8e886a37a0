//! Public façade for the expiring store: short id -> (value, kind),
//! backed by a time-bucketed log, with a background sweeper that evicts
//! due entries, recycles their ids, deletes their paste blobs, and
//! unlinks bucket files once every entry inside has aged out.

use crate::base53;
use crate::clock;
use crate::config::ExpiringConfig;
use crate::error::{GetError, PutError};
use crate::expiring_map::{ExpiringEntry, ExpiringMap};
use crate::log::bucketed::ExpiringBucketLog;
use crate::pastes_map::{tag_value, ValueKind};
use crate::paste_store::{BlobTimestampKind, PasteStore};
use crate::random_bag::RandomBag64;
use crate::recovery;
use crate::size_hint::SizeHint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const SWEEPER_TICK: Duration = Duration::from_millis(200);
const MAX_RANDOM_ALLOCATION_ATTEMPTS: usize = 50;

/// An entry expiring less than this many seconds from now is rejected
/// outright rather than accepted and immediately swept.
const MIN_TTL_SECS: i64 = 5;

struct Shared {
    config: ExpiringConfig,
    map: ExpiringMap,
    log: ExpiringBucketLog,
    paste_store: PasteStore,
    size_hint: SizeHint,
    bags: HashMap<usize, RandomBag64>,
    put_lock: Mutex<()>,
    shutdown: AtomicBool,
}

fn sweep_once(shared: &Shared) {
    let now = clock::unix_now();
    let expired = shared.map.remove_all_expired(now, shared.config.grace_ram_secs);
    for (key, entry) in &expired {
        if entry.kind == ValueKind::Paste {
            if let Err(e) = shared.paste_store.delete(&entry.value) {
                tracing::warn!(key = %key, error = %e, "failed to delete expired paste blob");
            }
        }
        if let Some(bag) = shared.bags.get(&key.len()) {
            bag.push(base53::pack_be_u64(key));
        }
    }
    if !expired.is_empty() {
        tracing::debug!(count = expired.len(), "swept expired entries");
    }
    match shared.log.delete_buckets_up_to(now, shared.config.grace_disk_secs) {
        Ok(0) => {}
        Ok(n) => tracing::debug!(count = n, "deleted fully-expired bucket files"),
        Err(e) => tracing::warn!(error = %e, "failed to delete aged-out bucket files"),
    }
}

/// A running expiring store. Cheap to share across threads by wrapping
/// in an `Arc` the way the teacher's engine is shared with its server.
pub struct ExpiringStore {
    shared: Arc<Shared>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ExpiringStore {
    /// Opens (or creates) a store at `config.data_dir`, replaying its log
    /// to rebuild the in-memory map, then starts the background sweeper.
    pub fn open(config: ExpiringConfig) -> Self {
        let now = clock::unix_now();
        let recovered = recovery::recover_expiring(&config, now);
        let shared = Arc::new(Shared {
            config,
            map: recovered.map,
            log: recovered.log,
            paste_store: recovered.paste_store,
            size_hint: recovered.size_hint,
            bags: recovered.bags,
            put_lock: Mutex::new(()),
            shutdown: AtomicBool::new(false),
        });
        let store = Self { shared, sweeper: Mutex::new(None) };
        store.start_sweeper();
        store
    }

    fn start_sweeper(&self) {
        let shared = Arc::clone(&self.shared);
        let interval = Duration::from_secs(shared.config.sweep_interval_secs.max(1));
        let handle = thread::spawn(move || {
            let mut elapsed = Duration::ZERO;
            while !shared.shutdown.load(Ordering::Relaxed) {
                thread::sleep(SWEEPER_TICK);
                elapsed += SWEEPER_TICK;
                if elapsed >= interval {
                    elapsed = Duration::ZERO;
                    sweep_once(&shared);
                }
            }
        });
        *self.sweeper.lock() = Some(handle);
    }

    fn allocate_id(&self, length: usize) -> Result<String, PutError> {
        if let Some(bag) = self.shared.bags.get(&length) {
            let packed = bag.pop_random().map_err(|_| PutError::NoShortIdsLeft)?;
            return Ok(base53::unpack_be_u64(packed, length));
        }
        // Lengths past `generate_strings_up_to` have no pre-generated bag:
        // the keyspace there is large enough that random-and-retry is
        // cheap and a full enumeration would be infeasible anyway.
        for _ in 0..MAX_RANDOM_ALLOCATION_ATTEMPTS {
            let id = base53::random(length).expect("length >= 2 is checked by the caller");
            let combined = id.as_combined_string();
            if !self.shared.map.contains_key(&combined) {
                return Ok(combined);
            }
        }
        Err(PutError::NoShortIdsLeft)
    }

    /// Stores `value` under a freshly allocated id of `length` characters,
    /// expiring `ttl_secs` seconds from now. Holds the store's single
    /// put lock for the whole allocate -> persist -> insert sequence so
    /// concurrent puts can never race onto the same id.
    pub fn put(&self, value: String, kind: ValueKind, length: usize, ttl_secs: i64) -> Result<String, PutError> {
        if length < 2 {
            return Err(PutError::RequestedLengthTooSmall);
        }
        if ttl_secs < MIN_TTL_SECS {
            return Err(PutError::AlreadyExpired);
        }

        let _guard = self.shared.put_lock.lock();
        let now = clock::unix_now();
        let expiry = now + ttl_secs;

        let id_str = self.allocate_id(length)?;

        let stored_value = match kind {
            ValueKind::Url => value,
            ValueKind::Paste => {
                self.shared.paste_store.put(value.as_bytes(), expiry, BlobTimestampKind::ExpiresAt)?
            }
        };

        let tagged = tag_value(kind, &stored_value);
        self.shared.log.append(&id_str, &tagged, expiry)?;

        self.shared
            .map
            .put_new(id_str.clone(), ExpiringEntry { value: stored_value, kind, expiry })
            .expect("put_lock serializes allocation; a freshly allocated id cannot already be live");

        self.shared.size_hint.record_observed_size(self.shared.map.num_items() as u64).map_err(PutError::Io)?;

        Ok(id_str)
    }

    /// Looks up `key`. Never touches disk: both `url` and `paste` kinds
    /// keep their live value in the in-memory map; for a paste that value
    /// is its content id, not its bytes (those are served separately, out
    /// of process, straight from the paste store directory).
    pub fn get(&self, key: &str) -> Result<(String, ValueKind), GetError> {
        let entry = self.shared.map.get(key).ok_or(GetError::NonExistentKey)?;
        let now = clock::unix_now();
        if entry.expiry <= now {
            return Err(GetError::KeyExpired { value: entry.value, expiry: entry.expiry });
        }
        Ok((entry.value, entry.kind))
    }

    pub fn num_items(&self) -> usize {
        self.shared.map.num_items()
    }

    pub fn num_pastes(&self) -> usize {
        self.shared.map.num_pastes()
    }

    /// Stops the background sweeper and waits for it to exit.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.sweeper.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExpiringStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpiringConfigBuilder;

    fn open_store(dir: &std::path::Path) -> ExpiringStore {
        let config = ExpiringConfigBuilder::new(dir)
            .with_bucket_interval_secs(1)
            .with_sweep_interval_secs(1)
            .with_generate_strings_up_to(2)
            .with_grace_ram_secs(0)
            .with_grace_disk_secs(11)
            .build()
            .unwrap();
        ExpiringStore::open(config)
    }

    #[test]
    fn put_then_get_round_trips_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let id = store.put("https://example.com".into(), ValueKind::Url, 3, 3600).unwrap();
        let (value, kind) = store.get(&id).unwrap();
        assert_eq!(value, "https://example.com");
        assert_eq!(kind, ValueKind::Url);
    }

    #[test]
    fn put_then_get_round_trips_paste() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let id = store.put("paste body".into(), ValueKind::Paste, 3, 3600).unwrap();
        let (content_id, kind) = store.get(&id).unwrap();
        assert_eq!(kind, ValueKind::Paste);
        assert!(!content_id.is_empty());
    }

    #[test]
    fn get_missing_key_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        assert_eq!(store.get("zz").unwrap_err(), GetError::NonExistentKey);
    }

    #[test]
    fn put_rejects_length_below_two() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        assert_eq!(
            store.put("v".into(), ValueKind::Url, 1, 60).unwrap_err().to_string(),
            PutError::RequestedLengthTooSmall.to_string()
        );
    }

    #[test]
    fn put_rejects_ttl_below_five_second_margin() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        assert_eq!(
            store.put("v".into(), ValueKind::Url, 2, 0).unwrap_err().to_string(),
            PutError::AlreadyExpired.to_string()
        );
        assert_eq!(
            store.put("v".into(), ValueKind::Url, 2, 4).unwrap_err().to_string(),
            PutError::AlreadyExpired.to_string()
        );
    }

    #[test]
    fn put_exhausts_small_bag_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        // length 2's entire bag (53 ids, minus illegal-pair collisions) is
        // small enough to exhaust deterministically in a test.
        let mut exhausted = false;
        for _ in 0..60 {
            match store.put("v".into(), ValueKind::Url, 2, 3600) {
                Ok(_) => {}
                Err(PutError::NoShortIdsLeft) => {
                    exhausted = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(exhausted, "expected the length-2 bag to run out");
    }

    #[test]
    fn sweeper_evicts_expired_entries_and_recycles_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());
        let id = store.put("https://gone.example".into(), ValueKind::Url, 2, MIN_TTL_SECS).unwrap();
        assert_eq!(store.num_items(), 1);

        std::thread::sleep(Duration::from_millis(6500));

        assert_eq!(store.num_items(), 0);
        assert_eq!(store.get(&id).unwrap_err(), GetError::NonExistentKey);
    }
}
