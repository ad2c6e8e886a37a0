//! Crash recovery / startup loader.
//!
//! Rebuilds an in-memory map (and its per-length random id bags) purely
//! from what's on disk. Anything that looks like corruption - a checksum
//! mismatch, a duplicate key, a timestamp before the configured sanity
//! floor - is treated as fatal: this is the boundary where "no middle
//! ground" (§7) means `panic!`, not `Result`. The sole tolerated anomaly
//! is a torn trailing record (no closing newline) in the very last file,
//! which is what a crash mid-`write` looks like and is simply dropped.

use crate::base53;
use crate::config::{ExpiringConfig, PermanentConfig};
use crate::error::RecordError;
use crate::expiring_map::{ExpiringEntry, ExpiringMap};
use crate::log::bucketed::ExpiringBucketLog;
use crate::log::rotating::PermanentRotatingLog;
use crate::pastes_map::untag_value;
use crate::paste_store::PasteStore;
use crate::permanent_map::{PermanentEntry, PermanentMap};
use crate::random_bag::RandomBag64;
use crate::size_hint::SizeHint;
use std::collections::HashMap;

/// Re-validates a recovered record's key against the Base-53 checksum
/// scheme. A key that fails to validate cannot have come from this
/// store's own allocator and indicates corruption or tampering.
fn validate_recovered_key(key: &str) {
    let mut chars = key.chars();
    let checksum = chars.next_back().expect("record keys are non-empty, enforced at encode time") as u8;
    let prefix: String = chars.collect();
    if base53::validate(&prefix, checksum, false).is_err() {
        panic!("shortkv: recovered record key {key:?} fails Base-53 validation");
    }
}

/// Panics if `timestamp` falls outside the configured sanity window
/// `[floor, ceiling]`. `what` names the field for the panic message
/// (`"expiry"` or `"creation time"`).
fn check_timestamp_in_range(key: &str, timestamp: i64, floor: i64, ceiling: i64, what: &str) {
    if timestamp < floor {
        tracing::error!(key = %key, timestamp, "{what} predates the sanity floor");
        panic!("shortkv: record for {key:?} has {what} {timestamp} before sanity floor {floor}");
    }
    if timestamp > ceiling {
        tracing::error!(key = %key, timestamp, "{what} exceeds the sanity ceiling");
        panic!("shortkv: record for {key:?} has {what} {timestamp} after sanity ceiling {ceiling}");
    }
}

pub struct ExpiringRecovery {
    pub map: ExpiringMap,
    pub log: ExpiringBucketLog,
    pub paste_store: PasteStore,
    pub size_hint: SizeHint,
    pub bags: HashMap<usize, RandomBag64>,
}

pub fn recover_expiring(config: &ExpiringConfig, now: i64) -> ExpiringRecovery {
    let log = ExpiringBucketLog::open(config.data_dir.join("log"), config.bucket_interval_secs)
        .expect("shortkv: failed to open expiring log directory");
    let paste_store =
        PasteStore::open(config.data_dir.join("pastes")).expect("shortkv: failed to open paste store directory");
    let size_hint = SizeHint::open(config.data_dir.join("size_hint"), config.size_hint_step)
        .expect("shortkv: failed to open size-hint file");

    let records = log.read_all().expect("shortkv: failed to read expiring log files");
    let last_index = records.len().saturating_sub(1);

    let mut builder = ExpiringMap::begin();
    let mut dropped_expired = 0usize;

    for (i, (_bucket_ts, decoded)) in records.into_iter().enumerate() {
        let record = match decoded {
            Ok(r) => r,
            Err(RecordError::MissingTrailingNewline) if i == last_index => {
                tracing::warn!("discarding torn trailing record in expiring log (likely a crash mid-write)");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "corrupt expiring log record");
                panic!("shortkv: corrupt expiring log record: {e}");
            }
        };

        validate_recovered_key(&record.key);
        check_timestamp_in_range(
            &record.key,
            record.timestamp,
            config.timestamp_floor_unix,
            config.timestamp_ceiling_unix,
            "expiry",
        );

        if record.timestamp <= now {
            dropped_expired += 1;
            continue;
        }

        let (kind, value) = untag_value(&record.value);
        builder.insert(record.key, ExpiringEntry { value: value.to_string(), kind, expiry: record.timestamp });
    }

    if dropped_expired > 0 {
        tracing::info!(count = dropped_expired, "dropped already-expired entries found during recovery");
    }

    let map = ExpiringMap::finish(builder);
    size_hint.record_observed_size(map.num_items() as u64).expect("shortkv: failed to persist size hint");

    let mut bags = HashMap::new();
    for length in 2..=config.generate_strings_up_to {
        let ids = base53::enumerate_all(length, |id_str| !map.contains_key(id_str))
            .expect("generate_strings_up_to guarantees length >= 2");
        bags.insert(length, RandomBag64::from_vec(ids));
    }

    ExpiringRecovery { map, log, paste_store, size_hint, bags }
}

pub struct PermanentRecovery {
    pub map: PermanentMap,
    pub log: PermanentRotatingLog,
    pub paste_store: PasteStore,
    pub size_hint: SizeHint,
    pub bags: HashMap<usize, RandomBag64>,
}

pub fn recover_permanent(config: &PermanentConfig) -> PermanentRecovery {
    let log = PermanentRotatingLog::open(config.data_dir.join("log"), config.max_log_file_bytes)
        .expect("shortkv: failed to open permanent log directory");
    let paste_store =
        PasteStore::open(config.data_dir.join("pastes")).expect("shortkv: failed to open paste store directory");
    let size_hint = SizeHint::open(config.data_dir.join("size_hint"), config.size_hint_step)
        .expect("shortkv: failed to open size-hint file");

    let records = log.read_all().expect("shortkv: failed to read permanent log files");
    let last_index = records.len().saturating_sub(1);

    let mut builder = PermanentMap::begin();

    for (i, decoded) in records.into_iter().enumerate() {
        let record = match decoded {
            Ok(r) => r,
            Err(RecordError::MissingTrailingNewline) if i == last_index => {
                tracing::warn!("discarding torn trailing record in permanent log (likely a crash mid-write)");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "corrupt permanent log record");
                panic!("shortkv: corrupt permanent log record: {e}");
            }
        };

        validate_recovered_key(&record.key);
        check_timestamp_in_range(
            &record.key,
            record.timestamp,
            config.timestamp_floor_unix,
            config.timestamp_ceiling_unix,
            "creation time",
        );

        let (kind, value) = untag_value(&record.value);
        builder.insert(record.key, PermanentEntry { value: value.to_string(), kind });
    }

    let map = PermanentMap::finish(builder);
    size_hint.record_observed_size(map.num_items() as u64).expect("shortkv: failed to persist size hint");

    let mut bags = HashMap::new();
    for length in 2..=config.generate_strings_up_to {
        let ids = base53::enumerate_all(length, |id_str| !map.contains_key(id_str))
            .expect("generate_strings_up_to guarantees length >= 2");
        bags.insert(length, RandomBag64::from_vec(ids));
    }

    PermanentRecovery { map, log, paste_store, size_hint, bags }
}
