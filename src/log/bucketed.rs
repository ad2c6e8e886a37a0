//! Time-bucketed append log for expiring entries.
//!
//! Entries are written to a file named by the *ceiling* of their expiry
//! timestamp against a fixed bucket interval: `bucket_expires_before-<ts>.log`.
//! Once wall-clock time passes `<ts>`, every record in that file is known
//! to have expired, so the whole file is unlinked - there is never a need
//! to rewrite a file to drop individual expired records.

use crate::error::PutError;
use crate::record::{self, Record};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const FILENAME_PREFIX: &str = "bucket_expires_before-";
const FILENAME_SUFFIX: &str = ".log";

/// Rounds `expiry` up to the next multiple of `interval` (or leaves it
/// unchanged if it already lands exactly on one).
pub fn bucket_ceiling(expiry: i64, interval: i64) -> i64 {
    debug_assert!(interval > 0, "bucket interval must be positive");
    let rem = expiry.rem_euclid(interval);
    if rem == 0 {
        expiry
    } else {
        expiry + (interval - rem)
    }
}

fn bucket_filename(bucket_ts: i64) -> String {
    format!("{FILENAME_PREFIX}{bucket_ts}{FILENAME_SUFFIX}")
}

fn parse_bucket_filename(name: &str) -> Option<i64> {
    name.strip_prefix(FILENAME_PREFIX)?.strip_suffix(FILENAME_SUFFIX)?.parse().ok()
}

pub struct ExpiringBucketLog {
    dir: PathBuf,
    bucket_interval_secs: i64,
    writers: Mutex<HashMap<i64, BufWriter<File>>>,
}

impl ExpiringBucketLog {
    pub fn open(dir: impl AsRef<Path>, bucket_interval_secs: i64) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, bucket_interval_secs, writers: Mutex::new(HashMap::new()) })
    }

    pub fn bucket_for_expiry(&self, expiry: i64) -> i64 {
        bucket_ceiling(expiry, self.bucket_interval_secs)
    }

    /// Appends one record to the bucket file matching `expiry`, opening
    /// (and caching) the file handle if this is the first write to that
    /// bucket this process lifetime. The record's third field *is* the
    /// expiry timestamp - recovery reads it straight back as such, the
    /// bucket filename is only a derived grouping key.
    pub fn append(&self, key: &str, value: &str, expiry: i64) -> Result<(), PutError> {
        let encoded = record::encode(key, value, expiry)?;
        let bucket_ts = self.bucket_for_expiry(expiry);
        let mut writers = self.writers.lock();
        let writer = match writers.entry(bucket_ts) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => {
                let path = self.dir.join(bucket_filename(bucket_ts));
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                v.insert(BufWriter::new(file))
            }
        };
        writer.write_all(&encoded)?;
        writer.flush()?;
        Ok(())
    }

    /// Lists every bucket file currently on disk, sorted by bucket
    /// timestamp ascending.
    pub fn list_buckets(&self) -> io::Result<Vec<(i64, PathBuf)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(bucket_ts) = parse_bucket_filename(&name) {
                out.push((bucket_ts, entry.path()));
            }
        }
        out.sort_by_key(|(ts, _)| *ts);
        Ok(out)
    }

    /// Reads and decodes every record from every bucket file, in bucket
    /// order. Used only at startup by [`crate::recovery`].
    pub fn read_all(&self) -> io::Result<Vec<(i64, Result<Record, crate::error::RecordError>)>> {
        let mut out = Vec::new();
        for (bucket_ts, path) in self.list_buckets()? {
            let bytes = fs::read(&path)?;
            for decoded in record::decode_all(&bytes) {
                out.push((bucket_ts, decoded));
            }
        }
        Ok(out)
    }

    /// Deletes every bucket file whose ceiling `+ grace < now`; every
    /// record inside such a file is guaranteed expired and recovery no
    /// longer needs it. Returns the number of files removed.
    pub fn delete_buckets_up_to(&self, now: i64, grace: i64) -> io::Result<usize> {
        let mut writers = self.writers.lock();
        let mut deleted = 0;
        for (bucket_ts, path) in self.list_buckets()? {
            if bucket_ts + grace < now {
                writers.remove(&bucket_ts);
                fs::remove_file(&path)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_ceiling_rounds_up_to_next_boundary() {
        assert_eq!(bucket_ceiling(100, 60), 120);
        assert_eq!(bucket_ceiling(120, 60), 120);
        assert_eq!(bucket_ceiling(121, 60), 180);
    }

    #[test]
    fn filename_round_trips() {
        let name = bucket_filename(1_700_000_120);
        assert_eq!(parse_bucket_filename(&name), Some(1_700_000_120));
        assert_eq!(parse_bucket_filename("garbage.log"), None);
        assert_eq!(parse_bucket_filename("bucket_expires_before-notanumber.log"), None);
    }

    #[test]
    fn append_then_read_all_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExpiringBucketLog::open(dir.path(), 60).unwrap();
        log.append("a", "1", 1_050).unwrap();
        log.append("b", "2", 1_150).unwrap();
        let all = log.read_all().unwrap();
        assert_eq!(all.len(), 2);
        let keys: Vec<_> = all.iter().map(|(_, r)| r.as_ref().unwrap().key.clone()).collect();
        assert!(keys.contains(&"a".to_string()));
        assert!(keys.contains(&"b".to_string()));
    }

    #[test]
    fn delete_buckets_up_to_removes_only_due_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExpiringBucketLog::open(dir.path(), 60).unwrap();
        log.append("a", "1", 1_050).unwrap(); // bucket 1060
        log.append("b", "2", 5_000).unwrap(); // bucket 5040
        let deleted = log.delete_buckets_up_to(1_061, 0).unwrap();
        assert_eq!(deleted, 1);
        let remaining = log.list_buckets().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, 5_040);
    }

    #[test]
    fn delete_buckets_up_to_honors_grace_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = ExpiringBucketLog::open(dir.path(), 60).unwrap();
        log.append("a", "1", 1_050).unwrap(); // bucket 1060
        assert_eq!(log.delete_buckets_up_to(1_061, 30).unwrap(), 0);
        assert_eq!(log.delete_buckets_up_to(1_091, 30).unwrap(), 1);
    }
}
